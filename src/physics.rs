// src/physics.rs

use rapier3d::control::{DynamicRayCastVehicleController, WheelTuning};
use rapier3d::na::{UnitQuaternion, Vector3};
use rapier3d::prelude::*;
use tracing::{info, warn};

use crate::config::CarConfig;
use crate::error::CarError;
use crate::rig::{Pose, RigidBody, WheelActuator};

const GROUP_GROUND: Group  = Group::from_bits_truncate(0b0001);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);

const RUNAWAY_LIMIT: Real = 1_000.0; // meters from origin before a body is pulled back

pub struct PhysicsWorld {
    pub gravity: Vector<Real>, // gravity vector
    pub pipeline: PhysicsPipeline, // physics pipeline
    pub island_manager: IslandManager, // manages islands of bodies
    pub broad_phase: DefaultBroadPhase, // broad-phase collision detection
    pub narrow_phase: NarrowPhase, // collision detection
    pub bodies: RigidBodySet, // for rigid bodies
    pub colliders: ColliderSet, // for collision shapes
    pub joints: ImpulseJointSet, // for constraints
    pub multibody_joints: MultibodyJointSet,// for articulated bodies
    pub ccd: CCDSolver, // continuous collision detection
    pub query_pipeline: QueryPipeline, // for wheel raycasts
    pub chassis: RigidBodyHandle, // the car body
    chassis_collider: ColliderHandle,
    vehicle: DynamicRayCastVehicleController, // raycast wheels on the chassis
    spawn: Vector<Real>, // runaway recovery target
}

impl PhysicsWorld {

    /// Ground slab + one raycast-wheel car built from `config`.
    pub fn new(config: &CarConfig) -> Result<Self, CarError> {
        config.validate()?;

        let gravity = vector![0.0, -9.81, 0.0];

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // === 1. Static ground slab, top surface at y = 0 ===
        let ground_rb = RigidBodyBuilder::fixed()
            .translation(vector![0.0, -0.1, 0.0])
            .build();

        let ground_handle = bodies.insert(ground_rb);

        let ground_collider = ColliderBuilder::cuboid(500.0, 0.1, 500.0)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.2)
            .restitution(0.0)
            .build();

        colliders.insert_with_parent(ground_collider, ground_handle, &mut bodies);

        // === 2. Chassis ===
        let [sx, sy, sz] = config.spawn_position;
        let spawn = vector![sx, sy, sz];

        let [hx, hy, hz] = config.chassis_half_extents;
        let volume = 8.0 * hx * hy * hz;
        let density = config.mass / volume; // ρ = m / V

        let rb = RigidBodyBuilder::dynamic()
            .translation(spawn)
            .linear_damping(config.linear_damping)
            .angular_damping(config.angular_damping)
            .ccd_enabled(true)
            .build();

        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND))
            .density(density)
            .friction(0.0) // wheels provide all grip
            .restitution(0.0)
            .build();

        let chassis = bodies.insert(rb);
        let chassis_collider = colliders.insert_with_parent(collider, chassis, &mut bodies);

        // === 3. Raycast wheels, +Z forward ===
        let tuning = WheelTuning {
            suspension_stiffness: config.suspension_stiffness,
            suspension_damping: config.suspension_damping,
            ..WheelTuning::default()
        };

        let mut vehicle = DynamicRayCastVehicleController::new(chassis);
        vehicle.index_up_axis = 1;
        vehicle.index_forward_axis = 2;

        for w in &config.wheels {
            let [x, y, z] = w.offset;
            vehicle.add_wheel(
                point![x, y, z],
                -Vector::y(),
                -Vector::x(), // up × axle = +Z
                w.suspension_rest_length,
                w.radius,
                &tuning,
            );
        }

        info!(
            "🌎 World ready: ground + chassis ({} kg, {} wheels) at {:?}",
            config.mass,
            config.wheels.len(),
            config.spawn_position
        );

        Ok(Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            chassis,
            chassis_collider,
            vehicle,
            spawn,
        })
    }

    pub fn step(&mut self, dt: Real) {

        // 1) Wheel raycasts see this tick's colliders
        self.query_pipeline.update(&self.colliders);

        // 2) Suspension, engine + brake impulses from the actuator state
        self.vehicle.update_vehicle(
            dt,
            &mut self.bodies,
            &self.colliders,
            &self.query_pipeline,
            QueryFilter::exclude_dynamic().exclude_rigid_body(self.chassis),
        );

        // 3) Step physics
        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        // 4) Safety: pull runaway bodies back to spawn
        for (_, body) in self.bodies.iter_mut() {
            let pos = *body.translation();

            let bad = !pos.iter().all(|c| c.is_finite())
                || pos.iter().any(|c| c.abs() > RUNAWAY_LIMIT);

            if bad {
                body.set_translation(self.spawn, true);
                body.set_rotation(UnitQuaternion::identity(), true);
                body.set_linvel(vector![0.0, 0.0, 0.0], true);
                body.set_angvel(vector![0.0, 0.0, 0.0], true);

                warn!("⚠️ Reset runaway body from {:?} back to {:?}", pos, self.spawn);
            }
        }
    }

    /// Engine-side speed along the forward axis, signed.
    pub fn forward_speed(&self) -> Real {
        self.vehicle.current_vehicle_speed
    }

    fn body(&self) -> Option<&rapier3d::prelude::RigidBody> {
        self.bodies.get(self.chassis)
    }
}

// --------------------------------------------------
// chassis
// --------------------------------------------------
impl RigidBody for PhysicsWorld {
    fn position(&self) -> Vector3<f32> {
        self.body().map(|b| *b.translation()).unwrap_or_else(Vector3::zeros)
    }

    fn rotation(&self) -> UnitQuaternion<f32> {
        self.body().map(|b| *b.rotation()).unwrap_or_else(UnitQuaternion::identity)
    }

    fn velocity(&self) -> Vector3<f32> {
        self.body().map(|b| *b.linvel()).unwrap_or_else(Vector3::zeros)
    }

    fn set_pose(&mut self, pose: Pose) {
        if let Some(body) = self.bodies.get_mut(self.chassis) {
            body.set_translation(pose.position, true);
            body.set_rotation(pose.rotation, true);
        }
    }

    fn set_center_of_mass(&mut self, offset: Vector3<f32>) {
        if let Some(collider) = self.colliders.get_mut(self.chassis_collider) {
            let mp = collider.mass_properties();
            collider.set_mass_properties(MassProperties::new(
                Point::from(offset),
                mp.mass(),
                mp.principal_inertia(),
            ));
        }
        // body mass props are cached from its colliders
        if let Some(body) = self.bodies.get_mut(self.chassis) {
            body.recompute_mass_properties_from_colliders(&self.colliders);
        }
    }

    fn is_sleeping(&self) -> bool {
        self.body().is_some_and(|b| b.is_sleeping())
    }
}

// --------------------------------------------------
// wheels
// --------------------------------------------------
impl WheelActuator for PhysicsWorld {
    fn wheel_count(&self) -> usize {
        self.vehicle.wheels().len()
    }

    fn set_steer_angle(&mut self, wheel: usize, degrees: f32) {
        if let Some(w) = self.vehicle.wheels_mut().get_mut(wheel) {
            // positive rotation about +Y turns +Z toward +X, which is left
            w.steering = -degrees.to_radians();
        }
    }

    fn set_motor_torque(&mut self, wheel: usize, torque: f32) {
        if let Some(w) = self.vehicle.wheels_mut().get_mut(wheel) {
            w.engine_force = torque;
        }
        // wheel impulses don't wake the chassis on their own
        if torque != 0.0 {
            if let Some(body) = self.bodies.get_mut(self.chassis) {
                body.wake_up(true);
            }
        }
    }

    fn set_brake_torque(&mut self, wheel: usize, torque: f32) {
        if let Some(w) = self.vehicle.wheels_mut().get_mut(wheel) {
            w.brake = torque;
        }
    }

    fn wheel_pose(&self, wheel: usize) -> Pose {
        let Some(w) = self.vehicle.wheels().get(wheel) else {
            return Pose::default();
        };
        let chassis = self.rotation();
        let steer = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), w.steering);
        let spin = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), w.rotation);

        Pose::new(w.center().coords, chassis * steer * spin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::Car;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&CarConfig::default()).unwrap()
    }

    #[test]
    fn builds_configured_wheels() {
        let w = world();
        assert_eq!(w.wheel_count(), 4);
        assert_relative_eq!(w.position(), Vector3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn rejects_wheelless_config() {
        let mut c = CarConfig::default();
        c.wheels.clear();
        assert!(matches!(PhysicsWorld::new(&c), Err(CarError::NoWheels)));
    }

    #[test]
    fn actuator_writes_reach_wheels() {
        let mut w = world();
        w.set_steer_angle(2, 15.0);
        w.set_motor_torque(1, 25.0);
        w.set_brake_torque(0, 400.0);

        let wheels = w.vehicle.wheels();
        assert_relative_eq!(wheels[2].steering, -15f32.to_radians());
        assert_eq!(wheels[3].steering, 0.0);
        assert_eq!(wheels[1].engine_force, 25.0);
        assert_eq!(wheels[0].brake, 400.0);
    }

    #[test]
    fn out_of_range_wheel_is_ignored() {
        let mut w = world();
        w.set_motor_torque(9, 1.0);
        assert_eq!(w.wheel_pose(9), Pose::default());
    }

    #[test]
    fn set_pose_reads_back() {
        let mut w = world();
        let rot = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 1.2);
        w.set_pose(Pose::new(Vector3::new(3.0, 1.0, -2.0), rot));

        assert_relative_eq!(w.position(), Vector3::new(3.0, 1.0, -2.0));
        assert_relative_eq!(w.rotation(), rot, epsilon = 1e-6);
    }

    #[test]
    fn attach_moves_chassis_center_of_mass() {
        let config = CarConfig::default();
        let car = Car::attach(PhysicsWorld::new(&config).unwrap(), config).unwrap();
        let w = car.rig();

        let body = &w.bodies[w.chassis];
        let com = body.mass_properties().local_mprops.local_com;
        assert_relative_eq!(com, point![0.0, -0.05, 0.0], epsilon = 1e-6);
        assert_relative_eq!(body.mass(), 3.0, epsilon = 1e-4);

        let collider = &w.colliders[w.chassis_collider];
        assert_relative_eq!(collider.mass_properties().local_com, point![0.0, -0.05, 0.0], epsilon = 1e-6);
    }

    #[test]
    fn car_settles_on_its_wheels() {
        let mut w = world();
        for _ in 0..240 {
            w.step(DT);
        }

        let p = w.position();
        assert!(p.iter().all(|c| c.is_finite()));
        assert!(p.y > 0.0 && p.y < 0.5, "chassis at {p:?}");
        assert!(w.velocity().norm() < 0.5);

        for i in 0..w.wheel_count() {
            let pose = w.wheel_pose(i);
            assert!(pose.position.y > 0.0);
        }
    }

    #[test]
    fn motor_torque_moves_the_car() {
        let mut w = world();
        for _ in 0..120 {
            w.step(DT);
        }
        let start = w.position();

        for _ in 0..60 {
            for i in 0..4 {
                w.set_motor_torque(i, 5.0);
            }
            w.step(DT);
        }

        let moved = w.position() - start;
        assert!(moved.xz().norm() > 0.05, "moved {moved:?}");
    }

    #[test]
    fn runaway_body_is_pulled_back() {
        let mut w = world();
        w.set_pose(Pose::new(Vector3::new(5_000.0, 0.5, 0.0), UnitQuaternion::identity()));
        w.step(DT);
        assert!(w.position().x.abs() < 1.0);
    }
}
