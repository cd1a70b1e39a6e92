//! car - single vehicle controller over an abstract chassis + wheel bank

pub mod arbiter;
pub mod pose_forcer;
pub mod telemetry;
pub mod wheel_sync;

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, info, trace};

use crate::config::CarConfig;
use crate::error::CarError;
use crate::rig::{Pose, RigidBody, WheelActuator};

pub use arbiter::{ActuationCommand, ArbiterGains, ControlRequest, HumanInput, WheelCommand, arbitrate};
pub use pose_forcer::PoseForcer;
pub use telemetry::{TelemetryTracker, heading};

/// Capability surface of a drivable car. Requests are fire-and-forget
/// writes picked up on the next fixed tick; getters have no side effects.
pub trait VehicleControl {
    fn save_pos_rot(&mut self);
    fn restore_pos_rot(&mut self);

    /// Unscaled throttle, consumed by the next fixed tick. Clears any pending brake.
    fn request_throttle(&mut self, value: f32);
    /// Steer angle in degrees, held until overridden.
    fn request_steering(&mut self, value: f32);
    /// 0..1, consumed by the next fixed tick.
    fn request_foot_brake(&mut self, value: f32);
    /// Not wired to anything.
    fn request_hand_brake(&mut self, value: f32);

    /// Teleports the car and keeps reasserting the pose for a few ticks.
    fn set_pose(&mut self, position: Vector3<f32>, rotation: UnitQuaternion<f32>);

    fn steering(&self) -> f32;
    fn throttle(&self) -> f32;
    fn foot_brake(&self) -> f32;
    fn hand_brake(&self) -> f32;
    fn velocity(&self) -> Vector3<f32>;
    fn accel(&self) -> Vector3<f32>;
    fn orient(&self) -> f32;
    fn transform(&self) -> Pose;
    fn is_still(&self) -> bool;
}

pub struct Car<R> {
    rig: R,                         // chassis + wheel actuators
    config: CarConfig,
    gains: ArbiterGains,
    request: ControlRequest,        // programmatic channel, mirrors human input
    last_human: HumanInput,         // scaled (accel, steer) of the last tick, for logging
    telemetry: TelemetryTracker,
    forcer: PoseForcer,
    saved: Pose,                    // SavePosRot checkpoint
    transform: Pose,                // visual transform of the chassis
    wheel_visuals: Vec<Pose>,       // visual transform per wheel
    last_command: ActuationCommand,
}

impl<R: RigidBody + WheelActuator> Car<R> {
    /// Binds the controller to a rig. Captures the current pose as the
    /// restore point and applies the center-of-mass override.
    pub fn attach(mut rig: R, config: CarConfig) -> Result<Self, CarError> {
        let wheels = rig.wheel_count();
        if wheels == 0 {
            return Err(CarError::NoWheels);
        }
        for &index in &config.front_wheels {
            if index >= wheels {
                return Err(CarError::FrontWheelOutOfRange { index, wheels });
            }
        }

        if let Some([x, y, z]) = config.center_of_mass {
            rig.set_center_of_mass(Vector3::new(x, y, z));
        }

        let pose = rig.pose();
        let mut car = Self {
            gains: ArbiterGains::from(&config),
            config,
            request: ControlRequest::default(),
            last_human: HumanInput::default(),
            telemetry: TelemetryTracker::default(),
            forcer: PoseForcer::default(),
            saved: pose,
            transform: pose,
            wheel_visuals: vec![Pose::default(); wheels],
            last_command: ActuationCommand::default(),
            rig,
        };
        car.save_pos_rot();
        wheel_sync::sync_wheel_poses(&car.rig, &mut car.wheel_visuals);

        info!(
            "🚗 Car attached: {} wheels, front = {:?}, at {:?}",
            wheels, car.config.front_wheels, pose.position
        );
        Ok(car)
    }

    // --------------------------------------------------------------
    // fixed tick, before the physics step
    // --------------------------------------------------------------
    pub fn fixed_update(&mut self, human: HumanInput) -> &ActuationCommand {
        let velocity = self.rig.velocity();
        let speed = velocity.norm();

        let cmd = arbitrate(
            human,
            &mut self.request,
            speed,
            self.rig.wheel_count(),
            &self.gains,
        );

        for (i, wheel) in cmd.wheels.iter().enumerate() {
            if let Some(angle) = wheel.steer_angle {
                self.rig.set_steer_angle(i, angle);
            }
            self.rig.set_motor_torque(i, wheel.motor_torque);
            self.rig.set_brake_torque(i, wheel.brake_torque);
        }

        self.last_human = HumanInput::new(cmd.human_accel, cmd.human_steer);
        self.telemetry.sample(velocity);

        trace!(
            throttle = cmd.throttle,
            steer = cmd.steer_angle,
            brake = cmd.brake,
            speed,
            "arbitrated"
        );

        self.last_command = cmd;
        &self.last_command
    }

    // --------------------------------------------------------------
    // fixed tick, after the physics step
    // --------------------------------------------------------------
    pub fn after_step(&mut self) {
        if let Some(pose) = self.forcer.tick() {
            self.rig.set_pose(pose);
            trace!(remaining = self.forcer.remaining(), "pose reasserted");
        }
        // checkpoint and heading read the chassis as of this step
        self.transform = self.rig.pose();
    }

    // --------------------------------------------------------------
    // render tick
    // --------------------------------------------------------------
    pub fn update_visuals(&mut self) {
        wheel_sync::sync_wheel_poses(&self.rig, &mut self.wheel_visuals);
        self.transform = self.rig.pose();
    }

    /// Rolls the chassis half a turn about its own X axis and lifts it 2 m.
    pub fn flip_upright(&mut self) {
        let current = self.rig.pose();
        let flip = UnitQuaternion::from_euler_angles(std::f32::consts::PI, 0.0, 0.0);
        let pose = Pose::new(
            current.position + Vector3::y() * 2.0,
            current.rotation * flip,
        );
        self.rig.set_pose(pose);
        self.transform = pose;
        info!("🔄 Flipped car upright at {:?}", pose.position);
    }

    pub fn wheel_visuals(&self) -> &[Pose] {
        &self.wheel_visuals
    }

    pub fn last_command(&self) -> &ActuationCommand {
        &self.last_command
    }

    /// Scaled human axes applied on the last tick.
    pub fn last_human(&self) -> HumanInput {
        self.last_human
    }

    pub fn saved_pose(&self) -> Pose {
        self.saved
    }

    pub fn is_forcing_pose(&self) -> bool {
        self.forcer.is_forcing()
    }

    pub fn rig(&self) -> &R {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut R {
        &mut self.rig
    }
}

impl<R: RigidBody + WheelActuator> VehicleControl for Car<R> {
    fn save_pos_rot(&mut self) {
        self.saved = self.transform;
    }

    fn restore_pos_rot(&mut self) {
        let Pose { position, rotation } = self.saved;
        info!("⏪ Restoring car pose to {:?}", position);
        self.set_pose(position, rotation);
    }

    fn request_throttle(&mut self, value: f32) {
        self.request.torque = value;
        self.request.brake = 0.0;
    }

    fn request_steering(&mut self, value: f32) {
        self.request.steering = value;
    }

    fn request_foot_brake(&mut self, value: f32) {
        self.request.brake = value;
    }

    fn request_hand_brake(&mut self, _value: f32) {}

    fn set_pose(&mut self, position: Vector3<f32>, rotation: UnitQuaternion<f32>) {
        let pose = Pose::new(position, rotation);
        self.rig.set_pose(pose);
        self.transform = pose;
        self.forcer.set(pose, self.config.pose_force_ticks);
        debug!(ticks = self.config.pose_force_ticks, "forcing pose {:?}", position);
    }

    fn steering(&self) -> f32 {
        self.request.steering
    }

    fn throttle(&self) -> f32 {
        self.request.torque
    }

    fn foot_brake(&self) -> f32 {
        self.request.brake
    }

    fn hand_brake(&self) -> f32 {
        0.0
    }

    fn velocity(&self) -> Vector3<f32> {
        self.rig.velocity()
    }

    fn accel(&self) -> Vector3<f32> {
        self.telemetry.acceleration()
    }

    fn orient(&self) -> f32 {
        heading(&self.transform.rotation)
    }

    fn transform(&self) -> Pose {
        self.transform
    }

    fn is_still(&self) -> bool {
        self.rig.is_sleeping()
    }
}
