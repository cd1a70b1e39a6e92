//! Collaborator seams between the car controller and whatever simulates it.
//!
//! The controller never integrates anything itself. It reads the chassis
//! through [`RigidBody`] and drives wheels through [`WheelActuator`]; the
//! rapier-backed [`crate::physics::PhysicsWorld`] implements both, tests use
//! a scripted rig.

use nalgebra::{UnitQuaternion, Vector3};

/// World-space position + orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Pose {
    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self { position, rotation }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// Chassis body as seen by the controller.
pub trait RigidBody {
    fn position(&self) -> Vector3<f32>;
    fn rotation(&self) -> UnitQuaternion<f32>;
    fn velocity(&self) -> Vector3<f32>;

    /// Teleports the body. Velocity is left alone.
    fn set_pose(&mut self, pose: Pose);

    /// Overrides the center of mass, in body-local coordinates.
    fn set_center_of_mass(&mut self, offset: Vector3<f32>);

    /// Engine rest detection.
    fn is_sleeping(&self) -> bool;

    fn pose(&self) -> Pose {
        Pose::new(self.position(), self.rotation())
    }
}

/// Indexed bank of wheel actuators.
pub trait WheelActuator {
    fn wheel_count(&self) -> usize;

    /// Steer angle in degrees, positive turns right.
    fn set_steer_angle(&mut self, wheel: usize, degrees: f32);
    fn set_motor_torque(&mut self, wheel: usize, torque: f32);
    fn set_brake_torque(&mut self, wheel: usize, torque: f32);

    /// World pose of the wheel as the engine last solved it.
    fn wheel_pose(&self, wheel: usize) -> Pose;
}
