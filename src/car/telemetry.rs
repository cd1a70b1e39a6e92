use nalgebra::{UnitQuaternion, Vector3};

/// Finite-difference acceleration from per-tick velocity samples.
///
/// Acceleration is the raw per-tick delta (m/s per tick), not divided by dt.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryTracker {
    prev_velocity: Vector3<f32>,
    acceleration: Vector3<f32>,
}

impl Default for TelemetryTracker {
    fn default() -> Self {
        Self {
            prev_velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
        }
    }
}

impl TelemetryTracker {
    pub fn sample(&mut self, velocity: Vector3<f32>) {
        self.acceleration = velocity - self.prev_velocity;
        self.prev_velocity = velocity;
    }

    pub fn acceleration(&self) -> Vector3<f32> {
        self.acceleration
    }
}

/// Planar heading in radians: atan2 of the forward vector's z and x.
/// Pitch and roll are ignored.
pub fn heading(rotation: &UnitQuaternion<f32>) -> f32 {
    let forward = rotation * Vector3::z();
    forward.z.atan2(forward.x)
}
