use crate::rig::{Pose, WheelActuator};

/// Copies each wheel's solved world pose onto its visual transform.
/// Runs on the render tick; `visuals` is indexed like the actuator bank.
pub fn sync_wheel_poses<W: WheelActuator + ?Sized>(wheels: &W, visuals: &mut [Pose]) {
    for (i, visual) in visuals.iter_mut().enumerate() {
        *visual = wheels.wheel_pose(i);
    }
}
