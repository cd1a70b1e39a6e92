//! Reasserts a teleport for a bounded number of fixed ticks.
//!
//! A single pose write can be lost to the engine's own integration before
//! the next visual sync, so the pose is rewritten after every physics step
//! until the window runs out.

use crate::rig::Pose;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum PoseForcer {
    #[default]
    Idle,
    Forcing { pose: Pose, remaining: u32 },
}

impl PoseForcer {
    /// Starts (or restarts) forcing `pose` for `ticks` fixed ticks. Any
    /// sequence already running is dropped.
    pub fn set(&mut self, pose: Pose, ticks: u32) {
        *self = if ticks == 0 {
            PoseForcer::Idle
        } else {
            PoseForcer::Forcing { pose, remaining: ticks }
        };
    }

    /// Advances one fixed tick. Returns the pose to write this tick, if any.
    pub fn tick(&mut self) -> Option<Pose> {
        match *self {
            PoseForcer::Idle => None,
            PoseForcer::Forcing { pose, remaining } => {
                *self = if remaining > 1 {
                    PoseForcer::Forcing { pose, remaining: remaining - 1 }
                } else {
                    PoseForcer::Idle
                };
                Some(pose)
            }
        }
    }

    pub fn is_forcing(&self) -> bool {
        matches!(self, PoseForcer::Forcing { .. })
    }

    pub fn remaining(&self) -> u32 {
        match self {
            PoseForcer::Idle => 0,
            PoseForcer::Forcing { remaining, .. } => *remaining,
        }
    }
}
