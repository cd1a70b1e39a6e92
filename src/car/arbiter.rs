// ==============================================================================
// arbiter.rs — HUMAN vs PROGRAMMATIC CONTROL ARBITRATION
// ==============================================================================
// Responsibilities:
// - Blend held human axes with the programmatic request channel
// - Consume one-shot requests (throttle, brake)
// - Produce per-wheel actuation for one fixed tick
// ------------------------------------------------------------------------------
// Per tick:
//   raw_accel = vertical   * max_torque
//   raw_steer = horizontal * human_steering_max
//
//   throttle  = raw_accel            if raw_accel != 0   (request <- raw_accel)
//             = request * max_torque otherwise           (request <- 0)
//   steer     = raw_steer            if raw_steer != 0   (request <- raw_steer)
//             = request              otherwise           (request kept)
//   brake     = request.brake                            (request <- 0)
//
//   motor     = throttle if |v| < max_speed else 0       (every wheel)
//   brake_tq  = brake_gain * brake                       (every wheel)
//   steer     -> front wheels only
// ==============================================================================

use crate::config::CarConfig;

/// Programmatic request channel. Also mirrors human input so a reader sees
/// what was actually applied.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlRequest {
    pub torque: f32,    // unscaled, multiplied by max_torque when applied
    pub steering: f32,  // degrees
    pub brake: f32,     // 0..1
}

/// Raw human axes, -1..1.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HumanInput {
    pub vertical: f32,
    pub horizontal: f32,
}

impl HumanInput {
    pub fn new(vertical: f32, horizontal: f32) -> Self {
        Self { vertical, horizontal }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelCommand {
    pub steer_angle: Option<f32>, // None => wheel is not steered
    pub motor_torque: f32,
    pub brake_torque: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActuationCommand {
    pub throttle: f32,      // before the speed cut
    pub steer_angle: f32,   // degrees
    pub brake: f32,         // consumed brake request
    pub human_accel: f32,   // scaled human axes, kept for logging
    pub human_steer: f32,
    pub wheels: Vec<WheelCommand>,
}

/// Gains the arbiter needs, lifted out of [`CarConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ArbiterGains {
    pub max_torque: f32,
    pub human_steering_max: f32,
    pub max_speed: f32,
    pub brake_gain: f32,
    pub front_wheels: [usize; 2],
}

impl From<&CarConfig> for ArbiterGains {
    fn from(c: &CarConfig) -> Self {
        Self {
            max_torque: c.max_torque,
            human_steering_max: c.human_steering_max,
            max_speed: c.max_speed,
            brake_gain: c.brake_gain,
            front_wheels: c.front_wheels,
        }
    }
}

/// One fixed tick of control arbitration. Mutates `request` in place.
///
/// `wheel_count` must be non-zero and cover `front_wheels`; the car checks
/// both at attach time.
pub fn arbitrate(
    human: HumanInput,
    request: &mut ControlRequest,
    speed: f32,
    wheel_count: usize,
    gains: &ArbiterGains,
) -> ActuationCommand {
    debug_assert!(wheel_count > 0);

    let accel = human.vertical * gains.max_torque;
    let steer = human.horizontal * gains.human_steering_max;

    let throttle = if accel == 0.0 {
        let t = request.torque * gains.max_torque;
        request.torque = 0.0;
        t
    } else {
        request.torque = accel;
        accel
    };

    let steer_angle = if steer == 0.0 {
        request.steering
    } else {
        request.steering = steer;
        steer
    };

    let brake = request.brake;
    request.brake = 0.0;

    // hard cut, evaluated once for the whole car
    let motor_torque = if speed < gains.max_speed { throttle } else { 0.0 };
    let brake_torque = gains.brake_gain * brake;

    let wheels = (0..wheel_count)
        .map(|i| WheelCommand {
            steer_angle: gains.front_wheels.contains(&i).then_some(steer_angle),
            motor_torque,
            brake_torque,
        })
        .collect();

    ActuationCommand {
        throttle,
        steer_angle,
        brake,
        human_accel: accel,
        human_steer: steer,
        wheels,
    }
}
