// src/config.rs

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CarError;

/// Above this a tick period rounds to a zero `Duration`.
pub const MAX_TICK_HZ: f32 = 10_000.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub car: CarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,        // websocket listen address
    pub fixed_hz: f32,       // physics tick rate
    pub render_hz: f32,      // visual sync + telemetry rate
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9001".to_string(),
            fixed_hz: 60.0,
            render_hz: 30.0,
        }
    }
}

impl ServerConfig {
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.fixed_hz
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelConfig {
    pub offset: [f32; 3],              // chassis local space
    pub radius: f32,                   // meters
    pub suspension_rest_length: f32,   // meters
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarConfig {
    // --- Control law ---
    pub max_torque: f32,               // throttle scale (request and human axis)
    pub max_speed: f32,                // m/s, motor torque cut above this
    pub human_steering_max: f32,       // degrees at full human stick
    pub brake_gain: f32,               // brake torque per unit brake request
    pub pose_force_ticks: u32,         // fixed ticks a forced pose is reasserted
    pub front_wheels: [usize; 2],      // steered wheel indices

    // --- Chassis ---
    pub mass: f32,                     // kg
    pub chassis_half_extents: [f32; 3],
    pub center_of_mass: Option<[f32; 3]>, // local override, None keeps the collider's
    pub spawn_position: [f32; 3],
    pub linear_damping: f32,
    pub angular_damping: f32,

    // --- Suspension (raycast wheels, scaled by chassis mass) ---
    pub suspension_stiffness: f32,
    pub suspension_damping: f32,

    // --- Wheels, index order matters: front_wheels points into this list ---
    pub wheels: Vec<WheelConfig>,
}

impl Default for CarConfig {
    fn default() -> Self {
        let wheel = |x: f32, z: f32| WheelConfig {
            offset: [x, -0.05, z],
            radius: 0.06,
            suspension_rest_length: 0.08,
        };

        Self {
            max_torque: 50.0,
            max_speed: 10.0,
            human_steering_max: 15.0,
            brake_gain: 400.0,
            pose_force_ticks: 10,
            front_wheels: [2, 3],

            mass: 3.0,
            chassis_half_extents: [0.12, 0.05, 0.25], // donkey-car sized
            center_of_mass: Some([0.0, -0.05, 0.0]),   // low, keeps it on its wheels
            spawn_position: [0.0, 0.5, 0.0],
            linear_damping: 0.05,
            angular_damping: 0.5,

            suspension_stiffness: 80.0,
            suspension_damping: 10.0,

            wheels: vec![
                wheel(-0.1, -0.17), // RL
                wheel(0.1, -0.17),  // RR
                wheel(-0.1, 0.17),  // FL
                wheel(0.1, 0.17),   // FR
            ],
        }
    }
}

impl CarConfig {
    /// Checks the wheel layout against the steered indices.
    pub fn validate(&self) -> Result<(), CarError> {
        if self.wheels.is_empty() {
            return Err(CarError::NoWheels);
        }
        for &index in &self.front_wheels {
            if index >= self.wheels.len() {
                return Err(CarError::FrontWheelOutOfRange {
                    index,
                    wheels: self.wheels.len(),
                });
            }
        }
        if !(self.max_speed > 0.0) {
            return Err(CarError::invalid("max_speed must be positive"));
        }
        if !(self.mass > 0.0) {
            return Err(CarError::invalid("mass must be positive"));
        }
        Ok(())
    }
}

impl Config {
    /// Loads a config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, CarError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| CarError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str::<Config>(&text).map_err(|source| CarError::ConfigParse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Config::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CarError> {
        for (name, hz) in [("fixed_hz", self.server.fixed_hz), ("render_hz", self.server.render_hz)] {
            if !(hz > 0.0 && hz <= MAX_TICK_HZ) {
                return Err(CarError::invalid(format!("{name} must be in (0, {MAX_TICK_HZ}], got {hz}")));
            }
        }
        self.car.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_car() {
        let c = CarConfig::default();
        assert_eq!(c.max_torque, 50.0);
        assert_eq!(c.max_speed, 10.0);
        assert_eq!(c.human_steering_max, 15.0);
        assert_eq!(c.brake_gain, 400.0);
        assert_eq!(c.pose_force_ticks, 10);
        assert_eq!(c.front_wheels, [2, 3]);
        assert_eq!(c.wheels.len(), 4);
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn empty_wheel_list_is_rejected() {
        let mut c = CarConfig::default();
        c.wheels.clear();
        assert!(matches!(c.validate(), Err(CarError::NoWheels)));
    }

    #[test]
    fn front_index_must_name_a_wheel() {
        let mut c = CarConfig::default();
        c.wheels.truncate(3);
        assert!(matches!(
            c.validate(),
            Err(CarError::FrontWheelOutOfRange { index: 3, wheels: 3 })
        ));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "server": { "fixed_hz": 50 }, "car": { "max_speed": 4.5 } }"#;
        let c: Config = serde_json::from_str(json).unwrap();
        assert_eq!(c.server.fixed_hz, 50.0);
        assert_eq!(c.server.render_hz, 30.0);
        assert_eq!(c.car.max_speed, 4.5);
        assert_eq!(c.car.max_torque, 50.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let mut c = Config::default();
        c.server.render_hz = 0.0;
        assert!(matches!(c.validate(), Err(CarError::InvalidConfig(_))));
    }

    #[test]
    fn oversized_tick_rate_is_rejected() {
        let mut c = Config::default();
        c.server.fixed_hz = 1e12;
        assert!(matches!(c.validate(), Err(CarError::InvalidConfig(_))));

        let mut c = Config::default();
        c.server.render_hz = f32::INFINITY;
        assert!(matches!(c.validate(), Err(CarError::InvalidConfig(_))));

        let mut c = Config::default();
        c.server.fixed_hz = MAX_TICK_HZ;
        assert!(c.validate().is_ok());
        assert!(std::time::Duration::from_secs_f32(c.server.fixed_dt()) > std::time::Duration::ZERO);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(Some(Path::new("/nonexistent/sdsim.json"))).unwrap_err();
        assert!(matches!(err, CarError::ConfigRead { .. }));
        assert!(err.to_string().contains("/nonexistent/sdsim.json"));
    }
}
