//! sdsim-car - one simulated car: control arbitration, pose forcing and
//! telemetry over a rapier3d chassis, served to websocket clients.

pub mod car;
pub mod config;
pub mod error;
pub mod net;
pub mod physics;
pub mod rig;
pub mod state;

pub use car::{Car, VehicleControl};
pub use config::{CarConfig, Config, ServerConfig};
pub use error::CarError;
