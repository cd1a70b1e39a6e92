use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use uuid::Uuid;

use crate::car::{Car, HumanInput, VehicleControl};
use crate::config::Config;
use crate::error::CarError;
use crate::physics::PhysicsWorld;
use crate::rig::Pose;

#[inline] fn v3(v: nalgebra::Vector3<f32>) -> [f32; 3] { [v.x, v.y, v.z] }
#[inline] fn q4(q: nalgebra::UnitQuaternion<f32>) -> [f32; 4] { [q.i, q.j, q.k, q.w] }

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PoseSnapshot {
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion, x y z w
}

impl From<Pose> for PoseSnapshot {
    fn from(p: Pose) -> Self {
        Self {
            position: v3(p.position),
            rotation: q4(p.rotation),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub tick: u64,
    pub steering: f32,
    pub throttle: f32,
    pub brake: f32,
    pub hand_brake: f32,
    pub speed: f32,
    pub forward_speed: f32,
    pub pose: PoseSnapshot,
    pub velocity: [f32; 3],
    pub accel: [f32; 3],
    pub orient: f32,
    pub still: bool,
    pub human_accel: f32, // scaled, last tick
    pub human_steer: f32,
    pub wheels: Vec<PoseSnapshot>,
}

/// Everything the run loop and the websocket tasks share. Both ticks and
/// every network mutation go through the one mutex around this.
pub struct SharedGameState {
    pub tick: u64,
    pub clients: HashMap<Uuid, UnboundedSender<String>>,
    pub human: HumanInput,              // held human axes, polled each fixed tick
    pub human_owner: Option<Uuid>,      // client that last moved the axes
    pub car: Car<PhysicsWorld>,
    dt: f32,
}

impl SharedGameState {
    pub fn new(config: &Config) -> Result<Self, CarError> {
        let world = PhysicsWorld::new(&config.car)?;
        let car = Car::attach(world, config.car.clone())?;

        Ok(Self {
            tick: 0,
            clients: HashMap::new(),
            human: HumanInput::default(),
            human_owner: None,
            car,
            dt: config.server.fixed_dt(),
        })
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.clients.insert(id, tx);
        id
    }

    pub fn remove_client(&mut self, id: &Uuid) {
        self.clients.remove(id);
        if self.human_owner == Some(*id) {
            self.human = HumanInput::default();
            self.human_owner = None;
            info!("🕹️ Human driver {} left, axes released", id);
        }
    }

    /// Stores held human axes, clamped to the stick range.
    pub fn update_human(&mut self, id: Uuid, throttle: f32, steer: f32) {
        self.human = HumanInput::new(throttle.clamp(-1.0, 1.0), steer.clamp(-1.0, 1.0));
        self.human_owner = Some(id);
    }

    // --------------------------------------------------------------
    // fixed tick: control -> physics -> pose forcing
    // --------------------------------------------------------------
    pub fn fixed_tick(&mut self) {
        self.car.fixed_update(self.human);
        self.car.rig_mut().step(self.dt);
        self.car.after_step();
        self.tick += 1;
    }

    // --------------------------------------------------------------
    // render tick: visual sync + telemetry out
    // --------------------------------------------------------------
    pub fn render_tick(&mut self) {
        self.car.update_visuals();
        self.broadcast_snapshot();
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let car = &self.car;
        let velocity = car.velocity();
        let human = car.last_human();

        TelemetrySnapshot {
            msg_type: "telemetry",
            tick: self.tick,
            steering: car.steering(),
            throttle: car.throttle(),
            brake: car.foot_brake(),
            hand_brake: car.hand_brake(),
            speed: velocity.norm(),
            forward_speed: car.rig().forward_speed(),
            pose: car.transform().into(),
            velocity: v3(velocity),
            accel: v3(car.accel()),
            orient: car.orient(),
            still: car.is_still(),
            human_accel: human.vertical,
            human_steer: human.horizontal,
            wheels: car.wheel_visuals().iter().map(|&p| p.into()).collect(),
        }
    }

    /// Build and send a snapshot to all clients.
    pub fn broadcast_snapshot(&mut self) {
        if self.clients.is_empty() {
            return;
        }

        let json = match serde_json::to_string(&self.snapshot()) {
            Ok(json) => json,
            Err(e) => {
                debug!("snapshot serialization failed: {e}");
                return;
            }
        };

        // drop clients whose send loop has gone away
        self.clients.retain(|_, tx| tx.send(json.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn state() -> SharedGameState {
        SharedGameState::new(&Config::default()).unwrap()
    }

    #[test]
    fn fixed_tick_advances_and_consumes_requests() {
        let mut s = state();
        s.car.request_throttle(0.5);
        s.car.request_foot_brake(1.0);

        s.fixed_tick();

        assert_eq!(s.tick, 1);
        assert_eq!(s.car.throttle(), 0.0);
        assert_eq!(s.car.foot_brake(), 0.0);
        assert_eq!(s.car.last_command().brake, 1.0);
    }

    #[test]
    fn human_axes_are_clamped_and_released_on_disconnect() {
        let mut s = state();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = s.register_client(tx);

        s.update_human(id, 3.0, -0.25);
        assert_eq!(s.human, HumanInput::new(1.0, -0.25));

        s.remove_client(&id);
        assert_eq!(s.human, HumanInput::default());
        assert!(s.clients.is_empty());
    }

    #[test]
    fn other_client_leaving_keeps_axes() {
        let mut s = state();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let a = s.register_client(tx_a);
        let b = s.register_client(tx_b);

        s.update_human(a, 0.5, 0.0);
        s.remove_client(&b);
        assert_eq!(s.human, HumanInput::new(0.5, 0.0));
    }

    #[tokio::test]
    async fn render_tick_broadcasts_telemetry() {
        let mut s = state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        s.register_client(tx);

        s.fixed_tick();
        s.render_tick();

        let msg = rx.recv().await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["type"], "telemetry");
        assert_eq!(v["tick"], 1);
        assert_eq!(v["wheels"].as_array().unwrap().len(), 4);
        assert_eq!(v["pose"]["rotation"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn closed_clients_are_pruned() {
        let mut s = state();
        let (tx, rx) = mpsc::unbounded_channel();
        s.register_client(tx);
        drop(rx);

        s.broadcast_snapshot();
        assert!(s.clients.is_empty());
    }
}
