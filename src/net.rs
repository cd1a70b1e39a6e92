use std::sync::Arc;
use futures::{SinkExt, StreamExt};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::Message;
use uuid::Uuid;

use crate::car::VehicleControl;
use crate::state::SharedGameState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Held human axes, -1..1.
    Input {
        #[serde(default)]
        throttle: f32,
        #[serde(default)]
        steer: f32,
    },
    /// Programmatic request, applied as steering, throttle, then brake.
    Control {
        #[serde(default)]
        steering: f32,
        #[serde(default)]
        throttle: f32,
        #[serde(default)]
        brake: f32,
    },
    HandBrake {
        #[serde(default)]
        value: f32,
    },
    Save,
    Reset,
    SetPose {
        position: [f32; 3],
        #[serde(default = "identity_xyzw")]
        rotation: [f32; 4], // x y z w
    },
    Flip,
    Ping,
}

fn identity_xyzw() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl ClientMessage {
    pub fn from_json(txt: &str) -> Option<Self> {
        serde_json::from_str(txt).ok()
    }
}

/// Applies one client message. Returns a reply for the sender, if any.
pub fn handle_message(game: &mut SharedGameState, client: Uuid, msg: ClientMessage) -> Option<String> {
    match msg {
        ClientMessage::Input { throttle, steer } => {
            game.update_human(client, throttle, steer);
        }
        ClientMessage::Control { steering, throttle, brake } => {
            // throttle clears brake, so brake goes last
            game.car.request_steering(steering);
            game.car.request_throttle(throttle);
            game.car.request_foot_brake(brake);
        }
        ClientMessage::HandBrake { value } => {
            game.car.request_hand_brake(value);
        }
        ClientMessage::Save => {
            game.car.save_pos_rot();
        }
        ClientMessage::Reset => {
            game.car.restore_pos_rot();
        }
        ClientMessage::SetPose { position, rotation } => {
            let [x, y, z, w] = rotation;
            let position = Vector3::from(position);
            let rot = UnitQuaternion::try_new(Quaternion::new(w, x, y, z), f32::EPSILON);

            match rot {
                Some(rot) if position.iter().all(|c| c.is_finite()) => {
                    game.car.set_pose(position, rot);
                }
                _ => {
                    debug!("ignoring set_pose from {client}: position {:?}, rotation {:?}", position, rotation);
                }
            }
        }
        ClientMessage::Flip => {
            game.car.flip_upright();
        }
        ClientMessage::Ping => {
            return Some(r#"{"type":"pong"}"#.to_string());
        }
    }
    None
}

pub async fn start_websocket_server(listener: TcpListener, state: Arc<Mutex<SharedGameState>>) {
    if let Ok(addr) = listener.local_addr() {
        info!("🌐 WebSocket listening on ws://{}", addr);
    }

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        tokio::spawn(handle_client(raw, Arc::clone(&state), peer.to_string()));
    }
}

async fn handle_client(raw: TcpStream, state: Arc<Mutex<SharedGameState>>, peer: String) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("websocket handshake with {peer} failed: {e}");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Outgoing channel + registration
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let client_id = state.lock().await.register_client(tx.clone());

    info!("🟢 Client connected: {} ({})", client_id, peer);

    // -------------------------------
    // 2) Send loop
    // -------------------------------
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let welcome = format!(r#"{{"type":"welcome","client_id":"{}"}}"#, client_id);
    let _ = tx.send(welcome);

    // -------------------------------
    // 3) Receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };

        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        let Some(parsed) = ClientMessage::from_json(&text) else {
            debug!("ignoring message from {client_id}: {text}");
            continue;
        };

        let reply = {
            let mut game = state.lock().await;
            handle_message(&mut game, client_id, parsed)
        };

        if let Some(reply) = reply {
            let _ = tx.send(reply);
        }
    }

    info!("🔴 Client disconnected: {}", client_id);
    state.lock().await.remove_client(&client_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use approx::assert_relative_eq;

    fn state() -> SharedGameState {
        SharedGameState::new(&Config::default()).unwrap()
    }

    #[test]
    fn parses_tagged_messages() {
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"input","throttle":0.5}"#),
            Some(ClientMessage::Input { throttle: 0.5, steer: 0.0 })
        );
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"control","steering":-3,"throttle":0.2,"brake":0}"#),
            Some(ClientMessage::Control { steering: -3.0, throttle: 0.2, brake: 0.0 })
        );
        assert_eq!(ClientMessage::from_json(r#"{"type":"ping"}"#), Some(ClientMessage::Ping));
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"set_pose","position":[1,2,3]}"#),
            Some(ClientMessage::SetPose { position: [1.0, 2.0, 3.0], rotation: [0.0, 0.0, 0.0, 1.0] })
        );
    }

    #[test]
    fn rejects_unknown_or_malformed() {
        assert_eq!(ClientMessage::from_json(r#"{"type":"teleport"}"#), None);
        assert_eq!(ClientMessage::from_json("not json"), None);
        assert_eq!(ClientMessage::from_json(r#"{"type":"set_pose"}"#), None);
    }

    #[test]
    fn control_message_keeps_brake() {
        let mut game = state();
        let msg = ClientMessage::Control { steering: 5.0, throttle: 0.3, brake: 0.7 };

        assert_eq!(handle_message(&mut game, Uuid::new_v4(), msg), None);

        assert_eq!(game.car.steering(), 5.0);
        assert_eq!(game.car.throttle(), 0.3);
        assert_eq!(game.car.foot_brake(), 0.7);
    }

    #[test]
    fn ping_gets_pong() {
        let mut game = state();
        let reply = handle_message(&mut game, Uuid::new_v4(), ClientMessage::Ping);
        assert_eq!(reply.as_deref(), Some(r#"{"type":"pong"}"#));
    }

    #[test]
    fn set_pose_then_reset_restores_checkpoint() {
        let mut game = state();
        let id = Uuid::new_v4();
        let start = game.car.saved_pose().position;

        handle_message(&mut game, id, ClientMessage::SetPose {
            position: [4.0, 1.0, 4.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
        });
        assert_relative_eq!(game.car.transform().position, Vector3::new(4.0, 1.0, 4.0));

        handle_message(&mut game, id, ClientMessage::Reset);
        assert_relative_eq!(game.car.transform().position, start);
        assert!(game.car.is_forcing_pose());
    }

    #[test]
    fn degenerate_set_pose_is_ignored() {
        let mut game = state();
        let id = Uuid::new_v4();
        let before = game.car.transform();

        handle_message(&mut game, id, ClientMessage::SetPose {
            position: [1.0, 0.5, 1.0],
            rotation: [0.0, 0.0, 0.0, 0.0],
        });

        assert_eq!(game.car.transform(), before);
        assert!(!game.car.is_forcing_pose());

        for _ in 0..3 {
            game.fixed_tick();
        }
        let snap = game.snapshot();
        assert!(snap.orient.is_finite());
        assert!(snap.pose.rotation.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn non_finite_position_is_ignored() {
        let mut game = state();
        let before = game.car.transform();

        handle_message(&mut game, Uuid::new_v4(), ClientMessage::SetPose {
            position: [f32::NAN, 0.5, 1.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
        });

        assert_eq!(game.car.transform(), before);
        assert!(!game.car.is_forcing_pose());
    }

    #[test]
    fn input_message_sets_held_axes() {
        let mut game = state();
        let id = Uuid::new_v4();
        handle_message(&mut game, id, ClientMessage::Input { throttle: -0.4, steer: 0.9 });

        assert_eq!(game.human.vertical, -0.4);
        assert_eq!(game.human.horizontal, 0.9);
        assert_eq!(game.human_owner, Some(id));
    }
}
