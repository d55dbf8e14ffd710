use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::events::{Frame, HelloData, Opcode, ReadyData};
use super::session::SharedSession;
use super::sink::EventSink;
use crate::error::GatewayError;

/// What the session loop must do after a frame has been routed.
#[derive(Debug)]
pub enum Action {
    None,
    /// HELLO processed: start the heartbeat and send IDENTIFY or RESUME.
    StartHeartbeat(Duration),
    /// The server asked for a heartbeat right now.
    HeartbeatNow,
    /// READY or RESUMED observed.
    Established,
    /// Close the connection and reconnect.
    Close(GatewayError),
}

/// Routes inbound frames by opcode, updating the session and forwarding
/// dispatch events to the sink.
pub struct OpcodeDispatcher {
    session: SharedSession,
    sink: Arc<dyn EventSink>,
}

impl OpcodeDispatcher {
    pub fn new(session: SharedSession, sink: Arc<dyn EventSink>) -> Self {
        Self { session, sink }
    }

    pub fn handle(&self, frame: Frame) -> Action {
        match frame.op {
            Opcode::Dispatch => self.handle_dispatch(frame),
            Opcode::Hello => self.handle_hello(&frame.data),
            Opcode::HeartbeatAck => {
                self.session.lock().acknowledge_heartbeat();
                tracing::trace!("heartbeat acknowledged");
                Action::None
            }
            Opcode::Heartbeat => {
                tracing::debug!("server requested a heartbeat");
                Action::HeartbeatNow
            }
            Opcode::Reconnect => {
                tracing::warn!("received reconnect payload");
                self.session.lock().apply_reconnect();
                Action::Close(GatewayError::ReconnectRequested)
            }
            Opcode::InvalidSession => {
                let resumable = frame.data.as_bool().unwrap_or(false);
                tracing::warn!(resumable, "received invalid session payload");
                self.session.lock().apply_invalid_session(resumable);
                Action::Close(GatewayError::InvalidSession { resumable })
            }
            Opcode::Identify | Opcode::Resume => {
                let op = u8::from(frame.op);
                tracing::warn!(op, "ignoring client-only opcode from server");
                Action::None
            }
            Opcode::Unknown(op) => {
                tracing::debug!(op, "ignoring unknown opcode");
                Action::None
            }
        }
    }

    fn handle_hello(&self, data: &Value) -> Action {
        let hello = match HelloData::deserialize(data) {
            Ok(hello) if hello.heartbeat_interval > 0 => hello,
            Ok(_) => {
                return Action::Close(GatewayError::InvalidHello(
                    "heartbeat_interval must be positive".into(),
                ))
            }
            Err(e) => return Action::Close(GatewayError::InvalidHello(e.to_string())),
        };
        let interval = Duration::from_millis(hello.heartbeat_interval);
        tracing::debug!(interval_ms = hello.heartbeat_interval, "received hello payload");
        self.session.lock().apply_hello(interval);
        Action::StartHeartbeat(interval)
    }

    fn handle_dispatch(&self, frame: Frame) -> Action {
        let Some(event_type) = frame.event_type else {
            tracing::warn!(seq = ?frame.sequence, "dropping dispatch frame without event type");
            return Action::None;
        };

        let action = {
            let mut session = self.session.lock();
            match event_type.as_str() {
                "READY" => match ReadyData::deserialize(&frame.data) {
                    Ok(ready) => {
                        tracing::info!(
                            user_id = %ready.user.id,
                            session_id = %ready.session_id,
                            "successfully logged in"
                        );
                        session.apply_ready(
                            ready.session_id,
                            ready.user.id,
                            ready.resume_gateway_url,
                            frame.sequence,
                        );
                        Action::Established
                    }
                    Err(e) => {
                        tracing::warn!("READY payload is missing session fields: {e}");
                        if let Some(seq) = frame.sequence {
                            session.record_sequence(seq);
                        }
                        Action::None
                    }
                },
                "RESUMED" => {
                    if let Some(seq) = frame.sequence {
                        session.record_sequence(seq);
                    }
                    session.apply_resumed();
                    tracing::info!("successfully resumed");
                    Action::Established
                }
                _ => {
                    if let Some(seq) = frame.sequence {
                        session.record_sequence(seq);
                    }
                    Action::None
                }
            }
        };

        self.sink.on_event(&event_type, frame.data);
        action
    }
}
