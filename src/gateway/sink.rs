use serde_json::Value;
use tokio::sync::mpsc;

/// Receives every dispatch event, in the order the gateway delivered them.
///
/// Called from the read loop, so implementations must not block.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event_type: &str, data: Value);
}

/// A dispatch event handed off to another task.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    pub event_type: String,
    pub data: Value,
}

/// Forwards events into an unbounded channel so a consumer task can do slow
/// work without stalling the gateway.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event_type: &str, data: Value) {
        let event = GatewayEvent {
            event_type: event_type.to_string(),
            data,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(event_type, "event consumer gone, dropping event");
        }
    }
}
