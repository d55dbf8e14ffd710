use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Opcode {
    Dispatch,
    Heartbeat,
    Identify,
    Resume,
    Reconnect,
    InvalidSession,
    Hello,
    HeartbeatAck,
    Unknown(u8),
}

impl From<u8> for Opcode {
    fn from(op: u8) -> Self {
        match op {
            0 => Opcode::Dispatch,
            1 => Opcode::Heartbeat,
            2 => Opcode::Identify,
            6 => Opcode::Resume,
            7 => Opcode::Reconnect,
            9 => Opcode::InvalidSession,
            10 => Opcode::Hello,
            11 => Opcode::HeartbeatAck,
            other => Opcode::Unknown(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        match op {
            Opcode::Dispatch => 0,
            Opcode::Heartbeat => 1,
            Opcode::Identify => 2,
            Opcode::Resume => 6,
            Opcode::Reconnect => 7,
            Opcode::InvalidSession => 9,
            Opcode::Hello => 10,
            Opcode::HeartbeatAck => 11,
            Opcode::Unknown(other) => other,
        }
    }
}

/// Close codes with special handling on the client side.
pub mod close_code {
    pub const AUTH_FAILED: u16 = 4004;
    pub const INVALID_SEQ: u16 = 4007;
    pub const SESSION_TIMED_OUT: u16 = 4009;
    pub const INVALID_VERSION: u16 = 4012;
    pub const INVALID_INTENT: u16 = 4013;
    pub const DISALLOWED_INTENT: u16 = 4014;

    /// Whether a session closed with `code` can still be resumed.
    pub fn allows_resume(code: u16) -> bool {
        !matches!(code, INVALID_SEQ | SESSION_TIMED_OUT)
    }

    /// Codes that point at local configuration rather than a network fault.
    pub fn config_hint(code: u16) -> Option<&'static str> {
        match code {
            AUTH_FAILED => Some("the gateway rejected TOKEN"),
            INVALID_VERSION => Some("unsupported gateway version in the URL"),
            INVALID_INTENT => Some("PASTABOT_INTENTS has an invalid bit"),
            DISALLOWED_INTENT => Some("PASTABOT_INTENTS has a disallowed intent"),
            _ => None,
        }
    }
}

/// Gateway message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub op: Opcode,
    #[serde(rename = "d", default)]
    pub data: Value,
    #[serde(rename = "s", default)]
    pub sequence: Option<u64>,
    #[serde(rename = "t", default)]
    pub event_type: Option<String>,
}

impl Frame {
    pub fn new(op: Opcode, data: Value) -> Self {
        Self {
            op,
            data,
            sequence: None,
            event_type: None,
        }
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// `s` and `t` are only written for dispatch frames.
    pub fn encode(&self) -> String {
        let mut json = serde_json::json!({
            "op": u8::from(self.op),
            "d": self.data,
        });
        if self.op == Opcode::Dispatch {
            json["s"] = serde_json::json!(self.sequence);
            json["t"] = serde_json::json!(self.event_type);
        }
        json.to_string()
    }

    /// Keep-alive carrying the last sequence number seen, or null.
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self::new(Opcode::Heartbeat, serde_json::json!(sequence))
    }

    pub fn identify(data: &IdentifyData) -> Self {
        Self::new(
            Opcode::Identify,
            serde_json::to_value(data).unwrap_or_default(),
        )
    }

    pub fn resume(data: &ResumeData) -> Self {
        Self::new(Opcode::Resume, serde_json::to_value(data).unwrap_or_default())
    }
}

/// HELLO (opcode 10) payload data.
#[derive(Debug, Deserialize)]
pub struct HelloData {
    pub heartbeat_interval: u64,
}

/// READY dispatch payload, only the fields the session keeps.
#[derive(Debug, Deserialize)]
pub struct ReadyData {
    pub session_id: String,
    pub user: ReadyUser,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReadyUser {
    pub id: String,
}

/// IDENTIFY payload data.
#[derive(Debug, Serialize)]
pub struct IdentifyData {
    pub token: String,
    pub properties: ConnectionProperties,
    pub intents: u64,
}

#[derive(Debug, Serialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl IdentifyData {
    pub fn new(token: &str, intents: u64) -> Self {
        Self {
            token: token.to_string(),
            properties: ConnectionProperties {
                os: std::env::consts::OS.to_string(),
                browser: env!("CARGO_PKG_NAME").to_string(),
                device: env!("CARGO_PKG_NAME").to_string(),
            },
            intents,
        }
    }
}

/// RESUME payload data.
#[derive(Debug, Serialize)]
pub struct ResumeData {
    pub token: String,
    pub session_id: String,
    pub seq: Option<u64>,
}
