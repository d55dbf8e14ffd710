use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;
use crate::gateway::transport::TransportError;
use crate::pasta::PastaError;

/// Why a gateway connection ended. Every variant is recoverable: the session
/// loop logs it and reconnects.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("connection closed by remote (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },
    #[error("expected HELLO as the first frame, got opcode {opcode}")]
    ProtocolViolation { opcode: u8 },
    #[error("invalid HELLO payload: {0}")]
    InvalidHello(String),
    #[error("no HELLO received within {0:?}")]
    HelloTimeout(Duration),
    #[error("previous heartbeat was never acknowledged")]
    Zombie,
    #[error("server requested a reconnect")]
    ReconnectRequested,
    #[error("session invalidated (resumable: {resumable})")]
    InvalidSession { resumable: bool },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOKEN is required")]
    MissingToken,
    #[error("unknown intent '{0}'")]
    UnknownIntent(String),
    #[error("could not determine the home directory for the pastas file")]
    NoHomeDir,
}

/// Failures that stop the process before the gateway starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("token check failed: {0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Pasta(#[from] PastaError),
}
