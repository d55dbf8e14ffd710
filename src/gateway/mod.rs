pub mod backoff;
pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod intents;
pub mod session;
pub mod sink;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use backoff::{Backoff, BackoffConfig};
use dispatcher::{Action, OpcodeDispatcher};
use events::{close_code, Frame, IdentifyData, Opcode, ResumeData};
use heartbeat::HeartbeatTimer;
use session::{Handshake, SessionState, SharedSession};
use sink::EventSink;
use transport::{CloseInfo, Connection, FrameSink, FrameStream, Incoming, Transport};

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
pub const DEFAULT_HELLO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub token: String,
    pub intents: u64,
    pub hello_timeout: Duration,
    pub backoff: BackoffConfig,
}

/// Lifecycle of the current connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Resuming,
    Active,
}

enum Attempt {
    Shutdown,
    Ended {
        established: bool,
        error: GatewayError,
    },
}

/// Per-connection resources, replaced on every reconnect.
struct Link {
    outbound: mpsc::UnboundedSender<String>,
    zombie: CancellationToken,
    heartbeat: Option<HeartbeatTimer>,
    established: bool,
}

/// Persistent gateway client: connects, identifies or resumes, keeps the
/// connection alive and reconnects until `shutdown` is cancelled.
pub struct GatewaySession<T: Transport> {
    config: GatewayConfig,
    transport: T,
    session: SharedSession,
    dispatcher: OpcodeDispatcher,
    shutdown: CancellationToken,
    state: watch::Sender<ConnectionState>,
}

impl<T: Transport> GatewaySession<T> {
    pub fn new(
        config: GatewayConfig,
        transport: T,
        sink: Arc<dyn EventSink>,
        shutdown: CancellationToken,
    ) -> Self {
        let session = SessionState::shared();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            dispatcher: OpcodeDispatcher::new(session.clone(), sink),
            config,
            transport,
            session,
            shutdown,
            state,
        }
    }

    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Runs until the shutdown token is cancelled.
    pub async fn run(mut self) {
        let mut backoff = Backoff::new(self.config.backoff.clone());

        loop {
            let delay = backoff.next_delay();
            if !delay.is_zero() {
                tracing::info!("reconnecting in {delay:?}");
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = time::sleep(delay) => {}
                }
            }
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.connect_once().await {
                Attempt::Shutdown => break,
                Attempt::Ended { established, error } => {
                    tracing::warn!("disconnected: {error}");
                    if established {
                        backoff.reset();
                    }
                    if self.session.lock().resumable {
                        tracing::warn!("able to resume, reconnecting");
                    } else {
                        tracing::warn!("unable to resume, will identify on next connection");
                    }
                }
            }
            self.set_state(ConnectionState::Disconnected);
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("gateway session shut down");
    }

    async fn connect_once(&mut self) -> Attempt {
        self.set_state(ConnectionState::Connecting);
        let url = self.connect_url();

        let connection = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Attempt::Shutdown,
            result = self.transport.connect(&url) => match result {
                Ok(connection) => connection,
                Err(e) => {
                    return Attempt::Ended {
                        established: false,
                        error: e.into(),
                    }
                }
            },
        };
        tracing::info!(%url, "connected");

        let Connection { sink, mut stream } = connection;
        let (outbound, rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(write_loop(sink, rx));
        let mut link = Link {
            outbound,
            zombie: CancellationToken::new(),
            heartbeat: None,
            established: false,
        };

        let end = self.read_loop(stream.as_mut(), &mut link).await;

        // Heartbeat must be joined before the socket closes.
        let Link {
            outbound,
            heartbeat,
            established,
            ..
        } = link;
        if let Some(heartbeat) = heartbeat {
            heartbeat.stop().await;
        }
        drop(outbound);
        if let Err(e) = writer.await {
            tracing::warn!("writer task failed: {e}");
        }

        match end {
            Some(error) => Attempt::Ended { established, error },
            None => Attempt::Shutdown,
        }
    }

    /// Returns `None` on shutdown, otherwise the reason the connection ended.
    async fn read_loop(
        &mut self,
        stream: &mut dyn FrameStream,
        link: &mut Link,
    ) -> Option<GatewayError> {
        self.set_state(ConnectionState::AwaitingHello);
        let hello_deadline = time::sleep(self.config.hello_timeout);
        tokio::pin!(hello_deadline);

        loop {
            let incoming = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return None,
                _ = link.zombie.cancelled() => return Some(GatewayError::Zombie),
                _ = &mut hello_deadline, if link.heartbeat.is_none() => {
                    return Some(GatewayError::HelloTimeout(self.config.hello_timeout));
                }
                incoming = stream.next_frame() => incoming,
            };

            let text = match incoming {
                Incoming::Text(text) => text,
                Incoming::Closed(close) => return Some(self.handle_close(close)),
                Incoming::Error(e) => return Some(e.into()),
            };

            let frame = match Frame::decode(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("dropping malformed frame: {e}");
                    continue;
                }
            };

            if link.heartbeat.is_none() && frame.op != Opcode::Hello {
                return Some(GatewayError::ProtocolViolation {
                    opcode: frame.op.into(),
                });
            }

            match self.dispatcher.handle(frame) {
                Action::None => {}
                Action::StartHeartbeat(interval) => {
                    if link.heartbeat.is_some() {
                        tracing::warn!("ignoring repeated hello on an open connection");
                        continue;
                    }
                    link.heartbeat = Some(HeartbeatTimer::start(
                        interval,
                        self.session.clone(),
                        link.outbound.clone(),
                        link.zombie.clone(),
                    ));
                    self.send_handshake(&link.outbound);
                }
                Action::HeartbeatNow => {
                    let sequence = self.session.lock().sequence;
                    if link.outbound.send(Frame::heartbeat(sequence).encode()).is_err() {
                        tracing::warn!("writer closed before the requested heartbeat was sent");
                    }
                }
                Action::Established => {
                    link.established = true;
                    self.set_state(ConnectionState::Active);
                }
                Action::Close(error) => return Some(error),
            }
        }
    }

    fn send_handshake(&mut self, outbound: &mpsc::UnboundedSender<String>) {
        let handshake = self.session.lock().handshake();
        let frame = match handshake {
            Handshake::Resume {
                session_id,
                sequence,
            } => {
                self.set_state(ConnectionState::Resuming);
                tracing::debug!(%session_id, ?sequence, "sent resume payload");
                Frame::resume(&ResumeData {
                    token: self.config.token.clone(),
                    session_id,
                    seq: sequence,
                })
            }
            Handshake::Identify => {
                self.set_state(ConnectionState::Identifying);
                tracing::debug!("sent identify payload");
                Frame::identify(&IdentifyData::new(&self.config.token, self.config.intents))
            }
        };
        if outbound.send(frame.encode()).is_err() {
            tracing::warn!("writer closed before the handshake was sent");
        }
    }

    fn handle_close(&self, close: Option<CloseInfo>) -> GatewayError {
        let Some(close) = close else {
            return GatewayError::Closed {
                code: None,
                reason: String::new(),
            };
        };
        if let Some(hint) = close_code::config_hint(close.code) {
            tracing::error!(code = close.code, "gateway closed the connection: {hint}");
        }
        if !close_code::allows_resume(close.code) {
            self.session.lock().apply_invalid_session(false);
        }
        GatewayError::Closed {
            code: Some(close.code),
            reason: close.reason,
        }
    }

    /// Resumes go to the URL handed out in READY when there is one.
    fn connect_url(&self) -> String {
        let session = self.session.lock();
        match (&session.resume_url, session.resumable) {
            (Some(resume_url), true) => match self.config.url.split_once('?') {
                Some((_, query)) => format!("{}/?{query}", resume_url.trim_end_matches('/')),
                None => resume_url.clone(),
            },
            _ => self.config.url.clone(),
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "gateway state");
        }
    }
}

/// Sole writer for one socket. Closes it once every sender is gone.
async fn write_loop(mut sink: Box<dyn FrameSink>, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        if let Err(e) = sink.send(text).await {
            tracing::warn!("failed to send frame: {e}");
            break;
        }
    }
    if let Err(e) = sink.close().await {
        tracing::debug!("close after disconnect: {e}");
    }
}
