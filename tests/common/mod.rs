#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use parking_lot::Mutex;
use pastabot::gateway::backoff::BackoffConfig;
use pastabot::gateway::sink::{ChannelSink, GatewayEvent};
use pastabot::gateway::transport::{
    Connection, FrameSink, FrameStream, Incoming, Transport, TransportError,
};
use pastabot::gateway::{intents, ConnectionState, GatewayConfig, GatewaySession};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const TOKEN: &str = "test-token";

/// What the client wrote to one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Wire {
    Text(String),
    Close,
}

/// The server side of one in-memory connection.
pub struct ServerEnd {
    pub url: String,
    to_client: Option<mpsc::UnboundedSender<Incoming>>,
    from_client: mpsc::UnboundedReceiver<Wire>,
}

impl ServerEnd {
    pub fn send(&self, frame: Value) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Incoming::Text(frame.to_string()));
        }
    }

    pub fn send_raw(&self, text: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Incoming::Text(text.to_string()));
        }
    }

    pub fn hello(&self, interval_ms: u64) {
        self.send(json!({ "op": 10, "d": { "heartbeat_interval": interval_ms } }));
    }

    pub fn dispatch(&self, seq: u64, event_type: &str, data: Value) {
        self.send(json!({ "op": 0, "s": seq, "t": event_type, "d": data }));
    }

    pub fn ready(&self, seq: u64, session_id: &str, user_id: &str) {
        self.dispatch(
            seq,
            "READY",
            json!({ "session_id": session_id, "user": { "id": user_id } }),
        );
    }

    pub fn ack(&self) {
        self.send(json!({ "op": 11 }));
    }

    /// Remote close: the client's next read sees the stream end.
    pub fn drop_connection(&mut self) {
        self.to_client = None;
    }

    /// Next frame written by the client, or `None` once it closed the socket.
    pub async fn recv(&mut self) -> Option<Value> {
        match self.from_client.recv().await? {
            Wire::Text(text) => {
                Some(serde_json::from_str(&text).expect("client sent invalid JSON"))
            }
            Wire::Close => None,
        }
    }

    /// Whatever the client already wrote, without waiting.
    pub fn pending(&mut self) -> Option<Wire> {
        self.from_client.try_recv().ok()
    }

    /// Everything still buffered or yet to be written until the writer exits.
    pub async fn drain(&mut self) -> Vec<Wire> {
        let mut wires = Vec::new();
        while let Some(wire) = self.from_client.recv().await {
            wires.push(wire);
        }
        wires
    }
}

/// In-memory transport; every `connect` hands a fresh [`ServerEnd`] to the test.
pub struct ScriptedTransport {
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

impl ScriptedTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        (Self { accepted }, rx)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = mpsc::unbounded_channel();
        self.accepted
            .send(ServerEnd {
                url: url.to_string(),
                to_client: Some(to_client),
                from_client,
            })
            .map_err(|_| TransportError::Closed)?;
        Ok(Connection {
            sink: Box::new(MemorySink { tx: client_tx }),
            stream: Box::new(MemoryStream { rx: client_rx }),
        })
    }
}

struct MemorySink {
    tx: mpsc::UnboundedSender<Wire>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.tx
            .send(Wire::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx.send(Wire::Close).map_err(|_| TransportError::Closed)
    }
}

struct MemoryStream {
    rx: mpsc::UnboundedReceiver<Incoming>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Incoming {
        self.rx.recv().await.unwrap_or(Incoming::Closed(None))
    }
}

pub fn gateway_config(url: &str) -> GatewayConfig {
    GatewayConfig {
        url: url.to_string(),
        token: TOKEN.to_string(),
        intents: intents::DEFAULT_INTENTS,
        hello_timeout: Duration::from_secs(30),
        backoff: BackoffConfig {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
        },
    }
}

/// A running gateway over the scripted transport.
pub struct Harness {
    pub connections: mpsc::UnboundedReceiver<ServerEnd>,
    pub events: mpsc::UnboundedReceiver<GatewayEvent>,
    pub session: pastabot::gateway::session::SharedSession,
    pub states: watch::Receiver<ConnectionState>,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<()>,
}

impl Harness {
    pub fn start() -> Self {
        let (transport, connections) = ScriptedTransport::new();
        let (sink, events) = ChannelSink::new();
        let shutdown = CancellationToken::new();
        let gateway = GatewaySession::new(
            gateway_config("wss://gateway.test/?v=10&encoding=json"),
            transport,
            Arc::new(sink),
            shutdown.clone(),
        );
        let session = gateway.session();
        let states = gateway.subscribe_state();
        let handle = tokio::spawn(gateway.run());
        Self {
            connections,
            events,
            session,
            states,
            shutdown,
            handle,
        }
    }

    pub async fn accept(&mut self) -> ServerEnd {
        self.connections
            .recv()
            .await
            .expect("gateway stopped connecting")
    }

    /// Accepts a connection, sends HELLO and returns the handshake frame.
    pub async fn accept_with_hello(&mut self, interval_ms: u64) -> (ServerEnd, Value) {
        let mut server = self.accept().await;
        server.hello(interval_ms);
        let handshake = server.recv().await.expect("no handshake after hello");
        (server, handshake)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.expect("gateway task panicked");
    }
}

/// A request the fake message API received.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Edit {
        channel_id: String,
        message_id: String,
        content: String,
    },
    Delete {
        channel_id: String,
        message_id: String,
    },
}

#[derive(Clone)]
struct ApiState {
    calls: Arc<Mutex<Vec<ApiCall>>>,
    premium_type: Option<u8>,
    failing: bool,
}

/// HTTP stand-in for the message API, bound to an ephemeral port.
pub struct FakeApi {
    pub url: String,
    calls: Arc<Mutex<Vec<ApiCall>>>,
}

impl FakeApi {
    pub async fn spawn() -> Self {
        Self::spawn_with(None, false).await
    }

    /// `failing` makes every message call answer 500.
    pub async fn spawn_with(premium_type: Option<u8>, failing: bool) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = ApiState {
            calls: calls.clone(),
            premium_type,
            failing,
        };
        let app = Router::new()
            .route("/users/@me", get(current_user))
            .route(
                "/channels/{channel_id}/messages/{message_id}",
                patch(edit_message).delete(delete_message),
            )
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("http://127.0.0.1:{}", addr.port()),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == TOKEN)
}

async fn current_user(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "401: Unauthorized", "code": 0 })),
        )
            .into_response();
    }
    Json(json!({
        "id": "42",
        "username": "pasta",
        "premium_type": state.premium_type,
    }))
    .into_response()
}

async fn edit_message(
    State(state): State<ApiState>,
    Path((channel_id, message_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    let content = body["content"].as_str().unwrap_or_default().to_string();
    state.calls.lock().push(ApiCall::Edit {
        channel_id: channel_id.clone(),
        message_id: message_id.clone(),
        content: content.clone(),
    });
    Json(json!({ "id": message_id, "channel_id": channel_id, "content": content })).into_response()
}

async fn delete_message(
    State(state): State<ApiState>,
    Path((channel_id, message_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    state.calls.lock().push(ApiCall::Delete {
        channel_id,
        message_id,
    });
    StatusCode::NO_CONTENT.into_response()
}
