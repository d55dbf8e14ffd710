use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::events::Frame;
use super::session::SharedSession;

/// Periodic keep-alive for one connection.
///
/// The first beat goes out one full interval after start. Every beat carries
/// the sequence number current at send time. Once the peer has acknowledged
/// a beat on this connection, a later beat left unacknowledged makes the
/// timer cancel `zombie` and stop, leaving the session to tear the connection
/// down.
pub struct HeartbeatTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl HeartbeatTimer {
    pub fn start(
        interval: Duration,
        session: SharedSession,
        outbound: mpsc::UnboundedSender<String>,
        zombie: CancellationToken,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(beat(interval, session, outbound, cancel.clone(), zombie));
        tracing::debug!(interval_ms = interval.as_millis() as u64, "heartbeat started");
        Self { cancel, handle }
    }

    /// Cancels the timer and waits for its task to finish. Nothing is queued
    /// on the outbound channel once this returns.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("heartbeat task failed: {e}");
        }
        tracing::debug!("heartbeat stopped");
    }
}

async fn beat(
    interval: Duration,
    session: SharedSession,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    zombie: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let (acked, sequence) = {
            let mut state = session.lock();
            (state.take_heartbeat_ack(), state.sequence)
        };
        if !acked {
            tracing::warn!("heartbeat not acknowledged, connection is a zombie");
            zombie.cancel();
            return;
        }

        if outbound.send(Frame::heartbeat(sequence).encode()).is_err() {
            return;
        }
        tracing::debug!(?sequence, "sent heartbeat");
    }
}
