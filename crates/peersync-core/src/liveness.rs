//! Bidirectional liveness watchdog.
//!
//! Two independent, asymmetric timers run for the life of a connection:
//! a ping-sender that keeps the peer from timing *us* out, and a
//! ping-receiver that notices when the peer has gone quiet.

use std::sync::Arc;
use std::time::Duration;

use peersync_proto::Message;
use tokio::sync::mpsc;

use crate::counting::Counters;
use crate::error::EngineError;
use crate::lifecycle::Lifecycle;

/// Send a `Ping` on the outbound queue whenever nothing else has been
/// written for at least `send_interval / 2`.
///
/// Polling at half the interval, rather than waiting the full interval,
/// keeps the worst case between real writes and the next ping bounded by
/// `send_interval`, not `1.5 * send_interval`.
pub async fn run_ping_sender(
    send_interval: Duration,
    counters: Arc<Counters>,
    lifecycle: Arc<Lifecycle>,
    outbox: mpsc::Sender<Message>,
) {
    let tick = send_interval / 2;

    loop {
        tokio::select! {
            () = lifecycle.closed() => return,
            () = tokio::time::sleep(tick) => {},
        }

        if lifecycle.is_closed() {
            return;
        }

        if counters.since_last_write() >= tick {
            if outbox.send(Message::Ping).await.is_err() {
                return;
            }
            tracing::trace!("sent keepalive ping");
        }
    }
}

/// Close the connection with [`EngineError::Timeout`] if no read activity
/// has been observed for more than `receive_timeout`.
pub async fn run_ping_receiver(
    receive_timeout: Duration,
    counters: Arc<Counters>,
    lifecycle: Arc<Lifecycle>,
) {
    let tick = receive_timeout / 2;

    loop {
        tokio::select! {
            () = lifecycle.closed() => return,
            () = tokio::time::sleep(tick) => {},
        }

        if lifecycle.is_closed() {
            return;
        }

        let idle = counters.since_last_read();
        if idle > receive_timeout {
            tracing::warn!(?idle, "liveness timeout, no read activity from peer");
            lifecycle.close(&EngineError::Timeout);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sender_pings_when_idle() {
        let counters = Counters::new(Instant::now());
        let lifecycle = Arc::new(Lifecycle::new());
        let (tx, mut rx) = mpsc::channel(4);

        let handle =
            tokio::spawn(run_ping_sender(Duration::from_millis(100), counters, lifecycle.clone(), tx));

        let ping = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(ping, Ok(Some(Message::Ping))));

        lifecycle.close(&EngineError::Closed);
        let _ = handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn receiver_times_out_when_silent() {
        let counters = Counters::new(Instant::now());
        let lifecycle = Arc::new(Lifecycle::new());

        let handle = tokio::spawn(run_ping_receiver(
            Duration::from_millis(100),
            counters,
            lifecycle.clone(),
        ));

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("receiver task should finish")
            .unwrap();

        assert!(lifecycle.is_closed());
        assert_eq!(lifecycle.cause(), Some(EngineError::Timeout.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn receiver_does_not_time_out_with_recent_activity() {
        let counters = Counters::new(Instant::now());
        let lifecycle = Arc::new(Lifecycle::new());

        let handle = tokio::spawn(run_ping_receiver(
            Duration::from_millis(200),
            counters.clone(),
            lifecycle.clone(),
        ));

        // Refresh read activity just before each half-interval check fires,
        // so the timeout threshold is never crossed.
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(90)).await;
            counters.record_read_for_test();
        }
        assert!(!lifecycle.is_closed());

        lifecycle.close(&EngineError::Closed);
        let _ = handle.await;
    }
}
