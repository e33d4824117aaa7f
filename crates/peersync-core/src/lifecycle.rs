//! Cooperative one-shot close latch.
//!
//! The reader, writer, ping-sender, and ping-receiver tasks all race to
//! notice a closing condition (a fatal protocol error, a liveness timeout, a
//! local `close()` call, or a peer `Close` message). Exactly one of them
//! should win and drive the actual teardown; the rest just need to stop.
//! `Lifecycle` is the latch all four select on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::error::EngineError;

/// Shared close latch for one connection.
pub struct Lifecycle {
    closed: AtomicBool,
    notify: Notify,
    cause: Mutex<Option<String>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a latch in the open state.
    #[must_use]
    pub fn new() -> Self {
        Self { closed: AtomicBool::new(false), notify: Notify::new(), cause: Mutex::new(None) }
    }

    /// Whether the connection has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Trip the latch with `cause`, if it has not already tripped.
    ///
    /// Returns `true` if this call was the one that closed the connection;
    /// `false` if it was already closed (the caller should not re-run
    /// teardown in that case).
    pub fn close(&self, cause: &EngineError) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.cause.lock().expect("lifecycle mutex poisoned") = Some(cause.to_string());
        self.notify.notify_waiters();
        true
    }

    /// Block until the latch trips.
    ///
    /// The `Notified` future is created and `enable`d *before* the
    /// `is_closed` check, not after: `close()` wakes only waiters that are
    /// already registered via `notify_waiters()`, which stores no permit. A
    /// naive check-then-await has a window where a `close()` landing between
    /// the two is never observed by this call.
    pub async fn closed(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_closed() {
            return;
        }
        notified.await;
    }

    /// The reason the connection closed, if it has.
    #[must_use]
    pub fn cause(&self) -> Option<String> {
        self.cause.lock().expect("lifecycle mutex poisoned").clone()
    }
}
