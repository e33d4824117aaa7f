//! Outstanding-request tracking: assigns monotonic request ids and
//! correlates an inbound `Response` back to the `oneshot` the caller that
//! issued the `Request` is waiting on.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

use peersync_proto::{ErrorCode, ResponseMessage};
use tokio::sync::oneshot;

use crate::error::{EngineError, Result};

/// Outcome delivered to a caller waiting on a `Request`.
pub type RequestOutcome = std::result::Result<(Vec<u8>, ErrorCode), EngineError>;

/// Table of in-flight requests keyed by wire request id.
///
/// The id counter wraps on overflow. With only `u32::MAX` ids and a table
/// that drains completed entries immediately, wraparound colliding with a
/// still-outstanding request should be vanishingly rare, but `register`
/// checks for it anyway: reusing a live id would silently hand the new
/// request's waiter someone else's in-flight `Sender`, so a collision is
/// reported rather than overwritten.
pub struct RequestTable {
    next_id: Mutex<u32>,
    pending: Mutex<HashMap<u32, oneshot::Sender<RequestOutcome>>>,
}

impl Default for RequestTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTable {
    /// Create an empty table, starting id assignment at zero.
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: Mutex::new(0), pending: Mutex::new(HashMap::new()) }
    }

    /// Assign a fresh request id and register a completion channel for it.
    ///
    /// # Errors
    /// Returns [`EngineError::RequestIdCollision`] if the id counter wrapped
    /// around onto an id that is still outstanding. This is a local bug, not
    /// a transport condition, and the caller must treat it as fatal rather
    /// than silently overwriting the prior waiter.
    pub fn register(&self) -> Result<(u32, oneshot::Receiver<RequestOutcome>)> {
        let id = {
            let mut next_id = self.next_id.lock().expect("request table mutex poisoned");
            let id = *next_id;
            *next_id = next_id.wrapping_add(1);
            id
        };

        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().expect("request table mutex poisoned");
        match pending.entry(id) {
            Entry::Occupied(_) => Err(EngineError::RequestIdCollision(id)),
            Entry::Vacant(slot) => {
                slot.insert(tx);
                Ok((id, rx))
            },
        }
    }

    /// Complete the request named by an inbound `Response`, delivering its
    /// data and error code to whoever is waiting.
    ///
    /// A response whose id is not (or is no longer) in the table is logged
    /// and otherwise ignored: the caller may have already timed out or the
    /// connection may be racing a close.
    pub fn complete(&self, response: ResponseMessage) {
        let sender = self.pending.lock().expect("request table mutex poisoned").remove(&response.id);

        match sender {
            Some(tx) => {
                let _ = tx.send(Ok((response.data, response.code)));
            },
            None => {
                tracing::debug!(id = response.id, "response for unknown or completed request");
            },
        }
    }

    /// Fail every outstanding request with `error`, draining the table.
    ///
    /// Called once when the connection closes, so no waiter is left
    /// hanging forever on a `Response` that will never arrive.
    pub fn close_all(&self, make_error: impl Fn() -> EngineError) {
        let mut pending = self.pending.lock().expect("request table mutex poisoned");
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(make_error()));
        }
    }

    /// Number of requests currently awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("request table mutex poisoned").len()
    }
}
