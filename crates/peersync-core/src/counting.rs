//! Byte-counting and activity-tracking wrappers around the connection's
//! transport halves, used for [`crate::connection::Statistics`] and by the
//! liveness timers to know when bytes last moved.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Shared byte counters and activity clocks for one connection's read and
/// write halves.
#[derive(Debug)]
pub struct Counters {
    in_bytes: AtomicU64,
    out_bytes: AtomicU64,
    last_read: Mutex<Instant>,
    last_write: Mutex<Instant>,
}

impl Counters {
    /// Create counters starting at zero, with both activity clocks set to
    /// `now`.
    #[must_use]
    pub fn new(now: Instant) -> Arc<Self> {
        Arc::new(Self {
            in_bytes: AtomicU64::new(0),
            out_bytes: AtomicU64::new(0),
            last_read: Mutex::new(now),
            last_write: Mutex::new(now),
        })
    }

    fn record_read(&self, n: usize) {
        self.in_bytes.fetch_add(n as u64, Ordering::Relaxed);
        *self.last_read.lock().expect("counters mutex poisoned") = Instant::now();
    }

    fn record_write(&self, n: usize) {
        self.out_bytes.fetch_add(n as u64, Ordering::Relaxed);
        *self.last_write.lock().expect("counters mutex poisoned") = Instant::now();
    }

    /// Total bytes read from the peer so far.
    #[must_use]
    pub fn in_bytes_total(&self) -> u64 {
        self.in_bytes.load(Ordering::Relaxed)
    }

    /// Total bytes written to the peer so far.
    #[must_use]
    pub fn out_bytes_total(&self) -> u64 {
        self.out_bytes.load(Ordering::Relaxed)
    }

    /// How long it has been since a read last completed.
    #[must_use]
    pub fn since_last_read(&self) -> std::time::Duration {
        self.last_read.lock().expect("counters mutex poisoned").elapsed()
    }

    /// How long it has been since a write last completed.
    #[must_use]
    pub fn since_last_write(&self) -> std::time::Duration {
        self.last_write.lock().expect("counters mutex poisoned").elapsed()
    }

    /// Record a read without actually reading anything. Only exists so
    /// liveness tests can simulate peer activity without a real socket.
    #[cfg(test)]
    pub(crate) fn record_read_for_test(&self) {
        self.record_read(1);
    }
}

/// An `AsyncRead` that tallies bytes and activity into shared [`Counters`].
pub struct CountingReader<R> {
    inner: R,
    counters: Arc<Counters>,
}

impl<R> CountingReader<R> {
    /// Wrap `inner`, reporting into `counters`.
    pub fn new(inner: R, counters: Arc<Counters>) -> Self {
        Self { inner, counters }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let result = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &result {
            let read = buf.filled().len() - before;
            if read > 0 {
                this.counters.record_read(read);
            }
        }
        result
    }
}

/// An `AsyncWrite` that tallies bytes and activity into shared [`Counters`].
pub struct CountingWriter<W> {
    inner: W,
    counters: Arc<Counters>,
}

impl<W> CountingWriter<W> {
    /// Wrap `inner`, reporting into `counters`.
    pub fn new(inner: W, counters: Arc<Counters>) -> Self {
        Self { inner, counters }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = &result {
            this.counters.record_write(*written);
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
