//! Minimal buffer pool for reusable read/write buffers.
//!
//! A lock-free freelist of reusable `BytesMut` buffers for the reader and
//! writer tasks, checked out via [`BufferPool::checkout`] and wired into
//! [`crate::framer::read_frame_with_buf`]/[`crate::framer::write_frame_with_buf`]
//! so the per-connection I/O tasks stop allocating a fresh buffer per frame.
//! Every `get` must be paired with a `put` on every exit path, including
//! error paths — a buffer that is taken and never returned just means the
//! pool runs a little smaller, never a leak, but letting the pool drain to
//! empty defeats its purpose. `checkout` returns a [`PooledBuffer`] guard
//! that does this pairing automatically via `Drop`, which is what the
//! connection engine uses rather than calling `get`/`put` directly.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::BytesMut;
use crossbeam_queue::ArrayQueue;

/// Buffers larger than this are not worth recycling; they're dropped
/// instead of returned, so one oversized frame doesn't permanently bloat
/// every buffer in the pool.
const MAX_POOLED_CAPACITY: usize = 1024 * 1024;

/// Fixed-capacity pool of reusable read/write buffers.
pub struct BufferPool {
    buffers: ArrayQueue<BytesMut>,
    default_capacity: usize,
}

impl BufferPool {
    /// Create a pool holding up to `slots` buffers, each newly-allocated
    /// buffer defaulting to `default_capacity` bytes.
    #[must_use]
    pub fn new(slots: usize, default_capacity: usize) -> Self {
        Self { buffers: ArrayQueue::new(slots), default_capacity }
    }

    /// Take a buffer from the pool, or allocate a fresh one if the pool is
    /// empty.
    #[must_use]
    pub fn get(&self) -> BytesMut {
        self.buffers.pop().unwrap_or_else(|| BytesMut::with_capacity(self.default_capacity))
    }

    /// Return a buffer to the pool for reuse.
    ///
    /// The buffer is cleared before being stored. Buffers whose capacity
    /// has grown past [`MAX_POOLED_CAPACITY`], or arriving after the pool
    /// is already full, are dropped instead.
    pub fn put(&self, mut buf: BytesMut) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        buf.clear();
        let _ = self.buffers.push(buf);
    }

    /// Check out a buffer wrapped in a guard that returns it via `put` when
    /// dropped, so a get is paired with a put on every exit path — including
    /// an early return on error — without the caller having to remember to
    /// call `put` itself.
    #[must_use]
    pub fn checkout(self: &Arc<Self>) -> PooledBuffer {
        PooledBuffer { pool: self.clone(), buf: self.get() }
    }
}

/// RAII handle to a buffer checked out of a [`BufferPool`]. Derefs to the
/// underlying `BytesMut`; returns it to the pool on drop.
pub struct PooledBuffer {
    pool: Arc<BufferPool>,
    buf: BytesMut,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}
