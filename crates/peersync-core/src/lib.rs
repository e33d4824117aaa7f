//! Connection engine for the peer-to-peer synchronization protocol.
//!
//! Owns both state (the `Initial`/`Ready` handshake machine) and I/O
//! scheduling (reader/writer/liveness tasks) for a single connection to one
//! peer, over any `AsyncRead + AsyncWrite` transport. Message schemas and
//! wire framing live in `peersync-proto`; this crate is where they become a
//! running connection.

pub mod bufpool;
pub mod compression;
pub mod connection;
pub mod counting;
pub mod error;
pub mod framer;
pub mod lifecycle;
pub mod liveness;
pub mod model;
pub mod request_table;
pub mod state;

pub use bufpool::BufferPool;
pub use compression::CompressionPolicy;
pub use connection::{Connection, ConnectionConfig, PendingRequest, Statistics};
pub use error::{EngineError, Result};
pub use model::{Model, RequestResponse};
pub use state::ConnectionState;
