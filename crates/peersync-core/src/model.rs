//! Host-facing traits: `Model` is implemented by the host application and
//! receives inbound messages; `RequestResponse` is handed back to the host
//! for a `Request` it issued, to await or cancel the matching `Response`.

use std::future::Future;

use peersync_proto::{
    ClusterConfigMessage, DownloadProgressMessage, ErrorCode, IndexMessage, IndexUpdateMessage,
    RequestMessage,
};

/// Callbacks invoked by a [`crate::connection::Connection`] as messages
/// arrive from the peer.
///
/// All methods run on the connection's per-message task: a slow `request`
/// implementation stalls only the request it's handling, not the rest of
/// the connection's multiplexed traffic.
pub trait Model: Send + Sync + 'static {
    /// The peer sent its handshaking `ClusterConfig`.
    fn cluster_config(
        &self,
        config: ClusterConfigMessage,
    ) -> impl Future<Output = ()> + Send;

    /// The peer sent a full folder index.
    fn index(&self, index: IndexMessage) -> impl Future<Output = ()> + Send;

    /// The peer sent an incremental folder index.
    fn index_update(&self, update: IndexUpdateMessage) -> impl Future<Output = ()> + Send;

    /// The peer requested a block. Returns the block's bytes and an error
    /// code to report back as the `Response`.
    fn request(&self, request: RequestMessage) -> impl Future<Output = (Vec<u8>, ErrorCode)> + Send;

    /// The peer sent partial-download hints.
    fn download_progress(
        &self,
        progress: DownloadProgressMessage,
    ) -> impl Future<Output = ()> + Send;

    /// The connection closed. `cause` is `None` for a clean local close and
    /// `Some(reason)` otherwise (peer `Close`, protocol error, timeout).
    fn closed(&self, cause: Option<String>) -> impl Future<Output = ()> + Send;
}

/// Handle to a `Request` the host issued, returned by
/// [`crate::connection::Connection::request`].
pub trait RequestResponse: Send {
    /// Await the matching `Response`, returning its data and error code.
    ///
    /// # Errors
    /// Returns an error if the connection closes before a `Response`
    /// arrives.
    fn data(self) -> impl Future<Output = crate::error::Result<(Vec<u8>, ErrorCode)>> + Send;
}
