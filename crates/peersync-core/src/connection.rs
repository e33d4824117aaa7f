//! The connection engine: wires the framer, request table, liveness pair,
//! and lifecycle latch around a transport, and dispatches inbound messages
//! to a host-supplied [`Model`].
//!
//! # Task layout
//!
//! `Connection::start` spawns four long-lived tasks plus one short-lived
//! task per inbound `Request`:
//!
//! - **reader** — decodes frames, advances the handshake state machine,
//!   and dispatches messages to the model.
//! - **writer** — drains the send queue, compresses and frames each
//!   message, and writes it to the transport.
//! - **ping-sender** / **ping-receiver** — the liveness pair.
//! - **closer** — waits once for the shared [`Lifecycle`] latch to trip,
//!   then calls `model.closed()` exactly once and drains the request table.
//!
//! All four long-lived tasks observe the same `Lifecycle`, so whichever one
//! notices a fatal condition first tears the rest down.

use std::sync::Arc;
use std::time::{Duration, Instant};

use peersync_proto::{
    ClusterConfigMessage, CloseMessage, Compression, DownloadProgressMessage, ErrorCode, Header,
    IndexMessage, IndexUpdateMessage, Message, MessageType, ResponseMessage,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use crate::bufpool::BufferPool;
use crate::compression::CompressionPolicy;
use crate::counting::{CountingReader, CountingWriter, Counters};
use crate::error::{EngineError, Result};
use crate::framer;
use crate::lifecycle::Lifecycle;
use crate::liveness::{run_ping_receiver, run_ping_sender};
use crate::model::{Model, RequestResponse};
use crate::request_table::RequestTable;
use crate::state::ConnectionState;

/// The interval between keepalive pings syncthing itself uses, and a
/// reasonable default here: frequent enough that a 300s receive timeout
/// never trips against a healthy peer, infrequent enough to be cheap.
pub const DEFAULT_PING_SEND_INTERVAL: Duration = Duration::from_secs(90);

/// Default liveness receive timeout.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default depth of the outbound send queue.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;

/// Number of scratch buffers the reader/writer tasks share between them.
/// One checked out per task at a time is all either ever needs; a couple of
/// spares absorb the handoff when both are mid-frame simultaneously.
const BUFFER_POOL_SLOTS: usize = 4;

/// Default capacity of a freshly-allocated scratch buffer, sized for a
/// typical uncompressed metadata frame rather than a full block transfer —
/// larger frames simply grow the buffer, which then keeps that capacity for
/// the rest of the pool's life.
const BUFFER_POOL_DEFAULT_CAPACITY: usize = 64 * 1024;

/// Tunables for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How often to send a keepalive `Ping` while otherwise idle.
    pub ping_send_interval: Duration,
    /// How long without read activity before the connection is considered
    /// dead.
    pub receive_timeout: Duration,
    /// When to LZ4-compress outgoing message bodies.
    pub compression: CompressionPolicy,
    /// Depth of the channel feeding the writer task.
    pub send_queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ping_send_interval: DEFAULT_PING_SEND_INTERVAL,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            compression: CompressionPolicy::MetadataOnly,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }
}

/// Point-in-time traffic counters for a connection.
#[derive(Debug, Clone, Copy)]
pub struct Statistics {
    /// When these statistics were sampled.
    pub at: Instant,
    /// Total bytes read from the peer.
    pub in_bytes_total: u64,
    /// Total bytes written to the peer.
    pub out_bytes_total: u64,
}

/// Handle to a `Request` awaiting its `Response`.
pub struct PendingRequest {
    rx: oneshot::Receiver<crate::request_table::RequestOutcome>,
}

impl RequestResponse for PendingRequest {
    async fn data(self) -> Result<(Vec<u8>, ErrorCode)> {
        self.rx.await.map_err(|_| EngineError::Closed)?
    }
}

/// A running connection to one peer.
///
/// Cloning is cheap (it's a handle around shared channel/counter/lifecycle
/// state); every clone controls the same underlying connection.
#[derive(Clone)]
pub struct Connection {
    outbox: mpsc::Sender<Message>,
    request_table: Arc<RequestTable>,
    lifecycle: Arc<Lifecycle>,
    counters: Arc<Counters>,
}

impl Connection {
    /// Start a connection engine over `stream`, dispatching inbound
    /// messages to `model`.
    pub fn start<S, M>(stream: S, model: Arc<M>, config: ConnectionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
        M: Model,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let counters = Counters::new(Instant::now());
        let lifecycle = Arc::new(Lifecycle::new());
        let request_table = Arc::new(RequestTable::new());
        let (outbox_tx, outbox_rx) = mpsc::channel(config.send_queue_capacity);

        let reader = CountingReader::new(read_half, counters.clone());
        let writer = CountingWriter::new(write_half, counters.clone());
        let buffer_pool =
            Arc::new(BufferPool::new(BUFFER_POOL_SLOTS, BUFFER_POOL_DEFAULT_CAPACITY));

        tokio::spawn(run_writer(
            writer,
            outbox_rx,
            lifecycle.clone(),
            config.compression,
            buffer_pool.clone(),
        ));
        tokio::spawn(run_reader(
            reader,
            model.clone(),
            request_table.clone(),
            lifecycle.clone(),
            outbox_tx.clone(),
            buffer_pool,
        ));
        tokio::spawn(run_ping_sender(
            config.ping_send_interval,
            counters.clone(),
            lifecycle.clone(),
            outbox_tx.clone(),
        ));
        tokio::spawn(run_ping_receiver(config.receive_timeout, counters.clone(), lifecycle.clone()));
        tokio::spawn(run_closer(lifecycle.clone(), model, request_table.clone()));

        Self { outbox: outbox_tx, request_table, lifecycle, counters }
    }

    /// Send the handshaking `ClusterConfig`.
    pub async fn cluster_config(&self, config: ClusterConfigMessage) -> Result<()> {
        self.enqueue(Message::ClusterConfig(config)).await
    }

    /// Send a full folder index.
    pub async fn index(&self, index: IndexMessage) -> Result<()> {
        self.enqueue(Message::Index(index)).await
    }

    /// Send an incremental folder index.
    pub async fn index_update(&self, update: IndexUpdateMessage) -> Result<()> {
        self.enqueue(Message::IndexUpdate(update)).await
    }

    /// Send partial-download hints.
    pub async fn download_progress(&self, progress: DownloadProgressMessage) -> Result<()> {
        self.enqueue(Message::DownloadProgress(progress)).await
    }

    /// Request a block from the peer, returning a handle to await the
    /// matching `Response`.
    pub async fn request(
        &self,
        request: peersync_proto::RequestMessage,
    ) -> Result<PendingRequest> {
        if self.lifecycle.is_closed() {
            return Err(EngineError::Closed);
        }
        let (id, rx) = match self.request_table.register() {
            Ok(pair) => pair,
            Err(err) => {
                self.lifecycle.close(&err);
                return Err(err);
            },
        };
        let mut request = request;
        request.id = id;
        self.enqueue(Message::Request(request)).await?;
        Ok(PendingRequest { rx })
    }

    /// Current traffic counters.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        Statistics {
            at: Instant::now(),
            in_bytes_total: self.counters.in_bytes_total(),
            out_bytes_total: self.counters.out_bytes_total(),
        }
    }

    /// Whether this connection has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// Gracefully close the connection, best-effort notifying the peer with
    /// `reason`.
    pub fn close(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.lifecycle.close(&EngineError::RemoteClose(reason.clone())) {
            let outbox = self.outbox.clone();
            tokio::spawn(async move {
                let _ = outbox.send(Message::Close(CloseMessage { reason })).await;
            });
        }
    }

    async fn enqueue(&self, message: Message) -> Result<()> {
        if self.lifecycle.is_closed() {
            return Err(EngineError::Closed);
        }
        self.outbox.send(message).await.map_err(|_| EngineError::Closed)
    }
}

async fn run_closer<M: Model>(
    lifecycle: Arc<Lifecycle>,
    model: Arc<M>,
    request_table: Arc<RequestTable>,
) {
    lifecycle.closed().await;
    request_table.close_all(|| EngineError::Closed);
    model.closed(lifecycle.cause()).await;
}

async fn run_writer<W: AsyncWrite + Unpin>(
    mut writer: CountingWriter<W>,
    mut outbox: mpsc::Receiver<Message>,
    lifecycle: Arc<Lifecycle>,
    compression: CompressionPolicy,
    buffer_pool: Arc<BufferPool>,
) {
    loop {
        let message = tokio::select! {
            () = lifecycle.closed() => return,
            message = outbox.recv() => match message {
                Some(message) => message,
                None => return,
            },
        };

        let message_type = message.message_type();
        let mut payload = Vec::new();
        if let Err(err) = message.encode_to(&mut payload) {
            lifecycle.close(&err.into());
            return;
        }

        let (scheme, body) = if compression.should_compress(message_type, payload.len()) {
            (Compression::Lz4, crate::compression::compress(&payload))
        } else {
            (Compression::None, payload)
        };

        let header = Header::new(message_type, scheme);
        let mut scratch = buffer_pool.checkout();
        if let Err(err) = framer::write_frame_with_buf(&mut writer, &header, &body, &mut scratch).await {
            lifecycle.close(&err);
            return;
        }
        if let Err(err) = writer.flush().await {
            lifecycle.close(&EngineError::Transport(err));
            return;
        }
    }
}

async fn run_reader<R, M>(
    mut reader: CountingReader<R>,
    model: Arc<M>,
    request_table: Arc<RequestTable>,
    lifecycle: Arc<Lifecycle>,
    outbox: mpsc::Sender<Message>,
    buffer_pool: Arc<BufferPool>,
) where
    R: AsyncRead + Unpin,
    M: Model,
{
    let mut state = ConnectionState::Initial;
    let mut scratch = buffer_pool.checkout();

    loop {
        let frame = tokio::select! {
            () = lifecycle.closed() => return,
            frame = framer::read_frame_with_buf(&mut reader, &mut scratch) => frame,
        };

        let (header, body) = match frame {
            Ok(frame) => frame,
            Err(err) => {
                lifecycle.close(&err);
                return;
            },
        };

        let Some(message_type) = header.message_type() else {
            tracing::debug!(type_id = header.type_id, "skipping frame of unknown message type");
            continue;
        };

        let scheme = match header.compression() {
            Ok(scheme) => scheme,
            Err(err) => {
                lifecycle.close(&err.into());
                return;
            },
        };

        let payload = match scheme {
            Compression::None => body.to_vec(),
            Compression::Lz4 => match crate::compression::decompress(&body) {
                Ok(payload) => payload,
                Err(err) => {
                    lifecycle.close(&err);
                    return;
                },
            },
        };

        state = match state.advance(message_type) {
            Ok(state) => state,
            Err(err) => {
                lifecycle.close(&err);
                return;
            },
        };

        let message = match Message::decode(message_type, &payload) {
            Ok(message) => message,
            Err(err) => {
                lifecycle.close(&err.into());
                return;
            },
        };

        if let Some(cause) = dispatch(message, &model, &request_table, &outbox).await {
            lifecycle.close(&cause);
            return;
        }
    }
}

/// Handle one decoded message. Returns `Some(cause)` if the connection
/// should close as a result (a peer `Close`, or a validation failure on an
/// inbound `Index`/`IndexUpdate`/`Request`).
async fn dispatch<M: Model>(
    message: Message,
    model: &Arc<M>,
    request_table: &Arc<RequestTable>,
    outbox: &mpsc::Sender<Message>,
) -> Option<EngineError> {
    match message {
        Message::ClusterConfig(config) => {
            model.cluster_config(config).await;
            None
        },
        Message::Index(index) => {
            if let Err(err) = validate_files(&index.files) {
                return Some(err.into());
            }
            model.index(index).await;
            None
        },
        Message::IndexUpdate(update) => {
            if let Err(err) = validate_files(&update.files) {
                return Some(err.into());
            }
            model.index_update(update).await;
            None
        },
        Message::DownloadProgress(progress) => {
            model.download_progress(progress).await;
            None
        },
        Message::Ping => None,
        Message::Response(response) => {
            request_table.complete(response);
            None
        },
        Message::Close(close) => Some(EngineError::RemoteClose(close.reason)),
        Message::Request(request) => {
            if let Err(err) = peersync_proto::check_filename(&request.name) {
                return Some(err.into());
            }
            let model = model.clone();
            let outbox = outbox.clone();
            tokio::spawn(async move {
                let id = request.id;
                tracing::debug!(id, name = %request.name, "handling inbound request");
                let (data, code) = model.request(request).await;
                let _ = outbox.send(Message::Response(ResponseMessage { id, data, code })).await;
            });
            None
        },
    }
}

fn validate_files(files: &[peersync_proto::FileInfo]) -> peersync_proto::Result<()> {
    for file in files {
        peersync_proto::check_file_info_consistency(file)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use peersync_proto::{Folder, RequestMessage};
    use tokio::io::duplex;

    use super::*;

    #[derive(Default)]
    struct RecordingModel {
        cluster_configs: Mutex<Vec<ClusterConfigMessage>>,
        closed_count: AtomicUsize,
        last_close_cause: Mutex<Option<String>>,
    }

    impl Model for RecordingModel {
        async fn cluster_config(&self, config: ClusterConfigMessage) {
            self.cluster_configs.lock().unwrap().push(config);
        }

        async fn index(&self, _index: IndexMessage) {}

        async fn index_update(&self, _update: IndexUpdateMessage) {}

        async fn request(&self, request: RequestMessage) -> (Vec<u8>, ErrorCode) {
            (vec![0u8; request.size.max(0) as usize], ErrorCode::NoError)
        }

        async fn download_progress(&self, _progress: DownloadProgressMessage) {}

        async fn closed(&self, cause: Option<String>) {
            self.closed_count.fetch_add(1, Ordering::SeqCst);
            *self.last_close_cause.lock().unwrap() = cause;
        }
    }

    fn test_config() -> ConnectionConfig {
        ConnectionConfig {
            ping_send_interval: Duration::from_secs(3600),
            receive_timeout: Duration::from_secs(3600),
            compression: CompressionPolicy::Never,
            send_queue_capacity: 16,
        }
    }

    #[tokio::test]
    async fn handshake_moves_peer_to_ready() {
        let (a, b) = duplex(64 * 1024);
        let model_a = Arc::new(RecordingModel::default());
        let model_b = Arc::new(RecordingModel::default());

        let conn_a = Connection::start(a, model_a.clone(), test_config());
        let conn_b = Connection::start(b, model_b.clone(), test_config());

        conn_a
            .cluster_config(ClusterConfigMessage {
                folders: vec![Folder {
                    id: "f1".to_string(),
                    label: "F1".to_string(),
                    flags: 0,
                    devices: vec![],
                }],
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(model_b.cluster_configs.lock().unwrap().len(), 1);

        conn_a.close("done");
        conn_b.close("done");
    }

    #[tokio::test]
    async fn request_response_round_trips() {
        let (a, b) = duplex(64 * 1024);
        let model_a = Arc::new(RecordingModel::default());
        let model_b = Arc::new(RecordingModel::default());

        let conn_a = Connection::start(a, model_a.clone(), test_config());
        let conn_b = Connection::start(b, model_b.clone(), test_config());

        // Handshake both directions so Ready is reached before requesting.
        conn_a.cluster_config(ClusterConfigMessage { folders: vec![] }).await.unwrap();
        conn_b.cluster_config(ClusterConfigMessage { folders: vec![] }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let pending = conn_a
            .request(RequestMessage {
                id: 0,
                folder: "f1".to_string(),
                name: "a.txt".to_string(),
                offset: 0,
                size: 4,
                hash: vec![],
                weak_hash: 0,
                flags: 0,
            })
            .await
            .unwrap();

        let (data, code) = tokio::time::timeout(Duration::from_secs(1), pending.data())
            .await
            .expect("request should complete")
            .unwrap();

        assert_eq!(data, vec![0u8; 4]);
        assert_eq!(code, ErrorCode::NoError);

        conn_a.close("done");
        conn_b.close("done");
    }

    #[tokio::test]
    async fn remote_error_code_is_delivered_to_caller() {
        struct AlwaysGenericModel;

        impl Model for AlwaysGenericModel {
            async fn cluster_config(&self, _config: ClusterConfigMessage) {}
            async fn index(&self, _index: IndexMessage) {}
            async fn index_update(&self, _update: IndexUpdateMessage) {}
            async fn request(&self, _request: RequestMessage) -> (Vec<u8>, ErrorCode) {
                (vec![], ErrorCode::Generic)
            }
            async fn download_progress(&self, _progress: DownloadProgressMessage) {}
            async fn closed(&self, _cause: Option<String>) {}
        }

        let (a, b) = duplex(64 * 1024);
        let model_a = Arc::new(RecordingModel::default());
        let model_b = Arc::new(AlwaysGenericModel);

        let conn_a = Connection::start(a, model_a, test_config());
        let conn_b = Connection::start(b, model_b, test_config());

        conn_a.cluster_config(ClusterConfigMessage { folders: vec![] }).await.unwrap();
        conn_b.cluster_config(ClusterConfigMessage { folders: vec![] }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let pending = conn_a
            .request(RequestMessage {
                id: 0,
                folder: "f1".to_string(),
                name: "a.txt".to_string(),
                offset: 0,
                size: 4,
                hash: vec![],
                weak_hash: 0,
                flags: 0,
            })
            .await
            .unwrap();

        let (data, code) = tokio::time::timeout(Duration::from_secs(1), pending.data())
            .await
            .expect("request should complete")
            .unwrap();

        assert!(data.is_empty());
        assert_eq!(code, ErrorCode::Generic);

        conn_a.close("done");
        conn_b.close("done");
    }

    #[tokio::test]
    async fn remote_close_notifies_model_with_reason() {
        let (a, b) = duplex(64 * 1024);
        let model_a = Arc::new(RecordingModel::default());
        let model_b = Arc::new(RecordingModel::default());

        let conn_a = Connection::start(a, model_a.clone(), test_config());
        let _conn_b = Connection::start(b, model_b, test_config());

        conn_a.close("shutting down for maintenance");

        tokio::time::timeout(Duration::from_secs(1), async {
            while model_a.closed_count.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(conn_a.is_closed());
    }

    #[tokio::test]
    async fn non_cluster_config_before_handshake_is_fatal() {
        let (a, mut b) = duplex(64 * 1024);
        let model_a = Arc::new(RecordingModel::default());

        let conn_a = Connection::start(a, model_a, test_config());

        // Write a raw Ping frame directly, bypassing the handshake.
        let mut buf: Vec<u8> = Vec::new();
        let header = Header::new(MessageType::Ping, Compression::None);
        framer::write_frame(&mut b, &header, &[]).await.unwrap();
        let _ = buf;

        tokio::time::timeout(Duration::from_secs(1), async {
            while !conn_a.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn bad_filename_in_request_kills_connection() {
        let (a, mut b) = duplex(64 * 1024);
        let model_a = Arc::new(RecordingModel::default());

        let conn_a = Connection::start(a, model_a.clone(), test_config());

        let handshake = Message::ClusterConfig(ClusterConfigMessage { folders: vec![] });
        let mut payload = Vec::new();
        handshake.encode_to(&mut payload).unwrap();
        let header = Header::new(MessageType::ClusterConfig, Compression::None);
        framer::write_frame(&mut b, &header, &payload).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let bad_request = Message::Request(RequestMessage {
            id: 0,
            folder: "f1".to_string(),
            name: "../etc/passwd".to_string(),
            offset: 0,
            size: 4,
            hash: vec![],
            weak_hash: 0,
            flags: 0,
        });
        let mut payload = Vec::new();
        bad_request.encode_to(&mut payload).unwrap();
        let header = Header::new(MessageType::Request, Compression::None);
        framer::write_frame(&mut b, &header, &payload).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while model_a.closed_count.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(model_a.closed_count.load(Ordering::SeqCst), 1);
        assert!(conn_a.is_closed());
    }
}
