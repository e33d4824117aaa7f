//! Peersync loopback demo binary.
//!
//! Starts a listener and a client in the same process, connects them over
//! TCP loopback, runs a handshake and a single block request/response
//! through the real `Connection` engine, then shuts down. Useful for manual
//! smoke-testing the wire protocol without standing up two machines.
//!
//! # Usage
//!
//! ```bash
//! peersync-demo --bind 127.0.0.1:0
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use peersync_core::{Connection, ConnectionConfig, CompressionPolicy, Model, RequestResponse};
use peersync_proto::{
    ClusterConfigMessage, DownloadProgressMessage, ErrorCode, IndexMessage, IndexUpdateMessage,
    RequestMessage,
};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Peersync protocol demo
#[derive(Parser, Debug)]
#[command(name = "peersync-demo")]
#[command(about = "Loopback demo for the peer-to-peer synchronization engine")]
#[command(version)]
struct Args {
    /// Address to bind the demo listener to
    #[arg(short, long, default_value = "127.0.0.1:0")]
    bind: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// An in-memory host that answers every block request with a fixed payload
/// and logs everything else it sees.
struct EchoModel {
    name: &'static str,
    requests_served: AtomicU64,
}

impl EchoModel {
    fn new(name: &'static str) -> Self {
        Self { name, requests_served: AtomicU64::new(0) }
    }
}

impl Model for EchoModel {
    async fn cluster_config(&self, config: ClusterConfigMessage) {
        tracing::info!(peer = self.name, folders = config.folders.len(), "received ClusterConfig");
    }

    async fn index(&self, index: IndexMessage) {
        tracing::info!(peer = self.name, folder = %index.folder, files = index.files.len(), "received Index");
    }

    async fn index_update(&self, update: IndexUpdateMessage) {
        tracing::info!(peer = self.name, folder = %update.folder, files = update.files.len(), "received IndexUpdate");
    }

    async fn request(&self, request: RequestMessage) -> (Vec<u8>, ErrorCode) {
        self.requests_served.fetch_add(1, Ordering::SeqCst);
        tracing::info!(peer = self.name, name = %request.name, size = request.size, "serving block request");
        (vec![0xABu8; request.size.max(0) as usize], ErrorCode::NoError)
    }

    async fn download_progress(&self, _progress: DownloadProgressMessage) {}

    async fn closed(&self, cause: Option<String>) {
        tracing::info!(peer = self.name, ?cause, "connection closed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let listener = TcpListener::bind(&args.bind).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("listening on {local_addr}");

    let server_model = Arc::new(EchoModel::new("server"));
    let server_handle = tokio::spawn({
        let server_model = server_model.clone();
        async move {
            let (socket, peer) = listener.accept().await.expect("accept failed");
            tracing::info!(%peer, "accepted connection");
            Connection::start(socket, server_model, ConnectionConfig::default())
        }
    });

    let client_socket = tokio::net::TcpStream::connect(local_addr).await?;
    let client_model = Arc::new(EchoModel::new("client"));
    let client = Connection::start(
        client_socket,
        client_model,
        ConnectionConfig { compression: CompressionPolicy::Always, ..Default::default() },
    );

    let server = server_handle.await.expect("server task panicked");

    client.cluster_config(ClusterConfigMessage { folders: vec![] }).await?;
    server.cluster_config(ClusterConfigMessage { folders: vec![] }).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let pending = client
        .request(RequestMessage {
            id: 0,
            folder: "demo".to_string(),
            name: "greeting.txt".to_string(),
            offset: 0,
            size: 16,
            hash: vec![],
            weak_hash: 0,
            flags: 0,
        })
        .await?;

    let (data, code) = pending.data().await?;
    tracing::info!(?code, bytes = data.len(), "received response");

    client.close("demo finished");
    server.close("demo finished");
    tokio::time::sleep(Duration::from_millis(50)).await;

    Ok(())
}
