//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own downloads directory and
//! fake tool.

use super::fake_tool::FakeTool;
use super::{SERVER_READY_POLL_INTERVAL_MS, SERVER_READY_TIMEOUT_MS};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tunegrab::conversion::{ConversionRunner, ConversionSettings};
use tunegrab::metadata::{MetadataResolver, ResolverSettings, ToolLookup};
use tunegrab::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use tunegrab::LinkRules;

/// When dropped, the server shuts down and its directories are removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    pub port: u16,

    _tool_dir: TempDir,
    downloads_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn(tool: FakeTool) -> Self {
        let tool_dir = TempDir::new().expect("Failed to create tool dir");
        let downloads_dir = TempDir::new().expect("Failed to create downloads dir");
        let tool_path = tool.install(&tool_dir);

        let settings = ResolverSettings {
            item_timeout: Duration::from_secs(5),
            enumeration_timeout: Duration::from_secs(5),
            enrichment_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let resolver = Arc::new(MetadataResolver::new(
            Arc::new(ToolLookup::new(&tool_path)),
            LinkRules::default(),
            settings,
        ));
        let runner = Arc::new(ConversionRunner::new(
            resolver.clone(),
            ConversionSettings::new(&tool_path, downloads_dir.path()),
        ));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            post_transfer_delete: Duration::from_millis(200),
        };
        let app = make_app(ServerState::new(
            config,
            resolver,
            runner,
            downloads_dir.path().to_path_buf(),
        ));

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            _tool_dir: tool_dir,
            downloads_dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    pub fn downloads_dir(&self) -> &Path {
        self.downloads_dir.path()
    }

    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        self.downloads_dir.path().join(filename)
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }
            match client
                .get(format!("{}/api/health", self.base_url))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS))
                        .await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
