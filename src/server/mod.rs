//! HTTP server built on axum.

use anyhow::{Context, Result, ensure};
use axum::Router;
use axum::routing::get;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::archive::BackendOptions;
use crate::cache::ArchiveCache;
use crate::cli::Cli;
use crate::resolver::PathResolver;
use crate::vfs::{ImageFilter, VirtualFs};

pub mod handlers;

/// State shared by every request handler.
pub struct AppState {
    pub vfs: VirtualFs,
    /// Landing page served at `/`
    pub index: PathBuf,
}

impl AppState {
    /// Bundle the browsing layer with the landing page path.
    pub fn new(vfs: VirtualFs, index: impl Into<PathBuf>) -> Self {
        Self {
            vfs,
            index: index.into(),
        }
    }
}

/// Create the router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    let files = ServeDir::new(state.vfs.root());

    Router::new()
        .route("/", get(handlers::index))
        .route("/list/", get(handlers::list_root))
        .route("/list/{*path}", get(handlers::list))
        .route("/listimg/", get(handlers::list_images_root))
        .route("/listimg/{*path}", get(handlers::list_images))
        .route("/archive_file/{*path}", get(handlers::archive_file))
        .nest_service("/files", files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Owns the application state for the lifetime of the process.
pub struct Server {
    state: Arc<AppState>,
    addr: std::net::SocketAddr,
}

impl Server {
    /// Build the server from parsed configuration.
    ///
    /// The root is canonicalized once; it must be an existing directory.
    pub fn new(cli: &Cli) -> Result<Self> {
        let root = cli
            .root
            .canonicalize()
            .with_context(|| format!("Invalid root directory {:?}", cli.root))?;
        ensure!(root.is_dir(), "Root {:?} is not a directory", root);

        let cache = ArchiveCache::new(
            cli.max_open_archives,
            BackendOptions {
                seven_zip_program: cli.seven_zip.clone(),
            },
        );
        let vfs = VirtualFs::new(
            PathResolver::new(root),
            Arc::new(cache),
            ImageFilter::new(cli.case_sensitive_images),
        );

        Ok(Self {
            state: Arc::new(AppState::new(vfs, &cli.index)),
            addr: cli.socket_addr(),
        })
    }

    /// Shared state, available before and after serving.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Bind the configured address and serve until ctrl-c.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then close cached archives.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(
            "Serving {:?} on http://{}",
            self.state.vfs.root(),
            listener.local_addr()?
        );

        let app = create_router(Arc::clone(&self.state));
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server error")?;

        self.state.vfs.cache().clear();
        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
