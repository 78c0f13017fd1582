// ─── Resource Pack Server ───
// Minimal HTTP server exposing exactly one file: `GET /<file-name>`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};

struct PackFile {
    name: String,
    path: PathBuf,
}

/// Running pack server. Dropping it shuts the listener down.
#[derive(Debug)]
pub struct ResourcePackServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ResourcePackServer {
    /// Bind `host:port` and start serving `file` in the background.
    pub async fn start(file: PathBuf, host: &str, port: u16) -> LauncherResult<Self> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| LauncherError::ResourcePack(format!("{:?} has no file name", file)))?;

        let bind = format!("{host}:{port}");
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| LauncherError::ResourcePack(format!("cannot bind {bind}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| LauncherError::ResourcePack(e.to_string()))?;

        let state = Arc::new(PackFile { name, path: file });
        let app = Router::new()
            .route("/:file", get(serve_pack))
            .with_state(state.clone());

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!("Resource pack server stopped with error: {}", e);
            }
        });

        info!("Serving resource pack {} on {}", state.name, addr);
        Ok(Self {
            addr,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for the server task to end.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!("Resource pack server on {} stopped", self.addr);
    }
}

impl Drop for ResourcePackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve_pack(State(pack): State<Arc<PackFile>>, Path(requested): Path<String>) -> Response {
    if requested != pack.name {
        return StatusCode::NOT_FOUND.into_response();
    }
    match tokio::fs::read(&pack.path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/zip")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!("Cannot read resource pack {:?}: {}", pack.path, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
