use std::future::Future;
use std::sync::Arc;

use realm_store::StorageManager;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Realm asset server.
pub struct RealmServer {
    config: ServerConfig,
    storage: Arc<StorageManager>,
}

impl RealmServer {
    pub fn new(config: ServerConfig, storage: Arc<StorageManager>) -> Self {
        Self { config, storage }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState {
            storage: self.storage.clone(),
            config: Arc::new(self.config.clone()),
        })
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_until(async {
            // Without a signal handler there is nothing to wait on; keep serving.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` completes, then flush key-value state.
    pub async fn serve_until<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            backend = %self.storage.backend_kind(),
            "realm server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!("shutting down, persisting key-value state");
        self.storage.force_persist().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_store::StorageConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn server_construction() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageManager::init(&StorageConfig::local(dir.path())).await.unwrap());
        let server = RealmServer::new(ServerConfig::default(), storage);
        assert_eq!(server.config().bind_addr, "127.0.0.1:3000".parse().unwrap());
        let _router = server.router();
    }

    #[tokio::test]
    async fn shutdown_persists_state() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageManager::init(&StorageConfig::local(dir.path())).await.unwrap());
        storage.set("title", "persisted on shutdown").unwrap();
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..ServerConfig::default()
        };
        RealmServer::new(config, storage)
            .serve_until(async {})
            .await
            .unwrap();
        let raw = std::fs::read_to_string(dir.path().join("storage.json")).unwrap();
        assert!(raw.contains("persisted on shutdown"));
    }
}
