//! Change-feed server.

use crate::config::ServerConfig;
use crate::error::FeedResult;
use crate::http::{build_router, AppState};
use crate::registry::ResourceRegistry;
use crate::store::LogStore;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// The change-feed server.
///
/// Owns the shared state behind every session. Stopping the server
/// cancels the root token, which ends every open session.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tailfeed_server::{ChangeFeedServer, MemoryOplog, ServerConfig, StaticRegistry};
///
/// # async fn run() -> tailfeed_server::FeedResult<()> {
/// let oplog = MemoryOplog::new("shop");
/// let registry = StaticRegistry::new(["brands", "products"]);
/// let server = ChangeFeedServer::new(ServerConfig::default(), Arc::new(oplog), Arc::new(registry));
///
/// let listener = server.bind().await?;
/// server.serve(listener, async { let _ = tokio::signal::ctrl_c().await; }).await
/// # }
/// ```
pub struct ChangeFeedServer {
    state: AppState,
}

impl ChangeFeedServer {
    /// Creates a server over `store`, validating against `registry`.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn LogStore>,
        registry: Arc<dyn ResourceRegistry>,
    ) -> Self {
        Self {
            state: AppState::new(store, registry, config),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Returns the router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Binds a listener on the configured address.
    pub async fn bind(&self) -> FeedResult<TcpListener> {
        Ok(TcpListener::bind(self.state.config.bind_addr).await?)
    }

    /// Stops every open session.
    pub fn shutdown(&self) {
        self.state.shutdown.cancel();
    }

    /// Serves until `signal` resolves, then drains.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> FeedResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "change feed listening");

        let token = self.state.shutdown.clone();
        let router = self.router();
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                signal.await;
                tracing::info!("shutting down");
                // Open SSE responses never finish by themselves.
                token.cancel();
            })
            .await;

        self.state.shutdown.cancel();
        result?;
        Ok(())
    }
}
