//! # HTTP Server Module
//!
//! Builds the axum application of the relay and runs it until a shutdown signal.
//!
//! | Route                         | Handler                                  |
//! |-------------------------------|------------------------------------------|
//! | `GET /health`                 | 200, empty body, never cached            |
//! | `GET /youtube/v3/search`      | admission gate, [`Endpoint::Search`]     |
//! | `GET /youtube/v3/videos`      | admission gate, [`Endpoint::Videos`]     |
//! | `GET /youtube/v3/playlistItems` | admission gate, [`Endpoint::PlaylistItems`] |
//! | `GET <metrics.path>`          | Prometheus text, when metrics are enabled |

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router as AxumRouter;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::auth::Whitelist;
use crate::caching::{AdmissionGate, CacheStore, RedisStore, TtlPolicy};
use crate::core::config::Conf;
use crate::core::error::{RelayError, RelayResult};
use crate::observability::MetricsExporter;
use crate::relay::{Endpoint, VideoRelay, YouTubeRelay};

/// State shared by every handler
#[derive(Clone)]
pub struct ServerState {
    pub gate: Arc<AdmissionGate>,
    pub metrics: Option<MetricsExporter>,
}

/// Build the relay application
pub fn build_router(state: ServerState, metrics_path: &str) -> AxumRouter {
    let mut app = AxumRouter::new()
        .route("/health", get(health_check))
        .route(Endpoint::Search.path(), get(search_handler))
        .route(Endpoint::Videos.path(), get(videos_handler))
        .route(Endpoint::PlaylistItems.path(), get(playlist_items_handler));

    if state.metrics.is_some() {
        app = app.route(metrics_path, get(metrics_handler));
    }

    app.with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Assemble the admission gate from configuration
///
/// The cache store is only built when caching is enabled; no connection is made here.
pub fn build_gate(conf: &Conf, relay: Arc<dyn VideoRelay>) -> RelayResult<AdmissionGate> {
    let whitelist = Arc::new(Whitelist::new(&conf.whitelists));

    let store = match (&conf.redis, conf.cache.is_enabled) {
        (Some(redis), true) => Some(Arc::new(RedisStore::from_config(redis)?) as Arc<dyn CacheStore>),
        (None, true) => return Err(RelayError::config("redis must be configured when the cache is enabled")),
        (_, false) => None,
    };

    Ok(AdmissionGate::new(
        conf.app_name.clone(),
        TtlPolicy::new(conf.cache.clone()),
        store,
        relay,
        whitelist,
    ))
}

/// The relay HTTP server
pub struct RelayServer {
    app: AxumRouter,
    address: String,
    port: u16,
}

impl RelayServer {
    /// Wire every component described by `conf`
    pub fn from_config(conf: &Conf) -> RelayResult<Self> {
        let relay: Arc<dyn VideoRelay> = Arc::new(YouTubeRelay::new(&conf.api_key, &conf.upstream)?);
        let gate = Arc::new(build_gate(conf, relay)?);

        let metrics = if conf.metrics.enabled {
            let exporter = MetricsExporter::install()
                .map_err(|e| RelayError::config(e.to_string()))?;
            Some(exporter)
        } else {
            None
        };

        let app = build_router(ServerState { gate, metrics }, &conf.metrics.path);

        Ok(Self {
            app,
            address: conf.address.clone(),
            port: conf.port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    #[instrument(skip(self, shutdown))]
    pub async fn start<F>(self, shutdown: F) -> RelayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind((self.address.as_str(), self.port))
            .await
            .map_err(|e| crate::config_error!("Failed to bind server to {}: {}", self.bind_addr(), e))?;

        info!("yt-relay listening on {}", self.bind_addr());

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| crate::internal_error!("Server error: {}", e))
    }
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn search_handler(State(state): State<ServerState>, method: Method, uri: Uri) -> Response {
    state.gate.handle(Endpoint::Search, &method, &uri).await
}

async fn videos_handler(State(state): State<ServerState>, method: Method, uri: Uri) -> Response {
    state.gate.handle(Endpoint::Videos, &method, &uri).await
}

async fn playlist_items_handler(State(state): State<ServerState>, method: Method, uri: Uri) -> Response {
    state.gate.handle(Endpoint::PlaylistItems, &method, &uri).await
}

async fn metrics_handler(State(state): State<ServerState>) -> Response {
    match state.metrics {
        Some(exporter) => exporter.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("📡 Received SIGINT (Ctrl+C), initiating graceful shutdown..."),
        _ = terminate => info!("📡 Received SIGTERM, initiating graceful shutdown..."),
    }
}
