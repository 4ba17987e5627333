//! HTTP surface
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | POST | `/api/vcluster` | [`handlers::create_cluster`] |
//! | GET | `/api/vcluster/{name}/kubeconfig` | [`handlers::get_kubeconfig`] |
//! | GET | `/api/vcluster/{name}/endpoint` | [`handlers::get_endpoint`] |
//! | DELETE | `/api/vcluster/{name}` | [`handlers::delete_cluster`] |
//! | GET | `/api/vclusters` | [`handlers::list_clusters`] |
//! | GET | `/download` | [`handlers::download`] |
//!
//! Every response allows any origin. Wrong methods answer 405.

mod error;
pub mod handlers;
pub mod identity;


use crate::config::ServiceConfig;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use host_client::{HostClientTrait, HostConnector};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Largest accepted request body, uploads included.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    /// Opens a host client for a given set of credentials
    pub connector: Arc<dyn HostConnector>,
    /// Cancelled when the service shuts down; polls get a child of it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServiceConfig, connector: Arc<dyn HostConnector>, shutdown: CancellationToken) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            shutdown,
        }
    }

    /// Host client for the read paths' credentials.
    fn read_host(&self) -> Arc<dyn HostClientTrait> {
        self.connector.connect(self.config.read_credentials().as_deref())
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/api/vcluster", post(handlers::create_cluster))
        .route("/api/vcluster/{name}", delete(handlers::delete_cluster))
        .route("/api/vcluster/{name}/kubeconfig", get(handlers::get_kubeconfig))
        .route("/api/vcluster/{name}/endpoint", get(handlers::get_endpoint))
        .route("/api/vclusters", get(handlers::list_clusters))
        .route("/download", get(handlers::download))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
