use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use storage::{CancellationToken, DistributionEngine};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};
use crate::{ApiError, ApiResult, API_PREFIX};

pub struct Server {
    config: crate::Config,
    app_state: Arc<AppState>,
}

impl Server {
    pub fn new(config: crate::Config, engine: Arc<DistributionEngine>) -> Self {
        let app_state = Arc::new(AppState {
            engine,
            max_upload_size: config.max_upload_size,
        });

        Self { config, app_state }
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests.
    pub async fn start(&self, shutdown: CancellationToken) -> ApiResult<()> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::InternalError(format!("Failed to bind to {}: {}", addr, e)))?;

        self.serve(listener, shutdown).await
    }

    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> ApiResult<()> {
        let addr = listener
            .local_addr()
            .map_err(|e| ApiError::InternalError(format!("Listener has no address: {}", e)))?;
        tracing::info!("Starting API server on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ApiError::InternalError(format!("Server error: {}", e)))?;

        tracing::info!("API server on {} stopped", addr);
        Ok(())
    }

    pub fn router(&self) -> Router {
        let api_routes = Router::new()
            .route("/file", post(handlers::upload_file).get(handlers::download_file))
            .route("/stats", get(handlers::stats))
            .route("/nodes", post(handlers::add_node));

        Router::new()
            .nest(API_PREFIX, api_routes)
            .route("/health", get(handlers::health_check))
            .fallback(not_found)
            .layer(
                ServiceBuilder::new()
                    .layer(CatchPanicLayer::new())
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            .with_state(self.app_state.clone())
    }
}

async fn not_found() -> ApiResult<axum::response::Response> {
    Err(ApiError::InvalidRequest("Not found".to_string()))
}
