use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::watch::Receiver};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use traductor_inference::Translator;
use utoipa::OpenApi;

use crate::{
    components::openapi::openapi_routes,
    handlers::{home_handler, translate_handler, HOME_PATH, TRANSLATE_PATH},
};

pub const HEALTH_PATH: &str = "/health";

/// Shared, read-only state handed to every request handler.
///
/// Built once at start-up and dropped when the server shuts down.
#[derive(Clone)]
pub struct AppState {
    /// Target vocabulary and loaded model, behind the greedy decoding loop.
    pub translator: Arc<Translator>,
}

#[derive(OpenApi)]
#[openapi(paths(health))]
pub(crate) struct HealthOpenApi;

/// Creates the application router.
///
/// # API Endpoints
///
/// * `GET /` - Greeting
/// * `POST /translate` - Translate an English sentence into Spanish
/// * `GET /health` - Service health status
/// * `GET /api-docs/openapi.json` - OpenAPI document
///
/// Every route accepts cross-origin requests from any origin.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route(HOME_PATH, get(home_handler))
        .route(TRANSLATE_PATH, post(translate_handler))
        .route(HEALTH_PATH, get(health))
        .with_state(app_state)
        .merge(openapi_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
}

/// Serves the application until `shutdown_receiver` observes a change.
///
/// # Errors
///
/// Returns an error if the server fails while accepting or serving connections.
pub async fn run_server(
    app_state: AppState,
    tcp_listener: TcpListener,
    mut shutdown_receiver: Receiver<bool>,
) -> anyhow::Result<()> {
    let app = create_router(app_state);
    let server =
        axum::serve(tcp_listener, app.into_make_service()).with_graceful_shutdown(async move {
            // A dropped sender also means shutdown
            shutdown_receiver.changed().await.ok();
            info!(
                target = "traductor-service",
                event = "server-shutdown",
                "Shutting down server..."
            );
        });
    server.await?;
    Ok(())
}

/// Reports that the server is up and responsive.
#[utoipa::path(
    get,
    path = "",
    tag = "health",
    responses(
        (status = OK, description = "Service is healthy", body = Value)
    )
)]
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
