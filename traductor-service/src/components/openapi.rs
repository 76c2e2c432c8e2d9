use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::handlers::{home::HomeOpenApi, translate::TranslateOpenApi, HOME_PATH, TRANSLATE_PATH};
use crate::server::{HealthOpenApi, HEALTH_PATH};

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    nest(
        (path = HOME_PATH, api = HomeOpenApi),
        (path = TRANSLATE_PATH, api = TranslateOpenApi),
        (path = HEALTH_PATH, api = HealthOpenApi),
    ),
    tags(
        (name = "home", description = "Greeting"),
        (name = "translate", description = "English to Spanish translation"),
        (name = "health", description = "Health check"),
    ),
    servers(
        (url = "http://localhost:5000"),
    )
)]
pub struct ApiDoc;

pub fn openapi_routes() -> Router {
    Router::new().route(OPENAPI_PATH, get(|| async { Json(ApiDoc::openapi()) }))
}
