use axum::Json;
use utoipa::OpenApi;

use crate::types::GreetingResponse;

pub const HOME_PATH: &str = "/";

const GREETING: &str = "Hello world!";

#[derive(OpenApi)]
#[openapi(paths(home_handler), components(schemas(GreetingResponse)))]
pub(crate) struct HomeOpenApi;

/// Greets the caller, whatever the request carries.
#[utoipa::path(
    get,
    path = "",
    tag = "home",
    responses(
        (status = OK, description = "Greeting", body = GreetingResponse)
    )
)]
pub async fn home_handler() -> Json<GreetingResponse> {
    Json(GreetingResponse {
        data: GREETING.to_string(),
    })
}
