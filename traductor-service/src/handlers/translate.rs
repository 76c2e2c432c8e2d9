use axum::{body::Bytes, extract::State, Json};
use tracing::{info, instrument};
use utoipa::OpenApi;

use crate::{
    error::{ErrorResponse, TraductorServiceError},
    server::AppState,
    types::{TranslationRequest, TranslationResponse},
};

pub const TRANSLATE_PATH: &str = "/translate";

#[derive(OpenApi)]
#[openapi(
    paths(translate_handler),
    components(schemas(TranslationRequest, TranslationResponse, ErrorResponse))
)]
pub(crate) struct TranslateOpenApi;

/// Translates the sentence in the `data` field of the request body.
///
/// The body is parsed as JSON regardless of its `Content-Type` header. The
/// greedy decoding loop runs on the blocking thread pool, so a long
/// translation never stalls the async runtime.
///
/// # Errors
///
/// * `400 Bad Request` (`INVALID_BODY`) if the body is not JSON or has no
///   string `data` field
/// * `500 Internal Server Error` (`MODEL_ERROR`) if the model fails
/// * `500 Internal Server Error` (`INTERNAL_ERROR`) if the decoding task panics
#[utoipa::path(
    post,
    path = "",
    tag = "translate",
    request_body = TranslationRequest,
    responses(
        (status = OK, description = "Sentence translated", body = TranslationResponse),
        (status = BAD_REQUEST, description = "Invalid request body", body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Translation failed", body = ErrorResponse)
    )
)]
#[instrument(level = "info", skip_all, fields(path = TRANSLATE_PATH))]
pub async fn translate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TranslationResponse>, TraductorServiceError> {
    let TranslationRequest { data } =
        serde_json::from_slice(&body).map_err(|e| TraductorServiceError::InvalidBody {
            message: e.to_string(),
            endpoint: TRANSLATE_PATH.to_string(),
        })?;
    info!("Received translation request");

    let translator = state.translator.clone();
    let translation = tokio::task::spawn_blocking(move || translator.translate(&data))
        .await
        .map_err(|e| TraductorServiceError::InternalError {
            message: format!("Translation task failed: {e}"),
            endpoint: TRANSLATE_PATH.to_string(),
        })?
        .map_err(|e| TraductorServiceError::ModelError {
            model_error: e.to_string(),
            endpoint: TRANSLATE_PATH.to_string(),
        })?;

    Ok(Json(TranslationResponse { data: translation }))
}
