use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of a translation request.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TranslationRequest {
    /// English sentence to translate
    #[schema(example = "I like soccer")]
    pub data: String,
}

/// Body of a translation response.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TranslationResponse {
    /// Spanish translation, empty when the model ends decoding right away
    #[schema(example = "me gusta el fútbol")]
    pub data: String,
}

/// Body returned by the root endpoint.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct GreetingResponse {
    #[schema(example = "Hello world!")]
    pub data: String,
}
