use candle::{
    utils::{cuda_is_available, metal_is_available},
    Device, Error as CandleError, Tensor,
};
use thiserror::Error;
use tracing::info;

pub mod attention;

pub use attention::{AttentionTranslator, AttentionTranslatorConfig};

/// A pretrained sequence-to-sequence model.
///
/// Implementations are treated as opaque: the decoding loop only relies on
/// this single capability and never on the network architecture behind it.
pub trait Seq2SeqModel: Send + Sync {
    /// Runs a full forward pass over `source` and the partial target
    /// `decoder_input` (start token followed by the words decoded so far).
    ///
    /// Returns a `[positions, vocabulary]` tensor holding, for every decoder
    /// position, a probability distribution over the target vocabulary.
    fn predict(&self, source: &str, decoder_input: &str) -> Result<Tensor, ModelError>;
}

pub fn device(device_id: usize) -> Result<Device, CandleError> {
    if cuda_is_available() {
        info!("Using CUDA");
        Device::new_cuda(device_id)
    } else if metal_is_available() {
        info!("Using Metal");
        Device::new_metal(device_id)
    } else {
        info!("Using Cpu");
        Ok(Device::Cpu)
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Candle error: `{0}`")]
    CandleError(#[from] CandleError),
    #[error("Invalid model configuration: `{0}`")]
    InvalidConfig(String),
    #[error("IO error: `{0}`")]
    Io(#[from] std::io::Error),
    #[error("Failed to deserialize model artifact: `{0}`")]
    DeserializeError(#[from] serde_json::Error),
}
