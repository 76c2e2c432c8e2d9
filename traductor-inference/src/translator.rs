use std::{path::Path, time::Instant};

use candle::{Device, IndexOp};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    models::{AttentionTranslator, ModelError, Seq2SeqModel},
    vocabulary::Vocabulary,
};

/// Token the decoder input always starts with.
pub const START_OF_SEQUENCE: &str = "startofseq";
/// Token that ends decoding.
pub const END_OF_SEQUENCE: &str = "endofseq";

/// Greedy autoregressive translator.
///
/// Owns the target vocabulary and the loaded model. Both are read-only once
/// constructed, so a single instance is shared by every request.
pub struct Translator {
    vocabulary: Vocabulary,
    model: Box<dyn Seq2SeqModel>,
    max_output_length: usize,
}

impl Translator {
    /// Creates a translator producing at most `output_sequence_length` words.
    ///
    /// A vocabulary without an output sequence length never decodes a word.
    pub fn new(vocabulary: Vocabulary, model: Box<dyn Seq2SeqModel>) -> Self {
        let max_output_length = vocabulary.output_sequence_length().unwrap_or_default();
        Self {
            vocabulary,
            model,
            max_output_length,
        }
    }

    /// Loads the text vectorizer file and the attention model directory.
    pub fn load<P: AsRef<Path>>(
        vectorizer_path: P,
        model_path: P,
        device: &Device,
    ) -> Result<Self, TranslatorError> {
        let vocabulary = Vocabulary::from_file_path(vectorizer_path)?;
        let model = AttentionTranslator::load(model_path, vocabulary.clone(), device)?;
        Ok(Self::new(vocabulary, Box::new(model)))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Upper bound on both the number of decoded words and forward passes.
    pub fn max_output_length(&self) -> usize {
        self.max_output_length
    }

    /// Translates `sentence`, one greedily chosen word per forward pass.
    ///
    /// Decoding stops on [`END_OF_SEQUENCE`] or after
    /// [`Self::max_output_length`] steps. The result is empty when the very
    /// first predicted token is the end marker.
    #[instrument(level = "info", skip(self), fields(event = "translate"))]
    pub fn translate(&self, sentence: &str) -> Result<String, TranslatorError> {
        info!("Translating sentence: {sentence}");
        let start = Instant::now();

        let mut translation = String::new();
        for step in 0..self.max_output_length {
            let decoder_input = format!("{START_OF_SEQUENCE} {translation}");
            let probabilities = self.model.predict(sentence, &decoder_input)?;

            let positions = probabilities.dim(0).map_err(ModelError::from)?;
            if step >= positions {
                return Err(TranslatorError::MissingPosition { step, positions });
            }
            let token_id = probabilities
                .i(step)
                .and_then(|row| row.argmax(0))
                .and_then(|id| id.to_scalar::<u32>())
                .map_err(ModelError::from)?;
            let token = self
                .vocabulary
                .token(token_id)
                .ok_or(TranslatorError::UnknownTokenId(token_id))?;
            debug!(step, token_id, token, "Predicted token");

            if token == END_OF_SEQUENCE {
                break;
            }
            translation.push(' ');
            translation.push_str(token);
        }

        let translation = translation.trim().to_string();
        info!("Translated sentence in {:?}: {translation}", start.elapsed());
        Ok(translation)
    }
}

#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("Model error: `{0}`")]
    ModelError(#[from] ModelError),
    #[error("Model predicted token id `{0}`, which is outside the vocabulary")]
    UnknownTokenId(u32),
    #[error("Model returned {positions} positions, no prediction for step {step}")]
    MissingPosition { step: usize, positions: usize },
}
