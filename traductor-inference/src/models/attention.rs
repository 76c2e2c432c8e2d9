use std::{fs::File, io::BufReader, path::Path, time::Instant};

use candle::{DType, Device, Tensor};
use candle_nn::{
    embedding, linear, lstm, ops::softmax_last_dim, rnn::LSTMState, Embedding, LSTMConfig,
    Linear, Module, VarBuilder, LSTM, RNN,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    models::{ModelError, Seq2SeqModel},
    vocabulary::{Vocabulary, PADDING_TOKEN_ID},
};

/// Name of the architecture file inside the model directory.
pub const CONFIG_FILE: &str = "config.json";
/// Name of the weights file inside the model directory.
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Architecture description stored next to the model weights.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AttentionTranslatorConfig {
    /// Source language vocabulary, the encoder's token list.
    pub source_vocabulary: Vec<String>,
    /// Cap on the source vocabulary size.
    pub source_max_tokens: Option<usize>,
    /// Padded length of the vectorized source sentence.
    pub source_sequence_length: Option<usize>,
    /// Width of both token embeddings.
    pub embedding_dim: usize,
    /// Hidden size of each encoder direction. The decoder hidden size is twice this value.
    pub encoder_hidden_dim: usize,
}

impl AttentionTranslatorConfig {
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        if config.embedding_dim == 0 || config.encoder_hidden_dim == 0 {
            return Err(ModelError::InvalidConfig(
                "embedding_dim and encoder_hidden_dim must be positive".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Encoder-decoder translation network with dot-product attention.
///
/// The encoder is a bidirectional LSTM over the source embeddings. The
/// decoder LSTM starts from the concatenated final encoder states and
/// attends over every encoder output before projecting onto the target
/// vocabulary.
pub struct AttentionTranslator {
    source_vocabulary: Vocabulary,
    target_vocabulary: Vocabulary,
    encoder_embedding: Embedding,
    decoder_embedding: Embedding,
    encoder_forward: LSTM,
    encoder_backward: LSTM,
    decoder: LSTM,
    output: Linear,
    device: Device,
}

impl AttentionTranslator {
    pub fn new(
        config: AttentionTranslatorConfig,
        target_vocabulary: Vocabulary,
        vb: VarBuilder,
    ) -> Result<Self, ModelError> {
        let AttentionTranslatorConfig {
            source_vocabulary,
            source_max_tokens,
            source_sequence_length,
            embedding_dim,
            encoder_hidden_dim,
        } = config;
        let source_vocabulary =
            Vocabulary::new(source_vocabulary, source_max_tokens, source_sequence_length)?;
        let decoder_hidden_dim = 2 * encoder_hidden_dim;

        let encoder_embedding = embedding(
            source_vocabulary.len(),
            embedding_dim,
            vb.pp("encoder_embedding"),
        )?;
        let decoder_embedding = embedding(
            target_vocabulary.len(),
            embedding_dim,
            vb.pp("decoder_embedding"),
        )?;
        let encoder_forward = lstm(
            embedding_dim,
            encoder_hidden_dim,
            LSTMConfig::default(),
            vb.pp("encoder_forward"),
        )?;
        let encoder_backward = lstm(
            embedding_dim,
            encoder_hidden_dim,
            LSTMConfig::default(),
            vb.pp("encoder_backward"),
        )?;
        let decoder = lstm(
            embedding_dim,
            decoder_hidden_dim,
            LSTMConfig::default(),
            vb.pp("decoder"),
        )?;
        let output = linear(decoder_hidden_dim, target_vocabulary.len(), vb.pp("output"))?;

        Ok(Self {
            source_vocabulary,
            target_vocabulary,
            encoder_embedding,
            decoder_embedding,
            encoder_forward,
            encoder_backward,
            decoder,
            output,
            device: vb.device().clone(),
        })
    }

    /// Loads the model from a directory holding [`CONFIG_FILE`] and [`WEIGHTS_FILE`].
    #[instrument(level = "info", skip_all, fields(model_dir = %model_dir.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(
        model_dir: P,
        target_vocabulary: Vocabulary,
        device: &Device,
    ) -> Result<Self, ModelError> {
        info!("Loading attention translation model ...");
        let start = Instant::now();

        let model_dir = model_dir.as_ref();
        let config = AttentionTranslatorConfig::from_file_path(model_dir.join(CONFIG_FILE))?;
        let weights_filenames = [model_dir.join(WEIGHTS_FILE)];
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&weights_filenames, DType::F32, device)? };
        let model = Self::new(config, target_vocabulary, vb)?;

        info!("Loaded the model in {:?}", start.elapsed());
        Ok(model)
    }

    /// Returns the `[1, source_len, 2 * encoder_hidden_dim]` encoder outputs
    /// and the decoder's initial state.
    fn encode(&self, source: &str) -> candle::Result<(Tensor, LSTMState)> {
        let mut ids = self.source_vocabulary.vectorize(source);
        // Trailing padding is masked out by never feeding it to the encoder
        let length = ids
            .iter()
            .rposition(|id| *id != PADDING_TOKEN_ID)
            .map_or(0, |position| position + 1);
        ids.truncate(length.max(1));
        if ids.is_empty() {
            ids.push(PADDING_TOKEN_ID);
        }

        let input = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let embedded = self.encoder_embedding.forward(&input)?;

        let reversed_positions: Vec<u32> = (0..ids.len() as u32).rev().collect();
        let reversed_positions = Tensor::new(reversed_positions.as_slice(), &self.device)?;

        let forward_states = self.encoder_forward.seq(&embedded)?;
        let backward_states = self
            .encoder_backward
            .seq(&embedded.index_select(&reversed_positions, 1)?)?;

        let forward_outputs = self.encoder_forward.states_to_tensor(&forward_states)?;
        let backward_outputs = self
            .encoder_backward
            .states_to_tensor(&backward_states)?
            .index_select(&reversed_positions, 1)?;
        let outputs = Tensor::cat(&[&forward_outputs, &backward_outputs], 2)?;

        let (last_forward, last_backward) = match (forward_states.last(), backward_states.last()) {
            (Some(forward), Some(backward)) => (forward, backward),
            _ => candle::bail!("encoder produced no states"),
        };
        let state = LSTMState::new(
            Tensor::cat(&[last_forward.h(), last_backward.h()], 1)?,
            Tensor::cat(&[last_forward.c(), last_backward.c()], 1)?,
        );

        Ok((outputs, state))
    }

    fn decode(
        &self,
        decoder_input: &str,
        encoder_outputs: &Tensor,
        initial_state: &LSTMState,
    ) -> candle::Result<Tensor> {
        let mut ids = self.target_vocabulary.vectorize(decoder_input);
        if ids.is_empty() {
            ids.push(PADDING_TOKEN_ID);
        }
        let input = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let embedded = self.decoder_embedding.forward(&input)?;

        let states = self.decoder.seq_init(&embedded, initial_state)?;
        let decoder_outputs = self.decoder.states_to_tensor(&states)?;

        // Dot-product attention, queries are the decoder outputs
        let scores = decoder_outputs.matmul(&encoder_outputs.t()?.contiguous()?)?;
        let weights = softmax_last_dim(&scores)?;
        let context = weights.matmul(encoder_outputs)?;

        let logits = self.output.forward(&context)?;
        softmax_last_dim(&logits)?.squeeze(0)
    }
}

impl Seq2SeqModel for AttentionTranslator {
    fn predict(&self, source: &str, decoder_input: &str) -> Result<Tensor, ModelError> {
        let start = Instant::now();
        let (encoder_outputs, state) = self.encode(source)?;
        let probabilities = self.decode(decoder_input, &encoder_outputs, &state)?;
        debug!("Forward pass took {:?}", start.elapsed());
        Ok(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use candle_nn::VarMap;

    use super::*;

    const SEQUENCE_LENGTH: usize = 6;

    fn target_vocabulary() -> Vocabulary {
        let tokens = ["startofseq", "endofseq", "me", "gusta", "el", "fútbol"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        Vocabulary::new(tokens, None, Some(SEQUENCE_LENGTH)).unwrap()
    }

    fn config() -> AttentionTranslatorConfig {
        AttentionTranslatorConfig {
            source_vocabulary: ["i", "like", "soccer"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            source_max_tokens: None,
            source_sequence_length: Some(SEQUENCE_LENGTH),
            embedding_dim: 4,
            encoder_hidden_dim: 3,
        }
    }

    #[test]
    fn test_predict_returns_distribution_per_position() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = AttentionTranslator::new(config(), target_vocabulary(), vb).unwrap();

        let probabilities = model.predict("I like soccer", "startofseq me").unwrap();
        assert_eq!(probabilities.dims(), &[SEQUENCE_LENGTH, 8]);

        let sums = probabilities.sum(1).unwrap().to_vec1::<f32>().unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-4, "row does not sum to one: {sum}");
        }
    }

    #[test]
    fn test_predict_handles_empty_source() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = AttentionTranslator::new(config(), target_vocabulary(), vb).unwrap();

        let probabilities = model.predict("", "startofseq").unwrap();
        assert_eq!(probabilities.dims(), &[SEQUENCE_LENGTH, 8]);
    }

    #[test]
    fn test_encode_joins_final_states_of_both_directions() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = AttentionTranslator::new(config(), target_vocabulary(), vb).unwrap();
        let hidden_dim = config().encoder_hidden_dim;

        let (outputs, state) = model.encode("I like soccer").unwrap();
        assert_eq!(outputs.dims(), &[1, 3, 2 * hidden_dim]);
        assert_eq!(state.h().dims(), &[1, 2 * hidden_dim]);
        assert_eq!(state.c().dims(), &[1, 2 * hidden_dim]);

        // Source ids: 2 "i", 3 "like", 4 "soccer"
        let embed = |ids: &[u32]| {
            let input = Tensor::new(ids, &Device::Cpu).unwrap().unsqueeze(0).unwrap();
            model.encoder_embedding.forward(&input).unwrap()
        };
        let forward_states = model.encoder_forward.seq(&embed(&[2, 3, 4])).unwrap();
        let backward_states = model.encoder_backward.seq(&embed(&[4, 3, 2])).unwrap();
        let last_forward = forward_states.last().unwrap();
        let last_backward = backward_states.last().unwrap();

        let expected_h = Tensor::cat(&[last_forward.h(), last_backward.h()], 1).unwrap();
        let expected_c = Tensor::cat(&[last_forward.c(), last_backward.c()], 1).unwrap();
        assert_eq!(
            state.h().to_vec2::<f32>().unwrap(),
            expected_h.to_vec2::<f32>().unwrap()
        );
        assert_eq!(
            state.c().to_vec2::<f32>().unwrap(),
            expected_c.to_vec2::<f32>().unwrap()
        );

        // Forward half ends at the last word, backward half at the first one
        let forward_tail = outputs.narrow(1, 2, 1).unwrap().narrow(2, 0, hidden_dim).unwrap();
        let backward_head = outputs
            .narrow(1, 0, 1)
            .unwrap()
            .narrow(2, hidden_dim, hidden_dim)
            .unwrap();
        assert_eq!(
            forward_tail.squeeze(1).unwrap().to_vec2::<f32>().unwrap(),
            last_forward.h().to_vec2::<f32>().unwrap()
        );
        assert_eq!(
            backward_head.squeeze(1).unwrap().to_vec2::<f32>().unwrap(),
            last_backward.h().to_vec2::<f32>().unwrap()
        );
    }

    #[test]
    fn test_load_from_model_directory() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = AttentionTranslator::new(config(), target_vocabulary(), vb).unwrap();

        let model_dir = tempfile::tempdir().unwrap();
        varmap.save(model_dir.path().join(WEIGHTS_FILE)).unwrap();
        std::fs::write(
            model_dir.path().join(CONFIG_FILE),
            serde_json::to_vec(&config()).unwrap(),
        )
        .unwrap();

        let loaded =
            AttentionTranslator::load(model_dir.path(), target_vocabulary(), &Device::Cpu).unwrap();

        let expected = model
            .predict("soccer", "startofseq me gusta")
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        let actual = loaded
            .predict("soccer", "startofseq me gusta")
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_load_rejects_mismatched_vocabulary() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        AttentionTranslator::new(config(), target_vocabulary(), vb).unwrap();

        let model_dir = tempfile::tempdir().unwrap();
        varmap.save(model_dir.path().join(WEIGHTS_FILE)).unwrap();
        std::fs::write(
            model_dir.path().join(CONFIG_FILE),
            serde_json::to_vec(&config()).unwrap(),
        )
        .unwrap();

        let smaller = Vocabulary::new(vec!["startofseq".to_string()], None, None).unwrap();
        let result = AttentionTranslator::load(model_dir.path(), smaller, &Device::Cpu);
        assert!(matches!(result, Err(ModelError::CandleError(_))));
    }

    #[test]
    fn test_config_rejects_zero_dimensions() {
        let mut config = config();
        config.embedding_dim = 0;
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_vec(&config).unwrap()).unwrap();

        let result = AttentionTranslatorConfig::from_file_path(file.path());
        assert!(matches!(result, Err(ModelError::InvalidConfig(_))));
    }
}
