use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use serde::Deserialize;
use tracing::{info, instrument};

use crate::models::ModelError;

/// Token reserved for padding, always at id 0.
pub const PADDING_TOKEN: &str = "";
/// Token every out-of-vocabulary word maps to, always at id 1.
pub const UNKNOWN_TOKEN: &str = "[UNK]";
/// Id of [`PADDING_TOKEN`].
pub const PADDING_TOKEN_ID: u32 = 0;
/// Id of [`UNKNOWN_TOKEN`].
pub const UNKNOWN_TOKEN_ID: u32 = 1;

/// Characters removed from the text before splitting it into words.
const PUNCTUATION: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~'";

/// On-disk layout of the text vectorizer side-car file.
#[derive(Debug, Deserialize)]
struct VectorizerFile {
    max_tokens: Option<usize>,
    output_sequence_length: Option<usize>,
    vocab_data: Vec<String>,
}

/// Ordered token list, where a token's position is its id.
///
/// The first two entries are always [`PADDING_TOKEN`] and [`UNKNOWN_TOKEN`].
#[derive(Clone, Debug)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
    output_sequence_length: Option<usize>,
}

impl Vocabulary {
    /// Builds a vocabulary out of a raw token list.
    ///
    /// The padding and unknown tokens are prepended unless the list already
    /// starts with them, and the result is capped to `max_tokens` entries.
    pub fn new(
        mut tokens: Vec<String>,
        max_tokens: Option<usize>,
        output_sequence_length: Option<usize>,
    ) -> Result<Self, ModelError> {
        let has_special_tokens = tokens.len() >= 2
            && tokens[0] == PADDING_TOKEN
            && tokens[1] == UNKNOWN_TOKEN;
        if !has_special_tokens {
            let mut with_special_tokens =
                vec![PADDING_TOKEN.to_string(), UNKNOWN_TOKEN.to_string()];
            with_special_tokens.append(&mut tokens);
            tokens = with_special_tokens;
        }
        if let Some(max_tokens) = max_tokens {
            if max_tokens < 2 {
                return Err(ModelError::InvalidConfig(format!(
                    "max_tokens must leave room for the padding and unknown tokens, got {max_tokens}"
                )));
            }
            tokens.truncate(max_tokens);
        }

        let mut ids = HashMap::with_capacity(tokens.len());
        for (id, token) in tokens.iter().enumerate() {
            // First occurrence wins on duplicated entries
            ids.entry(token.clone()).or_insert(id as u32);
        }

        Ok(Self {
            tokens,
            ids,
            output_sequence_length,
        })
    }

    /// Loads the vocabulary from the text vectorizer JSON file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let file = File::open(path.as_ref())?;
        let VectorizerFile {
            max_tokens,
            output_sequence_length,
            vocab_data,
        } = serde_json::from_reader(BufReader::new(file))?;
        let vocabulary = Self::new(vocab_data, max_tokens, output_sequence_length)?;
        info!(
            target = "traductor-inference",
            event = "vocabulary-loaded",
            size = vocabulary.len(),
            output_sequence_length = ?vocabulary.output_sequence_length,
            "Loaded text vectorizer vocabulary"
        );
        Ok(vocabulary)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Padded length of every vectorized sequence, if any.
    pub fn output_sequence_length(&self) -> Option<usize> {
        self.output_sequence_length
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns the token at position `id`.
    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Returns the id of `token`, falling back to [`UNKNOWN_TOKEN_ID`].
    pub fn token_id(&self, token: &str) -> u32 {
        self.ids.get(token).copied().unwrap_or(UNKNOWN_TOKEN_ID)
    }

    /// Turns raw text into a sequence of token ids.
    ///
    /// The text is ASCII-lowercased, stripped of ASCII punctuation and split
    /// on whitespace. The result is padded with [`PADDING_TOKEN_ID`] or
    /// truncated to the output sequence length, when one is configured.
    pub fn vectorize(&self, text: &str) -> Vec<u32> {
        let standardized = standardize(text);
        let mut ids: Vec<u32> = standardized
            .split_whitespace()
            .map(|word| self.token_id(word))
            .collect();
        if let Some(length) = self.output_sequence_length {
            ids.resize(length, PADDING_TOKEN_ID);
        }
        ids
    }
}

fn standardize(text: &str) -> String {
    text.chars()
        .filter(|c| !PUNCTUATION.contains(*c))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
