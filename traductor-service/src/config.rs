use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Default address the service listens on.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5000";
/// Default location of the text vectorizer side-car file.
pub const DEFAULT_VECTORIZER_PATH: &str = "Models/Attention/text_vectorizer.json";
/// Default location of the serialized translation model directory.
pub const DEFAULT_MODEL_PATH: &str = "Models/Attention/TranslationModel";

/// Section holding the service settings, both in files and in environment variables.
const CONFIG_SECTION: &str = "traductor_service";

/// Configuration for the translation service.
///
/// Every field has a default, so the service starts without any
/// configuration file as long as the artifacts sit at their default paths.
#[derive(Debug, Deserialize)]
pub struct TraductorServiceConfig {
    /// Address and port the HTTP server binds to, e.g. "127.0.0.1:5000".
    pub service_bind_address: String,

    /// Path to the JSON file with the target vocabulary, the maximum token
    /// count and the maximum output sequence length.
    pub vectorizer_path: PathBuf,

    /// Path to the directory holding the model architecture and weights.
    pub model_path: PathBuf,
}

impl TraductorServiceConfig {
    /// Builds the configuration from defaults, an optional configuration
    /// file and environment variables, in increasing order of precedence.
    ///
    /// # Arguments
    ///
    /// * `config_file_path` - Optional path to a file in a format supported by
    ///   the `config` crate (YAML, TOML, JSON, ...), with a `traductor_service`
    ///   section.
    ///
    /// Environment variables use the `TRADUCTOR_SERVICE__` prefix, for
    /// instance `TRADUCTOR_SERVICE__SERVICE_BIND_ADDRESS=0.0.0.0:8080`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// has the wrong type.
    pub fn from_file_path<P: AsRef<Path>>(
        config_file_path: Option<P>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default(
                format!("{CONFIG_SECTION}.service_bind_address"),
                DEFAULT_BIND_ADDRESS,
            )?
            .set_default(
                format!("{CONFIG_SECTION}.vectorizer_path"),
                DEFAULT_VECTORIZER_PATH,
            )?
            .set_default(format!("{CONFIG_SECTION}.model_path"), DEFAULT_MODEL_PATH)?;
        if let Some(path) = config_file_path {
            builder = builder.add_source(File::from(path.as_ref()));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("TRADUCTOR_SERVICE")
                    .keep_prefix(true)
                    .separator("__"),
            )
            .build()?;
        config.get::<Self>(CONFIG_SECTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = TraductorServiceConfig::from_file_path(None::<&Path>).unwrap();
        assert_eq!(config.service_bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.vectorizer_path, PathBuf::from(DEFAULT_VECTORIZER_PATH));
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[traductor_service]\nservice_bind_address = \"0.0.0.0:8080\"\nmodel_path = \"/models/es\"\n",
        )
        .unwrap();

        let config = TraductorServiceConfig::from_file_path(Some(&path)).unwrap();
        assert_eq!(config.service_bind_address, "0.0.0.0:8080");
        assert_eq!(config.model_path, PathBuf::from("/models/es"));
        assert_eq!(config.vectorizer_path, PathBuf::from(DEFAULT_VECTORIZER_PATH));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = TraductorServiceConfig::from_file_path(Some("does/not/exist.toml"));
        assert!(result.is_err());
    }
}
