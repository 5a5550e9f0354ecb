//! Classifier configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Classifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Directory holding model artifacts, addressed as `<identifier>.onnx`
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

impl ClassifierConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CLASSIFIER"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| ClassifierConfig {
            model_dir: default_model_dir(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir() {
        assert_eq!(default_model_dir(), PathBuf::from("models"));
    }
}
