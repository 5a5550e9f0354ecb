//! Classification pipeline
//!
//! Orchestrates the request path: family resolution, cached model load,
//! preprocessing, inference, and decode with advisory attachment.

mod decode;
mod inference;
mod preprocess;

pub use decode::{advisory_for, decode};
pub use inference::{DiskModelLoader, InferenceModel, ModelLoader, XceptionNetwork};
pub use preprocess::preprocess;

use crate::cache::{CacheStats, ModelCache};
use crate::config::ClassifierConfig;
use crate::error::PredictError;
use crate::models::PredictionResponse;
use crate::registry::PipelineRegistry;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Image classification serving core
///
/// Shared across concurrent requests; the model cache is the only mutable
/// state, everything else is read-only after construction.
pub struct Classifier {
    registry: Arc<PipelineRegistry>,
    cache: ModelCache,
    loader: Arc<dyn ModelLoader>,
}

impl Classifier {
    /// Create a classifier over a validated registry and a loader
    pub fn new(registry: Arc<PipelineRegistry>, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            registry,
            cache: ModelCache::new(),
            loader,
        }
    }

    /// Create a classifier with the built-in families and disk-backed loader
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let registry = Arc::new(PipelineRegistry::builtin()?);
        let loader = Arc::new(DiskModelLoader::new(config.model_dir.clone()));
        Ok(Self::new(registry, loader))
    }

    /// Classify an image with the named model
    ///
    /// Resolution happens before any cache or loader work, so an unsupported
    /// identifier fails without side effects. Preprocessing and inference
    /// run on the blocking pool to keep the async workers responsive.
    pub async fn predict(
        &self,
        model_name: &str,
        image: Vec<u8>,
    ) -> Result<PredictionResponse, PredictError> {
        let start = Instant::now();
        let family = self.registry.resolve(model_name)?;

        let loader = self.loader.clone();
        let owned_name = model_name.to_string();
        let owned_family = family.clone();
        let model = self
            .cache
            .get_or_load(model_name, move || async move {
                loader.load(&owned_name, &owned_family).await
            })
            .await?;

        let kind = family.pipeline;
        let tensor = tokio::task::spawn_blocking(move || preprocess(&image, kind))
            .await
            .map_err(|e| PredictError::Inference {
                model: model_name.to_string(),
                reason: format!("preprocessing task failed: {e}"),
            })??;

        let worker = model.clone();
        let probabilities = tokio::task::spawn_blocking(move || worker.infer(tensor))
            .await
            .map_err(|e| PredictError::Inference {
                model: model_name.to_string(),
                reason: format!("inference task failed: {e}"),
            })?
            .map_err(|e| PredictError::Inference {
                model: model_name.to_string(),
                reason: format!("{e:#}"),
            })?;

        let classification = decode(&probabilities, family)?;
        let recommendation = advisory_for(family, &classification.label)?;

        debug!(
            model = %model_name,
            label = %classification.label,
            confidence = classification.confidence,
            duration_us = start.elapsed().as_micros() as u64,
            "Prediction completed"
        );

        Ok(PredictionResponse {
            model: model_name.to_string(),
            label: classification.label,
            confidence: classification.confidence,
            recommendation,
        })
    }

    /// Counts of loaded and in-flight models
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
