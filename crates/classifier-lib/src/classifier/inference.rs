//! Model loading and execution using tract
//!
//! Wraps an optimized tract plan behind the `InferenceModel` seam used by
//! the cache and orchestrator, and provides the disk-backed loader that
//! reads ONNX artifacts addressed by model identifier.

use crate::registry::FamilySpec;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use tract_onnx::prelude::*;

type TractPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A loaded, ready-to-invoke model handle
///
/// Handles are created once by a loader, cached, and shared read-only
/// across requests for the lifetime of the process.
pub trait InferenceModel: Send + Sync + std::fmt::Debug {
    /// Identifier the handle was loaded for
    fn identifier(&self) -> &str;

    /// Run the model on a preprocessed input tensor and return the raw
    /// output vector. The values are a ranking signal; they are not assumed
    /// to sum to 1. No retry on failure.
    fn infer(&self, input: Tensor) -> Result<Vec<f32>>;
}

/// Produces model handles for the cache
///
/// Seam between the cache and the artifact store; tests substitute
/// deterministic implementations.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, identifier: &str, family: &FamilySpec)
        -> Result<Arc<dyn InferenceModel>>;
}

/// tract-backed handle for the Xception-style image classifiers
pub struct XceptionNetwork {
    identifier: String,
    plan: TractPlan,
    /// SHA256 of the artifact bytes, for deployment diagnostics
    pub checksum: String,
    pub size_bytes: usize,
    pub loaded_at: i64,
}

impl XceptionNetwork {
    /// Parse and optimize an ONNX artifact against a family's input contract
    ///
    /// The input fact is pinned to the family's `[1, E, E, 3]` shape. When
    /// the optimized plan reports a concrete output dimension it must match
    /// the family's label count; shipping a model whose head disagrees with
    /// the label table is a deployment error caught here instead of at
    /// decode time.
    pub fn from_bytes(identifier: &str, family: &FamilySpec, bytes: &[u8]) -> Result<Self> {
        let edge = family.pipeline.input_edge();
        let plan = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, edge, edge, 3]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;

        if let Some(classes) = declared_output_classes(&plan) {
            if classes != family.class_count() {
                bail!(
                    "model emits {} classes but family {} declares {}",
                    classes,
                    family.name,
                    family.class_count()
                );
            }
        }

        Ok(Self {
            identifier: identifier.to_string(),
            plan,
            checksum: compute_checksum(bytes),
            size_bytes: bytes.len(),
            loaded_at: chrono::Utc::now().timestamp(),
        })
    }
}

impl std::fmt::Debug for XceptionNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XceptionNetwork")
            .field("identifier", &self.identifier)
            .field("checksum", &self.checksum)
            .field("size_bytes", &self.size_bytes)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

impl InferenceModel for XceptionNetwork {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn infer(&self, input: Tensor) -> Result<Vec<f32>> {
        let start = Instant::now();

        let result = self.plan.run(tvec!(input.into()))?;
        let output = result.first().context("No output from model")?;
        let values: Vec<f32> = output.to_array_view::<f32>()?.iter().copied().collect();

        debug!(
            model = %self.identifier,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Inference completed"
        );
        Ok(values)
    }
}

/// Output class count, when the optimized plan pins a concrete shape
fn declared_output_classes(plan: &TractPlan) -> Option<usize> {
    let fact = plan.model().output_fact(0).ok()?;
    let shape = fact.shape.as_concrete()?;
    shape.last().copied()
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Loader reading artifacts from disk as `<model_dir>/<identifier>.onnx`
pub struct DiskModelLoader {
    model_dir: PathBuf,
}

impl DiskModelLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    fn artifact_path(&self, identifier: &str) -> PathBuf {
        self.model_dir.join(format!("{identifier}.onnx"))
    }
}

#[async_trait]
impl ModelLoader for DiskModelLoader {
    async fn load(
        &self,
        identifier: &str,
        family: &FamilySpec,
    ) -> Result<Arc<dyn InferenceModel>> {
        let path = self.artifact_path(identifier);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read model artifact {:?}", path))?;

        // Parsing and graph optimization are CPU-heavy; keep them off the
        // async workers.
        let owned_identifier = identifier.to_string();
        let owned_family = family.clone();
        let network = tokio::task::spawn_blocking(move || {
            XceptionNetwork::from_bytes(&owned_identifier, &owned_family, &bytes)
        })
        .await
        .context("Model parse task failed")??;

        info!(
            model = %network.identifier,
            size = network.size_bytes,
            checksum = %network.checksum,
            path = %path.display(),
            "Model artifact loaded"
        );

        Ok(Arc::new(network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PipelineKind;

    fn family() -> FamilySpec {
        FamilySpec {
            name: "maize".to_string(),
            prefix: "xception_maize".to_string(),
            pipeline: PipelineKind::Xception,
            labels: vec!["a".to_string(), "b".to_string()],
            advisories: None,
        }
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"model weights");
        assert_eq!(checksum.len(), 64); // SHA256 hex is 64 chars
        assert_eq!(checksum, compute_checksum(b"model weights"));
        assert_ne!(checksum, compute_checksum(b"other weights"));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = XceptionNetwork::from_bytes("xception_maize", &family(), b"not onnx").unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn test_artifact_path_layout() {
        let loader = DiskModelLoader::new("/var/lib/classifier/models");
        assert_eq!(
            loader.artifact_path("xception_maize"),
            PathBuf::from("/var/lib/classifier/models/xception_maize.onnx")
        );
    }

    #[tokio::test]
    async fn test_missing_artifact_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let loader = DiskModelLoader::new(temp_dir.path());

        let err = loader.load("xception_maize", &family()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read model artifact"));
    }

    #[tokio::test]
    async fn test_corrupt_artifact_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("xception_maize.onnx"), b"garbage").unwrap();

        let loader = DiskModelLoader::new(temp_dir.path());
        assert!(loader.load("xception_maize", &family()).await.is_err());
    }
}
