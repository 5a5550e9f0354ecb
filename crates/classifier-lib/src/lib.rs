//! Image classification serving core
//!
//! This crate provides the model registry/dispatch and decode pipeline for
//! a crop disease classification service:
//! - Prefix-based routing of model identifiers to pipeline families
//! - A model cache with exactly-once load semantics under concurrency
//! - Image-to-tensor preprocessing
//! - Inference execution, argmax decoding, and advisory lookup
//!
//! Transport, upload handling, and process wiring are the embedder's
//! concern; every request-path failure is returned as a typed
//! [`PredictError`] kind for the embedder to map.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;

pub use cache::{CacheStats, ModelCache};
pub use classifier::{Classifier, DiskModelLoader, InferenceModel, ModelLoader};
pub use config::ClassifierConfig;
pub use error::PredictError;
pub use models::*;
pub use registry::{FamilySpec, PipelineKind, PipelineRegistry};
