//! Core data models for the classifier

use serde::{Deserialize, Serialize};

/// Static guidance record attached to a predicted label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub description: String,
    pub symptoms: Vec<String>,
    pub treatment: String,
    pub prevention: String,
    pub message: String,
}

/// Decoded model output: winning label and its confidence in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

/// Final per-request prediction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub model: String,
    pub label: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Advisory>,
}
