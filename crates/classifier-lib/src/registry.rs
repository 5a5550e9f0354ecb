//! Pipeline family registry
//!
//! Maps a model identifier to its pipeline family by prefix and owns the
//! per-family label and advisory tables. Families are parsed from a JSON
//! table and validated once at startup; the registry never changes after
//! construction, so lookups need no synchronization.

use crate::error::PredictError;
use crate::models::Advisory;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

/// Family table shipped with the crate
const BUILTIN_FAMILIES: &str = include_str!("../data/families.json");

/// Registered pipeline variants
///
/// Each variant fixes the preprocessing contract its models were trained
/// with. Adding a model family that reuses an existing variant is a JSON
/// registration; only a genuinely new preprocessing scheme adds a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Xception,
}

impl PipelineKind {
    /// Square input edge in pixels expected by models of this variant
    pub fn input_edge(&self) -> usize {
        match self {
            PipelineKind::Xception => 299,
        }
    }

    /// Rescale a raw channel value into the range the models were trained on
    pub fn rescale(&self, value: u8) -> f32 {
        match self {
            // Symmetric [0,255] -> [-1,1]
            PipelineKind::Xception => value as f32 / 127.5 - 1.0,
        }
    }
}

/// A registered pipeline family: shared pipeline behavior plus the
/// family's own label and advisory tables
#[derive(Debug, Clone, Deserialize)]
pub struct FamilySpec {
    pub name: String,
    /// Identifiers starting with this prefix belong to the family
    pub prefix: String,
    pub pipeline: PipelineKind,
    /// Ordered class names; index position matches model output position
    pub labels: Vec<String>,
    /// Advisory records keyed by label; absent for families without
    /// advisory support
    #[serde(default)]
    pub advisories: Option<HashMap<String, Advisory>>,
}

impl FamilySpec {
    /// Number of classes the family's models must emit
    pub fn class_count(&self) -> usize {
        self.labels.len()
    }

    pub fn has_advisories(&self) -> bool {
        self.advisories.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct FamilyTable {
    families: Vec<FamilySpec>,
}

/// Immutable registry resolving identifiers to pipeline families
#[derive(Debug)]
pub struct PipelineRegistry {
    families: Vec<FamilySpec>,
}

impl PipelineRegistry {
    /// Build the registry from the built-in family table
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_FAMILIES).context("built-in family table is invalid")
    }

    /// Parse a JSON family table and build a validated registry
    pub fn from_json(json: &str) -> Result<Self> {
        let table: FamilyTable =
            serde_json::from_str(json).context("failed to parse family table")?;
        Self::new(table.families)
    }

    /// Validate a family list and build the registry
    ///
    /// Fails fast on an empty table, an empty label table, duplicate
    /// prefixes, or an advisory-capable family missing a record for one of
    /// its labels. Advisory records keyed by labels the family does not
    /// declare are logged and ignored.
    pub fn new(mut families: Vec<FamilySpec>) -> Result<Self> {
        if families.is_empty() {
            bail!("family table declares no families");
        }

        for family in &families {
            if family.labels.is_empty() {
                bail!("family {} has an empty label table", family.name);
            }
            if let Some(advisories) = &family.advisories {
                for label in &family.labels {
                    if !advisories.contains_key(label) {
                        bail!(
                            "family {} declares advisory support but has no record for label {:?}",
                            family.name,
                            label
                        );
                    }
                }
                for label in advisories.keys() {
                    if !family.labels.contains(label) {
                        warn!(
                            family = %family.name,
                            label = %label,
                            "Advisory record for a label the family does not declare"
                        );
                    }
                }
            }
        }

        for (i, a) in families.iter().enumerate() {
            for b in &families[i + 1..] {
                if a.prefix == b.prefix {
                    bail!(
                        "families {} and {} both register prefix {:?}",
                        a.name,
                        b.name,
                        a.prefix
                    );
                }
            }
        }

        // Longest prefix first so resolution picks the most specific family
        families.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Ok(Self { families })
    }

    /// Resolve an identifier to its pipeline family
    pub fn resolve(&self, identifier: &str) -> Result<&FamilySpec, PredictError> {
        self.families
            .iter()
            .find(|family| identifier.starts_with(&family.prefix))
            .ok_or_else(|| PredictError::UnsupportedModel(identifier.to_string()))
    }

    /// All registered families
    pub fn families(&self) -> &[FamilySpec] {
        &self.families
    }
}
