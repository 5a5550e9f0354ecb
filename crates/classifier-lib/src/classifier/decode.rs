//! Output decoding and advisory lookup
//!
//! Converts a model's raw output vector into the winning label with its
//! confidence, and resolves the advisory record for advisory-capable
//! families.

use crate::error::PredictError;
use crate::models::{Advisory, Classification};
use crate::registry::FamilySpec;

/// Decode an output vector into the winning label and its confidence
///
/// Ties break toward the lowest index. The winning value is clamped into
/// [0, 1] for the response; the vector itself is only required to be a
/// ranking signal. An index the family's label table cannot cover is a
/// configuration mismatch between the model and the table, surfaced as
/// `ModelMismatch` rather than coerced.
pub fn decode(probabilities: &[f32], family: &FamilySpec) -> Result<Classification, PredictError> {
    let index = argmax(probabilities).ok_or_else(|| PredictError::ModelMismatch {
        family: family.name.clone(),
        index: 0,
        table_len: family.labels.len(),
    })?;

    let label = family
        .labels
        .get(index)
        .ok_or_else(|| PredictError::ModelMismatch {
            family: family.name.clone(),
            index,
            table_len: family.labels.len(),
        })?;

    Ok(Classification {
        label: label.clone(),
        confidence: probabilities[index].clamp(0.0, 1.0),
    })
}

/// Resolve the advisory record for a decoded label
///
/// Families without advisory support yield `None`. For advisory-capable
/// families a missing record is a data-consistency failure, surfaced so the
/// gap gets fixed at the data layer instead of silently dropping the field.
pub fn advisory_for(family: &FamilySpec, label: &str) -> Result<Option<Advisory>, PredictError> {
    match &family.advisories {
        None => Ok(None),
        Some(advisories) => advisories
            .get(label)
            .cloned()
            .map(Some)
            .ok_or_else(|| PredictError::AdvisoryMissing {
                family: family.name.clone(),
                label: label.to_string(),
            }),
    }
}

/// Index of the first maximum value
fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &value) in values.iter().enumerate() {
        let better = match best {
            None => true,
            // Strictly greater, so the first occurrence wins ties
            Some((_, current)) => value > current,
        };
        if better {
            best = Some((i, value));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PipelineKind;
    use std::collections::HashMap;

    fn family(labels: &[&str]) -> FamilySpec {
        FamilySpec {
            name: "maize".to_string(),
            prefix: "xception_maize".to_string(),
            pipeline: PipelineKind::Xception,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            advisories: None,
        }
    }

    fn advisory(message: &str) -> Advisory {
        Advisory {
            description: "desc".to_string(),
            symptoms: vec!["symptom".to_string()],
            treatment: "treat".to_string(),
            prevention: "prevent".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_decode_picks_argmax() {
        let result = decode(&[0.1, 0.7, 0.2], &family(&["a", "b", "c"])).unwrap();
        assert_eq!(result.label, "b");
        assert_eq!(result.confidence, 0.7);
    }

    #[test]
    fn test_tie_breaks_to_lowest_index() {
        let result = decode(&[0.5, 0.5], &family(&["a", "b"])).unwrap();
        assert_eq!(result.label, "a");
    }

    #[test]
    fn test_undersized_table_is_mismatch() {
        let err = decode(&[0.0, 0.0, 0.0, 0.0, 0.9], &family(&["a", "b", "c"])).unwrap_err();
        match err {
            PredictError::ModelMismatch {
                index, table_len, ..
            } => {
                assert_eq!(index, 4);
                assert_eq!(table_len, 3);
            }
            other => panic!("expected ModelMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_output_is_mismatch() {
        let err = decode(&[], &family(&["a"])).unwrap_err();
        assert!(matches!(err, PredictError::ModelMismatch { .. }));
    }

    #[test]
    fn test_confidence_clamped() {
        let result = decode(&[1.4, 0.1], &family(&["a", "b"])).unwrap();
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_no_advisory_support_yields_none() {
        let spec = family(&["a", "b"]);
        assert_eq!(advisory_for(&spec, "a").unwrap(), None);
    }

    #[test]
    fn test_advisory_lookup_finds_record() {
        let mut spec = family(&["a", "b"]);
        let mut advisories = HashMap::new();
        advisories.insert("a".to_string(), advisory("spray fungicide"));
        advisories.insert("b".to_string(), advisory("all clear"));
        spec.advisories = Some(advisories);

        let record = advisory_for(&spec, "a").unwrap().unwrap();
        assert_eq!(record.message, "spray fungicide");
    }

    #[test]
    fn test_missing_record_surfaced() {
        let mut spec = family(&["a", "b"]);
        let mut advisories = HashMap::new();
        advisories.insert("a".to_string(), advisory("spray fungicide"));
        spec.advisories = Some(advisories);

        let err = advisory_for(&spec, "b").unwrap_err();
        match err {
            PredictError::AdvisoryMissing { family, label } => {
                assert_eq!(family, "maize");
                assert_eq!(label, "b");
            }
            other => panic!("expected AdvisoryMissing, got {other:?}"),
        }
    }
}
