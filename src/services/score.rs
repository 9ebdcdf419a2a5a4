use crate::error::{CoreError, Result};
use crate::model::classification::{ClassProbabilities, SeverityClass};

use serde_json::{Map, Value};

const CLASS_COUNT: f64 = 5.0;

/// Severity score of a distribution given in percent.
///
/// Lies in `[1, 5]` when the probabilities sum to 100, or `[0.2, 1]` when
/// normalized. The sum is not checked.
pub fn ffsi_score(probs: &ClassProbabilities, normalize: bool) -> f64 {
    let score: f64 = SeverityClass::ALL
        .iter()
        .map(|&c| probs.get(c) / 100.0 * c.weight())
        .sum();

    if normalize {
        score / CLASS_COUNT
    } else {
        score
    }
}

/// Reads probabilities from a labeled object or a five-element array.
pub fn probabilities_from_value(value: &Value) -> Result<ClassProbabilities> {
    match value {
        Value::Object(map) => probabilities_from_map(map),
        Value::Array(items) => {
            if items.len() != SeverityClass::ALL.len() {
                return Err(CoreError::InvalidInput(format!(
                    "expected {} probabilities, got {}",
                    SeverityClass::ALL.len(),
                    items.len()
                )));
            }
            let mut ordered = [0.0; 5];
            for (slot, item) in ordered.iter_mut().zip(items) {
                *slot = as_number(item, "array element")?;
            }
            Ok(ClassProbabilities::from_ordered(ordered))
        }
        other => Err(CoreError::InvalidInput(format!(
            "probabilities must be an object or an array, got {other}"
        ))),
    }
}

pub fn probabilities_from_map(map: &Map<String, Value>) -> Result<ClassProbabilities> {
    let mut ordered = [0.0; 5];
    for (slot, class) in ordered.iter_mut().zip(SeverityClass::ALL) {
        let label = class.label();
        let value = map
            .get(label)
            .ok_or_else(|| CoreError::InvalidInput(format!("missing class {label}")))?;
        *slot = as_number(value, label)?;
    }
    Ok(ClassProbabilities::from_ordered(ordered))
}

pub fn score_value(value: &Value, normalize: bool) -> Result<f64> {
    Ok(ffsi_score(&probabilities_from_value(value)?, normalize))
}

fn as_number(value: &Value, what: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| CoreError::InvalidInput(format!("{what} is not a number: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extremes_map_to_one_and_five() {
        let minor = json!({"MINOR": 100, "MODERATE": 0, "SERIOUS": 0, "SEVERE": 0, "CATASTROPHIC": 0});
        let cat = json!({"MINOR": 0, "MODERATE": 0, "SERIOUS": 0, "SEVERE": 0, "CATASTROPHIC": 100});

        assert_eq!(score_value(&minor, false).unwrap(), 1.0);
        assert_eq!(score_value(&cat, false).unwrap(), 5.0);
        assert_eq!(score_value(&minor, true).unwrap(), 0.2);
        assert_eq!(score_value(&cat, true).unwrap(), 1.0);
    }

    #[test]
    fn ordered_sequence_matches_labeled_mapping() {
        let labeled = json!({"MINOR": 10, "MODERATE": 20, "SERIOUS": 40, "SEVERE": 20, "CATASTROPHIC": 10});
        let ordered = json!([10, 20, 40, 20, 10]);

        let a = score_value(&labeled, false).unwrap();
        let b = score_value(&ordered, false).unwrap();
        assert!((a - 3.0).abs() < 1e-9);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn zero_distribution_scores_zero() {
        assert_eq!(ffsi_score(&ClassProbabilities::zero(), false), 0.0);
    }

    #[test]
    fn rejects_invalid_shapes() {
        let missing = json!({"MINOR": 100, "MODERATE": 0});
        let short = json!([50, 50]);
        let text = json!("MINOR");
        let non_numeric = json!({"MINOR": "a lot", "MODERATE": 0, "SERIOUS": 0, "SEVERE": 0, "CATASTROPHIC": 0});

        for bad in [missing, short, text, non_numeric] {
            assert!(matches!(score_value(&bad, false), Err(CoreError::InvalidInput(_))));
        }
    }
}
