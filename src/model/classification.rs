use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered severity classes with their score weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityClass {
    Minor,
    Moderate,
    Serious,
    Severe,
    Catastrophic,
}

impl SeverityClass {
    pub const ALL: [SeverityClass; 5] = [
        SeverityClass::Minor,
        SeverityClass::Moderate,
        SeverityClass::Serious,
        SeverityClass::Severe,
        SeverityClass::Catastrophic,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SeverityClass::Minor => "MINOR",
            SeverityClass::Moderate => "MODERATE",
            SeverityClass::Serious => "SERIOUS",
            SeverityClass::Severe => "SEVERE",
            SeverityClass::Catastrophic => "CATASTROPHIC",
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            SeverityClass::Minor => 1.0,
            SeverityClass::Moderate => 2.0,
            SeverityClass::Serious => 3.0,
            SeverityClass::Severe => 4.0,
            SeverityClass::Catastrophic => 5.0,
        }
    }
}

/// Class probabilities as returned by the classifier, in percent.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ClassProbabilities {
    pub minor: f64,
    pub moderate: f64,
    pub serious: f64,
    pub severe: f64,
    pub catastrophic: f64,
}

impl ClassProbabilities {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_ordered(values: [f64; 5]) -> Self {
        let [minor, moderate, serious, severe, catastrophic] = values;
        Self {
            minor,
            moderate,
            serious,
            severe,
            catastrophic,
        }
    }

    pub fn get(&self, class: SeverityClass) -> f64 {
        match class {
            SeverityClass::Minor => self.minor,
            SeverityClass::Moderate => self.moderate,
            SeverityClass::Serious => self.serious,
            SeverityClass::Severe => self.severe,
            SeverityClass::Catastrophic => self.catastrophic,
        }
    }

    pub fn ordered(&self) -> [f64; 5] {
        SeverityClass::ALL.map(|c| self.get(c))
    }
}

/// One classified report.
///
/// On disk this is the array `[original_text, probabilities, score, extra_text]`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(from = "RecordRow", into = "RecordRow")]
pub struct ClassificationRecord {
    pub original_text: String,
    pub probabilities: ClassProbabilities,
    pub severity_score: f64,
    pub extra_text: String,
}

#[derive(Serialize, Deserialize, Clone)]
struct RecordRow(String, ClassProbabilities, f64, String);

impl From<RecordRow> for ClassificationRecord {
    fn from(row: RecordRow) -> Self {
        let RecordRow(original_text, probabilities, severity_score, extra_text) = row;
        Self {
            original_text,
            probabilities,
            severity_score,
            extra_text,
        }
    }
}

impl From<ClassificationRecord> for RecordRow {
    fn from(r: ClassificationRecord) -> Self {
        RecordRow(r.original_text, r.probabilities, r.severity_score, r.extra_text)
    }
}

/// Contents of one batch artifact, keyed by index local to the batch.
pub type BatchRecords = BTreeMap<usize, ClassificationRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_as_positional_array() {
        let record = ClassificationRecord {
            original_text: "Road washed out".into(),
            probabilities: ClassProbabilities::from_ordered([10.0, 20.0, 70.0, 0.0, 0.0]),
            severity_score: 2.6,
            extra_text: String::new(),
        };

        let mut records = BatchRecords::new();
        records.insert(3, record.clone());

        let json = serde_json::to_value(&records).unwrap();
        assert_eq!(json["3"][0], "Road washed out");
        assert_eq!(json["3"][1]["SERIOUS"], 70.0);
        assert_eq!(json["3"][2], 2.6);

        let back: BatchRecords = serde_json::from_value(json).unwrap();
        assert_eq!(back.get(&3), Some(&record));
    }
}
