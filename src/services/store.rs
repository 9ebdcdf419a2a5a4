use crate::error::{CoreError, Result};
use crate::model::classification::BatchRecords;

use regex::Regex;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::OnceLock,
};

const ARTIFACT_EXT: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub batch_id: usize,
    pub path: PathBuf,
}

fn artifact_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<stem>.+)_(?P<batch>\d+)\.json$").expect("artifact pattern is valid")
    })
}

pub fn artifact_path(results_dir: &Path, run_id: &str, batch_id: usize) -> PathBuf {
    results_dir.join(format!("{run_id}_{batch_id}.{ARTIFACT_EXT}"))
}

pub fn classified_csv_path(results_dir: &Path, run_id: &str) -> PathBuf {
    results_dir.join(format!("{run_id}_classified.csv"))
}

/// Artifacts in `results_dir` belonging to `run_id`, ordered by batch id.
///
/// A missing directory lists as empty.
pub fn list_artifacts(results_dir: &Path, run_id: &str) -> Result<Vec<ArtifactFile>> {
    let entries = match fs::read_dir(results_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoreError::io(results_dir, e)),
    };

    let mut found = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let Some(caps) = artifact_name_re().captures(name) else {
            continue;
        };

        if !caps["stem"].contains(run_id) {
            continue;
        }

        // Digits that overflow usize cannot belong to any plan.
        let Ok(batch_id) = caps["batch"].parse::<usize>() else {
            continue;
        };

        found.push(ArtifactFile { batch_id, path });
    }

    found.sort_by(|a, b| a.batch_id.cmp(&b.batch_id).then_with(|| a.path.cmp(&b.path)));

    Ok(found)
}

pub fn write_artifact(path: &Path, records: &BatchRecords) -> Result<()> {
    let json = serde_json::to_string_pretty(records).map_err(|e| CoreError::json(path, e))?;
    write_atomic(path, json.as_bytes())
}

pub fn read_artifact(path: &Path) -> Result<BatchRecords> {
    let data = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| CoreError::json(path, e))
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);

    if let Some(parent) = tmp.parent() {
        fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
    }

    fs::write(&tmp, bytes).map_err(|e| CoreError::io(&tmp, e))?;

    if path.exists() {
        fs::remove_file(path).map_err(|e| CoreError::io(path, e))?;
    }

    fs::rename(&tmp, path).map_err(|e| CoreError::io(path, e))?;

    Ok(())
}

// ".tmp" suffix keeps half-written artifacts out of `list_artifacts`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "artifact".to_string(),
    };
    p.set_file_name(format!("{file_name}.tmp"));
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::classification::{ClassProbabilities, ClassificationRecord};

    fn one_record() -> BatchRecords {
        let mut records = BatchRecords::new();
        records.insert(
            0,
            ClassificationRecord {
                original_text: "Water over road".into(),
                probabilities: ClassProbabilities::from_ordered([100.0, 0.0, 0.0, 0.0, 0.0]),
                severity_score: 1.0,
                extra_text: String::new(),
            },
        );
        records
    }

    #[test]
    fn lists_only_matching_run_in_batch_order() {
        let dir = tempfile::tempdir().unwrap();
        let run = "abc123";

        for id in [10, 2, 0] {
            write_artifact(&artifact_path(dir.path(), run, id), &one_record()).unwrap();
        }
        write_artifact(&artifact_path(dir.path(), "ffff00", 1), &one_record()).unwrap();
        fs::write(classified_csv_path(dir.path(), run), "x").unwrap();
        fs::write(dir.path().join(format!("{run}_notes.json")), "{}").unwrap();

        let ids: Vec<usize> = list_artifacts(dir.path(), run)
            .unwrap()
            .into_iter()
            .map(|a| a.batch_id)
            .collect();
        assert_eq!(ids, vec![0, 2, 10]);
    }

    #[test]
    fn missing_dir_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_artifacts(&missing, "abc").unwrap().is_empty());
    }

    #[test]
    fn artifact_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(&dir.path().join("nested"), "abc", 4);

        write_artifact(&path, &one_record()).unwrap();
        assert!(!tmp_path(&path).exists());
        assert_eq!(read_artifact(&path).unwrap(), one_record());
    }
}
