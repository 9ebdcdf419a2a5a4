use crate::error::{CoreError, Result};
use crate::model::config::RunConfig;

use serde_json::Value;
use std::fs;
use std::path::Path;

pub fn load_config(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    toml::from_str(&contents)
        .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))
}

/// Resolves `payload.config` (inline object) or `payload.config_path` (TOML file).
pub fn config_from_payload(payload: &Value) -> Result<RunConfig> {
    if let Some(inline) = payload.get("config").filter(|v| !v.is_null()) {
        return serde_json::from_value(inline.clone())
            .map_err(|e| CoreError::Config(format!("invalid payload.config: {e}")));
    }

    match payload.get("config_path").and_then(|v| v.as_str()) {
        Some(path) if !path.trim().is_empty() => load_config(Path::new(path)),
        _ => Err(CoreError::Config(
            "payload.config or payload.config_path is required".into(),
        )),
    }
}

pub fn validate(cfg: &RunConfig) -> Result<()> {
    if cfg.source_path.as_os_str().is_empty() {
        return Err(CoreError::Config("source_path is required".into()));
    }
    if cfg.remark_column.trim().is_empty() {
        return Err(CoreError::Config("remark_column must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn toml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            "source_path = \"./data/test_flashflood_LSRs.csv\"\n\
             taxonomy_path = \"./docs/ffsi_v1-original.txt\"\n\
             batch_size = 25\n\
             max_batches = 3\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.batch_size, 25);
        assert_eq!(cfg.max_batches, Some(3));
        assert_eq!(cfg.wait_secs, 20);
        assert_eq!(cfg.cooldown_secs, 10);
        assert_eq!(cfg.results_dir, PathBuf::from("./results"));
        assert_eq!(cfg.model, "gpt-3.5-turbo");
    }

    #[test]
    fn inline_config_wins_over_path() {
        let payload = json!({
            "config": { "source_path": "a.csv", "batch_size": 0 },
            "config_path": "/does/not/exist.toml"
        });

        let cfg = config_from_payload(&payload).unwrap();
        assert_eq!(cfg.batch_size, 0);
        assert_eq!(cfg.source_path, PathBuf::from("a.csv"));
    }

    #[test]
    fn missing_config_is_error() {
        assert!(matches!(config_from_payload(&json!({})), Err(CoreError::Config(_))));
    }

    #[test]
    fn zero_ceiling_means_unlimited() {
        let cfg = RunConfig {
            max_batches: Some(0),
            ..RunConfig::default()
        };
        assert_eq!(cfg.retry_policy().max_batches, None);
    }

    #[test]
    fn source_path_is_required() {
        assert!(validate(&RunConfig::default()).is_err());
    }
}
