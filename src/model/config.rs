use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_results_dir() -> PathBuf {
    PathBuf::from("./results")
}

fn default_remark_column() -> String {
    "remark".to_string()
}

fn default_batch_size() -> usize {
    10
}

// Free API keys allow 3 requests per minute.
fn default_wait_secs() -> u64 {
    20
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_top_p() -> f64 {
    1.0
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunConfig {
    #[serde(default)]
    pub source_path: PathBuf,

    #[serde(default)]
    pub taxonomy_path: PathBuf,

    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    #[serde(default = "default_remark_column")]
    pub remark_column: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,

    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Absent or 0 means no limit.
    #[serde(default)]
    pub max_batches: Option<usize>,

    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f64,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::new(),
            taxonomy_path: PathBuf::new(),
            results_dir: default_results_dir(),
            remark_column: default_remark_column(),
            batch_size: default_batch_size(),
            wait_secs: default_wait_secs(),
            cooldown_secs: default_cooldown_secs(),
            max_batches: None,
            provider: default_provider(),
            model: default_model(),
            temperature: 0.0,
            top_p: default_top_p(),
            api_key: None,
            api_key_file: None,
        }
    }
}

impl RunConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            wait: Duration::from_secs(self.wait_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            max_batches: self.max_batches.filter(|&n| n > 0),
        }
    }
}

/// Timing and ceiling controls for one driver invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between consecutive classifier calls.
    pub wait: Duration,

    /// Pause before the single retry of a failed batch.
    pub cooldown: Duration,

    pub max_batches: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RunConfig::default().retry_policy()
    }
}
