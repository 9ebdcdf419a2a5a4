use crate::error::{ClassifyError, CoreError, Result};
use crate::model::config::RunConfig;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use std::{fs, path::Path, time::Duration};

const TIMEOUT_SECS: u64 = 60;
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// One call to the external text classifier.
pub trait Classifier {
    fn classify(&self, instruction: &str, input: &str) -> std::result::Result<String, ClassifyError>;
}

pub struct ChatClassifier {
    client: Client,
    endpoint: &'static str,
    api_key: String,
    model: String,
    temperature: f64,
    top_p: f64,
}

fn endpoint_for(provider: &str) -> Result<&'static str> {
    match provider {
        "openai" => Ok("https://api.openai.com/v1/chat/completions"),
        "deepseek" => Ok("https://api.deepseek.com/v1/chat/completions"),
        other => Err(CoreError::Config(format!("unsupported provider: {other}"))),
    }
}

#[derive(Deserialize)]
struct KeyFile {
    secret_key: String,
}

pub fn read_api_key(path: &Path) -> Result<String> {
    let data = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    let key: KeyFile = serde_json::from_str(&data).map_err(|e| CoreError::json(path, e))?;
    Ok(key.secret_key)
}

/// Inline key, then key file, then `OPENAI_API_KEY`.
pub fn resolve_api_key(cfg: &RunConfig) -> Result<String> {
    if let Some(key) = cfg.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    if let Some(path) = &cfg.api_key_file {
        return read_api_key(path);
    }

    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(CoreError::Config(format!(
            "no api key: set api_key, api_key_file or {API_KEY_ENV}"
        ))),
    }
}

impl ChatClassifier {
    pub fn from_config(cfg: &RunConfig) -> Result<Self> {
        let endpoint = endpoint_for(&cfg.provider)?;
        let api_key = resolve_api_key(cfg)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| CoreError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        })
    }
}

impl Classifier for ChatClassifier {
    fn classify(&self, instruction: &str, input: &str) -> std::result::Result<String, ClassifyError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": instruction },
                { "role": "user", "content": input }
            ],
            "temperature": self.temperature,
            "top_p": self.top_p
        });

        let resp = self
            .client
            .post(self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let status = resp.status();

        // Read as text first so error bodies survive a failed JSON decode.
        let text = resp
            .text()
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_http_error(status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|_| ClassifyError::Api("invalid JSON from classifier".into()))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ClassifyError::Api("invalid response: missing choices[0].message.content".into())
            })
    }
}

fn classify_http_error(status: StatusCode, body_text: &str) -> ClassifyError {
    let message = extract_error_message(status, body_text);

    if status == StatusCode::TOO_MANY_REQUESTS {
        ClassifyError::RateLimited(message)
    } else if status == StatusCode::SERVICE_UNAVAILABLE {
        ClassifyError::ServiceUnavailable(message)
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        ClassifyError::Api(message)
    } else {
        ClassifyError::Rejected(message)
    }
}

fn extract_error_message(status: StatusCode, body_text: &str) -> String {
    // { "error": { "message": "..." } } or { "message": "..." }
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
    }

    let trimmed = body_text.trim();
    let snippet = match trimmed.char_indices().nth(400) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    };

    format!("HTTP {}: {}", status.as_u16(), snippet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_maps_to_error_kind() {
        let body = r#"{"error": {"message": "slow down"}}"#;

        assert_eq!(
            classify_http_error(StatusCode::TOO_MANY_REQUESTS, body),
            ClassifyError::RateLimited("HTTP 429: slow down".into())
        );
        assert!(matches!(
            classify_http_error(StatusCode::SERVICE_UNAVAILABLE, ""),
            ClassifyError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            classify_http_error(StatusCode::BAD_GATEWAY, ""),
            ClassifyError::Api(_)
        ));
        assert!(matches!(
            classify_http_error(StatusCode::UNAUTHORIZED, ""),
            ClassifyError::Rejected(_)
        ));
    }

    #[test]
    fn long_raw_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let msg = extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(msg.starts_with("HTTP 500: xxx"));
        assert!(msg.ends_with("..."));
        assert!(msg.len() < 420);
    }

    #[test]
    fn api_key_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.json");
        fs::write(&key_file, r#"{"secret_key": "from-file"}"#).unwrap();

        let mut cfg = RunConfig {
            api_key: Some("inline".into()),
            api_key_file: Some(key_file),
            ..RunConfig::default()
        };
        assert_eq!(resolve_api_key(&cfg).unwrap(), "inline");

        cfg.api_key = None;
        assert_eq!(resolve_api_key(&cfg).unwrap(), "from-file");
    }

    #[test]
    fn unknown_provider_is_config_error() {
        assert!(matches!(endpoint_for("acme"), Err(CoreError::Config(_))));
    }
}
