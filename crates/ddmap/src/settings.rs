//! Engine settings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

const SCHEMA_JSON: &str = include_str!("../schema/engine-settings.json");

/// Highest accepted `transportMaxRetries`.
pub const MAX_TRANSPORT_RETRIES: u32 = 10;

/// Tunables for the reconciler and the bundled HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Base URL of the Datadog API.
    pub api_url: String,
    /// Deadline for post-create visibility when the caller passes none.
    pub create_timeout_secs: u64,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub transport_max_retries: u32,
    pub transport_base_delay_secs: u64,
    /// Sentinel written to state for write-only secrets.
    pub secret_mask: String,
    pub log_filter: String,
    pub log_json: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.datadoghq.com".to_string(),
            create_timeout_secs: 600,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 10_000,
            transport_max_retries: 3,
            transport_base_delay_secs: 2,
            secret_mask: "*****".to_string(),
            log_filter: "info".to_string(),
            log_json: false,
        }
    }
}

impl EngineSettings {
    /// Loads settings from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parses, schema-checks and validates a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: serde_json::Value = if content.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_yaml::from_str(content)?
        };
        validate_schema(&value)?;
        let settings: EngineSettings = serde_json::from_value(value)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks cross-field constraints, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.api_url.is_empty() {
            errors.push("apiUrl is required".to_string());
        } else if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            errors.push(format!("apiUrl must be an http(s) URL, got '{}'", self.api_url));
        }
        if self.create_timeout_secs == 0 {
            errors.push("createTimeoutSecs must be greater than 0".to_string());
        }
        if self.retry_base_delay_ms == 0 {
            errors.push("retryBaseDelayMs must be greater than 0".to_string());
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            errors.push(format!(
                "retryMaxDelayMs ({}) must not be lower than retryBaseDelayMs ({})",
                self.retry_max_delay_ms, self.retry_base_delay_ms
            ));
        }
        if self.transport_max_retries > MAX_TRANSPORT_RETRIES {
            errors.push(format!(
                "transportMaxRetries ({}) must not exceed {}",
                self.transport_max_retries, MAX_TRANSPORT_RETRIES
            ));
        }
        if self.secret_mask.is_empty() {
            errors.push("secretMask must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Configuration(errors.join("; ")))
        }
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

fn validate_schema(value: &serde_json::Value) -> Result<()> {
    let schema: serde_json::Value = serde_json::from_str(SCHEMA_JSON)
        .map_err(|e| EngineError::Configuration(format!("invalid embedded schema JSON: {}", e)))?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| EngineError::Configuration(format!("failed to compile JSON schema: {}", e)))?;

    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Configuration(errors.join("; ")))
    }
}
