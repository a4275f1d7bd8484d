//! Engine configuration, including YAML file loading.
//!
//! One document configures every stage; the loader validates the bundle as
//! a whole so a deployment with `bands * rows_per_band != dimension` refuses
//! to start instead of writing incomparable sketches.
//!
//! ## Example
//!
//! ```yaml
//! fingerprint:
//!   version: 1
//!   dimension: 128
//!   bands: 16
//!   rows_per_band: 8
//!   css_shingle_k: 5
//!   html_shingle_k: 7
//!
//! noise:
//!   version: 1
//!   framework_class_prefixes: ["w-", "wf-", "is-", "has-"]
//!
//! analyze:
//!   candidate_threshold: 0.30
//!   rule_overlap_floor: 0.50
//!
//! page_budget: 8
//! fetch_deadline_secs: 60
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use analyze::AnalyzeConfig;
use fingerprint::{FingerprintConfig, NoiseConfig};

use crate::EngineError;

/// Complete engine configuration bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    #[serde(default)]
    pub noise: NoiseConfig,
    #[serde(default)]
    pub analyze: AnalyzeConfig,
    /// Maximum pages fetched per template (K).
    #[serde(default = "EngineConfig::default_page_budget")]
    pub page_budget: usize,
    /// Global deadline for a multi-page fetch.
    #[serde(default = "EngineConfig::default_fetch_deadline_secs")]
    pub fetch_deadline_secs: u64,
}

impl EngineConfig {
    fn default_page_budget() -> usize {
        8
    }

    fn default_fetch_deadline_secs() -> u64 {
        60
    }

    /// Validate the whole bundle. Called at engine construction; a failure
    /// here must prevent the service from starting.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.fingerprint
            .validate()
            .map_err(|e| EngineError::ConfigInvalid(e.to_string()))?;
        self.analyze
            .validate()
            .map_err(|e| EngineError::ConfigInvalid(e.to_string()))?;
        if self.page_budget == 0 {
            return Err(EngineError::ConfigInvalid(
                "page_budget must be >= 1".into(),
            ));
        }
        if self.fetch_deadline_secs == 0 {
            return Err(EngineError::ConfigInvalid(
                "fetch_deadline_secs must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse a YAML document into a validated config.
    pub fn from_yaml(text: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_yaml::from_str(text)
            .map_err(|e| EngineError::ConfigInvalid(format!("yaml parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::ConfigInvalid(format!(
                "failed to read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_yaml(&text)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintConfig::default(),
            noise: NoiseConfig::default(),
            analyze: AnalyzeConfig::default(),
            page_budget: Self::default_page_budget(),
            fetch_deadline_secs: Self::default_fetch_deadline_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = EngineConfig::from_yaml("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn yaml_overrides_apply() {
        let yaml = r#"
fingerprint:
  version: 2
  dimension: 256
  bands: 32
  rows_per_band: 8
  css_shingle_k: 4
  html_shingle_k: 6
  seed: 99
  use_parallel: true
  max_blob_bytes: 1048576
  structural_arity_cap: 10
page_budget: 4
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.fingerprint.dimension, 256);
        assert_eq!(config.fingerprint.bands, 32);
        assert_eq!(config.page_budget, 4);
        assert_eq!(config.fetch_deadline_secs, 60);
    }

    #[test]
    fn band_shape_mismatch_refuses_to_load() {
        let yaml = r#"
fingerprint:
  version: 1
  dimension: 128
  bands: 10
  rows_per_band: 8
  css_shingle_k: 5
  html_shingle_k: 7
  seed: 1
  use_parallel: false
  max_blob_bytes: 2097152
  structural_arity_cap: 10
"#;
        assert!(matches!(
            EngineConfig::from_yaml(yaml),
            Err(EngineError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        assert!(matches!(
            EngineConfig::from_yaml(": not yaml :"),
            Err(EngineError::ConfigInvalid(_))
        ));
    }
}
