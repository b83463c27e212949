// ⚙️ Resolver Configuration - Limits and thresholds for a resolution run
//
// Loaded from JSON, validated once, then shared read-only by the builder,
// matcher and consolidator.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_max_depth() -> usize {
    10
}

fn default_fuzzy_threshold() -> f64 {
    0.5
}

fn default_individual_threshold_pct() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Deepest level that may still be expanded (target = 0)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Minimum Jaccard score for a fuzzy registry match
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Individuals below this holding are left out of the screening list
    #[serde(default = "default_individual_threshold_pct")]
    pub individual_threshold_pct: f64,

    /// Use the controller register when filings have no shareholders
    #[serde(default = "default_true")]
    pub controller_fallback: bool,

    /// Share one match cache across the whole run
    #[serde(default = "default_true")]
    pub cache_lookups: bool,

    /// Extra foreign suffix rules (JSON array of SuffixRule)
    #[serde(default)]
    pub suffix_rules_path: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            max_depth: default_max_depth(),
            fuzzy_threshold: default_fuzzy_threshold(),
            individual_threshold_pct: default_individual_threshold_pct(),
            controller_fallback: true,
            cache_lookups: true,
            suffix_rules_path: None,
        }
    }
}

impl ResolverConfig {
    /// Load and validate a JSON config file. Missing fields take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: ResolverConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.fuzzy_threshold));
        }
        if !(0.0..=100.0).contains(&self.individual_threshold_pct) {
            return Err(ConfigError::PercentageOutOfRange(
                self.individual_threshold_pct,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.fuzzy_threshold, 0.5);
        assert_eq!(config.individual_threshold_pct, 10.0);
        assert!(config.controller_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: ResolverConfig = serde_json::from_str(r#"{"max_depth": 3}"#).unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.fuzzy_threshold, 0.5);
        assert!(config.cache_lookups);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = ResolverConfig {
            fuzzy_threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOutOfRange(1.5)));

        let config = ResolverConfig {
            max_depth: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDepth));

        let config = ResolverConfig {
            individual_threshold_pct: -1.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::PercentageOutOfRange(-1.0)));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("resolver-config-{}.json", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{"max_depth": 4, "controller_fallback": false}}"#).unwrap();

        let config = ResolverConfig::from_file(&path).unwrap();
        assert_eq!(config.max_depth, 4);
        assert!(!config.controller_fallback);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let path = std::env::temp_dir().join(format!("resolver-config-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{"fuzzy_threshold": 2.0}"#).unwrap();

        assert!(ResolverConfig::from_file(&path).is_err());

        fs::remove_file(&path).unwrap();
    }
}
