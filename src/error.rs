// ⚠️ Error Types - Collaborator and configuration failures
//
// Nothing here escapes `build` or `consolidate`: the engine turns every
// CollaboratorError into a node or entry annotation. ConfigError surfaces
// only at load time.

use thiserror::Error;

/// Failure reported by an external collaborator (registry, filings, officers)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("transport failure calling {service}: {message}")]
    Transport { service: String, message: String },

    #[error("{service} has no record for '{key}'")]
    NotFound { service: String, key: String },
}

impl CollaboratorError {
    pub fn transport(service: &str, message: impl Into<String>) -> Self {
        CollaboratorError::Transport {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(service: &str, key: impl Into<String>) -> Self {
        CollaboratorError::NotFound {
            service: service.to_string(),
            key: key.into(),
        }
    }
}

/// Invalid resolver configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("fuzzy_threshold must be within 0.0..=1.0, got {0}")]
    ThresholdOutOfRange(f64),

    #[error("individual_threshold_pct must be within 0.0..=100.0, got {0}")]
    PercentageOutOfRange(f64),

    #[error("max_depth must be at least 1")]
    ZeroDepth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_messages() {
        let err = CollaboratorError::transport("registry-search", "connection reset");
        assert_eq!(
            err.to_string(),
            "transport failure calling registry-search: connection reset"
        );

        let err = CollaboratorError::not_found("registry-profile", "00000001");
        assert_eq!(err.to_string(), "registry-profile has no record for '00000001'");
    }
}
