// 🔌 Collaborators - What the engine consumes from the outside world
//
// Filing extraction, registry search, registry profiles and officer/controller
// registers are all I/O. Every call is a suspension point and may fail; the
// engine never retries, it annotates.

use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

// ============================================================================
// REGISTRY IDENTITY
// ============================================================================

/// Opaque registry identifier (e.g. a company number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryId(String);

impl RegistryId {
    pub fn new(id: impl Into<String>) -> Self {
        RegistryId(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegistryId {
    fn from(id: &str) -> Self {
        RegistryId::new(id)
    }
}

// ============================================================================
// SHAREHOLDER RECORD (filing extraction output)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordSource {
    /// Extracted from a periodic filing
    #[default]
    Filing,

    /// Derived from the controller register when filings had nothing usable
    ControllerRegister,
}

/// One shareholder line as extracted from a filing. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareholderRecord {
    /// Name as extracted - may contain OCR noise
    pub name: String,

    #[serde(default)]
    pub shares_held: u64,

    /// Ownership percentage 0-100
    #[serde(default)]
    pub percentage: f64,

    #[serde(default)]
    pub share_class: String,

    #[serde(default)]
    pub source: RecordSource,
}

impl ShareholderRecord {
    pub fn new(name: &str, shares_held: u64, percentage: f64, share_class: &str) -> Self {
        ShareholderRecord {
            name: name.to_string(),
            shares_held,
            percentage,
            share_class: share_class.to_string(),
            source: RecordSource::Filing,
        }
    }
}

// ============================================================================
// REGISTRY TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompanyStatus {
    #[default]
    Active,
    Dissolved,
    Liquidation,
    Other,
}

impl CompanyStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, CompanyStatus::Active)
    }
}

/// A registry search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: RegistryId,
    pub name: String,

    #[serde(default)]
    pub status: CompanyStatus,

    #[serde(default)]
    pub is_publicly_traded: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompanyProfile {
    /// Authoritative registered name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub status: CompanyStatus,

    #[serde(default)]
    pub is_publicly_traded: bool,

    /// Registry company type, e.g. "private-limited-guarant-nsc"
    #[serde(default)]
    pub company_type: Option<String>,
}

impl CompanyProfile {
    pub fn is_limited_by_guarantee(&self) -> bool {
        self.company_type
            .as_deref()
            .map(|t| t.to_lowercase().contains("guarant"))
            .unwrap_or(false)
    }
}

/// An officer or a person/entity with significant control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officer {
    pub name: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub ceased: bool,

    /// Controller register only, e.g. "ownership-of-shares-75-to-100-percent"
    #[serde(default)]
    pub natures_of_control: Vec<String>,
}

impl Officer {
    pub fn new(name: &str, role: &str) -> Self {
        Officer {
            name: name.to_string(),
            role: role.to_string(),
            ceased: false,
            natures_of_control: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.ceased
    }
}

// ============================================================================
// COLLABORATOR CONTRACTS
// ============================================================================

#[async_trait]
pub trait FilingExtractor: Send + Sync {
    /// Shareholders for an entity. Empty means "no data", never an error.
    async fn extract_shareholders(&self, entity: &RegistryId)
        -> CollaboratorResult<Vec<ShareholderRecord>>;
}

#[async_trait]
pub trait RegistrySearch: Send + Sync {
    async fn search_by_name(&self, name: &str) -> CollaboratorResult<Vec<Candidate>>;
}

#[async_trait]
pub trait RegistryProfile: Send + Sync {
    async fn get_profile(&self, id: &RegistryId) -> CollaboratorResult<CompanyProfile>;
}

#[async_trait]
pub trait OfficerController: Send + Sync {
    async fn get_officers(&self, id: &RegistryId) -> CollaboratorResult<Vec<Officer>>;

    async fn get_controllers(&self, id: &RegistryId) -> CollaboratorResult<Vec<Officer>>;
}

/// Convenience bundle for a single backend implementing every contract
pub trait Registry: FilingExtractor + RegistrySearch + RegistryProfile + OfficerController {}

impl<T> Registry for T where T: FilingExtractor + RegistrySearch + RegistryProfile + OfficerController {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_id_trims() {
        assert_eq!(RegistryId::new(" 00445790 ").as_str(), "00445790");
        assert_eq!(RegistryId::from("SC123").to_string(), "SC123");
    }

    #[test]
    fn test_guarantee_company_detection() {
        let profile = CompanyProfile {
            company_type: Some("private-limited-guarant-nsc".to_string()),
            ..Default::default()
        };
        assert!(profile.is_limited_by_guarantee());
        assert!(!CompanyProfile::default().is_limited_by_guarantee());
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let record: ShareholderRecord =
            serde_json::from_str(r#"{"name": "HERTZ (U.K.) LIMITED", "shares_held": 100}"#).unwrap();
        assert_eq!(record.shares_held, 100);
        assert_eq!(record.percentage, 0.0);
        assert_eq!(record.source, RecordSource::Filing);
    }
}
