// Ownership Resolution Engine - Core Library
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod canonical;     // Name canonicalizer - one comparison key
pub mod jurisdiction;  // Foreign legal-suffix classifier
pub mod collaborators; // Async contracts for registry, filings, officers
pub mod matcher;       // Registry matcher - exact, roman-numeral, Jaccard
pub mod config;        // Resolver limits and thresholds
pub mod tree;          // Ownership tree builder
pub mod screening;     // Screening list consolidator
pub mod fixtures;      // In-memory registry for tests and the CLI

// Re-export commonly used types
pub use error::{CollaboratorError, ConfigError};
pub use canonical::{canonical_name, canonicalize, is_corporate_name, CanonicalName, LegalForm};
pub use jurisdiction::{classify, ForeignClassification, ForeignEntityClassifier, SuffixRule};
pub use collaborators::{
    Candidate, CollaboratorResult, CompanyProfile, CompanyStatus,
    FilingExtractor, Officer, OfficerController, RecordSource,
    Registry, RegistryId, RegistryProfile, RegistrySearch, ShareholderRecord,
};
pub use matcher::{
    similarity, correct_roman_numerals,
    MatchCache, MatchResult, MatchStrategy, RegistryMatcher, RejectReason,
};
pub use config::ResolverConfig;
pub use tree::{
    Classification, Collaborators, MatchKind, OwnershipNode, OwnershipReport,
    OwnershipTreeBuilder, ShareholderKind, TreeStats, Truncation,
};
pub use screening::{Role, ScreeningConsolidator, ScreeningEntry, ScreeningList};
pub use fixtures::{load_shareholders_csv, CallSite, FixtureCompany, FixtureRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
