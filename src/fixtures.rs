// 🗂️ Fixture Registry - In-memory stand-in for every collaborator
//
// One model of companies (profile, shareholders, officers, controllers)
// answering all four collaborator contracts. Loadable from JSON; shareholder
// lists can come from CSV. Failures can be injected per call site so
// annotation paths are testable.

use crate::canonical::name_tokens;
use crate::collaborators::{
    Candidate, CollaboratorResult, CompanyProfile, CompanyStatus, FilingExtractor, Officer,
    OfficerController, RegistryId, RegistryProfile, RegistrySearch, ShareholderRecord,
};
use crate::error::CollaboratorError;
use crate::matcher::STOP_WORDS;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

// ============================================================================
// FIXTURE MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureCompany {
    pub id: RegistryId,
    pub name: String,

    #[serde(default)]
    pub status: CompanyStatus,

    #[serde(default)]
    pub is_publicly_traded: bool,

    #[serde(default)]
    pub company_type: Option<String>,

    #[serde(default)]
    pub shareholders: Vec<ShareholderRecord>,

    #[serde(default)]
    pub officers: Vec<Officer>,

    #[serde(default)]
    pub controllers: Vec<Officer>,
}

impl FixtureCompany {
    pub fn new(id: &str, name: &str) -> Self {
        FixtureCompany {
            id: RegistryId::new(id),
            name: name.to_string(),
            status: CompanyStatus::Active,
            is_publicly_traded: false,
            company_type: None,
            shareholders: Vec::new(),
            officers: Vec::new(),
            controllers: Vec::new(),
        }
    }

    pub fn shareholder(mut self, name: &str, shares_held: u64, percentage: f64) -> Self {
        self.shareholders
            .push(ShareholderRecord::new(name, shares_held, percentage, "ORDINARY"));
        self
    }

    pub fn publicly_traded(mut self) -> Self {
        self.is_publicly_traded = true;
        self
    }

    pub fn status(mut self, status: CompanyStatus) -> Self {
        self.status = status;
        self
    }

    pub fn company_type(mut self, company_type: &str) -> Self {
        self.company_type = Some(company_type.to_string());
        self
    }

    pub fn officer(mut self, name: &str, role: &str) -> Self {
        self.officers.push(Officer::new(name, role));
        self
    }

    pub fn controller(mut self, name: &str, natures_of_control: &[&str]) -> Self {
        let mut controller = Officer::new(name, "person-with-significant-control");
        controller.natures_of_control = natures_of_control.iter().map(|n| n.to_string()).collect();
        self.controllers.push(controller);
        self
    }

    fn candidate(&self) -> Candidate {
        Candidate {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status.clone(),
            is_publicly_traded: self.is_publicly_traded,
        }
    }
}

/// On-disk fixture layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub companies: Vec<FixtureCompany>,

    /// Pinned search results: query → registry ids, in result order
    #[serde(default)]
    pub searches: HashMap<String, Vec<RegistryId>>,
}

/// Collaborator call site, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSite {
    Filings,
    Search,
    Profile,
    Officers,
    Controllers,
}

impl CallSite {
    fn service(&self) -> &'static str {
        match self {
            CallSite::Filings => "filing-extractor",
            CallSite::Search => "registry-search",
            CallSite::Profile => "registry-profile",
            CallSite::Officers => "officer-register",
            CallSite::Controllers => "controller-register",
        }
    }
}

// ============================================================================
// FIXTURE REGISTRY
// ============================================================================

#[derive(Default)]
pub struct FixtureRegistry {
    companies: HashMap<RegistryId, FixtureCompany>,

    /// Insertion order, used as search result order
    order: Vec<RegistryId>,

    searches: HashMap<String, Vec<RegistryId>>,
    failures: HashSet<(CallSite, String)>,
    calls: Mutex<HashMap<(CallSite, String), usize>>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        FixtureRegistry::default()
    }

    pub fn from_fixture(fixture: FixtureFile) -> Self {
        let mut registry = FixtureRegistry::new();
        for company in fixture.companies {
            registry.add_company(company);
        }
        registry.searches = fixture.searches;
        registry
    }

    /// Load a JSON fixture file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read fixture file: {:?}", path.as_ref()))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let fixture: FixtureFile =
            serde_json::from_str(json).context("Failed to parse fixture JSON")?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn add_company(&mut self, company: FixtureCompany) {
        if !self.companies.contains_key(&company.id) {
            self.order.push(company.id.clone());
        }
        self.companies.insert(company.id.clone(), company);
    }

    /// Builder-style `add_company`
    pub fn with_company(mut self, company: FixtureCompany) -> Self {
        self.add_company(company);
        self
    }

    /// Pin the result list for an exact search string
    pub fn with_search(mut self, query: &str, ids: &[&str]) -> Self {
        self.searches
            .insert(query.to_string(), ids.iter().map(|id| RegistryId::new(*id)).collect());
        self
    }

    /// Make every call at `site` for `key` fail with a transport error.
    /// `key` is the registry id, or the query string for searches.
    pub fn with_failure(mut self, site: CallSite, key: &str) -> Self {
        self.failures.insert((site, key.to_string()));
        self
    }

    /// Replace a company's shareholders with records read from CSV
    pub fn load_shareholders_from_csv<P: AsRef<Path>>(&mut self, id: &RegistryId, path: P) -> Result<usize> {
        let records = load_shareholders_csv(path)?;
        let company = self
            .companies
            .get_mut(id)
            .with_context(|| format!("Unknown company in fixture: {}", id))?;
        company.shareholders = records;
        Ok(company.shareholders.len())
    }

    pub fn company(&self, id: &RegistryId) -> Option<&FixtureCompany> {
        self.companies.get(id)
    }

    pub fn company_count(&self) -> usize {
        self.companies.len()
    }

    /// How many times `site` was called with `key`
    pub fn call_count(&self, site: CallSite, key: &str) -> usize {
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.get(&(site, key.to_string())).copied().unwrap_or(0)
    }

    /// Total calls at `site`, any key
    pub fn total_calls(&self, site: CallSite) -> usize {
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls
            .iter()
            .filter(|((s, _), _)| *s == site)
            .map(|(_, n)| *n)
            .sum()
    }

    fn record_call(&self, site: CallSite, key: &str) -> CollaboratorResult<()> {
        {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            *calls.entry((site, key.to_string())).or_insert(0) += 1;
        }

        if self.failures.contains(&(site, key.to_string())) {
            debug!(service = site.service(), key, "injected failure");
            return Err(CollaboratorError::transport(site.service(), "injected failure"));
        }
        Ok(())
    }

    /// Companies sharing at least one significant word with the query
    fn overlapping(&self, query: &str) -> Vec<Candidate> {
        let query_words: HashSet<String> = significant_words(query);
        if query_words.is_empty() {
            return Vec::new();
        }

        self.order
            .iter()
            .filter_map(|id| self.companies.get(id))
            .filter(|c| significant_words(&c.name).iter().any(|w| query_words.contains(w)))
            .map(FixtureCompany::candidate)
            .collect()
    }
}

fn significant_words(name: &str) -> HashSet<String> {
    name_tokens(name)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

// ============================================================================
// COLLABORATOR IMPLEMENTATIONS
// ============================================================================

#[async_trait]
impl FilingExtractor for FixtureRegistry {
    async fn extract_shareholders(&self, entity: &RegistryId) -> CollaboratorResult<Vec<ShareholderRecord>> {
        self.record_call(CallSite::Filings, entity.as_str())?;
        Ok(self
            .companies
            .get(entity)
            .map(|c| c.shareholders.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RegistrySearch for FixtureRegistry {
    async fn search_by_name(&self, name: &str) -> CollaboratorResult<Vec<Candidate>> {
        self.record_call(CallSite::Search, name)?;

        if let Some(ids) = self.searches.get(name) {
            return Ok(ids
                .iter()
                .filter_map(|id| self.companies.get(id))
                .map(FixtureCompany::candidate)
                .collect());
        }

        Ok(self.overlapping(name))
    }
}

#[async_trait]
impl RegistryProfile for FixtureRegistry {
    async fn get_profile(&self, id: &RegistryId) -> CollaboratorResult<CompanyProfile> {
        self.record_call(CallSite::Profile, id.as_str())?;
        let company = self
            .companies
            .get(id)
            .ok_or_else(|| CollaboratorError::not_found(CallSite::Profile.service(), id.as_str()))?;

        Ok(CompanyProfile {
            name: Some(company.name.clone()),
            status: company.status.clone(),
            is_publicly_traded: company.is_publicly_traded,
            company_type: company.company_type.clone(),
        })
    }
}

#[async_trait]
impl OfficerController for FixtureRegistry {
    async fn get_officers(&self, id: &RegistryId) -> CollaboratorResult<Vec<Officer>> {
        self.record_call(CallSite::Officers, id.as_str())?;
        Ok(self
            .companies
            .get(id)
            .map(|c| c.officers.clone())
            .unwrap_or_default())
    }

    async fn get_controllers(&self, id: &RegistryId) -> CollaboratorResult<Vec<Officer>> {
        self.record_call(CallSite::Controllers, id.as_str())?;
        Ok(self
            .companies
            .get(id)
            .map(|c| c.controllers.clone())
            .unwrap_or_default())
    }
}

// ============================================================================
// CSV LOADING
// ============================================================================

/// Read shareholder records from CSV with headers
/// `name,shares_held,percentage,share_class` (the last two optional)
pub fn load_shareholders_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ShareholderRecord>> {
    let mut rdr = csv::Reader::from_path(path.as_ref()).context("Failed to open CSV file")?;
    let mut records = Vec::new();

    for result in rdr.deserialize() {
        let record: ShareholderRecord = result.context("Failed to deserialize shareholder record")?;
        records.push(record);
    }

    debug!(path = ?path.as_ref(), count = records.len(), "loaded shareholders from CSV");
    Ok(records)
}
