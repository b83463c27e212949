// 🌳 Ownership Tree Builder - From a target company up to its ultimate owners
//
// Per node: Start → {ForeignCheck, RegistryMatch} → {Terminal | Resolved-Recurse | Unresolved}
//
// Every node's binding (identity, display name, jurisdiction, classification)
// is computed from its own shareholder record and written once, before the
// node's frame is pushed. Expansion runs on an explicit work-list; each frame
// carries its own ancestor chain, so cycle detection is per path.

use crate::canonical::is_corporate_name;
use crate::collaborators::{
    FilingExtractor, OfficerController, RecordSource, Registry, RegistryId, RegistryProfile,
    RegistrySearch, ShareholderRecord,
};
use crate::config::ResolverConfig;
use crate::jurisdiction::ForeignEntityClassifier;
use crate::matcher::{MatchCache, MatchResult, MatchStrategy, RegistryMatcher, RejectReason};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// CLASSIFICATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// Matched to a domestic registry entity; the only kind with children
    DomesticResolved,

    /// Foreign legal suffix, never looked up
    ForeignUnresolved,

    /// No confident match, or a collaborator failed
    Unresolved,

    /// Listed company; ownership is public, expansion stops here
    PubliclyTradedTerminal,

    /// Natural person
    Individual,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::DomesticResolved => "domestic-resolved",
            Classification::ForeignUnresolved => "foreign-unresolved",
            Classification::Unresolved => "unresolved",
            Classification::PubliclyTradedTerminal => "publicly-traded-terminal",
            Classification::Individual => "individual",
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            Classification::DomesticResolved | Classification::PubliclyTradedTerminal
        )
    }
}

/// What a shareholder record is, decided once from its extracted name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareholderKind {
    Individual,
    DomesticCorporate,
    ForeignCorporate { jurisdiction: Option<String> },
}

impl ShareholderKind {
    pub fn of(name: &str, classifier: &ForeignEntityClassifier) -> Self {
        let foreign = classifier.classify(name);
        if foreign.is_foreign {
            return ShareholderKind::ForeignCorporate {
                jurisdiction: foreign.jurisdiction,
            };
        }
        if is_corporate_name(name) {
            ShareholderKind::DomesticCorporate
        } else {
            ShareholderKind::Individual
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Truncation {
    DepthLimit,
    Cycle,
}

/// How a node's identity was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    /// Supplied by the caller (the target)
    Given,
    Exact,
    RomanNumeralCorrected,
    Fuzzy,
}

impl From<MatchStrategy> for MatchKind {
    fn from(strategy: MatchStrategy) -> Self {
        match strategy {
            MatchStrategy::Exact => MatchKind::Exact,
            MatchStrategy::RomanNumeralCorrected => MatchKind::RomanNumeralCorrected,
            MatchStrategy::Fuzzy => MatchKind::Fuzzy,
        }
    }
}

// ============================================================================
// NODE BINDING + NODE
// ============================================================================

/// Everything a node knows about itself. Built in one place and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeBinding {
    identity: Option<RegistryId>,
    display_name: String,
    extracted_name: String,
    classification: Classification,
    jurisdiction: Option<String>,
    ownership_pct: f64,
    depth: usize,
    match_kind: Option<MatchKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    match_score: Option<f64>,
    source: RecordSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncation: Option<Truncation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

impl NodeBinding {
    fn from_record(record: &ShareholderRecord, depth: usize, classification: Classification) -> Self {
        NodeBinding {
            identity: None,
            display_name: record.name.trim().to_string(),
            extracted_name: record.name.clone(),
            classification,
            jurisdiction: None,
            ownership_pct: record.percentage,
            depth,
            match_kind: None,
            match_score: None,
            source: record.source,
            truncation: None,
            failure: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipNode {
    #[serde(flatten)]
    binding: NodeBinding,
    children: Vec<OwnershipNode>,
}

impl OwnershipNode {
    pub fn identity(&self) -> Option<&RegistryId> {
        self.binding.identity.as_ref()
    }

    pub fn display_name(&self) -> &str {
        &self.binding.display_name
    }

    pub fn extracted_name(&self) -> &str {
        &self.binding.extracted_name
    }

    pub fn classification(&self) -> Classification {
        self.binding.classification
    }

    pub fn jurisdiction(&self) -> Option<&str> {
        self.binding.jurisdiction.as_deref()
    }

    pub fn ownership_pct(&self) -> f64 {
        self.binding.ownership_pct
    }

    pub fn depth(&self) -> usize {
        self.binding.depth
    }

    pub fn match_kind(&self) -> Option<MatchKind> {
        self.binding.match_kind
    }

    pub fn match_score(&self) -> Option<f64> {
        self.binding.match_score
    }

    pub fn source(&self) -> RecordSource {
        self.binding.source
    }

    pub fn truncation(&self) -> Option<Truncation> {
        self.binding.truncation
    }

    pub fn failure(&self) -> Option<&str> {
        self.binding.failure.as_deref()
    }

    pub fn children(&self) -> &[OwnershipNode] {
        &self.children
    }

    /// Pre-order traversal (self first, children in presented order)
    pub fn walk(&self) -> Vec<&OwnershipNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// First node (pre-order) whose display name matches, case-insensitively
    pub fn find(&self, display_name: &str) -> Option<&OwnershipNode> {
        self.walk()
            .into_iter()
            .find(|n| n.display_name().eq_ignore_ascii_case(display_name))
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub by_classification: BTreeMap<Classification, usize>,
    pub max_depth_reached: usize,
    pub truncated: usize,
    pub failures: usize,
}

impl TreeStats {
    pub fn of(root: &OwnershipNode) -> Self {
        let mut stats = TreeStats::default();
        for node in root.walk() {
            stats.total_nodes += 1;
            *stats.by_classification.entry(node.classification()).or_insert(0) += 1;
            stats.max_depth_reached = stats.max_depth_reached.max(node.depth());
            if node.truncation().is_some() {
                stats.truncated += 1;
            }
            if node.failure().is_some() {
                stats.failures += 1;
            }
        }
        stats
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.by_classification.get(&classification).copied().unwrap_or(0)
    }
}

/// One build of one target, with run metadata
#[derive(Debug, Clone, Serialize)]
pub struct OwnershipReport {
    pub run_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub target: RegistryId,
    pub max_depth: usize,
    pub stats: TreeStats,
    pub root: OwnershipNode,
}

impl OwnershipReport {
    pub fn new(target: RegistryId, max_depth: usize, root: OwnershipNode) -> Self {
        OwnershipReport {
            run_id: Uuid::new_v4(),
            built_at: Utc::now(),
            target,
            max_depth,
            stats: TreeStats::of(&root),
            root,
        }
    }

    /// Content hash of the tree; equal trees give equal fingerprints
    pub fn fingerprint(&self) -> String {
        tree_fingerprint(&self.root)
    }
}

/// SHA-256 over every node's binding, in pre-order
pub fn tree_fingerprint(root: &OwnershipNode) -> String {
    let mut hasher = Sha256::new();
    for node in root.walk() {
        let b = &node.binding;
        hasher.update(format!(
            "{}|{}|{}|{}|{:?}|{}|{:.4}|{:?}|{:?}|{:?}|{:?}|{}|{}\n",
            b.depth,
            b.identity.as_ref().map(|i| i.as_str()).unwrap_or(""),
            b.display_name,
            b.extracted_name,
            b.classification,
            b.jurisdiction.as_deref().unwrap_or(""),
            b.ownership_pct,
            b.match_kind,
            b.match_score,
            b.truncation,
            b.source,
            b.failure.as_deref().unwrap_or(""),
            node.children.len(),
        ));
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// BUILDER
// ============================================================================

/// The collaborators a build consumes
#[derive(Clone)]
pub struct Collaborators {
    pub filings: Arc<dyn FilingExtractor>,
    pub search: Arc<dyn RegistrySearch>,
    pub profiles: Arc<dyn RegistryProfile>,
    pub officers: Arc<dyn OfficerController>,
}

impl Collaborators {
    /// All four contracts served by one backend
    pub fn from_registry<R: Registry + 'static>(registry: Arc<R>) -> Self {
        Collaborators {
            filings: registry.clone(),
            search: registry.clone(),
            profiles: registry.clone(),
            officers: registry,
        }
    }
}

/// Arena slot: a finished binding plus child slot indices in filing order
struct Slot {
    binding: NodeBinding,
    children: Vec<usize>,
}

/// Pending expansion of a resolved node
struct Frame {
    index: usize,
    identity: RegistryId,
    depth: usize,
    ancestors: Vec<RegistryId>,
    records: Vec<ShareholderRecord>,
}

/// Outcome of resolving one record: its binding, plus records to expand if any
struct Resolution {
    binding: NodeBinding,
    expand: Option<(RegistryId, Vec<ShareholderRecord>)>,
}

impl Resolution {
    fn leaf(binding: NodeBinding) -> Self {
        Resolution { binding, expand: None }
    }
}

pub struct OwnershipTreeBuilder {
    collaborators: Collaborators,
    matcher: RegistryMatcher,
    config: ResolverConfig,
}

impl OwnershipTreeBuilder {
    pub fn new(collaborators: Collaborators, config: ResolverConfig) -> Self {
        let mut matcher = RegistryMatcher::new().with_threshold(config.fuzzy_threshold);
        if config.cache_lookups {
            matcher = matcher.with_cache(Arc::new(MatchCache::new()));
        }

        OwnershipTreeBuilder {
            collaborators,
            matcher,
            config,
        }
    }

    /// Use a custom foreign-suffix classifier (e.g. extended from a rules file)
    pub fn with_classifier(mut self, classifier: Arc<ForeignEntityClassifier>) -> Self {
        self.matcher = self.matcher.with_classifier(classifier);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Build with the configured depth limit and wrap in a report
    pub async fn build_report(&self, target: &RegistryId) -> OwnershipReport {
        let root = self.build(target, 0, self.config.max_depth).await;
        OwnershipReport::new(target.clone(), self.config.max_depth, root)
    }

    /// Resolve the ownership tree above `entity`. Never fails: problems end
    /// up as node classifications and annotations.
    pub async fn build(&self, entity: &RegistryId, current_depth: usize, max_depth: usize) -> OwnershipNode {
        info!(entity = %entity, max_depth, "building ownership tree");

        let root = self.resolve_root(entity, current_depth, max_depth).await;
        let mut arena = vec![Slot {
            binding: root.binding,
            children: Vec::new(),
        }];

        let mut stack: Vec<Frame> = Vec::new();
        if let Some((identity, records)) = root.expand {
            stack.push(Frame {
                index: 0,
                identity,
                depth: current_depth,
                ancestors: Vec::new(),
                records,
            });
        }

        while let Some(frame) = stack.pop() {
            let mut path = frame.ancestors.clone();
            path.push(frame.identity.clone());
            let child_depth = frame.depth + 1;

            debug!(entity = %frame.identity, depth = frame.depth, records = frame.records.len(), "expanding node");

            let resolutions = join_all(
                frame
                    .records
                    .iter()
                    .map(|record| self.resolve_record(record, child_depth, max_depth, &path)),
            )
            .await;

            let mut pending = Vec::new();
            for resolution in resolutions {
                let index = arena.len();
                arena.push(Slot {
                    binding: resolution.binding,
                    children: Vec::new(),
                });
                arena[frame.index].children.push(index);

                if let Some((identity, records)) = resolution.expand {
                    pending.push(Frame {
                        index,
                        identity,
                        depth: child_depth,
                        ancestors: path.clone(),
                        records,
                    });
                }
            }

            // Reverse so the first filed shareholder is expanded first
            stack.extend(pending.into_iter().rev());
        }

        let root = assemble(arena);
        info!(entity = %entity, nodes = root.walk().len(), "ownership tree built");
        root
    }

    async fn resolve_root(&self, entity: &RegistryId, depth: usize, max_depth: usize) -> Resolution {
        let mut binding = NodeBinding {
            identity: Some(entity.clone()),
            display_name: entity.to_string(),
            extracted_name: entity.to_string(),
            classification: Classification::DomesticResolved,
            jurisdiction: None,
            ownership_pct: 100.0,
            depth,
            match_kind: Some(MatchKind::Given),
            match_score: None,
            source: RecordSource::Filing,
            truncation: None,
            failure: None,
        };

        let profile = match self.collaborators.profiles.get_profile(entity).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(entity = %entity, error = %e, "target profile lookup failed");
                binding.classification = Classification::Unresolved;
                binding.failure = Some(e.to_string());
                return Resolution::leaf(binding);
            }
        };

        if let Some(name) = &profile.name {
            binding.display_name = name.clone();
            binding.extracted_name = name.clone();
        }

        if profile.is_publicly_traded {
            binding.classification = Classification::PubliclyTradedTerminal;
            return Resolution::leaf(binding);
        }

        if depth >= max_depth {
            binding.truncation = Some(Truncation::DepthLimit);
            return Resolution::leaf(binding);
        }

        match self.fetch_records(entity, profile.is_limited_by_guarantee()).await {
            Ok(records) => Resolution {
                binding,
                expand: Some((entity.clone(), records)),
            },
            Err(failure) => {
                binding.classification = Classification::Unresolved;
                binding.failure = Some(failure);
                Resolution::leaf(binding)
            }
        }
    }

    async fn resolve_record(
        &self,
        record: &ShareholderRecord,
        depth: usize,
        max_depth: usize,
        ancestors: &[RegistryId],
    ) -> Resolution {
        let kind = ShareholderKind::of(&record.name, self.matcher.classifier());

        match kind {
            ShareholderKind::Individual => {
                Resolution::leaf(NodeBinding::from_record(record, depth, Classification::Individual))
            }
            ShareholderKind::ForeignCorporate { jurisdiction } => {
                debug!(name = %record.name, jurisdiction = ?jurisdiction, "foreign shareholder");
                let mut binding = NodeBinding::from_record(record, depth, Classification::ForeignUnresolved);
                binding.jurisdiction = jurisdiction;
                Resolution::leaf(binding)
            }
            ShareholderKind::DomesticCorporate => {
                self.resolve_domestic(record, depth, max_depth, ancestors).await
            }
        }
    }

    async fn resolve_domestic(
        &self,
        record: &ShareholderRecord,
        depth: usize,
        max_depth: usize,
        ancestors: &[RegistryId],
    ) -> Resolution {
        let mut binding = NodeBinding::from_record(record, depth, Classification::Unresolved);

        let outcome = match self
            .matcher
            .match_name(&record.name, self.collaborators.search.as_ref())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(name = %record.name, error = %e, "registry search failed");
                binding.failure = Some(e.to_string());
                return Resolution::leaf(binding);
            }
        };

        let candidate = match &outcome {
            MatchResult::Rejected(RejectReason::Foreign { jurisdiction }) => {
                binding.classification = Classification::ForeignUnresolved;
                binding.jurisdiction = jurisdiction.clone();
                return Resolution::leaf(binding);
            }
            MatchResult::Rejected(reason) => {
                debug!(name = %record.name, reason = ?reason, "no confident registry match");
                return Resolution::leaf(binding);
            }
            MatchResult::Exact { candidate, .. } | MatchResult::FuzzyAccepted { candidate, .. } => {
                candidate.clone()
            }
        };

        let identity = candidate.id.clone();
        binding.identity = Some(identity.clone());
        binding.display_name = candidate.name.clone();
        binding.match_kind = outcome.strategy().map(MatchKind::from);
        if let MatchResult::FuzzyAccepted { score, .. } = &outcome {
            binding.match_score = Some(*score);
        }

        if ancestors.contains(&identity) {
            debug!(entity = %identity, "ownership cycle, not expanding");
            binding.classification = Classification::DomesticResolved;
            binding.truncation = Some(Truncation::Cycle);
            return Resolution::leaf(binding);
        }

        let profile = match self.collaborators.profiles.get_profile(&identity).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(entity = %identity, error = %e, "profile lookup failed");
                binding.failure = Some(e.to_string());
                return Resolution::leaf(binding);
            }
        };

        if let Some(name) = &profile.name {
            binding.display_name = name.clone();
        }

        if profile.is_publicly_traded || candidate.is_publicly_traded {
            debug!(entity = %identity, "publicly traded, stopping");
            binding.classification = Classification::PubliclyTradedTerminal;
            return Resolution::leaf(binding);
        }

        if depth >= max_depth {
            debug!(entity = %identity, depth, "depth limit reached");
            binding.classification = Classification::DomesticResolved;
            binding.truncation = Some(Truncation::DepthLimit);
            return Resolution::leaf(binding);
        }

        match self.fetch_records(&identity, profile.is_limited_by_guarantee()).await {
            Ok(records) => {
                binding.classification = Classification::DomesticResolved;
                Resolution {
                    binding,
                    expand: Some((identity, records)),
                }
            }
            Err(failure) => {
                binding.failure = Some(failure);
                Resolution::leaf(binding)
            }
        }
    }

    /// Shareholder records ready for expansion. Filings first; the controller
    /// register stands in when filings are empty or the company is limited
    /// by guarantee.
    async fn fetch_records(&self, entity: &RegistryId, limited_by_guarantee: bool) -> Result<Vec<ShareholderRecord>, String> {
        let mut records = Vec::new();

        if !limited_by_guarantee {
            let raw = self
                .collaborators
                .filings
                .extract_shareholders(entity)
                .await
                .map_err(|e| {
                    warn!(entity = %entity, error = %e, "filing extraction failed");
                    e.to_string()
                })?;
            records = derive_percentages(raw);
        }

        if records.is_empty() && self.config.controller_fallback {
            match self.collaborators.officers.get_controllers(entity).await {
                Ok(controllers) => {
                    records = controllers
                        .iter()
                        .filter(|c| c.is_active())
                        .map(|c| ShareholderRecord {
                            name: c.name.clone(),
                            shares_held: 0,
                            percentage: control_percentage(&c.natures_of_control),
                            share_class: String::new(),
                            source: RecordSource::ControllerRegister,
                        })
                        .collect();
                    debug!(entity = %entity, count = records.len(), "using controller register");
                }
                Err(e) => {
                    warn!(entity = %entity, error = %e, "controller register lookup failed");
                    return Err(e.to_string());
                }
            }
        }

        Ok(records)
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Fill missing percentages from share counts (2 dp); drop empty records
pub fn derive_percentages(records: Vec<ShareholderRecord>) -> Vec<ShareholderRecord> {
    let total: u64 = records.iter().map(|r| r.shares_held).sum();

    records
        .into_iter()
        .filter(|r| !r.name.trim().is_empty())
        .filter(|r| r.shares_held > 0 || r.percentage > 0.0)
        .map(|mut r| {
            if r.percentage <= 0.0 && total > 0 {
                r.percentage = round2(r.shares_held as f64 / total as f64 * 100.0);
            }
            r
        })
        .collect()
}

/// Ownership percentage implied by controller-register natures of control
pub fn control_percentage(natures: &[String]) -> f64 {
    natures
        .iter()
        .map(|nature| {
            if nature.contains("75-to-100") {
                87.5
            } else if nature.contains("50-to-75") {
                62.5
            } else if nature.contains("25-to-50") {
                37.5
            } else if nature.contains("right-to-appoint-and-remove-directors") {
                100.0
            } else {
                50.0
            }
        })
        .fold(None, |best: Option<f64>, pct| Some(best.map_or(pct, |b| b.max(pct))))
        .unwrap_or(50.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Turn the arena into an owned tree. Children always sit at higher indices
/// than their parent, so one reverse pass finishes every subtree first.
fn assemble(arena: Vec<Slot>) -> OwnershipNode {
    let mut built: Vec<Option<OwnershipNode>> = Vec::with_capacity(arena.len());
    built.resize_with(arena.len(), || None);

    let mut slots: Vec<Option<Slot>> = arena.into_iter().map(Some).collect();

    for index in (0..slots.len()).rev() {
        let Some(slot) = slots[index].take() else {
            continue;
        };

        let mut children: Vec<OwnershipNode> = slot
            .children
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();

        // Stable: equal percentage and name keep filing order
        children.sort_by(|a, b| {
            b.binding
                .ownership_pct
                .total_cmp(&a.binding.ownership_pct)
                .then_with(|| a.binding.extracted_name.cmp(&b.binding.extracted_name))
        });

        built[index] = Some(OwnershipNode {
            binding: slot.binding,
            children,
        });
    }

    built
        .into_iter()
        .next()
        .flatten()
        .unwrap_or_else(|| OwnershipNode {
            binding: NodeBinding {
                identity: None,
                display_name: String::new(),
                extracted_name: String::new(),
                classification: Classification::Unresolved,
                jurisdiction: None,
                ownership_pct: 0.0,
                depth: 0,
                match_kind: None,
                match_score: None,
                source: RecordSource::Filing,
                truncation: None,
                failure: None,
            },
            children: Vec::new(),
        })
}

// ============================================================================
// TESTS
// ============================================================================
