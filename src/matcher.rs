// 🎯 Registry Matcher - Pick the registry entity a raw shareholder name refers to
//
// Strategies, in order:
//   1. Foreign short-circuit  (no registry call)
//   2. Exact match            (case-insensitive, active candidates preferred)
//   3. Roman-numeral repair   ("HERTZ HOLDINGS ITI UK" → "... III UK"), then exact
//   4. Jaccard word overlap   (stop-words removed, accepted at >= 0.5)
//
// Anything below the threshold is Rejected; there is no first-result fallback.

use crate::canonical::name_tokens;
use crate::collaborators::{Candidate, CollaboratorResult, RegistrySearch};
use crate::jurisdiction::ForeignEntityClassifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Words ignored when scoring similarity
pub const STOP_WORDS: &[&str] = &["limited", "ltd", "plc", "llp", "holdings", "company"];

/// Default acceptance threshold for Jaccard similarity
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.5;

// ============================================================================
// MATCH RESULT
// ============================================================================

/// How a node's registry identity was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    /// Case-insensitive exact name match
    Exact,

    /// Exact match after OCR roman-numeral correction
    RomanNumeralCorrected,

    /// Jaccard similarity at or above threshold
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "reason")]
pub enum RejectReason {
    /// Foreign legal suffix - the domestic registry was not consulted
    Foreign { jurisdiction: Option<String> },

    /// Registry search returned nothing
    NoCandidates,

    /// Best candidate scored below the acceptance threshold
    BelowThreshold {
        best_score: f64,
        best_name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchResult {
    Exact {
        candidate: Candidate,
        roman_numeral_corrected: bool,
    },
    FuzzyAccepted {
        candidate: Candidate,
        score: f64,
    },
    Rejected(RejectReason),
}

impl MatchResult {
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            MatchResult::Exact { candidate, .. } => Some(candidate),
            MatchResult::FuzzyAccepted { candidate, .. } => Some(candidate),
            MatchResult::Rejected(_) => None,
        }
    }

    pub fn strategy(&self) -> Option<MatchStrategy> {
        match self {
            MatchResult::Exact {
                roman_numeral_corrected: true,
                ..
            } => Some(MatchStrategy::RomanNumeralCorrected),
            MatchResult::Exact { .. } => Some(MatchStrategy::Exact),
            MatchResult::FuzzyAccepted { .. } => Some(MatchStrategy::Fuzzy),
            MatchResult::Rejected(_) => None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.candidate().is_some()
    }
}

// ============================================================================
// MATCH CACHE
// ============================================================================

/// Read-through, append-only cache of lookup outcomes keyed by the exact
/// search string. Only lookups are cached; node bindings never are.
#[derive(Default)]
pub struct MatchCache {
    entries: RwLock<HashMap<String, MatchResult>>,
}

impl MatchCache {
    pub fn new() -> Self {
        MatchCache::default()
    }

    pub fn get(&self, search: &str) -> Option<MatchResult> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(search).cloned()
    }

    /// First write wins; existing entries are never replaced
    pub fn insert(&self, search: &str, result: MatchResult) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.entry(search.to_string()).or_insert(result);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// REGISTRY MATCHER
// ============================================================================

pub struct RegistryMatcher {
    /// Minimum Jaccard score for FuzzyAccepted (default: 0.5)
    pub fuzzy_threshold: f64,

    classifier: Arc<ForeignEntityClassifier>,
    cache: Option<Arc<MatchCache>>,
}

impl RegistryMatcher {
    /// Matcher with default threshold, built-in suffix tables and no cache
    pub fn new() -> Self {
        RegistryMatcher {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            classifier: Arc::new(ForeignEntityClassifier::new()),
            cache: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<ForeignEntityClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_cache(mut self, cache: Arc<MatchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn classifier(&self) -> &ForeignEntityClassifier {
        &self.classifier
    }

    /// Resolve a raw extracted name against the registry
    pub async fn match_name(
        &self,
        name: &str,
        search: &dyn RegistrySearch,
    ) -> CollaboratorResult<MatchResult> {
        // Strategy 1: Foreign short-circuit
        let foreign = self.classifier.classify(name);
        if foreign.is_foreign {
            debug!(name, jurisdiction = ?foreign.jurisdiction, "foreign suffix, registry not consulted");
            return Ok(MatchResult::Rejected(RejectReason::Foreign {
                jurisdiction: foreign.jurisdiction,
            }));
        }

        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(name)) {
            debug!(name, "match cache hit");
            return Ok(cached);
        }

        let candidates = search.search_by_name(name).await?;
        let result = self.select(name, &candidates);
        debug!(name, candidates = candidates.len(), strategy = ?result.strategy(), "registry match decided");

        if let Some(cache) = &self.cache {
            cache.insert(name, result.clone());
        }

        Ok(result)
    }

    /// Pure selection over a candidate list (strategies 2-4)
    pub fn select(&self, name: &str, candidates: &[Candidate]) -> MatchResult {
        let pool = preferred_pool(candidates);
        if pool.is_empty() {
            return MatchResult::Rejected(RejectReason::NoCandidates);
        }

        // Strategy 2: Exact match
        if let Some(candidate) = pool.iter().find(|c| same_name(&c.name, name)) {
            return MatchResult::Exact {
                candidate: (*candidate).clone(),
                roman_numeral_corrected: false,
            };
        }

        // Strategy 3: Roman-numeral OCR correction, then exact again
        if let Some(corrected) = correct_roman_numerals(name) {
            if let Some(candidate) = pool.iter().find(|c| same_name(&c.name, &corrected)) {
                debug!(name, corrected = %corrected, "roman numeral correction matched");
                return MatchResult::Exact {
                    candidate: (*candidate).clone(),
                    roman_numeral_corrected: true,
                };
            }
        }

        // Strategy 4: Jaccard similarity, earliest candidate wins ties
        let mut best: Option<(&Candidate, f64)> = None;
        for candidate in &pool {
            let score = similarity(name, &candidate.name);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((*candidate, score));
            }
        }

        match best {
            Some((candidate, score)) if score >= self.fuzzy_threshold => MatchResult::FuzzyAccepted {
                candidate: candidate.clone(),
                score,
            },
            Some((candidate, score)) => MatchResult::Rejected(RejectReason::BelowThreshold {
                best_score: score,
                best_name: Some(candidate.name.clone()),
            }),
            None => MatchResult::Rejected(RejectReason::NoCandidates),
        }
    }
}

impl Default for RegistryMatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Active candidates if any exist, otherwise everything
fn preferred_pool(candidates: &[Candidate]) -> Vec<&Candidate> {
    let active: Vec<&Candidate> = candidates.iter().filter(|c| c.status.is_active()).collect();
    if active.is_empty() {
        candidates.iter().collect()
    } else {
        active
    }
}

/// Case-insensitive, whitespace-insensitive equality
fn same_name(a: &str, b: &str) -> bool {
    let a = a.split_whitespace().map(|t| t.to_lowercase());
    let b = b.split_whitespace().map(|t| t.to_lowercase());
    a.eq(b)
}

/// Apply the documented OCR substitutions on roman-numeral tokens.
/// Returns None when nothing changed.
///
/// - "ITI" → "III", "IVI" → "IV"
/// - "I I I" → "III", "I I" → "II"
pub fn correct_roman_numerals(name: &str) -> Option<String> {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut changed = false;
    let mut i = 0;

    while i < tokens.len() {
        let upper = tokens[i].to_uppercase();
        match upper.as_str() {
            "ITI" => {
                out.push("III".to_string());
                changed = true;
                i += 1;
            }
            "IVI" => {
                out.push("IV".to_string());
                changed = true;
                i += 1;
            }
            "I" => {
                let run = tokens[i..]
                    .iter()
                    .take_while(|t| t.eq_ignore_ascii_case("i"))
                    .count();
                if run == 2 || run == 3 {
                    out.push("I".repeat(run));
                    changed = true;
                } else {
                    out.extend(tokens[i..i + run].iter().map(|t| t.to_string()));
                }
                i += run;
            }
            _ => {
                out.push(tokens[i].to_string());
                i += 1;
            }
        }
    }

    if changed {
        Some(out.join(" "))
    } else {
        None
    }
}

/// Word set with stop-words removed
fn word_set(name: &str) -> BTreeSet<String> {
    name_tokens(name)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Jaccard similarity of the two names' word sets: |A ∩ B| / |A ∪ B|
///
/// Example: "PROJECT ARDENT TOPCO LIMITED" vs "ARDENT PROJECTS LIMITED" = 0.25
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = word_set(a);
    let b = word_set(b);

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();

    intersection as f64 / union as f64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CompanyStatus, RegistryId};
    use crate::error::CollaboratorError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSearch {
        candidates: Vec<Candidate>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubSearch {
        fn new(candidates: Vec<Candidate>) -> Self {
            StubSearch {
                candidates,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RegistrySearch for StubSearch {
        async fn search_by_name(&self, _name: &str) -> CollaboratorResult<Vec<Candidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CollaboratorError::transport("registry-search", "timeout"));
            }
            Ok(self.candidates.clone())
        }
    }

    fn candidate(id: &str, name: &str, status: CompanyStatus) -> Candidate {
        Candidate {
            id: RegistryId::new(id),
            name: name.to_string(),
            status,
            is_publicly_traded: false,
        }
    }

    #[test]
    fn test_similarity_ardent() {
        let score = similarity("PROJECT ARDENT TOPCO LIMITED", "ARDENT PROJECTS LIMITED");
        assert!((score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_identical() {
        let score = similarity("HERTZ HOLDINGS III UK LIMITED", "HERTZ HOLDINGS III UK LIMITED");
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_only_stop_words() {
        assert_eq!(similarity("Holdings Limited", "Company Ltd"), 0.0);
    }

    #[test]
    fn test_correct_roman_numerals() {
        assert_eq!(
            correct_roman_numerals("HERTZ HOLDINGS ITI UK LIMITED").as_deref(),
            Some("HERTZ HOLDINGS III UK LIMITED")
        );
        assert_eq!(
            correct_roman_numerals("ACME IVI LIMITED").as_deref(),
            Some("ACME IV LIMITED")
        );
        assert_eq!(
            correct_roman_numerals("ACME I I I LIMITED").as_deref(),
            Some("ACME III LIMITED")
        );
        assert_eq!(
            correct_roman_numerals("ACME I I LIMITED").as_deref(),
            Some("ACME II LIMITED")
        );
        assert_eq!(correct_roman_numerals("ACME III LIMITED"), None);
        assert_eq!(correct_roman_numerals("ACME I LIMITED"), None);
    }

    #[test]
    fn test_select_ardent_is_rejected() {
        let matcher = RegistryMatcher::new();
        let candidates = vec![candidate("01", "ARDENT PROJECTS LIMITED", CompanyStatus::Active)];

        let result = matcher.select("PROJECT ARDENT TOPCO LIMITED", &candidates);

        match result {
            MatchResult::Rejected(RejectReason::BelowThreshold { best_score, best_name }) => {
                assert!((best_score - 0.25).abs() < 1e-9);
                assert_eq!(best_name.as_deref(), Some("ARDENT PROJECTS LIMITED"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_select_exact_is_case_insensitive() {
        let matcher = RegistryMatcher::new();
        let candidates = vec![
            candidate("02", "HERTZ HOLDINGS II UK LIMITED", CompanyStatus::Active),
            candidate("03", "HERTZ HOLDINGS III UK LIMITED", CompanyStatus::Active),
        ];

        let result = matcher.select("Hertz Holdings III UK Limited", &candidates);

        assert_eq!(result.strategy(), Some(MatchStrategy::Exact));
        assert_eq!(result.candidate().unwrap().id.as_str(), "03");
    }

    #[test]
    fn test_select_roman_numeral_correction() {
        let matcher = RegistryMatcher::new();
        let candidates = vec![
            candidate("2HZ", "2 HERTZ LTD", CompanyStatus::Active),
            candidate("II", "HERTZ HOLDINGS II U.K. LIMITED", CompanyStatus::Dissolved),
            candidate("III", "HERTZ HOLDINGS III UK LIMITED", CompanyStatus::Active),
        ];

        let result = matcher.select("HERTZ HOLDINGS ITI UK LIMITED", &candidates);

        assert_eq!(result.strategy(), Some(MatchStrategy::RomanNumeralCorrected));
        assert_eq!(result.candidate().unwrap().id.as_str(), "III");
    }

    #[test]
    fn test_select_prefers_active() {
        let matcher = RegistryMatcher::new();
        let candidates = vec![
            candidate("OLD", "ACME TRADING LIMITED", CompanyStatus::Dissolved),
            candidate("NEW", "ACME TRADING LIMITED", CompanyStatus::Active),
        ];

        let result = matcher.select("ACME TRADING LIMITED", &candidates);
        assert_eq!(result.candidate().unwrap().id.as_str(), "NEW");
    }

    #[test]
    fn test_select_falls_back_to_inactive() {
        let matcher = RegistryMatcher::new();
        let candidates = vec![candidate("OLD", "ACME TRADING LIMITED", CompanyStatus::Dissolved)];

        let result = matcher.select("ACME TRADING LIMITED", &candidates);
        assert_eq!(result.candidate().unwrap().id.as_str(), "OLD");
    }

    #[test]
    fn test_select_fuzzy_accepted() {
        let matcher = RegistryMatcher::new();
        let candidates = vec![
            candidate("A", "SOUTHWIND LOGISTICS LIMITED", CompanyStatus::Active),
            candidate("B", "NORTHWIND TRADING GROUP LIMITED", CompanyStatus::Active),
        ];

        let result = matcher.select("NORTHWIND TRADING LIMITED", &candidates);

        match result {
            MatchResult::FuzzyAccepted { candidate, score } => {
                assert_eq!(candidate.id.as_str(), "B");
                assert!((score - 2.0 / 3.0).abs() < 1e-9);
            }
            other => panic!("expected fuzzy match, got {:?}", other),
        }
    }

    #[test]
    fn test_select_no_candidates() {
        let matcher = RegistryMatcher::new();
        let result = matcher.select("ANYTHING LIMITED", &[]);
        assert_eq!(result, MatchResult::Rejected(RejectReason::NoCandidates));
    }

    #[tokio::test]
    async fn test_foreign_name_skips_registry() {
        let matcher = RegistryMatcher::new();
        let search = StubSearch::new(vec![candidate(
            "X",
            "HERTZ HOLDINGS NETHERLANDS 2 B.V.",
            CompanyStatus::Active,
        )]);

        let result = matcher
            .match_name("HERTZ HOLDINGS NETHERLANDS 2 B.V.", &search)
            .await
            .unwrap();

        assert_eq!(
            result,
            MatchResult::Rejected(RejectReason::Foreign {
                jurisdiction: Some("NETHERLANDS".to_string())
            })
        );
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let matcher = RegistryMatcher::new();
        let mut search = StubSearch::new(vec![]);
        search.fail = true;

        let result = matcher.match_name("ACME TRADING LIMITED", &search).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cache_shortcuts_repeat_lookups() {
        let cache = Arc::new(MatchCache::new());
        let matcher = RegistryMatcher::new().with_cache(cache.clone());
        let search = StubSearch::new(vec![candidate("01", "ACME TRADING LIMITED", CompanyStatus::Active)]);

        let first = matcher.match_name("ACME TRADING LIMITED", &search).await.unwrap();
        let second = matcher.match_name("ACME TRADING LIMITED", &search).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(search.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_is_append_only() {
        let cache = MatchCache::new();
        cache.insert("ACME", MatchResult::Rejected(RejectReason::NoCandidates));
        cache.insert(
            "ACME",
            MatchResult::Rejected(RejectReason::Foreign { jurisdiction: None }),
        );

        assert_eq!(
            cache.get("ACME"),
            Some(MatchResult::Rejected(RejectReason::NoCandidates))
        );
    }
}
