// 🌍 Foreign Entity Classifier - Legal suffix → jurisdiction, rules as data
//
// "HERTZ HOLDINGS NETHERLANDS 2 B.V." → foreign, NETHERLANDS
// "HERTZ (U.K.) LIMITED"             → domestic
//
// Some suffix tokens are shared by several countries ("GMBH", "SA", "PTY LTD").
// Those rules list every jurisdiction; the first entry is the primary mapping
// and is always the one returned. Context is never used to disambiguate.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// SUFFIX TABLES
// ============================================================================

/// Domestic legal forms. A trailing match means "not foreign".
const DOMESTIC_SUFFIXES: &[&[&str]] = &[
    &["PUBLIC", "LIMITED", "COMPANY"],
    &["LIMITED", "LIABILITY", "PARTNERSHIP"],
    &["LIMITED", "PARTNERSHIP"],
    &["LIMITED"],
    &["LTD"],
    &["PLC"],
    &["LLP"],
    &["LP"],
    &["CIC"],
    &["CIO"],
];

/// (tokens, jurisdictions with primary first, may match in the interior)
const FOREIGN_SUFFIXES: &[(&[&str], &[&str], bool)] = &[
    // Europe
    (&["BV"], &["NETHERLANDS", "BELGIUM"], true),
    (&["NV"], &["NETHERLANDS", "BELGIUM", "CURACAO"], true),
    (&["GMBH"], &["GERMANY", "AUSTRIA", "SWITZERLAND"], true),
    (&["AG"], &["GERMANY", "SWITZERLAND", "AUSTRIA"], false),
    (&["KG"], &["GERMANY", "AUSTRIA"], false),
    (&["KGAA"], &["GERMANY"], true),
    (&["UG"], &["GERMANY"], false),
    (&["SE"], &["EUROPEAN UNION"], false),
    (&["SA"], &["FRANCE", "SPAIN", "BELGIUM", "LUXEMBOURG", "SWITZERLAND", "POLAND", "BRAZIL"], false),
    (&["SAS"], &["FRANCE"], false),
    (&["SARL"], &["FRANCE", "LUXEMBOURG"], true),
    (&["SA", "RL"], &["LUXEMBOURG", "FRANCE"], true),
    (&["SCA"], &["LUXEMBOURG"], false),
    (&["SICAV"], &["LUXEMBOURG"], true),
    (&["SPRL"], &["BELGIUM"], true),
    (&["SRL"], &["ITALY", "ROMANIA", "ARGENTINA"], true),
    (&["SPA"], &["ITALY", "CHILE"], false),
    (&["SL"], &["SPAIN"], false),
    (&["SLU"], &["SPAIN"], true),
    (&["LDA"], &["PORTUGAL"], true),
    (&["AB"], &["SWEDEN"], false),
    (&["AS"], &["NORWAY", "ESTONIA"], false),
    (&["ASA"], &["NORWAY"], true),
    (&["A/S"], &["DENMARK", "NORWAY"], true),
    (&["APS"], &["DENMARK"], true),
    (&["OY"], &["FINLAND"], false),
    (&["OYJ"], &["FINLAND"], true),
    (&["SP", "Z", "OO"], &["POLAND"], true),
    (&["SRO"], &["CZECH REPUBLIC", "SLOVAKIA"], true),
    (&["KFT"], &["HUNGARY"], true),
    (&["ZRT"], &["HUNGARY"], true),
    (&["DOO"], &["CROATIA", "SERBIA", "SLOVENIA"], true),
    (&["EOOD"], &["BULGARIA"], true),
    (&["UAB"], &["LITHUANIA"], true),
    (&["SIA"], &["LATVIA"], false),
    (&["OU"], &["ESTONIA"], false),
    (&["AE"], &["GREECE"], false),
    (&["OOO"], &["RUSSIA"], true),
    (&["DAC"], &["IRELAND"], true),
    (&["SAGL"], &["SWITZERLAND"], true),
    // Asia-Pacific
    (&["KK"], &["JAPAN"], true),
    (&["GK"], &["JAPAN"], false),
    (&["KABUSHIKI", "KAISHA"], &["JAPAN"], true),
    (&["PVT", "LTD"], &["INDIA"], true),
    (&["PRIVATE", "LIMITED"], &["INDIA"], false),
    (&["PTE", "LTD"], &["SINGAPORE"], true),
    (&["PTE", "LIMITED"], &["SINGAPORE"], true),
    (&["SDN", "BHD"], &["MALAYSIA"], true),
    (&["BHD"], &["MALAYSIA"], true),
    (&["BERHAD"], &["MALAYSIA"], true),
    (&["PTY", "LTD"], &["AUSTRALIA", "SOUTH AFRICA"], true),
    (&["PTY", "LIMITED"], &["AUSTRALIA", "SOUTH AFRICA"], true),
    (&["TBK"], &["INDONESIA"], true),
    (&["PT"], &["INDONESIA"], true),
    (&["CHUSIK", "HOESA"], &["SOUTH KOREA"], true),
    (&["YOUXIAN", "GONGSI"], &["CHINA"], true),
    // Americas
    (&["INC"], &["UNITED STATES", "CANADA"], false),
    (&["INCORPORATED"], &["UNITED STATES"], false),
    (&["LLC"], &["UNITED STATES"], true),
    (&["CORP"], &["UNITED STATES"], false),
    (&["CORPORATION"], &["UNITED STATES"], false),
    (&["ULC"], &["CANADA"], true),
    (&["LTEE"], &["CANADA"], true),
    (&["LTDA"], &["BRAZIL", "COLOMBIA", "CHILE"], true),
    (&["SA", "DE", "CV"], &["MEXICO"], true),
    (&["SAC"], &["PERU"], false),
    (&["SAU"], &["ARGENTINA", "SPAIN"], false),
];

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuffixRule {
    /// Normalised suffix tokens, e.g. ["PVT", "LTD"]
    pub tokens: Vec<String>,

    /// Jurisdictions using this suffix; the first is the primary mapping
    pub jurisdictions: Vec<String>,

    /// May also match away from the end of the name
    #[serde(default)]
    pub interior: bool,
}

impl SuffixRule {
    fn primary(&self) -> Option<&str> {
        self.jurisdictions.first().map(|j| j.as_str())
    }
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForeignClassification {
    pub is_foreign: bool,
    pub jurisdiction: Option<String>,

    /// The suffix that decided the outcome, space-joined
    pub matched_suffix: Option<String>,

    /// The matched suffix is registered for more than one jurisdiction
    pub ambiguous: bool,
}

impl ForeignClassification {
    fn domestic(suffix: Option<String>) -> Self {
        ForeignClassification {
            matched_suffix: suffix,
            ..Default::default()
        }
    }

    fn foreign(rule: &SuffixRule) -> Self {
        ForeignClassification {
            is_foreign: true,
            jurisdiction: rule.primary().map(|j| j.to_string()),
            matched_suffix: Some(rule.tokens.join(" ")),
            ambiguous: rule.jurisdictions.len() > 1,
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct ForeignEntityClassifier {
    domestic: Vec<Vec<String>>,
    foreign: Vec<SuffixRule>,
}

impl ForeignEntityClassifier {
    /// Classifier with the built-in suffix tables
    pub fn new() -> Self {
        let domestic = DOMESTIC_SUFFIXES
            .iter()
            .map(|phrase| phrase.iter().map(|t| t.to_string()).collect())
            .collect();

        let foreign = FOREIGN_SUFFIXES
            .iter()
            .map(|(tokens, jurisdictions, interior)| SuffixRule {
                tokens: tokens.iter().map(|t| t.to_string()).collect(),
                jurisdictions: jurisdictions.iter().map(|j| j.to_string()).collect(),
                interior: *interior,
            })
            .collect();

        ForeignEntityClassifier { domestic, foreign }
    }

    /// Built-in tables extended with rules loaded from a JSON file
    pub fn with_rules_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read suffix rules file: {:?}", path.as_ref()))?;

        let rules: Vec<SuffixRule> =
            serde_json::from_str(&content).context("Failed to parse suffix rules JSON")?;

        let mut classifier = ForeignEntityClassifier::new();
        for rule in rules {
            classifier.add_rule(rule);
        }
        Ok(classifier)
    }

    /// Add a foreign suffix rule. Tokens are normalised like names are.
    pub fn add_rule(&mut self, mut rule: SuffixRule) {
        rule.tokens = rule.tokens.iter().flat_map(|t| tokenize(t)).collect();
        rule.jurisdictions = rule
            .jurisdictions
            .iter()
            .map(|j| j.trim().to_uppercase())
            .collect();
        if !rule.tokens.is_empty() && !rule.jurisdictions.is_empty() {
            self.foreign.push(rule);
        }
    }

    pub fn rule_count(&self) -> usize {
        self.foreign.len()
    }

    /// Number of distinct primary jurisdictions covered
    pub fn jurisdiction_count(&self) -> usize {
        let mut primaries: Vec<&str> = self.foreign.iter().filter_map(|r| r.primary()).collect();
        primaries.sort_unstable();
        primaries.dedup();
        primaries.len()
    }

    /// Decide whether a name denotes a non-domestic entity
    pub fn classify(&self, name: &str) -> ForeignClassification {
        let tokens = tokenize(name);
        if tokens.is_empty() {
            return ForeignClassification::default();
        }

        // 1. Longest trailing suffix wins ("PVT LTD" beats "LTD")
        let trailing_domestic = self
            .domestic
            .iter()
            .filter(|phrase| phrase.len() < tokens.len() && ends_with(&tokens, phrase))
            .map(|phrase| phrase.len())
            .max();

        let trailing_foreign = self
            .foreign
            .iter()
            .filter(|rule| rule.tokens.len() < tokens.len() && ends_with(&tokens, &rule.tokens))
            .max_by_key(|rule| rule.tokens.len());

        match (trailing_domestic, trailing_foreign) {
            (Some(d), Some(f)) if f.tokens.len() > d => return ForeignClassification::foreign(f),
            (Some(d), _) => {
                let suffix = tokens[tokens.len() - d..].join(" ");
                return ForeignClassification::domestic(Some(suffix));
            }
            (None, Some(f)) => return ForeignClassification::foreign(f),
            (None, None) => {}
        }

        // 2. Interior occurrence ("PT BANK CENTRAL ASIA", "ACME GMBH & CO")
        let interior = self
            .foreign
            .iter()
            .filter(|rule| rule.interior && rule.tokens.len() < tokens.len())
            .filter(|rule| contains_phrase(&tokens, &rule.tokens))
            .max_by_key(|rule| rule.tokens.len());

        match interior {
            Some(rule) => ForeignClassification::foreign(rule),
            None => ForeignClassification::default(),
        }
    }
}

impl Default for ForeignEntityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify with the built-in tables
pub fn classify(name: &str) -> ForeignClassification {
    static DEFAULT: OnceLock<ForeignEntityClassifier> = OnceLock::new();
    DEFAULT.get_or_init(ForeignEntityClassifier::new).classify(name)
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Uppercase tokens; dots dropped ("B.V." → "BV"), slashes kept ("A/S")
fn tokenize(name: &str) -> Vec<String> {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| *c != '.')
        .map(|c| {
            if c.is_alphanumeric() || c == '/' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_uppercase()
        .split_whitespace()
        .map(|t| t.trim_matches('/').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn ends_with(tokens: &[String], phrase: &[String]) -> bool {
    tokens.len() >= phrase.len() && tokens[tokens.len() - phrase.len()..] == *phrase
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && tokens.windows(phrase.len()).any(|w| w == phrase)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dutch_bv_is_foreign() {
        let result = classify("HERTZ HOLDINGS NETHERLANDS 2 B.V.");
        assert!(result.is_foreign);
        assert_eq!(result.jurisdiction.as_deref(), Some("NETHERLANDS"));
        assert_eq!(result.matched_suffix.as_deref(), Some("BV"));
    }

    #[test]
    fn test_uk_limited_is_domestic() {
        let result = classify("HERTZ (U.K.) LIMITED");
        assert!(!result.is_foreign);
        assert_eq!(result.jurisdiction, None);
        assert_eq!(result.matched_suffix.as_deref(), Some("LIMITED"));
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        assert_eq!(classify("Acme Gmbh").jurisdiction.as_deref(), Some("GERMANY"));
        assert_eq!(classify("ACME S.A.").jurisdiction.as_deref(), Some("FRANCE"));
        assert_eq!(classify("Toyota K.K.").jurisdiction.as_deref(), Some("JAPAN"));
        assert_eq!(classify("Nordic Shipping A/S").jurisdiction.as_deref(), Some("DENMARK"));
        assert_eq!(classify("Fondo S.à r.l.").jurisdiction.as_deref(), Some("LUXEMBOURG"));
    }

    #[test]
    fn test_longest_trailing_suffix_wins() {
        let india = classify("Tata Consulting Pvt Ltd");
        assert!(india.is_foreign);
        assert_eq!(india.jurisdiction.as_deref(), Some("INDIA"));

        let singapore = classify("Lion City Pte. Ltd.");
        assert_eq!(singapore.jurisdiction.as_deref(), Some("SINGAPORE"));

        let uk = classify("Pennine Trading Ltd");
        assert!(!uk.is_foreign);
    }

    #[test]
    fn test_interior_suffix() {
        let result = classify("PT Bank Central Asia");
        assert!(result.is_foreign);
        assert_eq!(result.jurisdiction.as_deref(), Some("INDONESIA"));

        let result = classify("Muller GmbH & Co KG");
        assert_eq!(result.jurisdiction.as_deref(), Some("GERMANY"));
    }

    #[test]
    fn test_trailing_domestic_overrides_interior_token() {
        // "AS" and "SE" never match in the interior; "GMBH" does, but LIMITED ends the name
        assert!(!classify("Acting As Nominee Limited").is_foreign);
        assert!(!classify("GmbH Services Limited").is_foreign);
    }

    #[test]
    fn test_ambiguous_token_uses_primary_mapping() {
        let result = classify("Outback Mining Pty Ltd");
        assert!(result.is_foreign);
        assert_eq!(result.jurisdiction.as_deref(), Some("AUSTRALIA"));
        assert!(result.ambiguous);

        let result = classify("Alpen Werke GmbH");
        assert_eq!(result.jurisdiction.as_deref(), Some("GERMANY"));
        assert!(result.ambiguous);
    }

    #[test]
    fn test_no_suffix_is_not_foreign() {
        let result = classify("John Smith");
        assert_eq!(result, ForeignClassification::default());
        assert_eq!(classify(""), ForeignClassification::default());
    }

    #[test]
    fn test_bare_suffix_is_not_a_name() {
        assert!(!classify("B.V.").is_foreign);
    }

    #[test]
    fn test_covers_at_least_25_jurisdictions() {
        let classifier = ForeignEntityClassifier::new();
        assert!(classifier.jurisdiction_count() >= 25);
    }

    #[test]
    fn test_add_rule_normalises_tokens() {
        let mut classifier = ForeignEntityClassifier::new();
        let before = classifier.rule_count();

        classifier.add_rule(SuffixRule {
            tokens: vec!["S.A.L.".to_string()],
            jurisdictions: vec!["lebanon".to_string()],
            interior: false,
        });

        assert_eq!(classifier.rule_count(), before + 1);
        let result = classifier.classify("Cedar Trading S.A.L.");
        assert_eq!(result.jurisdiction.as_deref(), Some("LEBANON"));
    }
}
