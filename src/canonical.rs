// 🔤 Name Canonicalizer - One comparison key for every consumer
//
// "HERTZ (U.K.) LIMITED", "Hertz (UK) Ltd" and "hertz u.k. ltd" → "hertz uk"
//
// Deduplication, registry matching and the display variant all go through
// `canonical_name`. There is no second normalizer.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// LEGAL FORM
// ============================================================================

/// Standardised legal form recovered from a stripped suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegalForm {
    Limited,
    PublicLimited,
    LimitedLiabilityPartnership,
    LimitedPartnership,
    LimitedLiabilityCompany,
    Incorporated,
    Corporation,
    Company,
}

impl LegalForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalForm::Limited => "LIMITED",
            LegalForm::PublicLimited => "PLC",
            LegalForm::LimitedLiabilityPartnership => "LLP",
            LegalForm::LimitedPartnership => "LP",
            LegalForm::LimitedLiabilityCompany => "LLC",
            LegalForm::Incorporated => "INC",
            LegalForm::Corporation => "CORPORATION",
            LegalForm::Company => "COMPANY",
        }
    }
}

/// Trailing suffix phrases, longest first. `None` = stripped without a legal form.
const LEGAL_SUFFIXES: &[(&[&str], Option<LegalForm>)] = &[
    (&["public", "limited", "company"], Some(LegalForm::PublicLimited)),
    (&["limited", "liability", "partnership"], Some(LegalForm::LimitedLiabilityPartnership)),
    (&["limited", "liability", "company"], Some(LegalForm::LimitedLiabilityCompany)),
    (&["limited", "partnership"], Some(LegalForm::LimitedPartnership)),
    (&["limited"], Some(LegalForm::Limited)),
    (&["ltd"], Some(LegalForm::Limited)),
    (&["plc"], Some(LegalForm::PublicLimited)),
    (&["llp"], Some(LegalForm::LimitedLiabilityPartnership)),
    (&["lp"], Some(LegalForm::LimitedPartnership)),
    (&["llc"], Some(LegalForm::LimitedLiabilityCompany)),
    (&["incorporated"], Some(LegalForm::Incorporated)),
    (&["inc"], Some(LegalForm::Incorporated)),
    (&["corporation"], Some(LegalForm::Corporation)),
    (&["corp"], Some(LegalForm::Corporation)),
    (&["company"], Some(LegalForm::Company)),
    (&["co"], Some(LegalForm::Company)),
    (&["holdings"], None),
    (&["holding"], None),
];

/// Words that mark a name as an organisation even without a legal suffix
const CORPORATE_INDICATORS: &[&str] = &[
    "holdings", "holding", "group", "trust", "trustees", "partnership", "partners",
    "investments", "investment", "capital", "ventures", "fund", "estate",
    "foundation", "charity", "nominees", "bank", "cic", "cio",
];

// ============================================================================
// CANONICAL NAME
// ============================================================================

/// Result of canonicalizing a raw name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalName {
    /// Comparison key used for dedup and matching
    pub key: String,

    /// Outermost legal form that was stripped, if any
    pub legal_form: Option<LegalForm>,
}

impl CanonicalName {
    /// Cosmetic display variant derived from the key
    ///
    /// Example: "Enterprise Ltd" → "ENTERPRISE LIMITED"
    pub fn display(&self) -> String {
        let base = self.key.to_uppercase();
        match self.legal_form {
            Some(form) if !base.is_empty() => format!("{} {}", base, form.as_str()),
            _ => base,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

/// Canonicalize a raw name into its comparison key
///
/// Example: "HERTZ (U.K.) LIMITED" → "hertz uk"
pub fn canonicalize(name: &str) -> String {
    canonical_name(name).key
}

/// Canonicalize a raw name, keeping the stripped legal form for display
pub fn canonical_name(name: &str) -> CanonicalName {
    let mut tokens = name_tokens(name);
    let mut legal_form = None;

    'strip: while tokens.len() > 1 {
        for (phrase, form) in LEGAL_SUFFIXES {
            if phrase.len() < tokens.len() && ends_with_phrase(&tokens, phrase) {
                tokens.truncate(tokens.len() - phrase.len());
                if legal_form.is_none() {
                    legal_form = *form;
                }
                continue 'strip;
            }
        }
        break;
    }

    CanonicalName {
        key: tokens.join(" "),
        legal_form,
    }
}

/// Comparison tokens before suffix stripping: ["hertz", "uk", "limited"]
pub fn name_tokens(name: &str) -> Vec<String> {
    collapse_single_letters(tokenize(name))
}

/// Does the name look like an organisation rather than a natural person?
pub fn is_corporate_name(name: &str) -> bool {
    let tokens = name_tokens(name);

    let has_suffix = LEGAL_SUFFIXES
        .iter()
        .any(|(phrase, _)| phrase.len() <= tokens.len() && ends_with_phrase(&tokens, phrase));

    has_suffix
        || tokens
            .iter()
            .any(|t| CORPORATE_INDICATORS.contains(&t.as_str()))
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Lowercased, accent-free, punctuation-free tokens
fn tokenize(name: &str) -> Vec<String> {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .replace('&', " and ");

    folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

/// Join runs of single letters: ["hertz", "u", "k"] → ["hertz", "uk"]
fn collapse_single_letters(tokens: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut run = String::new();

    for token in tokens {
        let single_letter = token.chars().count() == 1
            && token.chars().all(|c| c.is_alphabetic());
        if single_letter {
            run.push_str(&token);
            continue;
        }
        if !run.is_empty() {
            out.push(std::mem::take(&mut run));
        }
        out.push(token);
    }
    if !run.is_empty() {
        out.push(run);
    }

    out
}

fn ends_with_phrase(tokens: &[String], phrase: &[&str]) -> bool {
    tokens.len() >= phrase.len()
        && tokens[tokens.len() - phrase.len()..]
            .iter()
            .zip(phrase.iter())
            .all(|(t, p)| t == p)
}

// ============================================================================
// TESTS
// ============================================================================
