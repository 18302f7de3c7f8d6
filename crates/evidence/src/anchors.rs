//! Token-family tables for anchor extraction and claim checking.
//!
//! Both the snippet selector and the claim-check guardrail work off
//! significant tokens pulled from free text. The pattern families live here
//! as ordered data tables of named rules so they can be unit-tested and
//! extended without touching the control flow that consumes them.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Anchor extraction stops after this many distinct tokens.
pub const MAX_ANCHOR_TOKENS: usize = 24;

/// A named token pattern family.
pub struct TokenRule {
    /// Family name, for diagnostics and tests
    pub name: &'static str,

    /// Compiled pattern
    pub pattern: Regex,
}

impl TokenRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid token pattern"),
        }
    }
}

/// Families used to pull anchor tokens out of a question.
static QUESTION_RULES: LazyLock<Vec<TokenRule>> = LazyLock::new(|| {
    vec![
        TokenRule::new("protocol-version", r"(?i)\b(?:tls|ssl)\s?v?\d+(?:\.\d+)*\+?"),
        TokenRule::new("acronym", r"\b[A-Z]{2,}(?:-[A-Za-z0-9]+)?\b"),
        TokenRule::new("camel-case", r"\b[a-z]+(?:[A-Z][a-z0-9]*)+\b"),
        TokenRule::new("dotted-version", r"\b\d+\.\d+(?:\.\d+)*\b"),
        TokenRule::new("word", r"\b[A-Za-z0-9][A-Za-z0-9-]{3,}\b"),
    ]
});

/// Families used to pull key tokens out of a draft answer.
///
/// Broader than the question families: generic words down to five characters
/// count, and versioned protocol names are not limited to TLS/SSL.
static GUARDRAIL_RULES: LazyLock<Vec<TokenRule>> = LazyLock::new(|| {
    vec![
        TokenRule::new("versioned-protocol", r"\b[A-Z]{2,}\s?v?\d+(?:\.\d+)*\+?"),
        TokenRule::new("hyphenated", r"\b[A-Za-z0-9]+(?:-[A-Za-z0-9]+)+\b"),
        TokenRule::new("camel-case", r"\b[a-z]+(?:[A-Z][a-z0-9]*)+\b"),
        TokenRule::new("acronym", r"\b[A-Z]{2,}(?:-[A-Za-z0-9]+)?\b"),
        TokenRule::new("dotted-version", r"\b\d+\.\d+(?:\.\d+)*\b"),
        TokenRule::new("word", r"\b[A-Za-z]{5,}\b"),
    ]
});

/// Generic and question-framing words excluded from anchors.
const QUESTION_STOPWORD_LIST: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "answer", "applicable", "appropriate",
    "around", "based", "been", "before", "being", "below", "between", "both", "company", "could",
    "currently", "describe", "described", "describes", "detail", "details", "does", "doing",
    "during", "each", "either", "ensure", "evidence", "explain", "following", "from", "further",
    "have", "having", "include", "included", "includes", "into", "organisation", "organization",
    "other", "over", "please", "provide", "provided", "provides", "question", "regarding",
    "relevant", "should", "some", "specify", "such", "support", "supported", "than", "that",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "under",
    "until", "upon", "what", "when", "where", "whether", "which", "while", "will", "with",
    "within", "would", "your", "yours",
];

/// Hedging and meta words excluded from claim checking.
///
/// Deliberately smaller than the question set: these are words a generator
/// uses about its own answer, not claims that need evidence.
const GUARDRAIL_STOPWORD_LIST: &[&str] = &[
    "about", "according", "appears", "available", "based", "could", "document", "documents",
    "generally", "information", "likely", "maybe", "might", "perhaps", "provided", "seems",
    "should", "specified", "typically", "usually", "would",
];

static QUESTION_STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| QUESTION_STOPWORD_LIST.iter().copied().collect());

static GUARDRAIL_STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| GUARDRAIL_STOPWORD_LIST.iter().copied().collect());

/// The question token families, in match order.
pub fn question_rules() -> &'static [TokenRule] {
    &QUESTION_RULES
}

/// The guardrail token families, in match order.
pub fn guardrail_rules() -> &'static [TokenRule] {
    &GUARDRAIL_RULES
}

/// Lowercase a string and collapse whitespace runs to single spaces.
pub fn normalize_for_match(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract anchor tokens from a question.
///
/// Returns the first [`MAX_ANCHOR_TOKENS`] distinct normalized tokens in
/// family order, with question-framing stopwords removed.
pub fn anchor_tokens(question: &str) -> Vec<String> {
    let mut tokens = extract_tokens(question, &QUESTION_RULES, &QUESTION_STOPWORDS);
    tokens.truncate(MAX_ANCHOR_TOKENS);
    tokens
}

/// Extract key tokens from a draft answer for claim checking.
pub fn key_tokens(answer: &str) -> Vec<String> {
    extract_tokens(answer, &GUARDRAIL_RULES, &GUARDRAIL_STOPWORDS)
}

fn extract_tokens(
    text: &str,
    rules: &[TokenRule],
    stopwords: &HashSet<&'static str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for rule in rules {
        for m in rule.pattern.find_iter(text) {
            let token = normalize_for_match(m.as_str());
            if token.is_empty() || stopwords.contains(token.as_str()) {
                continue;
            }
            if seen.insert(token.clone()) {
                tokens.push(token);
            }
        }
    }

    tokens
}
