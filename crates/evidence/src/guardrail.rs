//! Lexical claim-check guardrail.
//!
//! Verifies a draft answer against the quoted snippets it cites. Any key
//! token of the answer that does not appear verbatim in the evidence voids
//! the entire answer: one unverifiable claim rewrites the draft to the
//! sentinel rather than partially editing it. The guardrail never fails;
//! it only degrades answers toward the safe side.

use crate::anchors::{key_tokens, normalize_for_match};
use crate::types::SENTINEL_ANSWER;
use attest_llm::Confidence;

/// Result of a claim-check pass.
#[derive(Debug, Clone)]
pub struct GuardrailOutcome {
    pub answer: String,
    pub confidence: Confidence,
    pub needs_review: bool,

    /// Answer tokens that were not found in the cited evidence
    pub unsupported_tokens: Vec<String>,
}

/// Lexically verify a draft answer against its quoted snippets.
///
/// Checks run in a fixed order: sentinel passthrough first, unsupported
/// tokens second, and the inconsistent high-confidence-but-flagged
/// downgrade last.
pub fn apply_claim_check(
    answer: &str,
    quoted_snippets: &[String],
    confidence: Confidence,
    needs_review: bool,
) -> GuardrailOutcome {
    // An answer that already concedes "not specified" carries no claims.
    if answer.contains(SENTINEL_ANSWER) {
        return GuardrailOutcome {
            answer: answer.to_string(),
            confidence: Confidence::Low,
            needs_review: true,
            unsupported_tokens: Vec::new(),
        };
    }

    let haystack = normalize_for_match(&quoted_snippets.join("\n"));
    let unsupported: Vec<String> = key_tokens(answer)
        .into_iter()
        .filter(|token| !haystack.contains(token.as_str()))
        .collect();

    if !unsupported.is_empty() {
        tracing::info!(
            "Claim check rejected answer: {} unsupported token(s): {:?}",
            unsupported.len(),
            unsupported
        );
        return GuardrailOutcome {
            answer: SENTINEL_ANSWER.to_string(),
            confidence: Confidence::Low,
            needs_review: true,
            unsupported_tokens: unsupported,
        };
    }

    // A generator claiming high confidence while flagging itself for review
    // is inconsistent; never surface that state as-is.
    if needs_review && confidence == Confidence::High {
        return GuardrailOutcome {
            answer: answer.to_string(),
            confidence: Confidence::Med,
            needs_review: true,
            unsupported_tokens: Vec::new(),
        };
    }

    GuardrailOutcome {
        answer: answer.to_string(),
        confidence,
        needs_review,
        unsupported_tokens: Vec::new(),
    }
}
