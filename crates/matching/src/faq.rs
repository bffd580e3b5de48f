//! FAQ scoring
//!
//! Scores an inbound message against a business's configured FAQ entries and
//! returns the best match above a confidence floor. The scoring function is
//! intentionally simple so its behavior stays auditable and tunable per
//! business through data (keywords and priority) rather than code.

use chatdesk_core::FaqEntry;
use std::collections::BTreeSet;

/// Minimum score an entry needs to be returned at all
const SCORE_FLOOR: f64 = 0.40;

/// Bonus for a specific (long) vocabulary term actually present in the message
const SPECIFICITY_BONUS: f64 = 0.10;

/// Vocabulary terms longer than this earn the specificity bonus
const SPECIFIC_TERM_LEN: usize = 4;

/// Best-matching FAQ answer with its confidence (0-100)
#[derive(Debug, Clone, PartialEq)]
pub struct FaqMatch {
    pub answer: String,
    pub confidence: u8,
}

/// Tokenize a message: strip punctuation, split on whitespace, drop short tokens
fn tokenize(text: &str) -> Vec<String> {
    crate::fuzzy::normalize(text)
        .split(' ')
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

/// Match vocabulary of an entry: question tokens plus explicit keywords
fn vocabulary(entry: &FaqEntry) -> BTreeSet<String> {
    let mut vocab: BTreeSet<String> = tokenize(&entry.question).into_iter().collect();
    vocab.extend(entry.keywords.iter().map(|k| k.to_lowercase()));
    vocab
}

fn score_entry(entry: &FaqEntry, message_lower: &str, message_tokens: &[String]) -> f64 {
    let vocab = vocabulary(entry);
    if vocab.is_empty() {
        return 0.0;
    }

    let mut matched = 0usize;
    let mut longest_contained = 0usize;
    for term in &vocab {
        let exact_token = message_tokens.iter().any(|t| t == term);
        let contained = message_lower.contains(term.as_str());
        if exact_token || contained {
            matched += 1;
        }
        if contained {
            longest_contained = longest_contained.max(term.len());
        }
    }

    let mut score = matched as f64 / vocab.len() as f64;
    if longest_contained > SPECIFIC_TERM_LEN {
        score += SPECIFICITY_BONUS;
    }
    score.min(1.0)
}

/// Find the best FAQ answer for a message
///
/// Entries are expected in priority order; iteration order only decides ties
/// (first seen wins), the maximum-scoring entry always wins otherwise.
/// Returns `None` when nothing reaches the score floor.
pub fn find_match(message: &str, faqs: &[FaqEntry]) -> Option<FaqMatch> {
    let message_lower = message.to_lowercase();
    let message_tokens = tokenize(message);

    let mut best: Option<(f64, &FaqEntry)> = None;
    for entry in faqs.iter().filter(|e| e.active) {
        let score = score_entry(entry, &message_lower, &message_tokens);
        match best {
            Some((best_score, _)) if score <= best_score => {}
            _ if score > 0.0 => best = Some((score, entry)),
            _ => {}
        }
    }

    let (score, entry) = best?;
    if score < SCORE_FLOOR {
        return None;
    }

    tracing::debug!(question = %entry.question, score, "FAQ match");

    Some(FaqMatch {
        answer: entry.answer.clone(),
        confidence: (score * 100.0).round() as u8,
    })
}
