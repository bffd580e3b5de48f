//! Fuzzy phrase matching primitive
//!
//! Compares an inbound message against candidate phrases with a similarity
//! metric bounded to [0, 1] (normalized Levenshtein via `strsim`). Literal
//! substring containment matches regardless of threshold, since short
//! business keywords are usually embedded in longer sentences.

/// Lowercase, strip punctuation, collapse whitespace
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// True when any candidate is contained in the text or clears the threshold
///
/// Deterministic and monotone in `threshold`: raising the threshold never
/// turns a non-match into a match. Empty text or an empty candidate list
/// never match; a threshold of 1.0 requires containment or exact equality.
pub fn is_fuzzy_match<S: AsRef<str>>(text: &str, candidates: &[S], threshold: f64) -> bool {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return false;
    }

    for candidate in candidates {
        let cand = normalize(candidate.as_ref());
        if cand.is_empty() {
            continue;
        }
        if normalized.contains(&cand) {
            return true;
        }
        if strsim::normalized_levenshtein(&normalized, &cand) >= threshold {
            return true;
        }
    }
    false
}

/// Highest similarity between the text and any candidate, containment scoring 1.0
pub fn best_similarity<S: AsRef<str>>(text: &str, candidates: &[S]) -> f64 {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return 0.0;
    }

    let mut best: f64 = 0.0;
    for candidate in candidates {
        let cand = normalize(candidate.as_ref());
        if cand.is_empty() {
            continue;
        }
        if normalized.contains(&cand) {
            return 1.0;
        }
        best = best.max(strsim::normalized_levenshtein(&normalized, &cand));
    }
    best
}

/// Token-wise fuzzy membership: does any single word of the text match the
/// keyword at the threshold? Used for short keywords where whole-message
/// containment would over-match ("hi" inside "this").
pub(crate) fn has_fuzzy_token(text: &str, keyword: &str, threshold: f64) -> bool {
    let keyword = normalize(keyword);
    if keyword.is_empty() {
        return false;
    }
    normalize(text)
        .split(' ')
        .any(|token| token == keyword || strsim::normalized_levenshtein(token, &keyword) >= threshold)
}
