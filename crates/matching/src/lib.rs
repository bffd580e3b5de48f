//! Deterministic lexical matching
//!
//! Every higher layer of the engine resolves free text through this crate:
//! - `fuzzy` — edit-distance-tolerant phrase matching primitive
//! - `faq` — scores a message against a business's configured FAQ entries
//! - `intent` — maps free text to a closed set of coarse intents
//!
//! Matching is lexical and explainable by design: no randomness, no external
//! calls, identical inputs always produce identical results.

pub mod faq;
pub mod fuzzy;
pub mod intent;

pub use faq::{find_match, FaqMatch};
pub use fuzzy::{best_similarity, is_fuzzy_match, normalize};
pub use intent::{detect_intent, Intent};
