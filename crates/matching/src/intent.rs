//! Intent classification
//!
//! Maps free text to one of a fixed set of coarse intents via ordered fuzzy
//! keyword-set checks. The evaluation order is deliberate: pricing is checked
//! before services because a message can plausibly match both keyword sets
//! ("how much for delivery") and the commercial question should win; help is
//! checked last as a catch-all before giving up, since escalation words often
//! co-occur with other topic words.

use serde::{Deserialize, Serialize};

use crate::fuzzy::{has_fuzzy_token, is_fuzzy_match};

/// Coarse topic tag for an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Hours,
    Pricing,
    Services,
    Location,
    Booking,
    Status,
    Inspection,
    Delivery,
    Payment,
    Help,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Hours => "hours",
            Self::Pricing => "pricing",
            Self::Services => "services",
            Self::Location => "location",
            Self::Booking => "booking",
            Self::Status => "status",
            Self::Inspection => "inspection",
            Self::Delivery => "delivery",
            Self::Payment => "payment",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct IntentCheck {
    intent: Intent,
    keywords: &'static [&'static str],
    threshold: f64,
}

/// Fixed evaluation order; the first check that matches wins
const CHECKS: &[IntentCheck] = &[
    IntentCheck {
        intent: Intent::Greeting,
        keywords: &[
            "hi",
            "hello",
            "hey",
            "good morning",
            "good afternoon",
            "good evening",
            "howdy",
        ],
        // Short, common words; higher bar to cut false positives
        threshold: 0.85,
    },
    IntentCheck {
        intent: Intent::Hours,
        keywords: &[
            "opening hours",
            "working hours",
            "hours",
            "what time do you open",
            "what time do you close",
            "are you open",
            "closing time",
        ],
        threshold: 0.80,
    },
    IntentCheck {
        intent: Intent::Pricing,
        keywords: &[
            "how much",
            "price",
            "prices",
            "pricing",
            "cost",
            "charge",
            "charges",
            "rates",
        ],
        threshold: 0.80,
    },
    IntentCheck {
        intent: Intent::Services,
        keywords: &[
            "what do you do",
            "what do you offer",
            "services",
            "service list",
            "menu",
            "catalogue",
        ],
        threshold: 0.80,
    },
    IntentCheck {
        intent: Intent::Location,
        keywords: &[
            "where are you",
            "location",
            "address",
            "directions",
            "how do i find you",
        ],
        threshold: 0.80,
    },
    IntentCheck {
        intent: Intent::Booking,
        keywords: &["book", "booking", "appointment", "schedule", "reserve"],
        threshold: 0.80,
    },
    IntentCheck {
        intent: Intent::Status,
        keywords: &[
            "status",
            "job status",
            "is my car ready",
            "any update",
            "progress",
            "how far",
        ],
        threshold: 0.80,
    },
    IntentCheck {
        intent: Intent::Inspection,
        keywords: &["inspection", "inspect", "check my car", "pre purchase", "diagnosis"],
        threshold: 0.80,
    },
    IntentCheck {
        intent: Intent::Delivery,
        keywords: &["delivery", "deliver", "pick up", "pickup", "drop off"],
        threshold: 0.80,
    },
    IntentCheck {
        intent: Intent::Payment,
        keywords: &[
            "payment",
            "pay",
            "transfer",
            "bank details",
            "account number",
            "invoice",
            "receipt",
        ],
        threshold: 0.80,
    },
    IntentCheck {
        intent: Intent::Help,
        keywords: &[
            "help",
            "agent",
            "human",
            "support",
            "speak to someone",
            "talk to a person",
            "complaint",
            "complain",
        ],
        threshold: 0.80,
    },
];

/// Classify a message; total over all inputs, defaulting to `Unknown`
pub fn detect_intent(message: &str) -> Intent {
    for check in CHECKS {
        let hit = check.keywords.iter().any(|keyword| {
            if keyword.contains(' ') {
                is_fuzzy_match(message, &[*keyword], check.threshold)
            } else {
                // Single words match token-wise so "hi" never fires inside "this"
                has_fuzzy_token(message, keyword, check.threshold)
            }
        });
        if hit {
            tracing::debug!(intent = %check.intent, "intent detected");
            return check.intent;
        }
    }
    Intent::Unknown
}
