//! The closed intent vocabulary and the deterministic rule grammar that
//! derives candidate intents from a request's text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed vocabulary per spec §4.5: additions require a registry update and
/// are a minor contract version bump, so this is a fixed enum rather than an
/// open string like [`kinlog_core::envelope::EventType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Write,
    Recall,
    Project,
    Schedule,
    HippoEncode,
}

impl Intent {
    /// Every intent maps to exactly one bus topic; ADMIT/BOOST publish here.
    pub fn topic(&self) -> &'static str {
        match self {
            Intent::Write => "episodic.write",
            Intent::Recall => "recall.request",
            Intent::Project => "prospective.project",
            Intent::Schedule => "prospective.schedule",
            Intent::HippoEncode => "hippo.encode",
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Intent::Write => "WRITE",
            Intent::Recall => "RECALL",
            Intent::Project => "PROJECT",
            Intent::Schedule => "SCHEDULE",
            Intent::HippoEncode => "HIPPO_ENCODE",
        }
    }

    /// Parse a declared intent string against the closed vocabulary. An
    /// optional classifier or a caller-declared intent MUST NOT introduce an
    /// intent outside this set (spec §4.5 step 2).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "WRITE" => Some(Intent::Write),
            "RECALL" => Some(Intent::Recall),
            "PROJECT" => Some(Intent::Project),
            "SCHEDULE" => Some(Intent::Schedule),
            "HIPPO_ENCODE" => Some(Intent::HippoEncode),
            _ => None,
        }
    }
}

/// One derived intent with its confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedIntent {
    pub intent: Intent,
    pub confidence: f64,
}

/// `HIPPO_ENCODE` at confidence `0.6`: the rule set is total, so this is
/// always produced when nothing more specific matches (spec §4.5 step 2).
pub const DEFAULT_INTENT_CONFIDENCE: f64 = 0.6;

struct Rule {
    pattern: &'static Lazy<Regex>,
    intent: Intent,
    confidence: f64,
}

static SCHEDULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(remind|remember to|don't forget|schedule|tomorrow|next week|at \d{1,2}(:\d{2})?\s*(am|pm)?)\b")
        .expect("static regex compiles")
});
static RECALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(what did|when did|do you remember|recall|find (the|my)|show me)\b")
        .expect("static regex compiles")
});
static PROJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(what if|plan for|prepare for|in the future|forecast|project(ing)?)\b")
        .expect("static regex compiles")
});
static WRITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(note:|list:|write down|save this|log this)\b").expect("static regex compiles")
});

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            pattern: &SCHEDULE_RE,
            intent: Intent::Schedule,
            confidence: 0.9,
        },
        Rule {
            pattern: &RECALL_RE,
            intent: Intent::Recall,
            confidence: 0.85,
        },
        Rule {
            pattern: &PROJECT_RE,
            intent: Intent::Project,
            confidence: 0.8,
        },
        Rule {
            pattern: &WRITE_RE,
            intent: Intent::Write,
            confidence: 0.8,
        },
    ]
});

/// Apply the deterministic rule grammar to `text`, returning every matching
/// rule's candidate plus the default `HIPPO_ENCODE` fallback when nothing
/// matches. Rules are total, so this never returns an empty vector.
pub fn derive_intents(text: &str) -> Vec<DerivedIntent> {
    let mut hits: Vec<DerivedIntent> = RULES
        .iter()
        .filter(|r| r.pattern.is_match(text))
        .map(|r| DerivedIntent {
            intent: r.intent,
            confidence: r.confidence,
        })
        .collect();

    if hits.is_empty() {
        hits.push(DerivedIntent {
            intent: Intent::HippoEncode,
            confidence: DEFAULT_INTENT_CONFIDENCE,
        });
    }
    hits
}

/// Resolve a request's intents: a caller-declared intent (checked against
/// the closed vocabulary) takes priority over the rule grammar, mirroring
/// spec §4.5's "an optional classifier may raise confidence but MUST NOT
/// introduce new intents not in the closed intent vocabulary."
pub fn resolve_intents(declared: Option<&str>, text: &str) -> Vec<DerivedIntent> {
    match declared.and_then(Intent::parse) {
        Some(intent) => vec![DerivedIntent {
            intent,
            confidence: 1.0,
        }],
        None => derive_intents(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_text_falls_back_to_hippo_encode() {
        let intents = derive_intents("Grocery list: apples, milk");
        assert!(intents
            .iter()
            .any(|i| i.intent == Intent::HippoEncode && i.confidence == DEFAULT_INTENT_CONFIDENCE));
    }

    #[test]
    fn schedule_keyword_is_detected() {
        let intents = derive_intents("remind me to call the dentist tomorrow");
        assert!(intents.iter().any(|i| i.intent == Intent::Schedule));
    }

    #[test]
    fn recall_keyword_is_detected() {
        let intents = derive_intents("what did we decide about the vacation?");
        assert!(intents.iter().any(|i| i.intent == Intent::Recall));
    }

    #[test]
    fn declared_intent_outside_vocabulary_is_rejected_in_favor_of_rules() {
        let intents = resolve_intents(Some("DESTROY_EVERYTHING"), "note: buy milk");
        assert!(intents.iter().any(|i| i.intent == Intent::Write));
    }

    #[test]
    fn declared_intent_in_vocabulary_is_honored_at_full_confidence() {
        let intents = resolve_intents(Some("RECALL"), "irrelevant text");
        assert_eq!(intents, vec![DerivedIntent { intent: Intent::Recall, confidence: 1.0 }]);
    }
}
