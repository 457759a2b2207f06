//! Subscription options, backoff schedule, and the handle returned from
//! `EventBusCore::subscribe`.

use std::collections::HashSet;

use kinlog_core::envelope::Band;
use kinlog_core::filter::FilterExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    Full,
    None,
}

/// Retry backoff: `delay_i = min(base_ms * mult^i, max_ms)`, then either
/// `uniform(0, delay_i)` (full jitter) or `delay_i` exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base_ms: u64,
    pub mult: f64,
    pub max_ms: u64,
    pub jitter: Jitter,
}

impl Backoff {
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let raw = (self.base_ms as f64) * self.mult.powi(attempt as i32);
        raw.min(self.max_ms as f64) as u64
    }

    /// Draw the actual sleep duration for the i-th retry, applying jitter.
    pub fn sleep_ms(&self, attempt: u32, rng: &mut impl rand::Rng) -> u64 {
        let delay = self.delay_ms(attempt);
        match self.jitter {
            Jitter::Full if delay > 0 => rng.gen_range(0..=delay),
            _ => delay,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_ms: 100,
            mult: 2.0,
            max_ms: 30_000,
            jitter: Jitter::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    Earliest,
    Latest,
    Offset(u64),
}

#[derive(Debug, Clone)]
pub struct SubscriptionOptions {
    pub workers: usize,
    pub max_inflight: usize,
    pub backoff: Backoff,
    pub max_retries: u32,
    pub ack_deadline_ms: Option<u64>,
    pub filters: Vec<FilterExpr>,
    pub start: StartPosition,
    /// Bands this subscription is authorized to receive. Checked by the
    /// authorization middleware before any handler observes the event, per
    /// the required "deny before any handler sees it" ordering.
    pub allowed_bands: HashSet<Band>,
    /// Obligation namespaces this subscription is authorized to receive.
    /// Empty means unrestricted: an event's obligations are never checked
    /// against this set unless it's non-empty.
    pub allowed_obligations: HashSet<String>,
}

/// Every band, for a subscription with no band-based restriction.
fn all_bands() -> HashSet<Band> {
    [Band::Green, Band::Amber, Band::Red, Band::Black].into_iter().collect()
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            max_inflight: 64,
            backoff: Backoff::default(),
            max_retries: 5,
            ack_deadline_ms: Some(30_000),
            filters: Vec::new(),
            start: StartPosition::Latest,
            allowed_bands: all_bands(),
            allowed_obligations: HashSet::new(),
        }
    }
}

impl SubscriptionOptions {
    pub fn matches(&self, doc: &serde_json::Value) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }
}

/// A live subscription's identity and drain handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub topic: String,
    pub group: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_max_ms() {
        let b = Backoff {
            base_ms: 100,
            mult: 2.0,
            max_ms: 500,
            jitter: Jitter::None,
        };
        assert_eq!(b.delay_ms(0), 100);
        assert_eq!(b.delay_ms(1), 200);
        assert_eq!(b.delay_ms(2), 400);
        assert_eq!(b.delay_ms(10), 500);
    }

    #[test]
    fn full_jitter_never_exceeds_the_uncapped_delay() {
        let b = Backoff {
            base_ms: 100,
            mult: 2.0,
            max_ms: 10_000,
            jitter: Jitter::Full,
        };
        let mut rng = rand::thread_rng();
        for attempt in 0..5 {
            let sleep = b.sleep_ms(attempt, &mut rng);
            assert!(sleep <= b.delay_ms(attempt));
        }
    }

    #[test]
    fn empty_filter_list_matches_everything() {
        let opts = SubscriptionOptions::default();
        assert!(opts.matches(&serde_json::json!({"anything": true})));
    }
}
