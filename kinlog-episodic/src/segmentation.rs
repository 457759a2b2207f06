//! Segmentation Engine: per-event boundary scoring and segment lifecycle,
//! spec §4.8. Deterministic given the same event stream and configuration —
//! no wall-clock dependence beyond each event's stored `ts`.

use std::collections::{HashSet, VecDeque};

use kinlog_core::config::SegmentationConfig;
use kinlog_core::ids::{EntityIdType, EpisodeId, SpaceId};

use crate::rows::{Affect, SegmentRow};

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Tokenized content used for the `S_t` fallback similarity measure when no
/// embedder collaborator is wired in (spec §4.8: "or a fallback token-set
/// Jaccard distance if embeddings are unavailable"). `kinlog-episodic` never
/// calls an embedder itself — that's an external collaborator per spec
/// §6.4 — so the fallback is the only path implemented here.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn jaccard_distance(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        1.0 - intersection / union
    }
}

struct WindowEntry {
    tokens: HashSet<String>,
}

struct OpenSegmentStats {
    episode_id: EpisodeId,
    start_ts: i64,
    last_ts: i64,
    ord_next: u64,
    max_event_sal: f64,
    affect_peak: f64,
    affect_at_start: Affect,
    last_affect: Affect,
    events_since_cut: u64,
    redundancy_sum: f64,
    redundancy_count: u64,
    last_tokens: Option<HashSet<String>>,
    /// Why this segment was opened (the boundary that cut its predecessor,
    /// or `first_event_in_space`), not why it eventually closes.
    open_reason: Vec<String>,
}

/// Per-space rolling state the engine needs across calls: the content
/// window (bounded to `window`), the previous event's affect/goal label for
/// the `A_t`/`H_t` terms, and the currently open segment's running stats.
pub struct SpaceState {
    space_id: SpaceId,
    window: VecDeque<WindowEntry>,
    prev_ts: Option<i64>,
    prev_affect: Affect,
    prev_goal_label: Option<String>,
    open: Option<OpenSegmentStats>,
}

impl SpaceState {
    pub fn new(space_id: SpaceId) -> Self {
        Self {
            space_id,
            window: VecDeque::new(),
            prev_ts: None,
            prev_affect: Affect::neutral(),
            prev_goal_label: None,
            open: None,
        }
    }
}

/// What happened when an event was folded into the segmentation state: the
/// segment it landed in, its position within that segment, whether a
/// boundary was cut (and why), and the segment row that was just closed, if
/// any.
pub struct SegmentationOutcome {
    pub episode_id: EpisodeId,
    pub ord: u64,
    pub boundary_cut: bool,
    pub boundary_reasons: Vec<String>,
    pub closed_segment: Option<SegmentRow>,
}

/// One event's inputs to the boundary score, everything the engine doesn't
/// already keep in `SpaceState`.
pub struct EventSignal<'a> {
    pub ts: i64,
    pub content: &'a str,
    pub affect: Affect,
    pub goal_label: Option<&'a str>,
    pub salience: f64,
}

/// `sal = 0.5*max_event_sal + 0.2*density + 0.2*affect_peak - 0.1*redundancy`,
/// density normalized against a 10 events/minute reference so a single
/// rapid-fire burst doesn't blow the term past 1.0.
fn segment_salience(open: &OpenSegmentStats) -> f64 {
    let duration_minutes = ((open.last_ts - open.start_ts).max(1) as f64) / 60_000.0;
    let density = open.events_since_cut as f64 / duration_minutes.max(1.0 / 60.0);
    let redundancy = if open.redundancy_count > 0 {
        (open.redundancy_sum / open.redundancy_count as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (0.5 * open.max_event_sal + 0.2 * (density / 10.0).min(1.0) + 0.2 * open.affect_peak - 0.1 * redundancy)
        .clamp(0.0, 1.0)
}

pub struct SegmentationEngine {
    config: SegmentationConfig,
}

impl SegmentationEngine {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    /// Fold one event into `state`, returning the segmentation outcome.
    /// Never touches the wall clock: every time-dependent term derives from
    /// `signal.ts` and the state already accumulated.
    pub fn ingest(&self, state: &mut SpaceState, signal: &EventSignal<'_>) -> SegmentationOutcome {
        let tokens = tokenize(signal.content);

        let (boundary_cut, reasons) = match state.prev_ts {
            None => (true, vec!["first_event_in_space".to_string()]),
            Some(prev_ts) => {
                let delta_t_ms = (signal.ts - prev_ts).max(0);
                self.score_boundary(state, delta_t_ms, &tokens, signal)
            }
        };

        let closed_segment = if boundary_cut {
            self.close_open_segment(state, signal.ts)
        } else {
            None
        };

        if state.open.is_none() {
            state.open = Some(OpenSegmentStats {
                episode_id: EpisodeId::now_v7(),
                start_ts: signal.ts,
                last_ts: signal.ts,
                ord_next: 0,
                max_event_sal: 0.0,
                affect_peak: 0.0,
                affect_at_start: signal.affect,
                last_affect: signal.affect,
                events_since_cut: 0,
                redundancy_sum: 0.0,
                redundancy_count: 0,
                last_tokens: None,
                open_reason: reasons.clone(),
            });
        }

        let open = state.open.as_mut().expect("just ensured Some");
        let ord = open.ord_next;
        open.ord_next += 1;
        open.last_ts = signal.ts;
        open.max_event_sal = open.max_event_sal.max(signal.salience);
        open.affect_peak = open.affect_peak.max(signal.affect.arousal);
        open.last_affect = signal.affect;
        open.events_since_cut += 1;
        if let Some(prev_tokens) = &open.last_tokens {
            open.redundancy_sum += 1.0 - jaccard_distance(prev_tokens, &tokens);
            open.redundancy_count += 1;
        }
        open.last_tokens = Some(tokens.clone());
        let episode_id = open.episode_id;

        state.window.push_back(WindowEntry { tokens });
        while state.window.len() > self.config.window {
            state.window.pop_front();
        }
        state.prev_ts = Some(signal.ts);
        state.prev_affect = signal.affect;
        state.prev_goal_label = signal.goal_label.map(str::to_string);

        SegmentationOutcome {
            episode_id,
            ord,
            boundary_cut,
            boundary_reasons: reasons,
            closed_segment,
        }
    }

    /// Force-close the currently open segment even without a boundary cut
    /// (`segment_flush`, spec §4.7). `boundary_reason` on the closed row
    /// still reflects why it was opened, not the flush itself.
    pub fn flush(&self, state: &mut SpaceState, now_ts: i64) -> Option<SegmentRow> {
        self.close_open_segment(state, now_ts)
    }

    /// A snapshot of the currently open segment (if any), `end_ts: None`,
    /// computed the same way a close would but without consuming the state.
    /// Lets the store keep an up-to-date row for an in-progress segment
    /// instead of only persisting one once it closes.
    pub fn open_snapshot(&self, state: &SpaceState) -> Option<SegmentRow> {
        let open = state.open.as_ref()?;
        let salience = segment_salience(open);
        Some(SegmentRow {
            space_id: state.space_id,
            episode_id: open.episode_id,
            start_ts: open.start_ts,
            end_ts: None,
            topic_hint: None,
            salience,
            affect_span: (open.affect_at_start, open.last_affect),
            boundary_reason: open.open_reason.clone(),
            event_count: open.events_since_cut,
        })
    }

    fn score_boundary(
        &self,
        state: &SpaceState,
        delta_t_ms: i64,
        tokens: &HashSet<String>,
        signal: &EventSignal<'_>,
    ) -> (bool, Vec<String>) {
        if delta_t_ms >= self.config.hard_cut_ms {
            return (true, vec!["hard_cut_time_gap".to_string()]);
        }

        let g_t = sigmoid(((delta_t_ms.max(1) as f64) / (self.config.tau_t_ms.max(1) as f64)).ln());

        let mean_window: HashSet<String> = state
            .window
            .iter()
            .flat_map(|e| e.tokens.iter().cloned())
            .collect();
        let s_t = jaccard_distance(tokens, &mean_window);

        let a_t = signal.affect.distance(&state.prev_affect);

        let h_t = if signal.goal_label.map(str::to_string) != state.prev_goal_label {
            1.0
        } else {
            0.0
        };

        let events_since_cut = state.open.as_ref().map(|o| o.events_since_cut).unwrap_or(0);
        let micro_session = (events_since_cut as f64 / self.config.window.max(1) as f64).min(1.0);

        let b_t = sigmoid(
            self.config.alpha * g_t + self.config.beta * s_t + self.config.gamma * a_t + self.config.delta * h_t
                - self.config.eta * micro_session,
        );

        if b_t >= self.config.soft_cut_threshold {
            (true, vec!["soft_cut_boundary_score".to_string()])
        } else {
            (false, vec![])
        }
    }

    /// Closes the open segment, carrying forward the reason it was opened
    /// with in the first place (`boundary_reason` names why a row *starts*,
    /// not why it ends — the cut that ends it lands on the row opened next).
    fn close_open_segment(&self, state: &mut SpaceState, end_ts: i64) -> Option<SegmentRow> {
        let open = state.open.take()?;
        let salience = segment_salience(&open);

        Some(SegmentRow {
            space_id: state.space_id,
            episode_id: open.episode_id,
            start_ts: open.start_ts,
            end_ts: Some(end_ts),
            topic_hint: None,
            salience,
            affect_span: (open.affect_at_start, open.last_affect),
            boundary_reason: open.open_reason,
            event_count: open.events_since_cut,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SegmentationEngine {
        SegmentationEngine::new(SegmentationConfig {
            tau_t_ms: 600_000,
            window: 32,
            alpha: 0.7,
            beta: 0.9,
            gamma: 0.4,
            delta: 0.3,
            eta: 0.2,
            soft_cut_threshold: 0.6,
            hard_cut_ms: 7_200_000,
        })
    }

    fn signal(ts: i64, content: &str) -> EventSignal<'_> {
        EventSignal {
            ts,
            content,
            affect: Affect::neutral(),
            goal_label: None,
            salience: 0.5,
        }
    }

    #[test]
    fn first_event_in_a_space_always_opens_a_segment() {
        let mut state = SpaceState::new(SpaceId::now_v7());
        let out = engine().ingest(&mut state, &signal(0, "grocery list apples milk"));
        assert!(out.boundary_cut);
        assert_eq!(out.ord, 0);
        assert!(out.closed_segment.is_none());
    }

    #[test]
    fn closely_following_similar_events_stay_in_the_same_segment() {
        let eng = engine();
        let mut state = SpaceState::new(SpaceId::now_v7());
        let first = eng.ingest(&mut state, &signal(0, "grocery list apples milk"));
        let second = eng.ingest(&mut state, &signal(5_000, "grocery list bread eggs"));
        assert_eq!(first.episode_id, second.episode_id);
        assert!(!second.boundary_cut);
        assert_eq!(second.ord, 1);
    }

    #[test]
    fn a_two_hour_gap_forces_a_hard_cut() {
        let eng = engine();
        let mut state = SpaceState::new(SpaceId::now_v7());
        eng.ingest(&mut state, &signal(0, "grocery list apples milk"));
        let out = eng.ingest(&mut state, &signal(2 * 60 * 60 * 1000 + 1, "totally unrelated topic"));
        assert!(out.boundary_cut);
        assert_eq!(out.boundary_reasons, vec!["hard_cut_time_gap".to_string()]);
        assert!(out.closed_segment.is_some());
    }

    #[test]
    fn goal_label_change_contributes_to_a_cut() {
        let eng = engine();
        let mut state = SpaceState::new(SpaceId::now_v7());
        eng.ingest(&mut state, &signal(0, "plan the birthday party"));
        let mut next = signal(60_000, "totally different unrelated subject matter entirely");
        next.goal_label = Some("new_goal");
        let out = eng.ingest(&mut state, &next);
        // Either outcome is valid depending on the blended score, but the
        // engine must not panic and must keep ord monotonic within a segment.
        assert!(out.ord == 0 || out.ord == 1);
    }

    #[test]
    fn segment_flush_force_closes_without_a_boundary_condition() {
        let eng = engine();
        let mut state = SpaceState::new(SpaceId::now_v7());
        eng.ingest(&mut state, &signal(0, "note: buy milk"));
        let closed = eng.flush(&mut state, 10_000);
        assert!(closed.is_some());
        assert!(state.open.is_none());
    }

    #[test]
    fn determinism_same_inputs_produce_the_same_ord_sequence() {
        let events = [(0i64, "a b c"), (1_000, "a b d"), (2_000, "x y z")];
        let run = || {
            let eng = engine();
            let mut state = SpaceState::new(SpaceId::now_v7());
            events
                .iter()
                .map(|(ts, text)| eng.ingest(&mut state, &signal(*ts, text)).ord)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    proptest::proptest! {
        #[test]
        fn determinism_holds_for_arbitrary_event_streams(
            deltas in proptest::collection::vec(0i64..10_000_000, 1..20),
            words in proptest::collection::vec("[a-z]{1,8}", 1..20),
        ) {
            let n = deltas.len().min(words.len());
            let mut ts = 0i64;
            let events: Vec<(i64, String)> = (0..n)
                .map(|i| {
                    ts += deltas[i];
                    (ts, words[i].clone())
                })
                .collect();
            let run = || {
                let eng = engine();
                let mut state = SpaceState::new(SpaceId::now_v7());
                events
                    .iter()
                    .map(|(ts, text)| eng.ingest(&mut state, &signal(*ts, text)).ord)
                    .collect::<Vec<_>>()
            };
            proptest::prop_assert_eq!(run(), run());
        }
    }
}
