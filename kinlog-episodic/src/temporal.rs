//! Temporal Index: day/hour/week bucket keys plus the canonical recency
//! decay used to rank query results, spec §4.9.

use chrono::{DateTime, Datelike, Timelike, Utc};

use kinlog_core::config::PhraseTimeMapping;

/// `day=YYYY-MM-DD`.
pub fn day_key(ts_ms: i64) -> String {
    let dt = from_ms(ts_ms);
    format!("day={}", dt.format("%Y-%m-%d"))
}

/// `hour=YYYY-MM-DDTHH`.
pub fn hour_key(ts_ms: i64) -> String {
    let dt = from_ms(ts_ms);
    format!("hour={}", dt.format("%Y-%m-%dT%H"))
}

/// `week=YYYY-Www` (ISO week).
pub fn week_key(ts_ms: i64) -> String {
    let dt = from_ms(ts_ms);
    let iso = dt.iso_week();
    format!("week={}-W{:02}", iso.year(), iso.week())
}

/// Phrase keys from any configured mapping whose lookback window relative
/// to `now_ms` contains `ts_ms` — lets a query like "last weekend" resolve
/// to `[now_ms - lookback_ms, now_ms]` without the caller doing date math.
pub fn phrase_keys(ts_ms: i64, now_ms: i64, mappings: &[PhraseTimeMapping]) -> Vec<String> {
    mappings
        .iter()
        .filter(|m| ts_ms >= now_ms - m.lookback_ms && ts_ms <= now_ms)
        .map(|m| format!("phrase={}", m.phrase))
        .collect()
}

fn from_ms(ts_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts_ms).unwrap_or_else(|| DateTime::from_timestamp_millis(0).unwrap())
}

/// `s_recency(Δt) = 2^(-Δt / h)`, half-life `h` in milliseconds (default
/// 72h, `EpisodicConfig::half_life_ms`). `now_ms` must be `>= event_ts_ms`
/// for the usual monotonically-decaying behavior; an event from the future
/// relative to `now_ms` clamps to a recency of 1.0 rather than exceeding it.
pub fn recency_score(event_ts_ms: i64, now_ms: i64, half_life_ms: i64) -> f64 {
    let delta = (now_ms - event_ts_ms).max(0) as f64;
    let half_life = half_life_ms.max(1) as f64;
    2f64.powf(-delta / half_life)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_hour_week_keys_are_stable_for_a_known_timestamp() {
        // 2024-03-15T10:30:00Z
        let ts = 1_710_498_600_000;
        assert_eq!(day_key(ts), "day=2024-03-15");
        assert_eq!(hour_key(ts), "hour=2024-03-15T10");
        assert!(week_key(ts).starts_with("week=2024-W"));
    }

    #[test]
    fn recency_halves_every_half_life_interval() {
        let half_life = 72 * 60 * 60 * 1000;
        let now = 1_000_000_000i64;
        let fresh = recency_score(now, now, half_life);
        let one_half_life_ago = recency_score(now - half_life as i64, now, half_life);
        assert!((fresh - 1.0).abs() < 1e-9);
        assert!((one_half_life_ago - 0.5).abs() < 1e-9);
    }

    #[test]
    fn recency_never_exceeds_one_for_future_events() {
        let score = recency_score(2_000, 1_000, 72 * 60 * 60 * 1000);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn phrase_keys_only_include_windows_containing_the_timestamp() {
        let mappings = vec![
            PhraseTimeMapping {
                phrase: "last hour".to_string(),
                lookback_ms: 60 * 60 * 1000,
            },
            PhraseTimeMapping {
                phrase: "last minute".to_string(),
                lookback_ms: 60 * 1000,
            },
        ];
        let now = 10 * 60 * 60 * 1000i64;
        let keys = phrase_keys(now - 30 * 60 * 1000, now, &mappings);
        assert_eq!(keys, vec!["phrase=last hour".to_string()]);
    }

    proptest::proptest! {
        #[test]
        fn recency_score_stays_in_unit_interval_and_decays_monotonically(
            delta_ms in 0i64..1_000_000_000_000,
            half_life_ms in 1i64..1_000_000_000_000,
        ) {
            let now = 2_000_000_000_000i64;
            let score = recency_score(now - delta_ms, now, half_life_ms);
            proptest::prop_assert!(score > 0.0 && score <= 1.0);

            let later_delta = delta_ms.saturating_mul(2).min(1_000_000_000_000 - 1);
            let doubled = recency_score(now - later_delta, now, half_life_ms);
            proptest::prop_assert!(doubled <= score + 1e-9);
        }
    }
}
