//! Proptest generators (`proptest::prelude::any`-compatible strategies) for
//! the fabric's request/event/row shapes, following the teacher's pattern
//! of centralizing entity generators in one test-utils crate rather than
//! duplicating `prop_compose!` blocks per test module.

use kinlog_core::envelope::{Actor, Band};
use kinlog_core::ids::{ActorDeviceId, ActorPersonId, EntityIdType, SpaceId, TraceId};
use kinlog_episodic::Affect;
use kinlog_gate::Request;
use proptest::prelude::*;

prop_compose! {
    fn arb_affect()(valence in -1.0f64..=1.0, arousal in 0.0f64..=1.0) -> Affect {
        Affect { valence, arousal }
    }
}

prop_compose! {
    fn arb_band()(idx in 0u8..4) -> Band {
        match idx {
            0 => Band::Green,
            1 => Band::Amber,
            2 => Band::Red,
            _ => Band::Black,
        }
    }
}

prop_compose! {
    /// A syntactically valid request, free text of bounded length so
    /// proptest doesn't waste shrink cycles on megabyte strings.
    fn arb_request()(
        text in "[a-zA-Z0-9 .,!?]{1,120}",
        ts in 0i64..10_000_000_000,
        context_bump in -1.0f64..=1.0,
    ) -> Request {
        let mut request = Request::new(
            SpaceId::now_v7(),
            Actor::new(ActorPersonId::now_v7(), ActorDeviceId::now_v7()),
            Band::Green,
            TraceId::now_v7(),
            ts,
            text,
        );
        request.context_bump = context_bump;
        request
    }
}

pub fn affect_strategy() -> impl Strategy<Value = Affect> {
    arb_affect()
}

pub fn band_strategy() -> impl Strategy<Value = Band> {
    arb_band()
}

pub fn request_strategy() -> impl Strategy<Value = Request> {
    arb_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_affect_distance_is_never_negative(a in affect_strategy(), b in affect_strategy()) {
            prop_assert!(a.distance(&b) >= 0.0);
        }

        #[test]
        fn generated_requests_always_carry_non_empty_text(req in request_strategy()) {
            prop_assert!(!req.text.is_empty());
        }
    }
}
