//! Space-scoped key encoding for the episodic store's LMDB tables.
//!
//! Every key is prefixed by `space_id` so range scans and point lookups are
//! naturally tenant-isolated, the same design used by the teacher's
//! `TenantScopedKey` (there keyed by tenant; here keyed by `space_id` per
//! spec §4.7's "all identifiers are space-scoped; cross-space joins are
//! forbidden").

use kinlog_core::ids::{EntityIdType, EpisodeId, EventId, LinkId, SpaceId};

/// `events` table key: `space_id (16) ++ event_id (16)` = 32 bytes.
pub fn event_key(space_id: SpaceId, event_id: EventId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[0..16].copy_from_slice(space_id.as_uuid().as_bytes());
    key[16..32].copy_from_slice(&event_id.as_u128().to_be_bytes());
    key
}

/// `segments` table key: `space_id (16) ++ episode_id (16)` = 32 bytes.
pub fn segment_key(space_id: SpaceId, episode_id: EpisodeId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[0..16].copy_from_slice(space_id.as_uuid().as_bytes());
    key[16..32].copy_from_slice(episode_id.as_uuid().as_bytes());
    key
}

/// `segment_links` table key: `space_id (16) ++ episode_id (16) ++ ord (8,
/// big-endian)` = 40 bytes. Big-endian `ord` keeps lexicographic byte order
/// equal to numeric order, so a prefix scan over `(space_id, episode_id)`
/// yields events in `ord` order directly from LMDB's own key ordering.
pub fn link_key(space_id: SpaceId, episode_id: EpisodeId, ord: u64) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[0..16].copy_from_slice(space_id.as_uuid().as_bytes());
    key[16..32].copy_from_slice(episode_id.as_uuid().as_bytes());
    key[32..40].copy_from_slice(&ord.to_be_bytes());
    key
}

/// Prefix for scanning every link belonging to one episode.
pub fn link_prefix(space_id: SpaceId, episode_id: EpisodeId) -> [u8; 32] {
    segment_key(space_id, episode_id)
}

/// `cross_refs` table key: `space_id (16) ++ link_id (16)` = 32 bytes.
pub fn cross_ref_key(space_id: SpaceId, link_id: LinkId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[0..16].copy_from_slice(space_id.as_uuid().as_bytes());
    key[16..32].copy_from_slice(link_id.as_uuid().as_bytes());
    key
}

/// Prefix for scanning every event row (or cross-ref) in one space.
pub fn space_prefix(space_id: SpaceId) -> [u8; 16] {
    *space_id.as_uuid().as_bytes()
}

/// `open_segments` table key: `space_id (16)`, value is the open episode's
/// id, the per-space pointer the Segmentation Engine consults on every
/// append.
pub fn open_segment_key(space_id: SpaceId) -> [u8; 16] {
    space_prefix(space_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_keys_sort_by_space_then_event() {
        let space = SpaceId::now_v7();
        let a = event_key(space, EventId::from_timestamp_ms(1, 1));
        let b = event_key(space, EventId::from_timestamp_ms(2, 1));
        assert!(a < b);
    }

    #[test]
    fn link_keys_preserve_ord_within_an_episode() {
        let space = SpaceId::now_v7();
        let episode = EpisodeId::now_v7();
        let first = link_key(space, episode, 0);
        let second = link_key(space, episode, 1);
        let far = link_key(space, episode, 1000);
        assert!(first < second);
        assert!(second < far);
    }

    #[test]
    fn different_spaces_never_share_a_prefix_byte_range() {
        let a = SpaceId::now_v7();
        let b = SpaceId::now_v7();
        assert_ne!(space_prefix(a), space_prefix(b));
    }
}
