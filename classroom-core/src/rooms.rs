//! Component K — named pub/sub rooms, fanned out across instances through
//! the KV store (spec §9 "Cross-instance fan-out": "the room lattice is
//! implemented by forwarding every emit through the KV store's pub/sub so
//! that membership lookups are local per instance but messages reach all
//! instances' members" — here membership itself also lives in the KV store,
//! as a sorted set scored by join order, so `getPtcSid` and capacity-based
//! eviction work the same regardless of which instance a member connected
//! through).

use std::sync::Arc;

use crate::error::Result;
use crate::kv::{KvStore, KvSubscription};

/// The four room families of spec §4.J/K.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomType {
    /// `{c}:{l}` — every session in a lesson.
    Lesson,
    /// `{c}:{l}:{ptc}:self` — one membership per participant session.
    PersonalPtc,
    /// `{c}:{l}:{ptc}` — "I subscribe to `ptc`'s stream".
    SubsPtc,
    /// `admin:monitor:{c}:{l}` — observability mirror, admin-only.
    WsMonitor,
}

/// Builds the canonical room name for each [`RoomType`].
pub struct RoomName;

impl RoomName {
    /// `LESSON` room name.
    pub fn lesson(course_id: i64, lesson_id: i64) -> String {
        format!("{course_id}:{lesson_id}")
    }

    /// `PERSONAL_PTC` room name.
    pub fn personal_ptc(course_id: i64, lesson_id: i64, participant_id: i64) -> String {
        format!("{course_id}:{lesson_id}:{participant_id}:self")
    }

    /// `SUBS_PTC` room name.
    pub fn subs_ptc(course_id: i64, lesson_id: i64, participant_id: i64) -> String {
        format!("{course_id}:{lesson_id}:{participant_id}")
    }

    /// `WS_MONITOR` room name.
    pub fn ws_monitor(course_id: i64, lesson_id: i64) -> String {
        format!("admin:monitor:{course_id}:{lesson_id}")
    }

    /// The `WS_MONITOR` room that mirrors `room_name`'s traffic, or `None` if
    /// `room_name` does not carry a `{course}:{lesson}:...` prefix (i.e. it is
    /// already a `WS_MONITOR` room itself, or some future room family this
    /// helper doesn't recognize). Used by [`crate::dispatcher::Emitter`] to
    /// mirror every room fan-out into its observability feed (spec §4.O
    /// "mirror events to the monitor room").
    pub fn monitor_mirror_of(room_name: &str) -> Option<String> {
        let mut parts = room_name.splitn(3, ':');
        let course_id: i64 = parts.next()?.parse().ok()?;
        let lesson_id: i64 = parts.next()?.parse().ok()?;
        Some(Self::ws_monitor(course_id, lesson_id))
    }
}

/// Membership + fan-out over the named room lattice (component K).
pub struct RoomLattice {
    kv: Arc<dyn KvStore>,
}

impl RoomLattice {
    /// Builds a room lattice over the shared hot-tier KV store.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn membership_key(room_name: &str) -> String {
        format!("room:{room_name}")
    }

    fn sequence_key(room_name: &str) -> String {
        format!("room:{room_name}:seq")
    }

    fn channel(room_name: &str) -> String {
        format!("pub:{room_name}")
    }

    /// Adds `sid` to `room_name`. Idempotent. If `limit` is set and adding
    /// `sid` pushes membership over capacity, evicts the oldest members
    /// first and returns their sids so the caller can also drop the
    /// membership from their local [`crate::session::Session`] bookkeeping
    /// (spec §4.J "enterRoom ... evict the oldest type memberships first").
    pub async fn enter(&self, sid: &str, room_name: &str, limit: Option<u32>) -> Result<Vec<String>> {
        let key = Self::membership_key(room_name);
        if self.kv.zscore(&key, sid).await?.is_some() {
            return Ok(Vec::new());
        }
        let seq = self.kv.incrby(&Self::sequence_key(room_name), 1).await?;
        self.kv.zadd(&key, sid, seq as f64).await?;

        let Some(limit) = limit else {
            return Ok(Vec::new());
        };
        let mut members = self.kv.zscan(&key).await?;
        if members.len() as u32 <= limit {
            return Ok(Vec::new());
        }
        members.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap());
        let overflow = members.len() - limit as usize;
        let mut evicted = Vec::with_capacity(overflow);
        for member in members.into_iter().take(overflow) {
            self.kv.zrem(&key, &member.member).await?;
            evicted.push(member.member);
        }
        Ok(evicted)
    }

    /// Removes `sid` from `room_name`. Idempotent.
    pub async fn exit(&self, sid: &str, room_name: &str) -> Result<()> {
        self.kv.zrem(&Self::membership_key(room_name), sid).await?;
        Ok(())
    }

    /// Lists every sid currently in `room_name`.
    pub async fn members(&self, room_name: &str) -> Result<Vec<String>> {
        Ok(self
            .kv
            .zscan(&Self::membership_key(room_name))
            .await?
            .into_iter()
            .map(|m| m.member)
            .collect())
    }

    /// Returns any one sid in `room_name`, or `None` if empty (spec §4.J
    /// `getPtcSid`: "absence means the participant is offline").
    pub async fn any_member(&self, room_name: &str) -> Result<Option<String>> {
        Ok(self.members(room_name).await?.into_iter().next())
    }

    /// Publishes `payload` to every instance subscribed to `room_name`.
    pub async fn publish(&self, room_name: &str, payload: &[u8]) -> Result<()> {
        self.kv.publish(&Self::channel(room_name), payload).await
    }

    /// Subscribes this instance to `room_name`'s fan-out channel.
    pub async fn subscribe(&self, room_name: &str) -> Result<Box<dyn KvSubscription>> {
        self.kv.subscribe(&Self::channel(room_name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names_match_the_spec_templates() {
        assert_eq!(RoomName::lesson(1, 2), "1:2");
        assert_eq!(RoomName::personal_ptc(1, 2, 3), "1:2:3:self");
        assert_eq!(RoomName::subs_ptc(1, 2, 3), "1:2:3");
        assert_eq!(RoomName::ws_monitor(1, 2), "admin:monitor:1:2");
    }

    #[test]
    fn monitor_mirror_of_derives_the_matching_monitor_room() {
        assert_eq!(RoomName::monitor_mirror_of(&RoomName::lesson(1, 2)).as_deref(), Some("admin:monitor:1:2"));
        assert_eq!(RoomName::monitor_mirror_of(&RoomName::subs_ptc(1, 2, 3)).as_deref(), Some("admin:monitor:1:2"));
        assert_eq!(RoomName::monitor_mirror_of(&RoomName::personal_ptc(1, 2, 3)).as_deref(), Some("admin:monitor:1:2"));
    }

    #[test]
    fn monitor_mirror_of_does_not_recurse_on_a_monitor_room() {
        assert_eq!(RoomName::monitor_mirror_of(&RoomName::ws_monitor(1, 2)), None);
    }
}
