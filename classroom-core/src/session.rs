//! Component J — per-connection session state.
//!
//! A session's room memberships are mirrored here purely so a disconnecting
//! or revoked connection can look up *which* rooms to exit without a round
//! trip; [`crate::rooms::RoomLattice`] (component K) remains the
//! cross-instance source of truth for who is actually in a room.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::rooms::RoomType;

/// How a connection authenticated (spec SPEC_FULL §8 "Course-membership
/// admin bypass"): an ordinary verified user, or a monitor-only connection
/// that may enter `WS_MONITOR` but never binds a participant identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// A verified end user.
    User(i64),
    /// An `X-API-KEY` observability session.
    Monitor,
}

/// One connection's mutable state (spec §3 "Session").
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque per-connection id.
    pub sid: String,
    /// How this connection authenticated.
    pub identity: Identity,
    /// Bound by `INIT_LESSON`.
    pub course_id: Option<i64>,
    /// Bound by `INIT_LESSON`.
    pub lesson_id: Option<i64>,
    /// Bound by `INIT_LESSON`; `None` until the session is `IN_LESSON`.
    pub participant_id: Option<i64>,
    /// The participant's display name, cached on the session for convenience.
    pub nickname: Option<String>,
    /// Local mirror of this session's room memberships, by [`RoomType`].
    pub rooms: HashMap<RoomType, Vec<String>>,
    /// Estimated clock offset from the `TIME_SYNC` exchange (component O).
    pub time_diff_ms: Option<i64>,
}

impl Session {
    /// A freshly authenticated, not-yet-in-lesson session.
    pub fn new(sid: impl Into<String>, identity: Identity) -> Self {
        Self {
            sid: sid.into(),
            identity,
            course_id: None,
            lesson_id: None,
            participant_id: None,
            nickname: None,
            rooms: HashMap::new(),
            time_diff_ms: None,
        }
    }

    /// `true` once `INIT_LESSON` has bound lesson coordinates (spec State
    /// Machine: `IN_LESSON`).
    pub fn is_in_lesson(&self) -> bool {
        self.participant_id.is_some()
    }

    /// `true` for a monitor-authenticated session.
    pub fn is_admin(&self) -> bool {
        matches!(self.identity, Identity::Monitor)
    }

    /// The authenticated user id, or `None` for a monitor session.
    pub fn user_id(&self) -> Option<i64> {
        match self.identity {
            Identity::User(id) => Some(id),
            Identity::Monitor => None,
        }
    }

    /// Records a room membership in the local mirror.
    pub fn remember_room(&mut self, room_type: RoomType, room_name: String) {
        let memberships = self.rooms.entry(room_type).or_default();
        if !memberships.contains(&room_name) {
            memberships.push(room_name);
        }
    }

    /// Drops a room membership from the local mirror.
    pub fn forget_room(&mut self, room_type: RoomType, room_name: &str) {
        if let Some(memberships) = self.rooms.get_mut(&room_type) {
            memberships.retain(|r| r != room_name);
        }
    }

    /// Every participant id this session currently subscribes to, read
    /// straight from the room name suffix (`SUBS_PARTICIPANT_LIST`, spec
    /// SPEC_FULL §8 Supplemented feature 2).
    pub fn subscribed_participant_ids(&self) -> Vec<i64> {
        self.rooms
            .get(&RoomType::SubsPtc)
            .into_iter()
            .flatten()
            .filter_map(|room| room.rsplit(':').next().and_then(|tail| tail.parse().ok()))
            .collect()
    }
}

/// A process-local registry of the sessions physically connected to this
/// instance, keyed by `sid`.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// An empty session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session, replacing any existing one at the same sid.
    pub fn insert(&self, session: Session) {
        self.sessions.write().insert(session.sid.clone(), session);
    }

    /// Removes a session, returning its final state for disconnect cleanup.
    pub fn remove(&self, sid: &str) -> Option<Session> {
        self.sessions.write().remove(sid)
    }

    /// Clones out a session's current state.
    pub fn get_clone(&self, sid: &str) -> Option<Session> {
        self.sessions.read().get(sid).cloned()
    }

    /// Applies `f` to a session in place, returning its result.
    pub fn mutate<R>(&self, sid: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.write().get_mut(sid).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribed_participant_ids_reads_the_subs_ptc_room_suffix() {
        let mut session = Session::new("sid-1", Identity::User(42));
        session.remember_room(RoomType::SubsPtc, "1:2:7".to_string());
        session.remember_room(RoomType::SubsPtc, "1:2:9".to_string());
        let mut ids = session.subscribed_participant_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![7, 9]);
    }

    #[test]
    fn monitor_session_has_no_user_id() {
        let session = Session::new("sid-2", Identity::Monitor);
        assert!(session.is_admin());
        assert_eq!(session.user_id(), None);
    }
}
