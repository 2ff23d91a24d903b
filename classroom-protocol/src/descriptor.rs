use crate::events::names::*;

/// Declarative preconditions for one protocol verb, per spec §9 ("implement
/// as a static mapping from event name to a typed handler plus a
/// declarative descriptor; validation is data-driven, not reflective").
///
/// The dispatcher (`classroom_core::dispatcher`) consults this table before
/// ever invoking a handler: it checks `required_fields` are present in the
/// frame's `data` object, that the session is in a lesson if
/// `needs_in_lesson`, and that the session authenticated as admin if
/// `needs_admin`.
#[derive(Debug, Clone, Copy)]
pub struct EventDescriptor {
    /// Top-level JSON object keys the payload must contain.
    pub required_fields: &'static [&'static str],
    /// Whether `INIT_LESSON` must have already succeeded on this session.
    pub needs_in_lesson: bool,
    /// Whether the session must have authenticated with the monitor API key.
    pub needs_admin: bool,
}

const NONE: &[&str] = &[];

/// The full static table, one row per protocol verb in spec §6.
const TABLE: &[(&str, EventDescriptor)] = &[
    (
        INIT_LESSON,
        EventDescriptor {
            required_fields: &["courseId", "lessonId"],
            needs_in_lesson: false,
            needs_admin: false,
        },
    ),
    (
        ALL_PARTICIPANT,
        EventDescriptor {
            required_fields: NONE,
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        PROJECT_ACCESSIBLE,
        EventDescriptor {
            required_fields: NONE,
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        SUBS_PARTICIPANT_LIST,
        EventDescriptor {
            required_fields: NONE,
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        SUBS_PARTICIPANT,
        EventDescriptor {
            required_fields: &["target"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        UNSUBS_PARTICIPANT,
        EventDescriptor {
            required_fields: &["target"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        PROJECT_PERM,
        EventDescriptor {
            required_fields: NONE,
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        DIR_INFO,
        EventDescriptor {
            required_fields: &["targetId"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FILE_READ,
        EventDescriptor {
            required_fields: &["ownerId", "file"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FILE_CREATE,
        EventDescriptor {
            required_fields: &["ownerId", "type", "name"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FILE_UPDATE,
        EventDescriptor {
            required_fields: &["ownerId", "type", "name", "rename"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FILE_DELETE,
        EventDescriptor {
            required_fields: &["ownerId", "type", "name"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FILE_MOD,
        EventDescriptor {
            required_fields: &["ownerId", "file", "cursor", "change", "timestamp"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FILE_SAVE,
        EventDescriptor {
            required_fields: &["ownerId", "file", "content"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        CURSOR_LAST,
        EventDescriptor {
            required_fields: &["ownerId", "file"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        CURSOR_MOVE,
        EventDescriptor {
            required_fields: &["fileInfo", "timestamp"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        ACTIVITY_PING,
        EventDescriptor {
            required_fields: NONE,
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FEEDBACK_LIST,
        EventDescriptor {
            required_fields: NONE,
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FEEDBACK_ADD,
        EventDescriptor {
            required_fields: &["ref", "acl", "comment"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FEEDBACK_MOD,
        EventDescriptor {
            required_fields: &["feedbackId"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FEEDBACK_COMMENT,
        EventDescriptor {
            required_fields: &["feedbackId", "content"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        FEEDBACK_COMMENT_MOD,
        EventDescriptor {
            required_fields: &["commentId"],
            needs_in_lesson: true,
            needs_admin: false,
        },
    ),
    (
        TIME_SYNC,
        EventDescriptor {
            required_fields: &["clientSentAt"],
            needs_in_lesson: false,
            needs_admin: false,
        },
    ),
    (
        TIME_SYNC_ACK,
        EventDescriptor {
            required_fields: &["clientSentAt", "serverReceivedAt", "serverSentAt", "clientReceivedAt"],
            needs_in_lesson: false,
            needs_admin: false,
        },
    ),
    (
        WS_MONITOR_SUBSCRIBE,
        EventDescriptor {
            required_fields: &["courseId", "lessonId"],
            needs_in_lesson: false,
            needs_admin: true,
        },
    ),
];

/// Looks up the descriptor for a protocol verb. Returns `None` for an
/// unrecognized event name, which the dispatcher treats as an unknown-event
/// error.
pub fn event_descriptor(event: &str) -> Option<EventDescriptor> {
    TABLE
        .iter()
        .find(|(name, _)| *name == event)
        .map(|(_, descriptor)| *descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_name_constant_has_a_row() {
        for name in [
            INIT_LESSON,
            ALL_PARTICIPANT,
            PROJECT_ACCESSIBLE,
            SUBS_PARTICIPANT_LIST,
            SUBS_PARTICIPANT,
            UNSUBS_PARTICIPANT,
            PROJECT_PERM,
            DIR_INFO,
            FILE_READ,
            FILE_CREATE,
            FILE_UPDATE,
            FILE_DELETE,
            FILE_MOD,
            FILE_SAVE,
            CURSOR_LAST,
            CURSOR_MOVE,
            ACTIVITY_PING,
            FEEDBACK_LIST,
            FEEDBACK_ADD,
            FEEDBACK_MOD,
            FEEDBACK_COMMENT,
            FEEDBACK_COMMENT_MOD,
            WS_MONITOR_SUBSCRIBE,
        ] {
            assert!(event_descriptor(name).is_some(), "missing descriptor for {name}");
        }
    }

    #[test]
    fn ws_monitor_subscribe_requires_admin() {
        let d = event_descriptor(WS_MONITOR_SUBSCRIBE).unwrap();
        assert!(d.needs_admin);
        assert!(!d.needs_in_lesson);
    }

    #[test]
    fn unknown_event_has_no_descriptor() {
        assert!(event_descriptor("NOT_A_REAL_EVENT").is_none());
    }

    #[test]
    fn init_lesson_does_not_require_an_existing_lesson_binding() {
        let d = event_descriptor(INIT_LESSON).unwrap();
        assert!(!d.needs_in_lesson);
    }
}
