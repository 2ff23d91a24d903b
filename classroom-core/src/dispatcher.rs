//! Component L — connect/disconnect, event demultiplexing, and fan-out.
//!
//! The dispatcher is the only thing `classroom-server`'s transport layer
//! talks to: it authenticates a connection, feeds every inbound [`Frame`]
//! through the static descriptor table in [`classroom_protocol::descriptor`],
//! invokes the matching handler in [`crate::handlers`], and is responsible
//! for the one rule every handler relies on — a handler's [`ClassroomError`]
//! never reaches the transport raw; it becomes an `ERROR` frame addressed to
//! the caller alone, with the original `uuid` echoed (spec §7 "handlers
//! never throw to the transport").

use std::sync::Arc;

use classroom_protocol::events::names::{ERROR, PARTICIPANT_STATUS, WS_MONITOR_EVENT};
use classroom_protocol::events::observability::MirroredFrame;
use classroom_protocol::events::participants::ParticipantStatus;
use classroom_protocol::{event_descriptor, ErrorKind, ErrorPayload, Frame};
use serde::Serialize;
use serde_json::Value;

use crate::context::AppContext;
use crate::error::{ClassroomError, Result};
use crate::handlers;
use crate::outbound::RoomEnvelope;
use crate::rooms::RoomName;
use crate::session::{Identity, Session};

/// How a connection attempt identified itself (spec §6 "Authentication").
#[derive(Debug, Clone)]
pub enum Credential {
    /// `Authorization: Bearer <token>`, verified against the upstream auth service.
    Bearer(String),
    /// `X-API-KEY: <monitorKey>`, compared against [`crate::config::Config::monitor_key`].
    MonitorKey(String),
}

/// Connect/disconnect/demultiplex (component L).
pub struct Dispatcher {
    ctx: Arc<AppContext>,
}

impl Dispatcher {
    /// Builds a dispatcher over the shared process context.
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Authenticates a new connection and registers its session. The caller
    /// (`classroom-server`'s accept loop) is responsible for generating
    /// `sid` and registering its outbound channel in
    /// [`crate::outbound::OutboundRegistry`] before or after this call, as
    /// long as it happens before any [`Dispatcher::handle_frame`] call for
    /// this `sid`.
    ///
    /// Returns [`ErrorKind::AuthFailed`] on a bad credential; the spec §6
    /// contract is that the connection is refused outright, never turned
    /// into an `ERROR` frame (there is no session yet to send one to).
    pub async fn connect(&self, sid: &str, credential: Credential) -> Result<()> {
        let identity = match credential {
            Credential::Bearer(token) => {
                let principal = self.ctx.token_verifier.verify(&token).await?;
                match principal {
                    Some(principal) => Identity::User(principal.user_id),
                    None => return Err(ErrorKind::AuthFailed.into()),
                }
            }
            Credential::MonitorKey(key) => {
                if key != self.ctx.config.monitor_key {
                    return Err(ErrorKind::AuthFailed.into());
                }
                Identity::Monitor
            }
        };
        self.ctx.sessions.insert(Session::new(sid, identity));
        tracing::info!(sid, "session connected");
        Ok(())
    }

    /// Tears down a session on disconnect (spec §4.L "Disconnect"): exits
    /// every room it mirrored locally, clears the participant's `active`
    /// flag and broadcasts `PARTICIPANT_STATUS` if it had bound one, and
    /// deregisters its outbound channel.
    pub async fn disconnect(&self, sid: &str) {
        let Some(session) = self.ctx.sessions.remove(sid) else {
            return;
        };
        self.ctx.outbound.unregister(sid);

        for names in session.rooms.values() {
            for room_name in names {
                if let Err(err) = self.ctx.rooms.exit(sid, room_name).await {
                    tracing::warn!(error = %err, sid, room = %room_name, "failed to exit room on disconnect");
                }
                self.ctx.forwarders.leave(room_name);
            }
        }

        let Some(participant_id) = session.participant_id else {
            tracing::info!(sid, "session disconnected");
            return;
        };
        if let Err(err) = self.ctx.metadata.set_participant_active(participant_id, false).await {
            tracing::warn!(error = %err, participant_id, "failed to clear participant active flag on disconnect");
        }
        if let (Some(course_id), Some(lesson_id)) = (session.course_id, session.lesson_id) {
            let room = RoomName::lesson(course_id, lesson_id);
            let emitter = Emitter::new(&self.ctx, sid, None);
            if let Err(err) = emitter
                .to_room(&room, PARTICIPANT_STATUS, ParticipantStatus { id: participant_id, active: false })
                .await
            {
                tracing::warn!(error = %err, participant_id, "failed to broadcast presence on disconnect");
            }
        }
        tracing::info!(sid, participant_id, "session disconnected");
    }

    /// Demultiplexes one inbound frame (spec §4.L "Event demultiplexing"):
    /// validates required fields and session preconditions against the
    /// static descriptor table, invokes the matching handler, and converts
    /// any error into an `ERROR` frame to the caller, echoing `uuid`.
    pub async fn handle_frame(&self, sid: &str, frame: Frame) {
        let emitter = Emitter::new(&self.ctx, sid, frame.uuid.clone());
        if let Err(err) = self.process(sid, &frame, &emitter).await {
            let kind = err.as_wire_kind();
            if !matches!(err, ClassroomError::Protocol(_)) {
                tracing::error!(error = %err, event = %frame.event, sid, "handler failed");
            }
            emitter.to_caller(ERROR, ErrorPayload::new(kind));
        }
    }

    async fn process(&self, sid: &str, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
        let Some(descriptor) = event_descriptor(&frame.event) else {
            tracing::warn!(event = %frame.event, "unrecognized event name");
            return Err(ErrorKind::Internal.into());
        };
        validate_required_fields(frame, descriptor.required_fields)?;

        let session = self.ctx.sessions.get_clone(sid).ok_or(ErrorKind::Internal)?;
        if descriptor.needs_in_lesson && !session.is_in_lesson() {
            return Err(ErrorKind::NotInLesson.into());
        }
        if descriptor.needs_admin && !session.is_admin() {
            return Err(ErrorKind::ForbiddenProject.into());
        }

        handlers::dispatch(&self.ctx, sid, &session, frame, emitter).await
    }
}

fn validate_required_fields(frame: &Frame, fields: &[&str]) -> Result<()> {
    if fields.is_empty() {
        return Ok(());
    }
    let Some(Value::Object(data)) = &frame.data else {
        return Err(ErrorKind::MissingField.into());
    };
    for field in fields {
        if !data.get(*field).is_some_and(|v| !v.is_null()) {
            return Err(ErrorKind::MissingField.into());
        }
    }
    Ok(())
}

/// A handle scoped to one inbound frame, used by handlers to address the
/// calling session directly or to fan out to a named room.
pub struct Emitter<'a> {
    ctx: &'a AppContext,
    sid: &'a str,
    uuid: Option<String>,
}

impl<'a> Emitter<'a> {
    /// Builds an emitter for one inbound frame's lifetime.
    pub fn new(ctx: &'a AppContext, sid: &'a str, uuid: Option<String>) -> Self {
        Self { ctx, sid, uuid }
    }

    /// Delivers `event{data}` to the calling session only, echoing the
    /// frame's `uuid` for client-side correlation.
    pub fn to_caller(&self, event: &str, data: impl Serialize) {
        self.ctx.outbound.send(self.sid, Frame::with_uuid(event, data, self.uuid.clone()));
    }

    /// Delivers `event{data}` to one specific sid, uncorrelated (used when a
    /// handler addresses a participant directly rather than the caller).
    pub fn to_sid(&self, sid: &str, event: &str, data: impl Serialize) {
        self.ctx.outbound.send(sid, Frame::new(event, data));
    }

    /// Fans `event{data}` out to every member of `room_name`, on every
    /// instance, by publishing through the room lattice (spec §9
    /// "Cross-instance fan-out"). Never correlated by `uuid` — room fan-out
    /// is not a reply to any one request. Also mirrors the frame into
    /// `room_name`'s `WS_MONITOR` feed, best-effort (spec §4.O).
    pub async fn to_room(&self, room_name: &str, event: &str, data: impl Serialize) -> Result<()> {
        let frame = Frame::new(event, data);
        let recipients = self.ctx.rooms.members(room_name).await?;
        if !recipients.is_empty() {
            let envelope = RoomEnvelope {
                frame: frame.clone(),
                recipients,
            };
            let payload = serde_json::to_vec(&envelope)?;
            self.ctx.rooms.publish(room_name, &payload).await?;
        }
        self.mirror_to_monitor(room_name, &frame).await;
        Ok(())
    }

    /// Mirrors `frame` (fanned out to `room_name`) into the matching
    /// `WS_MONITOR` room, stamped with a server timestamp and the
    /// triggering sid (spec §4.O "(a) stamp outbound frames ... (c) mirror
    /// events to the monitor room"). Failures are logged, never propagated —
    /// observability is best-effort (spec §7 "Background failures ... are
    /// logged, not returned").
    async fn mirror_to_monitor(&self, room_name: &str, frame: &Frame) {
        let Some(monitor_room) = RoomName::monitor_mirror_of(room_name) else {
            return;
        };
        let result: Result<()> = async {
            let recipients = self.ctx.rooms.members(&monitor_room).await?;
            if recipients.is_empty() {
                return Ok(());
            }
            let mirrored = MirroredFrame::new(room_name, frame, Some(self.sid.to_string()), chrono::Utc::now().timestamp_millis());
            let envelope = RoomEnvelope {
                frame: Frame::new(WS_MONITOR_EVENT, mirrored),
                recipients,
            };
            let payload = serde_json::to_vec(&envelope)?;
            self.ctx.rooms.publish(&monitor_room, &payload).await
        }
        .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, room = %room_name, "failed to mirror event to monitor room");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_required_fields_rejects_missing_data() {
        let frame = Frame { event: "FILE_READ".into(), data: None, uuid: None };
        assert!(validate_required_fields(&frame, &["ownerId", "file"]).is_err());
    }

    #[test]
    fn validate_required_fields_accepts_empty_requirement() {
        let frame = Frame { event: "ALL_PARTICIPANT".into(), data: None, uuid: None };
        assert!(validate_required_fields(&frame, &[]).is_ok());
    }

    #[test]
    fn validate_required_fields_rejects_null_field() {
        let frame = Frame {
            event: "FILE_READ".into(),
            data: Some(serde_json::json!({"ownerId": null, "file": "a.py"})),
            uuid: None,
        };
        assert!(validate_required_fields(&frame, &["ownerId", "file"]).is_err());
    }
}
