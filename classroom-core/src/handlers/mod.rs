//! Component M — one function per protocol event, dispatched by name from
//! [`crate::dispatcher`]. Every handler here assumes the descriptor-table
//! preconditions (required fields present, session `IN_LESSON`/admin as
//! needed) already passed; its only remaining job is the event's own
//! business logic and choosing who hears about the result.

mod cursor;
mod feedback;
mod files;
mod lesson;
mod observability;
mod participants;
mod permissions;
mod timesync;

use std::sync::Arc;

use classroom_protocol::events::names::*;
use classroom_protocol::events::permissions::Permission;
use classroom_protocol::{ErrorKind, Frame};

use crate::context::AppContext;
use crate::dispatcher::Emitter;
use crate::error::Result;
use crate::keys::{LessonScope, ObjectScope};
use crate::metastore::{Participant, Project};
use crate::rooms::RoomType;
use crate::session::Session;

/// Routes one already-validated frame to its handler.
pub async fn dispatch(
    ctx: &Arc<AppContext>,
    sid: &str,
    session: &Session,
    frame: &Frame,
    emitter: &Emitter<'_>,
) -> Result<()> {
    match frame.event.as_str() {
        INIT_LESSON => lesson::init_lesson(ctx, sid, session, frame, emitter).await,
        ALL_PARTICIPANT => lesson::all_participant(ctx, session, emitter).await,
        ACTIVITY_PING => lesson::activity_ping(ctx, session, frame, emitter).await,
        PROJECT_ACCESSIBLE => permissions::project_accessible(ctx, session, emitter).await,
        PROJECT_PERM => permissions::project_perm(ctx, session, frame, emitter).await,
        SUBS_PARTICIPANT_LIST => participants::subs_participant_list(session, emitter),
        SUBS_PARTICIPANT => participants::subs_participant(ctx, sid, session, frame, emitter).await,
        UNSUBS_PARTICIPANT => participants::unsubs_participant(ctx, sid, session, frame, emitter).await,
        DIR_INFO => files::dir_info(ctx, session, frame, emitter).await,
        FILE_READ => files::file_read(ctx, session, frame, emitter).await,
        FILE_CREATE => files::file_create(ctx, session, frame, emitter).await,
        FILE_UPDATE => files::file_update(ctx, session, frame, emitter).await,
        FILE_DELETE => files::file_delete(ctx, session, frame, emitter).await,
        FILE_MOD => files::file_mod(ctx, session, frame, emitter).await,
        FILE_SAVE => files::file_save(ctx, session, frame, emitter).await,
        CURSOR_LAST => cursor::cursor_last(ctx, session, frame, emitter).await,
        CURSOR_MOVE => cursor::cursor_move(ctx, session, frame, emitter).await,
        FEEDBACK_LIST => feedback::feedback_list(ctx, session, frame, emitter).await,
        FEEDBACK_ADD => feedback::feedback_add(ctx, session, frame, emitter).await,
        FEEDBACK_MOD => feedback::feedback_mod(ctx, session, frame, emitter).await,
        FEEDBACK_COMMENT => feedback::feedback_comment(ctx, session, frame, emitter).await,
        FEEDBACK_COMMENT_MOD => feedback::feedback_comment_mod(ctx, session, frame, emitter).await,
        TIME_SYNC => timesync::time_sync(frame, emitter),
        TIME_SYNC_ACK => timesync::time_sync_ack(ctx, sid, frame),
        WS_MONITOR_SUBSCRIBE => observability::ws_monitor_subscribe(ctx, sid, session, frame, emitter).await,
        other => {
            tracing::warn!(event = other, "descriptor table has no handler registered");
            Err(ErrorKind::Internal.into())
        }
    }
}

fn course_id(session: &Session) -> Result<i64> {
    session.course_id.ok_or_else(|| ErrorKind::NotInLesson.into())
}

fn lesson_id(session: &Session) -> Result<i64> {
    session.lesson_id.ok_or_else(|| ErrorKind::NotInLesson.into())
}

fn participant_id(session: &Session) -> Result<i64> {
    session.participant_id.ok_or_else(|| ErrorKind::NotInLesson.into())
}

fn lesson_scope(session: &Session) -> Result<LessonScope> {
    Ok(LessonScope::new(course_id(session)?, lesson_id(session)?))
}

fn object_scope(session: &Session) -> Result<ObjectScope> {
    Ok(ObjectScope::new(course_id(session)?, lesson_id(session)?))
}

/// Resolves the viewer/owner/project triple for a project-scoped handler and
/// gates on `need`. A participant always has full standing access to their
/// own project; [`crate::permission::PermissionEngine::check_perm`] only
/// arbitrates access to *someone else's* project.
async fn require_project_access(
    ctx: &Arc<AppContext>,
    session: &Session,
    owner_participant_id: i64,
    need: Permission,
) -> Result<(Participant, Participant, Project)> {
    let viewer_id = participant_id(session)?;
    let lesson_id = lesson_id(session)?;
    let viewer = ctx
        .metadata
        .get_participant(viewer_id)
        .await?
        .ok_or(ErrorKind::ParticipantNotFound)?;
    let owner = ctx
        .metadata
        .get_participant(owner_participant_id)
        .await?
        .ok_or(ErrorKind::ParticipantNotFound)?;
    let project = ctx
        .metadata
        .find_project(lesson_id, owner_participant_id)
        .await?
        .ok_or(ErrorKind::ProjectNotFound)?;
    if viewer_id != owner_participant_id && !ctx.permissions.check_perm(&viewer, &owner, project.id, need).await? {
        return Err(ErrorKind::ForbiddenProject.into());
    }
    Ok((viewer, owner, project))
}

/// Joins `sid` to `room_name`, mirroring the membership into its local
/// session and starting this instance's forwarder task for the room if it
/// wasn't already running. Evicted sids (over a capacity `limit`) have the
/// membership forgotten in their *own* instance's session store, if local;
/// eviction is cross-instance via the KV-backed room lattice regardless.
async fn join_room(ctx: &Arc<AppContext>, sid: &str, room_type: RoomType, room_name: &str, limit: Option<u32>) -> Result<()> {
    let evicted = ctx.rooms.enter(sid, room_name, limit).await?;
    ctx.forwarders.join(room_name).await;
    ctx.sessions.mutate(sid, |s| s.remember_room(room_type, room_name.to_string()));
    for evicted_sid in evicted {
        ctx.sessions.mutate(&evicted_sid, |s| s.forget_room(room_type, room_name));
    }
    Ok(())
}

/// Removes `sid` from `room_name`, the inverse of [`join_room`].
async fn leave_room(ctx: &Arc<AppContext>, sid: &str, room_type: RoomType, room_name: &str) -> Result<()> {
    ctx.rooms.exit(sid, room_name).await?;
    ctx.forwarders.leave(room_name);
    ctx.sessions.mutate(sid, |s| s.forget_room(room_type, room_name));
    Ok(())
}

fn role_name(role: crate::metastore::Role) -> &'static str {
    if role.is_teacher() {
        "TEACHER"
    } else {
        "STUDENT"
    }
}
