//! `SUBS_PARTICIPANT_LIST`, `SUBS_PARTICIPANT`, `UNSUBS_PARTICIPANT` (spec §4.M).

use std::sync::Arc;

use classroom_protocol::events::names::{SUBS_PARTICIPANT, SUBS_PARTICIPANT_LIST, UNSUBS_PARTICIPANT};
use classroom_protocol::events::participants::{FailedTarget, SubscriptionList, SubscriptionResult, TargetList};
use classroom_protocol::events::permissions::Permission;
use classroom_protocol::{ErrorKind, Frame};

use crate::context::AppContext;
use crate::dispatcher::Emitter;
use crate::error::{ClassroomError, Result};
use crate::metastore::Participant;
use crate::rooms::{RoomName, RoomType};
use crate::session::Session;

use super::{join_room, leave_room};

/// `SUBS_PARTICIPANT_LIST`: the caller's current subscription set, read
/// straight from its local room mirror (spec SPEC_FULL §8 Supplemented
/// feature 2) — no remote lookup needed.
pub fn subs_participant_list(session: &Session, emitter: &Emitter<'_>) -> Result<()> {
    emitter.to_caller(
        SUBS_PARTICIPANT_LIST,
        SubscriptionList { target: session.subscribed_participant_ids() },
    );
    Ok(())
}

/// `SUBS_PARTICIPANT{target:[id]}`: joins `SUBS_PTC(id)` for every target the
/// caller currently holds `READ` on, reporting per-id success/failure rather
/// than failing the whole batch.
pub async fn subs_participant(ctx: &Arc<AppContext>, sid: &str, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: TargetList = frame.parse()?;
    let viewer_id = super::participant_id(session)?;
    let course_id = super::course_id(session)?;
    let lesson_id = super::lesson_id(session)?;
    let viewer = ctx.metadata.get_participant(viewer_id).await?.ok_or(ErrorKind::ParticipantNotFound)?;

    let mut success_id = Vec::new();
    let mut failed = Vec::new();
    for target_id in req.target {
        match try_subscribe(ctx, sid, course_id, lesson_id, &viewer, target_id).await {
            Ok(()) => success_id.push(target_id),
            Err(err) => failed.push(FailedTarget { id: target_id, reason: err.as_wire_kind().to_string() }),
        }
    }
    emitter.to_caller(SUBS_PARTICIPANT, SubscriptionResult { success_id, failed });
    Ok(())
}

async fn try_subscribe(
    ctx: &Arc<AppContext>,
    sid: &str,
    course_id: i64,
    lesson_id: i64,
    viewer: &Participant,
    target_id: i64,
) -> Result<()> {
    let target = ctx.metadata.get_participant(target_id).await?.ok_or(ErrorKind::ParticipantNotFound)?;
    let project = ctx.metadata.find_project(lesson_id, target_id).await?.ok_or(ErrorKind::ProjectNotFound)?;
    if !ctx.permissions.check_perm(viewer, &target, project.id, Permission::READ).await? {
        return Err(ClassroomError::from(ErrorKind::ForbiddenProject));
    }
    let room = RoomName::subs_ptc(course_id, lesson_id, target_id);
    join_room(ctx, sid, RoomType::SubsPtc, &room, None).await
}

/// `UNSUBS_PARTICIPANT{target:[id]}`: leaves `SUBS_PTC(id)` for each target.
pub async fn unsubs_participant(ctx: &Arc<AppContext>, sid: &str, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: TargetList = frame.parse()?;
    let course_id = super::course_id(session)?;
    let lesson_id = super::lesson_id(session)?;

    let mut success_id = Vec::new();
    let mut failed = Vec::new();
    for target_id in req.target {
        match ctx.metadata.get_participant(target_id).await? {
            None => failed.push(FailedTarget { id: target_id, reason: ErrorKind::ParticipantNotFound.to_string() }),
            Some(_) => {
                let room = RoomName::subs_ptc(course_id, lesson_id, target_id);
                leave_room(ctx, sid, RoomType::SubsPtc, &room).await?;
                success_id.push(target_id);
            }
        }
    }
    emitter.to_caller(UNSUBS_PARTICIPANT, SubscriptionResult { success_id, failed });
    Ok(())
}
