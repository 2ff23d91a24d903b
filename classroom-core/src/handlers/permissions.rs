//! `PROJECT_PERM`, `PROJECT_ACCESSIBLE` (spec §4.M / §4.I).

use std::sync::Arc;

use classroom_protocol::events::names::{PROJECT_ACCESSIBLE, PROJECT_PERM, PROJECT_PERM_CHANGED};
use classroom_protocol::events::permissions::{ProjectPermChanged, ProjectPermEntry};
use classroom_protocol::{ErrorKind, Frame};

use crate::context::AppContext;
use crate::dispatcher::Emitter;
use crate::error::Result;
use crate::rooms::{RoomName, RoomType};
use crate::session::Session;

use super::leave_room;

/// `PROJECT_ACCESSIBLE`: the caller's own display view of who can reach
/// their project and whose projects they can reach (spec §4.I).
pub async fn project_accessible(ctx: &Arc<AppContext>, session: &Session, emitter: &Emitter<'_>) -> Result<()> {
    let course_id = super::course_id(session)?;
    let lesson_id = super::lesson_id(session)?;
    let caller_id = super::participant_id(session)?;
    let caller = ctx.metadata.get_participant(caller_id).await?.ok_or(ErrorKind::ParticipantNotFound)?;
    let project = ctx
        .metadata
        .find_project(lesson_id, caller_id)
        .await?
        .ok_or(ErrorKind::ProjectNotFound)?;

    let accessible = ctx.permissions.project_accessible(course_id, lesson_id, &caller, project.id).await?;
    emitter.to_caller(PROJECT_ACCESSIBLE, accessible);
    Ok(())
}

/// `PROJECT_PERM{target:[...]}`: the project owner grants/revokes RWX bits on
/// their own project. A `READ` revocation forces every locally-mirrored
/// session the affected viewer holds out of `SUBS_PTC(ownerId)` (spec §8
/// E2E scenario 3 "READ revocation forces exit"); every affected viewer
/// hears about their new bits over their own `PERSONAL_PTC` room.
pub async fn project_perm(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let entries: Vec<ProjectPermEntry> = frame.parse()?;
    let owner_id = super::participant_id(session)?;
    let course_id = super::course_id(session)?;
    let lesson_id = super::lesson_id(session)?;
    let owner = ctx.metadata.get_participant(owner_id).await?.ok_or(ErrorKind::ParticipantNotFound)?;
    let project = ctx
        .metadata
        .find_project(lesson_id, owner_id)
        .await?
        .ok_or(ErrorKind::ProjectNotFound)?;

    let mut applied = Vec::new();
    for entry in entries {
        let Some(change) = ctx
            .permissions
            .modify_perm(&owner, project.id, entry.target_id, entry.permission)
            .await?
        else {
            continue;
        };

        if change.removed.contains(classroom_protocol::events::permissions::Permission::READ) {
            let subs_room = RoomName::subs_ptc(course_id, lesson_id, owner_id);
            let personal_room = RoomName::personal_ptc(course_id, lesson_id, entry.target_id);
            for target_sid in ctx.rooms.members(&personal_room).await? {
                leave_room(ctx, &target_sid, RoomType::SubsPtc, &subs_room).await?;
            }
        }

        let changed = ProjectPermChanged {
            user_id: entry.target_id,
            target_id: owner_id,
            permission: change.new,
            added: change.added,
            removed: change.removed,
        };
        let personal_room = RoomName::personal_ptc(course_id, lesson_id, entry.target_id);
        emitter.to_room(&personal_room, PROJECT_PERM_CHANGED, changed.clone()).await?;
        applied.push(changed);
    }

    emitter.to_caller(PROJECT_PERM, applied);
    Ok(())
}
