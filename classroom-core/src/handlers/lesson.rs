//! `INIT_LESSON`, `ALL_PARTICIPANT`, `ACTIVITY_PING` (spec §4.M).

use std::sync::Arc;

use classroom_protocol::events::lesson::{ActivityPing, InitLesson, InitLessonResponse};
use classroom_protocol::events::names::{ACTIVITY_PING, ALL_PARTICIPANT, INIT_LESSON, PARTICIPANT_STATUS};
use classroom_protocol::events::participants::{AllParticipantResponse, ParticipantStatus, ParticipantSummary};
use classroom_protocol::events::permissions::Permission;
use classroom_protocol::{ErrorKind, Frame};

use crate::context::AppContext;
use crate::dispatcher::Emitter;
use crate::error::Result;
use crate::rooms::{RoomName, RoomType};
use crate::session::Session;

use super::{join_room, role_name};

/// `INIT_LESSON` (spec §4.M "Connect to a lesson"): resolves or creates the
/// caller's project, applies the lesson template on first entry, binds the
/// session, enters the lesson/personal/self-subscription rooms, and
/// auto-subscribes to every other participant the caller can currently
/// `READ` (spec §8 E2E scenario 2 "join lesson sees the roster they already
/// have standing access to").
pub async fn init_lesson(
    ctx: &Arc<AppContext>,
    sid: &str,
    session: &Session,
    frame: &Frame,
    emitter: &Emitter<'_>,
) -> Result<()> {
    let req: InitLesson = frame.parse()?;
    let user_id = session.user_id().ok_or(ErrorKind::AuthFailed)?;

    let lesson = ctx
        .metadata
        .get_lesson(req.course_id, req.lesson_id)
        .await?
        .ok_or(ErrorKind::AccessCourseFail)?;
    let participant = ctx
        .metadata
        .find_participant(req.course_id, user_id)
        .await?
        .ok_or(ErrorKind::AccessCourseFail)?;

    let project = ctx.metadata.find_or_create_project(lesson.id, participant.id).await?;
    if !project.template_applied {
        let lesson_scope = crate::keys::LessonScope::new(req.course_id, req.lesson_id);
        let object_scope = crate::keys::ObjectScope::new(req.course_id, req.lesson_id);
        ctx.templates
            .apply(lesson_scope, object_scope, lesson.template_archive_key.as_deref(), participant.id)
            .await?;
        ctx.metadata.mark_template_applied(project.id).await?;
    }
    ctx.metadata.set_participant_active(participant.id, true).await?;

    ctx.sessions.mutate(sid, |s| {
        s.course_id = Some(req.course_id);
        s.lesson_id = Some(req.lesson_id);
        s.participant_id = Some(participant.id);
        s.nickname = Some(participant.nickname.clone());
    });

    let lesson_room = RoomName::lesson(req.course_id, req.lesson_id);
    join_room(ctx, sid, RoomType::Lesson, &lesson_room, None).await?;
    join_room(
        ctx,
        sid,
        RoomType::PersonalPtc,
        &RoomName::personal_ptc(req.course_id, req.lesson_id, participant.id),
        None,
    )
    .await?;
    join_room(
        ctx,
        sid,
        RoomType::SubsPtc,
        &RoomName::subs_ptc(req.course_id, req.lesson_id, participant.id),
        None,
    )
    .await?;

    let roster = ctx.metadata.list_course_participants(req.course_id).await?;
    for other in roster.iter().filter(|p| p.id != participant.id) {
        let Some(other_project) = ctx.metadata.find_project(lesson.id, other.id).await? else {
            continue;
        };
        if ctx
            .permissions
            .check_perm(&participant, other, other_project.id, Permission::READ)
            .await?
        {
            let room = RoomName::subs_ptc(req.course_id, req.lesson_id, other.id);
            join_room(ctx, sid, RoomType::SubsPtc, &room, None).await?;
        }
    }

    emitter.to_caller(
        INIT_LESSON,
        InitLessonResponse {
            participant_id: participant.id,
            nickname: participant.nickname.clone(),
            role: role_name(participant.role).to_string(),
        },
    );
    emitter
        .to_room(
            &lesson_room,
            PARTICIPANT_STATUS,
            ParticipantStatus { id: participant.id, active: true },
        )
        .await?;
    Ok(())
}

/// `ALL_PARTICIPANT`: the course roster decorated with each participant's
/// project `recentActivityAt`, memoized for a short window since this is a
/// full-roster scan (spec §4.F "memoize" grounding).
pub async fn all_participant(ctx: &Arc<AppContext>, session: &Session, emitter: &Emitter<'_>) -> Result<()> {
    let course_id = super::course_id(session)?;
    let lesson_id = super::lesson_id(session)?;

    let ctx_for_compute = ctx.clone();
    let response = ctx
        .cache
        .memoize(&format!("course:{course_id}:lesson:{lesson_id}"), "all_participant", "", Some(5), move || async move {
            let roster = ctx_for_compute.metadata.list_course_participants(course_id).await?;
            let mut participants = Vec::with_capacity(roster.len());
            for p in roster {
                let project = ctx_for_compute.metadata.find_project(lesson_id, p.id).await?;
                participants.push(ParticipantSummary {
                    participant_id: p.id,
                    nickname: p.nickname,
                    role: role_name(p.role).to_string(),
                    active: p.active,
                    recent_activity_at: project.map(|pr| pr.recent_activity_at),
                });
            }
            Ok(AllParticipantResponse { participants })
        })
        .await?;

    emitter.to_caller(ALL_PARTICIPANT, response);
    Ok(())
}

/// `ACTIVITY_PING` (spec SPEC_FULL §8 Supplemented feature 1): bumps the
/// target project's `recentActivityAt`, requiring `READ` when pinging on
/// someone else's behalf, and flips `active` + broadcasts `PARTICIPANT_STATUS`
/// if the target had gone idle.
pub async fn activity_ping(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: ActivityPing = frame.parse()?;
    let caller_id = super::participant_id(session)?;
    let lesson_id = super::lesson_id(session)?;
    let course_id = super::course_id(session)?;
    let target_id = req.target_ptc_id.unwrap_or(caller_id);

    let project = if target_id == caller_id {
        ctx.metadata.find_project(lesson_id, target_id).await?.ok_or(ErrorKind::ProjectNotFound)?
    } else {
        let (_, _, project) = super::require_project_access(ctx, session, target_id, Permission::READ).await?;
        project
    };
    ctx.metadata.touch_project_activity(project.id, chrono::Utc::now()).await?;
    emitter.to_caller(ACTIVITY_PING, serde_json::json!({}));

    let target = ctx.metadata.get_participant(target_id).await?.ok_or(ErrorKind::ParticipantNotFound)?;
    if !target.active {
        ctx.metadata.set_participant_active(target_id, true).await?;
        let room = RoomName::lesson(course_id, lesson_id);
        emitter
            .to_room(&room, PARTICIPANT_STATUS, ParticipantStatus { id: target_id, active: true })
            .await?;
    }
    Ok(())
}
