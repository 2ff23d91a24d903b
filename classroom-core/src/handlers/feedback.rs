//! `FEEDBACK_LIST`, `FEEDBACK_ADD`, `FEEDBACK_MOD`, `FEEDBACK_COMMENT`,
//! `FEEDBACK_COMMENT_MOD` (spec §4.M / §4.N).

use std::sync::Arc;

use classroom_protocol::events::feedback::{
    CommentView, FeedbackAdd, FeedbackComment, FeedbackCommentBroadcast, FeedbackCommentMod, FeedbackCommentModBroadcast,
    FeedbackListQuery, FeedbackMod, FeedbackModBroadcast, FeedbackView,
};
use classroom_protocol::events::names::{FEEDBACK_ADD, FEEDBACK_COMMENT, FEEDBACK_COMMENT_MOD, FEEDBACK_LIST, FEEDBACK_MOD};
use classroom_protocol::events::permissions::Permission;
use classroom_protocol::{ErrorKind, Frame};

use crate::context::AppContext;
use crate::dispatcher::Emitter;
use crate::error::Result;
use crate::rooms::RoomName;
use crate::session::Session;

use super::require_project_access;

/// `FEEDBACK_LIST{ownerId?,file?}`: the caller's full per-lesson roll-up,
/// optionally narrowed to one project owner and/or file (spec §4.N, spec
/// SPEC_FULL §8 Supplemented feature 3).
pub async fn feedback_list(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let query: FeedbackListQuery = frame.parse()?;
    let participant_id = super::participant_id(session)?;
    let lesson_id = super::lesson_id(session)?;
    let rollup = ctx.feedback.rollup(lesson_id, participant_id, query).await?;
    emitter.to_caller(FEEDBACK_LIST, rollup);
    Ok(())
}

/// `FEEDBACK_ADD{ref{ownerId,file,line},acl,comment}` (spec §4.N "Create"):
/// requires `READ` on the target project; fans the new thread out to every
/// ACL member's `PERSONAL_PTC` (the project owner is an implicit member).
pub async fn feedback_add(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FeedbackAdd = frame.parse()?;
    let (_, _, project) = require_project_access(ctx, session, req.code_ref.owner_id, Permission::READ).await?;
    let author_id = super::participant_id(session)?;

    let (feedback, comment, recipients) = ctx
        .feedback
        .create(
            project.id,
            req.code_ref.owner_id,
            author_id,
            &req.code_ref.file,
            &req.code_ref.line,
            req.acl,
            &req.comment,
        )
        .await?;

    let view = FeedbackView {
        id: feedback.id,
        owner_id: req.code_ref.owner_id,
        file: req.code_ref.file,
        line: req.code_ref.line,
        author_participant_id: feedback.author_participant_id,
        resolved: feedback.resolved,
        created_at: feedback.created_at,
        comments: vec![CommentView {
            id: comment.id,
            author_participant_id: comment.author_participant_id,
            content: comment.content,
            deleted: comment.deleted,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }],
    };

    emitter.to_caller(FEEDBACK_ADD, view.clone());
    let course_id = super::course_id(session)?;
    let lesson_id = super::lesson_id(session)?;
    for participant_id in recipients {
        let room = RoomName::personal_ptc(course_id, lesson_id, participant_id);
        emitter.to_room(&room, FEEDBACK_ADD, view.clone()).await?;
    }
    Ok(())
}

/// `FEEDBACK_MOD{feedbackId,acl?,resolved?}` (spec §4.N "Modify feedback"):
/// author-only; fans the post-change state out to every currently-valid ACL
/// member's `PERSONAL_PTC`, which is the union of survivors and newly-added
/// members (removed members are told too, so their client can drop the
/// thread from view).
pub async fn feedback_mod(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FeedbackMod = frame.parse()?;
    let caller_id = super::participant_id(session)?;
    let delta = ctx.feedback.modify(req.feedback_id, caller_id, req.acl, req.resolved).await?;

    let feedback = ctx
        .metadata
        .get_feedback(req.feedback_id)
        .await?
        .ok_or(ErrorKind::FeedbackNotFound)?;
    let payload = FeedbackModBroadcast {
        feedback_id: req.feedback_id,
        resolved: feedback.resolved,
        added: delta.added.clone(),
        removed: delta.removed.clone(),
    };

    emitter.to_caller(FEEDBACK_MOD, payload.clone());
    let course_id = super::course_id(session)?;
    let lesson_id = super::lesson_id(session)?;
    let viewers = ctx.metadata.list_feedback_viewers(req.feedback_id).await?;
    let mut recipients: Vec<i64> = viewers.into_iter().filter(|v| v.valid).map(|v| v.participant_id).collect();
    recipients.extend(delta.removed.iter().copied());
    recipients.sort_unstable();
    recipients.dedup();
    for participant_id in recipients {
        let room = RoomName::personal_ptc(course_id, lesson_id, participant_id);
        emitter.to_room(&room, FEEDBACK_MOD, payload.clone()).await?;
    }
    Ok(())
}

/// `FEEDBACK_COMMENT{feedbackId,content}` (spec §4.N "Create comment"): the
/// commenter must hold a valid ACL edge on the thread; broadcasts to every
/// other valid member's `PERSONAL_PTC`.
pub async fn feedback_comment(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FeedbackComment = frame.parse()?;
    let author_id = super::participant_id(session)?;
    let (comment, recipients) = ctx.feedback.add_comment(req.feedback_id, author_id, &req.content).await?;

    let view = CommentView {
        id: comment.id,
        author_participant_id: comment.author_participant_id,
        content: comment.content,
        deleted: comment.deleted,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
    };
    let payload = FeedbackCommentBroadcast { feedback_id: req.feedback_id, comment: view };

    emitter.to_caller(FEEDBACK_COMMENT, payload.clone());
    let course_id = super::course_id(session)?;
    let lesson_id = super::lesson_id(session)?;
    for participant_id in recipients {
        let room = RoomName::personal_ptc(course_id, lesson_id, participant_id);
        emitter.to_room(&room, FEEDBACK_COMMENT, payload.clone()).await?;
    }
    Ok(())
}

/// `FEEDBACK_COMMENT_MOD{commentId[,content,delete]}` (spec §4.N "Modify
/// comment"): author-only; `delete` wins if both a content edit and a
/// delete are requested.
pub async fn feedback_comment_mod(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FeedbackCommentMod = frame.parse()?;
    let caller_id = super::participant_id(session)?;
    let comment = ctx
        .feedback
        .modify_comment(req.comment_id, caller_id, req.content, req.delete)
        .await?;

    let view = CommentView {
        id: comment.id,
        author_participant_id: comment.author_participant_id,
        content: comment.content,
        deleted: comment.deleted,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
    };
    let payload = FeedbackCommentModBroadcast { feedback_id: comment.feedback_id, comment: view };

    emitter.to_caller(FEEDBACK_COMMENT_MOD, payload.clone());
    let course_id = super::course_id(session)?;
    let lesson_id = super::lesson_id(session)?;
    let viewers = ctx.metadata.list_feedback_viewers(comment.feedback_id).await?;
    for viewer in viewers.into_iter().filter(|v| v.valid) {
        let room = RoomName::personal_ptc(course_id, lesson_id, viewer.participant_id);
        emitter.to_room(&room, FEEDBACK_COMMENT_MOD, payload.clone()).await?;
    }
    Ok(())
}
