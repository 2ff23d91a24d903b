//! Component N — feedback threads and comments over code locations.
//!
//! Authorization against the *project* a thread is attached to (the
//! `checkPerm(caller, owner, READ)` gate spec §4.N opens with) is the
//! dispatcher's job (component L), since it is identical in shape to every
//! other project-scoped handler; this module owns only the thread/comment
//! lifecycle and ACL bookkeeping once that gate has passed.

use std::collections::HashSet;
use std::sync::Arc;

use classroom_protocol::events::feedback::{CommentView, FeedbackListQuery, FeedbackRollup, FeedbackView};
use classroom_protocol::ErrorKind;

use crate::error::Result;
use crate::metastore::{Comment, Feedback, MetadataStore};

/// The ACL delta produced by a [`FeedbackEngine::modify`] call.
#[derive(Debug, Clone, Default)]
pub struct FeedbackAclDelta {
    /// Participant ids newly granted visibility.
    pub added: Vec<i64>,
    /// Participant ids whose visibility was revoked.
    pub removed: Vec<i64>,
}

/// Creates/modifies feedback threads and comments (component N).
pub struct FeedbackEngine {
    metadata: Arc<dyn MetadataStore>,
}

impl FeedbackEngine {
    /// Builds a feedback engine over the durable relational store.
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// `FEEDBACK_ADD` (spec §4.N "Create"). Returns the new thread, its
    /// first comment, and the full recipient set (`{ownerId} ∪ acl`,
    /// deduplicated) to fan out to.
    pub async fn create(
        &self,
        project_id: i64,
        owner_participant_id: i64,
        author_participant_id: i64,
        file: &str,
        line: &str,
        acl: Vec<i64>,
        comment: &str,
    ) -> Result<(Feedback, Comment, Vec<i64>)> {
        let code_ref = self.metadata.find_or_create_code_reference(project_id, file, line).await?;
        let (feedback, comment) = self
            .metadata
            .create_feedback(code_ref.id, author_participant_id, comment)
            .await?;

        let mut recipients: Vec<i64> = acl;
        recipients.push(owner_participant_id);
        recipients.sort_unstable();
        recipients.dedup();
        for &participant_id in &recipients {
            self.metadata.upsert_feedback_viewer(feedback.id, participant_id).await?;
        }
        Ok((feedback, comment, recipients))
    }

    /// `FEEDBACK_MOD` (spec §4.N "Modify feedback"). Author-only; computes
    /// the ACL set delta against the current valid viewers and toggles
    /// `resolved` if it changed.
    pub async fn modify(
        &self,
        feedback_id: i64,
        caller_participant_id: i64,
        new_acl: Option<Vec<i64>>,
        resolved: Option<bool>,
    ) -> Result<FeedbackAclDelta> {
        let feedback = self
            .metadata
            .get_feedback(feedback_id)
            .await?
            .ok_or(ErrorKind::FeedbackNotFound)?;
        if feedback.author_participant_id != caller_participant_id {
            return Err(ErrorKind::FeedbackNotAuth.into());
        }

        let mut delta = FeedbackAclDelta::default();
        if let Some(new_acl) = new_acl {
            let current = self.metadata.list_feedback_viewers(feedback_id).await?;
            let current_valid: HashSet<i64> = current.iter().filter(|v| v.valid).map(|v| v.participant_id).collect();
            let desired: HashSet<i64> = new_acl.into_iter().collect();

            for &participant_id in desired.difference(&current_valid) {
                self.metadata.upsert_feedback_viewer(feedback_id, participant_id).await?;
                delta.added.push(participant_id);
            }
            for &participant_id in current_valid.difference(&desired) {
                self.metadata.invalidate_feedback_viewer(feedback_id, participant_id).await?;
                delta.removed.push(participant_id);
            }
        }

        if let Some(resolved) = resolved {
            if resolved != feedback.resolved {
                self.metadata.set_feedback_resolved(feedback_id, resolved).await?;
            }
        }
        Ok(delta)
    }

    /// `FEEDBACK_COMMENT` (spec §4.N "Create comment"). The commenter must
    /// hold a valid [`crate::metastore::FeedbackViewer`] row. Returns the new
    /// comment and the thread's current valid-viewer set to fan out to.
    pub async fn add_comment(&self, feedback_id: i64, author_participant_id: i64, content: &str) -> Result<(Comment, Vec<i64>)> {
        let viewers = self.metadata.list_feedback_viewers(feedback_id).await?;
        if !viewers
            .iter()
            .any(|v| v.valid && v.participant_id == author_participant_id)
        {
            return Err(ErrorKind::FeedbackNotAuth.into());
        }
        let comment = self.metadata.add_comment(feedback_id, author_participant_id, content).await?;
        let recipients = viewers.into_iter().filter(|v| v.valid).map(|v| v.participant_id).collect();
        Ok((comment, recipients))
    }

    /// `FEEDBACK_COMMENT_MOD` (spec §4.N "Modify comment"). Author-only;
    /// supports a content edit or a soft-delete, never both in one call
    /// (`delete` wins if both are set).
    pub async fn modify_comment(
        &self,
        comment_id: i64,
        caller_participant_id: i64,
        content: Option<String>,
        delete: bool,
    ) -> Result<Comment> {
        let comment = self
            .metadata
            .get_comment(comment_id)
            .await?
            .ok_or(ErrorKind::FeedbackNotFound)?;
        if comment.author_participant_id != caller_participant_id {
            return Err(ErrorKind::FeedbackNotAuth.into());
        }
        if delete {
            self.metadata.delete_comment(comment_id).await?;
        } else if let Some(content) = content {
            self.metadata.edit_comment(comment_id, &content).await?;
        }
        self.metadata
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| ErrorKind::FeedbackNotFound.into())
    }

    /// `FEEDBACK_LIST` (spec SPEC_FULL §8 Supplemented feature 3): the
    /// full per-lesson roll-up visible to `participant_id`, optionally
    /// narrowed to one project owner and/or file, most recent thread first.
    pub async fn rollup(&self, lesson_id: i64, participant_id: i64, query: FeedbackListQuery) -> Result<FeedbackRollup> {
        let threads = self.metadata.list_lesson_feedback_for(lesson_id, participant_id).await?;
        let mut views: Vec<FeedbackView> = threads
            .into_iter()
            .filter(|t| query.owner_id.is_none_or(|owner_id| t.owner_participant_id == owner_id))
            .filter(|t| query.file.as_deref().is_none_or(|file| t.code_ref.file == file))
            .map(|t| FeedbackView {
                id: t.feedback.id,
                owner_id: t.owner_participant_id,
                file: t.code_ref.file,
                line: t.code_ref.line,
                author_participant_id: t.feedback.author_participant_id,
                resolved: t.feedback.resolved,
                created_at: t.feedback.created_at,
                comments: t
                    .comments
                    .into_iter()
                    .map(|c| CommentView {
                        id: c.id,
                        author_participant_id: c.author_participant_id,
                        content: c.content,
                        deleted: c.deleted,
                        created_at: c.created_at,
                        updated_at: c.updated_at,
                    })
                    .collect(),
            })
            .collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(FeedbackRollup { feedback: views })
    }
}
