//! Component D — typed access to the durable relational store.
//!
//! Participants, projects, viewer ACLs, code references, feedback, and
//! comments all live here. `classroom-core` never issues raw SQL outside
//! this module; every other component reaches the metadata store only
//! through [`MetadataStore`].

mod postgres;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
pub use postgres::PostgresMetadataStore;
pub use types::*;

/// Typed access to participants, projects, viewer ACLs, code references,
/// feedback, and comments (component D).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Looks up a participant by `(course_id, user_id)`.
    async fn find_participant(
        &self,
        course_id: i64,
        user_id: i64,
    ) -> Result<Option<Participant>>;

    /// Looks up a participant by id.
    async fn get_participant(&self, participant_id: i64) -> Result<Option<Participant>>;

    /// Lists every participant in a course (used by `ALL_PARTICIPANT`).
    async fn list_course_participants(&self, course_id: i64) -> Result<Vec<Participant>>;

    /// Sets a participant's `active` flag.
    async fn set_participant_active(&self, participant_id: i64, active: bool) -> Result<()>;

    /// Bumps a participant's project `recentActivityAt` to `now`.
    async fn touch_project_activity(
        &self,
        project_id: i64,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()>;

    /// Looks up the lesson a course/lesson pair resolves to.
    async fn get_lesson(&self, course_id: i64, lesson_id: i64) -> Result<Option<Lesson>>;

    /// Looks up a participant's project for a lesson. `None` if never created.
    async fn find_project(
        &self,
        lesson_id: i64,
        participant_id: i64,
    ) -> Result<Option<Project>>;

    /// Creates a project row for a participant's first lesson entry.
    /// `find_or_create` semantics: if a concurrent caller already created
    /// one, returns the existing row rather than erroring (spec §9
    /// "Lazy project creation race").
    async fn find_or_create_project(
        &self,
        lesson_id: i64,
        participant_id: i64,
    ) -> Result<Project>;

    /// Marks a project's template as applied. No-op if already set.
    async fn mark_template_applied(&self, project_id: i64) -> Result<()>;

    /// Reads the ACL edge from `viewer` to `target_project`, if one exists.
    async fn get_viewer_permission(
        &self,
        target_project_id: i64,
        viewer_participant_id: i64,
    ) -> Result<Option<ProjectViewer>>;

    /// Lists every ACL edge granted *on* a project (who can access it).
    async fn list_project_viewers(&self, target_project_id: i64) -> Result<Vec<ProjectViewer>>;

    /// Lists every ACL edge a participant holds as a viewer (what they can access).
    async fn list_viewer_grants(&self, viewer_participant_id: i64) -> Result<Vec<ProjectViewer>>;

    /// Upserts the ACL edge `(target_project_id, viewer_participant_id)` to `permission`.
    async fn set_viewer_permission(
        &self,
        target_project_id: i64,
        viewer_participant_id: i64,
        permission: u8,
    ) -> Result<()>;

    /// Finds an existing code reference or creates one.
    async fn find_or_create_code_reference(
        &self,
        project_id: i64,
        file: &str,
        line: &str,
    ) -> Result<CodeReference>;

    /// Rewrites code references under a renamed file or directory prefix.
    async fn rewrite_code_reference_paths(
        &self,
        project_id: i64,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<()>;

    /// Marks every code reference at or under `path_prefix` as deleted.
    async fn mark_code_references_deleted(
        &self,
        project_id: i64,
        path_prefix: &str,
    ) -> Result<()>;

    /// Inserts a feedback thread and its first comment, returning both rows.
    async fn create_feedback(
        &self,
        code_ref_id: i64,
        author_participant_id: i64,
        first_comment: &str,
    ) -> Result<(Feedback, Comment)>;

    /// Reads one feedback thread.
    async fn get_feedback(&self, feedback_id: i64) -> Result<Option<Feedback>>;

    /// Toggles a feedback thread's `resolved` flag.
    async fn set_feedback_resolved(&self, feedback_id: i64, resolved: bool) -> Result<()>;

    /// Lists a feedback thread's ACL.
    async fn list_feedback_viewers(&self, feedback_id: i64) -> Result<Vec<FeedbackViewer>>;

    /// Upserts (or revalidates) a feedback viewer edge.
    async fn upsert_feedback_viewer(&self, feedback_id: i64, participant_id: i64) -> Result<()>;

    /// Invalidates a feedback viewer edge (`valid = false`) without deleting it.
    async fn invalidate_feedback_viewer(&self, feedback_id: i64, participant_id: i64) -> Result<()>;

    /// Inserts a comment on a feedback thread.
    async fn add_comment(
        &self,
        feedback_id: i64,
        author_participant_id: i64,
        content: &str,
    ) -> Result<Comment>;

    /// Edits a comment's content, bumping `updatedAt`.
    async fn edit_comment(&self, comment_id: i64, content: &str) -> Result<()>;

    /// Soft-deletes a comment.
    async fn delete_comment(&self, comment_id: i64) -> Result<()>;

    /// Looks up a single comment.
    async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>>;

    /// Lists every feedback thread (with comments) visible to a participant
    /// in a lesson, for the `FEEDBACK_LIST` roll-up.
    async fn list_lesson_feedback_for(
        &self,
        lesson_id: i64,
        participant_id: i64,
    ) -> Result<Vec<FeedbackThread>>;
}
