//! [`super::MetadataStore`] backed by Postgres via `sqlx`.
//!
//! Row shapes mirror the original's SQLAlchemy models
//! (`server/models/course.py`, `server/models/feedback.py`) one table per
//! struct; `sqlx::FromRow` intermediate rows keep the public domain types in
//! [`super::types`] free of any database-specific trait bounds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use classroom_protocol::events::permissions::Permission;
use sqlx::{FromRow, PgPool};

use super::types::{
    CodeReference, Comment, Feedback, FeedbackThread, FeedbackViewer, Lesson, Participant,
    Project, ProjectViewer, Role,
};
use super::MetadataStore;
use crate::error::{ClassroomError, Result};

fn infra(err: sqlx::Error) -> ClassroomError {
    ClassroomError::MetadataStore(Box::new(err))
}

fn role_from_str(role: &str) -> Role {
    match role {
        "teacher" => Role::Teacher,
        _ => Role::Student,
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Teacher => "teacher",
        Role::Student => "student",
    }
}

#[derive(FromRow)]
struct ParticipantRow {
    id: i64,
    course_id: i64,
    user_id: i64,
    role: String,
    nickname: String,
    active: bool,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Participant {
            id: row.id,
            course_id: row.course_id,
            user_id: row.user_id,
            role: role_from_str(&row.role),
            nickname: row.nickname,
            active: row.active,
        }
    }
}

#[derive(FromRow)]
struct LessonRow {
    id: i64,
    course_id: i64,
    template_archive_key: Option<String>,
}

impl From<LessonRow> for Lesson {
    fn from(row: LessonRow) -> Self {
        Lesson {
            id: row.id,
            course_id: row.course_id,
            template_archive_key: row.template_archive_key,
        }
    }
}

#[derive(FromRow)]
struct ProjectRow {
    id: i64,
    lesson_id: i64,
    participant_id: i64,
    recent_activity_at: DateTime<Utc>,
    active: bool,
    template_applied: bool,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            lesson_id: row.lesson_id,
            participant_id: row.participant_id,
            recent_activity_at: row.recent_activity_at,
            active: row.active,
            template_applied: row.template_applied,
        }
    }
}

#[derive(FromRow)]
struct ProjectViewerRow {
    project_id: i64,
    viewer_id: i64,
    permission: i32,
}

impl From<ProjectViewerRow> for ProjectViewer {
    fn from(row: ProjectViewerRow) -> Self {
        ProjectViewer {
            target_project_id: row.project_id,
            viewer_participant_id: row.viewer_id,
            permission: Permission(row.permission as u8).normalized(),
        }
    }
}

#[derive(FromRow)]
struct CodeReferenceRow {
    id: i64,
    project_id: i64,
    file: String,
    line: String,
    deleted: bool,
}

impl From<CodeReferenceRow> for CodeReference {
    fn from(row: CodeReferenceRow) -> Self {
        CodeReference {
            id: row.id,
            project_id: row.project_id,
            file: row.file,
            line: row.line,
            deleted: row.deleted,
        }
    }
}

#[derive(FromRow)]
struct FeedbackRow {
    id: i64,
    code_ref_id: i64,
    participant_id: i64,
    resolved: bool,
    created_at: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Feedback {
            id: row.id,
            code_ref_id: row.code_ref_id,
            author_participant_id: row.participant_id,
            resolved: row.resolved,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct FeedbackViewerRow {
    feedback_id: i64,
    participant_id: i64,
    valid: bool,
}

impl From<FeedbackViewerRow> for FeedbackViewer {
    fn from(row: FeedbackViewerRow) -> Self {
        FeedbackViewer {
            feedback_id: row.feedback_id,
            participant_id: row.participant_id,
            valid: row.valid,
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: i64,
    feedback_id: i64,
    participant_id: i64,
    content: String,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            feedback_id: row.feedback_id,
            author_participant_id: row.participant_id,
            content: row.content,
            deleted: row.deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A [`MetadataStore`] backed by a `sqlx::PgPool`.
pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl PostgresMetadataStore {
    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await.map_err(infra)?;
        Ok(Self { pool })
    }

    /// Wraps an already-constructed pool (used by `classroom-server` when the
    /// pool is shared with other process concerns, e.g. a migration runner).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn find_participant(&self, course_id: i64, user_id: i64) -> Result<Option<Participant>> {
        let row: Option<ParticipantRow> = sqlx::query_as(
            "SELECT id, course_id, user_id, role, nickname, active FROM participants \
             WHERE course_id = $1 AND user_id = $2",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.map(Into::into))
    }

    async fn get_participant(&self, participant_id: i64) -> Result<Option<Participant>> {
        let row: Option<ParticipantRow> = sqlx::query_as(
            "SELECT id, course_id, user_id, role, nickname, active FROM participants WHERE id = $1",
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.map(Into::into))
    }

    async fn list_course_participants(&self, course_id: i64) -> Result<Vec<Participant>> {
        let rows: Vec<ParticipantRow> = sqlx::query_as(
            "SELECT id, course_id, user_id, role, nickname, active FROM participants \
             WHERE course_id = $1 ORDER BY id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infra)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_participant_active(&self, participant_id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE participants SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(participant_id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    async fn touch_project_activity(&self, project_id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE user_projects SET recent_activity_at = $1 WHERE id = $2")
            .bind(now)
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    async fn get_lesson(&self, course_id: i64, lesson_id: i64) -> Result<Option<Lesson>> {
        let row: Option<LessonRow> = sqlx::query_as(
            "SELECT id, course_id, template_archive_key FROM lessons \
             WHERE id = $1 AND course_id = $2",
        )
        .bind(lesson_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.map(Into::into))
    }

    async fn find_project(&self, lesson_id: i64, participant_id: i64) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            "SELECT id, lesson_id, participant_id, recent_activity_at, active, template_applied \
             FROM user_projects WHERE lesson_id = $1 AND participant_id = $2",
        )
        .bind(lesson_id)
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.map(Into::into))
    }

    async fn find_or_create_project(&self, lesson_id: i64, participant_id: i64) -> Result<Project> {
        // Idempotent upsert against the (lesson_id, participant_id) unique
        // constraint; two tabs racing to enter the same lesson both land
        // here, and only one insert wins (spec SPEC_FULL §8 "Lesson-scoped
        // project lazy creation race").
        let row: ProjectRow = sqlx::query_as(
            "INSERT INTO user_projects (lesson_id, participant_id, recent_activity_at, active, template_applied) \
             VALUES ($1, $2, now(), false, false) \
             ON CONFLICT (lesson_id, participant_id) DO UPDATE SET lesson_id = EXCLUDED.lesson_id \
             RETURNING id, lesson_id, participant_id, recent_activity_at, active, template_applied",
        )
        .bind(lesson_id)
        .bind(participant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.into())
    }

    async fn mark_template_applied(&self, project_id: i64) -> Result<()> {
        sqlx::query("UPDATE user_projects SET template_applied = true WHERE id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    async fn get_viewer_permission(
        &self,
        target_project_id: i64,
        viewer_participant_id: i64,
    ) -> Result<Option<ProjectViewer>> {
        let row: Option<ProjectViewerRow> = sqlx::query_as(
            "SELECT project_id, viewer_id, permission FROM project_viewers \
             WHERE project_id = $1 AND viewer_id = $2",
        )
        .bind(target_project_id)
        .bind(viewer_participant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.map(Into::into))
    }

    async fn list_project_viewers(&self, target_project_id: i64) -> Result<Vec<ProjectViewer>> {
        let rows: Vec<ProjectViewerRow> = sqlx::query_as(
            "SELECT project_id, viewer_id, permission FROM project_viewers WHERE project_id = $1",
        )
        .bind(target_project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infra)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_viewer_grants(&self, viewer_participant_id: i64) -> Result<Vec<ProjectViewer>> {
        let rows: Vec<ProjectViewerRow> = sqlx::query_as(
            "SELECT project_id, viewer_id, permission FROM project_viewers WHERE viewer_id = $1",
        )
        .bind(viewer_participant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infra)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_viewer_permission(
        &self,
        target_project_id: i64,
        viewer_participant_id: i64,
        permission: u8,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO project_viewers (project_id, viewer_id, permission) VALUES ($1, $2, $3) \
             ON CONFLICT (project_id, viewer_id) DO UPDATE SET permission = EXCLUDED.permission",
        )
        .bind(target_project_id)
        .bind(viewer_participant_id)
        .bind(permission as i32)
        .execute(&self.pool)
        .await
        .map_err(infra)?;
        Ok(())
    }

    async fn find_or_create_code_reference(
        &self,
        project_id: i64,
        file: &str,
        line: &str,
    ) -> Result<CodeReference> {
        if let Some(existing) = self.find_code_reference(project_id, file, line).await? {
            return Ok(existing);
        }
        let row: CodeReferenceRow = sqlx::query_as(
            "INSERT INTO code_references (project_id, file, line, deleted) VALUES ($1, $2, $3, false) \
             RETURNING id, project_id, file, line, deleted",
        )
        .bind(project_id)
        .bind(file)
        .bind(line)
        .fetch_one(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.into())
    }

    async fn rewrite_code_reference_paths(
        &self,
        project_id: i64,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<()> {
        // Rewrites both an exact match (file rename) and a directory prefix
        // match (directory rename), mirroring the dir-mark path family.
        sqlx::query(
            "UPDATE code_references SET file = $3 || substr(file, length($2) + 1) \
             WHERE project_id = $1 AND (file = $2 OR file LIKE $2 || '/%')",
        )
        .bind(project_id)
        .bind(old_prefix)
        .bind(new_prefix)
        .execute(&self.pool)
        .await
        .map_err(infra)?;
        Ok(())
    }

    async fn mark_code_references_deleted(&self, project_id: i64, path_prefix: &str) -> Result<()> {
        sqlx::query(
            "UPDATE code_references SET deleted = true \
             WHERE project_id = $1 AND (file = $2 OR file LIKE $2 || '/%')",
        )
        .bind(project_id)
        .bind(path_prefix)
        .execute(&self.pool)
        .await
        .map_err(infra)?;
        Ok(())
    }

    async fn create_feedback(
        &self,
        code_ref_id: i64,
        author_participant_id: i64,
        first_comment: &str,
    ) -> Result<(Feedback, Comment)> {
        let mut tx = self.pool.begin().await.map_err(infra)?;
        let feedback_row: FeedbackRow = sqlx::query_as(
            "INSERT INTO feedbacks (code_ref_id, participant_id, resolved, created_at) \
             VALUES ($1, $2, false, now()) RETURNING id, code_ref_id, participant_id, resolved, created_at",
        )
        .bind(code_ref_id)
        .bind(author_participant_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(infra)?;

        let comment_row: CommentRow = sqlx::query_as(
            "INSERT INTO comments (feedback_id, participant_id, content, deleted, created_at, updated_at) \
             VALUES ($1, $2, $3, false, now(), now()) \
             RETURNING id, feedback_id, participant_id, content, deleted, created_at, updated_at",
        )
        .bind(feedback_row.id)
        .bind(author_participant_id)
        .bind(first_comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(infra)?;

        tx.commit().await.map_err(infra)?;
        Ok((feedback_row.into(), comment_row.into()))
    }

    async fn get_feedback(&self, feedback_id: i64) -> Result<Option<Feedback>> {
        let row: Option<FeedbackRow> = sqlx::query_as(
            "SELECT id, code_ref_id, participant_id, resolved, created_at FROM feedbacks WHERE id = $1",
        )
        .bind(feedback_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.map(Into::into))
    }

    async fn set_feedback_resolved(&self, feedback_id: i64, resolved: bool) -> Result<()> {
        sqlx::query("UPDATE feedbacks SET resolved = $1 WHERE id = $2")
            .bind(resolved)
            .bind(feedback_id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    async fn list_feedback_viewers(&self, feedback_id: i64) -> Result<Vec<FeedbackViewer>> {
        let rows: Vec<FeedbackViewerRow> = sqlx::query_as(
            "SELECT feedback_id, participant_id, valid FROM feedback_viewer_map WHERE feedback_id = $1",
        )
        .bind(feedback_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infra)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert_feedback_viewer(&self, feedback_id: i64, participant_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO feedback_viewer_map (feedback_id, participant_id, valid) VALUES ($1, $2, true) \
             ON CONFLICT (feedback_id, participant_id) DO UPDATE SET valid = true",
        )
        .bind(feedback_id)
        .bind(participant_id)
        .execute(&self.pool)
        .await
        .map_err(infra)?;
        Ok(())
    }

    async fn invalidate_feedback_viewer(&self, feedback_id: i64, participant_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE feedback_viewer_map SET valid = false WHERE feedback_id = $1 AND participant_id = $2",
        )
        .bind(feedback_id)
        .bind(participant_id)
        .execute(&self.pool)
        .await
        .map_err(infra)?;
        Ok(())
    }

    async fn add_comment(
        &self,
        feedback_id: i64,
        author_participant_id: i64,
        content: &str,
    ) -> Result<Comment> {
        let row: CommentRow = sqlx::query_as(
            "INSERT INTO comments (feedback_id, participant_id, content, deleted, created_at, updated_at) \
             VALUES ($1, $2, $3, false, now(), now()) \
             RETURNING id, feedback_id, participant_id, content, deleted, created_at, updated_at",
        )
        .bind(feedback_id)
        .bind(author_participant_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.into())
    }

    async fn edit_comment(&self, comment_id: i64, content: &str) -> Result<()> {
        sqlx::query("UPDATE comments SET content = $1, updated_at = now() WHERE id = $2")
            .bind(content)
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<()> {
        sqlx::query("UPDATE comments SET deleted = true, updated_at = now() WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>> {
        let row: Option<CommentRow> = sqlx::query_as(
            "SELECT id, feedback_id, participant_id, content, deleted, created_at, updated_at \
             FROM comments WHERE id = $1",
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.map(Into::into))
    }

    async fn list_lesson_feedback_for(
        &self,
        lesson_id: i64,
        participant_id: i64,
    ) -> Result<Vec<FeedbackThread>> {
        #[derive(FromRow)]
        struct JoinedRow {
            #[sqlx(flatten)]
            code_ref: CodeReferenceRow,
            owner_participant_id: i64,
            #[sqlx(flatten)]
            feedback: FeedbackRow,
        }

        // Threads visible to `participant_id`: either they hold a valid
        // FeedbackViewer row, or they own the project the thread lives in
        // (spec SPEC_FULL §8 supplement 3).
        let joined: Vec<JoinedRow> = sqlx::query_as(
            "SELECT cr.id, cr.project_id, cr.file, cr.line, cr.deleted, \
                    up.participant_id AS owner_participant_id, \
                    fb.id AS id, fb.code_ref_id, fb.participant_id, fb.resolved, fb.created_at \
             FROM feedbacks fb \
             JOIN code_references cr ON cr.id = fb.code_ref_id \
             JOIN user_projects up ON up.id = cr.project_id \
             WHERE up.lesson_id = $1 AND cr.deleted = false \
               AND (up.participant_id = $2 OR EXISTS ( \
                 SELECT 1 FROM feedback_viewer_map fvm \
                 WHERE fvm.feedback_id = fb.id AND fvm.participant_id = $2 AND fvm.valid = true)) \
             ORDER BY fb.created_at DESC",
        )
        .bind(lesson_id)
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infra)?;

        let mut threads = Vec::with_capacity(joined.len());
        for row in joined {
            let feedback_id = row.feedback.id;
            let comments: Vec<CommentRow> = sqlx::query_as(
                "SELECT id, feedback_id, participant_id, content, deleted, created_at, updated_at \
                 FROM comments WHERE feedback_id = $1 ORDER BY created_at ASC",
            )
            .bind(feedback_id)
            .fetch_all(&self.pool)
            .await
            .map_err(infra)?;

            threads.push(FeedbackThread {
                feedback: row.feedback.into(),
                code_ref: row.code_ref.into(),
                owner_participant_id: row.owner_participant_id,
                comments: comments.into_iter().map(Into::into).collect(),
            });
        }
        Ok(threads)
    }
}

impl PostgresMetadataStore {
    async fn find_code_reference(
        &self,
        project_id: i64,
        file: &str,
        line: &str,
    ) -> Result<Option<CodeReference>> {
        let row: Option<CodeReferenceRow> = sqlx::query_as(
            "SELECT id, project_id, file, line, deleted FROM code_references \
             WHERE project_id = $1 AND file = $2 AND line = $3",
        )
        .bind(project_id)
        .bind(file)
        .bind(line)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;
        Ok(row.map(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_its_wire_string() {
        assert_eq!(role_from_str(role_to_str(Role::Teacher)), Role::Teacher);
        assert_eq!(role_from_str(role_to_str(Role::Student)), Role::Student);
        assert_eq!(role_from_str("anything-else"), Role::Student);
    }
}
