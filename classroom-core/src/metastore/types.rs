//! Row types for the durable relational store (component D), mirroring the
//! original's `server/models/course.py` and `server/models/feedback.py`.

use chrono::{DateTime, Utc};
use classroom_protocol::events::permissions::Permission;

/// A participant's role within a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full access; the teacher bypass in [`crate::permission`] applies.
    Teacher,
    /// A regular student, gated by explicit ACL edges.
    Student,
}

impl Role {
    /// `true` for [`Role::Teacher`].
    pub fn is_teacher(self) -> bool {
        matches!(self, Role::Teacher)
    }
}

/// `{id, courseId, userId, role, nickname, active}` (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    /// Participant id.
    pub id: i64,
    /// The course this membership belongs to.
    pub course_id: i64,
    /// The authenticated user this membership belongs to.
    pub user_id: i64,
    /// Teacher or student.
    pub role: Role,
    /// Display name.
    pub nickname: String,
    /// `true` iff at least one live session has this participant bound (spec §3 Invariant 7).
    pub active: bool,
}

/// `{id, courseId, templateArchiveKey?}` (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Lesson {
    /// Lesson id.
    pub id: i64,
    /// The course this lesson belongs to.
    pub course_id: i64,
    /// Object-store key of the lesson's template archive, if one is configured.
    pub template_archive_key: Option<String>,
}

/// `{id, lessonId, participantId, recentActivityAt, active, templateApplied}` (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Project id.
    pub id: i64,
    /// The lesson this project was created for.
    pub lesson_id: i64,
    /// The project's owner.
    pub participant_id: i64,
    /// Last time any activity touched this project.
    pub recent_activity_at: DateTime<Utc>,
    /// Whether the owning participant is currently connected.
    pub active: bool,
    /// Whether the lesson's template has already been applied (spec §3 Lifecycles).
    pub template_applied: bool,
}

/// A `(targetProjectId, viewerParticipantId) -> permission` ACL edge (spec §3).
///
/// Absence of a row is a distinct state from `permission = Permission::NONE`
/// (spec §3 Invariant: "Primary key is the pair; absence is a distinct state
/// from `permission=0`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectViewer {
    /// The project being viewed.
    pub target_project_id: i64,
    /// The viewer.
    pub viewer_participant_id: i64,
    /// The viewer's current RWX bits.
    pub permission: Permission,
}

/// `{id, projectId, file, line, deleted}` (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct CodeReference {
    /// Code reference id.
    pub id: i64,
    /// The project this location is in.
    pub project_id: i64,
    /// File path, reflecting any renames since creation (spec E2E scenario 5).
    pub file: String,
    /// Line or line range, e.g. `"3-4"`.
    pub line: String,
    /// Soft-delete flag, set when the file/directory it points into is deleted.
    pub deleted: bool,
}

/// `{id, codeRefId, authorParticipantId, resolved, createdAt}` (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    /// Feedback id.
    pub id: i64,
    /// The code location this thread is attached to.
    pub code_ref_id: i64,
    /// The thread's creator; only they may modify it (spec §4.N).
    pub author_participant_id: i64,
    /// Whether the thread has been marked resolved.
    pub resolved: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// `{feedbackId, participantId, valid}` (spec §3).
///
/// Revoked by setting `valid = false`, never by deleting the row (spec §3
/// Lifecycles: "`valid` (feedback) ... denote revocation without deletion").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackViewer {
    /// The thread this ACL edge is on.
    pub feedback_id: i64,
    /// The participant granted visibility.
    pub participant_id: i64,
    /// Whether the grant is currently active.
    pub valid: bool,
}

/// `{id, feedbackId, authorParticipantId, content, deleted, createdAt, updatedAt}` (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Comment id.
    pub id: i64,
    /// The thread this comment belongs to.
    pub feedback_id: i64,
    /// The comment's author; only they may edit/delete it.
    pub author_participant_id: i64,
    /// Body text. Meaningless once `deleted`.
    pub content: String,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last-edit time.
    pub updated_at: DateTime<Utc>,
}

/// One fully-materialized feedback thread for the `FEEDBACK_LIST` roll-up
/// (spec §8 Supplemented feature 3): a [`Feedback`] joined with its
/// [`CodeReference`] location and ordered [`Comment`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackThread {
    /// The thread itself.
    pub feedback: Feedback,
    /// The location it's attached to, reflecting renames.
    pub code_ref: CodeReference,
    /// The project owner the thread belongs to.
    pub owner_participant_id: i64,
    /// Comments in creation order.
    pub comments: Vec<Comment>,
}
