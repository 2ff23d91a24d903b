use serde::{Deserialize, Serialize};

/// The `{ownerId,file,line}` code location a feedback thread is attached to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRefInput {
    /// Project owner.
    pub owner_id: i64,
    /// Encoded filename.
    pub file: String,
    /// Line or line range, e.g. `"3-4"`.
    pub line: String,
}

/// `FEEDBACK_LIST` request payload; both fields optional (narrows the roll-up).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackListQuery {
    /// Narrow to one project owner.
    #[serde(default)]
    pub owner_id: Option<i64>,
    /// Narrow to one file (requires `owner_id`).
    #[serde(default)]
    pub file: Option<String>,
}

/// `FEEDBACK_ADD{ref,acl,comment}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAdd {
    /// The code location.
    #[serde(rename = "ref")]
    pub code_ref: CodeRefInput,
    /// Participant ids granted visibility into the thread (beyond the owner, who is implicit).
    pub acl: Vec<i64>,
    /// The author's first comment body.
    pub comment: String,
}

/// `FEEDBACK_MOD{feedbackId,acl,resolved}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackMod {
    /// The thread being modified.
    pub feedback_id: i64,
    /// The full new ACL membership (a set delta is computed against the current one).
    #[serde(default)]
    pub acl: Option<Vec<i64>>,
    /// New resolved state, if changing.
    #[serde(default)]
    pub resolved: Option<bool>,
}

/// `FEEDBACK_COMMENT{feedbackId,content}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackComment {
    /// The thread being commented on.
    pub feedback_id: i64,
    /// Comment body.
    pub content: String,
}

/// `FEEDBACK_COMMENT_MOD{commentId[,content,delete]}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackCommentMod {
    /// The comment being modified.
    pub comment_id: i64,
    /// New body, if editing.
    #[serde(default)]
    pub content: Option<String>,
    /// Soft-delete marker.
    #[serde(default)]
    pub delete: bool,
}

/// A single comment within a feedback roll-up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    /// Comment id.
    pub id: i64,
    /// Author participant id.
    pub author_participant_id: i64,
    /// Body text (meaningless if `deleted`).
    pub content: String,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Creation time.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last edit time.
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A single feedback thread within the roll-up, decorated with its code location.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    /// Feedback id.
    pub id: i64,
    /// Project owner the thread is attached to.
    pub owner_id: i64,
    /// File the thread is attached to (reflects renames).
    pub file: String,
    /// Line or line range.
    pub line: String,
    /// Thread author.
    pub author_participant_id: i64,
    /// Whether the thread has been marked resolved.
    pub resolved: bool,
    /// Creation time.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Comments in creation order.
    pub comments: Vec<CommentView>,
}

/// `FEEDBACK_LIST` response: the full per-lesson roll-up visible to the caller.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRollup {
    /// Threads visible to the caller, most recent first.
    pub feedback: Vec<FeedbackView>,
}

/// `FEEDBACK_MOD` fan-out payload, sent to each post-change ACL member's `PERSONAL_PTC`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackModBroadcast {
    /// The thread that was modified.
    pub feedback_id: i64,
    /// The thread's current resolved state.
    pub resolved: bool,
    /// Participant ids newly granted visibility.
    pub added: Vec<i64>,
    /// Participant ids whose visibility was revoked.
    pub removed: Vec<i64>,
}

/// `FEEDBACK_COMMENT` fan-out payload, sent to every ACL member's `PERSONAL_PTC`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackCommentBroadcast {
    /// The thread the comment was posted to.
    pub feedback_id: i64,
    /// The new comment.
    pub comment: CommentView,
}

/// `FEEDBACK_COMMENT_MOD` fan-out payload, sent to every ACL member's `PERSONAL_PTC`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackCommentModBroadcast {
    /// The thread the comment belongs to.
    pub feedback_id: i64,
    /// The comment's state after the edit/delete.
    pub comment: CommentView,
}
