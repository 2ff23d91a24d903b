use serde::{Deserialize, Serialize};

/// `INIT_LESSON` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitLesson {
    /// The course the lesson belongs to.
    pub course_id: i64,
    /// The lesson to enter.
    pub lesson_id: i64,
}

/// `ACTIVITY_PING` request payload. Absent/omitted `target_ptc_id` means "ping for self".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPing {
    /// The participant whose `recentActivityAt` should be bumped; defaults to the caller.
    #[serde(default)]
    pub target_ptc_id: Option<i64>,
}

/// `INIT_LESSON` response payload: the resolved participant identity the
/// caller is now bound to for the remainder of the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitLessonResponse {
    /// The participant id now bound to this session.
    pub participant_id: i64,
    /// Display name.
    pub nickname: String,
    /// `TEACHER` or `STUDENT`.
    pub role: String,
}
