use serde::{Deserialize, Serialize};

/// One row of the `ALL_PARTICIPANT` roster response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    /// Participant id.
    pub participant_id: i64,
    /// Display name.
    pub nickname: String,
    /// `TEACHER` or `STUDENT`.
    pub role: String,
    /// Whether at least one session for this participant is currently live.
    pub active: bool,
    /// Last time `ACTIVITY_PING` touched this participant, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_activity_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `ALL_PARTICIPANT` response payload.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AllParticipantResponse {
    /// Every participant of the lesson's course, with their project summary.
    pub participants: Vec<ParticipantSummary>,
}

/// `SUBS_PARTICIPANT{target:[id]}` / `UNSUBS_PARTICIPANT{target:[id]}` request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetList {
    /// Participant ids to subscribe/unsubscribe from.
    pub target: Vec<i64>,
}

/// Response to `SUBS_PARTICIPANT`/`UNSUBS_PARTICIPANT`: which ids succeeded,
/// and the reason for each that failed.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResult {
    /// Ids the operation succeeded for.
    pub success_id: Vec<i64>,
    /// Ids that failed, with the error kind name.
    pub failed: Vec<FailedTarget>,
}

/// A single failed id/reason pair within a [`SubscriptionResult`].
#[derive(Debug, Clone, Serialize)]
pub struct FailedTarget {
    /// The participant id the operation failed for.
    pub id: i64,
    /// The `ErrorKind` name explaining the failure.
    pub reason: String,
}

/// `SUBS_PARTICIPANT_LIST` response: the caller's current subscription room memberships.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionList {
    /// Participant ids the caller currently subscribes to (including self).
    pub target: Vec<i64>,
}

/// `PARTICIPANT_STATUS` broadcast payload.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantStatus {
    /// The participant whose presence changed.
    pub id: i64,
    /// New presence value.
    pub active: bool,
}
