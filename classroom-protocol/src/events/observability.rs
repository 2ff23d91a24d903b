use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Frame;

/// `WS_MONITOR_SUBSCRIBE{courseId,lessonId}` (spec §4.O): an admin-authenticated
/// session's request to mirror every room's fan-out for one lesson into its
/// own `WS_MONITOR` feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsMonitorSubscribe {
    /// The course to observe.
    pub course_id: i64,
    /// The lesson to observe.
    pub lesson_id: i64,
}

/// One mirrored frame delivered to `WS_MONITOR` subscribers (spec §4.O: "(a)
/// stamp outbound frames with a server timestamp and the originating session
/// id, ... (c) mirror events to the monitor room").
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirroredFrame {
    /// The room the original frame was fanned out to.
    pub room: String,
    /// The original event name.
    pub event: String,
    /// The original event's payload, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The sid that triggered the emit, when known (absent for
    /// server-originated broadcasts such as a disconnect's presence update).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_sid: Option<String>,
    /// Server clock reading at the moment of mirroring, in epoch milliseconds.
    pub server_timestamp: i64,
}

impl MirroredFrame {
    /// Builds a mirrored copy of `frame`, fanned out to `room`, stamped with
    /// `server_timestamp` and the triggering `origin_sid`.
    pub fn new(room: impl Into<String>, frame: &Frame, origin_sid: Option<String>, server_timestamp: i64) -> Self {
        Self {
            room: room.into(),
            event: frame.event.clone(),
            data: frame.data.clone(),
            origin_sid,
            server_timestamp,
        }
    }
}
