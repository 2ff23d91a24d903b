use serde::{Deserialize, Serialize};

/// `CURSOR_LAST{ownerId,file}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorLast {
    /// Project owner.
    pub owner_id: i64,
    /// Encoded filename.
    pub file: String,
}

/// `CURSOR_LAST` response payload; `cursor` is `None` if nothing was ever recorded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorLastResponse {
    /// The last recorded cursor position, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<serde_json::Value>,
}

/// The `fileInfo` object nested in `CURSOR_MOVE`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Project owner.
    pub owner_id: i64,
    /// Encoded filename.
    pub file: String,
    /// Cursor line.
    pub line: i64,
    /// Opaque cursor payload (column, selection range, etc.).
    pub cursor: serde_json::Value,
}

/// `CURSOR_MOVE{fileInfo,timestamp,event?}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMove {
    /// The location being reported.
    pub file_info: FileInfo,
    /// Client-supplied timestamp.
    pub timestamp: i64,
    /// When `Some("open")`, the position is broadcast but not persisted.
    #[serde(default)]
    pub event: Option<String>,
}

/// `CURSOR_MOVE` broadcast payload, fanned out to `SUBS_PTC(ownerId)`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMoveBroadcast {
    /// The participant who moved.
    pub sender_id: i64,
    /// The location being reported.
    pub file_info: FileInfo,
    /// The original client-supplied timestamp.
    pub timestamp: i64,
}

impl CursorMove {
    /// `true` when this move must not be persisted via `lastCursor`.
    pub fn is_transient_open(&self) -> bool {
        self.event.as_deref() == Some("open")
    }
}
