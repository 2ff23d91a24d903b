use serde::{Deserialize, Serialize};

/// `DIR_INFO{targetId}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirInfo {
    /// The project owner whose file list is being requested.
    pub target_id: i64,
}

/// `DIR_INFO` response: the encoded filenames currently in the project.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirInfoResponse {
    /// URL-quoted, then base64-encoded filenames (see `classroom_core::keys`).
    pub files: Vec<String>,
}

/// `FILE_READ{ownerId,file}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRead {
    /// Project owner.
    pub owner_id: i64,
    /// Encoded filename.
    pub file: String,
}

/// `FILE_READ` response payload.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    /// File content. Binary content is base64-encoded by the transport layer
    /// before being placed here; this type is content-encoding agnostic.
    pub content: String,
}

/// The kind of filesystem entry an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

/// `FILE_CREATE{ownerId,type,name}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCreate {
    /// Project owner.
    pub owner_id: i64,
    /// Whether `name` is a file or a directory.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Encoded filename (or directory path) to create.
    pub name: String,
    /// Initial content; directories ignore this.
    #[serde(default)]
    pub content: Option<String>,
}

/// `FILE_UPDATE{ownerId,type,name,rename}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    /// Project owner.
    pub owner_id: i64,
    /// Whether `name` is a file or a directory.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Current encoded filename (or directory path).
    pub name: String,
    /// New encoded filename (or directory path).
    pub rename: String,
}

/// `FILE_DELETE{ownerId,type,name}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDelete {
    /// Project owner.
    pub owner_id: i64,
    /// Whether `name` is a file or a directory.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Encoded filename (or directory path) to delete.
    pub name: String,
}

/// `FILE_MOD{ownerId,file,cursor,change,timestamp}` request payload.
///
/// `change` is an opaque delta forwarded verbatim; this server never
/// interprets it (spec §1 Non-goals: no OT/CRDT merge).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMod {
    /// Project owner.
    pub owner_id: i64,
    /// Encoded filename.
    pub file: String,
    /// Sender's cursor position at the time of the edit.
    pub cursor: serde_json::Value,
    /// Opaque edit delta, broadcast verbatim.
    pub change: serde_json::Value,
    /// Client-supplied logical timestamp, echoed on broadcast (spec §4.L Ordering).
    pub timestamp: i64,
}

/// The `FILE_MOD` broadcast adds the sender's identity to the original payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileModBroadcast {
    /// The participant who sent the edit.
    pub sender_id: i64,
    /// Project owner.
    pub owner_id: i64,
    /// Encoded filename.
    pub file: String,
    /// Sender's cursor position at the time of the edit.
    pub cursor: serde_json::Value,
    /// Opaque edit delta, broadcast verbatim.
    pub change: serde_json::Value,
    /// The original client-supplied timestamp.
    pub timestamp: i64,
}

/// `FILE_SAVE{ownerId,file,content}` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSave {
    /// Project owner.
    pub owner_id: i64,
    /// Encoded filename.
    pub file: String,
    /// New content to persist.
    pub content: String,
}

/// `FILE_SAVE` / `FILE_CREATE` / `FILE_UPDATE` / `FILE_DELETE` fan-out acknowledgement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEventBroadcast {
    /// The participant who performed the mutation.
    pub actor_id: i64,
    /// Project owner.
    pub owner_id: i64,
    /// Encoded filename (or directory path) affected.
    pub name: String,
    /// For `FILE_UPDATE`, the new name; absent otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}
