use serde::Serialize;
use thiserror::Error;

/// The closed set of protocol-level error kinds a handler may surface to its
/// caller, per spec §7. Infrastructure failures (KV/object-store/database
/// transport errors) are a separate concern of `classroom_core::ClassroomError`
/// and are mapped down to [`ErrorKind::Internal`] before they ever reach the
/// wire.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A required request field was absent.
    #[error("MISSING_FIELD")]
    MissingField,
    /// The event requires `INIT_LESSON` to have completed first.
    #[error("NOT_IN_LESSON")]
    NotInLesson,
    /// The caller is not a participant of the course, or the lesson does not exist.
    #[error("ACCESS_COURSE_FAIL")]
    AccessCourseFail,
    /// The referenced participant does not exist.
    #[error("PARTICIPANT_NOT_FOUND")]
    ParticipantNotFound,
    /// The referenced project does not exist.
    #[error("PROJECT_NOT_FOUND")]
    ProjectNotFound,
    /// The caller lacks the permission bits the event requires.
    #[error("FORBIDDEN_PROJECT")]
    ForbiddenProject,
    /// `create` targeted a filename that already exists.
    #[error("FILE_EXISTS")]
    FileExists,
    /// The referenced file does not exist.
    #[error("FILE_NOT_FOUND")]
    FileNotFound,
    /// Rehydration could not find the expected bulk object in cold storage.
    #[error("PROJECT_FILE_MISSING")]
    ProjectFileMissing,
    /// A user-supplied filename contained a NUL byte, which is reserved for
    /// the directory-mark sentinel (spec §3 Invariant 4).
    #[error("INVALID_FILENAME")]
    InvalidFilename,
    /// The save would push the project over its total size cap.
    #[error("TOTAL_SIZE_EXCEEDED")]
    TotalSizeExceeded,
    /// The referenced feedback thread does not exist.
    #[error("FEEDBACK_NOT_FOUND")]
    FeedbackNotFound,
    /// The caller is not authorized to modify this feedback/comment.
    #[error("FEEDBACK_NOT_AUTH")]
    FeedbackNotAuth,
    /// Connect-time credential rejection. Never sent as a frame; the
    /// connection is refused before a session exists.
    #[error("AUTH_FAILED")]
    AuthFailed,
    /// A failure that isn't one of the above; logged server-side and
    /// degraded to a generic message before reaching the caller.
    #[error("internal error")]
    Internal,
}

/// The `{"error": ...}` payload shape sent back to the caller on failure.
///
/// A single kind serializes as a bare string; [`ErrorPayload::many`] is used
/// by handlers (e.g. `SUBS_PARTICIPANT`) that report a failure reason per
/// target id rather than failing the whole request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    /// One or more error kind names.
    pub error: ErrorField,
}

/// Either a single error string or a list of them, matching spec §6's
/// `{error:[string]|string}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ErrorField {
    /// A single error kind.
    One(String),
    /// Multiple error kinds, e.g. one per failed sub-operation.
    Many(Vec<String>),
}

impl ErrorPayload {
    /// Builds a single-error payload from an [`ErrorKind`].
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            error: ErrorField::One(kind.to_string()),
        }
    }

    /// Builds a multi-error payload from several [`ErrorKind`]s.
    pub fn many(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            error: ErrorField::Many(kinds.into_iter().map(|k| k.to_string()).collect()),
        }
    }
}

impl From<ErrorKind> for ErrorPayload {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
