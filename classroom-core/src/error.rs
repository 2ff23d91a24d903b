use classroom_protocol::ErrorKind;
use thiserror::Error;

/// The error type threaded through every component in this crate.
///
/// Protocol-level variants map 1:1 onto [`ErrorKind`] and are safe to show to
/// a caller; infrastructure variants carry the underlying failure for
/// `tracing::error!` but are degraded to [`ErrorKind::Internal`] before they
/// ever reach the wire (spec §7: "Unknown failures are logged ... and
/// surface as a generic error").
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClassroomError {
    /// A protocol-level error with a well-known wire representation.
    #[error("{0}")]
    Protocol(ErrorKind),
    /// The KV store (component A) failed.
    #[error("kv store error: {0}")]
    Kv(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The object store (component B) failed.
    #[error("object store error: {0}")]
    ObjectStore(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The token verifier (component C) failed to reach the auth service.
    #[error("auth service error: {0}")]
    AuthTransport(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The metadata store (component D) failed.
    #[error("metadata store error: {0}")]
    MetadataStore(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// A ZIP archive was malformed, or attempted path traversal.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),
    /// JSON (de)serialization failure outside the protocol layer.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ClassroomError {
    /// Builds a protocol error directly from an [`ErrorKind`].
    pub fn protocol(kind: ErrorKind) -> Self {
        Self::Protocol(kind)
    }

    /// The [`ErrorKind`] this error should present to a client: the kind
    /// itself for [`ClassroomError::Protocol`], otherwise
    /// [`ErrorKind::Internal`]. Callers should `tracing::error!` the full
    /// error *before* calling this, since the detail is discarded here.
    pub fn as_wire_kind(&self) -> ErrorKind {
        match self {
            ClassroomError::Protocol(kind) => *kind,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<ErrorKind> for ClassroomError {
    fn from(kind: ErrorKind) -> Self {
        Self::Protocol(kind)
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ClassroomError>;
