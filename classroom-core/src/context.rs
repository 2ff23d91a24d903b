//! Shared process state (spec SPEC_FULL §2 "Shared process state"):
//! everything a connection handler needs, bundled so `classroom-server`
//! constructs it once at startup and the dispatcher threads one `Arc` through
//! every event.

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::cache::Cache;
use crate::config::Config;
use crate::feedback::FeedbackEngine;
use crate::filestore::FileStore;
use crate::kv::KvStore;
use crate::metastore::MetadataStore;
use crate::objectstore::ObjectStore;
use crate::outbound::{OutboundRegistry, RoomForwarders};
use crate::permission::PermissionEngine;
use crate::rooms::RoomLattice;
use crate::session::SessionStore;
use crate::template::TemplateApplier;

/// Every process-wide handle a connection needs, constructed once at startup.
pub struct AppContext {
    /// Process configuration.
    pub config: Config,
    /// Hot-tier KV store (file content, room membership, cursors).
    pub kv: Arc<dyn KvStore>,
    /// Cold-tier object store (oversized files, archives).
    pub objects: Arc<dyn ObjectStore>,
    /// Durable relational store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Upstream token verifier.
    pub token_verifier: Arc<dyn TokenVerifier>,
    /// Two-tier project file store.
    pub files: Arc<FileStore>,
    /// Lesson template rehydration.
    pub templates: Arc<TemplateApplier>,
    /// Viewer → project permission engine.
    pub permissions: Arc<PermissionEngine>,
    /// Code-reference feedback threads and comments.
    pub feedback: Arc<FeedbackEngine>,
    /// Named room lattice and cross-instance fan-out.
    pub rooms: Arc<RoomLattice>,
    /// Process-local connected-session registry.
    pub sessions: Arc<SessionStore>,
    /// The general-purpose memoization cache (also used internally by
    /// [`PermissionEngine`]); shared so handlers can memoize their own
    /// short-TTL reads, e.g. `ALL_PARTICIPANT`'s roster (spec §4.M).
    pub cache: Arc<Cache>,
    /// This instance's live websocket senders, keyed by `sid`.
    pub outbound: Arc<OutboundRegistry>,
    /// One background subscriber task per room this instance has a local
    /// member in, bridging the room lattice's pub/sub to `outbound`.
    pub forwarders: Arc<RoomForwarders>,
}

impl AppContext {
    /// Assembles an [`AppContext`] from its constituent clients. The caller
    /// (`classroom-server::main`, or a test harness in
    /// [`crate::testutil`]) is responsible for constructing `kv`/`cache_kv`
    /// as two distinct logical stores (spec §5 "cache_db").
    pub fn new(
        config: Config,
        kv: Arc<dyn KvStore>,
        cache_kv: Arc<dyn KvStore>,
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        token_verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        let cache = Arc::new(Cache::new(cache_kv));
        let files = Arc::new(FileStore::new(
            kv.clone(),
            objects.clone(),
            config.hot_limit_bytes,
            config.project_size_limit_bytes,
        ));
        let templates = Arc::new(TemplateApplier::new(
            kv.clone(),
            objects.clone(),
            config.hot_limit_bytes,
            config.project_size_limit_bytes,
        ));
        let permissions = Arc::new(PermissionEngine::new(metadata.clone(), cache.clone()));
        let feedback = Arc::new(FeedbackEngine::new(metadata.clone()));
        let rooms = Arc::new(RoomLattice::new(kv.clone()));
        let sessions = Arc::new(SessionStore::new());
        let outbound = Arc::new(OutboundRegistry::new());
        let forwarders = Arc::new(RoomForwarders::new(rooms.clone(), outbound.clone()));

        Self {
            config,
            kv,
            objects,
            metadata,
            token_verifier,
            files,
            templates,
            permissions,
            feedback,
            rooms,
            sessions,
            cache,
            outbound,
            forwarders,
        }
    }
}
