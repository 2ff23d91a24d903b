//! Components A–O of the realtime classroom collaboration backend: the KV,
//! object-store, and metadata-store client seams; the key scheme, cache,
//! file store, and template applier built on them; the permission engine,
//! session store, and room lattice; and the dispatcher/handlers/feedback
//! engine/observability hooks that tie them together behind one
//! [`context::AppContext`].
//!
//! `classroom-server` is the only crate that constructs concrete clients and
//! reads the process environment; everything here is testable against the
//! in-memory fakes in [`testutil`] (enabled by the `testutil` feature).

pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod feedback;
pub mod filestore;
pub mod handlers;
pub mod keys;
pub mod kv;
pub mod metastore;
pub mod objectstore;
pub mod outbound;
pub mod permission;
pub mod rooms;
pub mod session;
pub mod template;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use context::AppContext;
pub use error::{ClassroomError, Result};
