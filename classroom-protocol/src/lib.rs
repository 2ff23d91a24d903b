//! Wire protocol for the realtime classroom collaboration event stream.
//!
//! A client and server exchange newline-delimited JSON [`Frame`]s over a
//! single bidirectional connection. Every protocol verb (`INIT_LESSON`,
//! `FILE_SAVE`, `FEEDBACK_ADD`, ...) has a typed payload in [`events`], and a
//! static entry in [`descriptor`] describing the fields it requires and the
//! session preconditions the dispatcher must check before invoking a
//! handler.
//!
//! This crate has no async runtime or I/O dependency: it is the contract
//! that `classroom-core`'s dispatcher and `classroom-server`'s transport
//! layer both compile against.

#![warn(missing_docs)]

mod descriptor;
mod error;
mod frame;
pub mod events;

pub use descriptor::{event_descriptor, EventDescriptor};
pub use error::{ErrorKind, ErrorPayload};
pub use frame::Frame;
