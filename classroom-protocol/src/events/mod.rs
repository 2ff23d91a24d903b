//! Typed payloads for every protocol verb in spec §6.
//!
//! Field names use `camelCase` on the wire (`#[serde(rename_all = "camelCase")]`)
//! to match the original JavaScript-facing protocol; Rust-side field names
//! stay `snake_case`.

pub mod cursor;
pub mod feedback;
pub mod files;
pub mod lesson;
pub mod names;
pub mod observability;
pub mod participants;
pub mod permissions;
pub mod timesync;
