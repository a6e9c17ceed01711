//! Deterministic patient UUIDs.
//!
//! Every canonical patient in the migrated roster carries a UUID that downstream clinical
//! systems key on. The UUID is never random: it is a pure function of the canonical
//! identifier string, so a roster rebuilt from the same site extracts (or reloaded from the
//! cache) always carries the same UUIDs.
//!
//! ## Derivation
//! `PatientUuid = UUIDv5(namespace(scheme), utf8(canonical_id))`
//!
//! The namespace is fixed per [`UuidScheme`]. Changing the namespace would silently re-key
//! every patient, so a new derivation must be introduced as a new scheme variant rather
//! than by editing an existing one.
//!
//! ## Canonical UUID form
//! - Length: 36
//! - Lowercase hex in the standard `8-4-4-4-12` hyphenated layout
//! - Example: `2eba30f3-41ff-513a-9e6d-f9caa2fb7ab7`
//!
//! Uniqueness of the output is only as good as uniqueness of the input: two distinct
//! canonical identifiers never share a UUID in practice, but callers still check for
//! collisions and treat one as a broken upstream invariant.

mod service;

pub use service::{PatientUuid, UuidScheme, CURRENT_SCHEME};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A scheme name that this build does not know how to derive
    #[error("Unknown UUID scheme: {0}")]
    UnknownScheme(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
