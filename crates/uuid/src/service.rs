//! Internal implementation of patient UUID derivation.

use crate::{UuidError, UuidResult};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Namespace for [`UuidScheme::V1`]. Must never change.
const NAMESPACE_V1: Uuid = Uuid::from_u128(0x6f1c2a4e_8b3d_4f0a_9c5e_2d7b1e4a3c90);

/// Versioned derivation scheme for patient UUIDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UuidScheme {
    /// UUIDv5 of the canonical identifier under a fixed roster namespace.
    V1,
}

/// Scheme used for newly resolved rosters.
pub const CURRENT_SCHEME: UuidScheme = UuidScheme::V1;

impl UuidScheme {
    /// Returns the namespace UUID this scheme hashes under.
    pub fn namespace(self) -> Uuid {
        match self {
            UuidScheme::V1 => NAMESPACE_V1,
        }
    }

    /// Stable name written to persisted rosters.
    pub fn as_str(self) -> &'static str {
        match self {
            UuidScheme::V1 => "v1",
        }
    }
}

impl fmt::Display for UuidScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UuidScheme {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(UuidScheme::V1),
            other => Err(UuidError::UnknownScheme(other.to_string())),
        }
    }
}

/// A patient UUID in canonical form (lowercase, hyphenated).
///
/// # Construction
/// - [`PatientUuid::derive`] computes the UUID for a canonical identifier.
/// - [`PatientUuid::parse`] validates a UUID read back from a cache or export.
///
/// # Display format
/// Always the 36-character lowercase hyphenated form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatientUuid(Uuid);

impl PatientUuid {
    /// Derives the UUID for `canonical_id` under `scheme`.
    ///
    /// The identifier is hashed exactly as given; callers are expected to pass an already
    /// normalised, non-blank canonical identifier.
    pub fn derive(scheme: UuidScheme, canonical_id: &str) -> Self {
        Self(Uuid::new_v5(&scheme.namespace(), canonical_id.as_bytes()))
    }

    /// Validates and parses a UUID string that must already be in canonical form.
    ///
    /// Uppercase and unhyphenated inputs are rejected rather than normalised, so every
    /// persisted value has exactly one spelling.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 36 lowercase hex characters in 8-4-4-4-12 form, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid UUID '{}': {}", input, e)))
    }

    /// Returns true if `input` is in canonical form.
    ///
    /// This is a purely syntactic check.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 36
            && input.bytes().enumerate().all(|(i, b)| match i {
                8 | 13 | 18 | 23 => b == b'-',
                _ => matches!(b, b'0'..=b'9' | b'a'..=b'f'),
            })
    }

    /// Returns true if this UUID is what `scheme` derives for `canonical_id`.
    pub fn matches(&self, scheme: UuidScheme, canonical_id: &str) -> bool {
        *self == Self::derive(scheme, canonical_id)
    }
}

impl fmt::Display for PatientUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for PatientUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatientUuid::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PatientUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PatientUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PatientUuid::parse(&s).map_err(serde::de::Error::custom)
    }
}
