//! Engine configuration.
//!
//! Configuration is resolved once at startup and passed into [`crate::IdentityEngine`].
//! The manual override list is data, not engine state: callers choose between the
//! built-in clinic list and a YAML override file, and tests pass their own rules.

use crate::constants::BUILTIN_OVERRIDE_IDS;
use crate::error::{RosterError, RosterResult};
use roster_types::NonEmptyText;
use roster_uuid::{UuidScheme, CURRENT_SCHEME};
use serde::Deserialize;
use std::path::Path;

/// One identifier known to be shared by genuinely different people.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRule {
    pub local_id: NonEmptyText,
    /// Discard matching rows that have no birth year instead of giving them their own
    /// identifier. Such rows are partial re-registrations, not extra patients.
    #[serde(default = "default_drop_missing_birth_year")]
    pub drop_missing_birth_year: bool,
}

fn default_drop_missing_birth_year() -> bool {
    true
}

impl OverrideRule {
    pub fn new(local_id: NonEmptyText, drop_missing_birth_year: bool) -> Self {
        Self {
            local_id,
            drop_missing_birth_year,
        }
    }
}

/// Ordered list of manual override rules.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRules {
    #[serde(rename = "overrides")]
    rules: Vec<OverrideRule>,
}

impl OverrideRules {
    pub fn new(rules: Vec<OverrideRule>) -> Self {
        Self { rules }
    }

    /// The hardcoded clinic list.
    pub fn builtin() -> Self {
        let rules = BUILTIN_OVERRIDE_IDS
            .iter()
            .filter_map(|id| NonEmptyText::new(id).ok())
            .map(|id| OverrideRule::new(id, true))
            .collect();
        Self { rules }
    }

    /// Parse an override file.
    ///
    /// ```yaml
    /// overrides:
    ///   - local_id: 001-000020
    ///   - local_id: 004-000311
    ///     drop_missing_birth_year: false
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::OverrideFile`] naming the offending path (for example
    /// `overrides[1].local_id`) if the YAML does not match the schema, and
    /// [`RosterError::InvalidInput`] if an identifier is listed twice.
    pub fn from_yaml(yaml_text: &str) -> RosterResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let parsed: OverrideRules = serde_path_to_error::deserialize(deserializer).map_err(|err| {
            let path = err.path().to_string();
            let path = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            RosterError::OverrideFile(format!("schema mismatch at {path}: {}", err.into_inner()))
        })?;

        for (i, rule) in parsed.rules.iter().enumerate() {
            if parsed.rules[..i].iter().any(|r| r.local_id == rule.local_id) {
                return Err(RosterError::InvalidInput(format!(
                    "override for '{}' is listed more than once",
                    rule.local_id
                )));
            }
        }

        Ok(parsed)
    }

    /// Read and parse an override file from disk.
    pub fn from_path(path: &Path) -> RosterResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RosterError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverrideRule> {
        self.rules.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Configuration for one resolution run.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    overrides: OverrideRules,
    uuid_scheme: UuidScheme,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(OverrideRules::builtin())
    }
}

impl EngineConfig {
    pub fn new(overrides: OverrideRules) -> Self {
        Self {
            overrides,
            uuid_scheme: CURRENT_SCHEME,
        }
    }

    pub fn overrides(&self) -> &OverrideRules {
        &self.overrides
    }

    pub fn uuid_scheme(&self) -> UuidScheme {
        self.uuid_scheme
    }
}
