//! Advisory events raised during resolution.
//!
//! Nothing here stops a run. Each stage records what it had to decide on its own
//! (conflicting field values, ambiguous lookups, dropped rows) so callers and tests can
//! inspect the exact events instead of scraping log output. Every event is also mirrored
//! to `tracing` as it is recorded.

use serde::Serialize;
use std::fmt;

/// How much attention a merge conflict deserves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    /// Ordinary disagreement; the first value was kept.
    Advisory,
    /// Disagreement on identity or birth date: the rows may be different people and the
    /// identifier probably belongs on the manual override list.
    ManualOverrideCandidate,
}

/// Why a raw row was dropped before resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Given and family name both blank after normalisation.
    BlankName,
    /// Local identifier blank after normalisation.
    BlankIdentifier,
    /// Matched a manual override rule that discards rows without a birth year.
    MissingBirthYear,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DropReason::BlankName => "blank given and family name",
            DropReason::BlankIdentifier => "blank identifier",
            DropReason::MissingBirthYear => "no birth year on an overridden identifier",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A duplicate group held two or more distinct non-missing values for one field.
    MergeFieldConflict {
        field: &'static str,
        severity: ConflictSeverity,
        local_id: String,
        given_name: String,
        family_name: String,
        /// Distinct values in first-seen order; the first was kept.
        values: Vec<String>,
    },
    /// More than one canonical record is registered for the pair.
    AmbiguousCrossReference {
        local_id: String,
        site: String,
        /// Matching canonical ids in roster order; the first was returned.
        candidates: Vec<String>,
    },
    /// No canonical record is registered for the pair; the identifier passed through.
    UnresolvedCrossReference { local_id: String, site: String },
    /// A row was removed from the roster.
    UnsalvageableRecord {
        local_id: String,
        site: String,
        reason: DropReason,
    },
    /// A manual override rule re-identified the rows holding `local_id`.
    ManualOverrideApplied {
        local_id: String,
        assigned: Vec<String>,
        dropped: usize,
    },
    /// An identifier still shared after merging was split across distinct people.
    ResidualDuplicateSplit {
        local_id: String,
        assigned: Vec<String>,
    },
}

impl Diagnostic {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Diagnostic::MergeFieldConflict { .. })
    }

    pub fn is_override_candidate(&self) -> bool {
        matches!(
            self,
            Diagnostic::MergeFieldConflict {
                severity: ConflictSeverity::ManualOverrideCandidate,
                ..
            }
        )
    }

    fn log(&self) {
        match self {
            Diagnostic::MergeFieldConflict { severity, .. } => match severity {
                ConflictSeverity::ManualOverrideCandidate => {
                    tracing::warn!("{} (consider a manual override)", self)
                }
                ConflictSeverity::Advisory => tracing::warn!("{}", self),
            },
            Diagnostic::AmbiguousCrossReference { .. } => tracing::warn!("{}", self),
            Diagnostic::UnresolvedCrossReference { .. } => tracing::debug!("{}", self),
            Diagnostic::UnsalvageableRecord { .. } => tracing::warn!("{}", self),
            Diagnostic::ManualOverrideApplied { .. } | Diagnostic::ResidualDuplicateSplit { .. } => {
                tracing::info!("{}", self)
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MergeFieldConflict {
                field,
                local_id,
                given_name,
                family_name,
                values,
                ..
            } => write!(
                f,
                "conflicting {field} for {local_id} ({given_name} {family_name}): {}; kept '{}'",
                values.join(" | "),
                values.first().map(String::as_str).unwrap_or_default()
            ),
            Diagnostic::AmbiguousCrossReference {
                local_id,
                site,
                candidates,
            } => write!(
                f,
                "{local_id} at {site} matches {} records ({}); using the first",
                candidates.len(),
                candidates.join(", ")
            ),
            Diagnostic::UnresolvedCrossReference { local_id, site } => {
                write!(f, "{local_id} at {site} is not in the roster; passing through")
            }
            Diagnostic::UnsalvageableRecord {
                local_id,
                site,
                reason,
            } => write!(f, "dropped row '{local_id}' from {site}: {reason}"),
            Diagnostic::ManualOverrideApplied {
                local_id,
                assigned,
                dropped,
            } => write!(
                f,
                "override {local_id}: assigned {}; dropped {dropped}",
                assigned.join(", ")
            ),
            Diagnostic::ResidualDuplicateSplit { local_id, assigned } => {
                write!(f, "split {local_id} into {}", assigned.join(", "))
            }
        }
    }
}

/// Ordered collector for [`Diagnostic`] events.
#[derive(Debug, Default)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs the event and keeps it.
    pub fn emit(&mut self, event: Diagnostic) {
        event.log();
        self.events.push(event);
    }

    pub fn events(&self) -> &[Diagnostic] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Diagnostic> {
        self.events
    }
}
