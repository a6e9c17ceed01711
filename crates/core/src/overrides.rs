//! Manual override: forced splits for identifiers known to collide.
//!
//! Runs before grouping so that rows listed here are never collapsed into one record,
//! even when they share an identity key.

use crate::config::{OverrideRule, OverrideRules};
use crate::diagnostics::{Diagnostic, Diagnostics, DropReason};
use crate::error::{RosterError, RosterResult};
use crate::model::PatientRecord;
use roster_types::suffixed_id;
use std::collections::HashMap;

/// Applies every rule in order. Rows not matched by any rule pass through untouched and
/// keep their position.
///
/// # Errors
///
/// Returns [`RosterError::DuplicateCanonicalId`] if a generated `<id>-<n>` is already
/// held by a row some site issued with that exact identifier.
pub fn apply_overrides(
    records: Vec<PatientRecord>,
    rules: &OverrideRules,
    diagnostics: &mut Diagnostics,
) -> RosterResult<Vec<PatientRecord>> {
    rules
        .iter()
        .try_fold(records, |records, rule| apply_rule(records, rule, diagnostics))
}

fn apply_rule(
    records: Vec<PatientRecord>,
    rule: &OverrideRule,
    diagnostics: &mut Diagnostics,
) -> RosterResult<Vec<PatientRecord>> {
    let target = rule.local_id.as_str();
    if !records.iter().any(|r| r.canonical_id == target) {
        return Ok(records);
    }

    let mut taken: HashMap<String, usize> = HashMap::new();
    for record in records.iter().filter(|r| r.canonical_id != target) {
        *taken.entry(record.canonical_id.clone()).or_insert(0) += 1;
    }

    let mut kept = Vec::with_capacity(records.len());
    let mut assigned = Vec::new();
    let mut dropped = 0usize;

    for mut record in records {
        if record.canonical_id != target {
            kept.push(record);
            continue;
        }

        if rule.drop_missing_birth_year && record.details.birth_year.is_none() {
            dropped += 1;
            let site = record.origin_sites_joined();
            diagnostics.emit(Diagnostic::UnsalvageableRecord {
                local_id: record.local_id,
                site,
                reason: DropReason::MissingBirthYear,
            });
            continue;
        }

        let canonical_id = suffixed_id(target, assigned.len() + 1);
        if let Some(held) = taken.get(&canonical_id) {
            return Err(RosterError::DuplicateCanonicalId {
                canonical_id,
                count: held + 1,
            });
        }
        record.canonical_id = canonical_id;
        assigned.push(record.canonical_id.clone());
        kept.push(record);
    }

    diagnostics.emit(Diagnostic::ManualOverrideApplied {
        local_id: target.to_string(),
        assigned,
        dropped,
    });

    Ok(kept)
}
