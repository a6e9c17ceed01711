//! UUID assignment.
//!
//! Attaches a [`PatientUuid`] derived from each canonical id. Must run after the splitter:
//! this stage does not repair duplicates, it only detects the symptom. A collision means
//! canonical-id uniqueness was broken upstream and the run stops, because downstream
//! systems key patients on the UUID.

use crate::error::{RosterError, RosterResult};
use crate::model::{CanonicalPatientRecord, PatientRecord};
use roster_uuid::{PatientUuid, UuidScheme};
use std::collections::HashMap;

/// Derives and attaches a UUID for every record.
///
/// # Errors
///
/// - [`RosterError::BlankCanonicalId`] if a record has no canonical id.
/// - [`RosterError::UuidCollision`] if two records end up with the same UUID.
pub fn assign_uuids(
    records: Vec<PatientRecord>,
    scheme: UuidScheme,
) -> RosterResult<Vec<CanonicalPatientRecord>> {
    let canonical = records
        .into_iter()
        .map(|record| {
            if record.canonical_id.trim().is_empty() {
                return Err(RosterError::BlankCanonicalId {
                    local_id: record.local_id,
                });
            }
            Ok(CanonicalPatientRecord {
                patient_uuid: PatientUuid::derive(scheme, &record.canonical_id),
                record,
            })
        })
        .collect::<RosterResult<Vec<_>>>()?;

    ensure_unique_uuids(&canonical)?;
    Ok(canonical)
}

/// Fails on the first UUID held by two records, in roster order.
pub fn ensure_unique_uuids(records: &[CanonicalPatientRecord]) -> RosterResult<()> {
    let mut seen: HashMap<PatientUuid, &str> = HashMap::with_capacity(records.len());
    for record in records {
        if let Some(first) = seen.insert(record.patient_uuid, record.canonical_id()) {
            return Err(RosterError::UuidCollision {
                uuid: record.patient_uuid,
                first: first.to_string(),
                second: record.canonical_id().to_string(),
            });
        }
    }
    Ok(())
}
