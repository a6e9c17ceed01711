//! Normalisation and the unsalvageable-row filter.
//!
//! Runs before any identity logic. Identifiers and names are whitespace-normalised so
//! that exact matching is not defeated by padding, and rows that can never become a
//! usable canonical record are dropped.

use crate::diagnostics::{Diagnostic, Diagnostics, DropReason};
use crate::model::{PatientRecord, RawPatientRow};
use roster_types::normalise_whitespace;

/// Normalises every row and lifts the survivors into single-site records, keeping
/// ingestion order.
pub fn prepare_rows(rows: Vec<RawPatientRow>, diagnostics: &mut Diagnostics) -> Vec<PatientRecord> {
    let mut prepared = Vec::with_capacity(rows.len());

    for row in rows {
        let row = normalise_row(row);

        let reason = if row.details.given_name.is_empty() && row.details.family_name.is_empty() {
            Some(DropReason::BlankName)
        } else if row.local_id.is_empty() {
            Some(DropReason::BlankIdentifier)
        } else {
            None
        };

        match reason {
            Some(reason) => diagnostics.emit(Diagnostic::UnsalvageableRecord {
                local_id: row.local_id,
                site: row.origin_site,
                reason,
            }),
            None => prepared.push(PatientRecord::from_row(row)),
        }
    }

    prepared
}

fn normalise_row(mut row: RawPatientRow) -> RawPatientRow {
    row.local_id = normalise_whitespace(&row.local_id);
    row.origin_site = normalise_whitespace(&row.origin_site);

    let details = &mut row.details;
    details.given_name = normalise_whitespace(&details.given_name);
    details.family_name = normalise_whitespace(&details.family_name);
    for text in [
        &mut details.sex,
        &mut details.community_code,
        &mut details.community,
        &mut details.hypertension_since,
        &mut details.diabetes_since,
        &mut details.epilepsy_since,
        &mut details.depression_since,
    ] {
        *text = normalise_whitespace(text);
    }
    details.notes = details.notes.trim().to_string();

    row
}
