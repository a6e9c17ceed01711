//! Residual-duplicate splitter and the canonical-id uniqueness check.
//!
//! After merging, an identifier still held by several records belongs to different
//! people: same site-scoped number issued at different sites, different names. Each
//! holder gets `<id>-<n>` in roster order. Unlike the manual override, nothing is dropped.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{RosterError, RosterResult};
use crate::model::PatientRecord;
use roster_types::suffixed_id;
use std::collections::HashMap;

/// Renames every record whose canonical id is shared.
pub fn split_residual_duplicates(
    mut records: Vec<PatientRecord>,
    diagnostics: &mut Diagnostics,
) -> Vec<PatientRecord> {
    let counts: HashMap<String, usize> = count_ids(&records)
        .into_iter()
        .map(|(id, count)| (id.to_string(), count))
        .collect();

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut assigned: Vec<(String, Vec<String>)> = Vec::new();

    for record in records.iter_mut() {
        if counts.get(&record.canonical_id).copied().unwrap_or(0) < 2 {
            continue;
        }

        let base = std::mem::take(&mut record.canonical_id);
        let position = positions.entry(base.clone()).or_insert(0);
        *position += 1;
        record.canonical_id = suffixed_id(&base, *position);

        match assigned.iter_mut().find(|(id, _)| *id == base) {
            Some((_, ids)) => ids.push(record.canonical_id.clone()),
            None => assigned.push((base, vec![record.canonical_id.clone()])),
        }
    }

    for (local_id, assigned) in assigned {
        diagnostics.emit(Diagnostic::ResidualDuplicateSplit { local_id, assigned });
    }

    records
}

/// Fails if any canonical id is blank or held by more than one record.
///
/// # Errors
///
/// Returns [`RosterError::BlankCanonicalId`] or [`RosterError::DuplicateCanonicalId`].
/// Either means an earlier stage broke its contract; the run must stop.
pub fn ensure_unique_ids<'a, I>(records: I) -> RosterResult<()>
where
    I: IntoIterator<Item = &'a PatientRecord>,
    I::IntoIter: Clone,
{
    let records = records.into_iter();

    if let Some(blank) = records.clone().find(|r| r.canonical_id.trim().is_empty()) {
        return Err(RosterError::BlankCanonicalId {
            local_id: blank.local_id.clone(),
        });
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records.clone() {
        *counts.entry(record.canonical_id.as_str()).or_insert(0) += 1;
    }

    // Report in roster order so the error is deterministic.
    for record in records {
        let count = counts[record.canonical_id.as_str()];
        if count > 1 {
            return Err(RosterError::DuplicateCanonicalId {
                canonical_id: record.canonical_id.clone(),
                count,
            });
        }
    }

    Ok(())
}

fn count_ids(records: &[PatientRecord]) -> HashMap<&str, usize> {
    let mut counts = HashMap::with_capacity(records.len());
    for record in records {
        *counts.entry(record.canonical_id.as_str()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::record;

    fn split_scenario() -> Vec<PatientRecord> {
        vec![
            record("1-0001", "William", &["Laguna"]),
            record("1-0001", "Douglas", &["Soledad"]),
            record("1-0002", "Maria", &["Laguna"]),
            record("1-0001", "Ricky", &["Salvador"]),
            record("1-0002", "Juana", &["Soledad"]),
        ]
    }

    #[test]
    fn test_splits_in_roster_order() {
        let mut diagnostics = Diagnostics::new();
        let out = split_residual_duplicates(split_scenario(), &mut diagnostics);

        let by_name = |name: &str| {
            out.iter()
                .find(|r| r.details.given_name == name)
                .map(|r| r.canonical_id.clone())
                .unwrap()
        };
        assert_eq!(by_name("William"), "1-0001-1");
        assert_eq!(by_name("Douglas"), "1-0001-2");
        assert_eq!(by_name("Ricky"), "1-0001-3");
        assert_eq!(by_name("Maria"), "1-0002-1");
        assert_eq!(by_name("Juana"), "1-0002-2");
        assert!(out.iter().all(|r| r.canonical_id != "1-0001"));
        assert!(out.iter().all(|r| r.local_id == "1-0001" || r.local_id == "1-0002"));
        assert!(ensure_unique_ids(&out).is_ok());

        assert_eq!(
            diagnostics.events()[0],
            Diagnostic::ResidualDuplicateSplit {
                local_id: "1-0001".into(),
                assigned: vec!["1-0001-1".into(), "1-0001-2".into(), "1-0001-3".into()],
            }
        );
    }

    #[test]
    fn test_unique_ids_are_untouched() {
        let input = vec![
            record("1-0001", "William", &["Laguna"]),
            record("1-0002", "Maria", &["Laguna"]),
        ];
        let mut diagnostics = Diagnostics::new();
        let out = split_residual_duplicates(input.clone(), &mut diagnostics);

        assert_eq!(out, input);
        assert!(diagnostics.events().is_empty());
    }

    #[test]
    fn test_ensure_unique_ids_detects_collision_with_existing_suffix() {
        // A site that already issued "1-0001-1" collides with the split result.
        let input = vec![
            record("1-0001", "William", &["Laguna"]),
            record("1-0001", "Douglas", &["Soledad"]),
            record("1-0001-1", "Ricky", &["Salvador"]),
        ];
        let mut diagnostics = Diagnostics::new();
        let out = split_residual_duplicates(input, &mut diagnostics);

        match ensure_unique_ids(&out) {
            Err(RosterError::DuplicateCanonicalId {
                canonical_id,
                count,
            }) => {
                assert_eq!(canonical_id, "1-0001-1");
                assert_eq!(count, 2);
            }
            other => panic!("expected DuplicateCanonicalId, got {other:?}"),
        }
    }

    #[test]
    fn test_ensure_unique_ids_rejects_blank() {
        let mut blank = record("1-0005", "Ana", &["Laguna"]);
        blank.canonical_id = " ".into();
        assert!(matches!(
            ensure_unique_ids(&[blank][..]),
            Err(RosterError::BlankCanonicalId { .. })
        ));
    }
}
