//! Duplicate grouper and merger.
//!
//! Rows sharing an [`IdentityKey`] are the same person and collapse into one record.
//!
//! Ordering is fixed so results are reproducible:
//! - groups are formed in first-appearance order over the ingestion order,
//! - rows inside a group stay in ingestion order ("first" below means first in that order),
//! - singleton rows keep their relative order, and each merged record is appended after
//!   all singletons, in group first-appearance order.
//!
//! Field rules for a group of two or more rows:
//! - identifiers come from the first row (the identity key makes them equal),
//! - names come from the first row,
//! - origin sites are the order-preserving union of every row's sites,
//! - for every other field the first non-missing value wins, and disagreement between
//!   non-missing values is reported as a [`Diagnostic::MergeFieldConflict`],
//! - health flags are OR-ed: losing a recorded condition is worse than a false positive.

use crate::diagnostics::{ConflictSeverity, Diagnostic, Diagnostics};
use crate::model::{HealthFlags, IdentityKey, PatientDetails, PatientRecord};
use std::collections::HashMap;
use std::fmt::Display;

/// Groups records by identity key and collapses each group.
pub fn merge_duplicates(
    records: Vec<PatientRecord>,
    diagnostics: &mut Diagnostics,
) -> Vec<PatientRecord> {
    let groups = group_by_identity(records);

    let mut singletons = Vec::with_capacity(groups.len());
    let mut merged = Vec::new();
    for mut group in groups {
        if group.len() == 1 {
            singletons.extend(group.pop());
        } else {
            merged.push(merge_group(&group, diagnostics));
        }
    }

    if !merged.is_empty() {
        tracing::debug!("merged {} duplicate groups", merged.len());
    }

    singletons.extend(merged);
    singletons
}

/// Splits records into identity groups, preserving first-appearance order of groups and
/// ingestion order within each group.
pub fn group_by_identity(records: Vec<PatientRecord>) -> Vec<Vec<PatientRecord>> {
    let mut index: HashMap<IdentityKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<PatientRecord>> = Vec::new();

    for record in records {
        let key = record.identity_key();
        match index.get(&key) {
            Some(&i) => groups[i].push(record),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![record]);
            }
        }
    }

    groups
}

/// Collapses one duplicate group into a single record. `group` must not be empty.
fn merge_group(group: &[PatientRecord], diagnostics: &mut Diagnostics) -> PatientRecord {
    let first = &group[0];
    let mut merger = FieldMerger {
        group,
        diagnostics,
    };

    use ConflictSeverity::{Advisory, ManualOverrideCandidate};

    let given_name = merger.detail_text("given_name", ManualOverrideCandidate, |d| &d.given_name);
    let family_name =
        merger.detail_text("family_name", ManualOverrideCandidate, |d| &d.family_name);

    let details = PatientDetails {
        given_name,
        family_name,
        sex: merger.detail_text("sex", Advisory, |d| &d.sex),
        community_code: merger.detail_text("community_code", Advisory, |d| &d.community_code),
        community: merger.detail_text("community", Advisory, |d| &d.community),
        birth_year: merger.optional("birth_year", ManualOverrideCandidate, |d| d.birth_year),
        birth_month: merger.optional("birth_month", ManualOverrideCandidate, |d| d.birth_month),
        birth_day: merger.optional("birth_day", ManualOverrideCandidate, |d| d.birth_day),
        registration_date: merger.optional("registration_date", Advisory, |d| {
            d.registration_date
        }),
        conditions: group
            .iter()
            .fold(HealthFlags::default(), |acc, r| acc.union(r.details.conditions)),
        hypertension_since: merger.detail_text("hypertension_since", Advisory, |d| {
            &d.hypertension_since
        }),
        diabetes_since: merger.detail_text("diabetes_since", Advisory, |d| &d.diabetes_since),
        epilepsy_since: merger.detail_text("epilepsy_since", Advisory, |d| &d.epilepsy_since),
        depression_since: merger.detail_text("depression_since", Advisory, |d| {
            &d.depression_since
        }),
        notes: merger.detail_text("notes", Advisory, |d| &d.notes),
    };

    PatientRecord {
        canonical_id: first.canonical_id.clone(),
        local_id: first.local_id.clone(),
        origin_sites: union_sites(group),
        details,
    }
}

/// Order-preserving, deduplicated union of every record's origin sites.
fn union_sites(group: &[PatientRecord]) -> Vec<String> {
    let mut sites: Vec<String> = Vec::new();
    for site in group.iter().flat_map(|r| r.origin_sites.iter()) {
        if !sites.contains(site) {
            sites.push(site.clone());
        }
    }
    sites
}

struct FieldMerger<'a> {
    group: &'a [PatientRecord],
    diagnostics: &'a mut Diagnostics,
}

impl FieldMerger<'_> {
    /// Text field; empty means missing.
    fn detail_text(
        &mut self,
        field: &'static str,
        severity: ConflictSeverity,
        get: impl Fn(&PatientDetails) -> &String,
    ) -> String {
        let values: Vec<Option<String>> = self
            .group
            .iter()
            .map(|r| Some(get(&r.details)).filter(|v| !v.is_empty()).cloned())
            .collect();
        self.first_distinct(field, severity, values)
            .unwrap_or_default()
    }

    /// Optional field; `None` means missing.
    fn optional<T>(
        &mut self,
        field: &'static str,
        severity: ConflictSeverity,
        get: impl Fn(&PatientDetails) -> Option<T>,
    ) -> Option<T>
    where
        T: PartialEq + Display,
    {
        let values: Vec<Option<T>> = self.group.iter().map(|r| get(&r.details)).collect();
        self.first_distinct(field, severity, values)
    }

    fn first_distinct<T>(
        &mut self,
        field: &'static str,
        severity: ConflictSeverity,
        values: Vec<Option<T>>,
    ) -> Option<T>
    where
        T: PartialEq + Display,
    {
        let mut distinct: Vec<T> = Vec::new();
        for value in values.into_iter().flatten() {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }

        if distinct.len() > 1 {
            let first = &self.group[0];
            self.diagnostics.emit(Diagnostic::MergeFieldConflict {
                field,
                severity,
                local_id: first.canonical_id.clone(),
                given_name: first.details.given_name.clone(),
                family_name: first.details.family_name.clone(),
                values: distinct.iter().map(ToString::to_string).collect(),
            });
        }

        distinct.into_iter().next()
    }
}
