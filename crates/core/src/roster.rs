//! The frozen canonical roster.

use crate::crossref::CrossReferenceIndex;
use crate::model::CanonicalPatientRecord;
use roster_uuid::UuidScheme;

/// Canonical patient records in roster order, each with a unique canonical id and UUID.
///
/// Only the engine and the cache loader construct a `Roster`, and both check the
/// uniqueness invariants first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roster {
    uuid_scheme: UuidScheme,
    records: Vec<CanonicalPatientRecord>,
}

impl Roster {
    pub(crate) fn new(uuid_scheme: UuidScheme, records: Vec<CanonicalPatientRecord>) -> Self {
        Self {
            uuid_scheme,
            records,
        }
    }

    pub fn uuid_scheme(&self) -> UuidScheme {
        self.uuid_scheme
    }

    pub fn records(&self) -> &[CanonicalPatientRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, canonical_id: &str) -> Option<&CanonicalPatientRecord> {
        self.records.iter().find(|r| r.canonical_id() == canonical_id)
    }

    /// Builds the cross-reference index for this roster version.
    pub fn cross_reference_index(&self) -> CrossReferenceIndex {
        CrossReferenceIndex::build(&self.records)
    }
}
