//! Cross-reference from (local identifier, origin site) to canonical identifier.
//!
//! Encounter records only carry the identifier a site issued and the site's name. The
//! index registers, for every canonical record and every site in its provenance list,
//! `(record.local_id, site) -> canonical_id`. Match lists keep roster order so the
//! first-match tie-break is stable.
//!
//! The index is built once per roster and is read-only afterwards, so any number of
//! lookups can share it.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{RosterError, RosterResult};
use crate::model::CanonicalPatientRecord;
use roster_types::normalise_whitespace;
use std::collections::HashMap;

/// Outcome of looking a pair up, before any fallback is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CrossReference<'a> {
    /// Nothing registered for the pair.
    Unresolved,
    /// Exactly one canonical record.
    Unique(&'a str),
    /// Several canonical records, in roster order.
    Ambiguous(Vec<&'a str>),
}

/// Result of resolving many pairs at once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkResolution {
    /// One canonical id per query, same order as the input.
    pub canonical_ids: Vec<String>,
    /// Roster position of the record each query resolved to; `None` when the identifier
    /// fell through unresolved.
    pub positions: Vec<Option<usize>>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Debug, Default)]
pub struct CrossReferenceIndex {
    canonical_ids: Vec<String>,
    /// site -> local id -> positions in `canonical_ids`, ascending.
    entries: HashMap<String, HashMap<String, Vec<usize>>>,
}

impl CrossReferenceIndex {
    pub fn build(records: &[CanonicalPatientRecord]) -> Self {
        let mut entries: HashMap<String, HashMap<String, Vec<usize>>> = HashMap::new();
        let mut canonical_ids = Vec::with_capacity(records.len());

        for (position, record) in records.iter().enumerate() {
            canonical_ids.push(record.canonical_id().to_string());
            for site in record.origin_sites() {
                let matches = entries
                    .entry(site.clone())
                    .or_default()
                    .entry(record.local_id().to_string())
                    .or_default();
                // A record lists each site once, but guard against hand-edited caches.
                if matches.last() != Some(&position) {
                    matches.push(position);
                }
            }
        }

        tracing::debug!(
            "built cross-reference index over {} records and {} sites",
            canonical_ids.len(),
            entries.len()
        );

        Self {
            canonical_ids,
            entries,
        }
    }

    /// Looks a pair up without applying the fallback.
    pub fn lookup(&self, local_id: &str, site: &str) -> CrossReference<'_> {
        match self.positions(local_id, site) {
            [] => CrossReference::Unresolved,
            [only] => CrossReference::Unique(&self.canonical_ids[*only]),
            many => CrossReference::Ambiguous(
                many.iter().map(|&i| self.canonical_ids[i].as_str()).collect(),
            ),
        }
    }

    /// Resolves a pair to the roster position of its canonical record.
    ///
    /// Returns `None` when nothing is registered for the pair. With several matches the
    /// first in roster order wins and an ambiguity warning is recorded.
    pub fn resolve_position(
        &self,
        local_id: &str,
        site: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<usize> {
        match self.positions(local_id, site) {
            [] => {
                diagnostics.emit(Diagnostic::UnresolvedCrossReference {
                    local_id: local_id.to_string(),
                    site: site.to_string(),
                });
                None
            }
            [only] => Some(*only),
            many => {
                diagnostics.emit(Diagnostic::AmbiguousCrossReference {
                    local_id: local_id.to_string(),
                    site: site.to_string(),
                    candidates: many.iter().map(|&i| self.canonical_ids[i].clone()).collect(),
                });
                Some(many[0])
            }
        }
    }

    /// Resolves a pair to a canonical id.
    ///
    /// - no match: the query's identifier is returned unchanged,
    /// - one match: its canonical id,
    /// - several: the first in roster order, with an ambiguity warning.
    pub fn resolve(&self, local_id: &str, site: &str, diagnostics: &mut Diagnostics) -> String {
        match self.resolve_position(local_id, site, diagnostics) {
            Some(position) => self.canonical_ids[position].clone(),
            None => local_id.to_string(),
        }
    }

    /// Element-wise [`resolve`](Self::resolve) over parallel sequences.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::InvalidInput`] if the sequences differ in length.
    pub fn resolve_many<S, T>(&self, local_ids: &[S], sites: &[T]) -> RosterResult<BulkResolution>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        if local_ids.len() != sites.len() {
            return Err(RosterError::InvalidInput(format!(
                "got {} identifiers but {} sites",
                local_ids.len(),
                sites.len()
            )));
        }

        let mut diagnostics = Diagnostics::new();
        let positions: Vec<Option<usize>> = local_ids
            .iter()
            .zip(sites)
            .map(|(id, site)| {
                self.resolve_position(id.as_ref(), site.as_ref(), &mut diagnostics)
            })
            .collect();
        let canonical_ids = positions
            .iter()
            .zip(local_ids)
            .map(|(position, id)| match position {
                Some(p) => self.canonical_ids[*p].clone(),
                None => id.as_ref().to_string(),
            })
            .collect();

        Ok(BulkResolution {
            canonical_ids,
            positions,
            diagnostics: diagnostics.into_events(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered positions for a pair, ascending.
    fn positions(&self, local_id: &str, site: &str) -> &[usize] {
        let local_id = normalise_whitespace(local_id);
        let site = normalise_whitespace(site);

        self.entries
            .get(&site)
            .and_then(|by_id| by_id.get(&local_id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
