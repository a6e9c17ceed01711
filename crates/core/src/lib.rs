//! # Roster Core
//!
//! Identity resolution for the clinic patient migration.
//!
//! Clinic sites issue their own patient identifiers (CesIDs). The same identifier string
//! is reused across sites for unrelated people, while some people are registered at more
//! than one site. This crate turns the per-site rows into one canonical roster:
//!
//! 1. normalise rows and drop the unsalvageable ones ([`intake`]),
//! 2. force-split identifiers on the manual override list ([`overrides`]),
//! 3. merge rows with the same identifier and names ([`merge`]),
//! 4. split identifiers still shared by different people ([`split`]),
//! 5. attach a deterministic UUID to every record ([`uuid`]).
//!
//! The resulting [`Roster`] is persisted with [`RosterCache`] and queried through a
//! [`CrossReferenceIndex`] when encounter records are linked.
//!
//! Everything here is a single-threaded, in-memory batch transformation. The same input
//! always yields the same canonical ids and UUIDs.

pub mod cache;
pub mod config;
pub mod constants;
pub mod crossref;
pub mod diagnostics;
pub mod encounters;
pub mod error;
pub mod intake;
pub mod loader;
pub mod merge;
pub mod model;
pub mod overrides;
pub mod roster;
pub mod split;
pub mod uuid;

pub use cache::RosterCache;
pub use config::{EngineConfig, OverrideRule, OverrideRules};
pub use crossref::{BulkResolution, CrossReference, CrossReferenceIndex};
pub use diagnostics::{ConflictSeverity, Diagnostic, Diagnostics, DropReason};
pub use error::{RosterError, RosterResult};
pub use model::{
    CanonicalPatientRecord, HealthFlags, IdentityKey, PatientDetails, PatientRecord,
    RawPatientRow,
};
pub use roster::Roster;
pub use roster_types::NonEmptyText;
pub use roster_uuid::{PatientUuid, UuidScheme, CURRENT_SCHEME};

/// Output of one resolution run.
#[derive(Debug)]
pub struct Resolution {
    pub roster: Roster,
    /// Every advisory event, in the order the stages raised them.
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// Merge conflicts that suggest a new manual override rule.
    pub fn override_candidates(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_override_candidate())
    }
}

/// Runs the resolution stages in order.
#[derive(Clone, Debug, Default)]
pub struct IdentityEngine {
    config: EngineConfig,
}

impl IdentityEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Resolves raw site rows, in ingestion order, into a canonical roster.
    ///
    /// # Errors
    ///
    /// Only broken invariants halt the run: a generated identifier that a site already
    /// issued, a duplicate or blank canonical id after splitting, or a UUID collision. Everything else is reported in
    /// [`Resolution::diagnostics`].
    pub fn resolve(&self, rows: Vec<RawPatientRow>) -> RosterResult<Resolution> {
        let rows_in = rows.len();
        let mut diagnostics = Diagnostics::new();

        let records = intake::prepare_rows(rows, &mut diagnostics);
        let records =
            overrides::apply_overrides(records, self.config.overrides(), &mut diagnostics)?;
        let records = merge::merge_duplicates(records, &mut diagnostics);
        let records = split::split_residual_duplicates(records, &mut diagnostics);
        split::ensure_unique_ids(&records)?;
        let records = uuid::assign_uuids(records, self.config.uuid_scheme())?;

        tracing::info!(
            "resolved {} rows into {} canonical records ({} diagnostics)",
            rows_in,
            records.len(),
            diagnostics.events().len()
        );

        Ok(Resolution {
            roster: Roster::new(self.config.uuid_scheme(), records),
            diagnostics: diagnostics.into_events(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{row, row_born};

    fn engine() -> IdentityEngine {
        IdentityEngine::new(EngineConfig::new(OverrideRules::default()))
    }

    /// Three people share `1-0001`, each registered twice; Maria holds `1-0002` alone.
    fn split_rows() -> Vec<RawPatientRow> {
        vec![
            row("1-0001", "William", "Lopez", "Laguna"),
            row("1-0001", "Douglas", "Ruiz", "Soledad"),
            row("1-0001", "Ricky", "Santiz", "Salvador"),
            row("1-0002", "Maria", "Gomez", "Plan_Baja"),
            row("1-0001", "William", "Lopez", "Letrero"),
            row("1-0001", "Douglas", "Ruiz", "Matazano"),
            row("1-0001", "Ricky", "Santiz", "Salvador"),
            row("1-0002", "Maria", "Gomez", "Plan_Baja"),
        ]
    }

    #[test]
    fn test_split_scenario() {
        let resolution = engine().resolve(split_rows()).unwrap();
        let roster = &resolution.roster;

        let name_of = |id: &str| roster.get(id).map(|r| r.details().given_name.clone());
        assert_eq!(name_of("1-0001-1").as_deref(), Some("William"));
        assert_eq!(name_of("1-0001-2").as_deref(), Some("Douglas"));
        assert_eq!(name_of("1-0001-3").as_deref(), Some("Ricky"));
        assert!(roster.get("1-0001").is_none());
        assert_eq!(name_of("1-0002").as_deref(), Some("Maria"));
        assert_eq!(roster.len(), 4);

        let sites_of = |id: &str| roster.get(id).map(|r| r.record.origin_sites_joined());
        assert_eq!(sites_of("1-0001-1").as_deref(), Some("Laguna,Letrero"));
        assert_eq!(sites_of("1-0001-2").as_deref(), Some("Soledad,Matazano"));
        assert_eq!(sites_of("1-0001-3").as_deref(), Some("Salvador"));
        assert_eq!(sites_of("1-0002").as_deref(), Some("Plan_Baja"));
    }

    #[test]
    fn test_cross_reference_scenario() {
        let resolution = engine().resolve(split_rows()).unwrap();
        let index = resolution.roster.cross_reference_index();
        let mut diagnostics = Diagnostics::new();

        assert_eq!(index.resolve("1-0001", "Matazano", &mut diagnostics), "1-0001-2");
        assert_eq!(index.resolve("1-0002", "Plan_Baja", &mut diagnostics), "1-0002");
        assert!(diagnostics.events().is_empty());

        assert_eq!(index.resolve("1-0003", "Plan_Baja", &mut diagnostics), "1-0003");
        assert_eq!(diagnostics.events().len(), 1);
    }

    #[test]
    fn test_uniqueness_after_resolution() {
        let resolution = engine().resolve(split_rows()).unwrap();
        let mut ids: Vec<_> = resolution
            .roster
            .records()
            .iter()
            .map(|r| r.canonical_id().to_string())
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_determinism() {
        let first = engine().resolve(split_rows()).unwrap();
        let second = engine().resolve(split_rows()).unwrap();

        let pairs = |r: &Resolution| {
            r.roster
                .records()
                .iter()
                .map(|c| (c.canonical_id().to_string(), c.patient_uuid))
                .collect::<Vec<_>>()
        };
        assert_eq!(pairs(&first), pairs(&second));
        assert_eq!(first.diagnostics, second.diagnostics);
    }

    #[test]
    fn test_override_precedence() {
        let rows = vec![
            row_born("001-000020", "Rosa", "Hernandez", "Laguna", Some(1995)),
            row_born("001-000020", "Rosa", "Hernandez", "Soledad", Some(1970)),
            row("001-000020", "Rosa", "Hernandez", "Letrero"),
        ];
        let resolution = IdentityEngine::new(EngineConfig::default())
            .resolve(rows)
            .unwrap();

        let overridden: Vec<_> = resolution
            .roster
            .records()
            .iter()
            .filter(|r| r.canonical_id().starts_with("001-000020"))
            .collect();
        assert_eq!(overridden.len(), 2);
        assert_eq!(overridden[0].details().birth_year, Some(1995));
        assert_eq!(overridden[1].details().birth_year, Some(1970));
        assert_eq!(overridden[0].canonical_id(), "001-000020-1");
        assert_eq!(overridden[1].canonical_id(), "001-000020-2");
        assert!(resolution.override_candidates().next().is_none());
    }

    #[test]
    fn test_without_override_the_same_rows_conflict() {
        let rows = vec![
            row_born("001-000020", "Rosa", "Hernandez", "Laguna", Some(1995)),
            row_born("001-000020", "Rosa", "Hernandez", "Soledad", Some(1970)),
        ];
        let resolution = engine().resolve(rows).unwrap();

        assert_eq!(resolution.roster.len(), 1);
        assert_eq!(resolution.override_candidates().count(), 1);
    }

    #[test]
    fn test_merge_conflict_scenario() {
        let mut a = row("2-0100", "Pedro", "Santiz", "Laguna");
        a.details.conditions.hypertension = true;
        let mut b = row_born("2-0100", "Pedro", "Santiz", "Matazano", Some(1964));
        b.details.conditions.hypertension = false;

        let resolution = engine().resolve(vec![a, b]).unwrap();
        let record = resolution.roster.get("2-0100").unwrap();

        assert!(record.details().conditions.hypertension);
        assert_eq!(record.details().birth_year, Some(1964));
    }

    #[test]
    fn test_unsalvageable_rows_are_absent() {
        let rows = vec![
            row("1-0001", "William", "Lopez", "Laguna"),
            row("1-0009", " ", "", "Laguna"),
        ];
        let resolution = engine().resolve(rows).unwrap();

        assert_eq!(resolution.roster.len(), 1);
        assert!(resolution.roster.get("1-0009").is_none());
        assert!(resolution
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UnsalvageableRecord { local_id, .. } if local_id == "1-0009")));
    }

    #[test]
    fn test_override_suffix_collision_halts_run() {
        // Laguna issued 001-000020-1 itself; the override would hand the same id to Soledad.
        let rows = vec![
            row_born("001-000020-1", "Rosa", "Hernandez", "Laguna", Some(1995)),
            row_born("001-000020", "Rosa", "Hernandez", "Soledad", Some(1995)),
        ];
        match IdentityEngine::new(EngineConfig::default()).resolve(rows) {
            Err(RosterError::DuplicateCanonicalId { canonical_id, .. }) => {
                assert_eq!(canonical_id, "001-000020-1");
            }
            other => panic!("expected DuplicateCanonicalId, got {other:?}"),
        }
    }

    #[test]
    fn test_suffix_collision_halts_run() {
        let rows = vec![
            row("1-0001", "William", "Lopez", "Laguna"),
            row("1-0001", "Douglas", "Ruiz", "Soledad"),
            row("1-0001-2", "Ricky", "Santiz", "Salvador"),
        ];
        assert!(matches!(
            engine().resolve(rows),
            Err(RosterError::DuplicateCanonicalId { .. })
        ));
    }
}
