//! Persisted roster cache.
//!
//! Resolving every site extract is slow enough that runs reuse the previous roster. A
//! loaded cache must be interchangeable with a fresh resolution, so loading re-derives
//! every UUID from its canonical id and refuses anything that does not match.
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "uuid_scheme": "v1",
//!   "records": [ { "patient_uuid": "...", "canonical_id": "...", ... } ]
//! }
//! ```

use crate::constants::CACHE_FORMAT_VERSION;
use crate::error::{RosterError, RosterResult};
use crate::model::CanonicalPatientRecord;
use crate::roster::Roster;
use crate::split::ensure_unique_ids;
use crate::uuid::ensure_unique_uuids;
use roster_uuid::{PatientUuid, UuidScheme};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct CacheFileRef<'a> {
    format_version: u32,
    uuid_scheme: &'a str,
    records: &'a [CanonicalPatientRecord],
}

#[derive(Deserialize)]
struct CacheFile {
    format_version: u32,
    uuid_scheme: String,
    records: Vec<CanonicalPatientRecord>,
}

/// Roster cache operations.
///
/// Zero-sized namespace; all methods are associated functions.
pub struct RosterCache;

impl RosterCache {
    /// Writes the roster to `path` as pretty JSON.
    ///
    /// The file is written to a temporary sibling first and renamed into place, so an
    /// interrupted run never leaves a truncated cache behind.
    pub fn save(path: &Path, roster: &Roster) -> RosterResult<()> {
        let file = CacheFileRef {
            format_version: CACHE_FORMAT_VERSION,
            uuid_scheme: roster.uuid_scheme().as_str(),
            records: roster.records(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(RosterError::Serialization)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RosterError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| RosterError::FileWrite {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| RosterError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("wrote {} records to {}", roster.len(), path.display());
        Ok(())
    }

    /// Loads and verifies a cached roster.
    ///
    /// # Errors
    ///
    /// - [`RosterError::FileRead`] / [`RosterError::Deserialization`] for unreadable files.
    /// - [`RosterError::CacheMismatch`] if the format version differs from this build, or
    ///   any stored UUID differs from a fresh derivation.
    /// - [`RosterError::Uuid`] if the cache names a UUID scheme this build does not know.
    /// - [`RosterError::DuplicateCanonicalId`] / [`RosterError::UuidCollision`] if the
    ///   stored records break roster uniqueness.
    pub fn load(path: &Path) -> RosterResult<Roster> {
        let text = fs::read_to_string(path).map_err(|source| RosterError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CacheFile = serde_json::from_str(&text).map_err(RosterError::Deserialization)?;

        if file.format_version != CACHE_FORMAT_VERSION {
            return Err(RosterError::CacheMismatch(format!(
                "format version {} (expected {})",
                file.format_version, CACHE_FORMAT_VERSION
            )));
        }

        let scheme: UuidScheme = file.uuid_scheme.parse()?;

        for record in &file.records {
            if !record.patient_uuid.matches(scheme, record.canonical_id()) {
                return Err(RosterError::CacheMismatch(format!(
                    "{} is stored with UUID {} but derives {}",
                    record.canonical_id(),
                    record.patient_uuid,
                    PatientUuid::derive(scheme, record.canonical_id())
                )));
            }
        }

        ensure_unique_ids(file.records.iter().map(|r| &r.record))?;
        ensure_unique_uuids(&file.records)?;

        tracing::info!("loaded {} records from {}", file.records.len(), path.display());
        Ok(Roster::new(scheme, file.records))
    }

    /// Loads the cache if it exists and is valid; `None` otherwise.
    ///
    /// An invalid cache is logged and ignored so the caller falls back to a fresh run.
    pub fn load_if_valid(path: &Path) -> Option<Roster> {
        if !path.is_file() {
            return None;
        }
        match Self::load(path) {
            Ok(roster) => Some(roster),
            Err(e) => {
                tracing::warn!("ignoring roster cache {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, OverrideRules};
    use crate::model::fixtures::{row, row_born};
    use crate::IdentityEngine;
    use tempfile::TempDir;

    fn resolved() -> Roster {
        let mut hypertensive = row_born("2-0100", "Pedro", "Santiz", "Laguna", Some(1964));
        hypertensive.details.conditions.hypertension = true;
        hypertensive.details.registration_date = chrono::NaiveDate::from_ymd_opt(2015, 1, 9);
        let rows = vec![
            row("1-0001", "William", "Lopez", "Laguna"),
            row("1-0001", "Douglas", "Ruiz", "Soledad"),
            hypertensive,
            row("2-0100", "Pedro", "Santiz", "Matazano"),
        ];
        IdentityEngine::new(EngineConfig::new(OverrideRules::default()))
            .resolve(rows)
            .expect("resolution should succeed")
            .roster
    }

    #[test]
    fn test_round_trip_preserves_uuids() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("roster.json");
        let roster = resolved();

        RosterCache::save(&path, &roster).expect("save should succeed");
        let loaded = RosterCache::load(&path).expect("load should succeed");

        assert_eq!(loaded, roster);
        let fresh: Vec<_> = resolved().records().iter().map(|r| r.patient_uuid).collect();
        let cached: Vec<_> = loaded.records().iter().map(|r| r.patient_uuid).collect();
        assert_eq!(fresh, cached);
        assert!(!temp_dir.path().join("nested").join("roster.json.tmp").exists());
    }

    #[test]
    fn test_load_rejects_tampered_uuid() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("roster.json");
        RosterCache::save(&path, &resolved()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut json: serde_json::Value = serde_json::from_str(&text).unwrap();
        json["records"][0]["canonical_id"] = serde_json::Value::String("1-0001-9".into());
        fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

        assert!(matches!(
            RosterCache::load(&path),
            Err(RosterError::CacheMismatch(_))
        ));
        assert!(RosterCache::load_if_valid(&path).is_none());
    }

    #[test]
    fn test_load_rejects_other_format_version() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("roster.json");
        fs::write(
            &path,
            r#"{"format_version": 99, "uuid_scheme": "v1", "records": []}"#,
        )
        .unwrap();

        match RosterCache::load(&path) {
            Err(RosterError::CacheMismatch(msg)) => assert!(msg.contains("99")),
            other => panic!("expected CacheMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_unknown_scheme() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("roster.json");
        fs::write(
            &path,
            r#"{"format_version": 1, "uuid_scheme": "v7", "records": []}"#,
        )
        .unwrap();

        assert!(matches!(
            RosterCache::load(&path),
            Err(RosterError::Uuid(roster_uuid::UuidError::UnknownScheme(scheme))) if scheme == "v7"
        ));
    }

    #[test]
    fn test_origin_sites_with_commas_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("roster.json");
        let rows = vec![
            row("4-0001", "Ana", "Gomez", "Plan, Baja"),
            row("4-0001", "Ana", "Gomez", "Laguna"),
        ];
        let roster = IdentityEngine::new(EngineConfig::new(OverrideRules::default()))
            .resolve(rows)
            .unwrap()
            .roster;

        RosterCache::save(&path, &roster).unwrap();
        let loaded = RosterCache::load(&path).unwrap();

        assert_eq!(loaded, roster);
        let mut diagnostics = crate::Diagnostics::new();
        let index = loaded.cross_reference_index();
        assert_eq!(index.resolve("4-0001", "Plan, Baja", &mut diagnostics), "4-0001");
        assert!(diagnostics.events().is_empty());
    }

    #[test]
    fn test_load_if_valid_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        assert!(RosterCache::load_if_valid(&temp_dir.path().join("absent.json")).is_none());
    }
}
