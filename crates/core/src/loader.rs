//! Site extract loader.
//!
//! Each clinic site exports two CSV files into the sites directory:
//!
//! ```text
//! sites/
//!   Laguna_patients.csv       # one row per patient registered at Laguna
//!   Laguna_communities.csv    # code,name
//!   Soledad_patients.csv
//!   Soledad_communities.csv
//! ```
//!
//! Rows are read into a wire struct that accepts whatever the site typed, then converted
//! into [`RawPatientRow`] with the community name filled in and the site name attached.
//! Sites are read in file-name order, which fixes the ingestion order the engine's
//! tie-breaks depend on.

use crate::constants::{COMMUNITIES_FILE_SUFFIX, PATIENTS_FILE_SUFFIX};
use crate::error::{RosterError, RosterResult};
use crate::model::{HealthFlags, PatientDetails, RawPatientRow};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Wire models
// ============================================================================

/// One row of `<Site>_patients.csv`, exactly as exported.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PatientWire {
    cesid: String,
    given_name: String,
    family_name: String,
    sex: String,
    community_code: String,
    birth_year: String,
    birth_month: String,
    birth_day: String,
    registration_date: String,
    hypertension: String,
    diabetes: String,
    asthma: String,
    epilepsy: String,
    depression: String,
    anxiety: String,
    malnutrition: String,
    pregnancy: String,
    hypertension_since: String,
    diabetes_since: String,
    epilepsy_since: String,
    depression_since: String,
    notes: String,
}

/// One row of `<Site>_communities.csv`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommunityWire {
    code: String,
    name: String,
}

// ============================================================================
// Public API
// ============================================================================

/// Names of the sites with a patient extract in `dir`, sorted.
pub fn discover_sites(dir: &Path) -> RosterResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|source| RosterError::FileRead {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut sites: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let site = name.strip_suffix(PATIENTS_FILE_SUFFIX)?;
            (!site.is_empty() && entry.path().is_file()).then(|| site.to_string())
        })
        .collect();
    sites.sort();
    Ok(sites)
}

/// Loads every site in `dir`, in site-name order.
pub fn load_sites(dir: &Path) -> RosterResult<Vec<RawPatientRow>> {
    let sites = discover_sites(dir)?;
    if sites.is_empty() {
        return Err(RosterError::InvalidInput(format!(
            "no *{} files found in {}",
            PATIENTS_FILE_SUFFIX,
            dir.display()
        )));
    }

    let mut rows = Vec::new();
    for site in &sites {
        let site_rows = load_site(dir, site)?;
        tracing::info!("loaded {} rows from {}", site_rows.len(), site);
        rows.extend(site_rows);
    }
    Ok(rows)
}

/// Loads one site's patients with community names denormalised onto each row.
///
/// A missing community table is tolerated: rows keep their code and get a blank name.
pub fn load_site(dir: &Path, site: &str) -> RosterResult<Vec<RawPatientRow>> {
    let communities_path = dir.join(format!("{site}{COMMUNITIES_FILE_SUFFIX}"));
    let communities = if communities_path.is_file() {
        read_communities(&communities_path)?
    } else {
        tracing::warn!("{} has no community table", site);
        HashMap::new()
    };

    let patients_path = dir.join(format!("{site}{PATIENTS_FILE_SUFFIX}"));
    let wires: Vec<PatientWire> = read_csv(&patients_path)?;

    Ok(wires
        .into_iter()
        .map(|wire| wire_to_row(wire, site, &communities))
        .collect())
}

// ============================================================================
// Helpers
// ============================================================================

fn read_csv<T>(path: &Path) -> RosterResult<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    let csv_err = |source| RosterError::CsvRead {
        path: PathBuf::from(path),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_err)
}

fn read_communities(path: &Path) -> RosterResult<HashMap<String, String>> {
    let rows: Vec<CommunityWire> = read_csv(path)?;
    Ok(rows
        .into_iter()
        .filter(|c| !c.code.is_empty())
        .map(|c| (c.code, c.name))
        .collect())
}

fn wire_to_row(wire: PatientWire, site: &str, communities: &HashMap<String, String>) -> RawPatientRow {
    let community = communities
        .get(&wire.community_code)
        .cloned()
        .unwrap_or_default();

    RawPatientRow {
        local_id: wire.cesid,
        origin_site: site.to_string(),
        details: PatientDetails {
            given_name: wire.given_name,
            family_name: wire.family_name,
            sex: wire.sex,
            community_code: wire.community_code,
            community,
            birth_year: parse_int(&wire.birth_year),
            birth_month: parse_int(&wire.birth_month),
            birth_day: parse_int(&wire.birth_day),
            registration_date: parse_date(&wire.registration_date),
            conditions: HealthFlags {
                hypertension: parse_flag(&wire.hypertension),
                diabetes: parse_flag(&wire.diabetes),
                asthma: parse_flag(&wire.asthma),
                epilepsy: parse_flag(&wire.epilepsy),
                depression: parse_flag(&wire.depression),
                anxiety: parse_flag(&wire.anxiety),
                malnutrition: parse_flag(&wire.malnutrition),
                pregnancy: parse_flag(&wire.pregnancy),
            },
            hypertension_since: wire.hypertension_since,
            diabetes_since: wire.diabetes_since,
            epilepsy_since: wire.epilepsy_since,
            depression_since: wire.depression_since,
            notes: wire.notes,
        },
    }
}

/// Sites record flags as `1`, `TRUE`, `si`, `x`... anything unrecognised counts as not
/// recorded.
fn parse_flag(value: &str) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "si" | "sí" | "x" => true,
        "" | "0" | "false" | "f" | "no" | "n" => false,
        other => {
            tracing::debug!("unrecognised flag value '{}'; treating as false", other);
            false
        }
    }
}

fn parse_int<T: std::str::FromStr>(value: &str) -> Option<T> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    // Spreadsheet exports turn 1987 into 1987.0.
    let value = value.strip_suffix(".0").unwrap_or(value);
    value.parse().ok()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "cesid,given_name,family_name,sex,community_code,birth_year,birth_month,birth_day,registration_date,hypertension,diabetes,asthma,epilepsy,depression,anxiety,malnutrition,pregnancy,hypertension_since,diabetes_since,epilepsy_since,depression_since,notes";

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("Failed to write fixture");
    }

    #[test]
    fn test_load_site_denormalises_communities() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        write(
            temp_dir.path(),
            "Laguna_patients.csv",
            &format!(
                "{HEADER}\n1-0001,William,Lopez,M,07,1987.0,3,,2016-04-02,1,0,,,,,,,2015,,,,\n1-0002,Ana,Gomez,F,99,,,,02/05/2017,si,TRUE,,,,,,,,,,,seen twice\n"
            ),
        );
        write(
            temp_dir.path(),
            "Laguna_communities.csv",
            "code,name\n07,Laguna del Cofre\n08,Letrero\n",
        );

        let rows = load_site(temp_dir.path(), "Laguna").unwrap();
        assert_eq!(rows.len(), 2);

        let william = &rows[0];
        assert_eq!(william.local_id, "1-0001");
        assert_eq!(william.origin_site, "Laguna");
        assert_eq!(william.details.community, "Laguna del Cofre");
        assert_eq!(william.details.birth_year, Some(1987));
        assert_eq!(william.details.birth_month, Some(3));
        assert_eq!(william.details.birth_day, None);
        assert_eq!(
            william.details.registration_date,
            NaiveDate::from_ymd_opt(2016, 4, 2)
        );
        assert!(william.details.conditions.hypertension);
        assert!(!william.details.conditions.diabetes);
        assert_eq!(william.details.hypertension_since, "2015");

        let ana = &rows[1];
        assert_eq!(ana.details.community, "");
        assert_eq!(ana.details.community_code, "99");
        assert_eq!(ana.details.registration_date, NaiveDate::from_ymd_opt(2017, 5, 2));
        assert!(ana.details.conditions.hypertension);
        assert!(ana.details.conditions.diabetes);
        assert_eq!(ana.details.notes, "seen twice");
    }

    #[test]
    fn test_load_sites_in_name_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        write(temp_dir.path(), "Soledad_patients.csv", "cesid,given_name,family_name\n1-0001,Douglas,Ruiz\n");
        write(temp_dir.path(), "Laguna_patients.csv", "cesid,given_name,family_name\n1-0001,William,Lopez\n");
        write(temp_dir.path(), "README.txt", "not an extract");

        assert_eq!(
            discover_sites(temp_dir.path()).unwrap(),
            vec!["Laguna".to_string(), "Soledad".to_string()]
        );

        let rows = load_sites(temp_dir.path()).unwrap();
        let sites: Vec<_> = rows.iter().map(|r| r.origin_site.as_str()).collect();
        assert_eq!(sites, vec!["Laguna", "Soledad"]);
        assert_eq!(rows[1].details.given_name, "Douglas");
    }

    #[test]
    fn test_load_sites_requires_extracts() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        assert!(matches!(
            load_sites(temp_dir.path()),
            Err(RosterError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_helpers() {
        assert!(parse_flag("Sí"));
        assert!(parse_flag(" x "));
        assert!(!parse_flag("maybe"));
        assert_eq!(parse_int::<i32>("1995"), Some(1995));
        assert_eq!(parse_int::<i32>("unknown"), None);
        assert_eq!(parse_int::<u32>(""), None);
        assert_eq!(parse_date("2019-13-01"), None);
    }
}
