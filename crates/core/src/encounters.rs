//! Encounter linking.
//!
//! Consult exports identify the patient only by the site-issued identifier and the site
//! name. Linking resolves every row through the [`CrossReferenceIndex`] in one pass and
//! appends the canonical id and patient UUID. All other columns pass through untouched.

use crate::crossref::CrossReferenceIndex;
use crate::diagnostics::Diagnostic;
use crate::error::{RosterError, RosterResult};
use crate::roster::Roster;
use std::path::Path;

/// Column holding the site-issued identifier.
pub const ENCOUNTER_ID_COLUMN: &str = "cesid";
/// Column holding the site name.
pub const ENCOUNTER_SITE_COLUMN: &str = "site";

/// An encounter table with the two linking columns appended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkedEncounters {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LinkedEncounters {
    pub fn write_csv(&self, path: &Path) -> RosterResult<()> {
        let mut writer = csv::Writer::from_path(path).map_err(RosterError::CsvWrite)?;
        writer
            .write_record(&self.headers)
            .map_err(RosterError::CsvWrite)?;
        for row in &self.rows {
            writer.write_record(row).map_err(RosterError::CsvWrite)?;
        }
        writer.flush().map_err(|source| RosterError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

/// Links an in-memory encounter table.
///
/// `headers` must contain [`ENCOUNTER_ID_COLUMN`] and [`ENCOUNTER_SITE_COLUMN`], and
/// `index` must have been built from `roster`. The patient UUID is left blank for
/// encounters whose identifier fell through unresolved, even when that identifier happens
/// to be another patient's canonical id.
pub fn link_encounters(
    roster: &Roster,
    index: &CrossReferenceIndex,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> RosterResult<LinkedEncounters> {
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            RosterError::InvalidInput(format!("encounter table has no '{name}' column"))
        })
    };
    let id_col = column(ENCOUNTER_ID_COLUMN)?;
    let site_col = column(ENCOUNTER_SITE_COLUMN)?;

    let cell = |row: &Vec<String>, i: usize| row.get(i).cloned().unwrap_or_default();
    let local_ids: Vec<String> = rows.iter().map(|r| cell(r, id_col)).collect();
    let sites: Vec<String> = rows.iter().map(|r| cell(r, site_col)).collect();

    let bulk = index.resolve_many(&local_ids, &sites)?;

    let mut headers = headers;
    headers.push("canonical_id".to_string());
    headers.push("patient_uuid".to_string());

    let records = roster.records();
    let rows = rows
        .into_iter()
        .zip(bulk.canonical_ids)
        .zip(bulk.positions)
        .map(|((mut row, canonical_id), position)| {
            let uuid = position
                .and_then(|p| records.get(p))
                .filter(|r| r.canonical_id() == canonical_id)
                .map(|r| r.patient_uuid.to_string())
                .unwrap_or_default();
            row.push(canonical_id);
            row.push(uuid);
            row
        })
        .collect();

    Ok(LinkedEncounters {
        headers,
        rows,
        diagnostics: bulk.diagnostics,
    })
}

/// Reads an encounter CSV and links it.
pub fn link_encounter_file(
    roster: &Roster,
    index: &CrossReferenceIndex,
    path: &Path,
) -> RosterResult<LinkedEncounters> {
    let csv_err = |source| RosterError::CsvRead {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>, _>>()
        .map_err(csv_err)?;

    tracing::info!("linking {} encounters from {}", rows.len(), path.display());
    link_encounters(roster, index, headers, rows)
}
