//! Patient rows and records as they move through identity resolution.
//!
//! Lifecycle:
//! [`RawPatientRow`] (one per patient per site) → [`PatientRecord`] (merged, possibly
//! re-identified) → [`CanonicalPatientRecord`] (UUID attached, roster frozen).
//!
//! Everything that is not part of a row's identity lives in [`PatientDetails`], which is
//! the unit the merger works on.

use chrono::NaiveDate;
use roster_uuid::PatientUuid;
use serde::{Deserialize, Serialize};

// ============================================================================
// Clinical content
// ============================================================================

/// Chronic-condition and programme flags recorded by the clinics.
///
/// A missing observation is stored as `false`; merging takes the union, so a condition
/// recorded at any site survives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthFlags {
    pub hypertension: bool,
    pub diabetes: bool,
    pub asthma: bool,
    pub epilepsy: bool,
    pub depression: bool,
    pub anxiety: bool,
    pub malnutrition: bool,
    pub pregnancy: bool,
}

impl HealthFlags {
    /// Field-wise OR.
    pub fn union(self, other: Self) -> Self {
        Self {
            hypertension: self.hypertension || other.hypertension,
            diabetes: self.diabetes || other.diabetes,
            asthma: self.asthma || other.asthma,
            epilepsy: self.epilepsy || other.epilepsy,
            depression: self.depression || other.depression,
            anxiety: self.anxiety || other.anxiety,
            malnutrition: self.malnutrition || other.malnutrition,
            pregnancy: self.pregnancy || other.pregnancy,
        }
    }
}

/// Everything recorded about a patient apart from identifier and provenance.
///
/// Text fields use the empty string for "not recorded"; the date-part integers and the
/// registration date use `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub given_name: String,
    pub family_name: String,
    pub sex: String,
    pub community_code: String,
    pub community: String,
    pub birth_year: Option<i32>,
    pub birth_month: Option<u32>,
    pub birth_day: Option<u32>,
    pub registration_date: Option<NaiveDate>,
    pub conditions: HealthFlags,
    /// Free-text onset dates, as typed at the site.
    pub hypertension_since: String,
    pub diabetes_since: String,
    pub epilepsy_since: String,
    pub depression_since: String,
    pub notes: String,
}

impl PatientDetails {
    /// `given family`, for diagnostics.
    pub fn display_name(&self) -> String {
        match (self.given_name.is_empty(), self.family_name.is_empty()) {
            (false, false) => format!("{} {}", self.given_name, self.family_name),
            (false, true) => self.given_name.clone(),
            (true, false) => self.family_name.clone(),
            (true, true) => String::new(),
        }
    }
}

// ============================================================================
// Pipeline stages
// ============================================================================

/// One patient row from one site extract. Immutable input to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPatientRow {
    /// Site-scoped identifier (CesID).
    pub local_id: String,
    pub origin_site: String,
    pub details: PatientDetails,
}

/// Exact-match grouping key.
///
/// Carries both identifiers: rows only merge when they hold the same canonical id and
/// came in under the same site-issued id, so every merged record keeps one cross-reference
/// identifier for all of its sites.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub canonical_id: String,
    pub local_id: String,
    pub given_name: String,
    pub family_name: String,
}

/// A patient record during resolution, before a UUID is attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Identifier the record will be known by after resolution.
    pub canonical_id: String,
    /// Identifier as it appeared in the site extracts; used for cross-referencing.
    pub local_id: String,
    /// Sites the merged rows came from, deduplicated, in first-seen order. Stored as a
    /// list; [`PatientRecord::origin_sites_joined`] gives the comma-joined export form.
    pub origin_sites: Vec<String>,
    #[serde(flatten)]
    pub details: PatientDetails,
}

impl PatientRecord {
    /// Lifts a raw row into a record whose provenance is just its own site.
    pub fn from_row(row: RawPatientRow) -> Self {
        Self {
            canonical_id: row.local_id.clone(),
            local_id: row.local_id,
            origin_sites: vec![row.origin_site],
            details: row.details,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            canonical_id: self.canonical_id.clone(),
            local_id: self.local_id.clone(),
            given_name: self.details.given_name.clone(),
            family_name: self.details.family_name.clone(),
        }
    }

    /// Sites as one comma-joined string, the form used in exports.
    pub fn origin_sites_joined(&self) -> String {
        self.origin_sites.join(",")
    }
}

/// A resolved patient with its permanent identifier and UUID.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPatientRecord {
    pub patient_uuid: PatientUuid,
    #[serde(flatten)]
    pub record: PatientRecord,
}

impl CanonicalPatientRecord {
    pub fn canonical_id(&self) -> &str {
        &self.record.canonical_id
    }

    pub fn local_id(&self) -> &str {
        &self.record.local_id
    }

    pub fn origin_sites(&self) -> &[String] {
        &self.record.origin_sites
    }

    pub fn details(&self) -> &PatientDetails {
        &self.record.details
    }
}
