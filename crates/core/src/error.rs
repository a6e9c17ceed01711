use roster_uuid::PatientUuid;

/// Errors that halt a resolution run.
///
/// Field conflicts and lookup misses are not errors; they are reported as
/// [`crate::Diagnostic`] events.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to read {path}: {source}", path = path.display())]
    FileRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}", path = path.display())]
    FileWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read CSV {path}: {source}", path = path.display())]
    CsvRead {
        path: std::path::PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write CSV: {0}")]
    CsvWrite(csv::Error),
    #[error("failed to serialize roster cache: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize roster cache: {0}")]
    Deserialization(serde_json::Error),
    #[error("invalid override file: {0}")]
    OverrideFile(String),

    #[error("record with local id '{local_id}' reached UUID assignment with a blank canonical id")]
    BlankCanonicalId { local_id: String },
    #[error("canonical id '{canonical_id}' is held by {count} records after splitting")]
    DuplicateCanonicalId { canonical_id: String, count: usize },
    #[error("canonical ids '{first}' and '{second}' both map to UUID {uuid}")]
    UuidCollision {
        uuid: PatientUuid,
        first: String,
        second: String,
    },
    #[error("roster cache does not match a fresh derivation: {0}")]
    CacheMismatch(String),

    #[error("UUID error: {0}")]
    Uuid(#[from] roster_uuid::UuidError),
}

pub type RosterResult<T> = std::result::Result<T, RosterError>;
