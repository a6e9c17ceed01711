//! Constants used throughout the roster core crate.

/// Identifiers known to be shared by different people across sites. Each becomes an
/// [`crate::OverrideRule`] that drops rows without a birth year.
pub const BUILTIN_OVERRIDE_IDS: &[&str] = &["001-000020"];

/// Suffix of a site's patient extract: `<Site>_patients.csv`.
pub const PATIENTS_FILE_SUFFIX: &str = "_patients.csv";

/// Suffix of a site's community code table: `<Site>_communities.csv`.
pub const COMMUNITIES_FILE_SUFFIX: &str = "_communities.csv";

/// Version of the roster cache layout. Bump when the record shape changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Default directory holding site extracts.
pub const DEFAULT_SITES_DIR: &str = "data/sites";

/// Default roster cache location.
pub const DEFAULT_CACHE_PATH: &str = "data/roster_cache.json";
