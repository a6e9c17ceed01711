use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roster_core::constants::{DEFAULT_CACHE_PATH, DEFAULT_SITES_DIR};
use roster_core::encounters::link_encounter_file;
use roster_core::loader::load_sites;
use roster_core::{EngineConfig, IdentityEngine, OverrideRules, Roster, RosterCache};

/// Runner settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RunConfig {
    data_dir: PathBuf,
    cache_path: PathBuf,
    overrides_file: Option<PathBuf>,
    encounters_file: Option<PathBuf>,
    linked_output: Option<PathBuf>,
    refresh_cache: bool,
}

impl RunConfig {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        Self {
            data_dir: path("ROSTER_DATA_DIR").unwrap_or_else(|| DEFAULT_SITES_DIR.into()),
            cache_path: path("ROSTER_CACHE_PATH").unwrap_or_else(|| DEFAULT_CACHE_PATH.into()),
            overrides_file: path("ROSTER_OVERRIDES_FILE"),
            encounters_file: path("ROSTER_ENCOUNTERS_FILE"),
            linked_output: path("ROSTER_LINKED_OUTPUT"),
            refresh_cache: var("ROSTER_REFRESH_CACHE")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let rules = match &self.overrides_file {
            Some(path) => OverrideRules::from_path(path)
                .with_context(|| format!("loading overrides from {}", path.display()))?,
            None => OverrideRules::builtin(),
        };
        Ok(EngineConfig::new(rules))
    }
}

/// Reuses a valid cache unless a refresh is requested; otherwise resolves the site
/// extracts and writes a fresh cache.
fn load_or_resolve(config: &RunConfig) -> anyhow::Result<Roster> {
    if !config.refresh_cache {
        if let Some(roster) = RosterCache::load_if_valid(&config.cache_path) {
            tracing::info!("++ Using cached roster ({} records)", roster.len());
            return Ok(roster);
        }
    }

    let engine = IdentityEngine::new(config.engine_config()?);
    let rows = load_sites(&config.data_dir)
        .with_context(|| format!("loading site extracts from {}", config.data_dir.display()))?;
    let resolution = engine.resolve(rows)?;

    let candidates = resolution.override_candidates().count();
    if candidates > 0 {
        tracing::warn!(
            "{} merge conflicts look like manual override candidates",
            candidates
        );
    }

    RosterCache::save(&config.cache_path, &resolution.roster)?;
    Ok(resolution.roster)
}

/// Entry point for a full migration run.
///
/// # Environment Variables
/// - `ROSTER_DATA_DIR`: site extract directory (default: "data/sites")
/// - `ROSTER_CACHE_PATH`: roster cache file (default: "data/roster_cache.json")
/// - `ROSTER_OVERRIDES_FILE`: override YAML; built-in rules when unset
/// - `ROSTER_ENCOUNTERS_FILE` and `ROSTER_LINKED_OUTPUT`: encounter CSV to link, and where
///   to write it
/// - `ROSTER_REFRESH_CACHE`: set to `1` to ignore an existing cache
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roster_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RunConfig::from_env();
    tracing::info!("++ Starting roster run from {}", config.data_dir.display());

    let roster = load_or_resolve(&config)?;

    match (&config.encounters_file, &config.linked_output) {
        (Some(input), Some(output)) => {
            let index = roster.cross_reference_index();
            let linked = link_encounter_file(&roster, &index, input)?;
            linked.write_csv(output)?;
            tracing::info!(
                "++ Linked {} encounters into {} ({} unresolved or ambiguous)",
                linked.rows.len(),
                output.display(),
                linked.diagnostics.len()
            );
        }
        (Some(_), None) => {
            anyhow::bail!("ROSTER_ENCOUNTERS_FILE is set but ROSTER_LINKED_OUTPUT is not")
        }
        _ => {}
    }

    tracing::info!("++ Roster run complete: {} records", roster.len());
    Ok(())
}
