use clap::{Parser, Subcommand};
use roster_core::{
    encounters::link_encounter_file, loader::load_sites, Diagnostic, EngineConfig,
    IdentityEngine, OverrideRules, PatientUuid, Resolution, RosterCache, CURRENT_SCHEME,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Clinic patient roster identity resolution CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve site extracts into a canonical roster and write the cache
    Resolve {
        /// Directory holding <Site>_patients.csv and <Site>_communities.csv files
        #[arg(long)]
        sites: PathBuf,
        /// Roster cache to write
        #[arg(long)]
        cache: PathBuf,
        /// Override file (YAML); built-in rules are used when omitted
        #[arg(long)]
        overrides: Option<PathBuf>,
    },
    /// Resolve one identifier and site against a cached roster
    Lookup {
        /// Roster cache to read
        #[arg(long)]
        cache: PathBuf,
        /// Site-issued identifier (CesID)
        cesid: String,
        /// Site name
        site: String,
    },
    /// Add canonical ids and patient UUIDs to an encounter CSV
    Link {
        /// Roster cache to read
        #[arg(long)]
        cache: PathBuf,
        /// Encounter CSV with cesid and site columns
        #[arg(long)]
        encounters: PathBuf,
        /// Output CSV
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the patient UUID for a canonical id
    Uuid {
        /// Canonical identifier
        canonical_id: String,
    },
    /// List merge conflicts that look like manual override candidates
    Conflicts {
        /// Directory holding site extracts
        #[arg(long)]
        sites: PathBuf,
        /// Override file (YAML); built-in rules are used when omitted
        #[arg(long)]
        overrides: Option<PathBuf>,
    },
}

fn engine(overrides: Option<&Path>) -> Result<IdentityEngine, Box<dyn std::error::Error>> {
    let rules = match overrides {
        Some(path) => OverrideRules::from_path(path)?,
        None => OverrideRules::builtin(),
    };
    Ok(IdentityEngine::new(EngineConfig::new(rules)))
}

fn print_summary(rows_in: usize, resolution: &Resolution) {
    let count = |pred: fn(&Diagnostic) -> bool| {
        resolution.diagnostics.iter().filter(|d| pred(d)).count()
    };
    println!("Rows in: {}", rows_in);
    println!("Canonical records: {}", resolution.roster.len());
    println!("Merge conflicts: {}", count(Diagnostic::is_conflict));
    println!(
        "Override candidates: {}",
        count(Diagnostic::is_override_candidate)
    );
    println!(
        "Residual splits: {}",
        count(|d| matches!(d, Diagnostic::ResidualDuplicateSplit { .. }))
    );
    println!(
        "Dropped rows: {}",
        count(|d| matches!(d, Diagnostic::UnsalvageableRecord { .. }))
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roster_core=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Resolve {
            sites,
            cache,
            overrides,
        }) => {
            let engine = engine(overrides.as_deref())?;
            let rows = load_sites(&sites)?;
            let rows_in = rows.len();
            let resolution = engine.resolve(rows)?;
            RosterCache::save(&cache, &resolution.roster)?;
            print_summary(rows_in, &resolution);
            println!("Wrote roster cache: {}", cache.display());
        }
        Some(Commands::Lookup { cache, cesid, site }) => {
            let roster = RosterCache::load(&cache)?;
            let index = roster.cross_reference_index();
            let resolved = index.resolve_many(&[cesid.as_str()], &[site.as_str()])?;
            match resolved.positions[0].and_then(|p| roster.records().get(p)) {
                Some(record) => println!(
                    "{} at {} -> {} ({}), UUID: {}",
                    cesid,
                    site,
                    record.canonical_id(),
                    record.details().display_name(),
                    record.patient_uuid
                ),
                None => println!("{} at {} is not in the roster", cesid, site),
            }
            for diagnostic in &resolved.diagnostics {
                println!("note: {}", diagnostic);
            }
        }
        Some(Commands::Link {
            cache,
            encounters,
            output,
        }) => {
            let roster = RosterCache::load(&cache)?;
            let index = roster.cross_reference_index();
            let linked = link_encounter_file(&roster, &index, &encounters)?;
            linked.write_csv(&output)?;
            println!(
                "Linked {} encounters ({} notes) into {}",
                linked.rows.len(),
                linked.diagnostics.len(),
                output.display()
            );
        }
        Some(Commands::Uuid { canonical_id }) => {
            println!("{}", PatientUuid::derive(CURRENT_SCHEME, canonical_id.trim()));
        }
        Some(Commands::Conflicts { sites, overrides }) => {
            let engine = engine(overrides.as_deref())?;
            let resolution = engine.resolve(load_sites(&sites)?)?;
            let mut found = false;
            for diagnostic in resolution.override_candidates() {
                found = true;
                println!("{}", diagnostic);
            }
            if !found {
                println!("No override candidates found.");
            }
        }
        None => {
            println!("Use 'roster --help' for commands");
        }
    }

    Ok(())
}
