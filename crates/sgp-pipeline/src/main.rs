// SGP pipeline entry point.
//
// Startup sequence:
// 1. Parse CLI arguments, initialize tracing (stderr)
// 2. Load config (seeding config/ from defaults/ if needed)
// 3. Load the input snapshot
// 4. Run every requested format concurrently
// 5. Persist each successful format atomically, optionally exporting CSVs;
//    record failures without stopping the remaining formats

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use tracing::info;

use sgp_pipeline::config;
use sgp_pipeline::db::MartStore;
use sgp_pipeline::pipeline;
use sgp_pipeline::snapshot::{self, AdpSelector};

#[derive(Debug, Parser)]
#[command(name = "sgp-pipeline", about = "Standings-gain-point auction valuations")]
struct Args {
    /// Directory holding config/, defaults/ and the data files.
    #[arg(long, env = "SGP_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Format id to run (repeatable). Runs every configured format when omitted.
    #[arg(long = "format")]
    formats: Vec<String>,

    /// Use the latest ADP snapshot on or before this date (YYYY-MM-DD).
    #[arg(long)]
    adp_as_of: Option<NaiveDate>,

    /// Also write rankings_<format>.csv files into this directory.
    #[arg(long)]
    csv_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing()?;
    info!("SGP pipeline starting up");

    let config = config::load_config(&args.base_dir).context("failed to load configuration")?;
    info!(
        "Config loaded: {} formats, rate systems {:?}, playing-time systems {:?}",
        config.formats.len(),
        config.blend.rate_systems,
        config.blend.playing_time_systems
    );

    let snapshot = snapshot::load_snapshot(&args.base_dir, &config.data_paths)
        .context("failed to load input snapshot")?;
    info!(
        "Loaded {} hitting rows, {} pitching rows, {} id mappings, {} standings lines, {} ADP rows",
        snapshot.hitting.len(),
        snapshot.pitching.len(),
        snapshot.id_map.len(),
        snapshot.standings.len(),
        snapshot.adp.len()
    );

    let formats: Vec<String> = if args.formats.is_empty() {
        config.formats.keys().cloned().collect()
    } else {
        args.formats.clone()
    };
    let selector = match args.adp_as_of {
        Some(date) => AdpSelector::AsOf(date),
        None => AdpSelector::Latest,
    };

    let db_path = args.base_dir.join(&config.db_path);
    let store = MartStore::open(&db_path.to_string_lossy()).context("failed to open output store")?;
    info!("Output store opened at {}", db_path.display());

    let outcomes = pipeline::run_all(Arc::new(snapshot), Arc::new(config), &formats, selector).await;

    let failed = pipeline::persist_outcomes(&store, outcomes, args.csv_out.as_deref());

    if failed > 0 {
        bail!("{failed} of {} format(s) failed", formats.len());
    }
    info!("SGP pipeline finished");
    Ok(())
}

/// Initialize tracing to stderr so stdout stays free for piping.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sgp_pipeline=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
