mod adapter;
mod cities;
mod config;
mod database;
mod dedupe;
mod http_client;
mod models;
mod normalize;
mod pipeline;
mod sources;
mod validate;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use adapter::AdapterRegistry;
use config::Config;
use database::{CatalogStats, Database};
use models::PipelineRunResult;
use pipeline::ImportOptions;

#[derive(Parser, Debug)]
#[command(name = "studenthome")]
#[command(about = "Import and maintain the StudentHome rental property catalog", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import raw scrape files into the catalog
    Import {
        /// Input file(s); falls back to input_files from data/config.yaml
        #[arg(long)]
        input: Vec<String>,

        /// Force a source adapter (rightmove, zoopla, openrent, brightdata)
        /// instead of sniffing the file
        #[arg(long)]
        source: Option<String>,

        /// HEAD-check image URLs and drop unreachable ones
        #[arg(long)]
        check_images: bool,
    },

    /// Wipe the catalog, then import
    CleanImport {
        #[arg(long)]
        input: Vec<String>,

        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        check_images: bool,
    },

    /// Idempotent catalog repair jobs
    Maintain {
        #[command(subcommand)]
        job: MaintenanceJob,
    },

    /// Print aggregate catalog statistics
    Stats,

    /// Write a starter data/config.yaml
    InitConfig,
}

#[derive(Subcommand, Debug)]
enum MaintenanceJob {
    /// Delete stored rows failing validation bounds
    RemoveInvalid,
    /// Delete later rows sharing a dedup key, keeping the earliest
    RemoveDuplicates,
    /// Rewrite locations to canonical city names where one can be found
    NormalizeLocations,
    /// Upgrade stored image URLs to clean https
    NormalizeImageUrls,
    /// All of the above, in order
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handled before config load so it works on a fresh checkout
    if matches!(args.command, Command::InitConfig) {
        Config::create_default()?;
        eprintln!("Wrote data/config.yaml; edit it and re-run");
        return Ok(());
    }

    let config = Config::load()?;

    // Initialize logging - use RUST_LOG env var if set, otherwise use config
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        tracing::info!("Logging level set from RUST_LOG environment variable");
    } else {
        let level = config.tracing_level.to_lowercase();
        let max_level = match level.as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                eprintln!("Invalid tracing level '{}', using 'info'", level);
                tracing::Level::INFO
            }
        };
        tracing_subscriber::fmt().with_max_level(max_level).init();
    }

    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::new(&config.database_path)?;
    tracing::info!("Catalog database at {}", config.database_path);

    match args.command {
        Command::Import {
            input,
            source,
            check_images,
        } => run_imports(&db, &config, input, source, check_images, false).await?,

        Command::CleanImport {
            input,
            source,
            check_images,
        } => run_imports(&db, &config, input, source, check_images, true).await?,

        Command::Maintain { job } => run_maintenance(&db, &job)?,

        Command::Stats => print_stats(&db.stats()?),

        Command::InitConfig => {} // handled above
    }

    Ok(())
}

async fn run_imports(
    db: &Database,
    config: &Config,
    inputs: Vec<String>,
    source: Option<String>,
    check_images: bool,
    clean: bool,
) -> Result<()> {
    let inputs = if inputs.is_empty() {
        config.input_files.clone()
    } else {
        inputs
    };
    if inputs.is_empty() {
        anyhow::bail!("no input files given (pass --input or set input_files in data/config.yaml)");
    }

    let options = ImportOptions {
        source,
        check_images: check_images || config.check_images,
        image_check_timeout_secs: config.image_check_timeout_secs,
        user_agent: config.user_agent.clone(),
    };

    // Graceful ctrl-c: the pipeline finishes the record in flight, and the
    // idempotent re-run reconciles whatever is left.
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current record...");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let registry = AdapterRegistry::with_known_sources();
    tracing::info!("Registered sources: {:?}", registry.list_sources());

    let mut total = PipelineRunResult::default();
    for (index, input) in inputs.iter().enumerate() {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        let result = if clean && index == 0 {
            pipeline::run_clean_import(db, &registry, input, &options, &cancelled).await?
        } else {
            pipeline::run_import(db, &registry, input, &options, &cancelled).await?
        };
        total.merge(result);
    }

    print_summary(&total);
    Ok(())
}

fn run_maintenance(db: &Database, job: &MaintenanceJob) -> Result<()> {
    match job {
        MaintenanceJob::RemoveInvalid => {
            println!("Removed {} invalid properties", db.remove_invalid()?);
        }
        MaintenanceJob::RemoveDuplicates => {
            println!("Removed {} duplicate properties", db.remove_duplicates()?);
        }
        MaintenanceJob::NormalizeLocations => {
            println!("Normalized {} locations", db.normalize_locations()?);
        }
        MaintenanceJob::NormalizeImageUrls => {
            println!("Normalized {} image URLs", db.normalize_image_urls()?);
        }
        MaintenanceJob::All => {
            println!("Removed {} invalid properties", db.remove_invalid()?);
            println!("Removed {} duplicate properties", db.remove_duplicates()?);
            println!("Normalized {} locations", db.normalize_locations()?);
            println!("Normalized {} image URLs", db.normalize_image_urls()?);
        }
    }
    Ok(())
}

fn print_summary(result: &PipelineRunResult) {
    println!("{}", "=".repeat(60));
    println!("Import summary");
    println!("  extracted:          {}", result.extracted);
    println!("  imported:           {}", result.imported);
    println!("  skipped:            {}", result.skipped);
    println!("  duplicates removed: {}", result.duplicates_removed);
    println!("  errors:             {}", result.errors);
    if let (Some(min), Some(avg), Some(max)) =
        (result.price_min, result.price_avg(), result.price_max)
    {
        println!("  price min/avg/max:  £{:.0} / £{:.0} / £{:.0}", min, avg, max);
    }
    if !result.by_location.is_empty() {
        println!("  by location:");
        for (location, count) in &result.by_location {
            println!("    {:<24} {}", location, count);
        }
    }
    println!("{}", "=".repeat(60));
}

fn print_stats(stats: &CatalogStats) {
    println!("{}", "=".repeat(60));
    println!("Catalog statistics");
    println!("  properties:   {}", stats.properties);
    println!("  images:       {}", stats.images);
    println!("  universities: {}", stats.universities);
    if let (Some(min), Some(avg), Some(max)) = (stats.price_min, stats.price_avg, stats.price_max)
    {
        println!("  price min/avg/max: £{:.0} / £{:.0} / £{:.0}", min, avg, max);
    }
    if !stats.by_location.is_empty() {
        println!("  by location:");
        for (location, count) in &stats.by_location {
            println!("    {:<24} {}", location, count);
        }
    }
    println!("{}", "=".repeat(60));
}
