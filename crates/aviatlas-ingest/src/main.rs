//! AviAtlas Ingest - eBird taxonomy import tool

use anyhow::{Context, Result};
use aviatlas_common::logging::{init_logging, LogConfig, LogLevel};
use aviatlas_ingest::config::IngestConfig;
use aviatlas_ingest::ebird_taxonomy::{
    audit_path, ConversionReport, EbirdTaxonomyPipeline, FamilyConflictPolicy, RestTaxonomyStore,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "aviatlas-ingest")]
#[command(author, version, about = "Import the eBird taxonomy into the bird_taxonomy table")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// PostgREST / Supabase table API
    Rest,
    /// Direct Postgres connection (requires the `database` feature)
    Postgres,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert the taxonomy CSV and load it into storage
    Convert {
        /// Path to the eBird taxonomy CSV
        #[arg(long, env = "AVIATLAS_CSV_PATH")]
        csv_path: PathBuf,

        /// Nodes per insert request
        #[arg(long)]
        batch_size: Option<usize>,

        /// Build the hierarchy and report without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Directory for the text report
        #[arg(long, env = "AVIATLAS_REPORT_DIR")]
        report_dir: Option<PathBuf>,

        /// Storage backend
        #[arg(long, value_enum, default_value_t = Backend::Rest)]
        backend: Backend,

        /// What to do when a family appears under two orders (warn|reject)
        #[arg(long)]
        family_conflict: Option<FamilyConflictPolicy>,

        /// Show a progress bar while loading
        #[arg(long)]
        progress: bool,
    },

    /// Audit the taxonomy CSV without converting it
    Validate {
        /// Path to the eBird taxonomy CSV
        #[arg(long, env = "AVIATLAS_CSV_PATH")]
        csv_path: PathBuf,

        /// Print the audit as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("aviatlas-ingest")
        .filter_directives("hyper=warn,reqwest=warn,sqlx=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Convert {
            csv_path,
            batch_size,
            dry_run,
            report_dir,
            backend,
            family_conflict,
            progress,
        } => {
            let mut config = IngestConfig::from_env()?.with_dry_run(dry_run).with_progress(progress);
            if let Some(batch_size) = batch_size {
                config = config.with_batch_size(batch_size);
            }
            if let Some(dir) = report_dir {
                config = config.with_report_dir(dir);
            }
            if let Some(policy) = family_conflict {
                config = config.with_family_conflict(policy);
            }
            config.validate()?;

            let report = convert(config, &csv_path, backend).await?;
            println!("{}", report);
        },
        Command::Validate { csv_path, json } => {
            info!(path = %csv_path.display(), "Auditing taxonomy CSV");
            let audit = audit_path(&csv_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&audit)?);
            } else {
                println!("{}", audit);
            }
        },
    }

    Ok(())
}

async fn convert(config: IngestConfig, csv_path: &Path, backend: Backend) -> Result<ConversionReport> {
    if config.dry_run {
        let pipeline = EbirdTaxonomyPipeline::new(config);
        return pipeline.dry_run(csv_path).await;
    }

    match backend {
        Backend::Rest => {
            let store = RestTaxonomyStore::from_config(&config).context("REST backend not configured")?;
            EbirdTaxonomyPipeline::new(config).run(csv_path, Some(&store)).await
        },
        #[cfg(feature = "database")]
        Backend::Postgres => {
            let store = aviatlas_ingest::ebird_taxonomy::PgTaxonomyStore::connect(&config).await?;
            EbirdTaxonomyPipeline::new(config).run(csv_path, Some(&store)).await
        },
        #[cfg(not(feature = "database"))]
        Backend::Postgres => {
            anyhow::bail!("The postgres backend requires building with the `database` feature")
        },
    }
}
