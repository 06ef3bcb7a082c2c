use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use powerbox_pipeline::config::PipelineConfig;
use powerbox_pipeline::domain::RawRecordSet;
use powerbox_pipeline::gateway::hash_file;
use powerbox_pipeline::logging;
use powerbox_pipeline::metrics;
use powerbox_pipeline::pipeline::ingestion::{read_records, ArchiveIndex, InputFormat};
use powerbox_pipeline::pipeline::processing::{profile, OutlierPolicy};
use powerbox_pipeline::pipeline::storage::SinkOutcome;
use powerbox_pipeline::pipeline::{Pipeline, PipelineReport};

#[derive(Parser)]
#[command(name = "powerbox")]
#[command(about = "Ingest, clean, and persist Powerbox solar monitoring exports")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $POWERBOX_CONFIG, then ./powerbox.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on one input file
    Run {
        /// CSV or spreadsheet export to ingest
        input: PathBuf,
        /// Schema definition CSV (header row lists the expected columns)
        #[arg(long)]
        schema: Option<PathBuf>,
        #[arg(long)]
        archive_dir: Option<PathBuf>,
        /// SQLite database for the relational sink
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long)]
        table: Option<String>,
        /// CSV snapshot overwritten on every run
        #[arg(long)]
        flat_file: Option<PathBuf>,
        /// Drop columns whose null fraction is above this
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long, value_enum)]
        outlier_policy: Option<PolicyArg>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
        /// Write Prometheus text metrics here after the run
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
    /// Print the content digest of a file
    Hash { file: PathBuf },
    /// Inspect or rebuild the archive digest index
    Index {
        #[command(subcommand)]
        action: IndexAction,
        #[arg(long)]
        archive_dir: Option<PathBuf>,
    },
    /// Per-column summary of a CSV or spreadsheet
    Profile {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Rehash every archived file from scratch
    Rebuild,
    /// List indexed files
    List,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PolicyArg {
    Sequential,
    Independent,
}

impl From<PolicyArg> for OutlierPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Sequential => OutlierPolicy::Sequential,
            PolicyArg::Independent => OutlierPolicy::Independent,
        }
    }
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(2);
        }
    };
    let _guard = logging::init_logging(&config.log_dir);

    if let Err(e) = dispatch(cli.command, config) {
        error!("{:#}", e);
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn dispatch(command: Commands, mut config: PipelineConfig) -> Result<()> {
    match command {
        Commands::Run {
            input,
            schema,
            archive_dir,
            store,
            table,
            flat_file,
            threshold,
            outlier_policy,
            json,
            metrics_out,
        } => {
            if let Some(v) = schema {
                config.schema_file = v;
            }
            if let Some(v) = archive_dir {
                config.archive_dir = v;
            }
            if let Some(v) = store {
                config.relational.store = v;
            }
            if let Some(v) = table {
                config.relational.table = v;
            }
            if let Some(v) = flat_file {
                config.flat_file.path = v;
            }
            if let Some(v) = threshold {
                config.quality.missingness_threshold = v;
            }
            if let Some(v) = outlier_policy {
                config.quality.outlier_policy = v.into();
            }
            run(&input, config, json, metrics_out.as_deref())
        }
        Commands::Hash { file } => {
            let digest = hash_file(&file)?.with_context(|| format!("{} does not exist", file.display()))?;
            println!("{}  {}", digest, file.display());
            Ok(())
        }
        Commands::Index { action, archive_dir } => {
            let dir = archive_dir.unwrap_or(config.archive_dir);
            let index = ArchiveIndex::open(&dir)?;
            match action {
                IndexAction::Rebuild => {
                    let stats = index.rebuild()?;
                    println!("🗂️  Indexed {} files in {}", stats.hashed, dir.display());
                }
                IndexAction::List => {
                    index.reconcile()?;
                    for entry in index.entries()? {
                        println!("{}  {:>10}  {}", entry.digest, entry.size, entry.path.display());
                    }
                }
            }
            Ok(())
        }
        Commands::Profile { file, json } => {
            let records: RawRecordSet = read_records(&file, InputFormat::detect(&file)?)?;
            let columns = profile(&records);
            if json {
                println!("{}", serde_json::to_string_pretty(&columns)?);
                return Ok(());
            }
            println!("📊 {} rows in {}", records.len(), file.display());
            for column in columns {
                match column.numeric {
                    Some(n) => println!(
                        "   {:<40} count={:<6} nulls={:<6} min={:.3} max={:.3} mean={:.3} median={:.3}",
                        column.name, column.count, column.nulls, n.min, n.max, n.mean, n.median
                    ),
                    None => println!("   {:<40} count={:<6} nulls={:<6}", column.name, column.count, column.nulls),
                }
            }
            Ok(())
        }
    }
}

fn run(input: &Path, config: PipelineConfig, json: bool, metrics_out: Option<&Path>) -> Result<()> {
    metrics::init_metrics();
    let pipeline = Pipeline::new(config).context("failed to set up the pipeline")?;
    info!("Starting pipeline for {}", input.display());
    let outcome = pipeline.run(input);

    // Metrics are written for failed runs too
    if let Some(path) = metrics_out {
        if let Err(e) = metrics::write_textfile(path) {
            error!("Could not write metrics to {}: {}", path.display(), e);
        }
    }

    let report = outcome.with_context(|| format!("pipeline run on {} failed", input.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("\n📊 Pipeline Results for {}:", report.renamed_path.display());
    println!("   Run id: {}", report.run_id);
    println!("   Digest: {}", report.digest);
    println!("   Rows ingested: {}", report.rows_ingested);
    println!("   Dropped (bad timestamp): {}", report.dropped_timestamp_rows);
    println!("   Dropped (outliers): {}", report.quality.outlier_rows);
    println!("   Dropped (duplicates): {}", report.quality.duplicate_rows);
    println!("   Dropped (negative values): {}", report.quality.negative_rows);
    if !report.quality.dropped_columns.is_empty() {
        println!("   Dropped columns: {}", report.quality.dropped_columns.join(", "));
    }
    println!("   Rows cleaned: {}", report.rows_cleaned);
    for sink in &report.sinks {
        match &sink.outcome {
            SinkOutcome::Written { rows } => println!("   {}: wrote {} rows", sink.sink, rows),
            SinkOutcome::Skipped { reason } => println!("   ⚠️  {}: skipped ({})", sink.sink, reason),
        }
    }
    match &report.archived_path {
        Some(path) => println!("   Archived: {}", path.display()),
        None => println!("   ⚠️  Archive step failed; see logs"),
    }
}
