//! Command-line interface.
//!
//! `ingest` is the default command: running the binary with no subcommand
//! ingests with the top-level flags.

use crate::discover::discover;
use crate::error::IngestError;
use crate::exit_codes::ExitCode;
use crate::ingest::Ingestor;
use crate::inspect::inspect_file;
use crate::logging::LogFormat;
use crate::progress::Progress;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tp_config::{ConfigFile, ConfigOverrides, IngestConfig, CONFIG_PATH_ENV};
use tp_format::RecordLayout;
use tp_store::{StoreBackend, TelemetryStore};
use tracing::{debug, error, info};

/// Load tagged binary telemetry files into a relational store.
#[derive(Parser, Debug)]
#[command(name = "telemetry-processor", version, about)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Log level or filter directive (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub ingest: IngestArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover telemetry files and ingest them (default)
    Ingest(IngestArgs),
    /// Decode one file without a store and print a JSON report
    Inspect(InspectArgs),
}

/// Arguments for the ingest command
#[derive(Args, Debug, Default, Clone)]
pub struct IngestArgs {
    /// Directory searched for telemetry files
    #[arg(long, env = "TELEMETRY_ROOT")]
    pub root: Option<PathBuf>,

    /// Store connection string (postgres://..., sqlite://PATH or :memory:)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Records per bulk insert
    #[arg(long, env = "TELEMETRY_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Record field order (map-first, measurement-first)
    #[arg(long, env = "TELEMETRY_RECORD_LAYOUT")]
    pub record_layout: Option<RecordLayout>,

    /// TOML config file
    #[arg(long, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    /// Write a JSON run summary to this path
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,
}

impl IngestArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database_url: self.database_url.clone(),
            root: self.root.clone(),
            batch_size: self.batch_size,
            record_layout: self.record_layout,
        }
    }

    /// Resolve the effective configuration.
    pub fn resolve(&self) -> Result<IngestConfig, IngestError> {
        let file = self.config.as_deref().map(ConfigFile::load).transpose()?;
        Ok(IngestConfig::resolve(self.overrides(), file)?)
    }
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Telemetry file to decode
    pub file: PathBuf,

    /// Record field order (map-first, measurement-first)
    #[arg(long, env = "TELEMETRY_RECORD_LAYOUT", default_value_t = RecordLayout::MapFirst)]
    pub record_layout: RecordLayout,
}

/// Run the parsed command and map the outcome to an exit code.
pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Some(Commands::Inspect(args)) => run_inspect(&args),
        Some(Commands::Ingest(args)) => run_ingest(&args),
        None => run_ingest(&cli.ingest),
    };
    let code = match &result {
        Ok(()) => ExitCode::Clean,
        Err(err) => err.exit_code(),
    };
    match &result {
        Err(err) if !code.is_success() => {
            error!(error = %err, code = err.code(), exit = code.as_i32(), "run failed");
            eprintln!("error: {err}");
        }
        _ => debug!("run succeeded"),
    }
    code
}

pub fn run_ingest(args: &IngestArgs) -> Result<(), IngestError> {
    let config = args.resolve()?;

    let mut store = StoreBackend::open(&config.database_url)?;
    store.migrate()?;
    info!(backend = store.kind(), "store ready");

    let files = discover(&config.root, &config.name_contains, &config.suffix)?;
    info!(
        root = %config.root.display(),
        files = files.len(),
        batch_size = config.batch_size,
        layout = %config.record_layout,
        "discovered telemetry files"
    );

    let progress = Progress::stdout(config.progress_every);
    let mut ingestor = Ingestor::new(store, config.batch_size, config.record_layout, progress);
    let summary = ingestor.run(&files)?;
    if let Some(path) = &args.summary_json {
        summary.write_json(path)?;
    }
    Ok(())
}

pub fn run_inspect(args: &InspectArgs) -> Result<(), IngestError> {
    let report = inspect_file(&args.file, args.record_layout)?;
    let json = serde_json::to_string_pretty(&report).map_err(|source| IngestError::Report {
        path: args.file.clone(),
        source,
    })?;
    println!("{json}");
    Ok(())
}
