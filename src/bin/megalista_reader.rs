//! `megalista-reader` — run the measurement-protocol reader from the shell.
//!
//! Reads a JSON array of executions, keeps those bound for the requested
//! destination, and writes every not-yet-uploaded row (or batch of rows) as
//! one JSON object per line on stdout.

use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use megalista_reader::batch::{self, BatchExt};
use megalista_reader::config::{
    ConfigOverrides, DEFAULT_LOG_FILTER, LogFormat, LoggingConfig, ReaderConfig,
};
use megalista_reader::error::{ReaderError, ReaderErrorKind};
use megalista_reader::execution::{DestinationType, Execution};
use megalista_reader::reader::{MeasurementProtocolReader, Stage};
use megalista_reader::warehouse::postgres::PostgresFactory;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "megalista-reader", version, about)]
struct Args {
    /// JSON file holding an array of executions.
    #[arg(long)]
    executions: PathBuf,

    /// TOML configuration file.
    #[arg(long, env = "MEGALISTA_CONFIG")]
    config: Option<PathBuf>,

    /// Only read executions bound for this destination, e.g. GA_MEASUREMENT_PROTOCOL.
    #[arg(long)]
    destination: Option<String>,

    /// Warehouse connection string.
    #[arg(long, env = "MEGALISTA_WAREHOUSE_URL", hide_env_values = true)]
    warehouse_url: Option<String>,

    /// Rows fetched per warehouse round trip.
    #[arg(long, env = "MEGALISTA_QUERY_BATCH_SIZE")]
    query_batch_size: Option<u32>,

    /// Emit batches instead of single rows.
    #[arg(long)]
    batches: bool,

    /// Rows per batch; defaults to the destination's upload limit.
    #[arg(long, requires = "batches")]
    batch_size: Option<usize>,

    /// Log filter directives.
    #[arg(long, env = "MEGALISTA_LOG")]
    log_filter: Option<String>,

    #[arg(long, value_enum, env = "MEGALISTA_LOG_FORMAT")]
    log_format: Option<LogFormatArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // Rows go to stdout, logs to stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder
            .with_ansi(std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none())
            .init(),
    }
}

fn load_config(args: &Args) -> Result<ReaderConfig, ReaderError> {
    let config = match &args.config {
        Some(path) => ReaderConfig::load(path)?,
        None => ReaderConfig::default(),
    };
    config.apply_overrides(ConfigOverrides {
        query_batch_size: args.query_batch_size,
        connection: args.warehouse_url.clone(),
        log_filter: args.log_filter.clone(),
        log_format: args.log_format.map(Into::into),
    })
}

fn load_executions(path: &Path) -> Result<Vec<Arc<Execution>>, ReaderError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ReaderError::InvalidArgument(format!("cannot read {}: {e}", path.display()))
    })?;
    let executions: Vec<Execution> = serde_json::from_str(&text).map_err(|e| {
        ReaderError::InvalidArgument(format!("invalid executions in {}: {e}", path.display()))
    })?;
    Ok(executions.into_iter().map(Arc::new).collect())
}

fn run(args: &Args, config: &ReaderConfig) -> Result<(), ReaderError> {
    let executions = load_executions(&args.executions)?;
    let selected: Vec<&Arc<Execution>> = match &args.destination {
        Some(name) => {
            let destination = DestinationType::from_str(name)?;
            batch::filter_by_destination(&executions, destination).collect()
        }
        None => executions.iter().collect(),
    };
    tracing::info!(
        total = executions.len(),
        selected = selected.len(),
        "loaded executions"
    );

    let reader = MeasurementProtocolReader::from_config(PostgresFactory::from_config(config)?, config);

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for execution in selected {
        let rows = reader.process(Arc::clone(execution))?;
        if args.batches {
            let size = args
                .batch_size
                .unwrap_or_else(|| batch::default_batch_size(execution.destination.destination_type));
            for chunk in rows.batches(size) {
                serde_json::to_writer(&mut out, &chunk?).map_err(std::io::Error::from)?;
                out.write_all(b"\n")?;
            }
        } else {
            for item in rows {
                serde_json::to_writer(&mut out, &item?).map_err(std::io::Error::from)?;
                out.write_all(b"\n")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("megalista-reader: {e}");
            return ExitCode::from(2);
        }
    };
    init_tracing(&config.logging);

    match run(&args, &config) {
        Ok(()) => {
            tracing::info!("Completed successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(kind = %e.kind(), "{e}");
            match e.kind() {
                ReaderErrorKind::Usage | ReaderErrorKind::Config => ExitCode::from(2),
                ReaderErrorKind::Output | ReaderErrorKind::Warehouse => ExitCode::FAILURE,
            }
        }
    }
}
