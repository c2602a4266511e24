//! Burnout CLI - Command-line interface for the burnout engine
//!
//! Commands:
//! - analyze: Score entity inputs into a burnout report
//! - correlate: Correlate incident, commit and message streams
//! - config: Print or validate engine configuration
//! - doctor: Diagnose configuration and history files

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use burnout_engine::history::HistoryStore;
use burnout_engine::pipeline::{AnalyzerConfig, BurnoutProcessor, CorrelationInput, EntityInput};
use burnout_engine::{CrossPlatformCorrelator, EngineError, ENGINE_VERSION, PRODUCER_NAME};

/// Burnout - Deterministic burnout risk scoring from on-call, code and chat telemetry
#[derive(Parser)]
#[command(name = "burnout")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score and predict burnout risk from work telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score entity inputs into a burnout report
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Prediction horizon in days (overrides the configuration)
        #[arg(long)]
        horizon_days: Option<u32>,

        /// Analysis window in days (overrides the configuration)
        #[arg(long)]
        analysis_days: Option<u32>,

        /// Load run history from file
        #[arg(long)]
        load_history: Option<PathBuf>,

        /// Save run history to file after processing
        #[arg(long)]
        save_history: Option<PathBuf>,
    },

    /// Correlate incident, commit and message streams
    Correlate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Timezone (IANA format, overrides the input)
        #[arg(long)]
        timezone: Option<String>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Print the default configuration or validate a configuration file
    Config {
        /// Configuration file to validate
        #[arg(long)]
        validate: Option<PathBuf>,
    },

    /// Diagnose configuration and history files
    Doctor {
        /// Check configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check history file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array of entity inputs
    Json,
    /// Newline-delimited JSON (one entity input per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr, filtered by `BURNOUT_LOG` (default `warn`)
fn init_tracing() {
    let filter = EnvFilter::try_from_env("BURNOUT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), BurnoutCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            input_format,
            output_format,
            config,
            horizon_days,
            analysis_days,
            load_history,
            save_history,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(days) = horizon_days {
                config.horizon_days = days;
            }
            if let Some(days) = analysis_days {
                config.analysis_days = days;
            }
            config.validate().map_err(EngineError::from)?;
            cmd_analyze(
                &input,
                &output,
                input_format,
                output_format,
                config,
                load_history.as_deref(),
                save_history.as_deref(),
            )
        }

        Commands::Correlate {
            input,
            output,
            timezone,
            output_format,
        } => cmd_correlate(&input, &output, timezone.as_deref(), output_format),

        Commands::Config { validate } => cmd_config(validate.as_deref()),

        Commands::Doctor { config, history, json } => {
            cmd_doctor(config.as_deref(), history.as_deref(), json)
        }
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: AnalyzerConfig,
    load_history: Option<&Path>,
    save_history: Option<&Path>,
) -> Result<(), BurnoutCliError> {
    let input_data = read_input(input)?;

    let inputs: Vec<EntityInput> = match input_format {
        InputFormat::Json => serde_json::from_str(&input_data)?,
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
    };

    if inputs.is_empty() {
        return Err(BurnoutCliError::NoEntities);
    }

    let mut processor = BurnoutProcessor::with_config(config);

    if let Some(history_path) = load_history {
        let history_json = fs::read_to_string(history_path)?;
        processor.load_history(&history_json)?;
        info!(path = %history_path.display(), "loaded run history");
    }

    let report = processor.process(&inputs);
    info!(
        entities = report.team_summary.entity_count,
        at_risk = report.team_summary.at_risk_entities.len(),
        "analysis complete"
    );

    if let Some(history_path) = save_history {
        let history_json = processor.save_history()?;
        fs::write(history_path, history_json)?;
        info!(path = %history_path.display(), "saved run history");
    }

    let output_data = format_output(&report, &output_format)?;
    write_output(output, &output_data)
}

fn cmd_correlate(
    input: &Path,
    output: &Path,
    timezone: Option<&str>,
    output_format: OutputFormat,
) -> Result<(), BurnoutCliError> {
    let input_data = read_input(input)?;
    let streams: CorrelationInput = serde_json::from_str(&input_data)?;

    let correlator = timezone
        .or(streams.timezone.as_deref())
        .map(CrossPlatformCorrelator::new)
        .unwrap_or_default();
    let result = correlator.correlate(&streams.incidents, &streams.commits, &streams.messages);
    debug!(
        events = result.events_analyzed,
        skipped = result.skipped_events,
        "correlation complete"
    );

    let output_data = format_output(&result, &output_format)?;
    write_output(output, &output_data)
}

fn cmd_config(validate: Option<&Path>) -> Result<(), BurnoutCliError> {
    let config = match validate {
        Some(path) => {
            let config = load_config(Some(path))?;
            eprintln!("Configuration valid: {}", path.display());
            config
        }
        None => AnalyzerConfig::default(),
    };
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, history: Option<&Path>, json: bool) -> Result<(), BurnoutCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Engine version {}", ENGINE_VERSION),
    });

    if let Some(config_path) = config {
        checks.push(check_file(config_path, "config", |content| {
            AnalyzerConfig::from_json(content).map(|config| {
                format!(
                    "Configuration valid ({}-day window, {}-day horizon)",
                    config.analysis_days, config.horizon_days
                )
            })
        }));
    }

    if let Some(history_path) = history {
        checks.push(check_file(history_path, "history", |content| {
            HistoryStore::from_json(content).map(|store| {
                format!(
                    "History file valid ({} entities, window {} runs)",
                    store.len(),
                    store.window_size()
                )
            })
        }));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (use --input - to read it)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Burnout Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(BurnoutCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn check_file<F>(path: &Path, name: &str, validate: F) -> DoctorCheck
where
    F: FnOnce(&str) -> Result<String, EngineError>,
{
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }

    let (status, message) = match fs::read_to_string(path) {
        Ok(content) => match validate(&content) {
            Ok(message) => (CheckStatus::Ok, message),
            Err(e) => (CheckStatus::Error, format!("Invalid {name} file: {e}")),
        },
        Err(e) => (CheckStatus::Error, format!("Cannot read {name} file: {e}")),
    };

    DoctorCheck {
        name: name.to_string(),
        status,
        message,
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig, BurnoutCliError> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Ok(AnalyzerConfig::from_json(&content)?)
        }
        None => Ok(AnalyzerConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, BurnoutCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), BurnoutCliError> {
    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn parse_ndjson(data: &str) -> Result<Vec<EntityInput>, BurnoutCliError> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line.trim()).map_err(|e| {
                BurnoutCliError::ParseError(format!("Line {}: {}", index + 1, e))
            })
        })
        .collect()
}

fn format_output<T: serde::Serialize>(value: &T, format: &OutputFormat) -> Result<String, BurnoutCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

// Error types

#[derive(Debug)]
enum BurnoutCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoEntities,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for BurnoutCliError {
    fn from(e: io::Error) -> Self {
        BurnoutCliError::Io(e)
    }
}

impl From<EngineError> for BurnoutCliError {
    fn from(e: EngineError) -> Self {
        BurnoutCliError::Engine(e)
    }
}

impl From<serde_json::Error> for BurnoutCliError {
    fn from(e: serde_json::Error) -> Self {
        BurnoutCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BurnoutCliError> for CliError {
    fn from(e: BurnoutCliError) -> Self {
        match e {
            BurnoutCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BurnoutCliError::Engine(EngineError::Config(e)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'burnout config' to see a valid configuration".to_string()),
            },
            BurnoutCliError::Engine(EngineError::InvalidHistory(msg)) => CliError {
                code: "HISTORY_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'burnout doctor --history <file>' for details".to_string()),
            },
            BurnoutCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            BurnoutCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BurnoutCliError::NoEntities => CliError {
                code: "NO_ENTITIES".to_string(),
                message: "No entity inputs found".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            BurnoutCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            BurnoutCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
