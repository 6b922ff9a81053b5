//! Operator CLI for the auto-disable policy.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncguard::{
    AutoDisableInput, AutoDisablePolicy, EnvFeatureFlags, JsonStore, NotifierPort, PolicyPorts,
    PolicyError, RecordingNotifier, StreakSummary, TracingNotifier, lookback_start,
};
use syncguard_common::config::DEFAULT_LOG_LEVEL;
use syncguard_common::{
    ConnectionId, ErrorCode, JobStatusAndTimestamp, LoadedConfig, LogConfig, SyncGuardConfig,
    Thresholds, init_logging,
};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(
    name = "syncguard",
    version,
    about = "Disable data-sync connections whose replication jobs keep failing"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to <config dir>/syncguard/config.toml)
    #[arg(long, global = true, env = "SYNCGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one connection and apply the verdict to the store
    Evaluate {
        /// JSON store snapshot holding connections and jobs
        #[arg(long)]
        store: PathBuf,

        /// Connection to evaluate
        #[arg(long)]
        connection: ConnectionId,

        /// Evaluation time (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Report the verdict without writing the store or emitting notifications
        #[arg(long)]
        dry_run: bool,

        /// Output format (json or pretty)
        #[arg(long, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Print the failure streak within the lookback window
    Scan {
        #[arg(long)]
        store: PathBuf,

        #[arg(long)]
        connection: ConnectionId,

        /// Evaluation time (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Show effective configuration and where each value came from
    Config,

    /// Explain an error code (e.g. SG-E100)
    Explain { code: String },
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Serialize)]
struct ScanReport<'a> {
    connection_id: ConnectionId,
    since: DateTime<Utc>,
    summary: StreakSummary,
    jobs: &'a [JobStatusAndTimestamp],
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match cli.command {
        Commands::Explain { .. } => None,
        _ => Some(SyncGuardConfig::load(cli.config.as_deref()).context("failed to load configuration")?),
    };

    let settings = loaded.as_ref().map(|l| l.config.logging());
    let default_level = settings
        .as_ref()
        .map_or(DEFAULT_LOG_LEVEL, |s| s.level.as_str());
    let mut log_config = LogConfig::from_env(default_level).with_stderr();
    if let Some(file) = settings.and_then(|s| s.file) {
        log_config = log_config.with_file(file);
    }
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config).map_err(|err| {
        let code = err.error_code();
        anyhow::Error::new(err).context(code.to_string())
    })?;

    if let Some(loaded) = &loaded {
        for finding in &loaded.warnings {
            warn!(field = finding.field, severity = %finding.severity, "{}", finding.message);
        }
    }

    match (cli.command, loaded) {
        (Commands::Explain { code }, _) => explain(&code),
        (
            Commands::Evaluate {
                store,
                connection,
                now,
                dry_run,
                format,
            },
            Some(loaded),
        ) => evaluate(&loaded, &store, connection, now.unwrap_or_else(Utc::now), dry_run, format),
        (
            Commands::Scan {
                store,
                connection,
                now,
            },
            Some(loaded),
        ) => scan(&loaded, &store, connection, now.unwrap_or_else(Utc::now)),
        (Commands::Config, Some(loaded)) => show_config(&loaded),
        _ => bail!("configuration was not loaded"),
    }
}

fn build_policy(
    loaded: &LoadedConfig,
    store: Arc<JsonStore>,
    notifier: Arc<dyn NotifierPort>,
) -> Result<AutoDisablePolicy> {
    let thresholds: Thresholds = loaded.config.thresholds()?;
    let flags = EnvFeatureFlags::new(loaded.config.auto_disable_failing_connections.value);
    let ports = PolicyPorts {
        history: store.clone(),
        connections: store,
        notifier,
        flags: Arc::new(flags),
    };
    Ok(AutoDisablePolicy::new(ports, thresholds))
}

fn load_store(path: &Path) -> Result<Arc<JsonStore>> {
    let store = JsonStore::load(path)
        .with_context(|| format!("failed to load store from {}", path.display()))?;
    Ok(Arc::new(store))
}

fn evaluate(
    loaded: &LoadedConfig,
    store_path: &Path,
    connection_id: ConnectionId,
    now: DateTime<Utc>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let store = load_store(store_path)?;
    let notifier: Arc<dyn NotifierPort> = if dry_run {
        Arc::new(RecordingNotifier::new())
    } else {
        Arc::new(TracingNotifier)
    };
    let policy = build_policy(loaded, store.clone(), notifier)?;
    debug!(?policy, %connection_id, %now, dry_run, "evaluating connection");

    let evaluation = policy
        .evaluate_detailed(&AutoDisableInput { connection_id, now })
        .map_err(|err| {
            let code = err.error_code();
            anyhow::Error::new(err).context(code.to_string())
        })?;

    if evaluation.disabled && !dry_run {
        store.save(store_path).with_context(|| {
            format!(
                "{}: failed to write store to {}",
                ErrorCode::ConnectionWriteFailed.code_string(),
                store_path.display()
            )
        })?;
    }

    let output = match format {
        OutputFormat::Json => serde_json::to_string(&evaluation)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(&evaluation)?,
    };
    println!("{output}");
    Ok(())
}

fn scan(loaded: &LoadedConfig, store_path: &Path, connection_id: ConnectionId, now: DateTime<Utc>) -> Result<()> {
    let store = load_store(store_path)?;
    let policy = build_policy(loaded, store, Arc::new(TracingNotifier))?;
    let (window, summary) = policy.scan(connection_id, now)?;
    let days = policy.thresholds().max_failure_window_days();
    let since = lookback_start(now, days).ok_or(PolicyError::LookbackOutOfRange { now, days })?;

    let report = ScanReport {
        connection_id,
        since,
        summary,
        jobs: window.as_slice(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn show_config(loaded: &LoadedConfig) -> Result<()> {
    let config = &loaded.config;
    match &loaded.path {
        Some(path) => println!("config file: {}", path.display()),
        None => println!("config file: (none)"),
    }
    println!(
        "auto_disable_failing_connections = {} ({})",
        config.auto_disable_failing_connections.value,
        config.auto_disable_failing_connections.origin()
    );
    println!(
        "max_consecutive_failures = {} ({})",
        config.max_consecutive_failures.value,
        config.max_consecutive_failures.origin()
    );
    println!(
        "max_failure_window_days = {} ({})",
        config.max_failure_window_days.value,
        config.max_failure_window_days.origin()
    );
    println!("log_level = {} ({})", config.log_level.value, config.log_level.origin());
    match &config.log_file.value {
        Some(file) => println!("log_file = {} ({})", file.display(), config.log_file.origin()),
        None => println!("log_file = (stderr only)"),
    }

    let thresholds = config.thresholds()?;
    println!(
        "warning thresholds: {} consecutive failures, {} days",
        thresholds.warn_consecutive_failures(),
        thresholds.warn_window_days()
    );

    for finding in &loaded.warnings {
        println!("{finding}");
    }
    Ok(())
}

fn explain(code: &str) -> Result<()> {
    let Some(code) = ErrorCode::from_code_str(code) else {
        bail!("unknown error code: {code}");
    };
    println!("{}", code.entry().format_full());
    Ok(())
}
