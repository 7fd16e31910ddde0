//! logkeep: session log maintenance and ingest CLI.
//!
//! Subcommands share one resolved configuration. stdout carries command
//! payloads (text or JSON); diagnostics go to stderr through the
//! logging subsystem.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::error;

use lk_config::{resolve_settings, validate_settings, Overrides, Resolved, Settings};
use lk_core::exit_codes::ExitCode;
use lk_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use lk_core::retention::{sweep_with_options, RetentionPolicy, SweepOptions, SweepReport};
use lk_core::root::ensure_root;
use lk_core::session::naming;
use lk_core::session::shutdown::ShutdownCoordinator;
use lk_core::session::writer::{SessionWriter, WriterOptions};

const SECS_PER_DAY: u64 = 86_400;

/// Session-scoped log storage: rotate, finalize, prune
#[derive(Parser)]
#[command(name = "logkeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands.
///
/// Each option falls back to its LOGKEEP_* environment variable, then
/// to builtin defaults; resolution lives in lk-config so the library
/// and the CLI agree on precedence.
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Log root directory [env: LOGKEEP_ROOT_DIR]
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Session prefix for new sessions [env: LOGKEEP_SESSION_PREFIX]
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Lines per part file before rotation [env: LOGKEEP_MAX_LINES]
    #[arg(long, global = true)]
    max_lines: Option<u32>,

    /// Retention cutoff in days, 0 disables pruning [env: LOGKEEP_MAX_AGE_DAYS]
    #[arg(long, global = true)]
    max_age_days: Option<u32>,

    /// Disable the log subsystem entirely
    #[arg(long, global = true)]
    no_preserve: bool,

    /// Output format for command payloads
    #[arg(long, short = 'f', global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure the log root exists
    Prepare,

    /// Remove finalized sessions older than the retention cutoff
    Prune {
        /// Report what would be removed without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Summarize sessions under the log root
    Status,

    /// Resolve and validate configuration
    Check,

    /// Read records from stdin into a new session until EOF
    Record,
}

fn main() {
    let cli = Cli::parse();

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let cli_format = match cli.global.format {
        OutputFormat::Json => Some(LogFormat::Jsonl),
        OutputFormat::Text => None,
    };
    init_logging(&LogConfig::from_env(cli_level, cli_format));

    run(cli).exit();
}

fn run(cli: Cli) -> ExitCode {
    let overrides = Overrides {
        root_dir: cli.global.root.clone(),
        max_lines: cli.global.max_lines,
        session_prefix: cli.global.prefix.clone(),
        preserve_logs: cli.global.no_preserve.then_some(false),
        max_age_days: cli.global.max_age_days,
    };
    let resolved = match resolve_settings(&overrides) {
        Ok(resolved) => resolved,
        Err(error) => {
            error!(%error, "failed to resolve settings");
            return ExitCode::ConfigError;
        }
    };

    // `check` reports validation problems itself instead of dying on
    // them.
    if let Commands::Check = cli.command {
        return cmd_check(&resolved, cli.global.format);
    }

    if let Err(error) = validate_settings(&resolved.settings) {
        error!(%error, "invalid settings");
        return ExitCode::ConfigError;
    }
    let settings = resolved.settings;

    match cli.command {
        Commands::Prepare => cmd_prepare(&settings),
        Commands::Prune { dry_run } => cmd_prune(&settings, dry_run, cli.global.format),
        Commands::Status => cmd_status(&settings, cli.global.format),
        Commands::Record => cmd_record(&settings),
        Commands::Check => unreachable!("handled above"),
    }
}

fn cmd_prepare(settings: &Settings) -> ExitCode {
    match ensure_root(&settings.root_dir) {
        Ok(()) => {
            println!("log root ready at {}", settings.root_dir.display());
            ExitCode::Clean
        }
        Err(error) => {
            error!(%error, root = %settings.root_dir.display(), "failed to create log root");
            ExitCode::IoError
        }
    }
}

fn cmd_prune(settings: &Settings, dry_run: bool, format: OutputFormat) -> ExitCode {
    if !settings.preserve_logs {
        println!("log preservation disabled; skipping prune");
        return ExitCode::Clean;
    }
    if settings.max_age_days == 0 {
        println!("log retention disabled; nothing to prune");
        return ExitCode::Clean;
    }

    let policy = RetentionPolicy::from_settings(settings);
    match sweep_with_options(&policy, SweepOptions { dry_run }) {
        Ok(report) => {
            print_sweep_report(&report, settings.max_age_days, format);
            ExitCode::Clean
        }
        Err(error) => {
            error!(%error, "retention sweep failed");
            ExitCode::IoError
        }
    }
}

fn print_sweep_report(report: &SweepReport, max_age_days: u32, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(report).expect("report serializes")
        ),
        OutputFormat::Text => {
            let removed = report.removed_count();
            let verb = if report.dry_run { "would prune" } else { "pruned" };
            println!(
                "{verb} {removed} log session{} older than {max_age_days} day{}",
                plural(removed),
                plural(max_age_days as usize)
            );
            for anomaly in &report.anomalies {
                println!("warning: {anomaly}");
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    root_dir: String,
    running: usize,
    finished: usize,
    oldest_finished_age_days: Option<u64>,
}

fn cmd_status(settings: &Settings, format: OutputFormat) -> ExitCode {
    let mut report = StatusReport {
        root_dir: settings.root_dir.display().to_string(),
        running: 0,
        finished: 0,
        oldest_finished_age_days: None,
    };

    let entries = match std::fs::read_dir(&settings.root_dir) {
        Ok(entries) => Some(entries),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
        Err(error) => {
            error!(%error, "failed to list log root");
            return ExitCode::IoError;
        }
    };

    if let Some(entries) = entries {
        let now = SystemTime::now();
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if naming::is_running(&name) {
                report.running += 1;
            } else {
                report.finished += 1;
                if let Ok(modified) = entry.metadata().and_then(|meta| meta.modified()) {
                    let days = now.duration_since(modified).unwrap_or_default().as_secs()
                        / SECS_PER_DAY;
                    report.oldest_finished_age_days =
                        Some(report.oldest_finished_age_days.map_or(days, |d| d.max(days)));
                }
            }
        }
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).expect("status serializes")
        ),
        OutputFormat::Text => {
            println!("log root: {}", report.root_dir);
            println!("running sessions: {}", report.running);
            println!("finished sessions: {}", report.finished);
            if let Some(days) = report.oldest_finished_age_days {
                println!("oldest finished session: {days} day{} old", plural(days as usize));
            }
        }
    }
    ExitCode::Clean
}

fn cmd_check(resolved: &Resolved, format: OutputFormat) -> ExitCode {
    let settings = &resolved.settings;

    let mut errors = Vec::new();
    if let Err(error) = validate_settings(settings) {
        errors.push(error.to_string());
    }
    if let Err(error) = naming::validate_prefix(&settings.session_prefix) {
        let message = error.to_string();
        if !errors.contains(&message) {
            errors.push(message);
        }
    }

    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct CheckReport<'a> {
                settings: &'a Settings,
                valid: bool,
                errors: &'a [String],
            }
            let payload = CheckReport {
                settings,
                valid: errors.is_empty(),
                errors: &errors,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).expect("check report serializes")
            );
        }
        OutputFormat::Text => {
            let sources = &resolved.sources;
            println!(
                "root_dir       = {} ({})",
                settings.root_dir.display(),
                sources.root_dir
            );
            println!("max_lines      = {} ({})", settings.max_lines, sources.max_lines);
            println!(
                "session_prefix = {} ({})",
                settings.session_prefix, sources.session_prefix
            );
            println!(
                "preserve_logs  = {} ({})",
                settings.preserve_logs, sources.preserve_logs
            );
            println!(
                "max_age_days   = {} ({})",
                settings.max_age_days, sources.max_age_days
            );
            for error in &errors {
                println!("error: {error}");
            }
            if errors.is_empty() {
                println!("configuration ok");
            }
        }
    }

    if errors.is_empty() {
        ExitCode::Clean
    } else {
        ExitCode::ConfigError
    }
}

fn cmd_record(settings: &Settings) -> ExitCode {
    if !settings.preserve_logs {
        println!("log preservation disabled; not recording");
        return ExitCode::Clean;
    }

    let writer = match SessionWriter::create(WriterOptions::from_settings(settings)) {
        Ok(writer) => writer,
        Err(error) => {
            error!(%error, "failed to open session log");
            return ExitCode::IoError;
        }
    };
    let shared = writer.into_shared();
    let _guard = match ShutdownCoordinator::install(Arc::clone(&shared)) {
        Ok(guard) => guard,
        Err(error) => {
            error!(%error, "failed to install shutdown handler");
            return ExitCode::IoError;
        }
    };

    let mut recorded = 0usize;
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                error!(%error, "stdin read failed");
                break;
            }
        };
        let appended = match shared.lock() {
            Ok(mut writer) => writer.write(&line),
            // Poisoned by a panic on the signal thread; stop ingesting.
            Err(_) => break,
        };
        if let Err(error) = appended {
            error!(%error, "failed to append record");
            return ExitCode::IoError;
        }
        recorded += 1;
    }

    if let Ok(mut writer) = shared.lock() {
        if let Err(error) = writer.close() {
            error!(%error, "failed to finalize session log");
            return ExitCode::IoError;
        }
    }

    println!(
        "recorded {recorded} record{} under {}",
        plural(recorded),
        settings.root_dir.display()
    );
    ExitCode::Clean
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
