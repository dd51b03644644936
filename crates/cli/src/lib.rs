pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use salonbook_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "salonbook",
    about = "Salonbook operator CLI",
    long_about = "Operate the salon booking engine: migrations, config inspection, readiness checks and reschedule window previews.",
    after_help = "Examples:\n  salonbook doctor --json\n  salonbook config\n  salonbook window --original 2026-07-01T15:00:00Z"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config, database connectivity and migration state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run the quote, booking and review lifecycle against a scratch database")]
    Smoke,
    #[command(about = "Preview the reschedule window for an appointment date")]
    Window {
        #[arg(long, help = "Current appointment date (RFC 3339 or local YYYY-MM-DDTHH:MM)")]
        original: String,
        #[arg(long, help = "Candidate new date to check against the window")]
        candidate: Option<String>,
        #[arg(long, help = "Evaluate as of this instant instead of the system clock")]
        now: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Smoke => commands::smoke::run(),
        Command::Window { original, candidate, now } => commands::window::run(
            &original,
            candidate.as_deref(),
            now.as_deref(),
        ),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so command payloads on stdout stay machine-readable.
fn init_logging() {
    use tracing::Level;

    let (level, format) = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => (config.logging.level, config.logging.format),
        Err(_) => ("info".to_string(), LogFormat::Compact),
    };
    let log_level = level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
