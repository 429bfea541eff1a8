//! shopverse-track - ShopVerse delivery tracking from the terminal
//!
//! Signs in against the ShopVerse backend, lists order history, computes
//! routes and follows a delivery trip from a recorded location feed.

use anyhow::Context;
use clap::{Parser, Subcommand};
use shopverse_geo::Coordinate;
use shopverse_telemetry::{LogFormat, TelemetryConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

mod commands;
mod context;
mod output;

use context::AppContext;
use output::{report_error, Format};

/// ShopVerse delivery tracking CLI
#[derive(Parser)]
#[command(name = "shopverse-track")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ./shopverse.toml or the user config dir)
    #[arg(short, long, global = true, env = "SHOPVERSE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: Format,

    /// Also write daily log files into this directory
    #[arg(long, global = true, env = "SHOPVERSE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "SHOPVERSE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and delete the stored session
    Logout,

    /// Show configuration and session state
    Status,

    /// List your orders, newest first
    Orders {
        /// Only orders with this status (e.g. PENDING, DELIVERED)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Compute a route between two points
    Route {
        /// Origin as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        from: Coordinate,

        /// Destination as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        to: Coordinate,
    },

    /// Follow a trip to a destination using recorded positions
    Track {
        /// Destination as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        to: Coordinate,

        /// JSON file of recorded fixes
        #[arg(short, long)]
        replay: PathBuf,

        /// Trip identifier (generated if omitted)
        #[arg(long)]
        trip_id: Option<String>,

        /// Delay between replayed fixes in milliseconds
        #[arg(long, default_value = "1000")]
        pace_ms: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_format = if cli.format.is_json() {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    let mut telemetry = TelemetryConfig::default()
        .verbose(cli.verbose)
        .with_format(log_format);
    if let Some(dir) = &cli.log_dir {
        telemetry = telemetry.with_log_dir(dir);
    }
    let _guard = match shopverse_telemetry::init_with_config(telemetry).context("Failed to initialize logging") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, cli.config, cli.format).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, cli.format);
            ExitCode::from(u8::try_from(e.code.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(command: Commands, config: Option<PathBuf>, format: Format) -> shopverse_core::Result<()> {
    let ctx = AppContext::load(config.as_deref())?;

    match command {
        Commands::Login { email, password } => commands::auth::login(&ctx, &email, &password, format).await,
        Commands::Logout => commands::auth::logout(&ctx, format).await,
        Commands::Status => commands::auth::status(&ctx, format),
        Commands::Orders { status } => commands::orders::list(&ctx, status.as_deref(), format).await,
        Commands::Route { from, to } => commands::route::show(&ctx, from, to, format).await,
        Commands::Track {
            to,
            replay,
            trip_id,
            pace_ms,
        } => {
            let args = commands::track::TrackArgs {
                destination: to,
                replay: &replay,
                trip_id,
                pace: Duration::from_millis(pace_ms),
            };
            commands::track::run(&ctx, args, format).await
        }
    }
}
