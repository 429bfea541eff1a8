//! Logging and observability for the ShopVerse tracking stack
//!
//! This crate sets up `tracing` once per process:
//! - Console output on stderr in compact, pretty or JSON format
//! - Optional daily-rolling log files through `tracing-appender`
//! - A process-wide session id for correlating log lines

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt as tfmt, prelude::*, EnvFilter, Layer, Registry};
use uuid::Uuid;

/// Global session ID for correlating logs
static SESSION_ID: LazyLock<String> = LazyLock::new(|| Uuid::new_v4().to_string());

/// Noisy dependency targets kept at `warn` unless `RUST_LOG` says otherwise
const QUIET_TARGETS: &str = "hyper=warn,reqwest=warn,rustls=warn";

/// Initialize the telemetry system with defaults
pub fn init() -> anyhow::Result<Option<WorkerGuard>> {
    init_with_config(TelemetryConfig::default())
}

/// Initialize with custom configuration
///
/// The returned guard flushes the log file on drop; hold it for the life of
/// the process. `RUST_LOG` overrides the configured level.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = build_filter(&config.log_level);

    let console = match config.format {
        LogFormat::Compact => tfmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .compact()
            .boxed(),
        LogFormat::Pretty => tfmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .pretty()
            .boxed(),
        LogFormat::Json => tfmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .json()
            .boxed(),
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![console];
    let mut guard = None;

    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow::anyhow!("Failed to create log directory {}: {e}", dir.display()))?;

        let appender = RollingFileAppender::new(Rotation::DAILY, dir, "shopverse-track.log");
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            tfmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {e}"))?;

    tracing::info!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        log_dir = ?config.log_dir,
        "Telemetry initialized"
    );

    Ok(guard)
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},{QUIET_TARGETS}")))
}

/// Get the current session ID
pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Console output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human output
    #[default]
    Compact,
    /// Multi-line human output
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default filter directive, e.g. `info` or `shopverse_tracking=debug`
    pub log_level: String,
    /// Console format
    pub format: LogFormat,
    /// Include the event target in console output
    pub show_target: bool,
    /// Directory for rolling log files; `None` disables file output
    pub log_dir: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Compact,
            show_target: false,
            log_dir: None,
        }
    }
}

impl TelemetryConfig {
    /// Raise the level to `debug` and show targets
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.log_level = "debug".to_string();
            self.show_target = true;
        }
        self
    }

    /// Write rolling log files into `dir`
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Select the console format
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    /// Start a new timer
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and log the duration
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = self.name,
            duration_ms = duration.as_millis() as u64,
            "Timer completed"
        );
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id() {
        let id = session_id();
        assert!(!id.is_empty());
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(id, session_id());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }

    #[test]
    fn test_verbose_config() {
        let config = TelemetryConfig::default().verbose(true);
        assert_eq!(config.log_level, "debug");
        assert!(config.show_target);

        let config = TelemetryConfig::default().verbose(false);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_init_writes_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = TelemetryConfig::default().with_log_dir(dir.path());

        let guard = init_with_config(config).unwrap();
        assert!(guard.is_some());
        tracing::info!("hello from the test");
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(!files.is_empty());
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start("test_operation");
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.stop() >= Duration::from_millis(5));
    }
}
