//! Terminal output

use owo_colors::OwoColorize;
use serde::Serialize;
use shopverse_core::Error;
use std::time::Duration;

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Colored text for humans
    Text,
    /// One JSON document per result or event
    Json,
}

impl Format {
    pub fn is_json(self) -> bool {
        self == Self::Json
    }
}

/// Status message helpers
pub struct Status;

impl Status {
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    pub fn header(message: &str) {
        println!();
        println!("{}", message.bold());
        println!("{}", "─".repeat(message.chars().count()));
    }

    /// Aligned `label: value` line
    pub fn field(label: &str, value: impl std::fmt::Display) {
        println!("  {:<14} {}", format!("{label}:").dimmed(), value);
    }
}

/// Print `value` as one line of JSON
pub fn json_line<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => Status::error(&format!("Could not encode output: {e}")),
    }
}

/// Print an error in the selected format
pub fn report_error(error: &Error, format: Format) {
    if format.is_json() {
        match serde_json::to_string(&error.to_report()) {
            Ok(line) => eprintln!("{line}"),
            Err(_) => eprintln!("{error}"),
        }
    } else {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }
}

/// Format a duration for display
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Format a distance for display
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{meters:.0} m")
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(240)), "4m 0s");
        assert_eq!(format_duration(Duration::from_secs(3_720)), "1h 2m");
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(28.4), "28 m");
        assert_eq!(format_distance(1_423.0), "1.42 km");
    }
}
