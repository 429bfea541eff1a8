//! Configuration file loading and environment overrides

use super::schema::ConfigSchema;
use crate::error::{Error, ErrorCode, Result};
use std::path::{Path, PathBuf};

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed and overridden values
    pub schema: ConfigSchema,
    /// File the values were read from, if any
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from an explicit path or the standard locations,
    /// apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };

        let mut schema = match &config_path {
            Some(p) => load_config_file(p)?,
            None => ConfigSchema::default(),
        };

        apply_env_with(&mut schema, |key| std::env::var(key).ok())?;
        schema.validate()?;

        tracing::debug!(path = ?config_path, "Configuration loaded");

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Parse configuration from a TOML string without touching the environment
    pub fn from_toml(content: &str) -> Result<Self> {
        let schema: ConfigSchema = toml::from_str(content)?;
        schema.validate()?;
        Ok(Self { schema, path: None })
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("shopverse.toml"),
        PathBuf::from(".shopverse.toml"),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("shopverse").join("config.toml"));
    }

    candidates.into_iter().find(|candidate| candidate.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::from(e).with_context(format!("Failed to read config file {}", path.display()))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::from(e).with_context(format!("Failed to parse config file {}", path.display()))
    })
}

/// Apply environment overrides using `lookup` to read variables
pub fn apply_env_with<F>(schema: &mut ConfigSchema, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("SHOPVERSE_API_URL").or_else(|| lookup("SUPABASE_URL")) {
        schema.backend.url = url;
    }
    if let Some(key) = lookup("SUPABASE_ANON_KEY") {
        schema.backend.anon_key = key;
    }
    if let Some(env) = lookup("SHOPVERSE_ENV") {
        schema.backend.environment = env;
    }
    if let Some(key) = lookup("MAPS_API_KEY") {
        schema.directions.api_key = key;
    }
    if let Some(raw) = lookup("SHOPVERSE_MIN_INTERVAL_MS") {
        schema.location.min_interval_ms = parse_env("SHOPVERSE_MIN_INTERVAL_MS", &raw)?;
    }
    if let Some(raw) = lookup("SHOPVERSE_ARRIVAL_THRESHOLD_M") {
        schema.tracking.arrival_threshold_m = parse_env("SHOPVERSE_ARRIVAL_THRESHOLD_M", &raw)?;
    }
    if let Some(dir) = lookup("SHOPVERSE_DATA_DIR") {
        schema.storage.dir = Some(PathBuf::from(dir));
    }
    Ok(())
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        Error::new(
            ErrorCode::InvalidConfigValue,
            format!("Invalid value for {key}: {e}"),
        )
    })
}
