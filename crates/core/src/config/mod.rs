//! Configuration loading and schema definitions
//!
//! One TOML file feeds every component of the tracking stack; environment
//! variables override individual keys.

mod loader;
mod schema;

pub use loader::{apply_env_with, Config};
pub use schema::*;
