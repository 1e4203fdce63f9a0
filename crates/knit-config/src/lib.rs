//! Knit Configuration System
//!
//! Provides configuration management for knit projects:
//! - Project configuration (knit.toml)
//! - Environment variable overrides (KNIT_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults (applied by the build crate)
//! 2. Project config (./knit.toml, found by walking up from the start directory)
//! 3. Environment variables (KNIT_*)
//! 4. CLI flags (handled by the caller)
//!
//! # Example
//!
//! ```no_run
//! use knit_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("building in {}", config.root().display());
//! ```

pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "knit.toml";

/// Dependency names accepted in `[dependencies]` and `[targets]`
pub const KNOWN_DEPENDENCIES: [&str; 3] = ["crypto", "random", "events"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown dependency '{name}' in {field} (expected one of: crypto, random, events)")]
    UnknownDependency { name: String, field: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{Config, ConfigLoader};
pub use project::{BuildSection, DependenciesConfig, DependencyConfig, PackageConfig, ProjectConfig};
