//! Configuration Loader
//!
//! Handles locating knit.toml and layering environment overrides on top of it.

use crate::project::{is_valid_opt_level, ProjectConfig};
use crate::{ConfigError, ConfigResult, CONFIG_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration with the following precedence:
/// 1. Project config (knit.toml) - lowest priority
/// 2. Environment variables (KNIT_*) - overrides project
/// 3. CLI flags - highest priority (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip KNIT_* environment overrides
    ignore_env: bool,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Project root directory (where knit.toml was found)
    pub project_root: Option<PathBuf>,

    /// Directory the search started from
    pub start_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { ignore_env: false }
    }

    /// Do not apply KNIT_* environment overrides
    pub fn without_env(mut self) -> Self {
        self.ignore_env = true;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find knit.toml. When none is found the
    /// start directory is used as the project root with default settings.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            project_root,
            start_dir: start_dir.to_path_buf(),
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let project_config = self.apply_env_overrides(project_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());
        let start_dir = project_root.clone().unwrap_or_else(|| PathBuf::from("."));

        Ok(Config {
            project: project_config,
            project_root,
            start_dir,
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides to project config
    ///
    /// Recognised: KNIT_COMPILER, KNIT_CFLAGS, KNIT_LFLAGS, KNIT_OPT_LEVEL
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Ok(compiler) = env::var("KNIT_COMPILER") {
            if compiler.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "KNIT_COMPILER".to_string(),
                    reason: "compiler cannot be empty".to_string(),
                });
            }
            config.build_mut().compiler = Some(compiler);
        }

        if let Ok(cflags) = env::var("KNIT_CFLAGS") {
            config.build_mut().cflags = Some(cflags);
        }

        if let Ok(lflags) = env::var("KNIT_LFLAGS") {
            config.build_mut().lflags = Some(lflags);
        }

        if let Ok(level) = env::var("KNIT_OPT_LEVEL") {
            if !is_valid_opt_level(&level) {
                return Err(ConfigError::InvalidValue {
                    field: "KNIT_OPT_LEVEL".to_string(),
                    reason: format!("invalid optimisation level '{}'", level),
                });
            }
            config.build_mut().optimisation_level = Some(level);
        }

        Ok(config)
    }
}

impl Config {
    /// Get the project root directory (falls back to the start directory)
    pub fn root(&self) -> &Path {
        self.project_root.as_deref().unwrap_or(&self.start_dir)
    }

    /// Get the library name
    pub fn package_name(&self) -> Option<&str> {
        self.project.package_name()
    }

    /// Check if this is a project (has knit.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn clear_env() {
        for key in ["KNIT_COMPILER", "KNIT_CFLAGS", "KNIT_LFLAGS", "KNIT_OPT_LEVEL"] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_load_project_config() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[package]\nname = \"demo\"\n");

        let config = ConfigLoader::new()
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert_eq!(config.package_name(), Some("demo"));
        assert!(config.is_project());
        assert_eq!(config.root(), temp_dir.path());
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[package]\nname = \"parent\"\n");

        let sub_dir = temp_dir.path().join("src").join("nested");
        fs::create_dir_all(&sub_dir).unwrap();

        let config = ConfigLoader::new().load_from_directory(&sub_dir).unwrap();

        assert_eq!(config.package_name(), Some("parent"));
        assert_eq!(config.root(), temp_dir.path());
    }

    #[test]
    #[serial]
    fn test_env_overrides_take_precedence() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            "[build]\ncompiler = \"gcc\"\ncflags = \"-DFILE\"\n",
        );

        env::set_var("KNIT_COMPILER", "clang");
        env::set_var("KNIT_OPT_LEVEL", "s");
        let config = ConfigLoader::new()
            .load_from_directory(temp_dir.path())
            .unwrap();
        clear_env();

        let build = config.project.build.unwrap();
        assert_eq!(build.compiler.as_deref(), Some("clang"));
        assert_eq!(build.optimisation_level.as_deref(), Some("s"));
        assert_eq!(build.cflags.as_deref(), Some("-DFILE"));
    }

    #[test]
    #[serial]
    fn test_invalid_env_opt_level() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "");

        env::set_var("KNIT_OPT_LEVEL", "7");
        let result = ConfigLoader::new().load_from_directory(temp_dir.path());
        clear_env();

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    #[serial]
    fn test_without_env_ignores_overrides() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "");

        env::set_var("KNIT_CFLAGS", "-DENV");
        let config = ConfigLoader::new()
            .without_env()
            .load_from_directory(temp_dir.path())
            .unwrap();
        clear_env();

        assert!(config.project.build.is_none());
    }
}
