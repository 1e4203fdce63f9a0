//! Project Configuration (knit.toml)
//!
//! Handles project-level configuration stored in `knit.toml` at the project root.
//! Every field is optional; the build crate fills gaps with platform defaults.

use crate::{ConfigError, ConfigResult, KNOWN_DEPENDENCIES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Project configuration from knit.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Package metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageConfig>,

    /// Build settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSection>,

    /// External dependency settings
    #[serde(default)]
    pub dependencies: DependenciesConfig,

    /// Capability table overrides: target name -> required dependency names
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, Vec<String>>,
}

/// Package metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Library name (the shared library is `lib<name>.so` / `lib<name>.dylib`)
    pub name: String,
}

/// `[build]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Use platform defaults for unset dependency locations (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_config: Option<bool>,

    /// Compiler driver used for compiling and linking (default: "gcc")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,

    /// Optimisation level passed as `-O<level>` outside debug builds (default: "2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimisation_level: Option<String>,

    /// Extra compiler flags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cflags: Option<String>,

    /// Extra linker flags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lflags: Option<String>,

    /// Compile library units on worker threads (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    /// Build output root (default: "build")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Library source directory (default: "src")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Test source directory (default: "test")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<PathBuf>,

    /// Example source directory (default: "examples")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<PathBuf>,

    /// Files from the test directory copied next to the test binaries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixtures: Option<Vec<PathBuf>>,
}

/// `[dependencies]` section, one optional table per known dependency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DependenciesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crypto: Option<DependencyConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub random: Option<DependencyConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<DependencyConfig>,
}

/// Settings for a single external dependency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DependencyConfig {
    /// Installation root (contains `include/` and `lib/`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,

    /// Extra linker flags for targets using this dependency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lflags: Option<String>,

    /// Glue source compiled into the dependency object, relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Extra headers staged into the include directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<PathBuf>>,
}

impl DependenciesConfig {
    /// Look up a dependency table by its name
    pub fn get(&self, name: &str) -> Option<&DependencyConfig> {
        match name {
            "crypto" => self.crypto.as_ref(),
            "random" => self.random.as_ref(),
            "events" => self.events.as_ref(),
            _ => None,
        }
    }
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::TomlParseError { error, .. } => ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error,
            },
            other => other,
        })?;

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: PathBuf::from(crate::CONFIG_FILE_NAME),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(pkg) = &self.package {
            if pkg.name.is_empty() || pkg.name.contains(['/', '\\']) {
                return Err(ConfigError::InvalidValue {
                    field: "package.name".to_string(),
                    reason: format!("'{}' is not a valid library name", pkg.name),
                });
            }
        }

        if let Some(build) = &self.build {
            if let Some(compiler) = &build.compiler {
                if compiler.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "build.compiler".to_string(),
                        reason: "compiler cannot be empty".to_string(),
                    });
                }
            }

            if let Some(level) = &build.optimisation_level {
                if !is_valid_opt_level(level) {
                    return Err(ConfigError::InvalidValue {
                        field: "build.optimisation_level".to_string(),
                        reason: format!("invalid optimisation level '{}'", level),
                    });
                }
            }
        }

        for (target, deps) in &self.targets {
            for dep in deps {
                if !KNOWN_DEPENDENCIES.contains(&dep.as_str()) {
                    return Err(ConfigError::UnknownDependency {
                        name: dep.clone(),
                        field: format!("targets.{}", target),
                    });
                }
            }
        }

        Ok(())
    }

    /// Get the library name, if present
    pub fn package_name(&self) -> Option<&str> {
        self.package.as_ref().map(|p| p.name.as_str())
    }

    /// Get the build section, creating it if absent
    pub fn build_mut(&mut self) -> &mut BuildSection {
        self.build.get_or_insert_with(BuildSection::default)
    }
}

/// Levels accepted by gcc/clang as `-O<level>`
pub fn is_valid_opt_level(level: &str) -> bool {
    matches!(level, "0" | "1" | "2" | "3" | "s" | "z" | "g" | "fast")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = ProjectConfig::parse("").unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.package_name(), None);
    }

    #[test]
    fn test_parse_full_config() {
        let config = ProjectConfig::parse(
            r#"
[package]
name = "cbitcoin"

[build]
auto_config = false
compiler = "clang"
optimisation_level = "3"
cflags = "-DNDEBUG"
fixtures = ["scriptCases.txt"]

[dependencies.crypto]
location = "/opt/ssl/"
lflags = "-ldl"

[targets]
testCBAddress = ["crypto", "random"]
"#,
        )
        .unwrap();

        assert_eq!(config.package_name(), Some("cbitcoin"));
        let build = config.build.as_ref().unwrap();
        assert_eq!(build.compiler.as_deref(), Some("clang"));
        assert_eq!(build.auto_config, Some(false));
        let crypto = config.dependencies.get("crypto").unwrap();
        assert_eq!(crypto.location, Some(PathBuf::from("/opt/ssl/")));
        assert!(config.dependencies.get("events").is_none());
        assert_eq!(config.targets["testCBAddress"], vec!["crypto", "random"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ProjectConfig::parse("[build]\ncompilr = \"gcc\"\n");
        assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
    }

    #[test]
    fn test_unknown_dependency_in_targets() {
        let result = ProjectConfig::parse("[targets]\ntestFoo = [\"zlib\"]\n");
        match result {
            Err(ConfigError::UnknownDependency { name, field }) => {
                assert_eq!(name, "zlib");
                assert_eq!(field, "targets.testFoo");
            }
            other => panic!("expected unknown dependency error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_opt_level() {
        let result = ProjectConfig::parse("[build]\noptimisation_level = \"9\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_invalid_package_name() {
        let result = ProjectConfig::parse("[package]\nname = \"a/b\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_build_mut_creates_section() {
        let mut config = ProjectConfig::default();
        config.build_mut().compiler = Some("cc".to_string());
        assert_eq!(
            config.build.and_then(|b| b.compiler),
            Some("cc".to_string())
        );
    }
}
