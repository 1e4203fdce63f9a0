//! Build system error types
use crate::builder::BuildContext;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Toolchain stage that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Link,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "compile"),
            Self::Link => write!(f, "link"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to launch '{program}': {error}")]
    LaunchFailed {
        program: String,
        error: std::io::Error,
    },

    #[error("{stage} step failed for target '{target}' ({}): {command}", describe_exit(.code))]
    ToolchainFailed {
        stage: Stage,
        target: String,
        command: String,
        code: Option<i32>,
    },

    #[error("Test '{target}' failed ({})", describe_exit(.code))]
    TestFailed { target: String, code: Option<i32> },

    #[error("{} test(s) failed: {}", .failures.len(), .failures.join(", "))]
    TestsFailed {
        failures: Vec<String>,
        /// Everything built and run before the failures were reported
        context: Box<BuildContext>,
    },

    #[error("No source files found in {dir}")]
    NoSources { dir: PathBuf },

    #[error("Target not found: {target} (expected {path})")]
    TargetNotFound { target: String, path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(#[from] knit_config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a toolchain failure
    pub fn toolchain(
        stage: Stage,
        target: impl Into<String>,
        command: impl Into<String>,
        code: Option<i32>,
    ) -> Self {
        Self::ToolchainFailed {
            stage,
            target: target.into(),
            command: command.into(),
            code,
        }
    }

    /// Create a test failure
    pub fn test_failed(target: impl Into<String>, code: Option<i32>) -> Self {
        Self::TestFailed {
            target: target.into(),
            code,
        }
    }

    /// Target this error is attributed to, if any
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::ToolchainFailed { target, .. }
            | Self::TestFailed { target, .. }
            | Self::TargetNotFound { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Toolchain stage this error is attributed to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::ToolchainFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}
