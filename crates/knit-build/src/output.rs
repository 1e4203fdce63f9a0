//! Build progress reporting
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// How much the build prints while it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One status line per compiled unit, link and test run
    #[default]
    Normal,
    /// Status lines plus fresh (reused) units and resolved settings
    Verbose,
    /// Errors only
    Quiet,
    /// Nothing during the build; a JSON summary is printed at the end
    Json,
}

impl OutputMode {
    pub fn is_verbose(&self) -> bool {
        matches!(self, OutputMode::Verbose)
    }

    fn shows_status(&self) -> bool {
        matches!(self, OutputMode::Normal | OutputMode::Verbose)
    }
}

/// Status-line printer shared by the build stages
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildProgress {
    mode: OutputMode,
}

impl BuildProgress {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn compiling(&self, source: &Path) {
        self.status("Compiling", &source.display().to_string());
    }

    /// Only shown in verbose mode
    pub fn fresh(&self, source: &Path) {
        if self.mode.is_verbose() {
            self.status("Fresh", &source.display().to_string());
        }
    }

    pub fn linking(&self, output: &Path) {
        self.status("Linking", &output.display().to_string());
    }

    pub fn running(&self, target: &str) {
        self.status("Running", target);
    }

    pub fn detail(&self, label: &str, message: impl AsRef<str>) {
        if self.mode.is_verbose() {
            self.status(label, message.as_ref());
        }
    }

    pub fn finished(&self, duration: Duration) {
        self.status("Finished", &format!("in {:.2}s", duration.as_secs_f64()));
    }

    fn status(&self, label: &str, message: &str) {
        if self.mode.shows_status() {
            println!("{:>12} {}", label, message);
        }
    }
}

/// Machine-readable outcome of a build
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub success: bool,
    pub library: Option<String>,
    pub compiled_units: usize,
    pub reused_units: usize,
    pub tests_run: usize,
    pub test_failures: Vec<String>,
    pub example: Option<String>,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_normal() {
        assert_eq!(BuildProgress::default().mode(), OutputMode::Normal);
        assert!(!OutputMode::Normal.is_verbose());
    }

    #[test]
    fn test_summary_omits_missing_error() {
        let summary = BuildSummary {
            success: true,
            library: Some("bin/libcbitcoin.so".into()),
            compiled_units: 2,
            reused_units: 1,
            tests_run: 0,
            test_failures: Vec::new(),
            example: None,
            duration_ms: 5,
            error: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["compiled_units"], 2);
        assert!(json.get("error").is_none());
    }
}
