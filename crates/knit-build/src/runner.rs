//! Test execution
use crate::error::{BuildError, BuildResult};
use crate::output::BuildProgress;
use crate::staging::copy_into;

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// What happens when a test binary fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Stop at the first failing test
    #[default]
    FailFast,
    /// Run every test, then report all failures together
    KeepGoing,
}

/// Runs built executables
pub trait Executor: Send + Sync {
    /// Run `program` to completion in `working_dir`
    ///
    /// Returns the exit code, or `None` if the process was killed by a signal.
    fn execute(&self, program: &Path, working_dir: &Path) -> BuildResult<Option<i32>>;
}

/// Executor that spawns a child process and waits for it
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(&self, program: &Path, working_dir: &Path) -> BuildResult<Option<i32>> {
        let program = absolute_path(program)?;
        debug!(program = %program.display(), cwd = %working_dir.display(), "running");
        let status = Command::new(&program)
            .current_dir(working_dir)
            .status()
            .map_err(|e| BuildError::LaunchFailed {
                program: program.display().to_string(),
                error: e,
            })?;
        Ok(status.code())
    }
}

/// Anchor a relative path at the current directory
///
/// A relative program path would otherwise be looked up from the child's
/// working directory.
pub fn absolute_path(path: &Path) -> BuildResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| BuildError::io(path, e))?;
    Ok(cwd.join(path))
}

/// Result of running one test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed { code: Option<i32> },
}

impl TestOutcome {
    pub fn from_exit(code: Option<i32>) -> Self {
        match code {
            Some(0) => TestOutcome::Passed,
            code => TestOutcome::Failed { code },
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }
}

/// Runs linked test binaries from the binary directory
pub struct TargetRunner<'a> {
    executor: &'a dyn Executor,
    bin_dir: &'a Path,
    progress: BuildProgress,
}

impl<'a> TargetRunner<'a> {
    pub fn new(executor: &'a dyn Executor, bin_dir: &'a Path, progress: BuildProgress) -> Self {
        Self {
            executor,
            bin_dir,
            progress,
        }
    }

    /// Copy fixture files next to the test binaries
    ///
    /// Tests open their fixtures by relative path, so this must happen before
    /// the first test runs.
    pub fn stage_fixtures(&self, fixtures: &[PathBuf]) -> BuildResult<Vec<PathBuf>> {
        fixtures
            .iter()
            .map(|fixture| copy_into(fixture, self.bin_dir))
            .collect()
    }

    /// Run a test binary and classify its exit
    pub fn run(&self, name: &str, program: &Path) -> BuildResult<TestOutcome> {
        self.progress.running(name);
        let outcome = TestOutcome::from_exit(self.executor.execute(program, self.bin_dir)?);
        if let TestOutcome::Failed { code } = outcome {
            warn!(test = name, ?code, "test failed");
        }
        Ok(outcome)
    }
}
