//! Build orchestration
//!
//! Runs the stages of one invocation in order: headers, library, tests,
//! example. Every stage consumes the immutable [`BuildConfig`]; the only
//! state carried between stages is the set of dependency objects already
//! prepared and the statistics.
use crate::compiler::IncrementalCompiler;
use crate::config::BuildConfig;
use crate::deps::DependencyMapper;
use crate::error::{BuildError, BuildResult};
use crate::linker::Linker;
use crate::output::{BuildProgress, BuildSummary, OutputMode};
use crate::runner::{Executor, FailureMode, ProcessExecutor, TargetRunner, TestOutcome};
use crate::scanner::SourceTree;
use crate::staging::HeaderStager;
use crate::targets::{BuildArtifact, BuildPlan, Target, TargetKind};
use crate::toolchain::{CommandToolchain, Toolchain};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Build context with results
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Build statistics
    pub stats: BuildStats,
    /// Build artifacts produced, in build order
    pub artifacts: Vec<BuildArtifact>,
}

impl BuildContext {
    /// Machine-readable summary of this build
    pub fn summary(&self) -> BuildSummary {
        let path_of = |kind: TargetKind| {
            self.artifacts
                .iter()
                .find(|a| a.kind == kind)
                .map(|a| a.path.display().to_string())
        };

        BuildSummary {
            success: self.stats.test_failures.is_empty(),
            library: path_of(TargetKind::Library),
            compiled_units: self.stats.compiled_units,
            reused_units: self.stats.reused_units,
            tests_run: self.stats.tests_run,
            test_failures: self.stats.test_failures.clone(),
            example: path_of(TargetKind::Example),
            duration_ms: self.stats.total_time.as_millis(),
            error: None,
        }
    }
}

/// Build statistics
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Library source units discovered
    pub library_units: usize,
    /// Units compiled (library, dependency objects, tests, example)
    pub compiled_units: usize,
    /// Units whose object was reused
    pub reused_units: usize,
    /// Test binaries executed
    pub tests_run: usize,
    /// Names of failed tests
    pub test_failures: Vec<String>,
    /// Total build time
    pub total_time: Duration,
    /// Time spent on the library (compile and link)
    pub library_time: Duration,
    /// Time spent building and running tests
    pub test_time: Duration,
}

/// Build orchestrator
pub struct Builder {
    config: BuildConfig,
    toolchain: Arc<dyn Toolchain>,
    executor: Arc<dyn Executor>,
    progress: BuildProgress,
}

impl Builder {
    /// Create a builder that drives the configured compiler
    pub fn new(config: BuildConfig) -> Self {
        let toolchain = Arc::new(CommandToolchain::new(config.compiler.clone()));
        Self {
            config,
            toolchain,
            executor: Arc::new(ProcessExecutor),
            progress: BuildProgress::default(),
        }
    }

    /// Replace the compile/link backend
    pub fn with_toolchain(mut self, toolchain: Arc<dyn Toolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Replace the test executor
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.progress = BuildProgress::new(mode);
        self
    }

    /// Run every requested stage
    pub fn build(&self) -> BuildResult<BuildContext> {
        let build_start = Instant::now();
        let config = &self.config;
        let layout = &config.layout;
        let mut stats = BuildStats::default();
        let mut artifacts = Vec::new();

        info!(
            root = %layout.root.display(),
            platform = %config.platform,
            library = %config.library_name,
            "starting build"
        );
        self.progress
            .detail("Config", format!("{} on {}", config.compiler, config.platform));

        layout.ensure()?;

        // Discovery happens before any compilation so that a missing example
        // is reported without touching the library.
        let plan = BuildPlan::discover(
            layout,
            &config.capabilities,
            config.test,
            config.example.as_deref(),
        )?;
        let mapper = config.dependency_mapper();

        // Headers
        let tree = SourceTree::scan(&layout.source_dir, &layout.obj_dir, &layout.include_dir)?;
        let stager = HeaderStager::new(&layout.include_dir);
        let staged = stager.stage_all(&tree.headers)?;
        for header in mapper.headers() {
            stager.stage_file(header)?;
        }
        info!(headers = staged, "headers staged");

        if tree.is_empty() {
            return Err(BuildError::NoSources {
                dir: layout.source_dir.clone(),
            });
        }
        stats.library_units = tree.units.len();

        let compiler = IncrementalCompiler::new(
            self.toolchain.as_ref(),
            self.progress,
            config.full_rebuild,
        );
        let linker = Linker::new(self.toolchain.as_ref(), config, self.progress);

        // Library
        let library_start = Instant::now();
        compiler.compile_all(
            &config.library_name,
            &config.library_cflags(),
            &tree.units,
            config.parallel,
        )?;
        let library = linker.link_library(&tree.units)?;
        info!(library = %library.display(), units = tree.units.len(), "library linked");
        artifacts.push(BuildArtifact::new(
            config.library_name.clone(),
            TargetKind::Library,
            library,
        ));
        stats.library_time = library_start.elapsed();

        // Tests
        if config.test {
            let test_start = Instant::now();
            let runner = TargetRunner::new(self.executor.as_ref(), &layout.bin_dir, self.progress);
            runner.stage_fixtures(&config.fixtures)?;
            mapper.prepare(plan.test_dependencies(), &compiler, &config.base_cflags())?;

            for test in &plan.tests {
                let output = self.build_executable(test, &mapper, &compiler, &linker)?;
                artifacts.push(BuildArtifact::new(test.name.clone(), TargetKind::Test, output.clone()));

                stats.tests_run += 1;
                match runner.run(&test.name, &output)? {
                    TestOutcome::Passed => {}
                    TestOutcome::Failed { code } => match config.failure_mode {
                        FailureMode::FailFast => return Err(BuildError::test_failed(&test.name, code)),
                        FailureMode::KeepGoing => stats.test_failures.push(test.name.clone()),
                    },
                }
            }
            stats.test_time = test_start.elapsed();
            info!(tests = stats.tests_run, failed = stats.test_failures.len(), "tests finished");

            if !stats.test_failures.is_empty() {
                stats.compiled_units = compiler.compiled();
                stats.reused_units = compiler.reused();
                stats.total_time = build_start.elapsed();
                return Err(BuildError::TestsFailed {
                    failures: stats.test_failures.clone(),
                    context: Box::new(BuildContext { stats, artifacts }),
                });
            }
        }

        // Example
        if let Some(example) = &plan.example {
            mapper.prepare(
                example.dependencies.iter().copied(),
                &compiler,
                &config.base_cflags(),
            )?;
            let output = self.build_executable(example, &mapper, &compiler, &linker)?;
            info!(example = %example.name, "example linked");
            artifacts.push(BuildArtifact::new(
                example.name.clone(),
                TargetKind::Example,
                output,
            ));
        }

        stats.compiled_units = compiler.compiled();
        stats.reused_units = compiler.reused();
        stats.total_time = build_start.elapsed();
        self.progress.finished(stats.total_time);

        Ok(BuildContext { stats, artifacts })
    }

    /// Compile and link one test or example
    fn build_executable(
        &self,
        target: &Target,
        mapper: &DependencyMapper,
        compiler: &IncrementalCompiler<'_>,
        linker: &Linker<'_>,
    ) -> BuildResult<std::path::PathBuf> {
        let requirements = mapper.compose(&target.name);
        let flags = self.config.base_cflags().with(&requirements.cflags);

        compiler.compile(&target.name, &flags, &target.object, &target.source)?;
        linker.link_executable(target, &requirements)
    }
}
