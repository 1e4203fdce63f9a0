//! Knit build core
//!
//! Builds a C library and its test programs:
//! - Source discovery and flat header staging
//! - Incremental compilation by timestamp
//! - Shared library and executable linking
//! - Per-target external dependencies (crypto, random, events)
//! - Test execution with fail-fast or keep-going reporting

pub mod builder;
pub mod compiler;
pub mod config;
pub mod deps;
pub mod error;
pub mod flags;
pub mod linker;
pub mod output;
pub mod platform;
pub mod runner;
pub mod scanner;
pub mod staging;
pub mod targets;
pub mod toolchain;

// Re-export main types
pub use builder::{BuildContext, BuildStats, Builder};
pub use compiler::{check_staleness, CompileOutcome, IncrementalCompiler, Staleness};
pub use config::{BuildConfig, BuildOptions, Layout};
pub use deps::{
    CapabilityTable, Dependency, DependencyKind, DependencyMapper, DependencyObject,
    DependencySettings, TargetRequirements,
};
pub use error::{BuildError, BuildResult, Stage};
pub use flags::FlagSet;
pub use linker::Linker;
pub use output::{BuildProgress, BuildSummary, OutputMode};
pub use platform::Platform;
pub use runner::{Executor, FailureMode, ProcessExecutor, TargetRunner, TestOutcome};
pub use scanner::{HeaderFile, SourceTree, SourceUnit};
pub use staging::HeaderStager;
pub use targets::{BuildArtifact, BuildPlan, Target, TargetKind};
pub use toolchain::{CommandToolchain, CompileRequest, LinkRequest, Toolchain};
