//! Build command - resolve configuration, run the pipeline, report results

use anyhow::{Context, Result};
use knit_build::{
    BuildConfig, BuildContext, BuildError, BuildOptions, BuildSummary, Builder, FailureMode, OutputMode,
    Platform,
};
use knit_config::ConfigLoader;
use std::path::PathBuf;
use std::time::Instant;

/// Build command arguments
#[derive(Debug, Default)]
pub struct BuildArgs {
    /// Recompile every unit
    pub full_rebuild: bool,
    /// Build and run tests
    pub test: bool,
    /// Multi-architecture build
    pub universal: bool,
    /// Debug build
    pub debug: bool,
    /// Disable parallel library compilation
    pub sequential: bool,
    /// Collect test failures instead of stopping at the first
    pub keep_going: bool,
    /// Verbose output
    pub verbose: bool,
    /// Quiet output (errors only)
    pub quiet: bool,
    /// JSON output
    pub json: bool,
    /// Project directory (defaults to current directory)
    pub project_dir: Option<PathBuf>,
    /// Example to build
    pub example: Option<String>,
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let start_dir = match &args.project_dir {
        Some(dir) => dir.canonicalize().with_context(|| {
            format!("Failed to resolve project directory {}", dir.display())
        })?,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let config = ConfigLoader::new()
        .load_from_directory(&start_dir)
        .with_context(|| format!("Failed to load configuration from {}", start_dir.display()))?;

    let options = build_options(&args);
    let build_config = BuildConfig::resolve(&config, &options, Platform::current())
        .context("Invalid build configuration")?;

    let output_mode = determine_output_mode(&args);
    let builder = Builder::new(build_config).with_output_mode(output_mode);

    let start = Instant::now();
    let result = builder.build();

    if args.json {
        let summary = match &result {
            Ok(context) => context.summary(),
            Err(error) => failure_summary(error, start),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    let context = result.context("Build failed")?;

    if !args.json && !args.quiet {
        print_summary(&context);
    }

    Ok(())
}

/// Translate command-line arguments into build options
fn build_options(args: &BuildArgs) -> BuildOptions {
    BuildOptions {
        full_rebuild: args.full_rebuild,
        test: args.test,
        universal: args.universal,
        debug: args.debug,
        sequential: args.sequential,
        failure_mode: if args.keep_going {
            FailureMode::KeepGoing
        } else {
            FailureMode::FailFast
        },
        example: args.example.clone(),
    }
}

/// Determine output mode from arguments
fn determine_output_mode(args: &BuildArgs) -> OutputMode {
    if args.json {
        OutputMode::Json
    } else if args.quiet {
        OutputMode::Quiet
    } else if args.verbose {
        OutputMode::Verbose
    } else {
        OutputMode::Normal
    }
}

fn failure_summary(error: &BuildError, start: Instant) -> BuildSummary {
    let test_failures = match error {
        // Keep-going builds finish the library and every test before failing
        BuildError::TestsFailed { context, .. } => {
            return BuildSummary {
                error: Some(error.to_string()),
                ..context.summary()
            };
        }
        BuildError::TestFailed { target, .. } => vec![target.clone()],
        _ => Vec::new(),
    };

    BuildSummary {
        success: false,
        library: None,
        compiled_units: 0,
        reused_units: 0,
        tests_run: 0,
        test_failures,
        example: None,
        duration_ms: start.elapsed().as_millis(),
        error: Some(error.to_string()),
    }
}

fn print_summary(context: &BuildContext) {
    let stats = &context.stats;
    println!(
        "{:>12} {} unit(s), {} compiled, {} fresh",
        "Library", stats.library_units, stats.compiled_units, stats.reused_units
    );
    if stats.tests_run > 0 {
        println!("{:>12} {} passed", "Tests", stats.tests_run);
    }
    for artifact in &context.artifacts {
        println!("{:>12} {}", artifact.kind, artifact.path.display());
    }
}
