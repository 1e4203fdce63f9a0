use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Incremental build orchestrator for cbitcoin-style C libraries.
///
/// Compiles the library under src/ into a shared library, then optionally
/// builds and runs every test under test/ and builds one example program.
///
/// EXAMPLES:
///     knit                         Build the shared library
///     knit --test                  Build the library and run all tests
///     knit --all --test            Rebuild everything, then test
///     knit addressGenerator        Build the library and one example
///
/// ENVIRONMENT VARIABLES:
///     KNIT_COMPILER     Compiler driver (overrides knit.toml)
///     KNIT_CFLAGS       Extra compiler flags
///     KNIT_LFLAGS       Extra library linker flags
///     KNIT_OPT_LEVEL    Optimisation level outside debug builds
///     RUST_LOG          Log filter for diagnostics on stderr
#[derive(Parser)]
#[command(name = "knit")]
#[command(version)]
struct Cli {
    /// Recompile every unit regardless of timestamps
    #[arg(long)]
    all: bool,

    /// Build and run the test suite
    #[arg(long)]
    test: bool,

    /// Build for multiple architectures (Darwin only)
    #[arg(long)]
    universal: bool,

    /// Compile with debug symbols instead of optimisation
    #[arg(long)]
    debug: bool,

    /// Compile library units one at a time
    #[arg(long)]
    sequential: bool,

    /// Run every test even after a failure, then report all failures
    #[arg(long)]
    keep_going: bool,

    /// Show reused units and resolved settings
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    verbose: bool,

    /// Print errors only
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Print a JSON summary instead of progress lines
    #[arg(long, env = "KNIT_JSON")]
    json: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Example program to build after the library (examples/<EXAMPLE>.c)
    example: Option<String>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    commands::build::run(commands::build::BuildArgs {
        full_rebuild: cli.all,
        test: cli.test,
        universal: cli.universal,
        debug: cli.debug,
        sequential: cli.sequential,
        keep_going: cli.keep_going,
        verbose: cli.verbose,
        quiet: cli.quiet,
        json: cli.json,
        project_dir: cli.directory,
        example: cli.example,
    })
}
