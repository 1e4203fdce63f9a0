//! Build configuration resolution
//!
//! [`BuildConfig`] is resolved once per invocation from compiled-in
//! defaults, platform auto-detection, the project's `knit.toml` (with its
//! environment overrides already applied) and command-line options. It is
//! never mutated afterwards.
use crate::deps::{CapabilityTable, Dependency, DependencyKind, DependencyMapper, DependencySettings};
use crate::error::{BuildError, BuildResult};
use crate::flags::FlagSet;
use crate::platform::Platform;
use crate::runner::FailureMode;

use knit_config::{BuildSection, Config};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Library name used when the project does not declare one
pub const DEFAULT_LIBRARY_NAME: &str = "cbitcoin";
/// Compiler driver used when none is configured
pub const DEFAULT_COMPILER: &str = "gcc";
/// Optimisation level used outside debug builds
pub const DEFAULT_OPT_LEVEL: &str = "2";
/// Fixture staged next to the test binaries by default
pub const DEFAULT_FIXTURE: &str = "scriptCases.txt";

const BASE_CFLAGS: &[&str] = &[
    "-Wall",
    "-Wno-overflow",
    "-Wno-uninitialized",
    "-pedantic",
    "-std=c99",
];

/// Options taken from the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Recompile every unit regardless of timestamps
    pub full_rebuild: bool,
    /// Build and run the test suite
    pub test: bool,
    /// Multi-architecture build (Darwin only)
    pub universal: bool,
    /// Debug symbols instead of optimisation
    pub debug: bool,
    /// Compile library units one at a time
    pub sequential: bool,
    pub failure_mode: FailureMode,
    /// Example to build after the library (and tests)
    pub example: Option<String>,
}

/// Project directory layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub test_dir: PathBuf,
    pub examples_dir: PathBuf,
    pub build_root: PathBuf,
    pub bin_dir: PathBuf,
    pub obj_dir: PathBuf,
    pub include_dir: PathBuf,
}

impl Layout {
    /// Conventional layout under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_dirs(root, "src", "test", "examples", "build")
    }

    pub fn with_dirs(
        root: impl Into<PathBuf>,
        source: impl AsRef<Path>,
        tests: impl AsRef<Path>,
        examples: impl AsRef<Path>,
        build: impl AsRef<Path>,
    ) -> Self {
        let root = root.into();
        let build_root = root.join(build);
        Self {
            source_dir: root.join(source),
            test_dir: root.join(tests),
            examples_dir: root.join(examples),
            bin_dir: build_root.join("bin"),
            obj_dir: build_root.join("obj"),
            include_dir: build_root.join("include"),
            build_root,
            root,
        }
    }

    /// Create `bin`, `obj` and `include` under the build root
    pub fn ensure(&self) -> BuildResult<()> {
        for dir in [&self.bin_dir, &self.obj_dir, &self.include_dir] {
            fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        }
        Ok(())
    }
}

/// Fully resolved, immutable configuration for one invocation
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub platform: Platform,
    pub library_name: String,
    pub compiler: String,
    pub optimisation_level: String,
    pub debug: bool,
    pub universal: bool,
    pub full_rebuild: bool,
    pub test: bool,
    pub parallel: bool,
    pub failure_mode: FailureMode,
    pub example: Option<String>,
    pub extra_cflags: FlagSet,
    pub extra_lflags: FlagSet,
    pub layout: Layout,
    pub dependencies: BTreeMap<DependencyKind, DependencySettings>,
    pub capabilities: CapabilityTable,
    /// Files copied into the binary directory before tests run
    pub fixtures: Vec<PathBuf>,
}

impl BuildConfig {
    /// Defaults for a project at `root` with auto-detection enabled
    pub fn new(root: impl Into<PathBuf>, platform: Platform) -> Self {
        let layout = Layout::new(root);
        let dependencies = DependencyKind::ALL
            .iter()
            .map(|&kind| (kind, default_settings(kind, &layout.root, platform, true)))
            .collect();

        Self {
            platform,
            library_name: DEFAULT_LIBRARY_NAME.to_string(),
            compiler: DEFAULT_COMPILER.to_string(),
            optimisation_level: DEFAULT_OPT_LEVEL.to_string(),
            debug: false,
            universal: false,
            full_rebuild: false,
            test: false,
            parallel: true,
            failure_mode: FailureMode::default(),
            example: None,
            extra_cflags: FlagSet::new(),
            extra_lflags: FlagSet::new(),
            fixtures: vec![layout.test_dir.join(DEFAULT_FIXTURE)],
            layout,
            dependencies,
            capabilities: CapabilityTable::builtin(),
        }
    }

    /// Resolve from a loaded project configuration and command-line options
    pub fn resolve(config: &Config, options: &BuildOptions, platform: Platform) -> BuildResult<Self> {
        config.project.validate()?;

        let root = config.root().to_path_buf();
        let default_build = BuildSection::default();
        let build = config.project.build.as_ref().unwrap_or(&default_build);
        let auto_config = build.auto_config.unwrap_or(true);

        let layout = Layout::with_dirs(
            &root,
            build.source.as_deref().unwrap_or(Path::new("src")),
            build.tests.as_deref().unwrap_or(Path::new("test")),
            build.examples.as_deref().unwrap_or(Path::new("examples")),
            build.root.as_deref().unwrap_or(Path::new("build")),
        );

        let mut dependencies = BTreeMap::new();
        for kind in DependencyKind::ALL {
            let mut settings = default_settings(kind, &root, platform, auto_config);
            if let Some(section) = config.project.dependencies.get(kind.name()) {
                if let Some(location) = &section.location {
                    settings.location = Some(root.join(location));
                }
                if let Some(lflags) = &section.lflags {
                    settings.extra_lflags = FlagSet::parse(lflags);
                }
                if let Some(source) = &section.source {
                    settings.source = root.join(source);
                }
                if let Some(headers) = &section.headers {
                    settings.headers = headers.iter().map(|h| root.join(h)).collect();
                }
            }
            dependencies.insert(kind, settings);
        }

        let mut capabilities = CapabilityTable::builtin();
        capabilities.apply_overrides(&config.project.targets)?;

        let fixtures = match &build.fixtures {
            Some(fixtures) => fixtures.iter().map(|f| layout.test_dir.join(f)).collect(),
            None => vec![layout.test_dir.join(DEFAULT_FIXTURE)],
        };

        Ok(Self {
            platform,
            library_name: config
                .package_name()
                .unwrap_or(DEFAULT_LIBRARY_NAME)
                .to_string(),
            compiler: build
                .compiler
                .as_deref()
                .map(|compiler| resolve_compiler(&root, compiler))
                .unwrap_or_else(|| DEFAULT_COMPILER.to_string()),
            optimisation_level: build
                .optimisation_level
                .clone()
                .unwrap_or_else(|| DEFAULT_OPT_LEVEL.to_string()),
            debug: options.debug,
            universal: options.universal,
            full_rebuild: options.full_rebuild,
            test: options.test,
            parallel: build.parallel.unwrap_or(true) && !options.sequential,
            failure_mode: options.failure_mode,
            example: options.example.clone(),
            extra_cflags: FlagSet::parse(build.cflags.as_deref().unwrap_or_default()),
            extra_lflags: FlagSet::parse(build.lflags.as_deref().unwrap_or_default()),
            layout,
            dependencies,
            capabilities,
            fixtures,
        })
    }

    /// Flags every compilation starts from
    pub fn base_cflags(&self) -> FlagSet {
        let mut flags = FlagSet::new();
        flags.extend_static(BASE_CFLAGS);
        flags.push(format!("-I{}", self.layout.include_dir.display()));
        flags.extend(&self.extra_cflags);
        flags.extend_static(self.platform.arch_flags(self.universal));
        if self.debug {
            flags.push("-g");
        } else {
            flags.push(format!("-O{}", self.optimisation_level));
        }
        flags
    }

    /// Flags for units that go into the shared library
    pub fn library_cflags(&self) -> FlagSet {
        let mut flags = self.base_cflags();
        flags.extend_static(self.platform.library_compile_flags());
        flags
    }

    /// Output path of the shared library
    pub fn library_path(&self) -> PathBuf {
        self.layout
            .bin_dir
            .join(self.platform.shared_library_name(&self.library_name))
    }

    /// Flags for the shared library link step
    pub fn library_lflags(&self) -> FlagSet {
        let mut flags = FlagSet::new();
        flags.extend_static(self.platform.shared_library_flags());
        flags.extend(&self.extra_lflags);
        flags
    }

    /// Build the dependency mapper for this configuration
    pub fn dependency_mapper(&self) -> DependencyMapper {
        let dependencies = self.dependencies.iter().map(|(&kind, settings)| {
            Dependency::resolve(kind, settings, self.platform, &self.layout.obj_dir)
        });
        DependencyMapper::new(dependencies, self.capabilities.clone())
    }
}

/// Project-relative compiler paths are anchored at the root; bare names
/// (`gcc`, `clang`) are left for `PATH` lookup.
fn resolve_compiler(root: &Path, compiler: &str) -> String {
    let path = Path::new(compiler);
    if path.is_relative() && path.components().count() > 1 {
        root.join(path).display().to_string()
    } else {
        compiler.to_string()
    }
}

fn default_settings(
    kind: DependencyKind,
    root: &Path,
    platform: Platform,
    auto_config: bool,
) -> DependencySettings {
    DependencySettings {
        location: if auto_config {
            kind.default_location(platform)
        } else {
            None
        },
        extra_lflags: if auto_config {
            kind.default_extra_lflags(platform)
        } else {
            FlagSet::new()
        },
        source: root.join(kind.default_source()),
        headers: kind
            .default_headers()
            .into_iter()
            .map(|h| root.join(h))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knit_config::ProjectConfig;
    use pretty_assertions::assert_eq;

    fn config_from(toml: &str) -> Config {
        Config {
            project: ProjectConfig::parse(toml).unwrap(),
            project_root: Some(PathBuf::from("/p")),
            start_dir: PathBuf::from("/p"),
        }
    }

    #[test]
    fn test_base_cflags_release() {
        let config = BuildConfig::new("/p", Platform::Unix);
        assert_eq!(
            config.base_cflags().to_string(),
            "-Wall -Wno-overflow -Wno-uninitialized -pedantic -std=c99 \
             -I/p/build/include -m64 -O2"
        );
        assert!(config.library_cflags().contains("-fpic"));
    }

    #[test]
    fn test_debug_replaces_optimisation() {
        let mut config = BuildConfig::new("/p", Platform::Darwin);
        config.debug = true;
        config.universal = true;

        let flags = config.base_cflags();
        assert!(flags.contains("-g"));
        assert!(!flags.contains_prefix("-O"));
        assert!(flags.contains("arm64"));
        assert!(!config.library_cflags().contains("-fpic"));
    }

    #[test]
    fn test_library_outputs() {
        let unix = BuildConfig::new("/p", Platform::Unix);
        assert_eq!(unix.library_path(), PathBuf::from("/p/build/bin/libcbitcoin.so"));
        assert_eq!(unix.library_lflags().to_string(), "-shared");

        let darwin = BuildConfig::new("/p", Platform::Darwin);
        assert_eq!(
            darwin.library_lflags().to_string(),
            "-flat_namespace -dynamiclib -undefined dynamic_lookup"
        );
    }

    #[test]
    fn test_resolve_applies_file_and_options() {
        let config = config_from(
            r#"
            [package]
            name = "cbtest"

            [build]
            compiler = "clang"
            optimisation_level = "3"
            cflags = "-DTEST"
            lflags = "-lm"
            parallel = true
            root = "out"

            [dependencies.crypto]
            location = "/opt/ssl/"
            "#,
        );
        let options = BuildOptions {
            sequential: true,
            test: true,
            ..Default::default()
        };

        let resolved = BuildConfig::resolve(&config, &options, Platform::Unix).unwrap();

        assert_eq!(resolved.library_name, "cbtest");
        assert_eq!(resolved.compiler, "clang");
        assert!(resolved.base_cflags().contains("-O3"));
        assert!(resolved.base_cflags().contains("-DTEST"));
        assert_eq!(resolved.library_lflags().to_string(), "-shared -lm");
        assert!(!resolved.parallel);
        assert!(resolved.test);
        assert_eq!(resolved.layout.bin_dir, PathBuf::from("/p/out/bin"));
        assert_eq!(
            resolved.dependencies[&DependencyKind::Crypto].location,
            Some(PathBuf::from("/opt/ssl/"))
        );
        assert_eq!(
            resolved.dependencies[&DependencyKind::Events].location,
            Some(PathBuf::from("/usr/local/"))
        );
        assert_eq!(
            resolved.fixtures,
            vec![PathBuf::from("/p/test/scriptCases.txt")]
        );
    }

    #[test]
    fn test_compiler_path_relative_to_root() {
        let relative = config_from("[build]\ncompiler = \"tools/cc\"\n");
        let resolved =
            BuildConfig::resolve(&relative, &BuildOptions::default(), Platform::Unix).unwrap();
        assert_eq!(resolved.compiler, "/p/tools/cc");

        let bare = config_from("[build]\ncompiler = \"clang\"\n");
        let resolved =
            BuildConfig::resolve(&bare, &BuildOptions::default(), Platform::Unix).unwrap();
        assert_eq!(resolved.compiler, "clang");

        let absolute = config_from("[build]\ncompiler = \"/usr/bin/gcc\"\n");
        let resolved =
            BuildConfig::resolve(&absolute, &BuildOptions::default(), Platform::Unix).unwrap();
        assert_eq!(resolved.compiler, "/usr/bin/gcc");
    }

    #[test]
    fn test_auto_config_off_leaves_locations_unset() {
        let config = config_from("[build]\nauto_config = false\n");
        let resolved =
            BuildConfig::resolve(&config, &BuildOptions::default(), Platform::Unix).unwrap();

        assert!(resolved
            .dependencies
            .values()
            .all(|settings| settings.location.is_none()));
        assert!(resolved.dependencies[&DependencyKind::Crypto]
            .extra_lflags
            .is_empty());
    }

    #[test]
    fn test_target_overrides_reach_capability_table() {
        let config = config_from("[targets]\ntestCBByteArray = [\"random\"]\n");
        let resolved =
            BuildConfig::resolve(&config, &BuildOptions::default(), Platform::Unix).unwrap();

        assert!(resolved
            .capabilities
            .requires("testCBByteArray", DependencyKind::Random));
    }
}
