//! External dependency mapping
//!
//! Each test or example target needs a fixed subset of the external
//! dependencies. The [`CapabilityTable`] maps target names to
//! [`DependencyKind`]s once at startup; the [`DependencyMapper`] turns those
//! kinds into compiler flags, linker flags and glue objects, and makes sure
//! each glue object is compiled at most once per invocation.
use crate::compiler::IncrementalCompiler;
use crate::error::{BuildError, BuildResult};
use crate::flags::FlagSet;
use crate::platform::Platform;
use crate::scanner::object_path;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;

/// External dependency identity
///
/// The declaration order is the composition order for flags and objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// OpenSSL cryptographic primitives
    Crypto,
    /// Seeded pseudo-random number source
    Random,
    /// libevent socket notification
    Events,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 3] = [Self::Crypto, Self::Random, Self::Events];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Random => "random",
            Self::Events => "events",
        }
    }

    /// Glue source compiled into the dependency object, relative to the project root
    pub fn default_source(&self) -> PathBuf {
        match self {
            Self::Crypto => PathBuf::from("dependencies/crypto/CBOpenSSLCrypto.c"),
            Self::Random => PathBuf::from("dependencies/random/CBRand.c"),
            Self::Events => PathBuf::from("dependencies/sockets/CBLibEventSockets.c"),
        }
    }

    /// Headers owned by the dependency that are staged on every build
    pub fn default_headers(&self) -> Vec<PathBuf> {
        match self {
            Self::Events => vec![PathBuf::from("dependencies/sockets/CBLibEventSockets.h")],
            _ => Vec::new(),
        }
    }

    /// Auto-detected installation root
    pub fn default_location(&self, platform: Platform) -> Option<PathBuf> {
        match (self, platform) {
            (Self::Random, _) => None,
            (_, Platform::Darwin) => Some(PathBuf::from("/opt/local/")),
            (Self::Crypto, Platform::Unix) => Some(PathBuf::from("/usr/local/ssl/")),
            (Self::Events, Platform::Unix) => Some(PathBuf::from("/usr/local/")),
        }
    }

    /// Auto-detected extra linker flags
    pub fn default_extra_lflags(&self, platform: Platform) -> FlagSet {
        match (self, platform) {
            (Self::Crypto, Platform::Unix) => FlagSet::parse("-ldl -L/lib/x86_64-linux-gnu/"),
            _ => FlagSet::new(),
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DependencyKind {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crypto" => Ok(Self::Crypto),
            "random" => Ok(Self::Random),
            "events" => Ok(Self::Events),
            other => Err(BuildError::InvalidConfig(format!(
                "unknown dependency '{}'",
                other
            ))),
        }
    }
}

const CRYPTO_TARGETS: &[&str] = &[
    "testCBAddress",
    "testCBAddressManager",
    "testCBAlert",
    "testCBTransaction",
    "testCBBase58",
    "testCBBlock",
    "testCBNetworkCommunicator",
    "testCBNetworkCommunicatorLibEv",
    "testCBScript",
    "testValidation",
    "addressGenerator",
];

const RANDOM_TARGETS: &[&str] = &[
    "testCBAddressManager",
    "testCBNetworkCommunicator",
    "testCBNetworkCommunicatorLibEv",
];

const EVENTS_TARGETS: &[&str] = &["testCBNetworkCommunicator"];

/// Target name -> required dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityTable {
    entries: BTreeMap<String, BTreeSet<DependencyKind>>,
}

impl CapabilityTable {
    /// Empty table: no target requires anything
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table for the cbitcoin test suite and examples
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (kind, targets) in [
            (DependencyKind::Crypto, CRYPTO_TARGETS),
            (DependencyKind::Random, RANDOM_TARGETS),
            (DependencyKind::Events, EVENTS_TARGETS),
        ] {
            for target in targets {
                table
                    .entries
                    .entry(target.to_string())
                    .or_default()
                    .insert(kind);
            }
        }
        table
    }

    /// Replace entries from configuration (`[targets]` in knit.toml)
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, Vec<String>>) -> BuildResult<()> {
        for (target, names) in overrides {
            let kinds = names
                .iter()
                .map(|name| name.parse::<DependencyKind>())
                .collect::<BuildResult<BTreeSet<_>>>()?;
            self.entries.insert(target.clone(), kinds);
        }
        Ok(())
    }

    /// Required dependencies of `target`, in composition order
    pub fn requirements(&self, target: &str) -> Vec<DependencyKind> {
        self.entries
            .get(target)
            .map(|kinds| kinds.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `target` requires `kind`
    pub fn requires(&self, target: &str, kind: DependencyKind) -> bool {
        self.entries
            .get(target)
            .is_some_and(|kinds| kinds.contains(&kind))
    }
}

/// Resolved settings for one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySettings {
    /// Installation root (contains `include/` and `lib/`)
    pub location: Option<PathBuf>,
    /// Extra linker flags
    pub extra_lflags: FlagSet,
    /// Absolute path of the glue source
    pub source: PathBuf,
    /// Absolute paths of headers to stage
    pub headers: Vec<PathBuf>,
}

/// Glue object a dependency contributes to every target that needs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyObject {
    pub source: PathBuf,
    pub object: PathBuf,
}

/// A dependency's full contribution to compile and link steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub cflags: FlagSet,
    pub lflags: FlagSet,
    /// Directory added to the runtime search path of consuming executables
    pub library_dir: Option<PathBuf>,
    pub object: Option<DependencyObject>,
    pub headers: Vec<PathBuf>,
}

impl Dependency {
    /// Build the contribution of `kind` from its settings
    pub fn resolve(
        kind: DependencyKind,
        settings: &DependencySettings,
        platform: Platform,
        obj_dir: &Path,
    ) -> Self {
        let mut cflags = FlagSet::new();
        let mut lflags = FlagSet::new();
        let mut library_dir = None;

        let include_flag = |root: &Path| format!("-I{}", root.join("include").display());
        let lib_flag = |root: &Path| format!("-L{}", root.join("lib").display());

        match kind {
            DependencyKind::Crypto => {
                lflags.extend_static(&["-lssl", "-lcrypto"]);
                if let Some(root) = &settings.location {
                    cflags.push(include_flag(root));
                    lflags.push(lib_flag(root));
                    library_dir = Some(root.join("lib"));
                }
            }
            DependencyKind::Random => {}
            DependencyKind::Events => {
                if let Some(root) = &settings.location {
                    cflags.push(include_flag(root));
                    lflags.push(lib_flag(root));
                    library_dir = Some(root.join("lib"));
                }
                if platform == Platform::Unix {
                    cflags.push("-D_POSIX_SOURCE");
                }
                lflags.extend_static(&["-levent_core", "-levent_pthreads"]);
            }
        }
        lflags.extend(&settings.extra_lflags);

        Self {
            kind,
            cflags,
            lflags,
            library_dir,
            object: Some(DependencyObject {
                source: settings.source.clone(),
                object: object_path(obj_dir, &settings.source),
            }),
            headers: settings.headers.clone(),
        }
    }
}

/// Composed compile/link inputs for one target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRequirements {
    pub dependencies: Vec<DependencyKind>,
    /// Compiler flags added on top of the base flags
    pub cflags: FlagSet,
    /// Linker flags added after the library reference
    pub lflags: FlagSet,
    /// Dependency objects linked after the target's own object
    pub objects: Vec<PathBuf>,
    /// Runtime search path entries after the binary directory
    pub library_dirs: Vec<PathBuf>,
}

/// Resolves target names to dependency contributions
#[derive(Debug)]
pub struct DependencyMapper {
    dependencies: BTreeMap<DependencyKind, Dependency>,
    table: CapabilityTable,
    built: Mutex<BTreeSet<DependencyKind>>,
}

impl DependencyMapper {
    pub fn new(dependencies: impl IntoIterator<Item = Dependency>, table: CapabilityTable) -> Self {
        Self {
            dependencies: dependencies.into_iter().map(|d| (d.kind, d)).collect(),
            table,
            built: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn dependency(&self, kind: DependencyKind) -> Option<&Dependency> {
        self.dependencies.get(&kind)
    }

    /// Dependencies required by `target`, in composition order
    pub fn requirements_of(&self, target: &str) -> Vec<DependencyKind> {
        self.table.requirements(target)
    }

    /// Union of the contributions of every dependency `target` requires
    pub fn compose(&self, target: &str) -> TargetRequirements {
        let mut composed = TargetRequirements::default();

        for kind in self.requirements_of(target) {
            let Some(dependency) = self.dependencies.get(&kind) else {
                continue;
            };
            composed.dependencies.push(kind);
            composed.cflags.extend(&dependency.cflags);
            composed.lflags.extend(&dependency.lflags);
            if let Some(object) = &dependency.object {
                composed.objects.push(object.object.clone());
            }
            if let Some(dir) = &dependency.library_dir {
                composed.library_dirs.push(dir.clone());
            }
        }

        composed
    }

    /// Headers every build stages, regardless of which targets are planned
    pub fn headers(&self) -> impl Iterator<Item = &Path> {
        self.dependencies
            .values()
            .flat_map(|d| d.headers.iter().map(PathBuf::as_path))
    }

    /// Compile the glue object of `kind` unless this invocation already did
    ///
    /// The guard is held while compiling, so concurrent callers wait for the
    /// first compilation instead of starting their own.
    pub fn ensure_object(
        &self,
        kind: DependencyKind,
        compiler: &IncrementalCompiler<'_>,
        base_cflags: &FlagSet,
    ) -> BuildResult<Option<PathBuf>> {
        let Some(dependency) = self.dependencies.get(&kind) else {
            return Ok(None);
        };
        let Some(object) = &dependency.object else {
            return Ok(None);
        };

        let mut built = self.built.lock().unwrap_or_else(|e| e.into_inner());
        if built.contains(&kind) {
            debug!(dependency = %kind, "dependency object already prepared");
            return Ok(Some(object.object.clone()));
        }

        let flags = base_cflags.clone().with(&dependency.cflags);
        compiler.compile(kind.name(), &flags, &object.object, &object.source)?;
        built.insert(kind);

        Ok(Some(object.object.clone()))
    }

    /// Prepare the glue objects of every listed dependency
    pub fn prepare(
        &self,
        kinds: impl IntoIterator<Item = DependencyKind>,
        compiler: &IncrementalCompiler<'_>,
        base_cflags: &FlagSet,
    ) -> BuildResult<()> {
        for kind in kinds {
            self.ensure_object(kind, compiler, base_cflags)?;
        }
        Ok(())
    }
}
