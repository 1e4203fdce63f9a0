//! Build target types and plan discovery
use crate::config::Layout;
use crate::deps::{CapabilityTable, DependencyKind};
use crate::error::{BuildError, BuildResult};
use crate::scanner::{file_stem, find_files, object_path, SOURCE_EXTENSION};

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Kind of build target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// The shared library built from the source tree
    Library,
    /// Test executable, run after linking
    Test,
    /// Example executable, linked but not run
    Example,
}

impl TargetKind {
    /// Whether the linked artifact is executed as part of the build
    pub fn runs_after_link(&self) -> bool {
        matches!(self, Self::Test)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Library => write!(f, "library"),
            Self::Test => write!(f, "test"),
            Self::Example => write!(f, "example"),
        }
    }
}

/// A single-source executable target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Source file stem (`testCBBlock`)
    pub name: String,
    pub kind: TargetKind,
    pub source: PathBuf,
    pub object: PathBuf,
    /// Linked executable in the binary directory
    pub output: PathBuf,
    /// Required dependencies, in composition order
    pub dependencies: Vec<DependencyKind>,
}

impl Target {
    pub fn new(
        kind: TargetKind,
        source: impl Into<PathBuf>,
        layout: &Layout,
        table: &CapabilityTable,
    ) -> Self {
        let source = source.into();
        let name = file_stem(&source);
        Self {
            object: object_path(&layout.obj_dir, &source),
            output: layout.bin_dir.join(&name),
            dependencies: table.requirements(&name),
            kind,
            source,
            name,
        }
    }
}

/// Artifact produced by a build step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifact {
    pub name: String,
    pub kind: TargetKind,
    pub path: PathBuf,
}

impl BuildArtifact {
    pub fn new(name: impl Into<String>, kind: TargetKind, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
        }
    }
}

/// Executable targets of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    /// Test targets, in discovery order
    pub tests: Vec<Target>,
    pub example: Option<Target>,
}

impl BuildPlan {
    /// Discover the requested tests and example
    ///
    /// Dependency sets are resolved here, once; the plan is not modified
    /// while the build runs.
    pub fn discover(
        layout: &Layout,
        table: &CapabilityTable,
        test: bool,
        example: Option<&str>,
    ) -> BuildResult<Self> {
        let tests = if test {
            find_files(&layout.test_dir, SOURCE_EXTENSION)?
                .into_iter()
                .map(|source| Target::new(TargetKind::Test, source, layout, table))
                .collect()
        } else {
            Vec::new()
        };

        let example = match example {
            Some(name) => {
                let source = layout
                    .examples_dir
                    .join(format!("{}.{}", name, SOURCE_EXTENSION));
                if !source.is_file() {
                    return Err(BuildError::TargetNotFound {
                        target: name.to_string(),
                        path: source,
                    });
                }
                Some(Target::new(TargetKind::Example, source, layout, table))
            }
            None => None,
        };

        Ok(Self { tests, example })
    }

    /// Every dependency any planned test needs
    pub fn test_dependencies(&self) -> BTreeSet<DependencyKind> {
        self.tests
            .iter()
            .flat_map(|t| t.dependencies.iter().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty() && self.example.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, Layout) {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        fs::create_dir_all(&layout.test_dir).unwrap();
        fs::create_dir_all(&layout.examples_dir).unwrap();
        for name in ["testCBNetworkCommunicator.c", "testCBBase58.c", "testCBByteArray.c"] {
            fs::write(layout.test_dir.join(name), "").unwrap();
        }
        fs::write(layout.test_dir.join("scriptCases.txt"), "").unwrap();
        fs::write(layout.examples_dir.join("addressGenerator.c"), "").unwrap();
        (dir, layout)
    }

    #[test]
    fn test_target_kind_runs_after_link() {
        assert!(TargetKind::Test.runs_after_link());
        assert!(!TargetKind::Example.runs_after_link());
        assert!(!TargetKind::Library.runs_after_link());
    }

    #[test]
    fn test_discover_tests_in_sorted_order() {
        let (_dir, layout) = project();
        let plan =
            BuildPlan::discover(&layout, &CapabilityTable::builtin(), true, None).unwrap();

        let names: Vec<_> = plan.tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["testCBBase58", "testCBByteArray", "testCBNetworkCommunicator"]
        );
        assert_eq!(plan.tests[0].output, layout.bin_dir.join("testCBBase58"));
        assert_eq!(plan.tests[0].object, layout.obj_dir.join("testCBBase58.o"));
        assert!(plan.tests[1].dependencies.is_empty());
        assert_eq!(plan.test_dependencies().len(), 3);
        assert!(plan.example.is_none());
    }

    #[test]
    fn test_discover_without_tests() {
        let (_dir, layout) = project();
        let plan = BuildPlan::discover(&layout, &CapabilityTable::builtin(), false, None).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_discover_example() {
        let (_dir, layout) = project();
        let plan = BuildPlan::discover(
            &layout,
            &CapabilityTable::builtin(),
            false,
            Some("addressGenerator"),
        )
        .unwrap();

        let example = plan.example.unwrap();
        assert_eq!(example.kind, TargetKind::Example);
        assert_eq!(example.dependencies, vec![DependencyKind::Crypto]);
    }

    #[test]
    fn test_missing_example_is_target_not_found() {
        let (_dir, layout) = project();
        let result =
            BuildPlan::discover(&layout, &CapabilityTable::builtin(), false, Some("nope"));
        assert!(matches!(result, Err(BuildError::TargetNotFound { .. })));
    }
}
