//! Source tree discovery
//!
//! Walks a directory tree and collects compilable units (`*.c`) and headers
//! (`*.h`). Nothing is cached between invocations: every build rescans.
use crate::error::{BuildError, BuildResult};

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Extension of compilable source files
pub const SOURCE_EXTENSION: &str = "c";
/// Extension of header files
pub const HEADER_EXTENSION: &str = "h";
/// Extension of object artifacts
pub const OBJECT_EXTENSION: &str = "o";

/// A compilable file and the object artifact it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Source file path
    pub source: PathBuf,
    /// Object artifact path
    pub object: PathBuf,
    /// Source modification time
    pub source_modified: SystemTime,
    /// Object modification time, `None` when the object does not exist yet
    pub object_modified: Option<SystemTime>,
}

impl SourceUnit {
    /// Stat a source file and its object artifact
    ///
    /// A missing source is an error; a missing object is not.
    pub fn new(source: impl Into<PathBuf>, object: impl Into<PathBuf>) -> BuildResult<Self> {
        let source = source.into();
        let object = object.into();

        let source_modified = fs::metadata(&source)
            .and_then(|m| m.modified())
            .map_err(|e| BuildError::io(&source, e))?;

        let object_modified = match fs::metadata(&object) {
            Ok(metadata) => Some(metadata.modified().map_err(|e| BuildError::io(&object, e))?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(BuildError::io(&object, e)),
        };

        Ok(Self {
            source,
            object,
            source_modified,
            object_modified,
        })
    }

    /// File stem of the source (`src/CBBlock.c` -> `CBBlock`)
    pub fn name(&self) -> String {
        file_stem(&self.source)
    }
}

/// A header and its location in the staging include directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFile {
    /// Header path in the source tree
    pub source: PathBuf,
    /// Destination in the staging directory
    pub staged: PathBuf,
}

impl HeaderFile {
    /// Map a header to its flat staged location
    pub fn new(source: impl Into<PathBuf>, include_dir: &Path) -> Self {
        let source = source.into();
        let staged = match source.file_name() {
            Some(name) => include_dir.join(name),
            None => include_dir.to_path_buf(),
        };
        Self { source, staged }
    }
}

/// Everything discovered under one source root
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    pub units: Vec<SourceUnit>,
    pub headers: Vec<HeaderFile>,
}

impl SourceTree {
    /// Scan `root` for source units and headers
    pub fn scan(root: &Path, obj_dir: &Path, include_dir: &Path) -> BuildResult<Self> {
        let units = find_files(root, SOURCE_EXTENSION)?
            .into_iter()
            .map(|source| {
                let object = object_path(obj_dir, &source);
                SourceUnit::new(source, object)
            })
            .collect::<BuildResult<Vec<_>>>()?;

        let headers = find_files(root, HEADER_EXTENSION)?
            .into_iter()
            .map(|header| HeaderFile::new(header, include_dir))
            .collect();

        Ok(Self { units, headers })
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Recursively find files with the given extension, in file-name order
pub fn find_files(root: &Path, extension: &str) -> BuildResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let error = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
            BuildError::io(path, error)
        })?;

        if entry.file_type().is_file()
            && entry.path().extension() == Some(OsStr::new(extension))
        {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

/// Object artifact path for a source file (flat, named after the source stem)
pub fn object_path(obj_dir: &Path, source: &Path) -> PathBuf {
    obj_dir.join(format!("{}.{}", file_stem(source), OBJECT_EXTENSION))
}

/// File name without its extension
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
