//! Header and fixture staging
//!
//! Headers are copied into one flat include directory so the library exposes
//! a single public include namespace regardless of source nesting. Copies
//! always overwrite; no staleness check is applied to staged files.
use crate::error::{BuildError, BuildResult};
use crate::scanner::HeaderFile;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Copies headers into the staging include directory
#[derive(Debug, Clone)]
pub struct HeaderStager {
    include_dir: PathBuf,
}

impl HeaderStager {
    pub fn new(include_dir: impl Into<PathBuf>) -> Self {
        Self {
            include_dir: include_dir.into(),
        }
    }

    /// Stage every discovered header, returning how many were copied
    pub fn stage_all(&self, headers: &[HeaderFile]) -> BuildResult<usize> {
        for header in headers {
            copy_file(&header.source, &header.staged)?;
        }
        Ok(headers.len())
    }

    /// Stage a header that lives outside the scanned source tree
    pub fn stage_file(&self, source: &Path) -> BuildResult<PathBuf> {
        copy_into(source, &self.include_dir)
    }
}

/// Copy `source` into `dir`, keeping its file name
pub fn copy_into(source: &Path, dir: &Path) -> BuildResult<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        BuildError::io(
            source,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let destination = dir.join(name);
    copy_file(source, &destination)?;
    Ok(destination)
}

fn copy_file(source: &Path, destination: &Path) -> BuildResult<()> {
    debug!(from = %source.display(), to = %destination.display(), "staging file");
    fs::copy(source, destination).map_err(|e| BuildError::io(source, e))?;
    Ok(())
}
