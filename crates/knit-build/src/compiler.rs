//! Incremental compilation
//!
//! A unit is recompiled when its object is missing, when the source is
//! strictly newer than the object, or when a full rebuild was requested.
//! Only the source's own timestamp is considered; edits to included headers
//! do not make a unit stale.
use crate::error::{BuildError, BuildResult};
use crate::flags::FlagSet;
use crate::output::BuildProgress;
use crate::scanner::SourceUnit;
use crate::toolchain::{CompileRequest, Toolchain};

use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;
use tracing::debug;

/// Why a unit is or is not recompiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// The object artifact does not exist
    Missing,
    /// The source is newer than the object
    Modified,
    /// Full rebuild requested
    Forced,
    /// The object is up to date
    Fresh,
}

impl Staleness {
    pub fn evaluate(source: SystemTime, object: Option<SystemTime>, full_rebuild: bool) -> Self {
        match object {
            None => Staleness::Missing,
            Some(_) if full_rebuild => Staleness::Forced,
            Some(object) if source > object => Staleness::Modified,
            Some(_) => Staleness::Fresh,
        }
    }

    pub fn of_unit(unit: &SourceUnit, full_rebuild: bool) -> Self {
        Self::evaluate(unit.source_modified, unit.object_modified, full_rebuild)
    }

    pub fn needs_compile(&self) -> bool {
        !matches!(self, Staleness::Fresh)
    }
}

/// Stat `source` and `object` and decide staleness
pub fn check_staleness(source: &Path, object: &Path, full_rebuild: bool) -> BuildResult<Staleness> {
    let source_modified = fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| BuildError::io(source, e))?;

    let object_modified = match fs::metadata(object) {
        Ok(metadata) => Some(metadata.modified().map_err(|e| BuildError::io(object, e))?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(BuildError::io(object, e)),
    };

    Ok(Staleness::evaluate(source_modified, object_modified, full_rebuild))
}

/// Result of one compile request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    Compiled(Staleness),
    Reused,
}

/// Compiles units whose objects are stale and counts what it did
pub struct IncrementalCompiler<'a> {
    toolchain: &'a dyn Toolchain,
    progress: BuildProgress,
    full_rebuild: bool,
    compiled: AtomicUsize,
    reused: AtomicUsize,
}

impl<'a> IncrementalCompiler<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, progress: BuildProgress, full_rebuild: bool) -> Self {
        Self {
            toolchain,
            progress,
            full_rebuild,
            compiled: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        }
    }

    /// Compile `source` into `object` if it is stale
    pub fn compile(
        &self,
        target: &str,
        flags: &FlagSet,
        object: &Path,
        source: &Path,
    ) -> BuildResult<CompileOutcome> {
        let staleness = check_staleness(source, object, self.full_rebuild)?;
        self.compile_with(target, flags, object, source, staleness)
    }

    /// Compile a unit using the timestamps recorded when it was scanned
    pub fn compile_unit(
        &self,
        target: &str,
        flags: &FlagSet,
        unit: &SourceUnit,
    ) -> BuildResult<CompileOutcome> {
        let staleness = Staleness::of_unit(unit, self.full_rebuild);
        self.compile_with(target, flags, &unit.object, &unit.source, staleness)
    }

    /// Compile every stale unit of `target`
    ///
    /// Units are independent, so they may be compiled concurrently. The first
    /// failure is returned; the caller must not link in that case.
    pub fn compile_all(
        &self,
        target: &str,
        flags: &FlagSet,
        units: &[SourceUnit],
        parallel: bool,
    ) -> BuildResult<()> {
        if parallel {
            units
                .par_iter()
                .try_for_each(|unit| self.compile_unit(target, flags, unit).map(|_| ()))
        } else {
            units
                .iter()
                .try_for_each(|unit| self.compile_unit(target, flags, unit).map(|_| ()))
        }
    }

    pub fn compiled(&self) -> usize {
        self.compiled.load(Ordering::Relaxed)
    }

    pub fn reused(&self) -> usize {
        self.reused.load(Ordering::Relaxed)
    }

    fn compile_with(
        &self,
        target: &str,
        flags: &FlagSet,
        object: &Path,
        source: &Path,
        staleness: Staleness,
    ) -> BuildResult<CompileOutcome> {
        if !staleness.needs_compile() {
            debug!(source = %source.display(), "object is fresh");
            self.progress.fresh(source);
            self.reused.fetch_add(1, Ordering::Relaxed);
            return Ok(CompileOutcome::Reused);
        }

        debug!(source = %source.display(), ?staleness, "compiling");
        self.progress.compiling(source);
        self.toolchain.compile(&CompileRequest {
            target,
            flags,
            source,
            object,
        })?;
        self.compiled.fetch_add(1, Ordering::Relaxed);

        Ok(CompileOutcome::Compiled(staleness))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::LinkRequest;
    use rstest::rstest;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        compiled: Mutex<Vec<String>>,
    }

    impl Toolchain for Recorder {
        fn compile(&self, request: &CompileRequest<'_>) -> BuildResult<()> {
            fs::write(request.object, b"obj").unwrap();
            self.compiled
                .lock()
                .unwrap()
                .push(request.source.display().to_string());
            Ok(())
        }

        fn link(&self, _request: &LinkRequest<'_>) -> BuildResult<()> {
            Ok(())
        }
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[rstest]
    #[case(100, None, false, Staleness::Missing)]
    #[case(100, None, true, Staleness::Missing)]
    #[case(200, Some(100), false, Staleness::Modified)]
    #[case(100, Some(100), false, Staleness::Fresh)]
    #[case(100, Some(200), false, Staleness::Fresh)]
    #[case(100, Some(200), true, Staleness::Forced)]
    fn test_staleness_rule(
        #[case] source: u64,
        #[case] object: Option<u64>,
        #[case] full: bool,
        #[case] expected: Staleness,
    ) {
        assert_eq!(Staleness::evaluate(at(source), object.map(at), full), expected);
    }

    #[test]
    fn test_compile_skips_fresh_object() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("CBRand.c");
        let object = dir.path().join("CBRand.o");
        fs::write(&source, "").unwrap();
        fs::write(&object, "").unwrap();
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(at(1_000))
            .unwrap();

        let recorder = Recorder::default();
        let compiler = IncrementalCompiler::new(&recorder, BuildProgress::default(), false);
        let outcome = compiler
            .compile("random", &FlagSet::new(), &object, &source)
            .unwrap();

        assert_eq!(outcome, CompileOutcome::Reused);
        assert_eq!(compiler.reused(), 1);
        assert!(recorder.compiled.lock().unwrap().is_empty());
    }

    #[test]
    fn test_compile_all_compiles_each_stale_unit_once() {
        let dir = TempDir::new().unwrap();
        let mut units = Vec::new();
        for name in ["CBA", "CBB", "CBC"] {
            let source = dir.path().join(format!("{name}.c"));
            fs::write(&source, "").unwrap();
            units.push(SourceUnit::new(&source, dir.path().join(format!("{name}.o"))).unwrap());
        }

        let recorder = Recorder::default();
        let compiler = IncrementalCompiler::new(&recorder, BuildProgress::default(), false);
        compiler
            .compile_all("cbitcoin", &FlagSet::new(), &units, true)
            .unwrap();

        let mut compiled = recorder.compiled.lock().unwrap().clone();
        compiled.sort();
        assert_eq!(compiled.len(), 3);
        assert_eq!(compiler.compiled(), 3);
        assert!(units.iter().all(|u| u.object.exists()));
    }
}
