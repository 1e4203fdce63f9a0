//! Shared library and executable link steps
use crate::config::BuildConfig;
use crate::deps::TargetRequirements;
use crate::error::BuildResult;
use crate::flags::FlagSet;
use crate::output::BuildProgress;
use crate::scanner::SourceUnit;
use crate::targets::Target;
use crate::toolchain::{LinkRequest, Toolchain};

use std::path::PathBuf;

/// Issues link requests for the library and executables
pub struct Linker<'a> {
    toolchain: &'a dyn Toolchain,
    config: &'a BuildConfig,
    progress: BuildProgress,
}

impl<'a> Linker<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, config: &'a BuildConfig, progress: BuildProgress) -> Self {
        Self {
            toolchain,
            config,
            progress,
        }
    }

    /// Link every library unit into the shared library
    ///
    /// Always relinks, even when no unit was recompiled.
    pub fn link_library(&self, units: &[SourceUnit]) -> BuildResult<PathBuf> {
        let output = self.config.library_path();
        let objects: Vec<PathBuf> = units.iter().map(|u| u.object.clone()).collect();
        let flags = self.config.library_lflags();

        self.progress.linking(&output);
        self.toolchain.link(&LinkRequest {
            target: &self.config.library_name,
            objects: &objects,
            flags: &flags,
            output: &output,
        })?;

        Ok(output)
    }

    /// Linker flags for an executable with the given requirements
    ///
    /// `-L<bin> -l<name>`, then the runtime search path on platforms that
    /// support it, then the dependency flags.
    pub fn executable_flags(&self, requirements: &TargetRequirements) -> FlagSet {
        let bin_dir = &self.config.layout.bin_dir;
        let mut flags = FlagSet::new();
        flags.push(format!("-L{}", bin_dir.display()));
        flags.push(format!("-l{}", self.config.library_name));

        if self.config.platform.supports_rpath() {
            let mut search = vec![bin_dir.display().to_string()];
            search.extend(requirements.library_dirs.iter().map(|d| d.display().to_string()));
            flags.push(format!("-Wl,-rpath,{}", search.join(":")));
        }

        flags.extend(&requirements.lflags);
        flags
    }

    /// Link a test or example executable
    pub fn link_executable(
        &self,
        target: &Target,
        requirements: &TargetRequirements,
    ) -> BuildResult<PathBuf> {
        let mut objects = vec![target.object.clone()];
        objects.extend(requirements.objects.iter().cloned());
        let flags = self.executable_flags(requirements);

        self.progress.linking(&target.output);
        self.toolchain.link(&LinkRequest {
            target: &target.name,
            objects: &objects,
            flags: &flags,
            output: &target.output,
        })?;

        Ok(target.output.clone())
    }
}
