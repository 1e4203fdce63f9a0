//! External toolchain invocation
//!
//! The build core talks to the native compiler through the [`Toolchain`]
//! trait. [`CommandToolchain`] drives a gcc-compatible compiler driver as a
//! child process; tests substitute recording implementations.
use crate::error::{BuildError, BuildResult, Stage};
use crate::flags::FlagSet;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Request to compile one source file into one object
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Target the object belongs to (for error attribution)
    pub target: &'a str,
    pub flags: &'a FlagSet,
    pub source: &'a Path,
    pub object: &'a Path,
}

impl CompileRequest<'_> {
    /// Driver arguments: `-c <flags> -o <object> <source>`
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-c".into()];
        args.extend(self.flags.iter().map(OsString::from));
        args.push("-o".into());
        args.push(self.object.as_os_str().to_owned());
        args.push(self.source.as_os_str().to_owned());
        args
    }
}

/// Request to link objects into a shared library or executable
#[derive(Debug, Clone, Copy)]
pub struct LinkRequest<'a> {
    pub target: &'a str,
    pub objects: &'a [PathBuf],
    pub flags: &'a FlagSet,
    pub output: &'a Path,
}

impl LinkRequest<'_> {
    /// Driver arguments: `-o <output> <objects> <flags>`
    ///
    /// Library flags follow the objects so that `-l` references resolve
    /// against symbols the objects need.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-o".into(), self.output.as_os_str().to_owned()];
        args.extend(self.objects.iter().map(|o| o.as_os_str().to_owned()));
        args.extend(self.flags.iter().map(OsString::from));
        args
    }
}

/// Native compiler/linker
pub trait Toolchain: Send + Sync {
    /// Produce exactly one object artifact from one source file
    fn compile(&self, request: &CompileRequest<'_>) -> BuildResult<()>;

    /// Link objects into `request.output`
    fn link(&self, request: &LinkRequest<'_>) -> BuildResult<()>;
}

/// Toolchain backed by a compiler driver executable (`gcc`, `clang`, `cc`)
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    program: String,
}

impl CommandToolchain {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run the driver, blocking until it exits
    fn run(&self, stage: Stage, target: &str, args: Vec<OsString>) -> BuildResult<()> {
        let command_line = render_command(&self.program, &args);
        debug!(%stage, name = target, command = %command_line, "invoking toolchain");

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| BuildError::LaunchFailed {
                program: self.program.clone(),
                error: e,
            })?;

        if !status.success() {
            return Err(BuildError::toolchain(
                stage,
                target,
                command_line,
                status.code(),
            ));
        }

        Ok(())
    }
}

impl Toolchain for CommandToolchain {
    fn compile(&self, request: &CompileRequest<'_>) -> BuildResult<()> {
        self.run(Stage::Compile, request.target, request.args())
    }

    fn link(&self, request: &LinkRequest<'_>) -> BuildResult<()> {
        self.run(Stage::Link, request.target, request.args())
    }
}

/// Render a command line for logs and error messages
pub fn render_command(program: &str, args: &[OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_args_order() {
        let flags = FlagSet::parse("-Wall -O2");
        let request = CompileRequest {
            target: "cbitcoin",
            flags: &flags,
            source: Path::new("src/CBBlock.c"),
            object: Path::new("build/obj/CBBlock.o"),
        };

        assert_eq!(
            render_command("gcc", &request.args()),
            "gcc -c -Wall -O2 -o build/obj/CBBlock.o src/CBBlock.c"
        );
    }

    #[test]
    fn test_link_args_put_libraries_last() {
        let flags = FlagSet::parse("-Lbuild/bin -lcbitcoin");
        let objects = vec![
            PathBuf::from("build/obj/testCBBlock.o"),
            PathBuf::from("build/obj/CBOpenSSLCrypto.o"),
        ];
        let request = LinkRequest {
            target: "testCBBlock",
            objects: &objects,
            flags: &flags,
            output: Path::new("build/bin/testCBBlock"),
        };

        assert_eq!(
            render_command("gcc", &request.args()),
            "gcc -o build/bin/testCBBlock build/obj/testCBBlock.o \
             build/obj/CBOpenSSLCrypto.o -Lbuild/bin -lcbitcoin"
        );
    }

    #[test]
    fn test_missing_program_is_launch_failure() {
        let toolchain = CommandToolchain::new("knit-no-such-compiler");
        let flags = FlagSet::new();
        let result = toolchain.compile(&CompileRequest {
            target: "t",
            flags: &flags,
            source: Path::new("a.c"),
            object: Path::new("a.o"),
        });

        assert!(matches!(result, Err(BuildError::LaunchFailed { .. })));
    }
}
