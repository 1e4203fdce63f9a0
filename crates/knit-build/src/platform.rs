//! Platform detection and per-platform toolchain conventions
//!
//! Two profiles are enough for the supported toolchains: a generic Unix
//! profile (ELF shared objects, `-fpic`, rpath) and a Darwin profile
//! (Mach-O dylibs with flat namespace and dynamic lookup, no rpath hint).

use serde::Serialize;
use std::fmt;

/// Build platform profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux and other non-Apple Unix systems
    Unix,
    /// macOS and other Darwin systems
    Darwin,
}

impl Platform {
    /// Detect the platform this process is running on
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS identifier (as in `std::env::consts::OS`) to a profile
    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" | "ios" => Self::Darwin,
            _ => Self::Unix,
        }
    }

    /// Lowercase identifier for this platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Darwin => "darwin",
        }
    }

    /// File name of the shared library for `name`
    pub fn shared_library_name(&self, name: &str) -> String {
        match self {
            Self::Unix => format!("lib{}.so", name),
            Self::Darwin => format!("lib{}.dylib", name),
        }
    }

    /// Linker flags that produce a dynamically loadable library
    pub fn shared_library_flags(&self) -> &'static [&'static str] {
        match self {
            Self::Unix => &["-shared"],
            Self::Darwin => &[
                "-flat_namespace",
                "-dynamiclib",
                "-undefined",
                "dynamic_lookup",
            ],
        }
    }

    /// Extra compiler flags for objects that go into the shared library
    pub fn library_compile_flags(&self) -> &'static [&'static str] {
        match self {
            Self::Unix => &["-fpic"],
            Self::Darwin => &[],
        }
    }

    /// Architecture selection flags
    pub fn arch_flags(&self, universal: bool) -> &'static [&'static str] {
        match self {
            Self::Darwin if universal => &["-arch", "x86_64", "-arch", "arm64"],
            _ => &["-m64"],
        }
    }

    /// Whether executables get an embedded runtime library search path
    pub fn supports_rpath(&self) -> bool {
        matches!(self, Self::Unix)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
