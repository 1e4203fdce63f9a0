//! Ordered compiler/linker flag lists
use serde::Serialize;
use std::fmt;

/// An ordered list of command-line flags
///
/// Flags are kept as separate arguments so they can be passed to a process
/// without going through a shell. Fragments taken from configuration strings
/// are split on whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlagSet(Vec<String>);

impl FlagSet {
    /// Create an empty flag set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Split a whitespace-separated flag string
    pub fn parse(flags: &str) -> Self {
        Self(flags.split_whitespace().map(str::to_string).collect())
    }

    /// Append a single flag (empty flags are ignored)
    pub fn push(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !flag.is_empty() {
            self.0.push(flag);
        }
    }

    /// Append every flag from `other`
    pub fn extend(&mut self, other: &FlagSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Append static flags
    pub fn extend_static(&mut self, flags: &[&str]) {
        self.0.extend(flags.iter().map(|f| f.to_string()));
    }

    /// Builder-style append of another flag set
    pub fn with(mut self, other: &FlagSet) -> Self {
        self.extend(other);
        self
    }

    /// Check whether a flag is present
    pub fn contains(&self, flag: &str) -> bool {
        self.0.iter().any(|f| f == flag)
    }

    /// Check whether any flag starts with `prefix`
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.0.iter().any(|f| f.starts_with(prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

impl FromIterator<String> for FlagSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut flags = FlagSet::new();
        for flag in iter {
            flags.push(flag);
        }
        flags
    }
}

impl<'a> IntoIterator for &'a FlagSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_whitespace() {
        let flags = FlagSet::parse("  -ldl   -L/lib/x86_64-linux-gnu/ ");
        assert_eq!(flags.as_slice(), &["-ldl", "-L/lib/x86_64-linux-gnu/"]);
    }

    #[test]
    fn test_push_ignores_empty() {
        let mut flags = FlagSet::new();
        flags.push("");
        flags.push("-g");
        assert_eq!(flags.len(), 1);
        assert!(flags.contains("-g"));
    }

    #[test]
    fn test_with_preserves_order() {
        let flags = FlagSet::parse("-Wall").with(&FlagSet::parse("-O2 -g"));
        assert_eq!(flags.to_string(), "-Wall -O2 -g");
        assert!(flags.contains_prefix("-O"));
        assert!(!flags.contains_prefix("-I"));
    }
}
