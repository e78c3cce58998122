//! Java/Kotlin toolchain options and compiler diagnostics.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A Java language level.
///
/// Legacy levels are written `1.x` (`1.8`), modern ones as a bare number
/// (`11`, `17`). Gradle's `VERSION_11` / `VERSION_1_8` spellings are also
/// accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JavaVersion(u16);

impl JavaVersion {
    pub const fn new(feature: u16) -> Self {
        Self(feature)
    }

    /// The feature release number (`8` for `1.8`).
    pub fn feature(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for JavaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= 8 {
            write!(f, "1.{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for JavaVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidJavaVersion(s.to_string());

        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix("JavaVersion.").unwrap_or(trimmed);
        let normalized = trimmed
            .strip_prefix("VERSION_")
            .map(|rest| rest.replace('_', "."))
            .unwrap_or_else(|| trimmed.to_string());

        let feature: u16 = match normalized.split_once('.') {
            Some(("1", minor)) => minor.parse().map_err(|_| invalid())?,
            Some(_) => return Err(invalid()),
            None => normalized.parse().map_err(|_| invalid())?,
        };

        if feature == 0 {
            return Err(invalid());
        }

        Ok(Self(feature))
    }
}

impl Serialize for JavaVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Language-level compatibility settings shared by every compile task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ToolchainOptions {
    source_compatibility: JavaVersion,
    target_compatibility: JavaVersion,
    jvm_target: JavaVersion,
}

impl ToolchainOptions {
    /// Both the bytecode target and the Kotlin JVM target must support at
    /// least the source language level.
    pub fn new(
        source_compatibility: JavaVersion,
        target_compatibility: JavaVersion,
        jvm_target: JavaVersion,
    ) -> Result<Self> {
        if jvm_target < source_compatibility || target_compatibility < source_compatibility {
            return Err(Error::IncompatibleToolchain {
                source_compatibility,
                target_compatibility,
                jvm_target,
            });
        }

        Ok(Self {
            source_compatibility,
            target_compatibility,
            jvm_target,
        })
    }

    pub fn source_compatibility(&self) -> JavaVersion {
        self.source_compatibility
    }

    pub fn target_compatibility(&self) -> JavaVersion {
        self.target_compatibility
    }

    pub fn jvm_target(&self) -> JavaVersion {
        self.jvm_target
    }
}

/// Diagnostic categories suppressed for all compile tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CompilerDiagnosticsPolicy {
    suppressed: BTreeSet<String>,
}

impl CompilerDiagnosticsPolicy {
    pub fn new<I, S>(categories: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut suppressed = BTreeSet::new();
        for category in categories {
            let category = category.into();
            if !is_category(&category) {
                return Err(Error::InvalidValue {
                    field: "diagnostics".to_string(),
                    message: format!("invalid diagnostic category: {:?}", category),
                });
            }
            suppressed.insert(category);
        }
        Ok(Self { suppressed })
    }

    pub fn is_suppressed(&self, category: &str) -> bool {
        self.suppressed.contains(category)
    }

    pub fn suppressed(&self) -> impl Iterator<Item = &str> {
        self.suppressed.iter().map(|s| s.as_str())
    }

    /// javac arguments implementing the policy (`-Xlint:-deprecation`).
    pub fn compiler_args(&self) -> Vec<String> {
        self.suppressed
            .iter()
            .map(|c| format!("-Xlint:-{}", c))
            .collect()
    }
}

fn is_category(category: &str) -> bool {
    let mut chars = category.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        }
        _ => false,
    }
}
