//! Build system error types

use serde::Serialize;
use stanza_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Errors that invalidate the whole orchestration run
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Package '{package}' depends on unknown package '{dependency}'")]
    UnresolvedDependency { package: String, dependency: String },

    #[error("Circular dependency detected: {}", format_cycle(.cycle))]
    Cycle { cycle: Vec<String> },

    #[error("Package '{0}' is declared more than once")]
    DuplicatePackage(String),

    #[error("Package '{package}' was resolved before its dependency '{dependency}'")]
    OutOfOrder { package: String, dependency: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },
}

impl BuildError {
    /// Create an unresolved dependency error
    pub fn unresolved(package: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::UnresolvedDependency {
            package: package.into(),
            dependency: dependency.into(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Members of the detected cycle, if this is a cycle error
    pub fn cycle_members(&self) -> Option<&[String]> {
        match self {
            Self::Cycle { cycle } => Some(cycle),
            _ => None,
        }
    }
}

/// Closes the loop for display: `A -> B -> A`
fn format_cycle(cycle: &[String]) -> String {
    let mut names: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        names.push(first);
    }
    names.join(" -> ")
}

/// Errors confined to a single package; siblings keep building
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackageError {
    #[error("No source files found for target '{package}' (patterns: {})", .patterns.join(", "))]
    EmptyTarget {
        package: String,
        patterns: Vec<String>,
    },

    #[error("Invalid configuration for '{package}': {reason}")]
    Configuration { package: String, reason: String },

    #[error("Failed to list files for '{package}': {reason}")]
    FileListing { package: String, reason: String },
}

impl PackageError {
    /// Create a configuration error
    pub fn configuration(package: impl Into<String>, reason: impl ToString) -> Self {
        Self::Configuration {
            package: package.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a file listing error
    pub fn file_listing(package: impl Into<String>, reason: impl ToString) -> Self {
        Self::FileListing {
            package: package.into(),
            reason: reason.to_string(),
        }
    }

    /// Package the error belongs to
    pub fn package(&self) -> &str {
        match self {
            Self::EmptyTarget { package, .. }
            | Self::Configuration { package, .. }
            | Self::FileListing { package, .. } => package,
        }
    }
}
