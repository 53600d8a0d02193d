//! Build environments and the factory that produces the base one
//!
//! An [`Environment`] is a value: merging produces a new environment and
//! never touches the one it started from, so clones handed to sibling
//! packages cannot affect each other.

use crate::descriptor::{Define, PackageDescriptor};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use stanza_config::EnvironmentSection;
use std::path::PathBuf;

/// Include paths, definitions and link libraries
///
/// All three collections have set semantics with insertion order preserved.
/// Re-adding a definition with a different value replaces the value but keeps
/// the definition's original position.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Environment {
    pub include_paths: IndexSet<PathBuf>,
    pub defines: IndexMap<String, Option<String>>,
    pub libraries: IndexSet<String>,
}

impl Environment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an include path
    pub fn with_include(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.insert(path.into());
        self
    }

    /// Add a definition; a later value for the same name wins
    pub fn with_define(mut self, define: &Define) -> Self {
        self.defines.insert(define.name.clone(), define.value.clone());
        self
    }

    /// Add several definitions in order
    pub fn with_defines<'a>(self, defines: impl IntoIterator<Item = &'a Define>) -> Self {
        defines.into_iter().fold(self, |env, define| env.with_define(define))
    }

    /// Add a link library
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.libraries.insert(library.into());
        self
    }

    /// Merge `other` into this environment
    ///
    /// Entries already present are left in place; definitions from `other`
    /// override values of the same name.
    pub fn merged(mut self, other: &Environment) -> Self {
        self.include_paths.extend(other.include_paths.iter().cloned());
        for (name, value) in &other.defines {
            self.defines.insert(name.clone(), value.clone());
        }
        self.libraries.extend(other.libraries.iter().cloned());
        self
    }

    /// Whether a definition of `name` exists
    pub fn has_define(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    /// Value of definition `name`; `Some(None)` for a valueless definition
    pub fn define_value(&self, name: &str) -> Option<Option<&str>> {
        self.defines.get(name).map(|value| value.as_deref())
    }

    /// Definitions in command-line form (`NAME` or `NAME=VALUE`)
    pub fn define_flags(&self) -> Vec<String> {
        self.defines
            .iter()
            .map(|(name, value)| match value {
                Some(value) => format!("{}={}", name, value),
                None => name.clone(),
            })
            .collect()
    }

    /// Whether an include path is present
    pub fn has_include(&self, path: impl Into<PathBuf>) -> bool {
        self.include_paths.contains(&path.into())
    }

    /// Whether nothing has been set
    pub fn is_empty(&self) -> bool {
        self.include_paths.is_empty() && self.defines.is_empty() && self.libraries.is_empty()
    }
}

/// Produces the base build environment and per-package clones of it
pub trait EnvironmentFactory {
    /// The process-wide base environment
    fn base(&self) -> Environment;

    /// A fresh environment for one package
    ///
    /// Defaults to a clone of the base; implementations may specialize per
    /// package.
    fn for_package(&self, _descriptor: &PackageDescriptor) -> Environment {
        self.base()
    }
}

/// Factory serving a fixed base environment
#[derive(Debug, Clone, Default)]
pub struct BaseEnvironment {
    base: Environment,
}

impl BaseEnvironment {
    /// Create a factory around `base`
    pub fn new(base: Environment) -> Self {
        Self { base }
    }

    /// Build the base environment from the `[environment]` section of stanza.toml
    pub fn from_config(section: &EnvironmentSection) -> Self {
        let env = section
            .includes
            .iter()
            .fold(Environment::new(), |env, include| env.with_include(include));
        let env = section
            .defines
            .iter()
            .fold(env, |env, define| env.with_define(&Define::parse(define)));
        let env = section
            .libraries
            .iter()
            .fold(env, |env, library| env.with_library(library.as_str()));
        Self::new(env)
    }
}

impl EnvironmentFactory for BaseEnvironment {
    fn base(&self) -> Environment {
        self.base.clone()
    }
}
