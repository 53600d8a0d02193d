//! Registry of materialized targets
//!
//! The registry is an explicit context object owned by the caller and handed
//! to the orchestrator. It is filled one entry per package and read by the
//! outer build tool afterwards, typically through [`Registry::to_json`].

use crate::targets::BuildTarget;
use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, warn};

/// What an auxiliary file is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Fixture copied next to the target with explicit permissions
    Fixture,
    /// Test configuration file
    Config,
}

/// A non-compiled file registered with a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuxiliaryArtifact {
    pub path: PathBuf,
    /// Permission bits for the copy; `None` keeps the source's
    pub mode: Option<u32>,
    pub kind: ArtifactKind,
}

/// Everything registered under one package name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub package: String,
    pub target: Option<BuildTarget>,
    pub auxiliary: Vec<AuxiliaryArtifact>,
}

impl RegistryEntry {
    /// Whether the entry is a test entry point
    pub fn is_test_app(&self) -> bool {
        self.target
            .as_ref()
            .map_or(false, |target| target.kind.is_test_entry())
    }

    /// Registered configuration files
    pub fn config_files(&self) -> impl Iterator<Item = &AuxiliaryArtifact> {
        self.auxiliary
            .iter()
            .filter(|a| a.kind == ArtifactKind::Config)
    }

    /// Registered fixtures
    pub fn fixtures(&self) -> impl Iterator<Item = &AuxiliaryArtifact> {
        self.auxiliary
            .iter()
            .filter(|a| a.kind == ArtifactKind::Fixture)
    }
}

/// Package name -> registered target and auxiliary files
///
/// Entries keep the order of their first registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Registry {
    entries: IndexMap<String, RegistryEntry>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package's target and auxiliary files
    ///
    /// Re-registering a name replaces the earlier entry and logs a warning.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        target: Option<BuildTarget>,
        auxiliary: Vec<AuxiliaryArtifact>,
    ) {
        let name = name.into();
        let entry = RegistryEntry {
            package: name.clone(),
            target,
            auxiliary,
        };

        debug!(
            package = %name,
            compiled = entry.target.is_some(),
            auxiliary = entry.auxiliary.len(),
            "registering package"
        );

        if self.entries.insert(name.clone(), entry).is_some() {
            warn!(package = %name, "package registered twice, replacing earlier entry");
        }
    }

    /// Look up an entry
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// Whether a package is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered packages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    /// Registered test entry points, in registration order
    pub fn test_apps(&self) -> Vec<&BuildTarget> {
        self.entries
            .values()
            .filter(|entry| entry.is_test_app())
            .filter_map(|entry| entry.target.as_ref())
            .collect()
    }

    /// JSON form read by the outer build tool
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// SHA-256 of the JSON form, hex encoded
    ///
    /// Two runs over the same descriptors produce the same fingerprint.
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}
