//! Workspace Configuration (stanza.toml)
//!
//! Holds the base build environment every package starts from, plus
//! orchestration settings.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the workspace configuration
pub const WORKSPACE_FILE: &str = "stanza.toml";

/// Workspace configuration from stanza.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Base build environment
    #[serde(default)]
    pub environment: EnvironmentSection,

    /// Orchestration settings
    #[serde(default)]
    pub build: BuildSection,
}

/// Base environment shared by all packages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentSection {
    /// Include directories
    #[serde(default)]
    pub includes: Vec<String>,

    /// Preprocessor definitions, `NAME` or `NAME=VALUE`
    #[serde(default)]
    pub defines: Vec<String>,

    /// Libraries every target links against
    #[serde(default)]
    pub libraries: Vec<String>,
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildSection {
    /// Materialize independent packages concurrently
    #[serde(default)]
    pub parallel: bool,

    /// Name prefix identifying test-runner packages; empty disables the check
    #[serde(default = "default_test_runner_prefix")]
    pub test_runner_prefix: String,

    /// File name suffix of package manifests
    #[serde(default = "default_manifest_suffix")]
    pub manifest_suffix: String,
}

fn default_test_runner_prefix() -> String {
    "testfw".to_string()
}

fn default_manifest_suffix() -> String {
    crate::manifest::MANIFEST_SUFFIX.to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            parallel: false,
            test_runner_prefix: default_test_runner_prefix(),
            manifest_suffix: default_manifest_suffix(),
        }
    }
}

impl WorkspaceConfig {
    /// Load workspace configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the workspace configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.build.manifest_suffix.ends_with(".toml") {
            return Err(ConfigError::InvalidValue {
                field: "build.manifest-suffix".to_string(),
                reason: format!("'{}' must end in .toml", self.build.manifest_suffix),
            });
        }

        for define in &self.environment.defines {
            if define.split('=').next().unwrap_or("").trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "environment.defines".to_string(),
                    reason: format!("'{}' has no definition name", define),
                });
            }
        }

        Ok(())
    }
}
