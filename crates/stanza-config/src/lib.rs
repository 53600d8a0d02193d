//! Stanza Configuration System
//!
//! Provides the declarative side of a stanza build:
//! - Package manifests (`<Package>Lib.toml`), one table per target
//! - Workspace configuration (`stanza.toml`) holding the base environment
//! - Discovery of all manifests below a workspace root
//! - Environment variable overrides (`STANZA_*`)
//!
//! Everything is parsed and validated eagerly; later stages never look at raw
//! TOML.
//!
//! # Example
//!
//! ```no_run
//! use stanza_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let workspace = loader.load_workspace(Path::new(".")).unwrap();
//! for manifest in &workspace.manifests {
//!     println!("{} ({} targets)", manifest.package, manifest.manifest.targets.len());
//! }
//! ```

pub mod loader;
pub mod manifest;
pub mod workspace;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cannot derive a package name from {0}")]
    InvalidPackageName(PathBuf),

    #[error("Failed to walk {root}: {error}")]
    Walk {
        root: PathBuf,
        error: walkdir::Error,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{ConfigLoader, LoadedManifest, Workspace};
pub use manifest::{
    package_name_from_path, AppendUnique, CopyFiles, FileSelector, PackageManifest,
    PublicSettings, TargetSettings, TargetTypeName,
};
pub use workspace::{BuildSection, EnvironmentSection, WorkspaceConfig};
