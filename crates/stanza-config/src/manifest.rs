//! Package Manifests (`<Package>Lib.toml`)
//!
//! A manifest is a table of targets keyed by target name. Each target table
//! follows the fixed package schema: target type, source globs, link
//! dependencies, public exports, private defines, lazy linking and auxiliary
//! files.
//!
//! ```toml
//! [CoastEBCDIC]
//! targetType = "LibraryShared"
//! linkDependencies = ["CoastFoundation"]
//! sourceFiles = ["*.cpp"]
//! appendUnique = { CPPDEFINES = ["COASTEBCDIC_IMPL"] }
//!
//! [CoastEBCDIC.public]
//! includes = ["*.h"]
//! ```

use crate::{ConfigError, ConfigResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name suffix that marks a package manifest
pub const MANIFEST_SUFFIX: &str = "Lib.toml";

/// One package manifest file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct PackageManifest {
    /// Targets in declaration order
    pub targets: IndexMap<String, TargetSettings>,
}

/// Kind of target a manifest entry produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetTypeName {
    LibraryShared,
    Program,
    ProgramTest,
}

/// Settings of a single target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TargetSettings {
    /// Target type; absent means registration only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type: Option<TargetTypeName>,

    /// Source file globs, relative to the package directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_files: Vec<String>,

    /// Names of packages this target links against
    #[serde(default, alias = "libDepends", skip_serializing_if = "Vec::is_empty")]
    pub link_dependencies: Vec<String>,

    /// Include directory relative to the package directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub include_subdir: String,

    /// Settings exported to dependents
    #[serde(default, skip_serializing_if = "PublicSettings::is_empty")]
    pub public: PublicSettings,

    /// Settings applied to this target's own compilation only
    #[serde(default, skip_serializing_if = "AppendUnique::is_empty")]
    pub append_unique: AppendUnique,

    /// Resolve link symbols at load time
    #[serde(default, rename = "lazylinking", alias = "lazyLinking")]
    pub lazy_linking: bool,

    /// Fixture files copied next to the target
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copy_files: Vec<CopyFiles>,

    /// Test configuration files registered with the target
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_files: Vec<String>,
}

/// Public (exported) settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PublicSettings {
    /// Header globs exported to dependents
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    /// Definitions exported to dependents
    #[serde(default, skip_serializing_if = "AppendUnique::is_empty")]
    pub append_unique: AppendUnique,

    /// Include directory of the exported headers; same meaning as the
    /// target-level `includeSubdir`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub include_subdir: String,
}

impl PublicSettings {
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.append_unique.is_empty() && self.include_subdir.is_empty()
    }
}

/// Values appended without duplicates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct AppendUnique {
    /// Preprocessor definitions, `NAME` or `NAME=VALUE`
    #[serde(default, rename = "CPPDEFINES", skip_serializing_if = "Vec::is_empty")]
    pub cppdefines: Vec<String>,
}

impl AppendUnique {
    pub fn is_empty(&self) -> bool {
        self.cppdefines.is_empty()
    }
}

/// A set of fixture files and the permission bits they should get
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CopyFiles {
    #[serde(flatten)]
    pub selector: FileSelector,

    /// Unix permission bits, e.g. `0o444`
    pub mode: u32,
}

/// How fixture files are selected
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FileSelector {
    /// Glob patterns relative to the package directory
    Patterns { patterns: Vec<String> },
    /// Every file below `dirs` with one of `extensions`
    Find { find: FindSpec },
}

/// Directory/extension search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FindSpec {
    #[serde(default = "default_find_dirs")]
    pub dirs: Vec<String>,
    pub extensions: Vec<String>,
}

fn default_find_dirs() -> Vec<String> {
    vec![".".to_string()]
}

impl PackageManifest {
    /// Load a manifest from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let manifest = Self::parse(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse manifest text without validating it
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Validate every target in the manifest
    pub fn validate(&self) -> ConfigResult<()> {
        if self.targets.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "targets".to_string(),
                reason: "manifest declares no targets".to_string(),
            });
        }

        for (name, settings) in &self.targets {
            validate_target_name(name)?;
            settings.validate(name)?;
        }

        Ok(())
    }

    /// Get a target by name
    pub fn target(&self, name: &str) -> Option<&TargetSettings> {
        self.targets.get(name)
    }
}

impl TargetSettings {
    /// Validate the settings of target `name`
    pub fn validate(&self, name: &str) -> ConfigResult<()> {
        for (index, dep) in self.link_dependencies.iter().enumerate() {
            let field = format!("{}.linkDependencies", name);
            if dep.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "dependency name cannot be empty".to_string(),
                });
            }
            if dep == name {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("'{}' cannot depend on itself", name),
                });
            }
            if self.link_dependencies[..index].contains(dep) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("'{}' is listed more than once", dep),
                });
            }
        }

        for (field, subdir) in [
            ("includeSubdir", &self.include_subdir),
            ("public.includeSubdir", &self.public.include_subdir),
        ] {
            if Path::new(subdir).is_absolute() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.{}", name, field),
                    reason: "must be relative to the package directory".to_string(),
                });
            }
        }
        if !self.include_subdir.is_empty()
            && !self.public.include_subdir.is_empty()
            && self.include_subdir != self.public.include_subdir
        {
            return Err(ConfigError::InvalidValue {
                field: format!("{}.public.includeSubdir", name),
                reason: format!(
                    "'{}' conflicts with includeSubdir '{}'",
                    self.public.include_subdir, self.include_subdir
                ),
            });
        }

        validate_defines(&format!("{}.appendUnique.CPPDEFINES", name), &self.append_unique)?;
        validate_defines(
            &format!("{}.public.appendUnique.CPPDEFINES", name),
            &self.public.append_unique,
        )?;

        for copy in &self.copy_files {
            if copy.mode > 0o7777 {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.copyFiles.mode", name),
                    reason: format!("{:#o} is not a permission mask", copy.mode),
                });
            }
            if let FileSelector::Find { find } = &copy.selector {
                if find.extensions.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("{}.copyFiles.find", name),
                        reason: "at least one extension is required".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Include directory, from `includeSubdir` or `public.includeSubdir`
    pub fn effective_include_subdir(&self) -> &str {
        if self.include_subdir.is_empty() {
            &self.public.include_subdir
        } else {
            &self.include_subdir
        }
    }

    /// Whether this entry only registers auxiliary files
    pub fn is_registration_only(&self) -> bool {
        self.target_type.is_none()
    }
}

fn validate_target_name(name: &str) -> ConfigResult<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidValue {
            field: "target name".to_string(),
            reason: format!("'{}' is not a valid target name", name),
        });
    }
    Ok(())
}

fn validate_defines(field: &str, defines: &AppendUnique) -> ConfigResult<()> {
    for define in &defines.cppdefines {
        let define_name = define.split('=').next().unwrap_or("");
        if define_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("'{}' has no definition name", define),
            });
        }
    }
    Ok(())
}

/// Derive a package name from its manifest location
///
/// With the default suffix, `modules/EBCDIC/CoastEBCDICLib.toml` names
/// package `CoastEBCDIC`.
pub fn package_name_from_path(path: &Path, suffix: &str) -> ConfigResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(suffix))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::InvalidPackageName(path.to_path_buf()))
}
