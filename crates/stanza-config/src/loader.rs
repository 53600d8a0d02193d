//! Configuration Loader
//!
//! Finds the workspace root, loads `stanza.toml`, applies environment
//! overrides and discovers every package manifest below the root.

use crate::manifest::{package_name_from_path, PackageManifest};
use crate::workspace::{WorkspaceConfig, WORKSPACE_FILE};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configuration loader
///
/// Precedence, later overrides earlier:
/// 1. Built-in defaults
/// 2. Workspace config (stanza.toml)
/// 3. Environment variables (STANZA_*)
pub struct ConfigLoader {
    /// Skip directories whose name starts with a dot
    skip_hidden: bool,
}

/// A fully loaded workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory containing stanza.toml (or the start directory)
    pub root: PathBuf,

    /// Effective workspace configuration
    pub config: WorkspaceConfig,

    /// Manifests sorted by path
    pub manifests: Vec<LoadedManifest>,
}

/// A manifest together with where it was found
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedManifest {
    /// Manifest file
    pub path: PathBuf,

    /// Package directory (parent of the manifest)
    pub dir: PathBuf,

    /// Package name derived from the file name
    ///
    /// Only used to look manifests up. Target names come from the table
    /// keys and need not match it, so one manifest can declare several
    /// targets under unrelated names.
    pub package: String,

    /// Parsed and validated manifest
    pub manifest: PackageManifest,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { skip_hidden: true }
    }

    /// Also descend into hidden directories
    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.skip_hidden = !include_hidden;
        self
    }

    /// Load the workspace containing `start_dir`
    pub fn load_workspace(&self, start_dir: &Path) -> ConfigResult<Workspace> {
        let (root, config) = self.find_workspace_config(start_dir)?;
        let config = self.apply_env_overrides(config)?;
        let manifests = self.discover_manifests(&root, &config.build.manifest_suffix)?;

        Ok(Workspace {
            root,
            config,
            manifests,
        })
    }

    /// Load a single manifest file
    pub fn load_manifest(&self, path: &Path, suffix: &str) -> ConfigResult<LoadedManifest> {
        let package = package_name_from_path(path, suffix)?;
        let manifest = PackageManifest::load_from_file(path)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(LoadedManifest {
            path: path.to_path_buf(),
            dir,
            package,
            manifest,
        })
    }

    /// Discover and load all manifests below `root`
    pub fn discover_manifests(&self, root: &Path, suffix: &str) -> ConfigResult<Vec<LoadedManifest>> {
        let skip_hidden = self.skip_hidden;
        let mut manifests = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(skip_hidden && entry.depth() > 0 && is_hidden(entry.path())));

        for entry in walker {
            let entry = entry.map_err(|e| ConfigError::Walk {
                root: root.to_path_buf(),
                error: e,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let is_manifest = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(suffix) && name.len() > suffix.len());

            if is_manifest {
                manifests.push(self.load_manifest(entry.path(), suffix)?);
            }
        }

        Ok(manifests)
    }

    /// Find the workspace configuration by walking up the directory tree
    ///
    /// Without a stanza.toml anywhere above, `start_dir` becomes the root and
    /// defaults apply.
    fn find_workspace_config(&self, start_dir: &Path) -> ConfigResult<(PathBuf, WorkspaceConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(WORKSPACE_FILE);

            if config_path.exists() {
                let config = WorkspaceConfig::load_from_file(&config_path)?;
                return Ok((current, config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((start_dir.to_path_buf(), WorkspaceConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Recognized: STANZA_PARALLEL, STANZA_TEST_RUNNER_PREFIX
    fn apply_env_overrides(&self, mut config: WorkspaceConfig) -> ConfigResult<WorkspaceConfig> {
        if let Ok(parallel) = env::var("STANZA_PARALLEL") {
            config.build.parallel = match parallel.to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "STANZA_PARALLEL".to_string(),
                        reason: format!("expected a boolean, got '{}'", other),
                    })
                }
            };
        }

        if let Ok(prefix) = env::var("STANZA_TEST_RUNNER_PREFIX") {
            config.build.test_runner_prefix = prefix;
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Total number of targets across all manifests
    pub fn target_count(&self) -> usize {
        self.manifests.iter().map(|m| m.manifest.targets.len()).sum()
    }

    /// Find a loaded manifest by package name
    pub fn manifest(&self, package: &str) -> Option<&LoadedManifest> {
        self.manifests.iter().find(|m| m.package == package)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_find_workspace_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "stanza.toml", "[build]\nparallel = true\n");
        let sub_dir = temp_dir.path().join("modules/sub");
        fs::create_dir_all(&sub_dir).unwrap();

        let loader = ConfigLoader::new();
        let (root, config) = loader.find_workspace_config(&sub_dir).unwrap();

        assert_eq!(root, temp_dir.path());
        assert!(config.build.parallel);
    }

    #[test]
    fn test_hidden_directories_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "stanza.toml", "");
        write(temp_dir.path(), "a/ALib.toml", "[A]\n");
        write(temp_dir.path(), ".cache/BLib.toml", "[B]\n");

        let workspace = ConfigLoader::new().load_workspace(temp_dir.path()).unwrap();
        assert_eq!(workspace.manifests.len(), 1);
        assert_eq!(workspace.manifests[0].package, "A");

        let workspace = ConfigLoader::new()
            .with_hidden(true)
            .load_workspace(temp_dir.path())
            .unwrap();
        assert_eq!(workspace.manifests.len(), 2);
    }

    #[test]
    fn test_target_names_need_not_match_file_name() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "stanza.toml", "");
        write(temp_dir.path(), "wdbase/CoastWDBaseLib.toml", "[WDBase]\n[WDBaseTools]\n");

        let workspace = ConfigLoader::new().load_workspace(temp_dir.path()).unwrap();

        let manifest = workspace.manifest("CoastWDBase").unwrap();
        let targets: Vec<&str> = manifest.manifest.targets.keys().map(String::as_str).collect();
        assert_eq!(targets, vec!["WDBase", "WDBaseTools"]);
        assert!(workspace.manifest("WDBase").is_none());
    }

    #[test]
    #[serial]
    fn test_env_override_parallel() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "stanza.toml", "[build]\nparallel = false\n");

        env::set_var("STANZA_PARALLEL", "yes");
        let workspace = ConfigLoader::new().load_workspace(temp_dir.path());
        env::remove_var("STANZA_PARALLEL");

        assert!(workspace.unwrap().config.build.parallel);
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_bool() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "stanza.toml", "");

        env::set_var("STANZA_PARALLEL", "sometimes");
        let result = ConfigLoader::new().load_workspace(temp_dir.path());
        env::remove_var("STANZA_PARALLEL");

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    #[serial]
    fn test_env_override_test_runner_prefix() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "stanza.toml", "");

        env::set_var("STANZA_TEST_RUNNER_PREFIX", "cute");
        let workspace = ConfigLoader::new().load_workspace(temp_dir.path());
        env::remove_var("STANZA_TEST_RUNNER_PREFIX");

        assert_eq!(workspace.unwrap().config.build.test_runner_prefix, "cute");
    }
}
