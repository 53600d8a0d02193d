//! Descriptor loading
//!
//! Converts the manifests of a loaded workspace into [`PackageDescriptor`]s
//! and wires a [`Project`] that can run the whole pipeline on disk.

use crate::descriptor::{AuxiliaryRule, PackageDescriptor, TargetType};
use crate::environment::BaseEnvironment;
use crate::error::{BuildError, BuildResult};
use crate::files::{FileLister, FsLister};
use crate::orchestrator::{Orchestrator, OrchestratorConfig, Report};
use crate::registry::Registry;
use stanza_config::{ConfigLoader, LoadedManifest, TargetSettings, Workspace};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Builds descriptors from manifests
pub struct DescriptorLoader<'l> {
    lister: &'l dyn FileLister,
}

impl<'l> DescriptorLoader<'l> {
    /// Create a loader expanding public header globs through `lister`
    pub fn new(lister: &'l dyn FileLister) -> Self {
        Self { lister }
    }

    /// Descriptors of every target in the workspace, in declaration order
    ///
    /// Manifests are taken in discovery order and targets in file order.
    pub fn load(&self, workspace: &Workspace) -> BuildResult<Vec<PackageDescriptor>> {
        let mut descriptors = Vec::with_capacity(workspace.target_count());
        for manifest in &workspace.manifests {
            descriptors.extend(self.from_manifest(manifest)?);
        }
        Ok(descriptors)
    }

    /// Descriptors of the targets in one manifest
    pub fn from_manifest(&self, manifest: &LoadedManifest) -> BuildResult<Vec<PackageDescriptor>> {
        manifest
            .manifest
            .targets
            .iter()
            .map(|(name, settings)| self.descriptor(name, &manifest.dir, settings))
            .collect()
    }

    /// Descriptor of a single target rooted at `dir`
    pub fn descriptor(
        &self,
        name: &str,
        dir: &Path,
        settings: &TargetSettings,
    ) -> BuildResult<PackageDescriptor> {
        let include_dir = match settings.effective_include_subdir() {
            "" => dir.to_path_buf(),
            subdir => dir.join(subdir),
        };

        let public_includes = self.public_includes(dir, &settings.public.includes)?;

        let mut descriptor = PackageDescriptor::new(name, TargetType::from(settings.target_type))
            .with_root(dir)
            .with_sources(settings.source_files.iter().cloned())
            .with_dependencies(settings.link_dependencies.iter().cloned())
            .with_include_dir(include_dir)
            .with_public_includes(public_includes)
            .with_public_defines(settings.public.append_unique.cppdefines.iter().cloned())
            .with_private_defines(settings.append_unique.cppdefines.iter().cloned())
            .with_lazy_linking(settings.lazy_linking)
            .with_config_files(settings.config_files.iter().cloned());

        for copy in &settings.copy_files {
            descriptor = descriptor.with_auxiliary(AuxiliaryRule {
                selector: copy.selector.clone(),
                mode: copy.mode,
            });
        }

        debug!(
            package = %descriptor.name,
            target_type = %descriptor.target_type,
            dependencies = descriptor.link_dependencies.len(),
            "loaded descriptor"
        );
        Ok(descriptor)
    }

    /// Expand header globs; literal paths are kept even if absent
    fn public_includes(&self, dir: &Path, patterns: &[String]) -> BuildResult<Vec<PathBuf>> {
        let mut includes = Vec::new();
        for pattern in patterns {
            if pattern.contains(['*', '?', '[']) {
                let matched = self
                    .lister
                    .list_files(dir, std::slice::from_ref(pattern))
                    .map_err(|e| BuildError::io(dir, e))?;
                includes.extend(matched);
            } else {
                includes.push(dir.join(pattern));
            }
        }
        Ok(includes)
    }
}

/// A workspace loaded from disk, ready to orchestrate
pub struct Project {
    pub workspace: Workspace,
    pub descriptors: Vec<PackageDescriptor>,
    pub environment: BaseEnvironment,
}

impl Project {
    /// Load the workspace containing `start_dir`
    pub fn load(start_dir: &Path) -> BuildResult<Self> {
        let workspace = ConfigLoader::new().load_workspace(start_dir)?;
        let descriptors = DescriptorLoader::new(&FsLister).load(&workspace)?;
        let environment = BaseEnvironment::from_config(&workspace.config.environment);

        info!(
            root = %workspace.root.display(),
            manifests = workspace.manifests.len(),
            packages = descriptors.len(),
            "loaded workspace"
        );

        Ok(Self {
            workspace,
            descriptors,
            environment,
        })
    }

    /// Orchestrator configured from the workspace's `[build]` section
    pub fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(&self.environment, &FsLister)
            .with_config(OrchestratorConfig::from(&self.workspace.config.build))
    }

    /// Run the pipeline with the workspace configuration
    pub fn run(&self, registry: &mut Registry) -> BuildResult<Report> {
        self.orchestrator().run(&self.descriptors, registry)
    }
}
