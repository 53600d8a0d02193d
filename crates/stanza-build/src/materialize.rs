//! Target materialization
//!
//! Turns a descriptor plus its resolved environment into a concrete build
//! target. Nothing here touches shared state; the same inputs always yield
//! the same target, which is what allows materialization to run in parallel.

use crate::descriptor::{Define, PackageDescriptor, TargetType};
use crate::error::PackageError;
use crate::files::FileLister;
use crate::propagate::ResolvedEnvironment;
use crate::registry::{ArtifactKind, AuxiliaryArtifact};
use crate::targets::{BuildTarget, LinkDependency, LinkMode, TargetKind};
use indexmap::IndexSet;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Default prefix identifying test-runner packages
pub const DEFAULT_TEST_RUNNER_PREFIX: &str = "testfw";

/// Materializer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializerConfig {
    /// Test programs must depend on a package whose name starts with this;
    /// empty disables the check
    pub test_runner_prefix: String,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            test_runner_prefix: DEFAULT_TEST_RUNNER_PREFIX.to_string(),
        }
    }
}

/// Output of materializing one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// The compiled target; `None` for registration-only packages
    pub target: Option<BuildTarget>,
    /// Fixture and configuration files registered with the package
    pub auxiliary: Vec<AuxiliaryArtifact>,
}

/// Builds concrete targets from descriptors
pub struct TargetMaterializer<'l> {
    lister: &'l dyn FileLister,
    config: MaterializerConfig,
}

impl<'l> TargetMaterializer<'l> {
    /// Create a materializer listing files through `lister`
    pub fn new(lister: &'l dyn FileLister) -> Self {
        Self {
            lister,
            config: MaterializerConfig::default(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: MaterializerConfig) -> Self {
        self.config = config;
        self
    }

    /// Materialize one package
    ///
    /// `env` must be the resolved environment of `descriptor`.
    pub fn materialize(
        &self,
        descriptor: &PackageDescriptor,
        env: &ResolvedEnvironment,
    ) -> Result<Materialized, PackageError> {
        self.check_dependencies(descriptor, env)?;
        if descriptor.target_type == TargetType::ProgramTest {
            self.check_test_runner(descriptor, env)?;
        }

        let auxiliary = self.expand_auxiliary(descriptor)?;

        let Some(kind) = TargetKind::from_target_type(descriptor.target_type) else {
            debug!(package = %descriptor.name, "registration-only package");
            return Ok(Materialized {
                target: None,
                auxiliary,
            });
        };

        let sources = self.expand_sources(descriptor)?;

        let mut environment = env.compile.clone();
        if kind == TargetKind::SharedLibrary {
            environment = environment.with_define(&Define::implementation_export(&descriptor.name));
        }

        let mode = if descriptor.lazy_linking {
            LinkMode::RunTime
        } else {
            LinkMode::BuildTime
        };
        let link_order = env
            .link_libraries()
            .map(|name| LinkDependency {
                name: name.to_string(),
                mode,
            })
            .collect();

        debug!(
            package = %descriptor.name,
            kind = %kind,
            sources = sources.len(),
            "materialized target"
        );

        let target = BuildTarget::new(descriptor.name.clone(), kind)
            .with_sources(sources)
            .with_environment(environment)
            .with_link_order(link_order);

        Ok(Materialized {
            target: Some(target),
            auxiliary,
        })
    }

    fn check_dependencies(
        &self,
        descriptor: &PackageDescriptor,
        env: &ResolvedEnvironment,
    ) -> Result<(), PackageError> {
        for name in &descriptor.link_dependencies {
            let dep = env.dependency(name).ok_or_else(|| {
                PackageError::configuration(
                    &descriptor.name,
                    format!("dependency '{}' is missing from the resolved environment", name),
                )
            })?;
            if !dep.target_type.is_linkable() {
                return Err(PackageError::configuration(
                    &descriptor.name,
                    format!("cannot link against {} '{}'", dep.target_type, name),
                ));
            }
        }
        Ok(())
    }

    /// Test programs need a test runner among their dependencies
    ///
    /// Direct dependencies are checked by name, transitive ones through the
    /// link libraries they contributed.
    fn check_test_runner(
        &self,
        descriptor: &PackageDescriptor,
        env: &ResolvedEnvironment,
    ) -> Result<(), PackageError> {
        let prefix = self.config.test_runner_prefix.as_str();
        if prefix.is_empty() {
            return Ok(());
        }

        let direct = env.dependencies.iter().map(|d| d.name.as_str());
        let has_runner = direct
            .chain(env.link_libraries())
            .any(|name| name.starts_with(prefix));

        if has_runner {
            Ok(())
        } else {
            Err(PackageError::configuration(
                &descriptor.name,
                format!("test program does not depend on a '{}' test runner", prefix),
            ))
        }
    }

    /// Expand source globs; each literal path must exist and the globs
    /// together must match at least one file
    fn expand_sources(&self, descriptor: &PackageDescriptor) -> Result<Vec<PathBuf>, PackageError> {
        let mut sources = IndexSet::new();
        let mut missing = Vec::new();

        for pattern in &descriptor.source_files {
            let matched = self
                .lister
                .list_files(&descriptor.root, std::slice::from_ref(pattern))
                .map_err(|e| PackageError::file_listing(&descriptor.name, e))?;
            if matched.is_empty() && !is_glob(pattern) {
                missing.push(pattern.clone());
            }
            sources.extend(matched);
        }

        if !missing.is_empty() {
            return Err(PackageError::EmptyTarget {
                package: descriptor.name.clone(),
                patterns: missing,
            });
        }
        if sources.is_empty() {
            return Err(PackageError::EmptyTarget {
                package: descriptor.name.clone(),
                patterns: descriptor.source_files.clone(),
            });
        }

        Ok(sources.into_iter().collect())
    }

    fn expand_auxiliary(
        &self,
        descriptor: &PackageDescriptor,
    ) -> Result<Vec<AuxiliaryArtifact>, PackageError> {
        let mut artifacts = Vec::new();

        for rule in &descriptor.auxiliary_artifacts {
            let files = self
                .lister
                .select(&descriptor.root, &rule.selector)
                .map_err(|e| PackageError::file_listing(&descriptor.name, e))?;
            if files.is_empty() {
                warn!(package = %descriptor.name, "copy rule matched no files");
            }
            artifacts.extend(files.into_iter().map(|path| AuxiliaryArtifact {
                path,
                mode: Some(rule.mode),
                kind: ArtifactKind::Fixture,
            }));
        }

        if !descriptor.config_files.is_empty() {
            let files = self
                .lister
                .list_files(&descriptor.root, &descriptor.config_files)
                .map_err(|e| PackageError::file_listing(&descriptor.name, e))?;
            if files.is_empty() {
                warn!(package = %descriptor.name, "config file patterns matched no files");
            }
            artifacts.extend(files.into_iter().map(|path| AuxiliaryArtifact {
                path,
                mode: None,
                kind: ArtifactKind::Config,
            }));
        }

        Ok(artifacts)
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}
