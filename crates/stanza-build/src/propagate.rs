//! Transitive propagation of public build settings
//!
//! Packages are processed in build order. Each one starts from a fresh copy
//! of the base environment, adds its own settings, then merges the exports
//! of its direct dependencies in `linkDependencies` order. A dependency's
//! exports already contain everything it inherited, which is what makes
//! propagation transitive. A package's own definitions are re-applied last,
//! so an inherited value never replaces one the package sets itself.

use crate::descriptor::{PackageDescriptor, TargetType};
use crate::environment::{Environment, EnvironmentFactory};
use crate::error::{BuildError, BuildResult};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

/// Fully resolved settings of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEnvironment {
    /// Package the environment belongs to
    pub package: String,
    /// What the package produces
    pub target_type: TargetType,
    /// Settings used to compile and link the package itself
    pub compile: Environment,
    /// Settings handed to packages that depend on this one
    pub exports: Environment,
    /// Direct dependencies merged into `compile`, in order
    pub dependencies: Vec<ResolvedDependency>,
}

/// A direct dependency as seen from its dependent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
    pub name: String,
    pub target_type: TargetType,
}

impl ResolvedEnvironment {
    /// Libraries the package links against
    pub fn link_libraries(&self) -> impl Iterator<Item = &str> {
        self.compile.libraries.iter().map(String::as_str)
    }

    /// A direct dependency by name
    pub fn dependency(&self, name: &str) -> Option<&ResolvedDependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }
}

/// Resolved environments keyed by package name, in build order
pub type ResolvedEnvironments = IndexMap<String, ResolvedEnvironment>;

/// Merges public settings along dependency edges
pub struct SettingsPropagator<'f> {
    factory: &'f dyn EnvironmentFactory,
}

impl<'f> SettingsPropagator<'f> {
    /// Create a propagator drawing base environments from `factory`
    pub fn new(factory: &'f dyn EnvironmentFactory) -> Self {
        Self { factory }
    }

    /// Resolve the environment of every package in `order`
    ///
    /// `order` must list dependencies before dependents; a dependency that
    /// has not been resolved yet is reported as [`BuildError::OutOfOrder`].
    pub fn propagate(&self, order: &[&PackageDescriptor]) -> BuildResult<ResolvedEnvironments> {
        let mut resolved = ResolvedEnvironments::with_capacity(order.len());

        for &package in order {
            let env = self.resolve_one(package, &resolved)?;
            debug!(
                package = %package.name,
                includes = env.compile.include_paths.len(),
                defines = env.compile.defines.len(),
                libraries = env.compile.libraries.len(),
                "resolved environment"
            );
            resolved.insert(package.name.clone(), env);
        }

        Ok(resolved)
    }

    fn resolve_one(
        &self,
        package: &PackageDescriptor,
        resolved: &ResolvedEnvironments,
    ) -> BuildResult<ResolvedEnvironment> {
        let own_public = own_public_settings(package);

        let mut compile = self.factory.for_package(package);
        if let Some(dir) = &package.include_dir {
            compile = compile.with_include(dir.clone());
        }
        compile = compile
            .with_defines(&package.private_defines)
            .merged(&own_public);

        let mut exports = own_public;
        if package.target_type == TargetType::LibraryShared {
            exports = exports.with_library(package.name.as_str());
        }

        let mut dependencies = Vec::with_capacity(package.link_dependencies.len());
        for dep in &package.link_dependencies {
            let dep_env = resolved.get(dep).ok_or_else(|| BuildError::OutOfOrder {
                package: package.name.clone(),
                dependency: dep.clone(),
            })?;
            compile = compile.merged(&dep_env.exports);
            exports = exports.merged(&dep_env.exports);
            dependencies.push(ResolvedDependency {
                name: dep.clone(),
                target_type: dep_env.target_type,
            });
        }

        // values change, first insertion positions stay
        compile = compile
            .with_defines(&package.private_defines)
            .with_defines(&package.public_defines);
        exports = exports.with_defines(&package.public_defines);

        Ok(ResolvedEnvironment {
            package: package.name.clone(),
            target_type: package.target_type,
            compile,
            exports,
            dependencies,
        })
    }
}

/// Settings a package publishes about itself
fn own_public_settings(package: &PackageDescriptor) -> Environment {
    let mut public = Environment::new();
    if !package.public_includes.is_empty() {
        if let Some(dir) = &package.include_dir {
            public = public.with_include(dir.clone());
        }
    }
    let public = package
        .public_includes
        .iter()
        .fold(public, |env, include| env.with_include(include.clone()));
    public.with_defines(&package.public_defines)
}
