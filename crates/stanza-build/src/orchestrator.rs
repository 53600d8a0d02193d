//! Orchestration pipeline
//!
//! resolve order -> propagate settings -> materialize -> register.
//!
//! Graph errors abort the run before anything is materialized. Package errors
//! are recorded in the [`Report`] and the run continues; dependents of a
//! failed package are still attempted and reported as degraded.

use crate::build_order::DependencyGraph;
use crate::descriptor::PackageDescriptor;
use crate::environment::EnvironmentFactory;
use crate::error::{BuildResult, PackageError};
use crate::files::FileLister;
use crate::materialize::{
    Materialized, MaterializerConfig, TargetMaterializer, DEFAULT_TEST_RUNNER_PREFIX,
};
use crate::propagate::{ResolvedEnvironments, SettingsPropagator};
use crate::registry::Registry;
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use serde::Serialize;
use stanza_config::BuildSection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Materialize independent packages on the rayon pool
    pub parallel: bool,
    /// Name prefix of test-runner packages; empty disables the check
    pub test_runner_prefix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            test_runner_prefix: DEFAULT_TEST_RUNNER_PREFIX.to_string(),
        }
    }
}

impl From<&BuildSection> for OrchestratorConfig {
    fn from(build: &BuildSection) -> Self {
        Self {
            parallel: build.parallel,
            test_runner_prefix: build.test_runner_prefix.clone(),
        }
    }
}

/// Shared flag asking a running orchestration to stop
///
/// The package being materialized finishes; nothing after it starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one orchestration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Registered packages, in build order
    pub succeeded: Vec<String>,
    /// Packages whose materialization failed
    pub failed: IndexMap<String, PackageError>,
    /// Packages built against a failed upstream, with the failed names
    pub degraded: IndexMap<String, Vec<String>>,
    /// Packages not attempted because the run was cancelled
    pub skipped: Vec<String>,
}

/// Outcome of a single package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<'r> {
    Succeeded,
    Failed(&'r PackageError),
    Skipped,
}

impl Report {
    /// Whether every package was registered
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Process exit code for the outer build invocation
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// What happened to `name`; `None` if it was not part of the run
    pub fn outcome(&self, name: &str) -> Option<Outcome<'_>> {
        if let Some(err) = self.failed.get(name) {
            Some(Outcome::Failed(err))
        } else if self.succeeded.iter().any(|n| n == name) {
            Some(Outcome::Succeeded)
        } else if self.skipped.iter().any(|n| n == name) {
            Some(Outcome::Skipped)
        } else {
            None
        }
    }

    /// Whether `name` was built against a failed upstream
    pub fn is_degraded(&self, name: &str) -> bool {
        self.degraded.contains_key(name)
    }

    fn record(
        &mut self,
        registry: &mut Registry,
        package: &PackageDescriptor,
        result: Result<Materialized, PackageError>,
    ) {
        let mut upstream = IndexSet::new();
        for dep in &package.link_dependencies {
            if self.failed.contains_key(dep) {
                upstream.insert(dep.clone());
            }
            if let Some(failed) = self.degraded.get(dep) {
                upstream.extend(failed.iter().cloned());
            }
        }
        if !upstream.is_empty() {
            let upstream: Vec<String> = upstream.into_iter().collect();
            warn!(
                package = %package.name,
                upstream = ?upstream,
                "dependency degraded, built with partial environment"
            );
            self.degraded.insert(package.name.clone(), upstream);
        }

        match result {
            Ok(materialized) => {
                registry.register(
                    package.name.clone(),
                    materialized.target,
                    materialized.auxiliary,
                );
                self.succeeded.push(package.name.clone());
            }
            Err(err) => {
                error!(package = %package.name, error = %err, "package failed");
                self.failed.insert(package.name.clone(), err);
            }
        }
    }
}

/// Drives the whole pipeline over a set of descriptors
pub struct Orchestrator<'a> {
    factory: &'a dyn EnvironmentFactory,
    lister: &'a dyn FileLister,
    config: OrchestratorConfig,
    cancel: CancelToken,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator with default configuration
    pub fn new(factory: &'a dyn EnvironmentFactory, lister: &'a dyn FileLister) -> Self {
        Self {
            factory,
            lister,
            config: OrchestratorConfig::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Observe `token` for cancellation requests
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this orchestrator
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the pipeline, registering results into `registry`
    ///
    /// Fails only on graph errors; package errors end up in the report.
    pub fn run(
        &self,
        descriptors: &[PackageDescriptor],
        registry: &mut Registry,
    ) -> BuildResult<Report> {
        info!(
            packages = descriptors.len(),
            parallel = self.config.parallel,
            "starting orchestration"
        );

        let graph = DependencyGraph::new(descriptors)?;
        let order = graph.resolve()?;
        let envs = SettingsPropagator::new(self.factory).propagate(&order)?;
        let materializer = TargetMaterializer::new(self.lister).with_config(MaterializerConfig {
            test_runner_prefix: self.config.test_runner_prefix.clone(),
        });

        let report = if self.config.parallel {
            self.run_parallel(&graph, &order, &envs, &materializer, registry)?
        } else {
            self.run_sequential(&order, &envs, &materializer, registry)
        };

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            degraded = report.degraded.len(),
            skipped = report.skipped.len(),
            "orchestration finished"
        );
        Ok(report)
    }

    fn run_sequential(
        &self,
        order: &[&PackageDescriptor],
        envs: &ResolvedEnvironments,
        materializer: &TargetMaterializer<'_>,
        registry: &mut Registry,
    ) -> Report {
        let mut report = Report::default();

        for (position, &package) in order.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.skipped = order[position..].iter().map(|p| p.name.clone()).collect();
                warn!(skipped = report.skipped.len(), "orchestration cancelled");
                break;
            }

            let result = materialize_one(materializer, package, envs);
            report.record(registry, package, result);
        }

        report
    }

    /// Materialize wave by wave on the rayon pool, then register in build order
    fn run_parallel(
        &self,
        graph: &DependencyGraph<'_>,
        order: &[&PackageDescriptor],
        envs: &ResolvedEnvironments,
        materializer: &TargetMaterializer<'_>,
        registry: &mut Registry,
    ) -> BuildResult<Report> {
        let waves = graph.parallel_build_groups()?;
        let mut results: HashMap<&str, Result<Materialized, PackageError>> =
            HashMap::with_capacity(order.len());

        for (index, wave) in waves.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(wave = index, "orchestration cancelled");
                break;
            }
            debug!(wave = index, packages = wave.len(), "materializing wave");

            let done: Vec<_> = wave
                .par_iter()
                .map(|&package| {
                    let result = materialize_one(materializer, package, envs);
                    (package.name.as_str(), result)
                })
                .collect();
            results.extend(done);
        }

        let mut report = Report::default();
        for &package in order {
            match results.remove(package.name.as_str()) {
                Some(result) => report.record(registry, package, result),
                None => report.skipped.push(package.name.clone()),
            }
        }
        Ok(report)
    }
}

fn materialize_one(
    materializer: &TargetMaterializer<'_>,
    package: &PackageDescriptor,
    envs: &ResolvedEnvironments,
) -> Result<Materialized, PackageError> {
    let env = envs.get(&package.name).ok_or_else(|| {
        PackageError::configuration(&package.name, "no resolved environment")
    })?;
    materializer.materialize(package, env)
}
