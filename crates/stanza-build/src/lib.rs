//! Stanza build orchestration
//!
//! Turns a set of declared packages into an ordered, fully configured set of
//! build targets:
//! - Dependency resolution with cycle detection
//! - Transitive propagation of public include paths, definitions and link libraries
//! - Target materialization (shared libraries, programs, test programs)
//! - Registration of targets and their fixture/config files
//! - Per-package failure isolation and reporting
//!
//! Compilation itself is left to the external build engine that reads the
//! [`Registry`].

pub mod build_order;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod files;
pub mod loader;
pub mod materialize;
pub mod orchestrator;
pub mod propagate;
pub mod registry;
pub mod targets;

// Re-export main types
pub use build_order::{resolve, DependencyGraph};
pub use descriptor::{AuxiliaryRule, Define, PackageDescriptor, TargetType};
pub use environment::{BaseEnvironment, Environment, EnvironmentFactory};
pub use error::{BuildError, BuildResult, PackageError};
pub use files::{FileLister, FsLister, MemoryLister};
pub use loader::{DescriptorLoader, Project};
pub use materialize::{Materialized, MaterializerConfig, TargetMaterializer};
pub use orchestrator::{CancelToken, Orchestrator, OrchestratorConfig, Outcome, Report};
pub use propagate::{ResolvedDependency, ResolvedEnvironment, ResolvedEnvironments, SettingsPropagator};
pub use registry::{ArtifactKind, AuxiliaryArtifact, Registry, RegistryEntry};
pub use targets::{BuildTarget, LinkDependency, LinkMode, TargetKind};

// Re-export stanza-config types for convenience
pub use stanza_config::{ConfigLoader, Workspace};
