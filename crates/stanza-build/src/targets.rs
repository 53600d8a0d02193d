//! Build target types produced by materialization

use crate::descriptor::TargetType;
use crate::environment::Environment;
use serde::Serialize;
use std::path::PathBuf;

/// Kind of compiled target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Shared library
    SharedLibrary,
    /// Executable program
    Program,
    /// Executable test program, registered as a test entry point
    TestProgram,
}

impl TargetKind {
    /// Kind produced by a package target type; `None` compiles nothing
    pub fn from_target_type(target_type: TargetType) -> Option<Self> {
        match target_type {
            TargetType::LibraryShared => Some(Self::SharedLibrary),
            TargetType::Program => Some(Self::Program),
            TargetType::ProgramTest => Some(Self::TestProgram),
            TargetType::None => None,
        }
    }

    /// Whether the test-registration subsystem picks this target up
    pub fn is_test_entry(&self) -> bool {
        matches!(self, Self::TestProgram)
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedLibrary => write!(f, "shared library"),
            Self::Program => write!(f, "program"),
            Self::TestProgram => write!(f, "test program"),
        }
    }
}

/// When a link dependency's symbols are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// Resolved by the linker
    BuildTime,
    /// Resolved by the loader (lazy linking)
    RunTime,
}

/// A library the target links against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkDependency {
    pub name: String,
    pub mode: LinkMode,
}

/// A materialized build target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    /// Target name (the package name)
    pub name: String,
    /// Target kind
    pub kind: TargetKind,
    /// Expanded source files
    pub sources: Vec<PathBuf>,
    /// Final compile environment
    pub environment: Environment,
    /// Libraries to link, in link order
    pub link_order: Vec<LinkDependency>,
}

impl BuildTarget {
    /// Create a new build target
    pub fn new(name: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            sources: Vec::new(),
            environment: Environment::new(),
            link_order: Vec::new(),
        }
    }

    /// Set source files
    pub fn with_sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.sources = sources;
        self
    }

    /// Set the compile environment
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Set the link order
    pub fn with_link_order(mut self, link_order: Vec<LinkDependency>) -> Self {
        self.link_order = link_order;
        self
    }

    /// Whether every link dependency is resolved at load time
    pub fn is_lazily_linked(&self) -> bool {
        !self.link_order.is_empty() && self.link_order.iter().all(|l| l.mode == LinkMode::RunTime)
    }
}
