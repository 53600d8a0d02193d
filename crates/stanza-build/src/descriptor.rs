//! Package descriptors: the declared build settings of one package
use serde::{Deserialize, Serialize};
use stanza_config::{FileSelector, TargetTypeName};
use std::fmt;
use std::path::PathBuf;

/// What a package produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    /// Shared library other packages link against
    LibraryShared,
    /// Executable program
    Program,
    /// Executable test program
    ProgramTest,
    /// No compiled target, registration only
    None,
}

impl TargetType {
    /// Whether the package compiles sources
    pub fn is_compiled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether dependents may link against this package
    pub fn is_linkable(&self) -> bool {
        matches!(self, Self::LibraryShared | Self::None)
    }
}

impl From<Option<TargetTypeName>> for TargetType {
    fn from(name: Option<TargetTypeName>) -> Self {
        match name {
            Some(TargetTypeName::LibraryShared) => Self::LibraryShared,
            Some(TargetTypeName::Program) => Self::Program,
            Some(TargetTypeName::ProgramTest) => Self::ProgramTest,
            None => Self::None,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LibraryShared => write!(f, "shared library"),
            Self::Program => write!(f, "program"),
            Self::ProgramTest => write!(f, "test program"),
            Self::None => write!(f, "registration"),
        }
    }
}

/// A preprocessor definition, `NAME` or `NAME=VALUE`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Define {
    pub name: String,
    pub value: Option<String>,
}

impl Define {
    /// Parse `NAME` or `NAME=VALUE`
    pub fn parse(text: &str) -> Self {
        match text.split_once('=') {
            Some((name, value)) => Self {
                name: name.trim().to_string(),
                value: Some(value.trim().to_string()),
            },
            None => Self {
                name: text.trim().to_string(),
                value: None,
            },
        }
    }

    /// The implementation-export marker of a shared library
    ///
    /// `CoastEBCDIC` becomes `COASTEBCDIC_IMPL`; characters that cannot
    /// appear in a macro name become `_`.
    pub fn implementation_export(package: &str) -> Self {
        let upper: String = package
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        Self {
            name: format!("{}_IMPL", upper),
            value: None,
        }
    }
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Auxiliary files to register next to a target, with their permission bits
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryRule {
    pub selector: FileSelector,
    pub mode: u32,
}

impl AuxiliaryRule {
    /// Files matching glob patterns
    pub fn patterns<I, S>(patterns: I, mode: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selector: FileSelector::Patterns {
                patterns: patterns.into_iter().map(Into::into).collect(),
            },
            mode,
        }
    }
}

/// Declared build settings of one package
///
/// Immutable once loaded; every later stage reads it by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    /// Unique package name
    pub name: String,
    /// Package directory; patterns are resolved against it
    pub root: PathBuf,
    /// What the package produces
    pub target_type: TargetType,
    /// Source globs in declaration order
    pub source_files: Vec<String>,
    /// Packages this one links against, in declaration order
    pub link_dependencies: Vec<String>,
    /// Own include directory
    pub include_dir: Option<PathBuf>,
    /// Header paths exported to dependents
    pub public_includes: Vec<PathBuf>,
    /// Definitions exported to dependents
    pub public_defines: Vec<Define>,
    /// Definitions for this package's own compilation only
    pub private_defines: Vec<Define>,
    /// Resolve link symbols at load time
    pub lazy_linking: bool,
    /// Fixture files registered with the target
    pub auxiliary_artifacts: Vec<AuxiliaryRule>,
    /// Test configuration globs registered with the target
    pub config_files: Vec<String>,
}

impl PackageDescriptor {
    /// Create a new descriptor with no settings
    pub fn new(name: impl Into<String>, target_type: TargetType) -> Self {
        Self {
            name: name.into(),
            root: PathBuf::new(),
            target_type,
            source_files: Vec::new(),
            link_dependencies: Vec::new(),
            include_dir: None,
            public_includes: Vec::new(),
            public_defines: Vec::new(),
            private_defines: Vec::new(),
            lazy_linking: false,
            auxiliary_artifacts: Vec::new(),
            config_files: Vec::new(),
        }
    }

    /// Set the package directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set source globs
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_files = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Set link dependencies
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.link_dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Set the own include directory
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dir = Some(dir.into());
        self
    }

    /// Set exported header paths
    pub fn with_public_includes<I, P>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.public_includes = includes.into_iter().map(Into::into).collect();
        self
    }

    /// Set exported definitions
    pub fn with_public_defines<I, S>(mut self, defines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.public_defines = defines.into_iter().map(|d| Define::parse(d.as_ref())).collect();
        self
    }

    /// Set private definitions
    pub fn with_private_defines<I, S>(mut self, defines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.private_defines = defines.into_iter().map(|d| Define::parse(d.as_ref())).collect();
        self
    }

    /// Enable/disable lazy linking
    pub fn with_lazy_linking(mut self, lazy: bool) -> Self {
        self.lazy_linking = lazy;
        self
    }

    /// Add an auxiliary artifact rule
    pub fn with_auxiliary(mut self, rule: AuxiliaryRule) -> Self {
        self.auxiliary_artifacts.push(rule);
        self
    }

    /// Set test configuration globs
    pub fn with_config_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this descriptor only registers auxiliary files
    pub fn is_registration_only(&self) -> bool {
        !self.target_type.is_compiled()
    }
}
