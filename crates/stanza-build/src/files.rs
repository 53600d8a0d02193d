//! File listing collaborators
//!
//! Glob expansion is deterministic: candidates are visited in sorted order,
//! each pattern contributes its matches in that order, and a file matched by
//! several patterns is reported once, at its first match. Leading `../`
//! components of a pattern step out of the package directory.

use glob::{MatchOptions, Pattern};
use indexmap::{IndexMap, IndexSet};
use stanza_config::FileSelector;
use std::collections::BTreeSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Expands file patterns relative to a package directory
pub trait FileLister: Send + Sync {
    /// Files below `root` matching any of `patterns`
    fn list_files(&self, root: &Path, patterns: &[String]) -> io::Result<Vec<PathBuf>>;

    /// Files below each of `dirs` (relative to `root`) ending in one of `extensions`
    fn find_files(
        &self,
        root: &Path,
        dirs: &[String],
        extensions: &[String],
    ) -> io::Result<Vec<PathBuf>>;

    /// Expand a manifest file selector
    fn select(&self, root: &Path, selector: &FileSelector) -> io::Result<Vec<PathBuf>> {
        match selector {
            FileSelector::Patterns { patterns } => self.list_files(root, patterns),
            FileSelector::Find { find } => self.find_files(root, &find.dirs, &find.extensions),
        }
    }
}

/// Lists files on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl FsLister {
    pub fn new() -> Self {
        Self
    }

    fn walk(dir: &Path) -> io::Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

impl FileLister for FsLister {
    fn list_files(&self, root: &Path, patterns: &[String]) -> io::Result<Vec<PathBuf>> {
        match_patterns(root, patterns, Self::walk)
    }

    fn find_files(
        &self,
        root: &Path,
        dirs: &[String],
        extensions: &[String],
    ) -> io::Result<Vec<PathBuf>> {
        let mut found = IndexSet::new();
        for dir in dirs {
            let base = search_dir(root, dir);
            for file in Self::walk(&base)? {
                if has_extension(&file, extensions) {
                    found.insert(file);
                }
            }
        }
        Ok(found.into_iter().collect())
    }
}

/// Lists files from a fixed in-memory set
///
/// Paths are stored as given; patterns match against the part below `root`.
#[derive(Debug, Clone, Default)]
pub struct MemoryLister {
    files: BTreeSet<PathBuf>,
}

impl MemoryLister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add files to the set
    pub fn with_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }

    /// Number of files in the set
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileLister for MemoryLister {
    fn list_files(&self, root: &Path, patterns: &[String]) -> io::Result<Vec<PathBuf>> {
        match_patterns(root, patterns, |_| Ok(self.files.iter().cloned().collect()))
    }

    fn find_files(
        &self,
        root: &Path,
        dirs: &[String],
        extensions: &[String],
    ) -> io::Result<Vec<PathBuf>> {
        let mut found = IndexSet::new();
        for dir in dirs {
            let base = search_dir(root, dir);
            for file in &self.files {
                if file.starts_with(&base) && has_extension(file, extensions) {
                    found.insert(file.clone());
                }
            }
        }
        Ok(found.into_iter().collect())
    }
}

fn match_patterns<F>(root: &Path, patterns: &[String], candidates: F) -> io::Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> io::Result<Vec<PathBuf>>,
{
    let mut listed: IndexMap<PathBuf, Vec<PathBuf>> = IndexMap::new();
    let mut matched = IndexSet::new();

    for text in patterns {
        let (base, rest) = split_pattern(root, text);
        let pattern = Pattern::new(rest).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid pattern '{}': {}", text, e),
            )
        })?;

        if !listed.contains_key(&base) {
            let files = candidates(&base)?;
            listed.insert(base.clone(), files);
        }

        for candidate in &listed[&base] {
            let Ok(relative) = candidate.strip_prefix(&base) else {
                continue;
            };
            if pattern.matches_path_with(relative, MATCH_OPTIONS) {
                matched.insert(candidate.clone());
            }
        }
    }

    Ok(matched.into_iter().collect())
}

/// Directory a pattern is matched in, and the pattern below it
fn split_pattern<'p>(root: &Path, text: &'p str) -> (PathBuf, &'p str) {
    let mut base = root.to_path_buf();
    let mut rest = text;
    while let Some(stripped) = rest.strip_prefix("../") {
        match base.components().next_back() {
            Some(Component::Normal(_)) => {
                base.pop();
            }
            _ => base.push(".."),
        }
        rest = stripped;
    }
    (base, rest)
}

fn search_dir(root: &Path, dir: &str) -> PathBuf {
    if dir.is_empty() || dir == "." {
        root.to_path_buf()
    } else {
        root.join(dir)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    extensions.iter().any(|ext| {
        if ext.starts_with('.') {
            name.ends_with(ext.as_str())
        } else {
            name.ends_with(&format!(".{}", ext))
        }
    })
}
