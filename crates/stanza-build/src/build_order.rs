//! Build order computation for packages using depth-first topological sort
use crate::descriptor::PackageDescriptor;
use crate::error::{BuildError, BuildResult};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Dependency graph over a set of package descriptors
///
/// Nodes keep declaration order; edges point from a package to its link
/// dependencies. The graph borrows the descriptors and is discarded once an
/// order has been produced.
#[derive(Debug, Clone)]
pub struct DependencyGraph<'a> {
    /// Packages in declaration order
    packages: Vec<&'a PackageDescriptor>,
    /// Package name -> declaration index
    index: HashMap<&'a str, usize>,
}

impl<'a> DependencyGraph<'a> {
    /// Create a graph from descriptors in declaration order
    ///
    /// Fails if a package name is declared twice.
    pub fn new(descriptors: &'a [PackageDescriptor]) -> BuildResult<Self> {
        let mut index = HashMap::with_capacity(descriptors.len());
        for (position, descriptor) in descriptors.iter().enumerate() {
            if index.insert(descriptor.name.as_str(), position).is_some() {
                return Err(BuildError::DuplicatePackage(descriptor.name.clone()));
            }
        }

        Ok(Self {
            packages: descriptors.iter().collect(),
            index,
        })
    }

    /// Get a package by name
    pub fn get(&self, name: &str) -> Option<&'a PackageDescriptor> {
        self.index.get(name).map(|&i| self.packages[i])
    }

    /// Get package count
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Check that every dependency names a known package
    pub fn validate(&self) -> BuildResult<()> {
        for package in &self.packages {
            for dep in &package.link_dependencies {
                if !self.index.contains_key(dep.as_str()) {
                    return Err(BuildError::unresolved(&package.name, dep));
                }
            }
        }
        Ok(())
    }

    /// Compute the build order: every package after all of its dependencies
    ///
    /// Packages without an ordering constraint between them keep their
    /// declaration order.
    pub fn resolve(&self) -> BuildResult<Vec<&'a PackageDescriptor>> {
        self.validate()?;

        let mut marks = vec![Mark::Unvisited; self.packages.len()];
        let mut order = Vec::with_capacity(self.packages.len());

        for start in 0..self.packages.len() {
            if marks[start] == Mark::Unvisited && !self.visit(start, &mut marks, &mut order) {
                let cycle = self
                    .shortest_cycle()
                    .unwrap_or_else(|| vec![self.packages[start].name.clone()]);
                return Err(BuildError::Cycle { cycle });
            }
        }

        Ok(order.into_iter().map(|i| self.packages[i]).collect())
    }

    /// Post-order DFS; returns false on a back edge
    fn visit(&self, node: usize, marks: &mut [Mark], order: &mut Vec<usize>) -> bool {
        marks[node] = Mark::Visiting;

        for dep in self.dependency_indices(node) {
            match marks[dep] {
                Mark::Visiting => return false,
                Mark::Unvisited => {
                    if !self.visit(dep, marks, order) {
                        return false;
                    }
                }
                Mark::Done => {}
            }
        }

        marks[node] = Mark::Done;
        order.push(node);
        true
    }

    fn dependency_indices(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.packages[node]
            .link_dependencies
            .iter()
            .filter_map(|dep| self.index.get(dep.as_str()).copied())
    }

    /// Find the shortest cycle in the graph (for error reporting)
    ///
    /// Searches breadth-first from every package in declaration order and
    /// keeps the first strictly shorter cycle, so the result starts at the
    /// earliest-declared member.
    fn shortest_cycle(&self) -> Option<Vec<String>> {
        let mut best: Option<Vec<usize>> = None;

        for start in 0..self.packages.len() {
            if let Some(cycle) = self.shortest_cycle_through(start) {
                if best.as_ref().map_or(true, |b| cycle.len() < b.len()) {
                    best = Some(cycle);
                }
            }
        }

        best.map(|cycle| {
            cycle
                .into_iter()
                .map(|i| self.packages[i].name.clone())
                .collect()
        })
    }

    /// BFS from `start` back to itself
    fn shortest_cycle_through(&self, start: usize) -> Option<Vec<usize>> {
        let mut parent: Vec<Option<usize>> = vec![None; self.packages.len()];
        let mut seen = vec![false; self.packages.len()];
        let mut queue = VecDeque::new();

        seen[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            for dep in self.dependency_indices(node) {
                if dep == start {
                    let mut cycle = vec![node];
                    let mut current = node;
                    while let Some(prev) = parent[current] {
                        cycle.push(prev);
                        current = prev;
                    }
                    cycle.reverse();
                    return Some(cycle);
                }
                if !seen[dep] {
                    seen[dep] = true;
                    parent[dep] = Some(node);
                    queue.push_back(dep);
                }
            }
        }

        None
    }

    /// Find packages that can be materialized in parallel
    ///
    /// Returns waves where each package's dependencies all sit in earlier
    /// waves. Within a wave, packages keep their build-order position.
    pub fn parallel_build_groups(&self) -> BuildResult<Vec<Vec<&'a PackageDescriptor>>> {
        let order = self.resolve()?;
        let mut level: HashMap<&str, usize> = HashMap::with_capacity(order.len());
        let mut groups: Vec<Vec<&'a PackageDescriptor>> = Vec::new();

        for package in order {
            let wave = package
                .link_dependencies
                .iter()
                .filter_map(|dep| level.get(dep.as_str()))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);

            level.insert(package.name.as_str(), wave);
            if groups.len() <= wave {
                groups.resize_with(wave + 1, Vec::new);
            }
            groups[wave].push(package);
        }

        Ok(groups)
    }
}

/// Resolve descriptors into build order in one step
pub fn resolve(descriptors: &[PackageDescriptor]) -> BuildResult<Vec<&PackageDescriptor>> {
    DependencyGraph::new(descriptors)?.resolve()
}
