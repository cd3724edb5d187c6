//! core::graph
//!
//! Dependency graph representation and traversals.
//!
//! # Architecture
//!
//! The dependency graph is a directed graph where:
//! - Nodes are declared modules (anonymous modules are not nodes)
//! - Edges point from a dependent to each of its dependencies
//! - Roots are declared modules nothing depends on
//!
//! Unlike a stack graph, cycles are representable. Deferred finalization
//! can legitimately break a cycle at runtime, so the graph reports cycles
//! instead of refusing them.
//!
//! # Invariants
//!
//! - Nodes and edges are append-only
//! - Every traversal terminates, even on cyclic graphs
//! - Traversal order is deterministic (declaration order of edges)

use std::collections::{BTreeMap, HashMap, HashSet};

use super::types::ModuleName;

/// The declared-module graph.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Dependencies of each declared module, in declaration order
    edges: HashMap<ModuleName, Vec<ModuleName>>,
    /// Number of modules (named or anonymous) depending on each name
    dependent_counts: HashMap<ModuleName, usize>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declared module and its dependencies.
    ///
    /// `name` is `None` for anonymous modules: their dependencies still
    /// count as depended-upon, but the module itself is not a node.
    pub fn add_module(&mut self, name: Option<&ModuleName>, dependencies: &[ModuleName]) {
        for dependency in dependencies {
            *self.dependent_counts.entry(dependency.clone()).or_default() += 1;
        }
        if let Some(name) = name {
            self.edges.insert(name.clone(), dependencies.to_vec());
        }
    }

    /// Whether `name` was declared.
    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Get the dependencies of a declared module.
    pub fn dependencies(&self, name: &str) -> Option<&[ModuleName]> {
        self.edges.get(name).map(Vec::as_slice)
    }

    /// Number of modules depending on `name`.
    pub fn dependent_count(&self, name: &str) -> usize {
        self.dependent_counts.get(name).copied().unwrap_or(0)
    }

    /// Get all declared modules.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleName> {
        self.edges.keys()
    }

    /// Find a cycle that passes through `origin`.
    ///
    /// Walks depth-first from `origin`'s dependencies. If the walk comes
    /// back to `origin`, returns the path `origin -> ... -> origin`.
    /// Branches already fully explored are not entered again, so cycles
    /// elsewhere in the graph do not trap the walk.
    ///
    /// # Example
    ///
    /// ```
    /// use wireloom::core::graph::DependencyGraph;
    /// use wireloom::core::naming::NameResolver;
    ///
    /// let r = NameResolver::default();
    /// let a = r.module_name("a").unwrap();
    /// let b = r.module_name("b").unwrap();
    ///
    /// let mut graph = DependencyGraph::new();
    /// graph.add_module(Some(&b), &[a.clone()]);
    /// graph.add_module(Some(&a), &[b.clone()]);
    ///
    /// let cycle = graph.find_cycle_through(&a).unwrap();
    /// assert_eq!(cycle, vec![a.clone(), b, a]);
    /// ```
    pub fn find_cycle_through(&self, origin: &ModuleName) -> Option<Vec<ModuleName>> {
        let mut path = vec![origin.clone()];
        let mut explored = HashSet::new();
        explored.insert(origin.clone());

        if self.cycle_walk(origin, origin, &mut path, &mut explored) {
            path.push(origin.clone());
            Some(path)
        } else {
            None
        }
    }

    fn cycle_walk(
        &self,
        origin: &ModuleName,
        current: &ModuleName,
        path: &mut Vec<ModuleName>,
        explored: &mut HashSet<ModuleName>,
    ) -> bool {
        let Some(dependencies) = self.edges.get(current) else {
            return false;
        };

        for dependency in dependencies {
            if dependency == origin {
                return true;
            }
            if !explored.insert(dependency.clone()) {
                continue;
            }
            path.push(dependency.clone());
            if self.cycle_walk(origin, dependency, path, explored) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Compute the load order of the subtree rooted at `root`.
    ///
    /// Post-order depth-first traversal: every dependency appears before
    /// its dependents and `root` comes last. Undeclared dependencies are
    /// skipped. Returns an empty list if `root` is not declared.
    ///
    /// # Example
    ///
    /// ```
    /// use wireloom::core::graph::DependencyGraph;
    /// use wireloom::core::naming::NameResolver;
    ///
    /// let r = NameResolver::default();
    /// let app = r.module_name("app").unwrap();
    /// let db = r.module_name("db").unwrap();
    /// let log = r.module_name("log").unwrap();
    ///
    /// let mut graph = DependencyGraph::new();
    /// graph.add_module(Some(&app), &[db.clone(), log.clone()]);
    /// graph.add_module(Some(&db), &[log.clone()]);
    /// graph.add_module(Some(&log), &[]);
    ///
    /// assert_eq!(graph.load_order(app.as_str()), vec![log, db, app]);
    /// ```
    pub fn load_order(&self, root: &str) -> Vec<ModuleName> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        if let Some((name, _)) = self.edges.get_key_value(root) {
            self.post_order(name, &mut visited, &mut order);
        }
        order
    }

    fn post_order(
        &self,
        name: &ModuleName,
        visited: &mut HashSet<ModuleName>,
        order: &mut Vec<ModuleName>,
    ) {
        let Some(dependencies) = self.edges.get(name) else {
            return;
        };
        if !visited.insert(name.clone()) {
            return;
        }
        for dependency in dependencies {
            self.post_order(dependency, visited, order);
        }
        order.push(name.clone());
    }

    /// Declared modules that nothing depends on, sorted by name.
    pub fn roots(&self) -> Vec<&ModuleName> {
        let mut roots: Vec<&ModuleName> = self
            .edges
            .keys()
            .filter(|name| self.dependent_count(name.as_str()) == 0)
            .collect();
        roots.sort();
        roots
    }

    /// Load order of every root's subtree.
    pub fn forest(&self) -> BTreeMap<ModuleName, Vec<ModuleName>> {
        self.roots()
            .into_iter()
            .map(|root| (root.clone(), self.load_order(root.as_str())))
            .collect()
    }
}
