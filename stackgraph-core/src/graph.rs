//! Graph - Dependency analysis over declared resources
//!
//! Nodes are logical ids in declaration order. An edge `a -> b` means `a`
//! must be created after `b`, either because `a` refers to `b` from one of its
//! properties or because an explicit ordering edge was declared.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Why one resource depends on another
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyKind {
    /// Referenced from a property (e.g., "vpc_id")
    Reference { used_in: String },
    /// Declared ordering edge with no data flow
    Explicit,
}

/// Dependency between resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Target logical id
    pub target: String,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn reference(target: impl Into<String>, used_in: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind: DependencyKind::Reference {
                used_in: used_in.into(),
            },
        }
    }

    pub fn explicit(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind: DependencyKind::Explicit,
        }
    }
}

/// Dependency graph of a stack
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Logical ids in declaration order
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    /// Logical id -> list of dependencies
    edges: HashMap<String, Vec<Dependency>>,
    /// Reverse edges: target -> resources that depend on it
    reverse_edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; adding a known node is a no-op
    pub fn add_node(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.index.contains_key(&id) {
            self.index.insert(id.clone(), self.nodes.len());
            self.nodes.push(id);
        }
    }

    /// Add a dependency edge
    ///
    /// Duplicate edges to the same target are kept once; a reference edge
    /// wins over an explicit one.
    pub fn add_edge(&mut self, from: impl Into<String>, dependency: Dependency) {
        let from = from.into();
        let deps = self.edges.entry(from.clone()).or_default();
        if let Some(existing) = deps.iter_mut().find(|d| d.target == dependency.target) {
            if existing.kind == DependencyKind::Explicit {
                existing.kind = dependency.kind;
            }
            return;
        }
        let target = dependency.target.clone();
        deps.push(dependency);
        self.reverse_edges.entry(target).or_default().push(from);
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Get direct dependencies of a resource
    pub fn dependencies_of(&self, resource: &str) -> &[Dependency] {
        self.edges.get(resource).map_or(&[], |v| v.as_slice())
    }

    /// Get resources that depend on this resource
    pub fn dependents_of(&self, resource: &str) -> &[String] {
        self.reverse_edges
            .get(resource)
            .map_or(&[], |v| v.as_slice())
    }

    /// Returns true if `from` reaches `to` through any chain of edges
    pub fn depends_transitively(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            for dep in self.dependencies_of(node) {
                if dep.target == to {
                    return true;
                }
                if seen.insert(dep.target.as_str()) {
                    stack.push(&dep.target);
                }
            }
        }
        false
    }

    /// Nodes without dependencies, in declaration order
    pub fn roots(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| self.dependencies_of(n).is_empty())
            .map(String::as_str)
            .collect()
    }

    /// Check if the graph has any cycles
    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Find a cycle, returned as a path whose first and last elements match
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        for node in &self.nodes {
            if let Some(cycle) = self.find_cycle_from(node, &mut visited, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn find_cycle_from(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = path.iter().position(|n| n == node) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if visited.contains(node) {
            return None;
        }

        visited.insert(node.to_string());
        path.push(node.to_string());

        for dep in self.dependencies_of(node) {
            if let Some(cycle) = self.find_cycle_from(&dep.target, visited, path) {
                return Some(cycle);
            }
        }

        path.pop();
        None
    }

    /// Order nodes so every node comes after its dependencies
    ///
    /// Ties are broken by declaration order, so the result is stable for a
    /// given graph. Edges to unknown nodes are ignored. Returns the cycle if
    /// the graph is not a DAG.
    pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut pending: Vec<usize> = vec![0; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            pending[i] = self
                .dependencies_of(node)
                .iter()
                .filter(|d| self.contains(&d.target))
                .count();
        }

        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|(_, n)| **n == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(i)) = ready.pop() {
            let node = &self.nodes[i];
            order.push(node.clone());
            for dependent in self.dependents_of(node) {
                if let Some(&j) = self.index.get(dependent) {
                    pending[j] -= 1;
                    if pending[j] == 0 {
                        ready.push(Reverse(j));
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            Err(self.find_cycle().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for n in nodes {
            g.add_node(*n);
        }
        for (from, to) in edges {
            g.add_edge(*from, Dependency::reference(*to, "id"));
        }
        g
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let g = graph(
            &["service", "vpc", "sg", "db"],
            &[
                ("service", "sg"),
                ("service", "db"),
                ("sg", "vpc"),
                ("db", "sg"),
            ],
        );

        let order = g.topological_order().unwrap();
        assert_eq!(order, vec!["vpc", "sg", "db", "service"]);
    }

    #[test]
    fn topological_order_keeps_declaration_order_for_independent_nodes() {
        let g = graph(&["b", "a", "c"], &[]);
        assert_eq!(g.topological_order().unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn detects_cycle_with_path() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);

        assert!(g.has_cycle());
        let cycle = g.find_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
        assert_eq!(g.topological_order().unwrap_err().len(), 4);
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("a", "c"), ("b", "c")]);
        assert!(!g.has_cycle());
    }

    #[test]
    fn duplicate_edges_are_merged() {
        let mut g = graph(&["svc", "db"], &[]);
        g.add_edge("svc", Dependency::explicit("db"));
        g.add_edge("svc", Dependency::reference("db", "secret"));

        assert_eq!(g.dependencies_of("svc").len(), 1);
        assert_eq!(
            g.dependencies_of("svc")[0].kind,
            DependencyKind::Reference {
                used_in: "secret".to_string()
            }
        );
        assert_eq!(g.dependents_of("db"), &["svc".to_string()]);
    }

    #[test]
    fn roots_and_transitive_dependencies() {
        let g = graph(&["vpc", "sg", "svc"], &[("sg", "vpc"), ("svc", "sg")]);

        assert_eq!(g.roots(), vec!["vpc"]);
        assert!(g.depends_transitively("svc", "vpc"));
        assert!(!g.depends_transitively("vpc", "svc"));
    }
}
