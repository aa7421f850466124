//! Arena of resolved components and the edges between them.
//!
//! Nodes are keyed by component name: after conflict resolution every name maps to exactly
//! one chosen [`ComponentRef`]. An edge `from → to` means `from` depends on `to`, so `to`
//! must be installed before `from`.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::core::{CompkitError, Result};
use crate::models::ComponentRef;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is currently being visited (in the DFS stack).
    Gray,
    /// Node has been fully visited.
    Black,
}

/// Dependency graph over resolved components.
#[derive(Debug, Clone, Default)]
pub struct ResolutionGraph {
    graph: DiGraph<ComponentRef, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl ResolutionGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the chosen reference for a component. A name is only ever inserted once;
    /// later calls return the existing node.
    pub fn insert(&mut self, reference: ComponentRef) -> NodeIndex {
        if let Some(&index) = self.node_map.get(&reference.name) {
            return index;
        }
        let name = reference.name.clone();
        let index = self.graph.add_node(reference);
        self.node_map.insert(name, index);
        index
    }

    /// Record that `from` depends on `to`. Both must already be inserted; duplicate edges
    /// are ignored.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let (Some(&from_idx), Some(&to_idx)) = (self.node_map.get(from), self.node_map.get(to))
        else {
            return;
        };
        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// The chosen reference for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentRef> {
        self.node_map.get(name).map(|&idx| &self.graph[idx])
    }

    /// Direct dependencies of `name`, in the order they were first recorded.
    #[must_use]
    pub fn dependencies(&self, name: &str) -> Vec<&ComponentRef> {
        let Some(&idx) = self.node_map.get(name) else {
            return Vec::new();
        };
        // petgraph yields outgoing neighbors newest first
        let mut deps: Vec<_> = self.graph.neighbors(idx).map(|n| &self.graph[n]).collect();
        deps.reverse();
        deps
    }

    /// Number of components in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Detect cycles using DFS with colors.
    ///
    /// # Errors
    ///
    /// [`CompkitError::CyclicDependency`] with the cycle path, first name repeated at the end.
    pub fn detect_cycles(&self) -> Result<()> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|n| (n, Color::White)).collect();
        let mut path: Vec<NodeIndex> = Vec::new();

        for node in self.graph.node_indices() {
            if colors.get(&node) == Some(&Color::White)
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Err(CompkitError::CyclicDependency {
                    cycle: cycle.into_iter().map(|idx| self.graph[idx].name.clone()).collect(),
                });
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        // Visit in declaration order so the reported cycle is stable
        let mut neighbors: Vec<_> = self.graph.neighbors(node).collect();
        neighbors.reverse();

        for neighbor in neighbors {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Components ordered so that every dependency precedes its dependents.
    ///
    /// # Errors
    ///
    /// [`CompkitError::CyclicDependency`] when the graph has a cycle.
    pub fn install_order(&self) -> Result<Vec<ComponentRef>> {
        self.detect_cycles()?;
        let indices = toposort(&self.graph, None).map_err(|cycle| {
            CompkitError::CyclicDependency {
                cycle: vec![self.graph[cycle.node_id()].name.clone()],
            }
        })?;
        Ok(indices.into_iter().rev().map(|idx| self.graph[idx].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> ResolutionGraph {
        let mut graph = ResolutionGraph::new();
        for (from, to) in edges {
            graph.insert(ComponentRef::new(*from, "1.0.0"));
            graph.insert(ComponentRef::new(*to, "1.0.0"));
            graph.add_dependency(from, to);
        }
        graph
    }

    fn position(order: &[ComponentRef], name: &str) -> usize {
        order.iter().position(|r| r.name == name).unwrap()
    }

    #[test]
    fn test_simple_dependency_chain() {
        let graph = graph(&[("A", "B"), ("B", "C")]);
        assert!(graph.detect_cycles().is_ok());

        let order = graph.install_order().unwrap();
        assert_eq!(order.len(), 3);
        assert!(position(&order, "C") < position(&order, "B"));
        assert!(position(&order, "B") < position(&order, "A"));
    }

    #[test]
    fn test_circular_dependency_detection() {
        let graph = graph(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let err = graph.detect_cycles().unwrap_err();
        assert_eq!(
            err,
            CompkitError::CyclicDependency {
                cycle: vec!["A".into(), "B".into(), "C".into(), "A".into()]
            }
        );
        assert_eq!(err.to_string(), "Circular dependency detected: A → B → C → A");
        assert!(graph.install_order().is_err());
    }

    #[test]
    fn test_diamond_dependency() {
        let graph = graph(&[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")]);
        assert!(graph.detect_cycles().is_ok());

        let order = graph.install_order().unwrap();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "D") < position(&order, "B"));
        assert!(position(&order, "D") < position(&order, "C"));
        assert!(position(&order, "B") < position(&order, "A"));
        assert!(position(&order, "C") < position(&order, "A"));
    }

    #[test]
    fn test_dependencies_keep_declaration_order() {
        let graph = graph(&[("A", "Z"), ("A", "B"), ("A", "M"), ("A", "B")]);
        let names: Vec<_> = graph.dependencies("A").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Z", "B", "M"]);
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_insert_keeps_first_reference() {
        let mut graph = ResolutionGraph::new();
        graph.insert(ComponentRef::new("button", "1.0.0"));
        graph.insert(ComponentRef::new("button", "2.0.0"));
        assert_eq!(graph.get("button").unwrap().version, "1.0.0");
    }
}
