// src/graph.rs
//
// Mutable undirected graph view shared by the topology store and the
// simulation engine. Wraps a petgraph StableUnGraph keyed by stable string
// ids so handles survive decoy splices and node removal. All listing
// methods return sorted output (deterministic iteration).

use std::collections::BTreeMap;

use petgraph::algo::dijkstra;
use petgraph::stable_graph::{NodeIndex, StableUnGraph};

use crate::types::NodeId;

/// Undirected graph over string-keyed nodes.
#[derive(Debug, Clone, Default)]
pub struct NetGraph {
    graph: StableUnGraph<NodeId, ()>,
    index: BTreeMap<NodeId, NodeIndex>,
}

impl NetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from an edge list, creating nodes on first mention.
    pub fn from_edges<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut g = Self::new();
        for (a, b) in edges {
            g.ensure_node(a);
            g.ensure_node(b);
            g.add_edge(a, b);
        }
        g
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Add a node if absent; no-op for an existing id.
    pub fn ensure_node(&mut self, id: &str) {
        if !self.index.contains_key(id) {
            let key: NodeId = NodeId::from(id);
            let ix = self.graph.add_node(key.clone());
            self.index.insert(key, ix);
        }
    }

    /// Remove a node and all its incident edges.
    ///
    /// Panics if the id is unknown (caller bug).
    pub fn remove_node(&mut self, id: &str) {
        let ix = self.index_of(id);
        self.graph.remove_node(ix);
        self.index.remove(id);
    }

    /// Add an undirected edge; idempotent for an existing edge.
    ///
    /// Panics if either id is unknown (caller bug).
    pub fn add_edge(&mut self, a: &str, b: &str) {
        let (ia, ib) = (self.index_of(a), self.index_of(b));
        if self.graph.find_edge(ia, ib).is_none() {
            self.graph.add_edge(ia, ib, ());
        }
    }

    /// Remove the edge between `a` and `b` if present.
    pub fn remove_edge(&mut self, a: &str, b: &str) {
        let (ia, ib) = (self.index_of(a), self.index_of(b));
        if let Some(e) = self.graph.find_edge(ia, ib) {
            self.graph.remove_edge(e);
        }
    }

    /// Remove every edge incident to `id`, keeping the node.
    pub fn remove_edges_of(&mut self, id: &str) {
        let ix = self.index_of(id);
        let edges: Vec<_> = self
            .graph
            .neighbors(ix)
            .filter_map(|nb| self.graph.find_edge(ix, nb))
            .collect();
        for e in edges {
            self.graph.remove_edge(e);
        }
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&ia), Some(&ib)) => self.graph.find_edge(ia, ib).is_some(),
            _ => false,
        }
    }

    /// Sorted neighbour ids of `id`.
    ///
    /// Panics if the id is unknown (caller bug).
    pub fn neighbors(&self, id: &str) -> Vec<NodeId> {
        let ix = self.index_of(id);
        let mut out: Vec<NodeId> = self
            .graph
            .neighbors(ix)
            .filter_map(|nb| self.graph.node_weight(nb).cloned())
            .collect();
        out.sort();
        out
    }

    pub fn degree(&self, id: &str) -> usize {
        let ix = self.index_of(id);
        self.graph.neighbors(ix).count()
    }

    /// Sorted list of live node ids.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.index.keys().cloned().collect()
    }

    /// Sorted list of live edges as normalized `(min, max)` id pairs.
    pub fn edge_list(&self) -> Vec<(NodeId, NodeId)> {
        let mut out = Vec::with_capacity(self.graph.edge_count());
        for ix in self.graph.edge_indices() {
            if let Some((ia, ib)) = self.graph.edge_endpoints(ix) {
                let a = self.graph[ia].clone();
                let b = self.graph[ib].clone();
                if a <= b {
                    out.push((a, b));
                } else {
                    out.push((b, a));
                }
            }
        }
        out.sort();
        out
    }

    /// Hop distances from `id` to every reachable node (including itself,
    /// at distance zero).
    pub fn distances_from(&self, id: &str) -> BTreeMap<NodeId, usize> {
        let ix = self.index_of(id);
        let raw = dijkstra(&self.graph, ix, None, |_| 1usize);
        raw.into_iter()
            .filter_map(|(nix, d)| self.graph.node_weight(nix).map(|n| (n.clone(), d)))
            .collect()
    }

    /// Mean hop distance from `id` to every other reachable node.
    /// Returns 0.0 for a node with no reachable peers.
    pub fn mean_distance_from(&self, id: &str) -> f64 {
        let dists = self.distances_from(id);
        let total: usize = dists.values().sum();
        let peers = dists.len().saturating_sub(1);
        if peers == 0 {
            0.0
        } else {
            total as f64 / peers as f64
        }
    }

    fn index_of(&self, id: &str) -> NodeIndex {
        self.index[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> NetGraph {
        NetGraph::from_edges([("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")])
    }

    #[test]
    fn edges_are_undirected_and_idempotent() {
        let mut g = diamond();
        assert!(g.has_edge("a", "b"));
        assert!(g.has_edge("b", "a"));
        g.add_edge("a", "b");
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn remove_edges_of_keeps_node() {
        let mut g = diamond();
        g.remove_edges_of("a");
        assert!(g.contains("a"));
        assert!(g.neighbors("a").is_empty());
        assert!(g.has_edge("b", "c"));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn splice_pattern_preserves_ids() {
        let mut g = diamond();
        g.remove_edge("a", "b");
        g.ensure_node("x");
        g.add_edge("a", "x");
        g.add_edge("x", "b");
        assert_eq!(g.node_count(), 5);
        assert!(!g.has_edge("a", "b"));
        assert_eq!(g.neighbors("x"), vec![NodeId::from("a"), NodeId::from("b")]);
    }

    #[test]
    fn distances_over_line() {
        let g = NetGraph::from_edges([("a", "b"), ("b", "c"), ("c", "d")]);
        let d = g.distances_from("a");
        assert_eq!(d.get("a"), Some(&0));
        assert_eq!(d.get("d"), Some(&3));
        assert!((g.mean_distance_from("a") - 2.0).abs() < 1e-12);
    }

    #[test]
    fn unreachable_nodes_absent_from_distances() {
        let mut g = diamond();
        g.ensure_node("z");
        let d = g.distances_from("a");
        assert!(d.get("z").is_none());
    }
}
