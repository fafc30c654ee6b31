// src/topology.rs
//
// Static network description consumed at engine construction and reset.
// Read-only during an episode; the engine clones the base connectivity
// into its own working graphs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::NetGraph;
use crate::types::{node_id, NodeId};

/// Serializable topology description, the shape scenario files use.
///
/// `Topology::from_spec` turns this into the queryable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySpec {
    /// Undirected edge list. Nodes are created on first mention, in order.
    pub edges: Vec<(String, String)>,
    /// Optional 2D render positions; missing nodes default to the origin.
    #[serde(default)]
    pub positions: BTreeMap<String, (f64, f64)>,
    /// Red's injection points. May be empty when auto-selection is on.
    #[serde(default)]
    pub entry_nodes: Vec<String>,
    /// Loss-condition targets. May be empty when auto-selection is on.
    #[serde(default)]
    pub high_value_nodes: Vec<String>,
    /// Optional single named loss-condition target.
    #[serde(default)]
    pub target_node: Option<String>,
    /// Uniform sampling bounds for generated vulnerabilities.
    #[serde(default = "default_vulnerability_bounds")]
    pub vulnerability_bounds: (f64, f64),
    /// Optional explicit per-node vulnerability map; nodes not listed get
    /// a generated value.
    #[serde(default)]
    pub vulnerabilities: BTreeMap<String, f64>,
}

fn default_vulnerability_bounds() -> (f64, f64) {
    (0.2, 0.8)
}

/// Queryable topology store.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: NetGraph,
    /// Fixed observation order: first mention order from the edge list.
    node_order: Vec<NodeId>,
    positions: BTreeMap<NodeId, (f64, f64)>,
    entry_nodes: Vec<NodeId>,
    high_value_nodes: Vec<NodeId>,
    target_node: Option<NodeId>,
    vulnerability_bounds: (f64, f64),
    vulnerabilities: BTreeMap<NodeId, f64>,
}

impl Topology {
    pub fn from_spec(spec: &TopologySpec) -> Self {
        let mut node_order: Vec<NodeId> = Vec::new();
        for (a, b) in &spec.edges {
            for id in [a, b] {
                if !node_order.iter().any(|n| n.as_ref() == id.as_str()) {
                    node_order.push(node_id(id));
                }
            }
        }
        let graph = NetGraph::from_edges(spec.edges.iter().map(|(a, b)| (a.as_str(), b.as_str())));

        Self {
            graph,
            node_order,
            positions: spec
                .positions
                .iter()
                .map(|(k, v)| (node_id(k), *v))
                .collect(),
            entry_nodes: spec.entry_nodes.iter().map(|s| node_id(s)).collect(),
            high_value_nodes: spec.high_value_nodes.iter().map(|s| node_id(s)).collect(),
            target_node: spec.target_node.as_deref().map(node_id),
            vulnerability_bounds: spec.vulnerability_bounds,
            vulnerabilities: spec
                .vulnerabilities
                .iter()
                .map(|(k, v)| (node_id(k), *v))
                .collect(),
        }
    }

    /// Build from a bare edge list with default attributes.
    pub fn from_edges(edges: &[(&str, &str)]) -> Self {
        Self::from_spec(&TopologySpec {
            edges: edges
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            positions: BTreeMap::new(),
            entry_nodes: Vec::new(),
            high_value_nodes: Vec::new(),
            target_node: None,
            vulnerability_bounds: default_vulnerability_bounds(),
            vulnerabilities: BTreeMap::new(),
        })
    }

    /// A line of `n` nodes named `n0..n{n-1}`.
    pub fn line(n: usize) -> Self {
        let names: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
        let edges: Vec<(&str, &str)> = names
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();
        Self::from_edges(&edges)
    }

    /// The ten-node demo network used by the CLI harness.
    pub fn demo() -> Self {
        let mut t = Self::from_edges(&[
            ("gateway", "dmz_web"),
            ("gateway", "dmz_mail"),
            ("dmz_web", "app_1"),
            ("dmz_mail", "app_1"),
            ("app_1", "app_2"),
            ("app_1", "db_1"),
            ("app_2", "db_1"),
            ("app_2", "db_2"),
            ("db_1", "backup"),
            ("db_2", "backup"),
            ("dmz_web", "workstation"),
            ("workstation", "fileserver"),
            ("fileserver", "db_2"),
        ]);
        t.entry_nodes = vec![node_id("gateway"), node_id("workstation")];
        t.high_value_nodes = vec![node_id("backup")];
        t.target_node = Some(node_id("db_1"));
        t
    }

    pub fn with_entry_nodes(mut self, nodes: &[&str]) -> Self {
        self.entry_nodes = nodes.iter().map(|s| node_id(s)).collect();
        self
    }

    pub fn with_high_value_nodes(mut self, nodes: &[&str]) -> Self {
        self.high_value_nodes = nodes.iter().map(|s| node_id(s)).collect();
        self
    }

    pub fn with_target_node(mut self, node: &str) -> Self {
        self.target_node = Some(node_id(node));
        self
    }

    pub fn with_vulnerability_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.vulnerability_bounds = (lower, upper);
        self
    }

    pub fn with_vulnerabilities(mut self, vulns: &[(&str, f64)]) -> Self {
        self.vulnerabilities = vulns.iter().map(|(k, v)| (node_id(k), *v)).collect();
        self
    }

    pub fn graph(&self) -> &NetGraph {
        &self.graph
    }

    /// Fixed observation order over base nodes.
    pub fn node_order(&self) -> &[NodeId] {
        &self.node_order
    }

    pub fn node_count(&self) -> usize {
        self.node_order.len()
    }

    pub fn position(&self, id: &str) -> (f64, f64) {
        self.positions.get(id).copied().unwrap_or((0.0, 0.0))
    }

    pub fn entry_nodes(&self) -> &[NodeId] {
        &self.entry_nodes
    }

    pub fn high_value_nodes(&self) -> &[NodeId] {
        &self.high_value_nodes
    }

    pub fn target_node(&self) -> Option<&NodeId> {
        self.target_node.as_ref()
    }

    pub fn vulnerability_bounds(&self) -> (f64, f64) {
        self.vulnerability_bounds
    }

    /// Explicit vulnerability for `id`, if one was supplied.
    pub fn explicit_vulnerability(&self, id: &str) -> Option<f64> {
        self.vulnerabilities.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_order_follows_first_mention() {
        let t = Topology::from_edges(&[("b", "a"), ("a", "c")]);
        let order: Vec<&str> = t.node_order().iter().map(|n| n.as_ref()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn line_topology_shape() {
        let t = Topology::line(5);
        assert_eq!(t.node_count(), 5);
        assert_eq!(t.graph().edge_count(), 4);
        assert!(t.graph().has_edge("n0", "n1"));
        assert!(!t.graph().has_edge("n0", "n2"));
    }

    #[test]
    fn spec_round_trip() {
        let spec = TopologySpec {
            edges: vec![("a".into(), "b".into())],
            positions: BTreeMap::from([("a".into(), (1.0, 2.0))]),
            entry_nodes: vec!["a".into()],
            high_value_nodes: vec!["b".into()],
            target_node: Some("b".into()),
            vulnerability_bounds: (0.1, 0.9),
            vulnerabilities: BTreeMap::from([("a".into(), 0.4)]),
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: TopologySpec = serde_json::from_str(&json).unwrap();
        let t = Topology::from_spec(&back);
        assert_eq!(t.position("a"), (1.0, 2.0));
        assert_eq!(t.explicit_vulnerability("a"), Some(0.4));
        assert_eq!(t.target_node().map(|n| n.as_ref()), Some("b"));
    }

    #[test]
    fn demo_network_is_consistent() {
        let t = Topology::demo();
        for e in t.entry_nodes() {
            assert!(t.graph().contains(e));
        }
        for h in t.high_value_nodes() {
            assert!(t.graph().contains(h));
        }
        assert!(t.graph().contains(t.target_node().unwrap()));
    }
}
