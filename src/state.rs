// src/state.rs
//
// Per-node mutable state and the node table owned by the simulation engine.
//
// Single-writer model: red and blue primitives never touch these records
// directly; every mutation goes through the engine's methods.

use std::collections::BTreeMap;

use crate::types::{BlueView, NodeId};

/// Mutable per-node record.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    /// Ground truth: whether red holds this node.
    pub compromised: bool,
    /// Blue's belief about `compromised`. May lag ground truth.
    pub blue_view: BlueView,
    /// Sticky: once blue has discovered an intrusion here, the view tracks
    /// ground truth until the node is made safe again.
    pub blue_knows_intrusion: bool,
    /// Attack-success modifier in [0, 1]. Higher is easier to compromise.
    pub vulnerability: f64,
    /// Whether the node's current-graph edges are suppressed.
    pub isolated: bool,
    /// Honeypot marker. Decoys resolve detection with their own chances.
    pub deceptive: bool,
    /// 2D position for rendering.
    pub position: (f64, f64),
}

impl NodeState {
    /// A fresh, safe standard node.
    pub fn new(vulnerability: f64, position: (f64, f64)) -> Self {
        Self {
            compromised: false,
            blue_view: BlueView::Safe,
            blue_knows_intrusion: false,
            vulnerability,
            isolated: false,
            deceptive: false,
            position,
        }
    }

    /// A fresh, safe decoy node.
    pub fn fresh_decoy(vulnerability: f64, position: (f64, f64)) -> Self {
        Self {
            deceptive: true,
            ..Self::new(vulnerability, position)
        }
    }
}

/// Deterministically ordered node table.
///
/// Keys iterate in id order; the engine keeps a separate fixed node order
/// for observation assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTable {
    nodes: BTreeMap<NodeId, NodeState>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Panics if the id is unknown (caller bug).
    pub fn get(&self, id: &str) -> &NodeState {
        &self.nodes[id]
    }

    /// Panics if the id is unknown (caller bug).
    pub fn get_mut(&mut self, id: &str) -> &mut NodeState {
        self.nodes.get_mut(id).expect("unknown node id")
    }

    pub fn insert(&mut self, id: NodeId, state: NodeState) {
        self.nodes.insert(id, state);
    }

    pub fn remove(&mut self, id: &str) -> Option<NodeState> {
        self.nodes.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeState)> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    /// Ground-truth compromised count. The single filter used by every
    /// loss condition.
    pub fn count_compromised(&self) -> usize {
        self.nodes.values().filter(|n| n.compromised).count()
    }

    pub fn compromised_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.compromised)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn safe_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| !n.compromised)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Ground-truth compromise map, keyed by owned strings for
    /// serialization.
    pub fn true_state_map(&self) -> BTreeMap<String, bool> {
        self.nodes
            .iter()
            .map(|(id, n)| (id.to_string(), n.compromised))
            .collect()
    }

    /// Blue's belief map.
    pub fn blue_view_map(&self) -> BTreeMap<String, bool> {
        self.nodes
            .iter()
            .map(|(id, n)| (id.to_string(), n.blue_view == BlueView::Compromised))
            .collect()
    }

    pub fn vulnerability_map(&self) -> BTreeMap<String, f64> {
        self.nodes
            .iter()
            .map(|(id, n)| (id.to_string(), n.vulnerability))
            .collect()
    }

    pub fn isolation_map(&self) -> BTreeMap<String, bool> {
        self.nodes
            .iter()
            .map(|(id, n)| (id.to_string(), n.isolated))
            .collect()
    }

    pub fn mean_vulnerability(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let total: f64 = self.nodes.values().map(|n| n.vulnerability).sum();
        total / self.nodes.len() as f64
    }
}
