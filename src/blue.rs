// src/blue.rs
//
// The blue agent: defensive primitives and the decode of the externally
// supplied flat action integer into a typed BlueAction. All mutations go
// through the engine.
//
// Flat action layout, in decode order:
//   [0, decoy_capacity)            deploy a decoy on that stable edge index
//   [.., +globals)                 global actions (scan, do-nothing)
//   [.., +slots * node_actions)    node_index * action_count + action_index
// Anything at or beyond the valid range decodes to do-nothing.

use crate::config::{BlueConfig, MakeSafeEffect};
use crate::engine::SimEngine;
use crate::types::{BlueActionKind, BlueOutcome, NodeId};

/// Vulnerability step applied by `reduce_node_vulnerability`.
pub const VULNERABILITY_STEP: f64 = 0.2;

/// A decoded blue action with its typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum BlueAction {
    ReduceVulnerability { node: NodeId },
    RestoreNode { node: NodeId },
    MakeNodeSafe { node: NodeId },
    IsolateNode { node: NodeId },
    ReconnectNode { node: NodeId },
    ScanAll,
    DeployDecoy { edge_index: usize },
    DoNothing,
}

impl BlueAction {
    pub fn kind(&self) -> BlueActionKind {
        match self {
            BlueAction::ReduceVulnerability { .. } => BlueActionKind::ReduceVulnerability,
            BlueAction::RestoreNode { .. } => BlueActionKind::RestoreNode,
            BlueAction::MakeNodeSafe { .. } => BlueActionKind::MakeNodeSafe,
            BlueAction::IsolateNode { .. } => BlueActionKind::IsolateNode,
            BlueAction::ReconnectNode { .. } => BlueActionKind::ReconnectNode,
            BlueAction::ScanAll => BlueActionKind::ScanAll,
            BlueAction::DeployDecoy { .. } => BlueActionKind::DeployDecoy,
            BlueAction::DoNothing => BlueActionKind::DoNothing,
        }
    }
}

pub struct BlueAgent {
    cfg: BlueConfig,
}

impl BlueAgent {
    pub fn new(cfg: BlueConfig) -> Self {
        Self { cfg }
    }

    /// Per-node actions enabled by the config, in fixed decode order.
    fn node_action_kinds(&self) -> Vec<BlueActionKind> {
        let table = [
            (
                self.cfg.can_reduce_vulnerability,
                BlueActionKind::ReduceVulnerability,
            ),
            (self.cfg.can_restore_node, BlueActionKind::RestoreNode),
            (self.cfg.can_make_node_safe, BlueActionKind::MakeNodeSafe),
            (self.cfg.can_isolate_node, BlueActionKind::IsolateNode),
            (self.cfg.can_reconnect_node, BlueActionKind::ReconnectNode),
        ];
        table
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, kind)| kind)
            .collect()
    }

    /// Global actions, in fixed decode order. Do-nothing is always
    /// available.
    fn global_action_kinds(&self) -> Vec<BlueActionKind> {
        let mut out = Vec::new();
        if self.cfg.can_scan {
            out.push(BlueActionKind::ScanAll);
        }
        out.push(BlueActionKind::DoNothing);
        out
    }

    /// Total size of the flat action space for the given engine.
    pub fn action_space_size(&self, engine: &SimEngine) -> usize {
        self.cfg.decoy_capacity()
            + self.global_action_kinds().len()
            + engine.observation_slots() * self.node_action_kinds().len()
    }

    /// Decode a flat action integer.
    ///
    /// Out-of-range indices and empty decoy slots decode to do-nothing
    /// (a defensive clamp, not an error).
    pub fn decode(&self, action: usize, engine: &SimEngine) -> BlueAction {
        let mut idx = action;

        let capacity = self.cfg.decoy_capacity();
        if idx < capacity {
            return BlueAction::DeployDecoy { edge_index: idx };
        }
        idx -= capacity;

        let globals = self.global_action_kinds();
        if idx < globals.len() {
            return match globals[idx] {
                BlueActionKind::ScanAll => BlueAction::ScanAll,
                _ => BlueAction::DoNothing,
            };
        }
        idx -= globals.len();

        let node_actions = self.node_action_kinds();
        if node_actions.is_empty() {
            return BlueAction::DoNothing;
        }
        let slots = engine.observation_slots();
        if idx >= slots * node_actions.len() {
            return BlueAction::DoNothing;
        }
        let node_index = idx / node_actions.len();
        let action_index = idx % node_actions.len();
        let Some(node) = engine.slot_id(node_index).cloned() else {
            return BlueAction::DoNothing;
        };
        match node_actions[action_index] {
            BlueActionKind::ReduceVulnerability => BlueAction::ReduceVulnerability { node },
            BlueActionKind::RestoreNode => BlueAction::RestoreNode { node },
            BlueActionKind::MakeNodeSafe => BlueAction::MakeNodeSafe { node },
            BlueActionKind::IsolateNode => BlueAction::IsolateNode { node },
            BlueActionKind::ReconnectNode => BlueAction::ReconnectNode { node },
            _ => BlueAction::DoNothing,
        }
    }

    /// Execute a decoded action against the engine.
    pub fn perform(&self, action: &BlueAction, engine: &mut SimEngine) -> BlueOutcome {
        match action {
            BlueAction::ReduceVulnerability { node } => {
                engine.reduce_node_vulnerability(node, VULNERABILITY_STEP);
                BlueOutcome::new(BlueActionKind::ReduceVulnerability, Some(node.clone()))
            }
            BlueAction::RestoreNode { node } => {
                engine.restore_node(node);
                BlueOutcome::new(BlueActionKind::RestoreNode, Some(node.clone()))
            }
            BlueAction::MakeNodeSafe { node } => {
                engine.make_node_safe(node);
                match self.cfg.make_safe_effect {
                    MakeSafeEffect::LeaveVulnerability => {}
                    MakeSafeEffect::Shift { delta } => engine.shift_vulnerability(node, delta),
                    MakeSafeEffect::Randomize => engine.randomize_vulnerability(node),
                }
                BlueOutcome::new(BlueActionKind::MakeNodeSafe, Some(node.clone()))
            }
            BlueAction::IsolateNode { node } => {
                engine.isolate_node(node);
                BlueOutcome::new(BlueActionKind::IsolateNode, Some(node.clone()))
            }
            BlueAction::ReconnectNode { node } => {
                engine.reconnect_node(node);
                BlueOutcome::new(BlueActionKind::ReconnectNode, Some(node.clone()))
            }
            BlueAction::ScanAll => {
                for id in engine.nodes().ids() {
                    engine.scan_node(&id);
                }
                BlueOutcome::new(BlueActionKind::ScanAll, None)
            }
            BlueAction::DeployDecoy { edge_index } => {
                let Some((a, b)) = engine.edge_for_index(*edge_index) else {
                    return BlueOutcome::nothing();
                };
                match engine.add_decoy(&a, &b) {
                    Some(id) => BlueOutcome::new(BlueActionKind::DeployDecoy, Some(id)),
                    None => BlueOutcome::nothing(),
                }
            }
            BlueAction::DoNothing => BlueOutcome::nothing(),
        }
    }
}
