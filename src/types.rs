// src/types.rs
//
// Common shared types for the Palisade simulator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable node identifier.
///
/// Note: `Arc<str>` for cheap cloning in hot paths (target lists, attack
/// logs, graph keys). Serialized records store plain `String`.
pub type NodeId = Arc<str>;

/// Build a `NodeId` from a string slice.
pub fn node_id(s: &str) -> NodeId {
    Arc::from(s)
}

/// Blue's belief about one node's compromise state.
///
/// "Unknown" intrusions are represented as `Safe` here while the ground
/// truth is compromised and `blue_knows_intrusion` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlueView {
    Safe,
    Compromised,
}

/// Which side a finished episode went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Red,
    Blue,
}

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Every node in the network is compromised.
    AllNodesLost,
    /// The configured fraction of nodes is compromised.
    FractionLost,
    /// A high-value node is compromised.
    HighValueNodeLost,
    /// The designated target node is compromised.
    TargetNodeLost,
    /// The step budget ran out with the network still standing.
    MaxStepsReached,
}

impl TerminationReason {
    /// Stable lowercase name used in logs and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::AllNodesLost => "all_nodes_lost",
            TerminationReason::FractionLost => "fraction_lost",
            TerminationReason::HighValueNodeLost => "high_value_node_lost",
            TerminationReason::TargetNodeLost => "target_node_lost",
            TerminationReason::MaxStepsReached => "max_steps_reached",
        }
    }

    /// The side the episode is attributed to.
    pub fn winner(&self) -> Winner {
        match self {
            TerminationReason::MaxStepsReached => Winner::Blue,
            _ => Winner::Red,
        }
    }
}

/// One attack attempt as recorded in the per-turn logs.
///
/// `attacker` is `None` for attempts injected from outside the network
/// (entry-node attacks, random intrusion).
#[derive(Debug, Clone, PartialEq)]
pub struct AttackEvent {
    pub attacker: Option<NodeId>,
    pub target: NodeId,
    pub success: bool,
}

/// The catalogue of red actions, including the two sentinel outcomes
/// (`DoNothing` for a forced or chosen pass, `NoPossibleTargets` when the
/// candidate set was empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RedActionKind {
    BasicAttack,
    Spread,
    Intrude,
    ZeroDay,
    RandomMove,
    DoNothing,
    NoPossibleTargets,
}

impl RedActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedActionKind::BasicAttack => "basic_attack",
            RedActionKind::Spread => "spread",
            RedActionKind::Intrude => "intrude",
            RedActionKind::ZeroDay => "zero_day",
            RedActionKind::RandomMove => "random_move",
            RedActionKind::DoNothing => "do_nothing",
            RedActionKind::NoPossibleTargets => "no_possible_targets",
        }
    }
}

/// The catalogue of blue actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlueActionKind {
    ReduceVulnerability,
    RestoreNode,
    MakeNodeSafe,
    IsolateNode,
    ReconnectNode,
    ScanAll,
    DeployDecoy,
    DoNothing,
}

impl BlueActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlueActionKind::ReduceVulnerability => "reduce_vulnerability",
            BlueActionKind::RestoreNode => "restore_node",
            BlueActionKind::MakeNodeSafe => "make_node_safe",
            BlueActionKind::IsolateNode => "isolate_node",
            BlueActionKind::ReconnectNode => "reconnect_node",
            BlueActionKind::ScanAll => "scan_all",
            BlueActionKind::DeployDecoy => "deploy_decoy",
            BlueActionKind::DoNothing => "do_nothing",
        }
    }
}

/// Structured outcome of one red turn.
///
/// The three lists are parallel, one entry per attack attempt. Multi-target
/// actions (spread, intrude) produce several entries; movement and pass
/// actions produce none (a failed move records a single `false` success
/// with no target).
#[derive(Debug, Clone)]
pub struct RedOutcome {
    pub action: RedActionKind,
    pub attacking_nodes: Vec<Option<NodeId>>,
    pub target_nodes: Vec<NodeId>,
    pub successes: Vec<bool>,
}

impl RedOutcome {
    /// An outcome with no attack attempts.
    pub fn sentinel(action: RedActionKind) -> Self {
        Self {
            action,
            attacking_nodes: Vec::new(),
            target_nodes: Vec::new(),
            successes: Vec::new(),
        }
    }

    /// A single-attempt outcome.
    pub fn single(
        action: RedActionKind,
        attacker: Option<NodeId>,
        target: NodeId,
        success: bool,
    ) -> Self {
        Self {
            action,
            attacking_nodes: vec![attacker],
            target_nodes: vec![target],
            successes: vec![success],
        }
    }

    /// The attempts of this outcome as attack events.
    pub fn attack_events(&self) -> Vec<AttackEvent> {
        self.target_nodes
            .iter()
            .enumerate()
            .map(|(i, target)| AttackEvent {
                attacker: self.attacking_nodes.get(i).cloned().flatten(),
                target: target.clone(),
                success: self.successes.get(i).copied().unwrap_or(false),
            })
            .collect()
    }
}

/// Outcome of one blue action: the action kind and the node it touched,
/// if any.
#[derive(Debug, Clone, PartialEq)]
pub struct BlueOutcome {
    pub action: BlueActionKind,
    pub node: Option<NodeId>,
}

impl BlueOutcome {
    pub fn new(action: BlueActionKind, node: Option<NodeId>) -> Self {
        Self { action, node }
    }

    pub fn nothing() -> Self {
        Self {
            action: BlueActionKind::DoNothing,
            node: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_winner_attribution() {
        assert_eq!(TerminationReason::MaxStepsReached.winner(), Winner::Blue);
        assert_eq!(TerminationReason::AllNodesLost.winner(), Winner::Red);
        assert_eq!(TerminationReason::TargetNodeLost.winner(), Winner::Red);
    }

    #[test]
    fn red_outcome_events_are_parallel() {
        let out = RedOutcome {
            action: RedActionKind::Spread,
            attacking_nodes: vec![Some(node_id("a")), Some(node_id("a"))],
            target_nodes: vec![node_id("b"), node_id("c")],
            successes: vec![true, false],
        };
        let events = out.attack_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].target.as_ref(), "b");
        assert!(events[0].success);
        assert_eq!(events[1].attacker.as_deref(), Some("a"));
        assert!(!events[1].success);
    }
}
