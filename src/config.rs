// src/config.rs
//
// Central configuration for the Palisade simulator.
// This is the single source of truth for every probability, action
// toggle, loss rule and reward rule the engine and the two agents
// consult. Scenario files deserialize straight into these structs.
//
// Contradictory settings are rejected once, by `GameConfig::validate`,
// before the engine is constructed; the engine itself never re-checks
// these rules at runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reward::RewardFunction;
use crate::topology::Topology;

/// Top-level game configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConfig {
    /// Red agent parameters.
    pub red: RedConfig,
    /// Blue agent parameters.
    pub blue: BlueConfig,
    /// Win/loss rules and step budget.
    pub rules: GameRulesConfig,
    /// What `reset()` re-rolls.
    pub reset: ResetConfig,
    /// Which observation blocks are emitted.
    pub observation: ObservationConfig,
    /// Reward shaping.
    pub reward: RewardConfig,
    /// Per-step telemetry switches.
    pub telemetry: TelemetryConfig,
    /// Optional RNG seed applied at engine construction. Replays reseed
    /// explicitly through `GameEnv::reset`.
    pub seed: Option<u64>,
}

/// Target-selection strategy for red's single-target attacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetStrategy {
    /// Uniform over the candidate set.
    Random,
    /// Weight proportional to the target's current degree.
    PreferConnected,
    /// Weight inversely proportional to the target's current degree.
    PreferUnconnected,
    /// Weight proportional to the target's vulnerability.
    PreferVulnerable,
    /// Weight inversely proportional to the target's vulnerability.
    PreferResilient,
    /// Weight by shortest-path distance to the designated target node.
    /// `always_shortest` picks a strictly nearest candidate; otherwise the
    /// weight is 1/distance, with distance zero forced to weight 1.
    TowardsTarget { always_shortest: bool },
}

/// Likelihood weights for red's weighted action draw. Actions with zero
/// weight are disabled. Weights are normalized at draw time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedActionWeights {
    pub basic_attack: f64,
    pub spread: f64,
    pub intrude: f64,
    pub random_move: f64,
    pub do_nothing: f64,
}

impl Default for RedActionWeights {
    fn default() -> Self {
        Self {
            basic_attack: 0.6,
            spread: 0.1,
            intrude: 0.0,
            random_move: 0.2,
            do_nothing: 0.1,
        }
    }
}

/// Environmental spreading applied at the start of every red turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaturalSpreadConfig {
    pub enabled: bool,
    /// Chance for a safe node adjacent to a compromised node.
    pub chance_to_spread_to_connected_node: f64,
    /// Chance for a safe node with no compromised neighbour.
    pub chance_to_spread_to_unconnected_node: f64,
}

impl Default for NaturalSpreadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chance_to_spread_to_connected_node: 0.05,
            chance_to_spread_to_unconnected_node: 0.01,
        }
    }
}

/// Zero-day bank: guaranteed-success attacks accumulated over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroDayConfig {
    pub enabled: bool,
    /// Charges available at episode start.
    pub start_charges: u32,
    /// A new charge is granted every this-many turns. Must be positive
    /// when enabled.
    pub days_per_charge: u64,
}

impl Default for ZeroDayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_charges: 1,
            days_per_charge: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedConfig {
    /// Attack skill in [0, 1].
    pub skill: f64,
    /// Whether `skill` feeds the attack score (otherwise treated as 1).
    pub use_skill: bool,
    /// Whether target vulnerability feeds the attack score.
    pub use_vulnerabilities: bool,
    /// Every attack succeeds unconditionally.
    pub guaranteed_compromise: bool,
    /// Attack from every red-held node, or only from red's tracked
    /// location.
    pub attack_from_any_owned_node: bool,
    /// How single-target attacks pick their victim.
    pub targeting: TargetStrategy,
    pub action_weights: RedActionWeights,
    /// Skill used by `spread` attempts.
    pub spread_skill: f64,
    /// Skill used by `intrude` attempts.
    pub intrude_skill: f64,
    pub natural_spread: NaturalSpreadConfig,
    pub zero_day: ZeroDayConfig,
}

impl Default for RedConfig {
    fn default() -> Self {
        Self {
            skill: 0.7,
            use_skill: true,
            use_vulnerabilities: true,
            guaranteed_compromise: false,
            attack_from_any_owned_node: true,
            targeting: TargetStrategy::Random,
            action_weights: RedActionWeights::default(),
            spread_skill: 0.4,
            intrude_skill: 0.2,
            natural_spread: NaturalSpreadConfig::default(),
            zero_day: ZeroDayConfig::default(),
        }
    }
}

/// What `make_safe_node` does to the node's vulnerability.
/// A single enum, so the settings cannot contradict each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MakeSafeEffect {
    /// Leave the vulnerability untouched.
    LeaveVulnerability,
    /// Shift by a signed delta, clamped to the configured bounds.
    Shift { delta: f64 },
    /// Replace with a fresh uniform value within the configured bounds.
    Randomize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueConfig {
    // ----- Enabled actions -----
    pub can_reduce_vulnerability: bool,
    pub can_restore_node: bool,
    pub can_make_node_safe: bool,
    pub can_isolate_node: bool,
    pub can_reconnect_node: bool,
    pub can_scan: bool,
    pub can_deploy_decoys: bool,

    // ----- Decoys -----
    /// Decoy slot capacity; the oldest slot is recycled beyond this.
    pub max_decoys: usize,
    /// Whether a relocated decoy is born fresh (safe, undetected, new
    /// vulnerability) or carries its previous state along.
    pub regenerate_relocated_decoys: bool,

    pub make_safe_effect: MakeSafeEffect,

    // ----- Intrusion discovery chances -----
    /// Chance to spot a compromise the moment it happens.
    pub chance_to_immediately_discover_intrusion: f64,
    /// Chance for a scan to reveal an undiscovered intrusion.
    pub chance_to_discover_intrusion_on_scan: f64,
    /// Decoy override for immediate discovery.
    pub chance_to_immediately_discover_intrusion_decoy: f64,
    /// Decoy override for on-scan discovery.
    pub chance_to_discover_intrusion_on_scan_decoy: f64,

    // ----- Attack-event discovery chances -----
    pub chance_to_discover_failed_attack: f64,
    pub chance_to_discover_failed_attack_decoy: f64,
    /// Succeeded attack on a node blue already sees as compromised.
    pub chance_to_discover_succeeded_attack_known_compromise: f64,
    /// Succeeded attack on a node blue does not yet see as compromised.
    pub chance_to_discover_succeeded_attack_unknown_compromise: f64,
    pub chance_to_discover_succeeded_attack_decoy: f64,
}

impl Default for BlueConfig {
    fn default() -> Self {
        Self {
            can_reduce_vulnerability: true,
            can_restore_node: true,
            can_make_node_safe: true,
            can_isolate_node: true,
            can_reconnect_node: true,
            can_scan: true,
            can_deploy_decoys: true,
            max_decoys: 2,
            regenerate_relocated_decoys: true,
            make_safe_effect: MakeSafeEffect::LeaveVulnerability,
            chance_to_immediately_discover_intrusion: 0.5,
            chance_to_discover_intrusion_on_scan: 0.7,
            chance_to_immediately_discover_intrusion_decoy: 1.0,
            chance_to_discover_intrusion_on_scan_decoy: 1.0,
            chance_to_discover_failed_attack: 0.9,
            chance_to_discover_failed_attack_decoy: 1.0,
            chance_to_discover_succeeded_attack_known_compromise: 0.9,
            chance_to_discover_succeeded_attack_unknown_compromise: 0.3,
            chance_to_discover_succeeded_attack_decoy: 1.0,
        }
    }
}

impl BlueConfig {
    /// Decoy slot capacity as used for observation padding and the action
    /// space: zero when decoys are disabled.
    pub fn decoy_capacity(&self) -> usize {
        if self.can_deploy_decoys {
            self.max_decoys
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRulesConfig {
    /// Episode step budget. Reaching it ends the episode in blue's favour.
    pub max_steps: u64,
    /// Red is forced to pass for this many initial steps.
    pub grace_period: u64,
    /// Loss when every node is compromised.
    pub lose_when_all_nodes_lost: bool,
    /// Loss when at least this fraction of nodes is compromised.
    /// `None` disables the rule.
    pub lose_when_fraction_lost: Option<f64>,
    /// Loss when any high-value node is compromised.
    pub lose_when_high_value_node_lost: bool,
    /// Loss when the designated target node is compromised.
    pub lose_when_target_node_lost: bool,
}

impl Default for GameRulesConfig {
    fn default() -> Self {
        Self {
            max_steps: 500,
            grace_period: 0,
            lose_when_all_nodes_lost: true,
            lose_when_fraction_lost: None,
            lose_when_high_value_node_lost: false,
            lose_when_target_node_lost: false,
        }
    }
}

/// Entry-node auto-selection weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPlacement {
    Uniform,
    /// Favour nodes with a small mean hop distance to the rest of the
    /// network.
    Central,
    /// Favour nodes with a large mean hop distance (the periphery).
    Periphery,
}

/// High-value-node auto-selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HighValuePlacement {
    /// Uniform subset of non-entry nodes.
    Random,
    /// The non-entry nodes furthest, on mean hop distance, from every
    /// entry node.
    FurthestFromEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetConfig {
    /// Re-roll every vulnerability uniformly within bounds on reset.
    pub randomize_vulnerabilities: bool,
    /// Pick a new entry-node set on reset.
    pub reroll_entry_nodes: bool,
    pub entry_placement: EntryPlacement,
    /// Entry-node count used when auto-selecting.
    pub entry_node_count: usize,
    /// Pick a new high-value-node set on reset.
    pub reroll_high_value_nodes: bool,
    pub high_value_placement: HighValuePlacement,
    /// High-value-node count used when auto-selecting.
    pub high_value_count: usize,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            randomize_vulnerabilities: false,
            reroll_entry_nodes: false,
            entry_placement: EntryPlacement::Uniform,
            entry_node_count: 1,
            reroll_high_value_nodes: false,
            high_value_placement: HighValuePlacement::Random,
            high_value_count: 1,
        }
    }
}

/// Observation feature blocks, each independently toggleable. Block order
/// in the emitted vector is fixed regardless of which are enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationConfig {
    pub adjacency_matrix: bool,
    /// Blue's per-node compromise belief.
    pub compromised_status: bool,
    pub vulnerabilities: bool,
    pub average_vulnerability: bool,
    pub graph_connectivity: bool,
    /// Per-node flags from this turn's detected attacks.
    pub attacking_nodes: bool,
    pub attacked_nodes: bool,
    /// Entry, high-value and target indicator rows.
    pub special_nodes: bool,
    pub red_skill: bool,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            adjacency_matrix: true,
            compromised_status: true,
            vulnerabilities: true,
            average_vulnerability: true,
            graph_connectivity: true,
            attacking_nodes: true,
            attacked_nodes: true,
            special_nodes: true,
            red_skill: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Which per-step reward function runs after blue's move.
    pub function: RewardFunction,
    /// Reward on a red win. Conventionally negative.
    pub loss_reward: f64,
    /// Reward on surviving to the step budget.
    pub max_steps_reward: f64,
    /// Scale the loss reward by the fraction of the step budget left, so
    /// losses close to the end are punished less.
    pub scale_loss_by_duration: bool,
    /// Scale the max-steps reward by the fraction of nodes still safe.
    pub scale_max_steps_by_safe_fraction: bool,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            function: RewardFunction::Standard,
            loss_reward: -100.0,
            max_steps_reward: 100.0,
            scale_loss_by_duration: false,
            scale_max_steps_by_safe_fraction: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Attach pre/post state maps to every step's info record.
    pub detailed_step_info: bool,
    /// Hand a per-step JSON snapshot to the configured event sink.
    pub step_snapshots: bool,
}

/// Configuration rejected before engine construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chance '{name}' must be within [0,1], got {value}")]
    ChanceOutOfRange { name: &'static str, value: f64 },
    #[error("red action weight '{name}' must be non-negative, got {value}")]
    NegativeActionWeight { name: &'static str, value: f64 },
    #[error("every red action weight is zero; red has no action to draw")]
    NoRedActionEnabled,
    #[error("loss fraction must be within (0,1], got {0}")]
    LossFractionOutOfRange(f64),
    #[error("max_steps must be positive")]
    ZeroMaxSteps,
    #[error("zero-day days_per_charge must be positive when enabled")]
    ZeroDayPeriodZero,
    #[error("decoy capacity must be positive when decoys are enabled")]
    ZeroDecoyCapacity,
    #[error("vulnerability bounds ({0}, {1}) are not an ordered pair within [0,1]")]
    BadVulnerabilityBounds(f64, f64),
    #[error("'{context}' requires a designated target node in the topology")]
    MissingTargetNode { context: &'static str },
    #[error("high-value loss rule enabled but no high-value nodes exist or are auto-selected")]
    MissingHighValueNodes,
    #[error("entry auto-selection count {count} exceeds node count {nodes}")]
    TooManyEntryNodes { count: usize, nodes: usize },
}

impl GameConfig {
    /// Validate this configuration against a topology.
    ///
    /// Runs once, before engine construction. Returns the first violation
    /// found.
    pub fn validate(&self, topology: &Topology) -> Result<(), ConfigError> {
        let chances: [(&'static str, f64); 14] = [
            ("red.skill", self.red.skill),
            ("red.spread_skill", self.red.spread_skill),
            ("red.intrude_skill", self.red.intrude_skill),
            (
                "red.natural_spread.chance_to_spread_to_connected_node",
                self.red.natural_spread.chance_to_spread_to_connected_node,
            ),
            (
                "red.natural_spread.chance_to_spread_to_unconnected_node",
                self.red.natural_spread.chance_to_spread_to_unconnected_node,
            ),
            (
                "blue.chance_to_immediately_discover_intrusion",
                self.blue.chance_to_immediately_discover_intrusion,
            ),
            (
                "blue.chance_to_discover_intrusion_on_scan",
                self.blue.chance_to_discover_intrusion_on_scan,
            ),
            (
                "blue.chance_to_immediately_discover_intrusion_decoy",
                self.blue.chance_to_immediately_discover_intrusion_decoy,
            ),
            (
                "blue.chance_to_discover_intrusion_on_scan_decoy",
                self.blue.chance_to_discover_intrusion_on_scan_decoy,
            ),
            (
                "blue.chance_to_discover_failed_attack",
                self.blue.chance_to_discover_failed_attack,
            ),
            (
                "blue.chance_to_discover_failed_attack_decoy",
                self.blue.chance_to_discover_failed_attack_decoy,
            ),
            (
                "blue.chance_to_discover_succeeded_attack_decoy",
                self.blue.chance_to_discover_succeeded_attack_decoy,
            ),
            (
                "blue.chance_to_discover_succeeded_attack_known_compromise",
                self.blue
                    .chance_to_discover_succeeded_attack_known_compromise,
            ),
            (
                "blue.chance_to_discover_succeeded_attack_unknown_compromise",
                self.blue
                    .chance_to_discover_succeeded_attack_unknown_compromise,
            ),
        ];
        for (name, value) in chances {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ChanceOutOfRange { name, value });
            }
        }

        let weights = [
            ("basic_attack", self.red.action_weights.basic_attack),
            ("spread", self.red.action_weights.spread),
            ("intrude", self.red.action_weights.intrude),
            ("random_move", self.red.action_weights.random_move),
            ("do_nothing", self.red.action_weights.do_nothing),
        ];
        let mut total = 0.0;
        for (name, value) in weights {
            if value < 0.0 {
                return Err(ConfigError::NegativeActionWeight { name, value });
            }
            total += value;
        }
        if total <= 0.0 {
            return Err(ConfigError::NoRedActionEnabled);
        }

        if let Some(frac) = self.rules.lose_when_fraction_lost {
            if !(frac > 0.0 && frac <= 1.0) {
                return Err(ConfigError::LossFractionOutOfRange(frac));
            }
        }
        if self.rules.max_steps == 0 {
            return Err(ConfigError::ZeroMaxSteps);
        }
        if self.red.zero_day.enabled && self.red.zero_day.days_per_charge == 0 {
            return Err(ConfigError::ZeroDayPeriodZero);
        }
        if self.blue.can_deploy_decoys && self.blue.max_decoys == 0 {
            return Err(ConfigError::ZeroDecoyCapacity);
        }

        let (lo, hi) = topology.vulnerability_bounds();
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(ConfigError::BadVulnerabilityBounds(lo, hi));
        }

        let has_target = topology.target_node().is_some();
        if self.rules.lose_when_target_node_lost && !has_target {
            return Err(ConfigError::MissingTargetNode {
                context: "rules.lose_when_target_node_lost",
            });
        }
        if matches!(self.red.targeting, TargetStrategy::TowardsTarget { .. }) && !has_target {
            return Err(ConfigError::MissingTargetNode {
                context: "red.targeting",
            });
        }
        if self.rules.lose_when_high_value_node_lost
            && topology.high_value_nodes().is_empty()
            && !(self.reset.reroll_high_value_nodes && self.reset.high_value_count > 0)
        {
            return Err(ConfigError::MissingHighValueNodes);
        }
        if self.reset.reroll_entry_nodes && self.reset.entry_node_count > topology.node_count() {
            return Err(ConfigError::TooManyEntryNodes {
                count: self.reset.entry_node_count,
                nodes: topology.node_count(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates_against_demo() {
        let cfg = GameConfig::default();
        cfg.validate(&Topology::demo()).unwrap();
    }

    #[test]
    fn rejects_out_of_range_chance() {
        let mut cfg = GameConfig::default();
        cfg.blue.chance_to_discover_intrusion_on_scan = 1.5;
        let err = cfg.validate(&Topology::demo()).unwrap_err();
        assert!(matches!(err, ConfigError::ChanceOutOfRange { .. }));
    }

    #[test]
    fn rejects_all_zero_red_weights() {
        let mut cfg = GameConfig::default();
        cfg.red.action_weights = RedActionWeights {
            basic_attack: 0.0,
            spread: 0.0,
            intrude: 0.0,
            random_move: 0.0,
            do_nothing: 0.0,
        };
        let err = cfg.validate(&Topology::demo()).unwrap_err();
        assert!(matches!(err, ConfigError::NoRedActionEnabled));
    }

    #[test]
    fn rejects_target_rule_without_target() {
        let mut cfg = GameConfig::default();
        cfg.rules.lose_when_target_node_lost = true;
        let topo = Topology::line(3);
        let err = cfg.validate(&topo).unwrap_err();
        assert!(matches!(err, ConfigError::MissingTargetNode { .. }));
    }

    #[test]
    fn rejects_bad_loss_fraction() {
        let mut cfg = GameConfig::default();
        cfg.rules.lose_when_fraction_lost = Some(1.2);
        let err = cfg.validate(&Topology::demo()).unwrap_err();
        assert!(matches!(err, ConfigError::LossFractionOutOfRange(_)));
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = GameConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: GameConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rules.max_steps, cfg.rules.max_steps);
        assert_eq!(back.blue.max_decoys, cfg.blue.max_decoys);
    }
}
