// src/env.rs
//
// The turn orchestrator: a Gym-style environment composing one red turn
// and one blue turn per step.
//
// Per-episode state machine:
//   Reset -> { RedTurn -> LossCheck -> [ Terminal
//            | BlueTurn -> RewardCheck -> { Continue | Terminal } ] }
//
// reset(seed) returns the initial observation; step(action) returns
// (observation, reward, done, info). Determinism across replays requires
// passing the seed to reset, which reseeds the engine RNG first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::blue::BlueAgent;
use crate::config::{ConfigError, GameConfig};
use crate::engine::SimEngine;
use crate::logging::{snapshot_of, EventSink, NoopSink};
use crate::red::RedAgent;
use crate::reward::{self, RewardArgs};
use crate::topology::Topology;
use crate::types::{
    BlueActionKind, BlueOutcome, RedActionKind, RedOutcome, TerminationReason, Winner,
};

/// Result of a single environment step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// The observation after both turns resolved.
    pub observation: Vec<f64>,
    /// The reward for this step.
    pub reward: f64,
    /// Whether the episode has terminated.
    pub done: bool,
    /// Structured diagnostics for this step.
    pub info: StepInfo,
}

/// Per-step diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInfo {
    /// Termination reason if done.
    pub termination_reason: Option<TerminationReason>,
    /// Winning side if done.
    pub winner: Option<Winner>,
    /// Steps elapsed including this one.
    pub duration: u64,
    /// The red action that resolved this turn.
    pub red_action: RedActionKind,
    /// Targets red attacked this turn.
    pub red_targets: Vec<String>,
    /// Per-target success flags, parallel to `red_targets`.
    pub red_successes: Vec<bool>,
    /// The blue action that resolved this turn.
    pub blue_action: BlueActionKind,
    /// The node blue's action touched, if any.
    pub blue_target: Option<String>,
    /// Extended diagnostics, present when configured.
    pub details: Option<StepDetails>,
}

/// Extended per-step diagnostics, gated by `TelemetryConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDetails {
    /// Ground truth before blue's move.
    pub pre_compromised: BTreeMap<String, bool>,
    /// Ground truth after blue's move.
    pub post_compromised: BTreeMap<String, bool>,
    pub pre_vulnerabilities: BTreeMap<String, f64>,
    pub post_vulnerabilities: BTreeMap<String, f64>,
    pub red_location: Option<String>,
    /// Live edge set after both turns.
    pub edges: Vec<(String, String)>,
}

/// Counters accumulated across one episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub steps: u64,
    pub winner: Option<Winner>,
    pub termination_reason: Option<TerminationReason>,
    pub total_reward: f64,
    pub red_actions: BTreeMap<String, u64>,
    pub blue_actions: BTreeMap<String, u64>,
}

impl EpisodeSummary {
    fn record_red(&mut self, kind: RedActionKind) {
        *self.red_actions.entry(kind.as_str().to_string()).or_insert(0) += 1;
    }

    fn record_blue(&mut self, kind: BlueActionKind) {
        *self.blue_actions.entry(kind.as_str().to_string()).or_insert(0) += 1;
    }
}

/// Gym-style red-vs-blue environment.
pub struct GameEnv {
    config: GameConfig,
    engine: SimEngine,
    red: RedAgent,
    blue: BlueAgent,
    sink: Box<dyn EventSink>,
    current_duration: u64,
    done: bool,
    termination: Option<TerminationReason>,
    current_reward: f64,
    summary: EpisodeSummary,
}

impl GameEnv {
    /// Validate the configuration and build the environment.
    pub fn new(config: GameConfig, topology: &Topology) -> Result<Self, ConfigError> {
        config.validate(topology)?;
        let engine = SimEngine::new(&config, topology);
        let red = RedAgent::new(config.red.clone());
        let blue = BlueAgent::new(config.blue.clone());
        Ok(Self {
            config,
            engine,
            red,
            blue,
            sink: Box::new(NoopSink),
            current_duration: 0,
            done: false,
            termination: None,
            current_reward: 0.0,
            summary: EpisodeSummary::default(),
        })
    }

    /// Replace the event sink.
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Reset the episode, reseeding the engine RNG when a seed is given.
    /// Returns the initial observation.
    pub fn reset(&mut self, seed: Option<u64>) -> Vec<f64> {
        if let Some(seed) = seed {
            self.engine.reseed(seed);
        }
        self.engine.reset();
        self.red.reset();
        self.current_duration = 0;
        self.done = false;
        self.termination = None;
        self.current_reward = 0.0;
        self.summary = EpisodeSummary::default();
        self.engine.current_observation()
    }

    /// Resolve one full red-then-blue turn for the given flat blue action.
    pub fn step(&mut self, action: usize) -> StepResult {
        if self.done {
            return StepResult {
                observation: self.engine.current_observation(),
                reward: 0.0,
                done: true,
                info: StepInfo {
                    termination_reason: self.termination,
                    winner: self.termination.map(|t| t.winner()),
                    duration: self.current_duration,
                    red_action: RedActionKind::DoNothing,
                    red_targets: Vec::new(),
                    red_successes: Vec::new(),
                    blue_action: BlueActionKind::DoNothing,
                    blue_target: None,
                    details: None,
                },
            };
        }

        // ----- Red turn ------------------------------------------------
        self.engine.clear_stored_attacks();
        let red_outcome = if self.current_duration < self.config.rules.grace_period {
            self.red.do_nothing()
        } else {
            self.red.perform_action(&mut self.engine)
        };
        self.summary.record_red(red_outcome.action);

        // ----- Loss adjudication ---------------------------------------
        if let Some(reason) = self.check_loss() {
            let mut reward = self.config.reward.loss_reward;
            if self.config.reward.scale_loss_by_duration {
                let max = self.config.rules.max_steps as f64;
                let left = (self.config.rules.max_steps - self.current_duration) as f64;
                reward *= left / max;
            }
            self.current_duration += 1;
            return self.finish(reason, reward, red_outcome, BlueOutcome::nothing(), None);
        }

        // ----- Blue turn -----------------------------------------------
        let pre_state = self.engine.nodes().true_state_map();
        let pre_vulns = self.engine.nodes().vulnerability_map();
        let pre_isolation = self.engine.nodes().isolation_map();
        let pre_view = self.engine.nodes().blue_view_map();

        let decoded = self.blue.decode(action, &self.engine);
        let blue_outcome = self.blue.perform(&decoded, &mut self.engine);
        self.summary.record_blue(blue_outcome.action);

        let post_state = self.engine.nodes().true_state_map();
        let post_vulns = self.engine.nodes().vulnerability_map();
        let post_isolation = self.engine.nodes().isolation_map();
        let post_view = self.engine.nodes().blue_view_map();

        // ----- Reward --------------------------------------------------
        let mut reward = reward::compute(
            self.config.reward.function,
            &RewardArgs {
                blue_action: blue_outcome.action,
                start_state: &pre_state,
                end_state: &post_state,
                start_vulnerabilities: &pre_vulns,
                end_vulnerabilities: &post_vulns,
                start_isolation: &pre_isolation,
                end_isolation: &post_isolation,
                start_blue_view: &pre_view,
                end_blue_view: &post_view,
            },
        );

        self.current_duration += 1;

        // ----- Max-steps termination -----------------------------------
        if self.current_duration >= self.config.rules.max_steps {
            let mut terminal = self.config.reward.max_steps_reward;
            if self.config.reward.scale_max_steps_by_safe_fraction {
                let n = self.engine.node_count();
                if n > 0 {
                    let safe = n - self.engine.count_compromised();
                    terminal *= safe as f64 / n as f64;
                }
            }
            reward += terminal;
            let details = self.build_details(&pre_state, &pre_vulns);
            return self.finish(
                TerminationReason::MaxStepsReached,
                reward,
                red_outcome,
                blue_outcome,
                details,
            );
        }

        // ----- Continue ------------------------------------------------
        self.current_reward = reward;
        self.summary.total_reward += reward;
        self.summary.steps = self.current_duration;
        self.log_snapshot();

        let details = self.build_details(&pre_state, &pre_vulns);
        StepResult {
            observation: self.engine.current_observation(),
            reward,
            done: false,
            info: self.build_info(None, red_outcome, blue_outcome, details),
        }
    }

    /// Evaluate loss conditions in fixed priority order. All conditions
    /// share one ground-truth filter, the compromised-node count.
    fn check_loss(&self) -> Option<TerminationReason> {
        let rules = &self.config.rules;
        let n = self.engine.node_count();
        let compromised = self.engine.count_compromised();

        if rules.lose_when_all_nodes_lost && n > 0 && compromised == n {
            return Some(TerminationReason::AllNodesLost);
        }
        if let Some(fraction) = rules.lose_when_fraction_lost {
            if n > 0 && compromised as f64 / n as f64 >= fraction {
                return Some(TerminationReason::FractionLost);
            }
        }
        if rules.lose_when_high_value_node_lost {
            let lost = self
                .engine
                .high_value_nodes()
                .iter()
                .any(|id| self.engine.nodes().get(id).compromised);
            if lost {
                return Some(TerminationReason::HighValueNodeLost);
            }
        }
        if rules.lose_when_target_node_lost {
            if let Some(target) = self.engine.target_node() {
                if self.engine.nodes().get(target).compromised {
                    return Some(TerminationReason::TargetNodeLost);
                }
            }
        }
        None
    }

    fn finish(
        &mut self,
        reason: TerminationReason,
        reward: f64,
        red_outcome: RedOutcome,
        blue_outcome: BlueOutcome,
        details: Option<StepDetails>,
    ) -> StepResult {
        self.done = true;
        self.termination = Some(reason);
        self.current_reward = reward;
        self.summary.total_reward += reward;
        self.summary.steps = self.current_duration;
        self.summary.winner = Some(reason.winner());
        self.summary.termination_reason = Some(reason);
        self.log_snapshot();

        StepResult {
            observation: self.engine.current_observation(),
            reward,
            done: true,
            info: self.build_info(Some(reason), red_outcome, blue_outcome, details),
        }
    }

    fn build_info(
        &self,
        reason: Option<TerminationReason>,
        red_outcome: RedOutcome,
        blue_outcome: BlueOutcome,
        details: Option<StepDetails>,
    ) -> StepInfo {
        StepInfo {
            termination_reason: reason,
            winner: reason.map(|r| r.winner()),
            duration: self.current_duration,
            red_action: red_outcome.action,
            red_targets: red_outcome
                .target_nodes
                .iter()
                .map(|n| n.to_string())
                .collect(),
            red_successes: red_outcome.successes,
            blue_action: blue_outcome.action,
            blue_target: blue_outcome.node.map(|n| n.to_string()),
            details,
        }
    }

    fn build_details(
        &self,
        pre_state: &BTreeMap<String, bool>,
        pre_vulns: &BTreeMap<String, f64>,
    ) -> Option<StepDetails> {
        if !self.config.telemetry.detailed_step_info {
            return None;
        }
        Some(StepDetails {
            pre_compromised: pre_state.clone(),
            post_compromised: self.engine.nodes().true_state_map(),
            pre_vulnerabilities: pre_vulns.clone(),
            post_vulnerabilities: self.engine.nodes().vulnerability_map(),
            red_location: self.engine.red_location().map(|n| n.to_string()),
            edges: self
                .engine
                .current_graph()
                .edge_list()
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        })
    }

    fn log_snapshot(&mut self) {
        if self.config.telemetry.step_snapshots {
            let snapshot = snapshot_of(&self.engine, self.current_duration);
            self.sink.log_step(&snapshot);
        }
    }

    // ----- Accessors for the RL loop and external tooling --------------

    /// Size of the flat blue action space.
    pub fn action_space_size(&self) -> usize {
        self.blue.action_space_size(&self.engine)
    }

    /// Length of the observation vector.
    pub fn observation_size(&self) -> usize {
        self.engine.observation_size()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn current_duration(&self) -> u64 {
        self.current_duration
    }

    /// Reward of the most recent step.
    pub fn current_reward(&self) -> f64 {
        self.current_reward
    }

    pub fn summary(&self) -> &EpisodeSummary {
        &self.summary
    }

    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    /// Mutable engine access for harnesses and tests.
    pub fn engine_mut(&mut self) -> &mut SimEngine {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::reward::RewardFunction;

    fn passive_config() -> GameConfig {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(42);
        cfg.red.action_weights.basic_attack = 0.0;
        cfg.red.action_weights.spread = 0.0;
        cfg.red.action_weights.intrude = 0.0;
        cfg.red.action_weights.random_move = 0.0;
        cfg.red.action_weights.do_nothing = 1.0;
        cfg.reward.function = RewardFunction::Zero;
        cfg
    }

    fn do_nothing_action(env: &GameEnv) -> usize {
        // Decoy block then scan; do-nothing follows scan in the globals.
        env.engine().config().blue.decoy_capacity() + 1
    }

    #[test]
    fn grace_period_forces_red_pass() {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(8);
        cfg.rules.grace_period = 3;
        cfg.red.guaranteed_compromise = true;
        cfg.red.action_weights = crate::config::RedActionWeights {
            basic_attack: 1.0,
            spread: 0.0,
            intrude: 0.0,
            random_move: 0.0,
            do_nothing: 0.0,
        };
        cfg.reward.function = RewardFunction::Zero;
        let topo = Topology::line(3).with_entry_nodes(&["n0"]);
        let mut env = GameEnv::new(cfg, &topo).unwrap();
        env.reset(Some(1));

        let action = do_nothing_action(&env);
        for _ in 0..3 {
            let result = env.step(action);
            assert_eq!(result.info.red_action, RedActionKind::DoNothing);
        }
        assert_eq!(env.engine().count_compromised(), 0);
        let result = env.step(action);
        assert_ne!(result.info.red_action, RedActionKind::DoNothing);
    }

    #[test]
    fn loss_reward_scales_with_remaining_budget() {
        let mut cfg = passive_config();
        cfg.rules.max_steps = 10;
        cfg.rules.lose_when_fraction_lost = Some(0.5);
        cfg.reward.loss_reward = -100.0;
        cfg.reward.scale_loss_by_duration = true;
        let topo = Topology::line(4).with_entry_nodes(&["n0"]);
        let mut env = GameEnv::new(cfg, &topo).unwrap();
        env.reset(Some(2));

        let action = do_nothing_action(&env);
        // Four passive steps, then force the loss condition by hand.
        for _ in 0..4 {
            assert!(!env.step(action).done);
        }
        env.engine_mut().attack_node("n0", 0.0, false, false, true);
        env.engine_mut().attack_node("n1", 0.0, false, false, true);
        let result = env.step(action);
        assert!(result.done);
        assert_eq!(
            result.info.termination_reason,
            Some(TerminationReason::FractionLost)
        );
        // Loss at duration 4 of 10: reward scaled by 6/10.
        assert!((result.reward + 60.0).abs() < 1e-9);
    }

    #[test]
    fn detailed_info_is_config_gated() {
        let mut cfg = passive_config();
        let topo = Topology::line(3);
        let mut env = GameEnv::new(cfg.clone(), &topo).unwrap();
        env.reset(Some(3));
        let action = do_nothing_action(&env);
        assert!(env.step(action).info.details.is_none());

        cfg.telemetry.detailed_step_info = true;
        let mut env = GameEnv::new(cfg, &topo).unwrap();
        env.reset(Some(3));
        let action = do_nothing_action(&env);
        let info = env.step(action).info;
        let details = info.details.expect("details enabled");
        assert_eq!(details.pre_compromised.len(), 3);
        assert_eq!(details.edges.len(), 2);
    }

    #[test]
    fn stepping_a_finished_episode_is_inert() {
        let mut cfg = passive_config();
        cfg.rules.max_steps = 1;
        let topo = Topology::line(3);
        let mut env = GameEnv::new(cfg, &topo).unwrap();
        env.reset(Some(4));
        let action = do_nothing_action(&env);
        let first = env.step(action);
        assert!(first.done);

        let again = env.step(action);
        assert!(again.done);
        assert_eq!(again.reward, 0.0);
        assert_eq!(
            again.info.termination_reason,
            Some(TerminationReason::MaxStepsReached)
        );
    }
}
