//! Palisade core library.
//!
//! This crate exposes a red-vs-blue network attack/defence simulator with a
//! Gym-style reinforcement-learning interface. The binary (`src/main.rs`) is
//! just a thin research harness around these components.
//!
//! # Architecture
//!
//! The codebase keeps a strict single-writer boundary around simulation
//! state:
//!
//! - **Simulation Engine** (`engine`): the single source of truth for node
//!   and graph state. Every read and mutation performed by the two agents
//!   goes through it. Owns the per-turn attack logs, red's tracked location,
//!   the decoy rotation and the episode RNG.
//!
//! - **Red Action Set** (`red`): target selection and the catalogue of
//!   attack primitives (basic attack, spread, intrude, natural spread,
//!   zero-day, movement), parametrised entirely by configuration weights.
//!
//! - **Blue Action Set** (`blue`): defensive primitives and the decode of
//!   the flat integer action into a typed `BlueAction`.
//!
//! - **Turn Orchestrator** (`env`): `GameEnv` composes one red turn and one
//!   blue turn per `step`, adjudicates win/loss, computes the reward and
//!   returns `(observation, reward, done, info)`.
//!
//! - **Topology / State** (`topology`, `state`, `graph`): the static network
//!   description, the mutable per-node record table and the shared
//!   undirected-graph plumbing underneath both.
//!
//! Determinism: the engine owns a seeded `ChaCha8Rng`; same seed plus the
//! same action sequence reproduces an episode exactly. Repeatable replays
//! pass the seed to `GameEnv::reset`.

pub mod blue;
pub mod config;
pub mod engine;
pub mod env;
pub mod graph;
pub mod logging;
pub mod observation;
pub mod red;
pub mod reward;
pub mod state;
pub mod topology;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use config::{
    BlueConfig, ConfigError, EntryPlacement, GameConfig, GameRulesConfig, HighValuePlacement,
    MakeSafeEffect, NaturalSpreadConfig, ObservationConfig, RedActionWeights, RedConfig,
    ResetConfig, RewardConfig, TargetStrategy, TelemetryConfig, ZeroDayConfig,
};

pub use engine::SimEngine;

pub use env::{EpisodeSummary, GameEnv, StepDetails, StepInfo, StepResult};

pub use blue::{BlueAction, BlueAgent, VULNERABILITY_STEP};
pub use red::RedAgent;

pub use reward::{RewardArgs, RewardFunction};

pub use graph::NetGraph;
pub use state::{NodeState, NodeTable};
pub use topology::{Topology, TopologySpec};

pub use logging::{snapshot_of, EventSink, FileSink, NodeSnapshot, NoopSink, StepSnapshot};

pub use types::{
    node_id, AttackEvent, BlueActionKind, BlueOutcome, BlueView, NodeId, RedActionKind,
    RedOutcome, TerminationReason, Winner,
};

// --- Cross-module smoke tests ----------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_env(seed: u64) -> GameEnv {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(seed);
        GameEnv::new(cfg, &Topology::demo()).unwrap()
    }

    /// A default episode on the demo network terminates within the step
    /// budget, one way or the other.
    #[test]
    fn default_episode_terminates() {
        let mut env = demo_env(99);
        env.reset(Some(99));
        let space = env.action_space_size();
        let mut done = false;
        for i in 0..env.engine().config().rules.max_steps {
            let result = env.step((i as usize * 7) % space);
            if result.done {
                done = true;
                break;
            }
        }
        assert!(done || env.current_duration() == env.engine().config().rules.max_steps);
        assert!(env.summary().winner.is_some());
    }

    /// Observation and action-space sizes are stable across reset.
    #[test]
    fn sizes_survive_reset() {
        let mut env = demo_env(5);
        let obs_len = env.observation_size();
        let space = env.action_space_size();

        let obs = env.reset(Some(5));
        assert_eq!(obs.len(), obs_len);
        env.step(0);
        env.step(space - 1);
        let obs = env.reset(Some(6));
        assert_eq!(obs.len(), obs_len);
        assert_eq!(env.action_space_size(), space);
    }
}
