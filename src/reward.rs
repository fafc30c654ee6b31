// src/reward.rs
//
// Per-step reward functions, selected by RewardConfig. Each function sees
// snapshots of the network taken immediately before and after blue's
// move; terminal rewards (loss, max-steps) are added separately by the
// orchestrator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::BlueActionKind;

/// Which reward function runs after blue's move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardFunction {
    /// Compromise-delta shaping with an isolation penalty.
    Standard,
    /// The fraction of nodes still safe after blue's move.
    SafeFraction,
    /// A flat unit reward for every survived step.
    OnePerStep,
    /// Always zero; terminal rewards only.
    Zero,
}

/// Pre/post snapshots of one blue move.
#[derive(Debug, Clone)]
pub struct RewardArgs<'a> {
    pub blue_action: BlueActionKind,
    /// Ground-truth compromise before/after blue's move.
    pub start_state: &'a BTreeMap<String, bool>,
    pub end_state: &'a BTreeMap<String, bool>,
    pub start_vulnerabilities: &'a BTreeMap<String, f64>,
    pub end_vulnerabilities: &'a BTreeMap<String, f64>,
    pub start_isolation: &'a BTreeMap<String, bool>,
    pub end_isolation: &'a BTreeMap<String, bool>,
    /// Blue's belief before/after the move.
    pub start_blue_view: &'a BTreeMap<String, bool>,
    pub end_blue_view: &'a BTreeMap<String, bool>,
}

/// Compute the step reward for `function` over the given snapshots.
pub fn compute(function: RewardFunction, args: &RewardArgs<'_>) -> f64 {
    match function {
        RewardFunction::Standard => standard(args),
        RewardFunction::SafeFraction => safe_fraction(args),
        RewardFunction::OnePerStep => 1.0,
        RewardFunction::Zero => 0.0,
    }
}

/// Reward nodes recovered by blue, punish nodes lost during the step,
/// charge a small holding cost per isolated node, and grant a small
/// shaping bonus for lowering mean vulnerability.
fn standard(args: &RewardArgs<'_>) -> f64 {
    let mut reward = 0.0;

    for (id, before) in args.start_state {
        let after = args.end_state.get(id).copied().unwrap_or(*before);
        if *before && !after {
            reward += 1.0;
        } else if !*before && after {
            reward -= 1.0;
        }
    }

    let isolated = args.end_isolation.values().filter(|v| **v).count();
    reward -= 0.1 * isolated as f64;

    let mean_vuln_before = mean(args.start_vulnerabilities);
    let mean_vuln_after = mean(args.end_vulnerabilities);
    reward += (mean_vuln_before - mean_vuln_after).max(0.0);

    reward
}

fn safe_fraction(args: &RewardArgs<'_>) -> f64 {
    if args.end_state.is_empty() {
        return 0.0;
    }
    let safe = args.end_state.values().filter(|v| !**v).count();
    safe as f64 / args.end_state.len() as f64
}

fn mean(values: &BTreeMap<String, f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.values().sum::<f64>() / values.len() as f64
}
