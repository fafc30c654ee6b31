// src/red.rs
//
// The red agent: target selection and the catalogue of attack primitives.
// Stateless beyond the zero-day bank; every state read and mutation goes
// through the engine. Target choice and the weighted action draw are
// driven entirely by RedConfig.

use rand::Rng;

use crate::config::{RedConfig, TargetStrategy};
use crate::engine::SimEngine;
use crate::types::{AttackEvent, NodeId, RedActionKind, RedOutcome};

/// One candidate attack: the victim and the red-held node mounting it
/// (`None` for entry-node injection from outside).
#[derive(Debug, Clone)]
struct Candidate {
    target: NodeId,
    attacker: Option<NodeId>,
}

pub struct RedAgent {
    cfg: RedConfig,
    zero_day_charges: u32,
    day_counter: u64,
}

impl RedAgent {
    pub fn new(cfg: RedConfig) -> Self {
        let zero_day_charges = if cfg.zero_day.enabled {
            cfg.zero_day.start_charges
        } else {
            0
        };
        Self {
            cfg,
            zero_day_charges,
            day_counter: 0,
        }
    }

    /// Reset per-episode red state (the zero-day bank and day counter).
    pub fn reset(&mut self) {
        self.zero_day_charges = if self.cfg.zero_day.enabled {
            self.cfg.zero_day.start_charges
        } else {
            0
        };
        self.day_counter = 0;
    }

    pub fn zero_day_charges(&self) -> u32 {
        self.zero_day_charges
    }

    // ----- Turn composition --------------------------------------------

    /// Play one full red turn: natural spread if enabled, then a zero-day
    /// attempt, otherwise one weighted action with a random-move fallback
    /// when no target exists. All attack attempts are forwarded to the
    /// engine's stored-attack logs.
    pub fn perform_action(&mut self, engine: &mut SimEngine) -> RedOutcome {
        let mut events: Vec<AttackEvent> = Vec::new();

        if self.cfg.natural_spread.enabled {
            let spread = self.natural_spread(engine);
            events.extend(spread.attack_events());
        }

        self.increment_day();

        let outcome = match self.zero_day_attack(engine) {
            Some(zd) => zd,
            None => {
                let chosen = self.choose_action(engine);
                let outcome = self.execute(chosen, engine);
                if outcome.action == RedActionKind::NoPossibleTargets {
                    self.random_move(engine)
                } else {
                    outcome
                }
            }
        };

        events.extend(outcome.attack_events());
        engine.update_stored_attacks(&events);
        outcome
    }

    fn execute(&self, kind: RedActionKind, engine: &mut SimEngine) -> RedOutcome {
        match kind {
            RedActionKind::BasicAttack => self.basic_attack(engine),
            RedActionKind::Spread => self.spread(engine),
            RedActionKind::Intrude => self.intrude(engine),
            RedActionKind::RandomMove => self.random_move(engine),
            _ => RedOutcome::sentinel(RedActionKind::DoNothing),
        }
    }

    /// Weighted draw over the enabled action set.
    fn choose_action(&self, engine: &mut SimEngine) -> RedActionKind {
        let w = &self.cfg.action_weights;
        let table = [
            (RedActionKind::BasicAttack, w.basic_attack),
            (RedActionKind::Spread, w.spread),
            (RedActionKind::Intrude, w.intrude),
            (RedActionKind::RandomMove, w.random_move),
            (RedActionKind::DoNothing, w.do_nothing),
        ];
        let total: f64 = table.iter().map(|(_, w)| w.max(0.0)).sum();
        if total <= 0.0 {
            return RedActionKind::DoNothing;
        }
        let mut draw = engine.rng_mut().gen::<f64>() * total;
        for (kind, weight) in table {
            let weight = weight.max(0.0);
            draw -= weight;
            if weight > 0.0 && draw <= 0.0 {
                return kind;
            }
        }
        RedActionKind::DoNothing
    }

    // ----- Target selection --------------------------------------------

    /// Pick a target and the attacking node, or `None` when the candidate
    /// set is empty.
    fn choose_target(&self, engine: &mut SimEngine) -> Option<Candidate> {
        let candidates = self.candidates(engine);
        if candidates.is_empty() {
            return None;
        }

        if let TargetStrategy::TowardsTarget {
            always_shortest: true,
        } = self.cfg.targeting
        {
            return self.pick_shortest(engine, candidates);
        }

        let weights: Vec<f64> = candidates
            .iter()
            .map(|c| self.candidate_weight(engine, &c.target))
            .collect();
        let total: f64 = weights.iter().sum();

        let idx = if total <= 0.0 {
            engine.rng_mut().gen_range(0..candidates.len())
        } else {
            let mut draw = engine.rng_mut().gen::<f64>() * total;
            let mut chosen = candidates.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                draw -= w;
                if draw <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        Some(candidates[idx].clone())
    }

    /// Safe nodes reachable from red-held nodes, plus safe entry nodes.
    fn candidates(&self, engine: &SimEngine) -> Vec<Candidate> {
        let mut out = Vec::new();

        let owned: Vec<NodeId> = if self.cfg.attack_from_any_owned_node {
            engine.nodes().compromised_ids()
        } else {
            engine
                .red_location()
                .filter(|loc| engine.nodes().get(loc).compromised)
                .cloned()
                .into_iter()
                .collect()
        };

        for attacker in owned {
            for nb in engine.current_graph().neighbors(&attacker) {
                if !engine.nodes().get(&nb).compromised {
                    out.push(Candidate {
                        target: nb,
                        attacker: Some(attacker.clone()),
                    });
                }
            }
        }

        for entry in engine.entry_nodes() {
            if !engine.nodes().get(entry).compromised {
                out.push(Candidate {
                    target: entry.clone(),
                    attacker: None,
                });
            }
        }

        out
    }

    fn candidate_weight(&self, engine: &SimEngine, target: &NodeId) -> f64 {
        match self.cfg.targeting {
            TargetStrategy::Random => 1.0,
            TargetStrategy::PreferConnected => engine.current_graph().degree(target) as f64,
            TargetStrategy::PreferUnconnected => {
                1.0 / engine.current_graph().degree(target).max(1) as f64
            }
            TargetStrategy::PreferVulnerable => engine.nodes().get(target).vulnerability,
            TargetStrategy::PreferResilient => {
                1.0 / engine.nodes().get(target).vulnerability.max(1e-4)
            }
            TargetStrategy::TowardsTarget { .. } => {
                let Some(goal) = engine.target_node() else {
                    return 1.0;
                };
                let dists = engine.current_graph().distances_from(goal);
                match dists.get(target.as_ref()) {
                    Some(0) => 1.0,
                    Some(d) => 1.0 / *d as f64,
                    None => 0.0,
                }
            }
        }
    }

    /// Strictly nearest candidate to the designated target node, uniform
    /// among ties. Unreachable candidates are dropped; an all-unreachable
    /// set falls back to a uniform pick.
    fn pick_shortest(
        &self,
        engine: &mut SimEngine,
        candidates: Vec<Candidate>,
    ) -> Option<Candidate> {
        let Some(goal) = engine.target_node().cloned() else {
            let i = engine.rng_mut().gen_range(0..candidates.len());
            return Some(candidates[i].clone());
        };
        let dists = engine.current_graph().distances_from(&goal);
        let mut best: Option<usize> = None;
        let mut ties: Vec<usize> = Vec::new();
        for (i, c) in candidates.iter().enumerate() {
            let Some(d) = dists.get(c.target.as_ref()).copied() else {
                continue;
            };
            match best {
                Some(b) if d > b => {}
                Some(b) if d == b => ties.push(i),
                _ => {
                    best = Some(d);
                    ties = vec![i];
                }
            }
        }
        if ties.is_empty() {
            let i = engine.rng_mut().gen_range(0..candidates.len());
            return Some(candidates[i].clone());
        }
        let pick = ties[engine.rng_mut().gen_range(0..ties.len())];
        Some(candidates[pick].clone())
    }

    // ----- Primitives --------------------------------------------------

    /// Single weighted-target attack with the configured skill flags.
    pub fn basic_attack(&self, engine: &mut SimEngine) -> RedOutcome {
        let Some(candidate) = self.choose_target(engine) else {
            return RedOutcome::sentinel(RedActionKind::NoPossibleTargets);
        };
        let success = engine.attack_node(
            &candidate.target,
            self.cfg.skill,
            self.cfg.use_skill,
            self.cfg.use_vulnerabilities,
            self.cfg.guaranteed_compromise,
        );
        if success {
            self.advance_location(engine, &candidate.target);
        }
        RedOutcome::single(
            RedActionKind::BasicAttack,
            candidate.attacker,
            candidate.target,
            success,
        )
    }

    /// Attempt every safe node adjacent to a red-held node, independently,
    /// at the configured spread skill.
    pub fn spread(&self, engine: &mut SimEngine) -> RedOutcome {
        let mut pairs: Vec<(NodeId, NodeId)> = Vec::new();
        for owner in engine.nodes().compromised_ids() {
            for nb in engine.current_graph().neighbors(&owner) {
                if !engine.nodes().get(&nb).compromised {
                    pairs.push((owner.clone(), nb));
                }
            }
        }
        if pairs.is_empty() {
            return RedOutcome::sentinel(RedActionKind::NoPossibleTargets);
        }

        let mut outcome = RedOutcome::sentinel(RedActionKind::Spread);
        for (attacker, target) in pairs {
            // An earlier pair this turn may already have taken the node.
            if engine.nodes().get(&target).compromised {
                continue;
            }
            let success = engine.attack_node(
                &target,
                self.cfg.spread_skill,
                true,
                self.cfg.use_vulnerabilities,
                false,
            );
            outcome.attacking_nodes.push(Some(attacker));
            outcome.target_nodes.push(target);
            outcome.successes.push(success);
        }
        outcome
    }

    /// Attempt every safe node in the network, independently, at the
    /// configured intrusion skill. No adjacency requirement.
    pub fn intrude(&self, engine: &mut SimEngine) -> RedOutcome {
        let targets = engine.nodes().safe_ids();
        if targets.is_empty() {
            return RedOutcome::sentinel(RedActionKind::NoPossibleTargets);
        }
        let mut outcome = RedOutcome::sentinel(RedActionKind::Intrude);
        for target in targets {
            let success = engine.attack_node(
                &target,
                self.cfg.intrude_skill,
                true,
                self.cfg.use_vulnerabilities,
                false,
            );
            outcome.attacking_nodes.push(None);
            outcome.target_nodes.push(target);
            outcome.successes.push(success);
        }
        outcome
    }

    /// Environmental spreading: safe nodes adjacent to a compromised node
    /// convert at one chance, the rest at a second (usually lower) chance.
    /// Adjacency is judged against the turn-start compromised set, so one
    /// conversion cannot cascade within the same turn. Runs every turn
    /// when enabled, independent of red's chosen action.
    pub fn natural_spread(&self, engine: &mut SimEngine) -> RedOutcome {
        let infected_at_start = engine.nodes().compromised_ids();
        let mut outcome = RedOutcome::sentinel(RedActionKind::Spread);
        for target in engine.nodes().safe_ids() {
            let infected_neighbour = engine
                .current_graph()
                .neighbors(&target)
                .into_iter()
                .find(|nb| infected_at_start.contains(nb));
            let p = if infected_neighbour.is_some() {
                self.cfg.natural_spread.chance_to_spread_to_connected_node
            } else {
                self.cfg.natural_spread.chance_to_spread_to_unconnected_node
            };
            if engine.chance(p) {
                engine.attack_node(&target, 1.0, false, false, true);
                outcome.attacking_nodes.push(infected_neighbour);
                outcome.target_nodes.push(target);
                outcome.successes.push(true);
            }
        }
        outcome
    }

    /// Consume a banked zero-day charge for a guaranteed compromise.
    /// Returns `None` without charges, when disabled, or with no target;
    /// the charge is only spent when a target exists.
    pub fn zero_day_attack(&mut self, engine: &mut SimEngine) -> Option<RedOutcome> {
        if !self.cfg.zero_day.enabled || self.zero_day_charges == 0 {
            return None;
        }
        let candidate = self.choose_target(engine)?;
        self.zero_day_charges -= 1;
        engine.attack_node(&candidate.target, 1.0, false, false, true);
        self.advance_location(engine, &candidate.target);
        Some(RedOutcome::single(
            RedActionKind::ZeroDay,
            candidate.attacker,
            candidate.target,
            true,
        ))
    }

    /// One day-counter tick; every `days_per_charge` ticks banks a charge.
    pub fn increment_day(&mut self) {
        if !self.cfg.zero_day.enabled {
            return;
        }
        self.day_counter += 1;
        if self.day_counter % self.cfg.zero_day.days_per_charge == 0 {
            self.zero_day_charges += 1;
        }
    }

    /// Relocate to a random compromised neighbour (or compromised entry
    /// node when outside the network). A move with no destination reports
    /// a single failed success.
    pub fn random_move(&self, engine: &mut SimEngine) -> RedOutcome {
        let from = engine.red_location().cloned();
        let candidates: Vec<NodeId> = match &from {
            Some(loc) => engine
                .current_graph()
                .neighbors(loc)
                .into_iter()
                .filter(|nb| engine.nodes().get(nb).compromised)
                .collect(),
            None => engine
                .entry_nodes()
                .iter()
                .filter(|e| engine.nodes().get(e).compromised)
                .cloned()
                .collect(),
        };
        if candidates.is_empty() {
            return RedOutcome {
                action: RedActionKind::RandomMove,
                attacking_nodes: Vec::new(),
                target_nodes: Vec::new(),
                successes: vec![false],
            };
        }
        let i = engine.rng_mut().gen_range(0..candidates.len());
        let dest = candidates[i].clone();
        engine.set_red_location(Some(dest.clone()));
        RedOutcome {
            action: RedActionKind::RandomMove,
            attacking_nodes: vec![from],
            target_nodes: vec![dest],
            successes: vec![true],
        }
    }

    pub fn do_nothing(&self) -> RedOutcome {
        RedOutcome::sentinel(RedActionKind::DoNothing)
    }

    /// After a successful compromise, red's tracked position follows the
    /// target when adjacent to the current location, or claims an entry
    /// node when red is still outside.
    fn advance_location(&self, engine: &mut SimEngine, target: &NodeId) {
        match engine.red_location().cloned() {
            None => {
                if engine.is_entry(target) {
                    engine.set_red_location(Some(target.clone()));
                }
            }
            Some(loc) => {
                if engine.current_graph().has_edge(&loc, target) {
                    engine.set_red_location(Some(target.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameConfig, RedActionWeights};
    use crate::topology::Topology;

    fn setup(mut mutate: impl FnMut(&mut GameConfig)) -> (SimEngine, RedAgent) {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(13);
        mutate(&mut cfg);
        let topo = Topology::line(4).with_entry_nodes(&["n0"]);
        let engine = SimEngine::new(&cfg, &topo);
        let red = RedAgent::new(cfg.red.clone());
        (engine, red)
    }

    #[test]
    fn entry_node_is_the_only_initial_candidate() {
        let (mut engine, red) = setup(|c| c.red.guaranteed_compromise = true);
        let outcome = red.basic_attack(&mut engine);
        assert_eq!(outcome.action, RedActionKind::BasicAttack);
        assert_eq!(outcome.target_nodes[0].as_ref(), "n0");
        assert_eq!(outcome.attacking_nodes[0], None);
        assert_eq!(outcome.successes, vec![true]);
        assert_eq!(engine.red_location().map(|n| n.as_ref()), Some("n0"));
    }

    #[test]
    fn guaranteed_walk_takes_the_line() {
        let (mut engine, red) = setup(|c| c.red.guaranteed_compromise = true);
        for _ in 0..4 {
            red.basic_attack(&mut engine);
        }
        assert_eq!(engine.count_compromised(), 4);
    }

    #[test]
    fn no_candidates_reports_sentinel() {
        let (mut engine, red) = setup(|c| c.red.guaranteed_compromise = true);
        for id in ["n0", "n1", "n2", "n3"] {
            engine.attack_node(id, 0.0, false, false, true);
        }
        let outcome = red.basic_attack(&mut engine);
        assert_eq!(outcome.action, RedActionKind::NoPossibleTargets);
    }

    #[test]
    fn spread_only_reaches_adjacent_nodes() {
        let (mut engine, red) = setup(|c| {
            c.red.spread_skill = 1.0;
            c.red.use_vulnerabilities = false;
        });
        engine.attack_node("n0", 0.0, false, false, true);
        let outcome = red.spread(&mut engine);
        // Only n1 borders the single compromised node.
        assert_eq!(outcome.target_nodes.len(), 1);
        assert_eq!(outcome.target_nodes[0].as_ref(), "n1");
    }

    #[test]
    fn intrude_attempts_every_safe_node() {
        let (mut engine, red) = setup(|c| c.red.intrude_skill = 0.0);
        engine.attack_node("n0", 0.0, false, false, true);
        let outcome = red.intrude(&mut engine);
        assert_eq!(outcome.target_nodes.len(), 3);
        assert!(outcome.successes.iter().all(|s| !s));
    }

    #[test]
    fn zero_day_banks_and_spends_charges() {
        let (mut engine, mut red) = setup(|c| {
            c.red.zero_day.enabled = true;
            c.red.zero_day.start_charges = 1;
            c.red.zero_day.days_per_charge = 2;
        });
        let first = red.zero_day_attack(&mut engine).expect("charge available");
        assert_eq!(first.action, RedActionKind::ZeroDay);
        assert_eq!(red.zero_day_charges(), 0);
        assert!(red.zero_day_attack(&mut engine).is_none());

        red.increment_day();
        assert_eq!(red.zero_day_charges(), 0);
        red.increment_day();
        assert_eq!(red.zero_day_charges(), 1);
    }

    #[test]
    fn random_move_without_destination_fails_softly() {
        let (mut engine, red) = setup(|_| {});
        let outcome = red.random_move(&mut engine);
        assert_eq!(outcome.successes, vec![false]);
        assert!(engine.red_location().is_none());
    }

    #[test]
    fn random_move_enters_via_compromised_entry() {
        let (mut engine, red) = setup(|_| {});
        engine.attack_node("n0", 0.0, false, false, true);
        let outcome = red.random_move(&mut engine);
        assert_eq!(outcome.successes, vec![true]);
        assert_eq!(engine.red_location().map(|n| n.as_ref()), Some("n0"));
    }

    #[test]
    fn towards_target_always_shortest_closes_in() {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(21);
        cfg.red.guaranteed_compromise = true;
        cfg.red.targeting = crate::config::TargetStrategy::TowardsTarget {
            always_shortest: true,
        };
        let topo = Topology::line(5)
            .with_entry_nodes(&["n0"])
            .with_target_node("n4");
        let mut engine = SimEngine::new(&cfg, &topo);
        let red = RedAgent::new(cfg.red.clone());

        // March down the line: each pick must be the strictly nearest.
        let expected = ["n0", "n1", "n2", "n3", "n4"];
        for want in expected {
            let outcome = red.basic_attack(&mut engine);
            assert_eq!(outcome.target_nodes[0].as_ref(), want);
        }
    }

    #[test]
    fn perform_action_falls_back_to_move_when_saturated() {
        let (mut engine, mut red) = setup(|c| {
            c.red.guaranteed_compromise = true;
            c.red.action_weights = RedActionWeights {
                basic_attack: 1.0,
                spread: 0.0,
                intrude: 0.0,
                random_move: 0.0,
                do_nothing: 0.0,
            };
        });
        for id in ["n0", "n1", "n2", "n3"] {
            engine.attack_node(id, 0.0, false, false, true);
        }
        let outcome = red.perform_action(&mut engine);
        assert_eq!(outcome.action, RedActionKind::RandomMove);
    }

    #[test]
    fn natural_spread_uses_both_chances() {
        let (mut engine, red) = setup(|c| {
            c.red.natural_spread.enabled = true;
            c.red.natural_spread.chance_to_spread_to_connected_node = 1.0;
            c.red.natural_spread.chance_to_spread_to_unconnected_node = 0.0;
        });
        engine.attack_node("n0", 0.0, false, false, true);
        let outcome = red.natural_spread(&mut engine);
        // Only the single adjacent safe node converts at chance 1.
        assert_eq!(outcome.target_nodes.len(), 1);
        assert_eq!(outcome.target_nodes[0].as_ref(), "n1");
        assert!(engine.nodes().get("n1").compromised);
        assert!(!engine.nodes().get("n2").compromised);
    }
}
