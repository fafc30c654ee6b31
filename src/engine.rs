// src/engine.rs
//
// The simulation engine: single source of truth for node and graph state.
// Every read and every mutation performed by the red and blue primitives
// goes through this type. It owns the per-turn attack logs, red's tracked
// location, the decoy rotation and the episode RNG.
//
// Graph model: `base` is the original connectivity plus any decoy splices;
// `current` is the live view agents act on. Isolation removes edges from
// `current` only; reconnect restores them from `base`, skipping isolated
// neighbours. Adjacency is always derived from `current` on demand, so
// there is no cached copy to go stale.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::GameConfig;
use crate::graph::NetGraph;
use crate::observation;
use crate::state::{NodeState, NodeTable};
use crate::topology::Topology;
use crate::types::{AttackEvent, BlueView, NodeId};

/// One occupied decoy slot: the node id it owns and the base edge it
/// replaced (restored when the slot is recycled).
#[derive(Debug, Clone)]
struct DecoySlot {
    id: NodeId,
    edge: (NodeId, NodeId),
}

pub struct SimEngine {
    config: GameConfig,
    topology: Topology,

    base: NetGraph,
    current: NetGraph,
    nodes: NodeTable,

    // Episode-start snapshots restored by `reset`.
    initial_nodes: NodeTable,
    initial_base: NetGraph,
    initial_current: NetGraph,

    /// Fixed observation order over base nodes.
    node_order: Vec<NodeId>,
    entry_nodes: Vec<NodeId>,
    high_value_nodes: Vec<NodeId>,
    target_node: Option<NodeId>,
    /// Stable edge index assigned at episode start over base edges.
    edge_map: Vec<(NodeId, NodeId)>,

    decoy_slots: Vec<Option<DecoySlot>>,
    decoy_cursor: usize,

    red_location: Option<NodeId>,
    true_attacks: Vec<AttackEvent>,
    detected_attacks: Vec<AttackEvent>,

    rng: ChaCha8Rng,
}

impl SimEngine {
    pub fn new(config: &GameConfig, topology: &Topology) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed.unwrap_or(0));

        let base = topology.graph().clone();
        let current = base.clone();
        let node_order: Vec<NodeId> = topology.node_order().to_vec();

        let (lo, hi) = topology.vulnerability_bounds();
        let mut nodes = NodeTable::new();
        for id in &node_order {
            let vuln = topology
                .explicit_vulnerability(id)
                .unwrap_or_else(|| sample_uniform(&mut rng, lo, hi));
            nodes.insert(id.clone(), NodeState::new(vuln, topology.position(id)));
        }

        let mut entry_nodes: Vec<NodeId> = topology.entry_nodes().to_vec();
        if entry_nodes.is_empty() && config.reset.entry_node_count > 0 {
            entry_nodes = pick_entry_nodes(
                &mut rng,
                &base,
                &node_order,
                config.reset.entry_placement,
                config.reset.entry_node_count,
            );
        }
        let mut high_value_nodes: Vec<NodeId> = topology.high_value_nodes().to_vec();
        if high_value_nodes.is_empty()
            && config.rules.lose_when_high_value_node_lost
            && config.reset.high_value_count > 0
        {
            high_value_nodes = pick_high_value_nodes(
                &mut rng,
                &base,
                &node_order,
                &entry_nodes,
                config.reset.high_value_placement,
                config.reset.high_value_count,
            );
        }
        warn_on_overlap(&entry_nodes, &high_value_nodes);

        let edge_map = base.edge_list();
        let capacity = config.blue.decoy_capacity();

        Self {
            config: config.clone(),
            topology: topology.clone(),
            initial_nodes: nodes.clone(),
            initial_base: base.clone(),
            initial_current: current.clone(),
            base,
            current,
            nodes,
            node_order,
            entry_nodes,
            high_value_nodes,
            target_node: topology.target_node().cloned(),
            edge_map,
            decoy_slots: vec![None; capacity],
            decoy_cursor: 0,
            red_location: None,
            true_attacks: Vec::new(),
            detected_attacks: Vec::new(),
            rng,
        }
    }

    // ----- RNG ---------------------------------------------------------

    /// Reseed the episode RNG. Repeatable replays reseed before `reset`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub(crate) fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Bernoulli draw with probability `p`.
    pub(crate) fn chance(&mut self, p: f64) -> bool {
        if p >= 1.0 {
            true
        } else if p <= 0.0 {
            false
        } else {
            self.rng.gen::<f64>() < p
        }
    }

    // ----- Reset -------------------------------------------------------

    /// Restore episode-start state, then apply the configured re-rolls.
    ///
    /// The post-re-roll state becomes the new episode-start snapshot, so
    /// `restore_node` returns vulnerabilities to their fresh values.
    pub fn reset(&mut self) {
        self.nodes = self.initial_nodes.clone();
        self.base = self.initial_base.clone();
        self.current = self.initial_current.clone();
        self.decoy_slots = vec![None; self.config.blue.decoy_capacity()];
        self.decoy_cursor = 0;
        self.red_location = None;
        self.true_attacks.clear();
        self.detected_attacks.clear();

        if self.config.reset.randomize_vulnerabilities {
            let (lo, hi) = self.topology.vulnerability_bounds();
            for id in self.nodes.ids() {
                let v = sample_uniform(&mut self.rng, lo, hi);
                self.nodes.get_mut(&id).vulnerability = v;
            }
        }
        if self.config.reset.reroll_entry_nodes {
            self.entry_nodes = pick_entry_nodes(
                &mut self.rng,
                &self.base,
                &self.node_order,
                self.config.reset.entry_placement,
                self.config.reset.entry_node_count,
            );
        }
        if self.config.reset.reroll_high_value_nodes {
            self.high_value_nodes = pick_high_value_nodes(
                &mut self.rng,
                &self.base,
                &self.node_order,
                &self.entry_nodes,
                self.config.reset.high_value_placement,
                self.config.reset.high_value_count,
            );
        }
        warn_on_overlap(&self.entry_nodes, &self.high_value_nodes);

        self.initial_nodes = self.nodes.clone();
        self.edge_map = self.base.edge_list();
    }

    // ----- Attack resolution -------------------------------------------

    /// Resolve one attack attempt against `id`.
    ///
    /// Returns whether the node ended up compromised by this attempt.
    /// Ground truth mutates only on success. Panics on an unknown id.
    pub fn attack_node(
        &mut self,
        id: &str,
        skill: f64,
        use_skill: bool,
        use_vulnerability: bool,
        guarantee: bool,
    ) -> bool {
        if guarantee {
            self.nodes.get_mut(id).compromised = true;
            self.immediate_view_update(id);
            return true;
        }

        let defence = if use_vulnerability {
            1.0 - self.nodes.get(id).vulnerability
        } else {
            0.0
        };
        let s = if use_skill { skill } else { 1.0 };
        let attack_score = (s * s / (s + defence)) * 100.0;
        let draw = self.rng.gen_range(0..=100) as f64;

        if attack_score > draw {
            self.nodes.get_mut(id).compromised = true;
            self.immediate_view_update(id);
            true
        } else {
            false
        }
    }

    /// Sync blue's view of `id` after a ground-truth change.
    ///
    /// Safe ground truth always syncs (no false positives). A known
    /// intrusion force-syncs. Otherwise the immediate-discovery chance
    /// (decoy override for decoys) decides, and a hit latches
    /// `blue_knows_intrusion`.
    fn immediate_view_update(&mut self, id: &str) {
        let (compromised, deceptive, knows) = {
            let n = self.nodes.get(id);
            (n.compromised, n.deceptive, n.blue_knows_intrusion)
        };
        if !compromised {
            self.nodes.get_mut(id).blue_view = BlueView::Safe;
            return;
        }
        if knows {
            self.nodes.get_mut(id).blue_view = BlueView::Compromised;
            return;
        }
        let p = if deceptive {
            self.config
                .blue
                .chance_to_immediately_discover_intrusion_decoy
        } else {
            self.config.blue.chance_to_immediately_discover_intrusion
        };
        if self.chance(p) {
            let n = self.nodes.get_mut(id);
            n.blue_view = BlueView::Compromised;
            n.blue_knows_intrusion = true;
        }
    }

    // ----- Defensive mutations -----------------------------------------

    /// Make `id` safe: ground truth, view and knowledge all clear. Pushes
    /// red off the node if it was standing there.
    pub fn make_node_safe(&mut self, id: &str) {
        let n = self.nodes.get_mut(id);
        n.compromised = false;
        n.blue_view = BlueView::Safe;
        n.blue_knows_intrusion = false;
        if self.red_location.as_deref() == Some(id) {
            self.push_red();
        }
    }

    /// Relocate red to a random compromised neighbour of its location, or
    /// eject it from the network when none exists.
    fn push_red(&mut self) {
        let Some(loc) = self.red_location.clone() else {
            return;
        };
        let mut candidates: Vec<NodeId> = self
            .current
            .neighbors(&loc)
            .into_iter()
            .filter(|nb| self.nodes.get(nb).compromised)
            .collect();
        self.red_location = if candidates.is_empty() {
            None
        } else {
            let i = self.rng.gen_range(0..candidates.len());
            Some(candidates.swap_remove(i))
        };
    }

    /// Suppress every current-graph edge of `id`.
    pub fn isolate_node(&mut self, id: &str) {
        self.nodes.get_mut(id).isolated = true;
        self.current.remove_edges_of(id);
    }

    /// Restore `id`'s edges from the base graph, skipping neighbours that
    /// are themselves isolated. Idempotent for a node that was never
    /// isolated.
    pub fn reconnect_node(&mut self, id: &str) {
        self.nodes.get_mut(id).isolated = false;
        for nb in self.base.neighbors(id) {
            if self.current.contains(&nb) && !self.nodes.get(&nb).isolated {
                self.current.add_edge(id, &nb);
            }
        }
    }

    /// Scan `id` for an intrusion. Returns whether blue now sees it.
    pub fn scan_node(&mut self, id: &str) -> bool {
        let (compromised, deceptive, knows) = {
            let n = self.nodes.get(id);
            (n.compromised, n.deceptive, n.blue_knows_intrusion)
        };
        if !compromised {
            return false;
        }
        if knows {
            self.nodes.get_mut(id).blue_view = BlueView::Compromised;
            return true;
        }
        let p = if deceptive {
            self.config.blue.chance_to_discover_intrusion_on_scan_decoy
        } else {
            self.config.blue.chance_to_discover_intrusion_on_scan
        };
        if self.chance(p) {
            let n = self.nodes.get_mut(id);
            n.blue_knows_intrusion = true;
            n.blue_view = BlueView::Compromised;
            true
        } else {
            false
        }
    }

    /// Lower `id`'s vulnerability by `step`, clamped at the lower bound.
    pub fn reduce_node_vulnerability(&mut self, id: &str, step: f64) {
        let (lo, _) = self.topology.vulnerability_bounds();
        let n = self.nodes.get_mut(id);
        n.vulnerability = (n.vulnerability - step).max(lo);
    }

    /// Shift `id`'s vulnerability by a signed delta, clamped to bounds.
    pub fn shift_vulnerability(&mut self, id: &str, delta: f64) {
        let (lo, hi) = self.topology.vulnerability_bounds();
        let n = self.nodes.get_mut(id);
        n.vulnerability = (n.vulnerability + delta).clamp(lo, hi);
    }

    /// Replace `id`'s vulnerability with a fresh uniform value.
    pub fn randomize_vulnerability(&mut self, id: &str) {
        let v = self.fresh_vulnerability();
        self.nodes.get_mut(id).vulnerability = v;
    }

    /// Make `id` safe and return its vulnerability to the episode-start
    /// value. Decoys, which have no episode-start record, keep theirs.
    pub fn restore_node(&mut self, id: &str) {
        let original = if self.initial_nodes.contains(id) {
            self.initial_nodes.get(id).vulnerability
        } else {
            self.nodes.get(id).vulnerability
        };
        self.make_node_safe(id);
        self.nodes.get_mut(id).vulnerability = original;
    }

    /// Uniform draw within the topology's vulnerability bounds.
    pub fn fresh_vulnerability(&mut self) -> f64 {
        let (lo, hi) = self.topology.vulnerability_bounds();
        sample_uniform(&mut self.rng, lo, hi)
    }

    // ----- Decoys ------------------------------------------------------

    /// Splice a decoy onto the base edge `a`—`b`.
    ///
    /// Returns the decoy's node id, or `None` when no such base edge
    /// exists (the failure sentinel; not an error). The rotation pointer
    /// picks the slot, recycling the oldest at capacity: the evicted
    /// decoy's spliced-over edge is restored, red is pushed off it first,
    /// and its state either carries over or regenerates per config.
    pub fn add_decoy(&mut self, a: &str, b: &str) -> Option<NodeId> {
        let capacity = self.config.blue.decoy_capacity();
        if capacity == 0 || !self.base.has_edge(a, b) {
            return None;
        }

        let slot = self.decoy_cursor % capacity;
        let mut carried: Option<NodeState> = None;
        if let Some(old) = self.decoy_slots[slot].take() {
            if self.red_location.as_deref() == Some(old.id.as_ref()) {
                self.push_red();
            }
            let prev = self.nodes.remove(&old.id);
            if !self.config.blue.regenerate_relocated_decoys {
                carried = prev;
            }
            self.base.remove_node(&old.id);
            self.current.remove_node(&old.id);
            let (ea, eb) = old.edge;
            self.base.add_edge(&ea, &eb);
            if !self.nodes.get(&ea).isolated && !self.nodes.get(&eb).isolated {
                self.current.add_edge(&ea, &eb);
            }
        }

        let id: NodeId = NodeId::from(format!("d{slot}"));
        let pa = self.nodes.get(a).position;
        let pb = self.nodes.get(b).position;
        let position = ((pa.0 + pb.0) / 2.0, (pa.1 + pb.1) / 2.0);

        let state = match carried {
            Some(prev) => NodeState {
                position,
                isolated: false,
                ..prev
            },
            None => {
                let vuln = self.fresh_vulnerability();
                NodeState::fresh_decoy(vuln, position)
            }
        };

        self.base.remove_edge(a, b);
        self.base.ensure_node(&id);
        self.base.add_edge(a, &id);
        self.base.add_edge(&id, b);

        self.current.remove_edge(a, b);
        self.current.ensure_node(&id);
        let a_isolated = self.nodes.get(a).isolated;
        let b_isolated = self.nodes.get(b).isolated;
        if !a_isolated {
            self.current.add_edge(a, &id);
        }
        if !b_isolated {
            self.current.add_edge(&id, b);
        }

        self.nodes.insert(id.clone(), state);
        let edge = if a <= b {
            (NodeId::from(a), NodeId::from(b))
        } else {
            (NodeId::from(b), NodeId::from(a))
        };
        self.decoy_slots[slot] = Some(DecoySlot {
            id: id.clone(),
            edge,
        });
        self.decoy_cursor += 1;
        Some(id)
    }

    /// Ids of the decoys currently spliced into the graph.
    pub fn decoy_ids(&self) -> Vec<NodeId> {
        self.decoy_slots
            .iter()
            .flatten()
            .map(|s| s.id.clone())
            .collect()
    }

    // ----- Attack logs -------------------------------------------------

    /// Record the turn's attack attempts: all of them in the ground-truth
    /// log, each in the detected log per the configured discovery chance
    /// for its (success, decoy, already-seen) combination.
    pub fn update_stored_attacks(&mut self, events: &[AttackEvent]) {
        for ev in events {
            self.true_attacks.push(ev.clone());
            let (deceptive, seen) = {
                let n = self.nodes.get(&ev.target);
                (n.deceptive, n.blue_view == BlueView::Compromised)
            };
            let blue = &self.config.blue;
            let p = if deceptive {
                if ev.success {
                    blue.chance_to_discover_succeeded_attack_decoy
                } else {
                    blue.chance_to_discover_failed_attack_decoy
                }
            } else if !ev.success {
                blue.chance_to_discover_failed_attack
            } else if seen {
                blue.chance_to_discover_succeeded_attack_known_compromise
            } else {
                blue.chance_to_discover_succeeded_attack_unknown_compromise
            };
            if self.chance(p) {
                self.detected_attacks.push(ev.clone());
            }
        }
    }

    /// Clear both per-turn attack logs. Called at the top of every red
    /// turn.
    pub fn clear_stored_attacks(&mut self) {
        self.true_attacks.clear();
        self.detected_attacks.clear();
    }

    // ----- Observation -------------------------------------------------

    /// The current observation vector. Length is constant across an
    /// episode regardless of how many decoys exist.
    pub fn current_observation(&self) -> Vec<f64> {
        observation::build(self)
    }

    pub fn observation_size(&self) -> usize {
        observation::vector_len(&self.config.observation, self.observation_slots())
    }

    /// Padded per-node slot count: base nodes plus decoy capacity.
    pub fn observation_slots(&self) -> usize {
        self.node_order.len() + self.config.blue.decoy_capacity()
    }

    /// The node occupying observation slot `i`, if any. Slots beyond the
    /// base nodes belong to decoys and may be empty.
    pub fn slot_id(&self, i: usize) -> Option<&NodeId> {
        let base = self.node_order.len();
        if i < base {
            Some(&self.node_order[i])
        } else {
            self.decoy_slots
                .get(i - base)
                .and_then(|s| s.as_ref())
                .map(|s| &s.id)
        }
    }

    // ----- Accessors ---------------------------------------------------

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn current_graph(&self) -> &NetGraph {
        &self.current
    }

    pub fn base_graph(&self) -> &NetGraph {
        &self.base
    }

    pub fn node_order(&self) -> &[NodeId] {
        &self.node_order
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

    pub fn is_entry(&self, id: &str) -> bool {
        self.entry_nodes.iter().any(|n| n.as_ref() == id)
    }

    pub fn is_high_value(&self, id: &str) -> bool {
        self.high_value_nodes.iter().any(|n| n.as_ref() == id)
    }

    pub fn is_target(&self, id: &str) -> bool {
        self.target_node.as_deref() == Some(id)
    }

    /// Endpoints of stable edge index `i`, if the index is in range.
    pub fn edge_for_index(&self, i: usize) -> Option<(NodeId, NodeId)> {
        self.edge_map.get(i).cloned()
    }

    pub fn edge_map_len(&self) -> usize {
        self.edge_map.len()
    }

    pub fn red_location(&self) -> Option<&NodeId> {
        self.red_location.as_ref()
    }

    pub(crate) fn set_red_location(&mut self, loc: Option<NodeId>) {
        self.red_location = loc;
    }

    pub fn true_attacks(&self) -> &[AttackEvent] {
        &self.true_attacks
    }

    pub fn detected_attacks(&self) -> &[AttackEvent] {
        &self.detected_attacks
    }

    /// Live node count, decoys included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn count_compromised(&self) -> usize {
        self.nodes.count_compromised()
    }
}

/// Uniform draw in `[lo, hi]`; collapses to `lo` for a degenerate range.
fn sample_uniform(rng: &mut ChaCha8Rng, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

/// Weighted sample without replacement. Zero total weight falls back to
/// uniform.
fn weighted_sample(
    rng: &mut ChaCha8Rng,
    items: &[NodeId],
    weights: &[f64],
    count: usize,
) -> Vec<NodeId> {
    let mut pool: Vec<(NodeId, f64)> = items
        .iter()
        .cloned()
        .zip(weights.iter().copied())
        .collect();
    let mut picked = Vec::with_capacity(count.min(pool.len()));
    while picked.len() < count && !pool.is_empty() {
        let total: f64 = pool.iter().map(|(_, w)| w).sum();
        let idx = if total <= 0.0 {
            rng.gen_range(0..pool.len())
        } else {
            let mut draw = rng.gen::<f64>() * total;
            let mut chosen = pool.len() - 1;
            for (i, (_, w)) in pool.iter().enumerate() {
                draw -= w;
                if draw <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        picked.push(pool.remove(idx).0);
    }
    picked
}

fn pick_entry_nodes(
    rng: &mut ChaCha8Rng,
    graph: &NetGraph,
    order: &[NodeId],
    placement: crate::config::EntryPlacement,
    count: usize,
) -> Vec<NodeId> {
    use crate::config::EntryPlacement;
    let weights: Vec<f64> = match placement {
        EntryPlacement::Uniform => vec![1.0; order.len()],
        EntryPlacement::Central => order
            .iter()
            .map(|id| 1.0 / (1.0 + graph.mean_distance_from(id)))
            .collect(),
        EntryPlacement::Periphery => order
            .iter()
            .map(|id| graph.mean_distance_from(id))
            .collect(),
    };
    weighted_sample(rng, order, &weights, count)
}

fn pick_high_value_nodes(
    rng: &mut ChaCha8Rng,
    graph: &NetGraph,
    order: &[NodeId],
    entry_nodes: &[NodeId],
    placement: crate::config::HighValuePlacement,
    count: usize,
) -> Vec<NodeId> {
    use crate::config::HighValuePlacement;
    let pool: Vec<NodeId> = order
        .iter()
        .filter(|id| !entry_nodes.contains(*id))
        .cloned()
        .collect();
    match placement {
        HighValuePlacement::Random => {
            let weights = vec![1.0; pool.len()];
            weighted_sample(rng, &pool, &weights, count)
        }
        HighValuePlacement::FurthestFromEntry => {
            // Mean hop distance from every entry node; unreachable nodes
            // rank furthest.
            let mut sums: Vec<(f64, usize)> = vec![(0.0, 0); pool.len()];
            for e in entry_nodes {
                let dists = graph.distances_from(e);
                for (i, id) in pool.iter().enumerate() {
                    if let Some(d) = dists.get(id.as_ref()) {
                        sums[i].0 += *d as f64;
                        sums[i].1 += 1;
                    }
                }
            }
            let mut scored: Vec<(f64, NodeId)> = pool
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    let (total, n) = sums[i];
                    let score = if n == 0 { f64::MAX } else { total / n as f64 };
                    (score, id.clone())
                })
                .collect();
            scored.sort_by(|a, b| {
                b.0.partial_cmp(&a.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.1.cmp(&b.1))
            });
            scored.into_iter().take(count).map(|(_, id)| id).collect()
        }
    }
}

fn warn_on_overlap(entry_nodes: &[NodeId], high_value_nodes: &[NodeId]) {
    for id in entry_nodes {
        if high_value_nodes.contains(id) {
            eprintln!("[reset] WARN: node '{id}' is both an entry node and high-value");
        }
    }
}
