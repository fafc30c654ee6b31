// src/observation.rs
//
// Observation assembly for the RL interface.
//
// The vector concatenates a fixed sequence of feature blocks, each
// independently toggleable by ObservationConfig. Every per-node block is
// laid out over "slots": the base nodes in topology order followed by one
// slot per decoy capacity. Empty decoy slots read as zero, so the vector
// length never changes within an episode.

use crate::config::ObservationConfig;
use crate::engine::SimEngine;
use crate::types::BlueView;

/// Vector length for a given config and slot count.
pub fn vector_len(cfg: &ObservationConfig, slots: usize) -> usize {
    let mut len = 0;
    if cfg.adjacency_matrix {
        len += slots * slots;
    }
    if cfg.compromised_status {
        len += slots;
    }
    if cfg.vulnerabilities {
        len += slots;
    }
    if cfg.average_vulnerability {
        len += 1;
    }
    if cfg.graph_connectivity {
        len += 1;
    }
    if cfg.attacking_nodes {
        len += slots;
    }
    if cfg.attacked_nodes {
        len += slots;
    }
    if cfg.special_nodes {
        len += 3 * slots;
    }
    if cfg.red_skill {
        len += 1;
    }
    len
}

/// Assemble the observation vector from the engine's current state.
pub fn build(engine: &SimEngine) -> Vec<f64> {
    let cfg = &engine.config().observation;
    let slots = engine.observation_slots();
    let mut out = Vec::with_capacity(vector_len(cfg, slots));

    if cfg.adjacency_matrix {
        let graph = engine.current_graph();
        for i in 0..slots {
            for j in 0..slots {
                let connected = match (engine.slot_id(i), engine.slot_id(j)) {
                    (Some(a), Some(b)) => graph.has_edge(a, b),
                    _ => false,
                };
                out.push(if connected { 1.0 } else { 0.0 });
            }
        }
    }

    if cfg.compromised_status {
        for i in 0..slots {
            let seen = engine
                .slot_id(i)
                .map(|id| engine.nodes().get(id).blue_view == BlueView::Compromised)
                .unwrap_or(false);
            out.push(if seen { 1.0 } else { 0.0 });
        }
    }

    if cfg.vulnerabilities {
        for i in 0..slots {
            let v = engine
                .slot_id(i)
                .map(|id| engine.nodes().get(id).vulnerability)
                .unwrap_or(0.0);
            out.push(v);
        }
    }

    if cfg.average_vulnerability {
        out.push(engine.nodes().mean_vulnerability());
    }

    if cfg.graph_connectivity {
        let graph = engine.current_graph();
        let n = graph.node_count();
        let connectivity = if n == 0 {
            0.0
        } else {
            let edges_per_node = graph.edge_count() as f64 / n as f64;
            1.0 - (-0.1 * edges_per_node).exp()
        };
        out.push(connectivity);
    }

    if cfg.attacking_nodes {
        for i in 0..slots {
            let attacking = engine
                .slot_id(i)
                .map(|id| {
                    engine
                        .detected_attacks()
                        .iter()
                        .any(|ev| ev.attacker.as_ref() == Some(id))
                })
                .unwrap_or(false);
            out.push(if attacking { 1.0 } else { 0.0 });
        }
    }

    if cfg.attacked_nodes {
        for i in 0..slots {
            let attacked = engine
                .slot_id(i)
                .map(|id| {
                    engine
                        .detected_attacks()
                        .iter()
                        .any(|ev| &ev.target == id)
                })
                .unwrap_or(false);
            out.push(if attacked { 1.0 } else { 0.0 });
        }
    }

    if cfg.special_nodes {
        for i in 0..slots {
            let entry = engine
                .slot_id(i)
                .map(|id| engine.is_entry(id))
                .unwrap_or(false);
            out.push(if entry { 1.0 } else { 0.0 });
        }
        for i in 0..slots {
            let hv = engine
                .slot_id(i)
                .map(|id| engine.is_high_value(id))
                .unwrap_or(false);
            out.push(if hv { 1.0 } else { 0.0 });
        }
        for i in 0..slots {
            let target = engine
                .slot_id(i)
                .map(|id| engine.is_target(id))
                .unwrap_or(false);
            out.push(if target { 1.0 } else { 0.0 });
        }
    }

    if cfg.red_skill {
        out.push(engine.config().red.skill);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::topology::Topology;

    #[test]
    fn length_matches_spec_for_all_blocks() {
        let cfg = ObservationConfig::default();
        // 4 slots: 16 (adjacency) + 4 + 4 + 1 + 1 + 4 + 4 + 12 + 1
        assert_eq!(vector_len(&cfg, 4), 47);
    }

    #[test]
    fn disabled_blocks_shrink_the_vector() {
        let mut cfg = ObservationConfig::default();
        cfg.adjacency_matrix = false;
        cfg.special_nodes = false;
        assert_eq!(vector_len(&cfg, 4), 47 - 16 - 12);
    }

    #[test]
    fn built_vector_has_declared_length() {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(1);
        let topo = Topology::demo();
        let eng = SimEngine::new(&cfg, &topo);
        let obs = eng.current_observation();
        assert_eq!(obs.len(), eng.observation_size());
    }

    #[test]
    fn length_is_stable_across_decoy_insertion() {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(2);
        cfg.blue.max_decoys = 2;
        let topo = Topology::line(4);
        let mut eng = SimEngine::new(&cfg, &topo);

        let len_before = eng.current_observation().len();
        eng.add_decoy("n0", "n1").unwrap();
        assert_eq!(eng.current_observation().len(), len_before);
        eng.add_decoy("n2", "n3").unwrap();
        assert_eq!(eng.current_observation().len(), len_before);
    }
}
