// src/main.rs
//
// Research-harness CLI entrypoint for Palisade.
//
// Constraints:
// - Deterministic runs via --seed: episode e reseeds the engine with
//   seed + e, and the random blue policy draws from its own stream.
// - Episode count, optional max-steps override, optional per-step JSONL
//   snapshots, optional verbosity.
// - Print a concise run header (scenario, episodes, cfg hash, seed).

use clap::{ArgAction, Parser, ValueEnum};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use palisade::config::GameConfig;
use palisade::env::GameEnv;
use palisade::logging::FileSink;
use palisade::topology::Topology;
use palisade::types::Winner;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ScenarioArg {
    /// Ten-node enterprise-style demo network.
    Demo,
    /// Five-node line with one entry node.
    Line,
}

#[derive(Debug, Parser)]
#[command(
    name = "palisade",
    about = "Palisade red-vs-blue network defence simulator (research harness)",
    version
)]
struct Args {
    /// Built-in scenario topology.
    #[arg(long, value_enum, default_value_t = ScenarioArg::Demo)]
    scenario: ScenarioArg,

    /// Number of episodes to run.
    #[arg(long, default_value_t = 10)]
    episodes: u64,

    /// Override the episode step budget.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Deterministic seed for the engine and the random blue policy.
    #[arg(long)]
    seed: Option<u64>,

    /// Write per-step JSONL snapshots to this path.
    #[arg(long)]
    snapshots: Option<std::path::PathBuf>,

    /// Verbosity: -v per-episode detail, -vv per-step detail.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn fnv1a64(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

fn main() {
    let args = Args::parse();
    let seed = args.seed.unwrap_or(0);

    let topology = match args.scenario {
        ScenarioArg::Demo => Topology::demo(),
        ScenarioArg::Line => Topology::line(5).with_entry_nodes(&["n0"]),
    };

    let mut cfg = GameConfig::default();
    cfg.seed = Some(seed);
    if let Some(max_steps) = args.max_steps {
        cfg.rules.max_steps = max_steps;
    }
    if args.snapshots.is_some() {
        cfg.telemetry.step_snapshots = true;
    }
    let cfg_hash = fnv1a64(&serde_json::to_string(&cfg).expect("config serializes"));

    println!(
        "palisade | scenario={:?} | episodes={} | cfg_hash=0x{:016x} | seed={}",
        args.scenario,
        args.episodes,
        cfg_hash,
        args.seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    let mut env = match GameEnv::new(cfg, &topology) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("palisade: invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    if let Some(path) = &args.snapshots {
        match FileSink::create(path) {
            Ok(sink) => env = env.with_sink(Box::new(sink)),
            Err(e) => {
                eprintln!("palisade: cannot open {}: {e}", path.display());
                std::process::exit(2);
            }
        }
    }

    // The blue side plays uniformly at random; red plays its configured
    // policy. Good enough to exercise every code path deterministically.
    let mut policy_rng = ChaCha8Rng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);
    let space = env.action_space_size();

    let mut blue_wins = 0u64;
    let mut red_wins = 0u64;
    let mut total_reward = 0.0;

    for episode in 0..args.episodes {
        env.reset(Some(seed.wrapping_add(episode)));
        loop {
            let action = policy_rng.gen_range(0..space);
            let result = env.step(action);
            if args.verbose >= 2 {
                println!(
                    "  step {:>4} | red={} | blue={} | reward={:+.3}",
                    result.info.duration,
                    result.info.red_action.as_str(),
                    result.info.blue_action.as_str(),
                    result.reward
                );
            }
            if result.done {
                break;
            }
        }

        let summary = env.summary();
        match summary.winner {
            Some(Winner::Blue) => blue_wins += 1,
            Some(Winner::Red) => red_wins += 1,
            None => {}
        }
        total_reward += summary.total_reward;
        if args.verbose >= 1 {
            println!(
                "episode {:>3} | steps={:>4} | winner={:?} | reason={} | reward={:+.3}",
                episode,
                summary.steps,
                summary.winner,
                summary
                    .termination_reason
                    .map(|r| r.as_str())
                    .unwrap_or("none"),
                summary.total_reward
            );
        }
    }

    println!(
        "done | episodes={} | blue_wins={} | red_wins={} | mean_reward={:+.3}",
        args.episodes,
        blue_wins,
        red_wins,
        total_reward / args.episodes.max(1) as f64
    );
}
