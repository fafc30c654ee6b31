// src/logging.rs
//
// Telemetry sinks for Palisade.
// - EventSink: trait the orchestrator hands per-step snapshots to
// - NoopSink:  discards everything
// - FileSink:  one JSON line per step for offline analysis / rendering
//
// The core only builds the snapshot record; sinks do the IO.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::SimEngine;

/// Per-node slice of a step snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub compromised: bool,
    pub blue_sees_compromised: bool,
    pub vulnerability: f64,
    pub isolated: bool,
    pub deceptive: bool,
}

/// JSON-serializable snapshot of one timestep: the live edge set plus
/// per-node compromise and vulnerability features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub step: u64,
    pub edges: Vec<(String, String)>,
    pub nodes: BTreeMap<String, NodeSnapshot>,
    pub red_location: Option<String>,
}

/// Build the snapshot for the engine's current state.
pub fn snapshot_of(engine: &SimEngine, step: u64) -> StepSnapshot {
    let edges = engine
        .current_graph()
        .edge_list()
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    let nodes = engine
        .nodes()
        .iter()
        .map(|(id, n)| {
            (
                id.to_string(),
                NodeSnapshot {
                    compromised: n.compromised,
                    blue_sees_compromised: n.blue_view == crate::types::BlueView::Compromised,
                    vulnerability: n.vulnerability,
                    isolated: n.isolated,
                    deceptive: n.deceptive,
                },
            )
        })
        .collect();
    StepSnapshot {
        step,
        edges,
        nodes,
        red_location: engine.red_location().map(|n| n.to_string()),
    }
}

/// Abstract sink for per-step telemetry.
pub trait EventSink {
    fn log_step(&mut self, snapshot: &StepSnapshot);
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn log_step(&mut self, _snapshot: &StepSnapshot) {
        // intentionally no-op
    }
}

/// JSONL file sink. One snapshot object per line.
///
/// IO errors are swallowed; the simulation never fails on telemetry.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create a new sink writing to `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EventSink for FileSink {
    fn log_step(&mut self, snapshot: &StepSnapshot) {
        if let Ok(line) = serde_json::to_string(snapshot) {
            let _ = self.writer.write_all(line.as_bytes());
            let _ = self.writer.write_all(b"\n");
            let _ = self.writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::topology::Topology;

    #[test]
    fn snapshot_carries_edges_and_nodes() {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(9);
        let topo = Topology::line(3);
        let mut engine = SimEngine::new(&cfg, &topo);
        engine.attack_node("n0", 0.0, false, false, true);

        let snap = snapshot_of(&engine, 4);
        assert_eq!(snap.step, 4);
        assert_eq!(snap.edges.len(), 2);
        assert!(snap.nodes["n0"].compromised);
        assert!(!snap.nodes["n2"].compromised);
    }

    #[test]
    fn file_sink_writes_one_line_per_step() {
        let mut cfg = GameConfig::default();
        cfg.seed = Some(10);
        let topo = Topology::line(3);
        let engine = SimEngine::new(&cfg, &topo);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.jsonl");
        {
            let mut sink = FileSink::create(&path).unwrap();
            sink.log_step(&snapshot_of(&engine, 0));
            sink.log_step(&snapshot_of(&engine, 1));
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: StepSnapshot = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.step, 0);
        assert_eq!(first.nodes.len(), 3);
    }
}
