//! Serializable engine snapshots.
//!
//! A snapshot is a consistent, inspectable copy of the engine between
//! instants: clock, lifecycle state, queue sizes and every cell state.

use serde::{Deserialize, Serialize};

use crate::cell::{CellId, CellState, Coord};
use crate::time::VirtualTime;

use super::{Engine, EngineState};

/// One cell in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot<S> {
    pub id: CellId,
    pub coord: Coord,
    pub cell_type: String,
    pub state: S,
}

/// Engine state between instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot<S> {
    pub clock: VirtualTime,
    pub state: EngineState,
    pub pending_events: usize,
    pub pending_messages: usize,
    pub cells: Vec<CellSnapshot<S>>,
}

impl<S: CellState> Engine<S> {
    pub fn snapshot(&self) -> EngineSnapshot<S> {
        EngineSnapshot {
            clock: self.clock,
            state: self.state,
            pending_events: self.scheduler.len(),
            pending_messages: self.transport.pending_count(),
            cells: self
                .lattice
                .cells()
                .iter()
                .map(|c| CellSnapshot {
                    id: c.id(),
                    coord: c.coord().clone(),
                    cell_type: c.cell_type().to_string(),
                    state: c.state().clone(),
                })
                .collect(),
        }
    }

    /// The snapshot as pretty-printed JSON.
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::cell::CellRegistry;
    use crate::engine::{Engine, EngineState, HaltReason};
    use crate::lattice::Lattice;
    use crate::observer::NullObserver;
    use crate::scenario::ScenarioConfig;
    use crate::time::VirtualTime;

    #[test]
    fn test_snapshot_after_run() {
        let cfg: ScenarioConfig = serde_json::from_value(json!({
            "scenario": {
                "shape": [1, 2],
                "default_cell_type": "max",
                "default_state": 0.0,
                "neighborhood": [{ "type": "moore" }]
            },
            "cells": [{ "cell_id": [0, 1], "state": 4.0 }]
        }))
        .unwrap();
        let lattice = Lattice::from_scenario(&cfg, &CellRegistry::with_builtins()).unwrap();
        let mut engine = Engine::new(lattice);

        let idle = engine.snapshot();
        assert_eq!(idle.state, EngineState::Idle);
        assert_eq!(idle.pending_events, 2);

        engine.run_until(VirtualTime::new(100), &mut NullObserver).unwrap();
        let snap = engine.snapshot();
        assert_eq!(snap.state, EngineState::Halted(HaltReason::Quiescent));
        assert_eq!(snap.clock, VirtualTime::new(1));
        assert_eq!(snap.pending_events, 0);
        assert_eq!(snap.pending_messages, 0);
        assert_eq!(
            snap.cells.iter().map(|c| c.state).collect::<Vec<_>>(),
            vec![4.0, 4.0]
        );

        let parsed: Value = serde_json::from_str(&engine.snapshot_json().unwrap()).unwrap();
        assert_eq!(parsed["clock"], json!(1));
        assert_eq!(parsed["state"], json!({ "status": "halted", "reason": "quiescent" }));
        assert_eq!(parsed["cells"][1]["coord"], json!([0, 1]));
        assert_eq!(parsed["cells"][1]["cell_type"], json!("max"));
    }
}
