//! # celldevs — Cell-DEVS simulation kernel
//!
//! Schedules heterogeneous cell models on an n-dimensional lattice with
//! per-link delays. Deterministic: no wall-clock time, a single virtual
//! clock, and a fixed tie-break order for simultaneous events.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ScenarioConfig ──▶ lattice::builder ◀── CellRegistry
//! │                         │
//! │                         ▼
//! │  ┌──────────── Engine ─────────────────────┐ │
//! │  │  Lattice    ← cells, links, states      │ │
//! │  │  Scheduler  ← (time, event id) min-heap │ │
//! │  │  DelayTransport ← transport / inertial  │ │
//! │  │  VirtualTime    ← logical clock         │ │
//! │  └────────────────────┬────────────────────┘ │
//! │                       ▼                      │
//! │     Observer (StateLog, MessageLog, Trace)   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use celldevs::{CellRegistry, Engine, Lattice, NullObserver, ScenarioConfig, VirtualTime};
//!
//! let scenario = ScenarioConfig::from_json_str(r#"{
//!     "scenario": {
//!         "shape": [3, 3],
//!         "wrapped": true,
//!         "default_cell_type": "max",
//!         "default_state": 0.0,
//!         "neighborhood": [{ "type": "von_neumann" }]
//!     },
//!     "cells": [{ "cell_id": [1, 1], "state": 1.0 }]
//! }"#).unwrap();
//!
//! let registry = CellRegistry::with_builtins();
//! let lattice = Lattice::from_scenario(&scenario, &registry).unwrap();
//! let mut engine = Engine::new(lattice);
//! let report = engine.run_until(VirtualTime::new(10), &mut NullObserver).unwrap();
//! assert_eq!(report.changes, 8);
//! ```

pub mod cell;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod event;
pub mod lattice;
pub mod observer;
pub mod scenario;
pub mod scheduler;
pub mod time;
pub mod trace;
pub mod transport;

// Re-exports for convenience.
pub use cell::{CellId, CellModel, CellRegistry, CellState, Coord, LinkId, NeighborView};
pub use dsl::ScenarioBuilder;
pub use engine::{Engine, EngineConfig, EngineSnapshot, EngineState, HaltReason, RunReport, StopHandle};
pub use error::{CellDevsError, CellDevsResult, CellError, ConfigError};
pub use event::{Event, EventId, EventIdGen, EventKind};
pub use lattice::{Cell, Lattice, Link};
pub use observer::{MessageLog, NullObserver, Observer, StateLog, Tee};
pub use scenario::ScenarioConfig;
pub use scheduler::Scheduler;
pub use time::VirtualTime;
pub use trace::{Trace, TraceRecorder};
pub use transport::{DelayPolicy, DelayTransport};
