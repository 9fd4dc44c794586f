//! Scenario configuration document.
//!
//! A scenario is the declarative description of a lattice: its shape and
//! boundary policy, the neighborhood pattern, the default cell type and
//! state, per-type parameter blocks, and region or per-cell overrides.
//!
//! ```json
//! {
//!   "scenario": {
//!     "shape": [3, 3],
//!     "wrapped": true,
//!     "default_delay": "transport",
//!     "default_cell_type": "max",
//!     "default_state": 0.0,
//!     "default_config": { "max": { "decay": 0.0 } },
//!     "neighborhood": [{ "type": "von_neumann", "range": 1 }]
//!   },
//!   "cells": [{ "cell_id": [1, 1], "state": 1.0 }]
//! }
//! ```
//!
//! Parsing only checks the document structure. Everything that depends on
//! the lattice (ranges, dimensions, cell types) is checked by
//! [`crate::lattice::builder`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::transport::DelayPolicy;

/// Ticks between a state change and its arrival at the neighbors, unless
/// the scenario says otherwise.
pub const DEFAULT_DELAY_TICKS: u64 = 1;

fn default_delay_ticks() -> u64 {
    DEFAULT_DELAY_TICKS
}

fn default_range() -> i64 {
    1
}

fn default_vicinity() -> f64 {
    1.0
}

// ── Document ──────────────────────────────────────────────────────────

/// A complete scenario document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub scenario: LatticeConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<RegionConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cells: Vec<CellConfig>,
}

/// Lattice-wide settings and defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LatticeConfig {
    /// Extent of every dimension. Signed so that a negative size is
    /// reported as a shape error instead of a parse error.
    pub shape: Vec<i64>,
    /// Wrap-around (toroidal) boundary when `true`, clipped otherwise.
    #[serde(default)]
    pub wrapped: bool,
    #[serde(default)]
    pub default_delay: DelayPolicy,
    #[serde(default = "default_delay_ticks")]
    pub default_delay_ticks: u64,
    pub default_cell_type: String,
    #[serde(default)]
    pub default_state: Value,
    /// Parameter block per cell-type name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_config: BTreeMap<String, Value>,
    /// Patterns concatenated in order.
    #[serde(default)]
    pub neighborhood: Vec<NeighborhoodConfig>,
}

/// One neighborhood pattern, relative to each cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NeighborhoodConfig {
    /// Every offset with Chebyshev distance `1..=range`.
    Moore {
        #[serde(default = "default_range")]
        range: i64,
        #[serde(default = "default_vicinity")]
        vicinity: f64,
    },
    /// Every offset with Manhattan distance `1..=range`.
    VonNeumann {
        #[serde(default = "default_range")]
        range: i64,
        #[serde(default = "default_vicinity")]
        vicinity: f64,
    },
    /// Explicit offsets, kept in the listed order.
    Relative {
        neighbors: Vec<Vec<i64>>,
        #[serde(default = "default_vicinity")]
        vicinity: f64,
    },
}

impl NeighborhoodConfig {
    pub fn moore(range: i64) -> Self {
        NeighborhoodConfig::Moore {
            range,
            vicinity: default_vicinity(),
        }
    }

    pub fn von_neumann(range: i64) -> Self {
        NeighborhoodConfig::VonNeumann {
            range,
            vicinity: default_vicinity(),
        }
    }

    pub fn relative(neighbors: Vec<Vec<i64>>) -> Self {
        NeighborhoodConfig::Relative {
            neighbors,
            vicinity: default_vicinity(),
        }
    }
}

/// Settings a region or a single cell may override. Absent fields inherit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_type: Option<String>,
    /// Objects are merged key by key into the inherited state; any other
    /// value replaces it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    /// Merged the same way into the cell type's parameter block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<DelayPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ticks: Option<u64>,
}

impl CellOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell_type(mut self, name: impl Into<String>) -> Self {
        self.cell_type = Some(name.into());
        self
    }

    pub fn state(mut self, state: impl Into<Value>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn delay(mut self, policy: DelayPolicy, ticks: u64) -> Self {
        self.delay = Some(policy);
        self.delay_ticks = Some(ticks);
        self
    }
}

/// An axis-aligned box of cells, `from` and `to` inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub from: Vec<i64>,
    pub to: Vec<i64>,
    #[serde(flatten)]
    pub overrides: CellOverrides,
}

/// Overrides for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    pub cell_id: Vec<i64>,
    /// Absolute neighbor coordinates replacing the pattern for this cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<Vec<Vec<i64>>>,
    #[serde(flatten)]
    pub overrides: CellOverrides,
}

// ── Loading ───────────────────────────────────────────────────────────

impl ScenarioConfig {
    /// Parse a scenario from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a scenario file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Render the document as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    const SAMPLE: &str = r#"{
        "scenario": {
            "shape": [4, 3],
            "wrapped": false,
            "default_delay": "inertial",
            "default_cell_type": "average",
            "default_state": 0.5,
            "default_config": { "average": { "epsilon": 0.01 } },
            "neighborhood": [
                { "type": "moore", "range": 1 },
                { "type": "relative", "neighbors": [[0, 2]], "vicinity": 0.5 }
            ]
        },
        "regions": [
            { "from": [0, 0], "to": [1, 2], "cell_type": "max", "delay_ticks": 3 }
        ],
        "cells": [
            { "cell_id": [2, 1], "state": 9.0, "neighborhood": [[0, 0]] }
        ]
    }"#;

    #[test]
    fn test_parse_full_document() {
        let cfg = ScenarioConfig::from_json_str(SAMPLE).unwrap();
        let s = &cfg.scenario;
        assert_eq!(s.shape, vec![4, 3]);
        assert!(!s.wrapped);
        assert_eq!(s.default_delay, DelayPolicy::Inertial);
        assert_eq!(s.default_delay_ticks, DEFAULT_DELAY_TICKS);
        assert_eq!(s.default_config["average"], json!({ "epsilon": 0.01 }));
        assert_eq!(s.neighborhood[0], NeighborhoodConfig::moore(1));
        assert_eq!(
            s.neighborhood[1],
            NeighborhoodConfig::Relative {
                neighbors: vec![vec![0, 2]],
                vicinity: 0.5
            }
        );

        let region = &cfg.regions[0];
        assert_eq!(region.overrides.cell_type.as_deref(), Some("max"));
        assert_eq!(region.overrides.delay_ticks, Some(3));
        assert_eq!(region.overrides.delay, None);

        let cell = &cfg.cells[0];
        assert_eq!(cell.cell_id, vec![2, 1]);
        assert_eq!(cell.overrides.state, Some(json!(9.0)));
        assert_eq!(cell.neighborhood, Some(vec![vec![0, 0]]));
    }

    #[test]
    fn test_minimal_document_defaults() {
        let cfg = ScenarioConfig::from_json_str(
            r#"{ "scenario": { "shape": [1], "default_cell_type": "max" } }"#,
        )
        .unwrap();
        assert!(cfg.regions.is_empty());
        assert!(cfg.cells.is_empty());
        assert!(cfg.scenario.neighborhood.is_empty());
        assert_eq!(cfg.scenario.default_state, Value::Null);
        assert_eq!(cfg.scenario.default_delay, DelayPolicy::Transport);
    }

    #[test]
    fn test_range_defaults_to_one() {
        let n: NeighborhoodConfig = serde_json::from_str(r#"{ "type": "von_neumann" }"#).unwrap();
        assert_eq!(n, NeighborhoodConfig::von_neumann(1));
    }

    #[test]
    fn test_unknown_neighborhood_type_is_parse_error() {
        let err = ScenarioConfig::from_json_str(
            r#"{ "scenario": { "shape": [2], "default_cell_type": "max",
                 "neighborhood": [{ "type": "hexagonal" }] } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_misspelled_field_is_parse_error() {
        let err = ScenarioConfig::from_json_str(
            r#"{ "scenario": { "shape": [2], "default_cell_type": "max",
                 "neigborhood": [{ "type": "moore" }] } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = ScenarioConfig::from_json_str(
            r#"{ "scenario": { "shape": [2], "default_cell_type": "max" }, "cels": [] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let cfg = ScenarioConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.scenario.shape, vec![4, 3]);

        let err = ScenarioConfig::from_file("/nonexistent/scenario.json").unwrap_err();
        match err {
            ConfigError::Io { path, .. } => assert!(path.contains("scenario.json")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_json_round_trip_keeps_document() {
        let cfg = ScenarioConfig::from_json_str(SAMPLE).unwrap();
        let text = cfg.to_json_pretty().unwrap();
        assert_eq!(ScenarioConfig::from_json_str(&text).unwrap(), cfg);
    }

    #[test]
    fn test_bundled_scenarios_build() {
        let registry = crate::cell::CellRegistry::<f64>::with_builtins();
        for text in [
            include_str!("../scenarios/max_3x3.json"),
            include_str!("../scenarios/average_diffusion.json"),
        ] {
            let cfg = ScenarioConfig::from_json_str(text).unwrap();
            crate::lattice::Lattice::from_scenario(&cfg, &registry).unwrap();
        }
    }
}
