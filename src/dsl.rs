//! Fluent builder DSL for scenarios.
//!
//! Builds the same [`ScenarioConfig`] a JSON file would, without writing
//! JSON by hand. Handy in tests and for programmatic sweeps.

use serde_json::Value;

use crate::cell::{CellRegistry, CellState};
use crate::engine::{Engine, EngineConfig};
use crate::error::ConfigError;
use crate::lattice::Lattice;
use crate::scenario::{
    CellConfig, CellOverrides, LatticeConfig, NeighborhoodConfig, RegionConfig, ScenarioConfig,
    DEFAULT_DELAY_TICKS,
};
use crate::transport::DelayPolicy;

// ── ScenarioBuilder ───────────────────────────────────────────────────

/// Fluent builder for a [`ScenarioConfig`].
///
/// # Example
/// ```rust
/// use celldevs::cell::CellRegistry;
/// use celldevs::dsl::ScenarioBuilder;
///
/// let lattice = ScenarioBuilder::grid(&[3, 3])
///     .wrapped(true)
///     .cell_type("max")
///     .default_state(0.0)
///     .von_neumann(1)
///     .cell(&[1, 1], 1.0)
///     .build_lattice(&CellRegistry::with_builtins())
///     .unwrap();
/// assert_eq!(lattice.len(), 9);
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    config: ScenarioConfig,
}

impl ScenarioBuilder {
    /// Start a clipped lattice of the given shape with no neighborhood.
    pub fn grid(shape: &[usize]) -> Self {
        ScenarioBuilder {
            config: ScenarioConfig {
                scenario: LatticeConfig {
                    shape: shape.iter().map(|&n| n as i64).collect(),
                    wrapped: false,
                    default_delay: DelayPolicy::Transport,
                    default_delay_ticks: DEFAULT_DELAY_TICKS,
                    default_cell_type: String::new(),
                    default_state: Value::Null,
                    default_config: Default::default(),
                    neighborhood: Vec::new(),
                },
                regions: Vec::new(),
                cells: Vec::new(),
            },
        }
    }

    // ── Lattice ───────────────────────────────────────────────

    pub fn wrapped(mut self, wrapped: bool) -> Self {
        self.config.scenario.wrapped = wrapped;
        self
    }

    /// Default cell type.
    pub fn cell_type(mut self, name: impl Into<String>) -> Self {
        self.config.scenario.default_cell_type = name.into();
        self
    }

    pub fn default_state(mut self, state: impl Into<Value>) -> Self {
        self.config.scenario.default_state = state.into();
        self
    }

    /// Parameter block for every cell of type `cell_type`.
    pub fn config(mut self, cell_type: impl Into<String>, params: Value) -> Self {
        self.config
            .scenario
            .default_config
            .insert(cell_type.into(), params);
        self
    }

    /// Default output delay.
    pub fn delay(mut self, policy: DelayPolicy, ticks: u64) -> Self {
        self.config.scenario.default_delay = policy;
        self.config.scenario.default_delay_ticks = ticks;
        self
    }

    // ── Neighborhood ──────────────────────────────────────────

    pub fn moore(self, range: i64) -> Self {
        self.neighborhood(NeighborhoodConfig::moore(range))
    }

    pub fn von_neumann(self, range: i64) -> Self {
        self.neighborhood(NeighborhoodConfig::von_neumann(range))
    }

    /// Explicit relative offsets with weight 1.
    pub fn relative(self, offsets: &[&[i64]]) -> Self {
        self.neighborhood(NeighborhoodConfig::relative(
            offsets.iter().map(|o| o.to_vec()).collect(),
        ))
    }

    /// Append any pattern.
    pub fn neighborhood(mut self, pattern: NeighborhoodConfig) -> Self {
        self.config.scenario.neighborhood.push(pattern);
        self
    }

    // ── Overrides ─────────────────────────────────────────────

    /// Override every cell in the inclusive box `from..=to`.
    pub fn region(mut self, from: &[usize], to: &[usize], overrides: CellOverrides) -> Self {
        self.config.regions.push(RegionConfig {
            from: to_signed(from),
            to: to_signed(to),
            overrides,
        });
        self
    }

    /// Set the initial state of one cell.
    pub fn cell(self, coord: &[usize], state: impl Into<Value>) -> Self {
        self.cell_with(coord, CellOverrides::new().state(state))
    }

    pub fn cell_with(mut self, coord: &[usize], overrides: CellOverrides) -> Self {
        self.config.cells.push(CellConfig {
            cell_id: to_signed(coord),
            neighborhood: None,
            overrides,
        });
        self
    }

    /// Give one cell an absolute neighbor list instead of the pattern.
    pub fn cell_neighbors(mut self, coord: &[usize], neighbors: &[&[usize]]) -> Self {
        let cell_id = to_signed(coord);
        let neighbors = Some(neighbors.iter().map(|n| to_signed(n)).collect());
        match self.config.cells.iter_mut().find(|c| c.cell_id == cell_id) {
            Some(existing) => existing.neighborhood = neighbors,
            None => self.config.cells.push(CellConfig {
                cell_id,
                neighborhood: neighbors,
                overrides: CellOverrides::new(),
            }),
        }
        self
    }

    // ── Build ─────────────────────────────────────────────────

    pub fn build(self) -> ScenarioConfig {
        self.config
    }

    pub fn build_lattice<S: CellState>(
        &self,
        registry: &CellRegistry<S>,
    ) -> Result<Lattice<S>, ConfigError> {
        Lattice::from_scenario(&self.config, registry)
    }

    /// Build the lattice and wrap it in an engine.
    pub fn build_engine<S: CellState>(
        &self,
        registry: &CellRegistry<S>,
        config: EngineConfig,
    ) -> Result<Engine<S>, ConfigError> {
        Ok(Engine::with_config(self.build_lattice(registry)?, config))
    }
}

fn to_signed(coord: &[usize]) -> Vec<i64> {
    coord.iter().map(|&c| c as i64).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cell::{CellId, Coord};
    use crate::engine::HaltReason;
    use crate::observer::NullObserver;
    use crate::time::VirtualTime;

    #[test]
    fn test_builder_matches_json_document() {
        let built = ScenarioBuilder::grid(&[3, 3])
            .wrapped(true)
            .cell_type("max")
            .default_state(0.0)
            .delay(DelayPolicy::Transport, 1)
            .von_neumann(1)
            .cell(&[1, 1], 1.0)
            .build();

        let parsed = ScenarioConfig::from_json_str(
            r#"{
                "scenario": {
                    "shape": [3, 3],
                    "wrapped": true,
                    "default_delay": "transport",
                    "default_delay_ticks": 1,
                    "default_cell_type": "max",
                    "default_state": 0.0,
                    "neighborhood": [{ "type": "von_neumann", "range": 1 }]
                },
                "cells": [{ "cell_id": [1, 1], "state": 1.0 }]
            }"#,
        )
        .unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_regions_and_neighbors() {
        let lattice = ScenarioBuilder::grid(&[2, 3])
            .cell_type("max")
            .default_state(0.0)
            .config("average", json!({ "epsilon": 0.5 }))
            .moore(1)
            .region(&[0, 0], &[0, 2], CellOverrides::new().cell_type("average"))
            .cell_with(
                &[1, 2],
                CellOverrides::new().delay(DelayPolicy::Inertial, 4),
            )
            .cell_neighbors(&[1, 2], &[&[0, 0]])
            .build_lattice(&CellRegistry::with_builtins())
            .unwrap();

        assert_eq!(lattice.cell(CellId::new(1)).unwrap().cell_type(), "average");
        assert_eq!(
            lattice.cell(CellId::new(1)).unwrap().config(),
            &json!({ "epsilon": 0.5 })
        );
        assert_eq!(lattice.cell(CellId::new(4)).unwrap().cell_type(), "max");

        let corner = lattice.cell_at(&Coord::from([1, 2])).unwrap();
        assert_eq!(corner.delay().policy, DelayPolicy::Inertial);
        assert_eq!(
            lattice.neighbors_of(corner.id()).map(|l| l.source).collect::<Vec<_>>(),
            vec![CellId::new(0)]
        );
    }

    #[test]
    fn test_build_engine_and_run() {
        let mut engine = ScenarioBuilder::grid(&[4])
            .cell_type("max")
            .default_state(0.0)
            .relative(&[&[-1]])
            .cell(&[0], 2.0)
            .build_engine(&CellRegistry::with_builtins(), EngineConfig::default())
            .unwrap();
        let report = engine.run_until(VirtualTime::new(100), &mut NullObserver).unwrap();
        assert_eq!(report.reason, HaltReason::Quiescent);
        // The front moves one cell per tick; the last cell has no observers.
        assert_eq!(report.clock, VirtualTime::new(2));
        assert_eq!(engine.state_at(&Coord::from([3])), Some(&2.0));
    }

    #[test]
    fn test_missing_cell_type_is_config_error() {
        let err = ScenarioBuilder::grid(&[2])
            .default_state(0.0)
            .build_lattice(&CellRegistry::with_builtins())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCellType { .. }));
    }
}
