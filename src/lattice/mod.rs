//! Cell state and neighborhood store.
//!
//! A [`Lattice`] owns every [`Cell`] and every directed [`Link`]. Topology is
//! fixed once [`builder::build`] returns; afterwards only cell states change,
//! and only the engine changes them.
//!
//! ```text
//!   source ──Link(weight, delay, policy)──▶ dest
//!   dest.inbound  = links dest observes, neighborhood order
//!   source.outbound = links source publishes on
//! ```

pub mod builder;
pub mod neighborhood;


use serde_json::Value;

use crate::cell::{CellId, CellRegistry, Coord, LinkId, SharedModel};
use crate::error::ConfigError;
use crate::scenario::ScenarioConfig;
use crate::time::VirtualTime;
use crate::transport::DelayPolicy;

pub use neighborhood::Offset;

// ── Delay ─────────────────────────────────────────────────────────────

/// Output delay of a cell: how long, and under which policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySpec {
    pub policy: DelayPolicy,
    pub ticks: VirtualTime,
}

// ── Link ──────────────────────────────────────────────────────────────

/// A directed neighbor relation. Holds ids only.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub source: CellId,
    pub dest: CellId,
    /// Vicinity of the neighborhood entry that created the link.
    pub weight: f64,
    /// Copied from the source cell.
    pub delay: VirtualTime,
    /// Copied from the source cell.
    pub policy: DelayPolicy,
}

// ── Cell ──────────────────────────────────────────────────────────────

/// One lattice cell.
#[derive(Clone)]
pub struct Cell<S> {
    pub(crate) id: CellId,
    pub(crate) coord: Coord,
    pub(crate) cell_type: String,
    pub(crate) model: SharedModel<S>,
    pub(crate) state: S,
    pub(crate) config: Value,
    pub(crate) delay: DelaySpec,
    pub(crate) inbound: Vec<LinkId>,
    pub(crate) outbound: Vec<LinkId>,
}

impl<S> Cell<S> {
    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn coord(&self) -> &Coord {
        &self.coord
    }

    pub fn cell_type(&self) -> &str {
        &self.cell_type
    }

    pub fn model(&self) -> &SharedModel<S> {
        &self.model
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// The merged parameter block the model was built from.
    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn delay(&self) -> DelaySpec {
        self.delay
    }

    /// Links this cell observes, in neighborhood order.
    pub fn inbound(&self) -> &[LinkId] {
        &self.inbound
    }

    /// Links this cell publishes its state on.
    pub fn outbound(&self) -> &[LinkId] {
        &self.outbound
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Cell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("coord", &self.coord)
            .field("cell_type", &self.cell_type)
            .field("state", &self.state)
            .field("delay", &self.delay)
            .field("inbound", &self.inbound)
            .field("outbound", &self.outbound)
            .finish()
    }
}

// ── Lattice ───────────────────────────────────────────────────────────

/// The materialized cell graph.
#[derive(Debug, Clone)]
pub struct Lattice<S> {
    pub(crate) shape: Vec<usize>,
    pub(crate) wrapped: bool,
    pub(crate) cells: Vec<Cell<S>>,
    pub(crate) links: Vec<Link>,
}

impl<S> Lattice<S> {
    /// Build a lattice from a scenario. See [`builder::build`].
    pub fn from_scenario(
        config: &ScenarioConfig,
        registry: &CellRegistry<S>,
    ) -> Result<Self, ConfigError>
    where
        S: crate::cell::CellState,
    {
        builder::build(config, registry)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in ascending id order.
    pub fn cells(&self) -> &[Cell<S>] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell<S>> {
        self.cells.get(id.index())
    }

    pub fn cell_at(&self, coord: &Coord) -> Option<&Cell<S>> {
        self.id_of(coord).and_then(|id| self.cell(id))
    }

    /// The id of the cell at `coord`, if it lies inside the lattice.
    pub fn id_of(&self, coord: &Coord) -> Option<CellId> {
        linear_index(&self.shape, coord.components()).map(|i| CellId::new(i as u32))
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.index())
    }

    /// Inbound links of `id`, in neighborhood order.
    pub fn neighbors_of(&self, id: CellId) -> impl Iterator<Item = &Link> + '_ {
        self.cell(id)
            .map(|c| c.inbound.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|l| self.links.get(l.index()))
    }

    pub fn neighbor_count(&self, id: CellId) -> usize {
        self.cell(id).map_or(0, |c| c.inbound.len())
    }

    pub(crate) fn set_state(&mut self, id: CellId, state: S) {
        if let Some(cell) = self.cells.get_mut(id.index()) {
            cell.state = state;
        }
    }
}

// ── Index math ────────────────────────────────────────────────────────

/// Row-major index of `coord`, first axis slowest.
pub fn linear_index(shape: &[usize], coord: &[usize]) -> Option<usize> {
    if coord.len() != shape.len() {
        return None;
    }
    let mut index = 0usize;
    for (&c, &extent) in coord.iter().zip(shape) {
        if c >= extent {
            return None;
        }
        index = index * extent + c;
    }
    Some(index)
}

/// Inverse of [`linear_index`].
pub fn coord_of_index(shape: &[usize], mut index: usize) -> Coord {
    let mut components = vec![0; shape.len()];
    for (axis, &extent) in shape.iter().enumerate().rev() {
        components[axis] = index % extent;
        index /= extent;
    }
    Coord::new(components)
}
