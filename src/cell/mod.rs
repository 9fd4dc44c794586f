//! Cells — identity, the local-rule interface and the cell-type registry.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`CellId`], [`LinkId`], [`Coord`] |
//! | [`model`] | [`CellModel`] trait, [`NeighborView`], [`CellState`] bounds |
//! | [`registry`] | [`CellRegistry`] mapping type names to factories |
//! | [`builtin`] | [`Average`], [`MaxSpread`] |

pub mod builtin;
pub mod id;
pub mod model;
pub mod registry;

pub use builtin::{Average, AverageParams, MaxSpread, MaxSpreadParams};
pub use id::{CellId, Coord, LinkId};
pub use model::{CellModel, CellState, FnModel, Neighbor, NeighborView};
pub use registry::{CellRegistry, SharedModel};
