//! Built-in cell models — `average` and `max`.
//!
//! Small reference rules over `f64` states, used by the CLI and the tests.
//! Domain models (CO2 diffusion and the like) are registered by the caller.

pub mod average;
pub mod max;

pub use average::{Average, AverageParams};
pub use max::{MaxSpread, MaxSpreadParams};

use super::registry::CellRegistry;

impl CellRegistry<f64> {
    /// A registry holding the built-in `average` and `max` cell types.
    pub fn with_builtins() -> Self {
        let mut reg = CellRegistry::new();
        reg.register_typed(average::NAME, Average::from_params);
        reg.register_typed(max::NAME, MaxSpread::from_params);
        reg
    }
}
