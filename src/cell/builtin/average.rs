//! `Average` — weighted mean of a cell and its observed neighbors.

use serde::Deserialize;

use crate::cell::model::{CellModel, NeighborView};
use crate::error::CellError;

/// Registry name.
pub const NAME: &str = "average";

/// Parameter block for `average` cells.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AverageParams {
    /// Weight of the cell's own state in the mean.
    #[serde(default = "default_self_weight")]
    pub self_weight: f64,
    /// Changes no larger than this are ignored, letting the lattice settle.
    #[serde(default)]
    pub epsilon: f64,
}

fn default_self_weight() -> f64 {
    1.0
}

impl Default for AverageParams {
    fn default() -> Self {
        AverageParams {
            self_weight: default_self_weight(),
            epsilon: 0.0,
        }
    }
}

/// Weighted-mean smoothing rule.
#[derive(Debug, Clone)]
pub struct Average {
    params: AverageParams,
}

impl Average {
    pub fn new(params: AverageParams) -> Self {
        Average { params }
    }

    /// Validating constructor used by the registry.
    pub fn from_params(params: AverageParams) -> Result<Self, String> {
        if !params.self_weight.is_finite() || params.self_weight < 0.0 {
            return Err(format!("self_weight must be >= 0, got {}", params.self_weight));
        }
        if !params.epsilon.is_finite() || params.epsilon < 0.0 {
            return Err(format!("epsilon must be >= 0, got {}", params.epsilon));
        }
        Ok(Average::new(params))
    }
}

impl CellModel<f64> for Average {
    fn transition(&self, state: &f64, neighbors: &NeighborView<f64>) -> Result<f64, CellError> {
        let mut total = self.params.self_weight * state;
        let mut weight = self.params.self_weight;
        for n in neighbors.iter() {
            total += n.weight * n.state;
            weight += n.weight;
        }
        if weight == 0.0 {
            return Ok(*state);
        }
        let next = total / weight;
        if !next.is_finite() {
            return Err(CellError::new(format!("average is not finite ({})", next)));
        }
        if (next - state).abs() <= self.params.epsilon {
            Ok(*state)
        } else {
            Ok(next)
        }
    }
}
