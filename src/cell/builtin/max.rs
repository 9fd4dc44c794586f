//! `MaxSpread` — a cell takes the largest value it observes.

use serde::Deserialize;

use crate::cell::model::{CellModel, NeighborView};
use crate::error::CellError;

/// Registry name.
pub const NAME: &str = "max";

/// Parameter block for `max` cells.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MaxSpreadParams {
    /// Subtracted from every neighbor value before comparison, so a front
    /// weakens as it travels.
    #[serde(default)]
    pub decay: f64,
}

/// Front-propagation rule: `max(own, max(neighbor - decay))`.
#[derive(Debug, Clone)]
pub struct MaxSpread {
    decay: f64,
}

impl MaxSpread {
    pub fn new(decay: f64) -> Self {
        MaxSpread { decay }
    }

    pub fn from_params(params: MaxSpreadParams) -> Result<Self, String> {
        if !params.decay.is_finite() || params.decay < 0.0 {
            return Err(format!("decay must be >= 0, got {}", params.decay));
        }
        Ok(MaxSpread::new(params.decay))
    }
}

impl CellModel<f64> for MaxSpread {
    fn transition(&self, state: &f64, neighbors: &NeighborView<f64>) -> Result<f64, CellError> {
        if !state.is_finite() {
            return Err(CellError::new(format!("state is not finite ({})", state)));
        }
        let mut best = *state;
        for n in neighbors.iter() {
            if !n.state.is_finite() {
                return Err(CellError::new(format!(
                    "neighbor {} reports a non-finite value",
                    n.coord
                )));
            }
            let candidate = n.state - self.decay;
            if candidate > best {
                best = candidate;
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::id::{CellId, Coord};
    use crate::cell::model::Neighbor;

    #[test]
    fn test_takes_largest_neighbor() {
        let c = Coord::from([0, 0]);
        let (a, b) = (3.0, 5.0);
        let view = NeighborView::new(vec![
            Neighbor { cell: CellId::new(0), coord: &c, weight: 1.0, state: &a },
            Neighbor { cell: CellId::new(1), coord: &c, weight: 1.0, state: &b },
        ]);
        assert_eq!(MaxSpread::new(0.0).transition(&1.0, &view).unwrap(), 5.0);
        assert_eq!(MaxSpread::new(1.0).transition(&1.0, &view).unwrap(), 4.0);
        assert_eq!(MaxSpread::new(0.0).transition(&9.0, &view).unwrap(), 9.0);
    }

    #[test]
    fn test_nan_is_domain_error() {
        let model = MaxSpread::new(0.0);
        assert!(model.transition(&f64::NAN, &NeighborView::empty()).is_err());
    }

    #[test]
    fn test_registry_builtins() {
        use crate::cell::registry::CellRegistry;
        let reg = CellRegistry::<f64>::with_builtins();
        assert_eq!(reg.names(), vec!["average", "max"]);
        let model = reg
            .create("max", &serde_json::json!({ "decay": 0.5 }), "cell (0,0)")
            .unwrap();
        assert_eq!(model.transition(&2.0, &NeighborView::empty()).unwrap(), 2.0);
        assert!(reg
            .create("max", &serde_json::json!({ "decay": -1.0 }), "cell (0,0)")
            .is_err());
    }
}
