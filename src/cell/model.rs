//! `CellModel` trait and the neighbor view handed to every transition.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CellError;
use crate::time::VirtualTime;

use super::id::{CellId, Coord};

// ── CellState ─────────────────────────────────────────────────────────

/// Bounds every cell state type must satisfy.
///
/// States are compared to detect changes, serialized for logs and snapshots,
/// deserialized from scenario documents, and may be read from several
/// threads when the `parallel` feature is on.
pub trait CellState:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> CellState for T where
    T: Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

// ── NeighborView ──────────────────────────────────────────────────────

/// One entry of a cell's neighborhood as seen during a transition.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a, S> {
    /// The neighbor cell.
    pub cell: CellId,
    /// Its lattice coordinate.
    pub coord: &'a Coord,
    /// Coupling weight (vicinity) of the link.
    pub weight: f64,
    /// Last value delivered on the link.
    pub state: &'a S,
}

/// Ordered view of a cell's neighbors, in neighborhood declaration order.
///
/// The states are what the destination has *observed*: the value most
/// recently delivered on each inbound link, not the neighbor's live state.
#[derive(Debug, Clone)]
pub struct NeighborView<'a, S> {
    entries: Vec<Neighbor<'a, S>>,
}

impl<'a, S> NeighborView<'a, S> {
    pub fn new(entries: Vec<Neighbor<'a, S>>) -> Self {
        NeighborView { entries }
    }

    /// A view with no neighbors.
    pub fn empty() -> Self {
        NeighborView {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor<'a, S>> {
        self.entries.iter()
    }

    /// Observed states only, in order.
    pub fn states(&self) -> impl Iterator<Item = &'a S> + '_ {
        self.entries.iter().map(|n| n.state)
    }

    pub fn get(&self, index: usize) -> Option<&Neighbor<'a, S>> {
        self.entries.get(index)
    }

    /// Find the entry observing `cell`, if it is a neighbor.
    pub fn find(&self, cell: CellId) -> Option<&Neighbor<'a, S>> {
        self.entries.iter().find(|n| n.cell == cell)
    }
}

// ── CellModel ─────────────────────────────────────────────────────────

/// The local rule of a cell type.
///
/// # Contract
///
/// Implementations **must**:
/// - Be deterministic for equal inputs.
/// - Keep all state in `S`; the model object is shared between every cell
///   built from the same type and parameters.
/// - Report an unusable input or result as a [`CellError`] rather than
///   producing a bogus state.
///
/// # Example
///
/// ```rust
/// use celldevs::cell::{CellModel, NeighborView};
/// use celldevs::error::CellError;
///
/// struct Sum;
///
/// impl CellModel<i64> for Sum {
///     fn transition(&self, state: &i64, neighbors: &NeighborView<i64>) -> Result<i64, CellError> {
///         let total: i64 = neighbors.states().sum();
///         Ok((*state).max(total))
///     }
/// }
/// ```
pub trait CellModel<S>: Send + Sync {
    /// Compute the next local state.
    fn transition(&self, state: &S, neighbors: &NeighborView<S>) -> Result<S, CellError>;

    /// Delay applied to the output of a freshly committed `state`.
    ///
    /// `configured` is the delay from the scenario. Most models keep it.
    fn output_delay(&self, _state: &S, configured: VirtualTime) -> VirtualTime {
        configured
    }
}

/// Closure-backed model, handy in tests and one-off scenarios.
pub struct FnModel<F>(F);

impl<F> FnModel<F> {
    pub fn new<S>(rule: F) -> Self
    where
        F: Fn(&S, &NeighborView<S>) -> Result<S, CellError> + Send + Sync,
    {
        FnModel(rule)
    }
}

impl<S, F> CellModel<S> for FnModel<F>
where
    F: Fn(&S, &NeighborView<S>) -> Result<S, CellError> + Send + Sync,
{
    fn transition(&self, state: &S, neighbors: &NeighborView<S>) -> Result<S, CellError> {
        (self.0)(state, neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_order_and_lookup() {
        let a = Coord::from([0, 0]);
        let b = Coord::from([0, 1]);
        let (sa, sb) = (1.0f64, 2.0f64);
        let view = NeighborView::new(vec![
            Neighbor { cell: CellId::new(0), coord: &a, weight: 1.0, state: &sa },
            Neighbor { cell: CellId::new(1), coord: &b, weight: 0.5, state: &sb },
        ]);
        assert_eq!(view.len(), 2);
        assert_eq!(view.states().copied().collect::<Vec<_>>(), vec![1.0, 2.0]);
        assert_eq!(view.find(CellId::new(1)).map(|n| n.weight), Some(0.5));
        assert!(view.find(CellId::new(5)).is_none());
    }

    #[test]
    fn test_fn_model_and_default_delay() {
        let model = FnModel::new(|s: &u32, n: &NeighborView<u32>| Ok(*s + n.len() as u32));
        let next = model.transition(&3, &NeighborView::empty()).unwrap();
        assert_eq!(next, 3);
        assert_eq!(
            model.output_delay(&next, VirtualTime::new(4)),
            VirtualTime::new(4)
        );
    }
}
