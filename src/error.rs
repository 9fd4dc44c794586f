//! Structured error types for the Cell-DEVS kernel.
//!
//! Three categories exist. Configuration errors are raised while building a
//! lattice and never once a run has started. Domain errors are raised by a
//! cell model during a transition and abort the run. Usage errors belong to
//! the CLI and never reach the kernel. Nothing is retried.

use std::io;

use thiserror::Error;

use crate::cell::{CellId, Coord};
use crate::time::VirtualTime;

/// A scenario could not be turned into a lattice.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("cannot read scenario {path}: {message}")]
    Io { path: String, message: String },

    #[error("scenario is not valid JSON: {0}")]
    Parse(String),

    #[error("invalid lattice shape {shape:?}: {reason}")]
    Shape { shape: Vec<i64>, reason: String },

    #[error("invalid neighborhood: {0}")]
    Neighborhood(String),

    #[error("unknown cell type {cell_type:?} at {location}")]
    UnknownCellType { cell_type: String, location: String },

    #[error("invalid parameters for cell type {cell_type:?} at {location}: {message}")]
    InvalidParameters {
        cell_type: String,
        location: String,
        message: String,
    },

    #[error("invalid initial state at {location}: {message}")]
    InvalidState { location: String, message: String },

    #[error("coordinate {coord:?} in {context} lies outside shape {shape:?}")]
    OutOfRange {
        coord: Vec<i64>,
        shape: Vec<usize>,
        context: String,
    },

    #[error("{context} has {found} dimensions, lattice has {expected}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        context: String,
    },

    #[error("region {index} is invalid: {reason}")]
    InvalidRegion { index: usize, reason: String },

    #[error("cell {0} is configured more than once")]
    DuplicateCell(Coord),
}

/// A cell model could not compute its next state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CellError {
    message: String,
}

impl CellError {
    pub fn new(message: impl Into<String>) -> Self {
        CellError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The top-level error type for the kernel.
#[derive(Debug, Error)]
pub enum CellDevsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transition failed; the run is aborted.
    #[error("transition of cell {cell} {coord} failed at {time}: {source}")]
    Transition {
        time: VirtualTime,
        cell: CellId,
        coord: Coord,
        #[source]
        source: CellError,
    },

    /// Zero-delay messages kept re-triggering cells within one instant.
    #[error("instant {time} did not settle after {rounds} rounds (zero-delay loop)")]
    ZeroDelayLoop { time: VirtualTime, rounds: usize },

    #[error("scheduling {delay} ticks after {at} overflows virtual time")]
    TimeOverflow { at: VirtualTime, delay: u64 },

    #[error("observer failed: {0}")]
    Observer(#[from] io::Error),

    /// The run was aborted by an earlier failure and cannot continue.
    #[error("simulation was aborted by an earlier error")]
    RunAborted,
}

/// Convenience alias for `Result<T, CellDevsError>`.
pub type CellDevsResult<T> = Result<T, CellDevsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_cell_type_names_location() {
        let e = ConfigError::UnknownCellType {
            cell_type: "CO2_cell".into(),
            location: "cell (1,2)".into(),
        };
        let s = e.to_string();
        assert!(s.contains("CO2_cell"));
        assert!(s.contains("(1,2)"));
    }

    #[test]
    fn test_transition_error_display() {
        let e = CellDevsError::Transition {
            time: VirtualTime::new(4),
            cell: CellId::new(7),
            coord: Coord::from([2, 1]),
            source: CellError::new("concentration is NaN"),
        };
        let s = e.to_string();
        assert!(s.contains("C7"));
        assert!(s.contains("(2,1)"));
        assert!(s.contains("T=4"));
        assert!(s.contains("NaN"));
    }

    #[test]
    fn test_config_error_converts() {
        let e: CellDevsError = ConfigError::Parse("eof".into()).into();
        assert!(matches!(e, CellDevsError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_error_is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(CellDevsError::RunAborted);
        assert!(!e.to_string().is_empty());
    }
}
