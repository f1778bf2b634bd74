//! Error types for strip packing.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for strip packing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every way `solve_strip` can fail. Infeasibility of a single trial height
/// is not an error; it only moves the search to the next height.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// No items to place.
    #[error("no items to place")]
    EmptyInput,

    /// Strip width of zero.
    #[error("strip width must be positive")]
    InvalidWidth,

    /// An item that can never be placed.
    #[error("item '{id}' is invalid: {reason}")]
    InvalidItem { id: String, reason: String },

    /// Two items share an id.
    #[error("duplicate item id '{0}'")]
    DuplicateItem(String),

    /// The engine failed to load or solve a model, or returned an
    /// assignment that does not decode.
    #[error("constraint engine unavailable: {0}")]
    SolverUnavailable(String),

    /// The engine ran out of its per-trial budget.
    #[error("constraint engine timed out at height {height} after {}ms", .limit.as_millis())]
    SolverTimeout { height: u32, limit: Duration },

    /// No feasible height up to the stacking bound.
    #[error("no feasible placement found up to height {ceiling}")]
    HeightCeilingExceeded { ceiling: u32 },

    /// Cancelled by the caller.
    #[error("solve cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn invalid_item(id: &str, reason: impl Into<String>) -> Self {
        Error::InvalidItem {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the request rather than by the engine.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyInput | Error::InvalidWidth | Error::InvalidItem { .. } | Error::DuplicateItem(_)
        )
    }
}
