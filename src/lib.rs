//! Exact strip packing of grid-aligned rectangles.
//!
//! Items measured in grid cells are placed into a strip of fixed width so
//! that none overlap and the strip is as low as possible. Each trial height
//! is a 0/1 feasibility model handed to an exact [`engine`]; heights are
//! tried upward from the area bound until one is feasible.
//!
//! ```
//! use strip_packer::{Item, solve_strip};
//!
//! let items = vec![Item::new("a", 3, 2), Item::new("b", 3, 2)];
//! let result = solve_strip(&items, 3).unwrap();
//! assert_eq!(result.height, 4);
//! ```

pub mod candidates;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod render;
pub mod solver;
pub mod types;

pub use catalog::Catalog;
pub use config::SolverConfig;
pub use error::{Error, Result};
pub use solver::{Solver, solve_strip};
pub use types::{Item, Placement, PlacementResult};
