//! Record data model shared by the window model, presenter and storage.
//!
//! # Responsibility
//! - Define property identifiers, values and the declared record layout.
//! - Define the snapshot shapes exchanged with the view and the repository.
//!
//! # Invariants
//! - Every grid cell is addressable as `(grid, row, cell)` and as the flat
//!   composite name `grid.row.cell`.

pub mod descriptor;
pub mod property_name;
pub mod snapshot;
pub mod value;
pub mod value_set;
