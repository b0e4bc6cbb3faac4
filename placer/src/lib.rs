//! Row-based reference placer.
//!
//! Sizes the abutment box, spreads cells with centroid smoothing and snaps
//! them into rows with a Tetris legalizer.

pub mod engine;
pub mod floorplan;
pub mod legalize;
pub mod physics;
pub mod solver;

pub use engine::{PlacerParams, RowPlacer};
