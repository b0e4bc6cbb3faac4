//! Gcell based reference router.

pub mod algo;
pub mod detailed_router;
pub mod engine;
pub mod global_router;
pub mod grid;
pub mod layer_assign;
pub mod utils;

pub use engine::{GridRouter, RouterParams};
