//! Placement/routing convergence driver.
//!
//! The [`Conductor`] alternates placement and global routing attempts until
//! global routing converges or the iteration budget runs out, escalating the
//! global router effort on the last attempt, then finishes with a single
//! detailed routing pass.

pub mod conductor;
pub mod error;
pub mod params;
pub mod plugin;


pub use conductor::{Conductor, Outcome, RunArgs, RunReport};
pub use error::ConductorError;
pub use params::RunParameters;
pub use plugin::{MenuEntry, Plugin, PluginInfo};
