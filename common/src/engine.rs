//! Contracts between the flow driver and the placement/routing engines.
//!
//! Engines are created per attempt through an [`EngineFactory`], configured,
//! run, and consumed by `destroy`. Each one works on the shared design and
//! reads its own tuning from the [`ConfigStore`] it was created with.

use crate::db::core::SharedDesign;
use crate::util::config::{ConfigError, ConfigStore};
use crate::viewer::Viewer;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("placement failed: {0}")]
    Placement(String),
    #[error("routing failed: {0}")]
    Routing(String),
    #[error("{engine}: `{call}` requires `{requires}` first")]
    Sequence {
        engine: &'static str,
        call: &'static str,
        requires: &'static str,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Diagnostics requested from a routing phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteFlags {
    pub show_bloated_instances: bool,
    pub show_overloaded_edges: bool,
    pub show_overloaded_gcells: bool,
}

impl RouteFlags {
    pub const NONE: RouteFlags = RouteFlags {
        show_bloated_instances: false,
        show_overloaded_edges: false,
        show_overloaded_gcells: false,
    };

    /// Bloated instances, overloaded edges and overloaded gcells.
    pub const GLOBAL_DIAGNOSTICS: RouteFlags = RouteFlags {
        show_bloated_instances: true,
        show_overloaded_edges: true,
        show_overloaded_gcells: true,
    };
}

/// How the global solution is handed over to the detailed phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalLoadMode {
    ByNet,
    ByGCell,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerAssignMode {
    /// Segment by segment, lowest layer with room first.
    NoNetLayerAssign,
    /// Long segments are pushed to the upper layers.
    ByLength,
    /// The longest segment of each net goes on the top layer of its direction.
    ByTrunk,
}

pub trait PlacementEngine {
    fn set_pass_number(&mut self, pass: u32);
    fn set_viewer(&mut self, viewer: Rc<dyn Viewer>);
    /// Keeps the abutment box at this height when it gets resized.
    fn set_fixed_ab_height(&mut self, height: f64);
    fn reset_placement(&mut self) -> Result<(), EngineError>;
    fn place(&mut self) -> Result<(), EngineError>;
    fn destroy(self: Box<Self>) {}
}

pub trait RoutingEngine {
    fn set_pass_number(&mut self, pass: u32);
    fn set_viewer(&mut self, viewer: Rc<dyn Viewer>);
    fn digital_init(&mut self) -> Result<(), EngineError>;
    fn run_global_router(&mut self, flags: RouteFlags) -> Result<(), EngineError>;
    fn is_global_routing_success(&self) -> bool;
    fn reset_routing(&mut self) -> Result<(), EngineError>;
    fn load_global_routing(&mut self, mode: GlobalLoadMode) -> Result<(), EngineError>;
    fn layer_assign(&mut self, mode: LayerAssignMode) -> Result<(), EngineError>;
    fn run_negociate(&mut self, flags: RouteFlags) -> Result<(), EngineError>;
    fn is_detailed_routing_success(&self) -> bool;
    fn finalize_layout(&mut self) -> Result<(), EngineError>;
    fn dump_measures(&mut self) -> Result<(), EngineError>;
    fn destroy(self: Box<Self>) {}
}

pub trait EngineFactory {
    fn create_placer(
        &self,
        design: &SharedDesign,
        config: &ConfigStore,
    ) -> Result<Box<dyn PlacementEngine>, EngineError>;

    fn create_router(
        &self,
        design: &SharedDesign,
        config: &ConfigStore,
    ) -> Result<Box<dyn RoutingEngine>, EngineError>;
}
