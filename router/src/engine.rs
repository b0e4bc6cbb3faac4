use crate::algo::pattern::Connection;
use crate::detailed_router::{self, NegotiationParams};
use crate::global_router::{self, GlobalParams, GlobalSolution};
use crate::grid::{DenseGrid, H_PLANE, RoutingGrid, V_PLANE};
use crate::layer_assign::{self, LayerStack};
use crate::utils::conversion::GridConverter;
use pnr_common::db::core::{RouteSegment, RoutingMeasures, SharedDesign};
use pnr_common::engine::{
    EngineError, GlobalLoadMode, LayerAssignMode, RouteFlags, RoutingEngine,
};
use pnr_common::geom::coord::GridCoord;
use pnr_common::geom::point::Point;
use pnr_common::util::config::{ConfigError, ConfigStore};
use pnr_common::util::profiler::ScopedTimer;
use pnr_common::viewer::{NoViewer, Viewer};
use std::rc::Rc;

pub const GLOBAL_ITERATIONS: &str = "anabatic.globalIterations";
pub const GCELL_SIZE: &str = "anabatic.gcellSize";
pub const EDGE_CAPACITY: &str = "anabatic.edgeCapacity";
pub const NEGOCIATE_ITERATIONS: &str = "katana.negociateIterations";

const ENGINE: &str = "GridRouter";

/// Smallest bloat added to a cell sitting in an overloaded gcell.
const MIN_BLOAT_STEP: f64 = 0.2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterParams {
    pub global_iterations: usize,
    /// Gcell side, in rows.
    pub gcell_rows: u32,
    /// Tracks per gcell on each layer.
    pub edge_capacity: u32,
    pub negociate_iterations: usize,
}

impl Default for RouterParams {
    fn default() -> Self {
        Self {
            global_iterations: 10,
            gcell_rows: 2,
            // Tracks per side of a two-row gcell at the default pitch.
            edge_capacity: 8,
            negociate_iterations: 20,
        }
    }
}

impl RouterParams {
    pub fn load(config: &ConfigStore) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let at_least = |key: &str, default: i64, min: i64| -> Result<i64, ConfigError> {
            let value = config.get_int_or(key, default)?;
            if value < min {
                return Err(ConfigError::OutOfRange {
                    key: key.to_string(),
                    value,
                    reason: if min == 0 {
                        "must not be negative"
                    } else {
                        "must be at least 1"
                    },
                });
            }
            Ok(value)
        };

        Ok(Self {
            global_iterations: at_least(GLOBAL_ITERATIONS, defaults.global_iterations as i64, 0)?
                as usize,
            gcell_rows: at_least(GCELL_SIZE, defaults.gcell_rows as i64, 1)? as u32,
            edge_capacity: at_least(EDGE_CAPACITY, defaults.edge_capacity as i64, 1)? as u32,
            negociate_iterations: at_least(
                NEGOCIATE_ITERATIONS,
                defaults.negociate_iterations as i64,
                0,
            )? as usize,
        })
    }
}

/// Gcell based router: pattern global routing with negotiated congestion,
/// then layer assignment and per-layer negotiation.
///
/// Calls must follow the flow order; skipping a step yields
/// [`EngineError::Sequence`].
pub struct GridRouter {
    design: SharedDesign,
    params: RouterParams,
    pass: u32,
    viewer: Rc<dyn Viewer>,

    converter: Option<GridConverter>,
    stack: LayerStack,
    pins: Vec<Vec<GridCoord>>,

    global_grid: Option<DenseGrid>,
    global: Option<GlobalSolution>,
    order: Option<Vec<usize>>,
    layer_grid: Option<DenseGrid>,
    assigned: Vec<Vec<Connection>>,
    negotiated: bool,
    finalized: bool,

    global_success: bool,
    detailed_success: bool,
}

fn out_of_sequence(call: &'static str, requires: &'static str) -> EngineError {
    EngineError::Sequence {
        engine: ENGINE,
        call,
        requires,
    }
}

impl GridRouter {
    pub fn new(design: SharedDesign, config: &ConfigStore) -> Result<Self, EngineError> {
        let params = RouterParams::load(config)?;
        log::debug!("GridRouter created with {:?}", params);
        Ok(Self {
            design,
            params,
            pass: 0,
            viewer: Rc::new(NoViewer),
            converter: None,
            stack: LayerStack::default(),
            pins: Vec::new(),
            global_grid: None,
            global: None,
            order: None,
            layer_grid: None,
            assigned: Vec::new(),
            negotiated: false,
            finalized: false,
            global_success: false,
            detailed_success: false,
        })
    }

    pub fn params(&self) -> &RouterParams {
        &self.params
    }

    /// Drops every routing result, keeping the grid set up by `digital_init`.
    fn clear_results(&mut self) {
        self.global_grid = None;
        self.global = None;
        self.order = None;
        self.layer_grid = None;
        self.assigned.clear();
        self.negotiated = false;
        self.finalized = false;
        self.global_success = false;
        self.detailed_success = false;
    }

    /// Widens the cells sitting in overloaded gcells by how much their gcell
    /// is over capacity, so the next placement spreads them out. Returns the
    /// number of cells touched.
    fn bloat_congested_cells(&self, grid: &DenseGrid, converter: &GridConverter) -> usize {
        let mut design = self.design.borrow_mut();
        let mut bloated = 0;
        for i in 0..design.num_cells() {
            let cell = &design.cells[i];
            if cell.is_fixed {
                continue;
            }
            let center = design.positions[i] + Point::new(cell.width / 2.0, cell.height / 2.0);
            let g = converter.to_grid(center, H_PLANE);
            let load = [g, g.on_layer(V_PLANE)]
                .iter()
                .map(|&c| grid.occupancy(c) as f64 / grid.capacity(c).max(1) as f64)
                .fold(0.0, f64::max);
            if load > 1.0 {
                design.cells[i].inflate((load - 1.0).max(MIN_BLOAT_STEP));
                bloated += 1;
            }
        }
        bloated
    }

    fn report_global(
        &self,
        grid: &DenseGrid,
        converter: &GridConverter,
        flags: RouteFlags,
        bloated: usize,
    ) {
        let congested = grid.congested();
        if congested.is_empty() {
            return;
        }

        if flags.show_overloaded_gcells {
            for &c in &congested {
                self.viewer.select(converter.gcell_area(c));
            }
            self.viewer.set_show_selection(true);
            log::warn!("GR: {} overloaded gcells.", congested.len());
        }

        if flags.show_overloaded_edges {
            let overflow_on = |plane: u8| -> u32 {
                congested
                    .iter()
                    .filter(|c| c.z == plane)
                    .map(|&c| grid.overflow(c))
                    .sum()
            };
            log::warn!(
                "GR: overflow {} horizontal, {} vertical.",
                overflow_on(H_PLANE),
                overflow_on(V_PLANE)
            );
        }

        if flags.show_bloated_instances {
            log::info!("GR: {} instances bloated for the next placement.", bloated);
        }
    }
}

impl RoutingEngine for GridRouter {
    fn set_pass_number(&mut self, pass: u32) {
        self.pass = pass;
    }

    fn set_viewer(&mut self, viewer: Rc<dyn Viewer>) {
        self.viewer = viewer;
    }

    fn digital_init(&mut self) -> Result<(), EngineError> {
        let design = self.design.borrow();
        if !design.placed || design.abutment_box.is_empty() {
            return Err(EngineError::Routing(format!(
                "design '{}' must be placed before routing",
                design.name
            )));
        }
        let stack = LayerStack::from_design(&design)?;

        let step = design.row_height * self.params.gcell_rows as f64;
        let converter = GridConverter::new(design.abutment_box, step);
        let pins: Vec<Vec<GridCoord>> = design
            .nets
            .iter()
            .map(|net| {
                net.pins
                    .iter()
                    .map(|&p| converter.to_grid(design.pin_position(p), H_PLANE))
                    .collect()
            })
            .collect();
        log::info!(
            "GridRouter: {} x {} gcells, {} horizontal / {} vertical layers, {} nets.",
            converter.grid_w(),
            converter.grid_h(),
            stack.horizontal.len(),
            stack.vertical.len(),
            pins.len()
        );
        drop(design);

        self.stack = stack;
        self.pins = pins;
        self.converter = Some(converter);
        self.clear_results();
        Ok(())
    }

    fn run_global_router(&mut self, flags: RouteFlags) -> Result<(), EngineError> {
        let converter = self
            .converter
            .clone()
            .ok_or_else(|| out_of_sequence("run_global_router", "digital_init"))?;
        let _timer = ScopedTimer::new(format!("Global routing pass {}", self.pass));
        self.clear_results();

        let mut grid = DenseGrid::new(converter.grid_w(), converter.grid_h(), 2, 0);
        let capacity = |layers: usize| self.params.edge_capacity * layers as u32;
        grid.set_layer_capacity(H_PLANE, capacity(self.stack.horizontal.len()));
        grid.set_layer_capacity(V_PLANE, capacity(self.stack.vertical.len()));

        let params = GlobalParams {
            iterations: self.params.global_iterations,
            seed: self.pass as u64,
            ..Default::default()
        };
        let solution = global_router::run(&mut grid, &self.pins, &params);
        self.global_success = solution.converged;
        log::info!(
            "Global routing {} after {} rip-up rounds (budget {}).",
            if solution.converged { "converged" } else { "left congestion" },
            solution.rounds,
            params.iterations
        );

        let bloated = if solution.converged {
            0
        } else {
            self.bloat_congested_cells(&grid, &converter)
        };
        self.global = Some(solution);
        self.report_global(&grid, &converter, flags, bloated);
        self.global_grid = Some(grid);
        Ok(())
    }

    fn is_global_routing_success(&self) -> bool {
        self.global_success
    }

    fn reset_routing(&mut self) -> Result<(), EngineError> {
        self.clear_results();
        self.design.borrow_mut().clear_routing();
        log::info!("GridRouter: routing of pass {} discarded.", self.pass);
        Ok(())
    }

    fn load_global_routing(&mut self, mode: GlobalLoadMode) -> Result<(), EngineError> {
        let (Some(global), Some(grid)) = (&self.global, &self.global_grid) else {
            return Err(out_of_sequence("load_global_routing", "run_global_router"));
        };

        let mut order: Vec<usize> = (0..global.routes.len()).collect();
        if mode == GlobalLoadMode::ByGCell {
            let pressure: Vec<f64> = global
                .routes
                .iter()
                .map(|connections| {
                    connections
                        .iter()
                        .flat_map(|c| &c.segments)
                        .flat_map(|s| s.gcells())
                        .map(|c| grid.occupancy(c) as f64 / grid.capacity(c).max(1) as f64)
                        .sum()
                })
                .collect();
            order.sort_by(|&a, &b| pressure[b].total_cmp(&pressure[a]));
        }
        log::debug!("Global routing loaded {:?} for {} nets.", mode, order.len());

        self.order = Some(order);
        self.layer_grid = None;
        self.negotiated = false;
        self.finalized = false;
        Ok(())
    }

    fn layer_assign(&mut self, mode: LayerAssignMode) -> Result<(), EngineError> {
        let (Some(order), Some(global), Some(converter)) =
            (&self.order, &self.global, &self.converter)
        else {
            return Err(out_of_sequence("layer_assign", "load_global_routing"));
        };

        let layers = self.design.borrow().layers.len() as u8;
        let (w, h) = (converter.grid_w(), converter.grid_h());
        let mut grid = DenseGrid::new(w, h, layers, self.params.edge_capacity);
        let mut routes = global.routes.clone();
        layer_assign::assign(&mut grid, &self.stack, &mut routes, order, mode);
        log::info!(
            "Layer assignment ({:?}): {} overloaded gcells.",
            mode,
            grid.total_conflicts()
        );

        self.assigned = routes;
        self.layer_grid = Some(grid);
        self.negotiated = false;
        self.finalized = false;
        Ok(())
    }

    fn run_negociate(&mut self, _flags: RouteFlags) -> Result<(), EngineError> {
        let Some(grid) = self.layer_grid.as_mut() else {
            return Err(out_of_sequence("run_negociate", "layer_assign"));
        };
        let _timer = ScopedTimer::new(format!("Detailed routing pass {}", self.pass));

        let params = NegotiationParams {
            iterations: self.params.negociate_iterations,
            history_increment: 0.5,
        };
        let result = detailed_router::negotiate(grid, &self.stack, &mut self.assigned, &params);
        self.detailed_success = result.converged;
        log::info!(
            "Negotiation {} after {} rounds, {} segments moved.",
            if result.converged { "converged" } else { "left overflow" },
            result.rounds,
            result.moved
        );

        self.negotiated = true;
        self.finalized = false;
        Ok(())
    }

    fn is_detailed_routing_success(&self) -> bool {
        self.detailed_success
    }

    fn finalize_layout(&mut self) -> Result<(), EngineError> {
        let Some(converter) = self.converter.as_ref().filter(|_| self.negotiated) else {
            return Err(out_of_sequence("finalize_layout", "run_negociate"));
        };

        let mut design = self.design.borrow_mut();
        design.clear_routing();
        for (net, connections) in self.assigned.iter().enumerate() {
            let wires = &mut design.nets[net].route_segments;
            for conn in connections {
                // Pins are reached from the lowest layer.
                let mut below = 0u8;
                let mut last = converter.to_world(conn.source);
                for seg in &conn.segments {
                    let (p1, p2) = (converter.to_world(seg.from), converter.to_world(seg.to));
                    push_vias(wires, p1, below, seg.layer());
                    wires.push(RouteSegment {
                        layer: seg.layer(),
                        p1,
                        p2,
                    });
                    below = seg.layer();
                    last = p2;
                }
                push_vias(wires, last, below, 0);
            }
        }
        drop(design);

        self.finalized = true;
        Ok(())
    }

    fn dump_measures(&mut self) -> Result<(), EngineError> {
        let Some(grid) = self.layer_grid.as_ref().filter(|_| self.finalized) else {
            return Err(out_of_sequence("dump_measures", "finalize_layout"));
        };

        let mut design = self.design.borrow_mut();
        let mut measures = RoutingMeasures {
            pass_number: self.pass,
            overflow: grid.total_overflow() as usize,
            ..Default::default()
        };
        for seg in design.nets.iter().flat_map(|n| &n.route_segments) {
            if seg.length() < 1e-9 {
                measures.vias += 1;
            } else {
                measures.segments += 1;
                measures.wirelength += seg.length();
            }
        }
        log::info!(
            "Routing measures (pass {}): wirelength {:.2}, {} segments, {} vias, overflow {}",
            measures.pass_number,
            measures.wirelength,
            measures.segments,
            measures.vias,
            measures.overflow
        );
        design.measures = Some(measures);
        Ok(())
    }

    fn destroy(self: Box<Self>) {
        log::debug!("GridRouter for pass {} released.", self.pass);
    }
}

/// One zero-length segment per layer crossed, named after its lower layer.
fn push_vias(wires: &mut Vec<RouteSegment>, at: Point<f64>, from: u8, to: u8) {
    for layer in from.min(to)..from.max(to) {
        wires.push(RouteSegment { layer, p1: at, p2: at });
    }
}
