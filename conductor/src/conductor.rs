use crate::error::ConductorError;
use crate::params::{GLOBAL_ITERATIONS, RunParameters};
use pnr_common::db::core::SharedDesign;
use pnr_common::engine::{
    EngineError, EngineFactory, GlobalLoadMode, LayerAssignMode, RouteFlags, RoutingEngine,
};
use pnr_common::util::breakpoint::Breakpoint;
use pnr_common::util::config::{ConfigStore, Priority};
use pnr_common::util::profiler::ScopedTimer;
use pnr_common::viewer::{NoViewer, Viewer};
use std::rc::Rc;

/// Arguments of one run, as handed over by the host.
#[derive(Clone, Default)]
pub struct RunArgs {
    pub cell: Option<SharedDesign>,
    pub editor: Option<Rc<dyn Viewer>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub global_routing_succeeded: bool,
    pub detailed_routing_succeeded: bool,
    pub placement_attempts: usize,
}

/// Result of a run. `status` stays 0 whenever the run terminated normally,
/// failures travel in `outcome` and `error`.
#[derive(Debug)]
pub struct RunReport {
    pub status: i32,
    pub outcome: Option<Outcome>,
    pub error: Option<ConductorError>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.outcome.is_some_and(|o| o.detailed_routing_succeeded)
    }
}

#[derive(Default)]
struct IterationState {
    index: usize,
    placements: usize,
    /// Survives a failed global route until the next recovery step, or a
    /// successful one until the epilogue.
    router: Option<Box<dyn RoutingEngine>>,
}

/// Drives placement and routing engines to a routed design.
pub struct Conductor<'a> {
    config: &'a ConfigStore,
    engines: &'a dyn EngineFactory,
    breakpoint: &'a Breakpoint,
}

impl<'a> Conductor<'a> {
    pub fn new(
        config: &'a ConfigStore,
        engines: &'a dyn EngineFactory,
        breakpoint: &'a Breakpoint,
    ) -> Self {
        Self {
            config,
            engines,
            breakpoint,
        }
    }

    /// Runs the whole flow. Never fails: errors are logged and returned in
    /// the report.
    pub fn execute(&self, args: RunArgs) -> RunReport {
        let _timer = ScopedTimer::new("P&R Conductor");
        match self.converge(args) {
            Ok(outcome) => RunReport {
                status: 0,
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => {
                log::error!("{}", e.report());
                RunReport {
                    status: 0,
                    outcome: None,
                    error: Some(e),
                }
            }
        }
    }

    fn converge(&self, args: RunArgs) -> Result<Outcome, ConductorError> {
        // Everything written from here on is undone when the guard drops.
        let _priority = self.config.push_default_priority(Priority::Interactive);

        let params = RunParameters::load(self.config)?;
        self.breakpoint.set_stop_level(params.stop_level);
        self.config.set_int(GLOBAL_ITERATIONS, params.global_iterations_estimate);

        let editor = args.editor;
        if let Some(editor) = &editor {
            log::info!("Editor found, running in graphic mode.");
            editor.set_layer_visible("rubber", false);
        }
        let viewer: Rc<dyn Viewer> = editor
            .clone()
            .unwrap_or_else(|| Rc::new(NoViewer) as Rc<dyn Viewer>);

        let cell = args
            .cell
            .or_else(|| editor.as_ref().and_then(|e| e.get_cell()))
            .ok_or(ConductorError::NoCell)?;

        let mut state = IterationState::default();
        let mut global_success = false;

        while state.index < params.max_place_iterations {
            log::info!(
                "P&R Conductor iteration: {} (max:{})",
                state.index,
                params.max_place_iterations
            );

            self.recover(&mut state, viewer.as_ref())?;
            self.place(&cell, &params, &mut state, editor.as_ref(), viewer.as_ref())?;

            if params.is_last_iteration(state.index) {
                log::info!(
                    "Last placement iteration, global router effort raised to {} (was {}).",
                    params.global_iterations_final,
                    params.global_iterations_estimate
                );
                self.config.set_int(GLOBAL_ITERATIONS, params.global_iterations_final);
            }

            let router = self.route_global(&cell, state.index, editor.as_ref(), viewer.as_ref())?;
            let converged = router.is_global_routing_success();
            state.router = Some(router);

            if converged {
                log::info!("Global routing succeeded at iteration {}.", state.index);
                global_success = true;
                break;
            }
            log::warn!("Global routing failed at iteration {}.", state.index);
            state.index += 1;
        }

        let last_pass = state.index.min(params.max_place_iterations - 1);
        let detailed_success = match state.router.take() {
            Some(router) => self.finalize(router, last_pass)?,
            None => {
                log::warn!("No routing engine left after the loop, skipping detailed routing.");
                false
            }
        };

        if detailed_success {
            log::info!("Detailed routing succeeded.");
        } else {
            log::warn!("Detailed routing did not complete cleanly.");
        }

        Ok(Outcome {
            global_routing_succeeded: global_success,
            detailed_routing_succeeded: detailed_success,
            placement_attempts: state.placements,
        })
    }

    /// Discards the router left over by a failed global route, so the design
    /// gets placed again before any new routing attempt.
    fn recover(
        &self,
        state: &mut IterationState,
        viewer: &dyn Viewer,
    ) -> Result<(), ConductorError> {
        let Some(mut router) = state.router.take() else {
            return Ok(());
        };
        log::info!("Global routing has failed, re-place design.");
        router
            .reset_routing()
            .map_err(|e| routing_error(state.index, "reset_routing", e))?;
        router.destroy();
        viewer.set_show_selection(false);
        Ok(())
    }

    fn place(
        &self,
        cell: &SharedDesign,
        params: &RunParameters,
        state: &mut IterationState,
        editor: Option<&Rc<dyn Viewer>>,
        viewer: &dyn Viewer,
    ) -> Result<(), ConductorError> {
        let index = state.index;
        let _timer = ScopedTimer::new(format!("Placement pass {}", index));
        let stage = |stage: &'static str| {
            move |source: EngineError| ConductorError::Placement {
                pass: index,
                stage,
                source,
            }
        };

        let mut placer = self
            .engines
            .create_placer(cell, self.config)
            .map_err(stage("create"))?;
        placer.set_pass_number(index as u32);
        if let Some(editor) = editor {
            placer.set_viewer(Rc::clone(editor));
        }

        if index > 0 {
            if params.use_fixed_ab_height && index == 1 {
                let height = cell.borrow().abutment_box.height();
                log::info!("Fixing abutment box height to {:.2}.", height);
                placer.set_fixed_ab_height(height);
            }
            placer.reset_placement().map_err(stage("reset_placement"))?;
        }

        state.placements += 1;
        placer.place().map_err(stage("place"))?;
        placer.destroy();

        viewer.refresh();
        viewer.fit();
        Ok(())
    }

    fn route_global(
        &self,
        cell: &SharedDesign,
        index: usize,
        editor: Option<&Rc<dyn Viewer>>,
        viewer: &dyn Viewer,
    ) -> Result<Box<dyn RoutingEngine>, ConductorError> {
        let _timer = ScopedTimer::new(format!("Global routing pass {}", index));
        let stage = |stage: &'static str| move |e: EngineError| routing_error(index, stage, e);

        let mut router = self
            .engines
            .create_router(cell, self.config)
            .map_err(stage("create"))?;
        router.set_pass_number(index as u32);
        if let Some(editor) = editor {
            router.set_viewer(Rc::clone(editor));
        }

        router.digital_init().map_err(stage("digital_init"))?;
        router
            .run_global_router(RouteFlags::GLOBAL_DIAGNOSTICS)
            .map_err(stage("run_global_router"))?;

        self.breakpoint.stop(1, &format!("After routing iteration {}", index));
        viewer.set_show_selection(false);
        Ok(router)
    }

    fn finalize(
        &self,
        mut router: Box<dyn RoutingEngine>,
        pass: usize,
    ) -> Result<bool, ConductorError> {
        let _timer = ScopedTimer::new("Detailed routing");
        let stage = |stage: &'static str| move |e: EngineError| routing_error(pass, stage, e);

        router
            .load_global_routing(GlobalLoadMode::ByNet)
            .map_err(stage("load_global_routing"))?;
        router
            .layer_assign(LayerAssignMode::NoNetLayerAssign)
            .map_err(stage("layer_assign"))?;
        router
            .run_negociate(RouteFlags::NONE)
            .map_err(stage("run_negociate"))?;
        let success = router.is_detailed_routing_success();

        self.breakpoint.stop(1, "Before finalizing & destroying the router.");
        router
            .finalize_layout()
            .map_err(stage("finalize_layout"))?;
        router.dump_measures().map_err(stage("dump_measures"))?;
        router.destroy();
        Ok(success)
    }
}

fn routing_error(pass: usize, stage: &'static str, source: EngineError) -> ConductorError {
    ConductorError::Routing {
        pass,
        stage,
        source,
    }
}
