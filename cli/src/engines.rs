use pnr_common::db::core::SharedDesign;
use pnr_common::engine::{EngineError, EngineFactory, PlacementEngine, RoutingEngine};
use pnr_common::util::config::ConfigStore;
use pnr_placer::RowPlacer;
use pnr_router::GridRouter;

/// Hands the conductor the row placer and the gcell router.
pub struct ReferenceEngines;

impl EngineFactory for ReferenceEngines {
    fn create_placer(
        &self,
        design: &SharedDesign,
        config: &ConfigStore,
    ) -> Result<Box<dyn PlacementEngine>, EngineError> {
        Ok(Box::new(RowPlacer::new(design.clone(), config)?))
    }

    fn create_router(
        &self,
        design: &SharedDesign,
        config: &ConfigStore,
    ) -> Result<Box<dyn RoutingEngine>, EngineError> {
        Ok(Box::new(GridRouter::new(design.clone(), config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnr_common::util::breakpoint::Breakpoint;
    use pnr_common::util::config::{ParamValue, Priority};
    use pnr_common::util::generator::{GeneratorParams, generate_random_design};
    use pnr_conductor::{Conductor, RunArgs};

    #[test]
    fn conductor_drives_the_reference_engines() {
        let params = GeneratorParams {
            cells: 80,
            nets: 90,
            ..Default::default()
        };
        let design = generate_random_design("flow", &params).into_shared();
        let config = ConfigStore::new();
        config.set("conductor.maxPlaceIterations", ParamValue::Int(3), Priority::CommandLine);
        let breakpoint = Breakpoint::new();

        let report = Conductor::new(&config, &ReferenceEngines, &breakpoint).execute(RunArgs {
            cell: Some(design.clone()),
            editor: None,
        });

        assert_eq!(report.status, 0);
        assert!(report.error.is_none(), "{:?}", report.error);
        let outcome = report.outcome.unwrap();
        assert!((1..=3).contains(&outcome.placement_attempts));

        let d = design.borrow();
        assert!(d.placed);
        assert!(d.measures.is_some());
        assert!(d.nets.iter().any(|n| !n.route_segments.is_empty()));
        assert_eq!(config.priority_depth(), 0);
    }

    #[test]
    fn roomy_tracks_route_on_the_first_placement() {
        // Nets carry at most three connections, so 120 tracks per layer
        // outnumber every connection of 40 nets.
        let params = GeneratorParams {
            cells: 60,
            nets: 40,
            ..Default::default()
        };
        let design = generate_random_design("roomy", &params).into_shared();
        let config = ConfigStore::new();
        config.set("anabatic.edgeCapacity", ParamValue::Int(120), Priority::CommandLine);
        let breakpoint = Breakpoint::new();

        let report = Conductor::new(&config, &ReferenceEngines, &breakpoint).execute(RunArgs {
            cell: Some(design.clone()),
            editor: None,
        });

        assert!(report.succeeded(), "{:?}", report.error);
        let outcome = report.outcome.unwrap();
        assert!(outcome.global_routing_succeeded);
        assert!(outcome.detailed_routing_succeeded);
        assert_eq!(outcome.placement_attempts, 1);

        let d = design.borrow();
        assert_eq!(d.measures.as_ref().map(|m| m.overflow), Some(0));
        assert!(d.cells.iter().all(|c| c.bloat == 0.0));
    }

    #[test]
    fn congestion_bloats_cells_before_replacing() {
        let params = GeneratorParams {
            cells: 80,
            nets: 90,
            ..Default::default()
        };
        let design = generate_random_design("starved", &params).into_shared();
        let config = ConfigStore::new();
        config.set("conductor.maxPlaceIterations", ParamValue::Int(2), Priority::CommandLine);
        config.set("anabatic.edgeCapacity", ParamValue::Int(1), Priority::CommandLine);
        let breakpoint = Breakpoint::new();

        let report = Conductor::new(&config, &ReferenceEngines, &breakpoint).execute(RunArgs {
            cell: Some(design.clone()),
            editor: None,
        });

        assert!(report.error.is_none(), "{:?}", report.error);
        let outcome = report.outcome.unwrap();
        assert!(!outcome.global_routing_succeeded);
        assert_eq!(outcome.placement_attempts, 2);

        let d = design.borrow();
        assert!(d.placed);
        assert!(d.cells.iter().any(|c| c.bloat > 0.0));
        let bare: f64 = d.cells.iter().map(|c| c.width * c.height).sum();
        assert!(d.abutment_box.area() > bare);
    }
}
