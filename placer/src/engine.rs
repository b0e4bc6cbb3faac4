use crate::floorplan::{effective_margin, size_abutment_box};
use crate::legalize::tetris::TetrisLegalizer;
use crate::physics::wirelength::hpwl;
use crate::solver::smoothing::{SmoothingParams, clamp_into, smooth};
use pnr_common::db::core::{Design, SharedDesign};
use pnr_common::engine::{EngineError, PlacementEngine};
use pnr_common::geom::point::Point;
use pnr_common::geom::rect::Rect;
use pnr_common::util::config::{ConfigError, ConfigStore};
use pnr_common::util::profiler::ScopedTimer;
use pnr_common::viewer::{NoViewer, Viewer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::rc::Rc;

pub const SPACE_MARGIN: &str = "etesian.spaceMargin";
pub const ASPECT_RATIO: &str = "etesian.aspectRatio";
pub const EFFORT: &str = "etesian.effort";
pub const SEED: &str = "etesian.seed";

/// Legalization attempts, each on a box widened a bit more.
const LEGALIZE_ATTEMPTS: usize = 3;
const WIDEN_STEP: f64 = 0.05;

#[derive(Clone, Debug, PartialEq)]
pub struct PlacerParams {
    pub space_margin: f64,
    pub aspect_ratio: f64,
    pub effort: usize,
    pub seed: u64,
}

impl Default for PlacerParams {
    fn default() -> Self {
        Self {
            space_margin: 0.10,
            aspect_ratio: 1.0,
            effort: 8,
            seed: 1,
        }
    }
}

impl PlacerParams {
    pub fn load(config: &ConfigStore) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_negative = |key: &str, default: i64| -> Result<u64, ConfigError> {
            let value = config.get_int_or(key, default)?;
            u64::try_from(value).map_err(|_| ConfigError::OutOfRange {
                key: key.to_string(),
                value,
                reason: "must not be negative",
            })
        };

        Ok(Self {
            space_margin: config.get_double_or(SPACE_MARGIN, defaults.space_margin)?,
            aspect_ratio: config.get_double_or(ASPECT_RATIO, defaults.aspect_ratio)?,
            effort: non_negative(EFFORT, defaults.effort as i64)? as usize,
            seed: non_negative(SEED, defaults.seed as i64)?,
        })
    }
}

/// Standard-cell placer working row by row on the shared design.
pub struct RowPlacer {
    design: SharedDesign,
    params: PlacerParams,
    pass: u32,
    fixed_ab_height: Option<f64>,
    viewer: Rc<dyn Viewer>,
}

impl RowPlacer {
    pub fn new(design: SharedDesign, config: &ConfigStore) -> Result<Self, EngineError> {
        let params = PlacerParams::load(config)?;
        log::debug!("RowPlacer created with {:?}", params);
        Ok(Self {
            design,
            params,
            pass: 0,
            fixed_ab_height: None,
            viewer: Rc::new(NoViewer),
        })
    }

    pub fn params(&self) -> &PlacerParams {
        &self.params
    }

    fn seed_positions(&self, design: &mut Design, area: Rect) {
        let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(self.pass as u64));
        for (cell, pos) in design.cells.iter().zip(design.positions.iter_mut()) {
            if cell.is_fixed {
                continue;
            }
            let x = area.min.x + rng.gen_range(0.0..=(area.width() - cell.width).max(0.0));
            let y = area.min.y + rng.gen_range(0.0..=(area.height() - cell.height).max(0.0));
            *pos = Point::new(x, y);
        }
    }

    fn place_into(&self, design: &mut Design) -> Result<(), EngineError> {
        if design.num_cells() == 0 {
            return Err(EngineError::Placement(format!(
                "design '{}' has no cells",
                design.name
            )));
        }

        let margin = effective_margin(self.params.space_margin, self.pass);
        let mut area = size_abutment_box(
            design,
            margin,
            self.params.aspect_ratio,
            self.fixed_ab_height,
        )?;
        log::info!(
            "Pass {}: abutment box {:.2} x {:.2} ({:.0}% whitespace)",
            self.pass,
            area.width(),
            area.height(),
            margin * 100.0
        );
        design.clear_routing();

        if design.placed {
            for (cell, pos) in design.cells.iter().zip(design.positions.iter_mut()) {
                if !cell.is_fixed {
                    *pos = clamp_into(*pos, cell.width, cell.height, area);
                }
            }
        } else {
            self.seed_positions(design, area);
        }

        let mut positions = design.positions.clone();
        let smoothing = SmoothingParams {
            sweeps: self.params.effort,
            ..Default::default()
        };
        smooth(design, &mut positions, area, &smoothing);
        let global = positions.clone();
        log::debug!("Global placement HPWL: {:.2}", hpwl(design, &positions));

        let legalizer = TetrisLegalizer::new();
        let mut attempt = 1;
        let stats = loop {
            design.positions.copy_from_slice(&global);
            match legalizer.legalize(design, area) {
                Ok(stats) => break stats,
                Err(e) if attempt < LEGALIZE_ATTEMPTS => {
                    log::warn!("{}, widening the abutment box.", e);
                    let width = area.width() * (1.0 + WIDEN_STEP);
                    area = Rect::from_size(area.min, width, area.height());
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        design.abutment_box = area;
        design.placed = true;
        log::info!(
            "Placed {} cells, HPWL {:.2}, legalization displacement {:.2} (max {:.2})",
            stats.cells,
            hpwl(design, &design.positions),
            stats.total_displacement,
            stats.max_displacement
        );
        Ok(())
    }
}

impl PlacementEngine for RowPlacer {
    fn set_pass_number(&mut self, pass: u32) {
        self.pass = pass;
    }

    fn set_viewer(&mut self, viewer: Rc<dyn Viewer>) {
        self.viewer = viewer;
    }

    fn set_fixed_ab_height(&mut self, height: f64) {
        self.fixed_ab_height = Some(height);
    }

    fn reset_placement(&mut self) -> Result<(), EngineError> {
        let mut design = self.design.borrow_mut();
        design.clear_routing();
        design.clear_placement();
        log::info!("Placement of '{}' reset.", design.name);
        Ok(())
    }

    fn place(&mut self) -> Result<(), EngineError> {
        let _timer = ScopedTimer::new(format!("RowPlacer pass {}", self.pass));
        {
            let mut design = self.design.borrow_mut();
            self.place_into(&mut design)?;
        }
        self.viewer.refresh();
        Ok(())
    }

    fn destroy(self: Box<Self>) {
        log::debug!("RowPlacer for pass {} released.", self.pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnr_common::util::config::{ParamValue, Priority};
    use pnr_common::util::generator::{GeneratorParams, generate_random_design};

    fn benchmark() -> SharedDesign {
        let params = GeneratorParams {
            cells: 60,
            nets: 70,
            ..Default::default()
        };
        generate_random_design("bench", &params).into_shared()
    }

    fn assert_legal(design: &Design) {
        let ab = design.abutment_box;
        for (i, (c, p)) in design.cells.iter().zip(&design.positions).enumerate() {
            assert!(p.x >= ab.min.x - 1e-9 && p.x + c.width <= ab.max.x + 1e-9);
            assert!(p.y >= ab.min.y - 1e-9 && p.y + c.height <= ab.max.y + 1e-9);
            let row = (p.y - ab.min.y) / design.row_height;
            assert!((row - row.round()).abs() < 1e-9);
            for (c2, p2) in design.cells.iter().zip(&design.positions).skip(i + 1) {
                let disjoint = p.x + c.width <= p2.x + 1e-9
                    || p2.x + c2.width <= p.x + 1e-9
                    || p.y + c.height <= p2.y + 1e-9
                    || p2.y + c2.height <= p.y + 1e-9;
                assert!(disjoint);
            }
        }
    }

    #[test]
    fn places_a_benchmark_legally() {
        let design = benchmark();
        let mut placer = RowPlacer::new(design.clone(), &ConfigStore::new()).unwrap();
        placer.place().unwrap();

        let d = design.borrow();
        assert!(d.placed);
        assert!(!d.abutment_box.is_empty());
        assert_legal(&d);
    }

    #[test]
    fn later_passes_get_more_room() {
        let design = benchmark();
        let config = ConfigStore::new();

        let mut first = RowPlacer::new(design.clone(), &config).unwrap();
        first.place().unwrap();
        let first_box = design.borrow().abutment_box;

        let mut third = RowPlacer::new(design.clone(), &config).unwrap();
        third.set_pass_number(2);
        third.reset_placement().unwrap();
        assert!(!design.borrow().placed);
        third.place().unwrap();

        assert!(design.borrow().abutment_box.area() > first_box.area());
        assert_legal(&design.borrow());
    }

    #[test]
    fn fixed_height_is_kept() {
        let design = benchmark();
        let mut placer = RowPlacer::new(design.clone(), &ConfigStore::new()).unwrap();
        placer.set_pass_number(1);
        placer.set_fixed_ab_height(12.0);
        placer.place().unwrap();

        assert!((design.borrow().abutment_box.height() - 12.0).abs() < 1e-9);
        assert_legal(&design.borrow());
    }

    #[test]
    fn empty_design_fails() {
        let design = Design::new("empty", 2.0).into_shared();
        let mut placer = RowPlacer::new(design, &ConfigStore::new()).unwrap();
        assert!(matches!(placer.place(), Err(EngineError::Placement(_))));
    }

    #[test]
    fn blocked_rows_fail() {
        let mut d = Design::new("blocked", 2.0);
        d.add_cell("a", "INV", 1.0, 2.0, false);
        let wall = d.add_cell("wall", "RAM", 1000.0, 1000.0, true);
        d.positions[wall.index()] = Point::new(-10.0, -10.0);
        let mut placer = RowPlacer::new(d.into_shared(), &ConfigStore::new()).unwrap();

        assert!(matches!(placer.place(), Err(EngineError::Placement(_))));
    }

    #[test]
    fn parameters_come_from_the_store() {
        let config = ConfigStore::new();
        config.set(EFFORT, ParamValue::Int(3), Priority::ConfigurationFile);
        config.set(SPACE_MARGIN, ParamValue::Double(0.25), Priority::ConfigurationFile);
        let placer = RowPlacer::new(benchmark(), &config).unwrap();
        assert_eq!(placer.params().effort, 3);
        assert_eq!(placer.params().space_margin, 0.25);

        config.set(SEED, ParamValue::Int(-4), Priority::CommandLine);
        assert!(matches!(
            RowPlacer::new(benchmark(), &config),
            Err(EngineError::Config(ConfigError::OutOfRange { .. }))
        ));
    }
}
