use crate::db::core::Design;
use crate::geom::point::Point;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct GeneratorParams {
    pub cells: usize,
    pub nets: usize,
    /// Maximum sinks per net; the driver is added on top.
    pub max_fanout: usize,
    pub layers: u8,
    pub seed: u64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            cells: 200,
            nets: 120,
            max_fanout: 3,
            layers: 6,
            seed: 1,
        }
    }
}

const ROW_HEIGHT: f64 = 2.0;
const SITE_WIDTH: f64 = 0.5;
const LIB_CELLS: [(&str, usize); 4] = [
    ("INV_X1", 2),
    ("NAND2_X1", 3),
    ("NOR2_X1", 3),
    ("DFF_X1", 8),
];

/// Builds an unplaced random netlist. Nets chain a driver to nearby cell
/// indices so the result has some locality to exploit.
pub fn generate_random_design(name: &str, params: &GeneratorParams) -> Design {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut design = Design::new(name, ROW_HEIGHT);
    design.add_default_layers(params.layers.max(2), SITE_WIDTH);

    let num_cells = params.cells.max(2);
    for i in 0..num_cells {
        let (lib, sites) = LIB_CELLS[rng.gen_range(0..LIB_CELLS.len())];
        design.add_cell(
            format!("inst{}", i),
            lib,
            sites as f64 * SITE_WIDTH,
            ROW_HEIGHT,
            false,
        );
    }

    let window = (num_cells / 10).max(4);
    for n in 0..params.nets {
        let net = design.add_net(format!("net{}", n));
        let driver = n % num_cells;
        let width = design.cells[driver].width;
        design.add_pin(
            crate::db::indices::CellId::new(driver),
            net,
            Point::new(width, ROW_HEIGHT / 2.0),
            "Z",
        );

        let fanout = rng.gen_range(1..=params.max_fanout.max(1));
        for k in 0..fanout {
            let span = rng.gen_range(1..=window);
            let sink = (driver + span) % num_cells;
            let offset_x = rng.gen_range(0.0..design.cells[sink].width);
            design.add_pin(
                crate::db::indices::CellId::new(sink),
                net,
                Point::new(offset_x, ROW_HEIGHT / 2.0),
                format!("A{}", k),
            );
        }
    }

    log::info!(
        "Generated design '{}': {} cells, {} nets, {} pins",
        name,
        design.num_cells(),
        design.num_nets(),
        design.pin_offsets.len()
    );
    design
}
