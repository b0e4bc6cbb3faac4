use pnr_common::db::core::Design;
use pnr_common::geom::point::Point;
use pnr_common::geom::rect::Rect;
use rayon::prelude::*;

pub struct SmoothingParams {
    pub sweeps: usize,
    /// Weight of the connectivity centroid against the current position.
    pub pull: f64,
    /// Weight of the rank-based spreading target.
    pub spread: f64,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            sweeps: 8,
            pull: 0.5,
            spread: 0.5,
        }
    }
}

/// Alternates a pull of every movable cell towards the centroid of the pins
/// it connects to with a rank-preserving spread over the box, so cells move
/// closer to their neighbours without piling up.
pub fn smooth(design: &Design, positions: &mut [Point<f64>], area: Rect, params: &SmoothingParams) {
    let movable: Vec<usize> = (0..design.num_cells())
        .filter(|&i| !design.cells[i].is_fixed)
        .collect();
    if movable.is_empty() {
        return;
    }

    for _ in 0..params.sweeps {
        let targets: Vec<Option<Point<f64>>> = {
            let current: &[Point<f64>] = positions;
            movable
                .par_iter()
                .map(|&i| connectivity_centroid(design, current, i))
                .collect()
        };

        for (&i, target) in movable.iter().zip(targets) {
            if let Some(t) = target {
                positions[i] = positions[i] * (1.0 - params.pull) + t * params.pull;
            }
        }

        spread_axis(design, positions, &movable, area, params.spread, Axis::X);
        spread_axis(design, positions, &movable, area, params.spread, Axis::Y);

        for &i in &movable {
            let cell = &design.cells[i];
            positions[i] = clamp_into(positions[i], cell.width, cell.height, area);
        }
    }
}

/// Where cell `i` would sit if each of its pins were at the weighted centroid
/// of the other pins of its nets.
fn connectivity_centroid(
    design: &Design,
    positions: &[Point<f64>],
    i: usize,
) -> Option<Point<f64>> {
    let mut sum = Point::new(0.0, 0.0);
    let mut weight = 0.0;

    for &pin in &design.cells[i].pins {
        let net = &design.nets[design.pin_to_net[pin.index()].index()];
        if net.pins.len() < 2 {
            continue;
        }
        let w = 1.0 / (net.pins.len() - 1) as f64;
        let own_offset = design.pin_offsets[pin.index()];
        for &other in &net.pins {
            let other_cell = design.pin_to_cell[other.index()];
            if other_cell.index() == i {
                continue;
            }
            let p = positions[other_cell.index()] + design.pin_offsets[other.index()] - own_offset;
            sum = sum + p * w;
            weight += w;
        }
    }

    (weight > 0.0).then(|| sum * (1.0 / weight))
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

fn spread_axis(
    design: &Design,
    positions: &mut [Point<f64>],
    movable: &[usize],
    area: Rect,
    blend: f64,
    axis: Axis,
) {
    let coord = |p: &Point<f64>| match axis {
        Axis::X => p.x,
        Axis::Y => p.y,
    };
    let mut order = movable.to_vec();
    order.sort_by(|&a, &b| coord(&positions[a]).total_cmp(&coord(&positions[b])));

    let (start, extent) = match axis {
        Axis::X => (area.min.x, area.width()),
        Axis::Y => (area.min.y, area.height()),
    };
    let count = order.len() as f64;
    for (rank, &i) in order.iter().enumerate() {
        let size = match axis {
            Axis::X => design.cells[i].width,
            Axis::Y => design.cells[i].height,
        };
        let slot = start + (rank as f64 + 0.5) / count * extent - size / 2.0;
        let p = &mut positions[i];
        match axis {
            Axis::X => p.x = p.x * (1.0 - blend) + slot * blend,
            Axis::Y => p.y = p.y * (1.0 - blend) + slot * blend,
        }
    }
}

pub fn clamp_into(p: Point<f64>, width: f64, height: f64, area: Rect) -> Point<f64> {
    Point::new(
        p.x.clamp(area.min.x, (area.max.x - width).max(area.min.x)),
        p.y.clamp(area.min.y, (area.max.y - height).max(area.min.y)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::wirelength::hpwl;

    fn chain(cells: usize) -> Design {
        let mut d = Design::new("chain", 2.0);
        for i in 0..cells {
            d.add_cell(format!("c{}", i), "INV", 1.0, 2.0, i == 0);
        }
        for i in 0..cells - 1 {
            let n = d.add_net(format!("n{}", i));
            d.add_pin(pnr_common::db::indices::CellId::new(i), n, Point::new(1.0, 1.0), "Z");
            d.add_pin(pnr_common::db::indices::CellId::new(i + 1), n, Point::new(0.0, 1.0), "A");
        }
        d
    }

    #[test]
    fn cells_stay_inside_and_fixed_cells_do_not_move() {
        let d = chain(12);
        let area = Rect::from_size(Point::new(0.0, 0.0), 20.0, 8.0);
        let mut positions: Vec<Point<f64>> = (0..12)
            .map(|i| Point::new(((i * 7) % 19) as f64, ((i * 3) % 6) as f64))
            .collect();
        let anchor = positions[0];

        smooth(&d, &mut positions, area, &SmoothingParams::default());

        assert_eq!(positions[0], anchor);
        for (p, c) in positions.iter().zip(&d.cells) {
            assert!(p.x >= area.min.x && p.x + c.width <= area.max.x + 1e-9);
            assert!(p.y >= area.min.y && p.y + c.height <= area.max.y + 1e-9);
        }
    }

    #[test]
    fn pulling_only_shortens_a_scrambled_chain() {
        let d = chain(10);
        let area = Rect::from_size(Point::new(0.0, 0.0), 40.0, 40.0);
        let mut positions: Vec<Point<f64>> = (0..10)
            .map(|i| Point::new(((i * 13) % 37) as f64, ((i * 29) % 31) as f64))
            .collect();
        let before = hpwl(&d, &positions);

        let params = SmoothingParams {
            sweeps: 4,
            pull: 0.5,
            spread: 0.0,
        };
        smooth(&d, &mut positions, area, &params);

        assert!(hpwl(&d, &positions) < before);
    }
}
