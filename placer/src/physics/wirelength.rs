use pnr_common::db::core::Design;
use pnr_common::geom::point::Point;
use rayon::prelude::*;

/// Half-perimeter wirelength of every net, for the given cell positions.
pub fn hpwl(design: &Design, positions: &[Point<f64>]) -> f64 {
    design
        .nets
        .par_iter()
        .filter(|net| net.pins.len() >= 2)
        .map(|net| {
            let mut min = Point::new(f64::INFINITY, f64::INFINITY);
            let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
            for &pin in &net.pins {
                let cell = design.pin_to_cell[pin.index()];
                let pos = positions[cell.index()] + design.pin_offsets[pin.index()];
                min.x = min.x.min(pos.x);
                min.y = min.y.min(pos.y);
                max.x = max.x.max(pos.x);
                max.y = max.y.max(pos.y);
            }
            (max.x - min.x) + (max.y - min.y)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_pin_net_is_manhattan_distance() {
        let mut d = Design::new("wl", 2.0);
        let a = d.add_cell("a", "INV", 1.0, 2.0, false);
        let b = d.add_cell("b", "INV", 1.0, 2.0, false);
        let n = d.add_net("n");
        d.add_pin(a, n, Point::new(1.0, 1.0), "Z");
        d.add_pin(b, n, Point::new(0.0, 1.0), "A");
        let lonely = d.add_net("dangling");
        d.add_pin(a, lonely, Point::new(0.0, 0.0), "B");

        let positions = vec![Point::new(0.0, 0.0), Point::new(5.0, 4.0)];
        assert!((hpwl(&d, &positions) - 8.0).abs() < 1e-12);
    }
}
