use pnr_common::db::core::Design;
use pnr_common::engine::EngineError;
use pnr_common::geom::point::Point;
use pnr_common::geom::rect::Rect;

/// Extra whitespace granted per placement pass.
pub const MARGIN_STEP_PER_PASS: f64 = 0.05;
pub const MAX_SPACE_MARGIN: f64 = 0.8;

/// Whitespace ratio for a pass: the configured margin, inflated for every
/// previous pass that failed to route.
pub fn effective_margin(base: f64, pass: u32) -> f64 {
    (base + MARGIN_STEP_PER_PASS * pass as f64).clamp(0.0, MAX_SPACE_MARGIN)
}

/// Computes a row-aligned abutment box holding the movable cell area, bloat
/// included, with `margin` whitespace. With `fixed_height` the row count is
/// kept and only the width adapts.
pub fn size_abutment_box(
    design: &Design,
    margin: f64,
    aspect_ratio: f64,
    fixed_height: Option<f64>,
) -> Result<Rect, EngineError> {
    let row_height = design.row_height;
    if row_height <= 0.0 {
        return Err(EngineError::Placement(format!(
            "design '{}' has an invalid row height {}",
            design.name, row_height
        )));
    }

    let cell_area = design.movable_area();
    if cell_area <= 0.0 {
        return Err(EngineError::Placement(format!(
            "design '{}' has no movable cell area",
            design.name
        )));
    }

    let target_area = cell_area / (1.0 - margin);
    let rows = match fixed_height {
        Some(h) => (h / row_height).round().max(1.0),
        None => ((target_area * aspect_ratio.max(0.01)).sqrt() / row_height)
            .ceil()
            .max(1.0),
    };
    let height = rows * row_height;

    let widest = design
        .cells
        .iter()
        .filter(|c| !c.is_fixed)
        .map(|c| c.footprint())
        .fold(0.0, f64::max);
    let width = (target_area / height).max(widest);

    let origin = if design.abutment_box.is_empty() {
        Point::new(0.0, 0.0)
    } else {
        design.abutment_box.min
    };
    Ok(Rect::from_size(origin, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design(cells: usize) -> Design {
        let mut d = Design::new("fp", 2.0);
        for i in 0..cells {
            d.add_cell(format!("c{}", i), "NAND2", 1.5, 2.0, false);
        }
        d
    }

    #[test]
    fn margin_grows_with_pass() {
        assert!((effective_margin(0.10, 0) - 0.10).abs() < 1e-12);
        assert!((effective_margin(0.10, 2) - 0.20).abs() < 1e-12);
        assert_eq!(effective_margin(0.7, 10), MAX_SPACE_MARGIN);
    }

    #[test]
    fn box_holds_area_and_whitespace() {
        let d = design(100);
        let ab = size_abutment_box(&d, 0.2, 1.0, None).unwrap();
        let rows = ab.height() / d.row_height;
        assert!((rows - rows.round()).abs() < 1e-9);
        assert!((ab.area() - 300.0 / 0.8).abs() < 1e-6);
    }

    #[test]
    fn fixed_height_keeps_rows() {
        let d = design(100);
        let ab = size_abutment_box(&d, 0.3, 1.0, Some(10.0)).unwrap();
        assert!((ab.height() - 10.0).abs() < 1e-9);
        assert!(ab.width() > 30.0);
    }

    #[test]
    fn bloat_enlarges_the_box() {
        let mut d = design(100);
        let plain = size_abutment_box(&d, 0.2, 1.0, None).unwrap();
        for cell in d.cells.iter_mut().take(50) {
            cell.inflate(0.4);
        }
        let bloated = size_abutment_box(&d, 0.2, 1.0, None).unwrap();
        assert!((bloated.area() - 360.0 / 0.8).abs() < 1e-6);
        assert!(bloated.area() > plain.area());
    }

    #[test]
    fn empty_design_is_rejected() {
        let d = design(0);
        assert!(matches!(
            size_abutment_box(&d, 0.1, 1.0, None),
            Err(EngineError::Placement(_))
        ));
    }
}
