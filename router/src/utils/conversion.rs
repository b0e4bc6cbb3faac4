use pnr_common::geom::coord::GridCoord;
use pnr_common::geom::point::Point;
use pnr_common::geom::rect::Rect;

/// Maps design coordinates onto a regular gcell grid laid over a box.
#[derive(Clone, Debug)]
pub struct GridConverter {
    step_x: f64,
    step_y: f64,
    offset_x: f64,
    offset_y: f64,
    grid_w: u32,
    grid_h: u32,
}

impl GridConverter {
    /// Square gcells of side `step`; the last column and row may be partial.
    pub fn new(area: Rect, step: f64) -> Self {
        let grid_w = ((area.width() / step).ceil() as u32).max(1);
        let grid_h = ((area.height() / step).ceil() as u32).max(1);
        Self {
            step_x: step,
            step_y: step,
            offset_x: area.min.x,
            offset_y: area.min.y,
            grid_w,
            grid_h,
        }
    }

    pub fn grid_w(&self) -> u32 {
        self.grid_w
    }

    pub fn grid_h(&self) -> u32 {
        self.grid_h
    }

    pub fn to_grid(&self, p: Point<f64>, layer: u8) -> GridCoord {
        let raw_x = (p.x - self.offset_x) / self.step_x;
        let raw_y = (p.y - self.offset_y) / self.step_y;

        let x = raw_x.floor().clamp(0.0, (self.grid_w - 1) as f64) as u32;
        let y = raw_y.floor().clamp(0.0, (self.grid_h - 1) as f64) as u32;
        GridCoord::new(x, y, layer)
    }

    /// Center of the gcell.
    pub fn to_world(&self, g: GridCoord) -> Point<f64> {
        Point::new(
            self.offset_x + (g.x as f64 + 0.5) * self.step_x,
            self.offset_y + (g.y as f64 + 0.5) * self.step_y,
        )
    }

    pub fn gcell_area(&self, g: GridCoord) -> Rect {
        let min = Point::new(
            self.offset_x + g.x as f64 * self.step_x,
            self.offset_y + g.y as f64 * self.step_y,
        );
        Rect::from_size(min, self.step_x, self.step_y)
    }
}
