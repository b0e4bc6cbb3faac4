pub mod dense;
pub mod segment;

pub use dense::DenseGrid;
pub use segment::Segment;

use pnr_common::geom::coord::GridCoord;

/// Plane carrying horizontal runs during global routing.
pub const H_PLANE: u8 = 0;
/// Plane carrying vertical runs during global routing.
pub const V_PLANE: u8 = 1;

/// Gcell occupancy bookkeeping shared by the global and detailed phases.
/// `z` is a direction plane in the former and a metal layer in the latter.
pub trait RoutingGrid: Sync + Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn layers(&self) -> u8;

    fn add_wire(&mut self, coord: GridCoord);
    fn remove_wire(&mut self, coord: GridCoord);
    fn occupancy(&self, coord: GridCoord) -> u32;
    fn capacity(&self, coord: GridCoord) -> u32;

    /// Price of one more wire through `coord`.
    fn get_cost(&self, coord: GridCoord) -> f64;
    fn update_history(&mut self, history_increment: f64);
    fn set_penalty(&mut self, penalty: f64);

    fn is_congested(&self, coord: GridCoord) -> bool {
        self.occupancy(coord) > self.capacity(coord)
    }

    fn overflow(&self, coord: GridCoord) -> u32 {
        self.occupancy(coord).saturating_sub(self.capacity(coord))
    }

    /// Gcells holding more wires than they have room for.
    fn congested(&self) -> Vec<GridCoord> {
        let mut out = Vec::new();
        for z in 0..self.layers() {
            for y in 0..self.height() {
                for x in 0..self.width() {
                    let c = GridCoord::new(x, y, z);
                    if self.is_congested(c) {
                        out.push(c);
                    }
                }
            }
        }
        out
    }

    fn total_conflicts(&self) -> usize {
        self.congested().len()
    }

    fn total_overflow(&self) -> u32 {
        self.congested().iter().map(|&c| self.overflow(c)).sum()
    }

    fn add_segment(&mut self, seg: &Segment) {
        for c in seg.gcells() {
            self.add_wire(c);
        }
    }

    fn remove_segment(&mut self, seg: &Segment) {
        for c in seg.gcells() {
            self.remove_wire(c);
        }
    }

    fn segment_cost(&self, seg: &Segment) -> f64 {
        seg.gcells().map(|c| self.get_cost(c)).sum()
    }

    fn segment_overflow(&self, seg: &Segment) -> u32 {
        seg.gcells().map(|c| self.overflow(c)).sum()
    }

    /// True when every gcell of `seg` still has a free track.
    fn has_room(&self, seg: &Segment) -> bool {
        seg.gcells().all(|c| self.occupancy(c) < self.capacity(c))
    }
}
