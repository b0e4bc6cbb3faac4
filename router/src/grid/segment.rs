use pnr_common::geom::coord::GridCoord;

/// Straight run between two gcells of the same plane or layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Segment {
    pub from: GridCoord,
    pub to: GridCoord,
}

impl Segment {
    pub fn new(from: GridCoord, to: GridCoord) -> Self {
        debug_assert!(from.z == to.z && (from.x == to.x || from.y == to.y));
        Self { from, to }
    }

    pub fn layer(&self) -> u8 {
        self.from.z
    }

    pub fn on_layer(self, z: u8) -> Self {
        Self {
            from: self.from.on_layer(z),
            to: self.to.on_layer(z),
        }
    }

    pub fn is_horizontal(&self) -> bool {
        self.from.y == self.to.y && self.from.x != self.to.x
    }

    /// Length in gcells.
    pub fn length(&self) -> u32 {
        self.from.manhattan(&self.to)
    }

    /// Every gcell the run goes through, ends included.
    pub fn gcells(&self) -> impl Iterator<Item = GridCoord> + '_ {
        let (x0, x1) = (self.from.x.min(self.to.x), self.from.x.max(self.to.x));
        let (y0, y1) = (self.from.y.min(self.to.y), self.from.y.max(self.to.y));
        let z = self.from.z;
        (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| GridCoord::new(x, y, z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcells_cover_both_ends() {
        let seg = Segment::new(GridCoord::new(5, 2, 0), GridCoord::new(2, 2, 0));
        let cells: Vec<_> = seg.gcells().collect();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0], GridCoord::new(2, 2, 0));
        assert_eq!(seg.length(), 3);
        assert!(seg.is_horizontal());
        assert!(!Segment::new(GridCoord::new(1, 0, 1), GridCoord::new(1, 4, 1)).is_horizontal());
    }
}
