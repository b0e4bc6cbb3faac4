use super::point::Point;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub min: Point<f64>,
    pub max: Point<f64>,
}

impl Rect {
    pub fn new(min: Point<f64>, max: Point<f64>) -> Self {
        Self { min, max }
    }

    /// Box anchored at `origin` with the given extent.
    pub fn from_size(origin: Point<f64>, width: f64, height: f64) -> Self {
        Self::new(origin, Point::new(origin.x + width, origin.y + height))
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn center(&self) -> Point<f64> {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    pub fn contains(&self, p: Point<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_has_no_extent() {
        assert!(Rect::default().is_empty());
        let r = Rect::from_size(Point::new(1.0, 2.0), 4.0, 6.0);
        assert!(!r.is_empty());
        assert_eq!(r.center(), Point::new(3.0, 5.0));
        assert_eq!(r.area(), 24.0);
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let a = Rect::from_size(Point::new(0.0, 0.0), 2.0, 2.0);
        let b = Rect::from_size(Point::new(2.0, 0.0), 2.0, 2.0);
        assert!(!a.overlaps(&b));
        assert!(a.contains(Point::new(2.0, 1.0)));
    }
}
