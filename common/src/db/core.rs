use crate::db::indices::*;
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Handle shared between the caller, the viewer and the engine alive at a
/// given time.
pub type SharedDesign = Rc<RefCell<Design>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerDirection {
    Horizontal,
    Vertical,
}

#[derive(Clone, Debug)]
pub struct LayerData {
    pub name: String,
    pub index: u8,
    pub direction: LayerDirection,
    pub pitch: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteSegment {
    pub layer: u8,
    pub p1: Point<f64>,
    pub p2: Point<f64>,
}

impl RouteSegment {
    pub fn length(&self) -> f64 {
        self.p1.manhattan(&self.p2)
    }
}

#[derive(Clone, Debug)]
pub struct CellData {
    pub name: String,
    pub lib_name: String,
    pub width: f64,
    pub height: f64,
    pub is_fixed: bool,
    pub pins: Vec<PinId>,
    /// Extra room asked for by the router, as a fraction of the width.
    pub bloat: f64,
}

/// Upper bound of the bloat a cell can accumulate.
pub const MAX_BLOAT: f64 = 1.0;

impl CellData {
    /// Width the placer reserves for the cell in its row.
    pub fn footprint(&self) -> f64 {
        self.width * (1.0 + self.bloat)
    }

    pub fn inflate(&mut self, amount: f64) {
        self.bloat = (self.bloat + amount).clamp(0.0, MAX_BLOAT);
    }
}

#[derive(Clone, Debug)]
pub struct NetData {
    pub name: String,
    pub pins: Vec<PinId>,
    pub route_segments: Vec<RouteSegment>,
}

/// Figures reported by a routing engine once the layout is finalized.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoutingMeasures {
    pub pass_number: u32,
    pub wirelength: f64,
    pub segments: usize,
    pub vias: usize,
    pub overflow: usize,
}

pub struct Design {
    pub name: String,
    pub layers: Vec<LayerData>,
    pub cells: Vec<CellData>,
    pub nets: Vec<NetData>,

    pub pin_offsets: Vec<Point<f64>>,
    pub pin_names: Vec<String>,
    pub pin_to_cell: Vec<CellId>,
    pub pin_to_net: Vec<NetId>,

    pub positions: Vec<Point<f64>>,
    pub abutment_box: Rect,
    pub row_height: f64,
    pub placed: bool,
    pub measures: Option<RoutingMeasures>,

    pub cell_name_map: HashMap<String, CellId>,
    pub net_name_map: HashMap<String, NetId>,
}

impl Design {
    pub fn new(name: impl Into<String>, row_height: f64) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
            cells: Vec::new(),
            nets: Vec::new(),
            pin_offsets: Vec::new(),
            pin_names: Vec::new(),
            pin_to_cell: Vec::new(),
            pin_to_net: Vec::new(),
            positions: Vec::new(),
            abutment_box: Rect::default(),
            row_height,
            placed: false,
            measures: None,
            cell_name_map: HashMap::new(),
            net_name_map: HashMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedDesign {
        Rc::new(RefCell::new(self))
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }
    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    #[inline]
    pub fn pin_position(&self, pin: PinId) -> Point<f64> {
        let cell = self.pin_to_cell[pin.index()];
        self.positions[cell.index()] + self.pin_offsets[pin.index()]
    }

    /// Area claimed by the movable cells, bloat included.
    pub fn movable_area(&self) -> f64 {
        self.cells
            .iter()
            .filter(|c| !c.is_fixed)
            .map(|c| c.footprint() * c.height)
            .sum()
    }

    pub fn add_layer(&mut self, name: impl Into<String>, direction: LayerDirection, pitch: f64) {
        let index = self.layers.len() as u8;
        self.layers.push(LayerData {
            name: name.into(),
            index,
            direction,
            pitch,
        });
    }

    /// Alternating horizontal/vertical metal stack, starting horizontal.
    pub fn add_default_layers(&mut self, count: u8, pitch: f64) {
        for i in 0..count {
            let direction = if i % 2 == 0 {
                LayerDirection::Horizontal
            } else {
                LayerDirection::Vertical
            };
            self.add_layer(format!("M{}", i + 1), direction, pitch);
        }
    }

    pub fn layers_in(&self, direction: LayerDirection) -> Vec<u8> {
        self.layers
            .iter()
            .filter(|l| l.direction == direction)
            .map(|l| l.index)
            .collect()
    }

    pub fn add_cell(
        &mut self,
        name: impl Into<String>,
        lib_name: impl Into<String>,
        width: f64,
        height: f64,
        is_fixed: bool,
    ) -> CellId {
        let name = name.into();
        let id = CellId::new(self.cells.len());
        self.cells.push(CellData {
            name: name.clone(),
            lib_name: lib_name.into(),
            width,
            height,
            is_fixed,
            pins: Vec::new(),
            bloat: 0.0,
        });
        self.positions.push(Point::new(0.0, 0.0));
        self.cell_name_map.insert(name, id);
        id
    }

    pub fn add_net(&mut self, name: impl Into<String>) -> NetId {
        let name = name.into();
        if let Some(&id) = self.net_name_map.get(&name) {
            return id;
        }
        let id = NetId::new(self.nets.len());
        self.nets.push(NetData {
            name: name.clone(),
            pins: Vec::new(),
            route_segments: Vec::new(),
        });
        self.net_name_map.insert(name, id);
        id
    }

    pub fn add_pin(
        &mut self,
        cell: CellId,
        net: NetId,
        offset: Point<f64>,
        name: impl Into<String>,
    ) -> PinId {
        let pid = PinId::new(self.pin_offsets.len());
        self.pin_offsets.push(offset);
        self.pin_names.push(name.into());
        self.pin_to_cell.push(cell);
        self.pin_to_net.push(net);

        self.cells[cell.index()].pins.push(pid);
        self.nets[net.index()].pins.push(pid);
        pid
    }

    /// Forgets movable cell positions; fixed cells keep theirs. Bloat is
    /// kept so the next placement leaves the room the router asked for.
    pub fn clear_placement(&mut self) {
        for (pos, cell) in self.positions.iter_mut().zip(&self.cells) {
            if !cell.is_fixed {
                *pos = Point::new(0.0, 0.0);
            }
        }
        self.placed = false;
    }

    pub fn clear_routing(&mut self) {
        for net in &mut self.nets {
            net.route_segments.clear();
        }
        self.measures = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cell_design() -> Design {
        let mut d = Design::new("pair", 2.0);
        let a = d.add_cell("a", "INV", 1.0, 2.0, false);
        let b = d.add_cell("b", "INV", 1.0, 2.0, true);
        let n = d.add_net("n0");
        d.add_pin(a, n, Point::new(0.5, 1.0), "Z");
        d.add_pin(b, n, Point::new(0.5, 1.0), "A");
        d
    }

    #[test]
    fn nets_are_deduplicated_by_name() {
        let mut d = two_cell_design();
        let again = d.add_net("n0");
        assert_eq!(again.index(), 0);
        assert_eq!(d.num_nets(), 1);
        assert_eq!(d.nets[0].pins.len(), 2);
    }

    #[test]
    fn clearing_placement_keeps_fixed_cells() {
        let mut d = two_cell_design();
        d.positions[0] = Point::new(4.0, 4.0);
        d.positions[1] = Point::new(8.0, 0.0);
        d.placed = true;

        d.clear_placement();

        assert!(!d.placed);
        assert_eq!(d.positions[0], Point::new(0.0, 0.0));
        assert_eq!(d.positions[1], Point::new(8.0, 0.0));
        assert_eq!(d.pin_position(PinId::new(1)), Point::new(8.5, 1.0));
    }

    #[test]
    fn default_layers_alternate() {
        let mut d = two_cell_design();
        d.add_default_layers(4, 0.5);
        assert_eq!(d.layers_in(LayerDirection::Horizontal), vec![0, 2]);
        assert_eq!(d.layers_in(LayerDirection::Vertical), vec![1, 3]);
        assert_eq!(d.layers[3].name, "M4");
    }

    #[test]
    fn bloat_widens_the_footprint_up_to_a_cap() {
        let mut d = two_cell_design();
        assert_eq!(d.movable_area(), 2.0);

        d.cells[0].inflate(0.5);
        assert_eq!(d.cells[0].footprint(), 1.5);
        assert_eq!(d.movable_area(), 3.0);

        d.cells[0].inflate(5.0);
        assert_eq!(d.cells[0].bloat, MAX_BLOAT);
        assert_eq!(d.cells[0].footprint(), 2.0);

        d.clear_placement();
        assert_eq!(d.cells[0].bloat, MAX_BLOAT);
    }
}
