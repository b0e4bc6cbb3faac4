use super::RoutingGrid;
use pnr_common::geom::coord::GridCoord;

#[derive(Clone, Copy)]
struct GridNode {
    occupancy: u16,
    history: f32,
    /// Cost of the next wire, refreshed on every occupancy change.
    cost_cache: f32,
}

impl Default for GridNode {
    fn default() -> Self {
        Self {
            occupancy: 0,
            history: 0.0,
            cost_cache: 1.0,
        }
    }
}

/// Flat `width * height * layers` gcell array with one capacity per layer.
#[derive(Clone)]
pub struct DenseGrid {
    width: u32,
    height: u32,
    layers: u8,
    nodes: Vec<GridNode>,
    current_penalty: f32,
    capacities: Vec<u32>,
}

impl DenseGrid {
    pub fn new(width: u32, height: u32, layers: u8, default_capacity: u32) -> Self {
        let size = (width as usize) * (height as usize) * (layers as usize);
        if size > 50_000_000 {
            log::warn!("Allocating large DenseGrid: {} gcells.", size);
        }

        Self {
            width,
            height,
            layers,
            nodes: vec![GridNode::default(); size],
            current_penalty: 1.0,
            capacities: vec![default_capacity; layers as usize],
        }
    }

    pub fn set_layer_capacity(&mut self, layer: u8, capacity: u32) {
        if let Some(c) = self.capacities.get_mut(layer as usize) {
            *c = capacity;
        }
        self.refresh_costs();
    }

    #[inline]
    fn index(&self, coord: GridCoord) -> usize {
        (coord.z as usize) * (self.width as usize) * (self.height as usize)
            + (coord.y as usize) * (self.width as usize)
            + (coord.x as usize)
    }

    #[inline]
    fn layer_of(&self, idx: usize) -> usize {
        idx / ((self.width as usize) * (self.height as usize))
    }

    fn update_cache_at(&mut self, idx: usize, layer: usize) {
        let cap = self.capacities[layer] as f32;
        let penalty = self.current_penalty;
        let node = &mut self.nodes[idx];

        let occ = node.occupancy as f32;
        let congestion_cost = if occ >= cap {
            (occ - cap + 1.0) * penalty
        } else {
            0.0
        };
        node.cost_cache = 1.0 + node.history + congestion_cost;
    }

    fn refresh_costs(&mut self) {
        for i in 0..self.nodes.len() {
            let layer = self.layer_of(i);
            self.update_cache_at(i, layer);
        }
    }
}

impl RoutingGrid for DenseGrid {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn layers(&self) -> u8 {
        self.layers
    }

    fn add_wire(&mut self, coord: GridCoord) {
        let idx = self.index(coord);
        let node = &mut self.nodes[idx];
        node.occupancy = node.occupancy.saturating_add(1);
        self.update_cache_at(idx, coord.z as usize);
    }

    fn remove_wire(&mut self, coord: GridCoord) {
        let idx = self.index(coord);
        let node = &mut self.nodes[idx];
        node.occupancy = node.occupancy.saturating_sub(1);
        self.update_cache_at(idx, coord.z as usize);
    }

    fn occupancy(&self, coord: GridCoord) -> u32 {
        self.nodes[self.index(coord)].occupancy as u32
    }

    fn capacity(&self, coord: GridCoord) -> u32 {
        self.capacities[coord.z as usize]
    }

    #[inline]
    fn get_cost(&self, coord: GridCoord) -> f64 {
        self.nodes[self.index(coord)].cost_cache as f64
    }

    fn update_history(&mut self, history_increment: f64) {
        for i in 0..self.nodes.len() {
            let cap = self.capacities[self.layer_of(i)];
            let node = &mut self.nodes[i];
            if node.occupancy as u32 > cap {
                let overflow = (node.occupancy as u32 - cap) as f32;
                node.history += overflow * history_increment as f32;
            }
        }
        self.refresh_costs();
    }

    fn set_penalty(&mut self, penalty: f64) {
        self.current_penalty = penalty as f32;
        self.refresh_costs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_rises_once_full() {
        let mut grid = DenseGrid::new(4, 4, 2, 2);
        let c = GridCoord::new(1, 1, 0);
        assert_eq!(grid.get_cost(c), 1.0);

        grid.add_wire(c);
        assert_eq!(grid.get_cost(c), 1.0);
        grid.add_wire(c);
        assert!(grid.get_cost(c) > 1.0);
        assert!(!grid.is_congested(c));

        grid.add_wire(c);
        assert!(grid.is_congested(c));
        assert_eq!(grid.overflow(c), 1);
        assert_eq!(grid.total_conflicts(), 1);

        grid.update_history(0.5);
        grid.remove_wire(c);
        assert_eq!(grid.total_conflicts(), 0);
        assert!(grid.get_cost(c) > grid.get_cost(GridCoord::new(1, 1, 1)));
    }

    #[test]
    fn layers_have_their_own_capacity() {
        let mut grid = DenseGrid::new(2, 2, 3, 1);
        grid.set_layer_capacity(2, 4);
        assert_eq!(grid.capacity(GridCoord::new(0, 0, 0)), 1);
        assert_eq!(grid.capacity(GridCoord::new(0, 0, 2)), 4);
    }
}
