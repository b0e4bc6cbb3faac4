use crate::algo::pattern::Connection;
use crate::grid::{DenseGrid, RoutingGrid, Segment};
use pnr_common::db::core::{Design, LayerDirection};
use pnr_common::engine::{EngineError, LayerAssignMode};

/// Span, in gcells, from which a segment counts as long.
pub const LONG_SEGMENT: u32 = 8;

/// Routing layers of each direction, lowest first.
#[derive(Clone, Debug, Default)]
pub struct LayerStack {
    pub horizontal: Vec<u8>,
    pub vertical: Vec<u8>,
}

impl LayerStack {
    pub fn from_design(design: &Design) -> Result<Self, EngineError> {
        let stack = Self {
            horizontal: design.layers_in(LayerDirection::Horizontal),
            vertical: design.layers_in(LayerDirection::Vertical),
        };
        if stack.horizontal.is_empty() || stack.vertical.is_empty() {
            return Err(EngineError::Routing(format!(
                "design '{}' needs a horizontal and a vertical routing layer",
                design.name
            )));
        }
        Ok(stack)
    }

    pub fn candidates(&self, seg: &Segment) -> &[u8] {
        if seg.is_horizontal() {
            &self.horizontal
        } else {
            &self.vertical
        }
    }
}

/// Moves every segment from its direction plane onto a metal layer, net by
/// net in `order`, recording the wires in `grid`.
pub fn assign(
    grid: &mut DenseGrid,
    stack: &LayerStack,
    routes: &mut [Vec<Connection>],
    order: &[usize],
    mode: LayerAssignMode,
) {
    for &net in order {
        let trunk = match mode {
            LayerAssignMode::ByTrunk => longest_segment(&routes[net]),
            _ => None,
        };

        for (ci, conn) in routes[net].iter_mut().enumerate() {
            for (si, seg) in conn.segments.iter_mut().enumerate() {
                let top_down = match mode {
                    LayerAssignMode::NoNetLayerAssign => false,
                    LayerAssignMode::ByLength => seg.length() >= LONG_SEGMENT,
                    LayerAssignMode::ByTrunk => trunk == Some((ci, si)),
                };
                *seg = place_segment(grid, stack, *seg, top_down);
                grid.add_segment(seg);
            }
        }
    }
}

fn longest_segment(connections: &[Connection]) -> Option<(usize, usize)> {
    connections
        .iter()
        .enumerate()
        .flat_map(|(ci, c)| {
            c.segments
                .iter()
                .enumerate()
                .map(move |(si, s)| ((ci, si), s.length()))
        })
        .max_by_key(|&(_, len)| len)
        .map(|(key, _)| key)
}

/// First layer with room in preference order, otherwise the cheapest one.
fn place_segment(grid: &DenseGrid, stack: &LayerStack, seg: Segment, top_down: bool) -> Segment {
    let mut layers: Vec<u8> = stack.candidates(&seg).to_vec();
    if top_down {
        layers.reverse();
    }

    if let Some(&l) = layers.iter().find(|&&l| grid.has_room(&seg.on_layer(l))) {
        return seg.on_layer(l);
    }
    layers
        .iter()
        .map(|&l| seg.on_layer(l))
        .min_by(|a, b| grid.segment_cost(a).total_cmp(&grid.segment_cost(b)))
        .unwrap_or(seg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{H_PLANE, V_PLANE};
    use pnr_common::geom::coord::GridCoord;

    fn stack() -> LayerStack {
        LayerStack {
            horizontal: vec![0, 2],
            vertical: vec![1, 3],
        }
    }

    fn h(x0: u32, x1: u32, y: u32) -> Segment {
        Segment::new(GridCoord::new(x0, y, H_PLANE), GridCoord::new(x1, y, H_PLANE))
    }

    fn v(x: u32, y0: u32, y1: u32) -> Segment {
        Segment::new(GridCoord::new(x, y0, V_PLANE), GridCoord::new(x, y1, V_PLANE))
    }

    fn net(segments: Vec<Segment>) -> Vec<Connection> {
        vec![Connection {
            source: segments[0].from.on_layer(0),
            target: segments[segments.len() - 1].to.on_layer(0),
            segments,
        }]
    }

    #[test]
    fn lowest_layer_first_then_spill_over() {
        let mut grid = DenseGrid::new(20, 4, 4, 1);
        let mut routes = vec![net(vec![h(0, 5, 1), v(5, 1, 3)]), net(vec![h(2, 6, 1)])];

        assign(&mut grid, &stack(), &mut routes, &[0, 1], LayerAssignMode::NoNetLayerAssign);

        assert_eq!(routes[0][0].segments[0].layer(), 0);
        assert_eq!(routes[0][0].segments[1].layer(), 1);
        assert_eq!(routes[1][0].segments[0].layer(), 2);
        assert_eq!(grid.total_conflicts(), 0);
    }

    #[test]
    fn long_segments_go_high() {
        let mut grid = DenseGrid::new(20, 4, 4, 4);
        let mut routes = vec![net(vec![h(0, 12, 0), v(12, 0, 2)])];

        assign(&mut grid, &stack(), &mut routes, &[0], LayerAssignMode::ByLength);

        assert_eq!(routes[0][0].segments[0].layer(), 2);
        assert_eq!(routes[0][0].segments[1].layer(), 1);
    }

    #[test]
    fn trunk_goes_to_the_top_of_its_direction() {
        let mut grid = DenseGrid::new(20, 20, 4, 4);
        let mut routes = vec![net(vec![h(0, 3, 0), v(3, 0, 9), h(3, 5, 9)])];

        assign(&mut grid, &stack(), &mut routes, &[0], LayerAssignMode::ByTrunk);

        let layers: Vec<u8> = routes[0][0].segments.iter().map(|s| s.layer()).collect();
        assert_eq!(layers, vec![0, 3, 0]);
    }
}
