use crate::grid::{H_PLANE, RoutingGrid, Segment, V_PLANE};
use pnr_common::geom::coord::GridCoord;

/// Jog positions tried for Z shapes, on top of the two L shapes.
const Z_SAMPLES: usize = 4;
/// Extra cost of a bend, standing for the via it will need.
const BEND_COST: f64 = 2.0;

/// One two-pin connection of a net: its end gcells and the runs joining them.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub source: GridCoord,
    pub target: GridCoord,
    pub segments: Vec<Segment>,
}

/// Splits a net into two-pin connections, growing a tree from the first pin
/// by always attaching the closest pin left, and pattern-routes each one.
pub fn route_net<G: RoutingGrid + ?Sized>(grid: &G, pins: &[GridCoord]) -> Vec<Connection> {
    let mut remaining: Vec<GridCoord> = Vec::with_capacity(pins.len());
    for p in pins {
        let p = p.on_layer(H_PLANE);
        if !remaining.contains(&p) {
            remaining.push(p);
        }
    }
    if remaining.len() < 2 {
        return Vec::new();
    }

    let mut tree = vec![remaining.remove(0)];
    let mut connections = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let mut best = (u32::MAX, 0, 0);
        for (k, candidate) in remaining.iter().enumerate() {
            for (t, anchor) in tree.iter().enumerate() {
                let dist = anchor.manhattan(candidate);
                if dist < best.0 {
                    best = (dist, k, t);
                }
            }
        }
        let (_, k, t) = best;
        let target = remaining.remove(k);
        let source = tree[t];
        connections.push(Connection {
            source,
            target,
            segments: route_two_pin(grid, source, target),
        });
        tree.push(target);
    }
    connections
}

/// Cheapest L or Z shape between two gcells under the current grid costs.
pub fn route_two_pin<G: RoutingGrid + ?Sized>(
    grid: &G,
    a: GridCoord,
    b: GridCoord,
) -> Vec<Segment> {
    candidates(a, b)
        .into_iter()
        .map(|c| (path_cost(grid, &c), c))
        .min_by(|x, y| x.0.total_cmp(&y.0))
        .map(|(_, c)| c)
        .unwrap_or_default()
}

pub fn path_cost<G: RoutingGrid + ?Sized>(grid: &G, path: &[Segment]) -> f64 {
    let wires: f64 = path.iter().map(|s| grid.segment_cost(s)).sum();
    wires + BEND_COST * path.len().saturating_sub(1) as f64
}

fn candidates(a: GridCoord, b: GridCoord) -> Vec<Vec<Segment>> {
    if (a.x, a.y) == (b.x, b.y) {
        return Vec::new();
    }
    let mut out = vec![
        path(&[(a.x, a.y), (b.x, a.y), (b.x, b.y)]),
        path(&[(a.x, a.y), (a.x, b.y), (b.x, b.y)]),
    ];
    if a.y != b.y {
        for x in interior(a.x, b.x) {
            out.push(path(&[(a.x, a.y), (x, a.y), (x, b.y), (b.x, b.y)]));
        }
    }
    if a.x != b.x {
        for y in interior(a.y, b.y) {
            out.push(path(&[(a.x, a.y), (a.x, y), (b.x, y), (b.x, b.y)]));
        }
    }
    out
}

/// Up to `Z_SAMPLES` values strictly between `a` and `b`, evenly spread.
fn interior(a: u32, b: u32) -> Vec<u32> {
    let (lo, hi) = (a.min(b), a.max(b));
    let span = hi - lo;
    if span < 2 {
        return Vec::new();
    }
    let count = (span as usize - 1).min(Z_SAMPLES);
    let mut out: Vec<u32> = (1..=count)
        .map(|k| lo + ((k as u64 * span as u64) / (count as u64 + 1)) as u32)
        .filter(|&v| v > lo && v < hi)
        .collect();
    out.dedup();
    out
}

fn path(corners: &[(u32, u32)]) -> Vec<Segment> {
    corners
        .windows(2)
        .filter(|w| w[0] != w[1])
        .map(|w| {
            let ((x0, y0), (x1, y1)) = (w[0], w[1]);
            let plane = if y0 == y1 { H_PLANE } else { V_PLANE };
            Segment::new(GridCoord::new(x0, y0, plane), GridCoord::new(x1, y1, plane))
        })
        .collect()
}
