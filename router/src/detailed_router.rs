use crate::algo::pattern::Connection;
use crate::grid::{DenseGrid, RoutingGrid};
use crate::layer_assign::LayerStack;
use priority_queue::PriorityQueue;

pub struct NegotiationParams {
    pub iterations: usize,
    pub history_increment: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NegotiationResult {
    pub converged: bool,
    pub rounds: usize,
    pub moved: usize,
}

/// Key of a segment: net, connection, segment.
type SegmentKey = (usize, usize, usize);

/// Moves segments off overloaded layers, worst overflow first, until no
/// gcell is over capacity or the round budget is spent.
pub fn negotiate(
    grid: &mut DenseGrid,
    stack: &LayerStack,
    routes: &mut [Vec<Connection>],
    params: &NegotiationParams,
) -> NegotiationResult {
    let mut result = NegotiationResult::default();

    for round in 0..params.iterations {
        let mut queue: PriorityQueue<SegmentKey, (u32, u32)> = PriorityQueue::new();
        for (net, connections) in routes.iter().enumerate() {
            for (ci, conn) in connections.iter().enumerate() {
                for (si, seg) in conn.segments.iter().enumerate() {
                    let overflow = grid.segment_overflow(seg);
                    if overflow > 0 {
                        queue.push((net, ci, si), (overflow, seg.length()));
                    }
                }
            }
        }
        if queue.is_empty() {
            break;
        }

        result.rounds += 1;
        let overloaded = queue.len();
        grid.update_history(params.history_increment);

        let mut moved = 0;
        while let Some(((net, ci, si), _)) = queue.pop() {
            let seg = routes[net][ci].segments[si];
            if grid.segment_overflow(&seg) == 0 {
                continue;
            }
            grid.remove_segment(&seg);
            let best = stack
                .candidates(&seg)
                .iter()
                .map(|&l| seg.on_layer(l))
                .min_by(|a, b| grid.segment_cost(a).total_cmp(&grid.segment_cost(b)))
                .unwrap_or(seg);
            grid.add_segment(&best);
            if best != seg {
                routes[net][ci].segments[si] = best;
                moved += 1;
            }
        }
        result.moved += moved;
        log::debug!(
            "Negotiation round {}: {} overloaded segments, {} moved",
            round,
            overloaded,
            moved
        );
    }

    result.converged = grid.total_conflicts() == 0;
    result
}
