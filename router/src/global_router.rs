use crate::algo::pattern::{Connection, route_net};
use crate::grid::RoutingGrid;
use crate::grid::dense::DenseGrid;
use pnr_common::geom::coord::GridCoord;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::time::Instant;

const BATCH_SIZE: usize = 500;

#[derive(Clone, Debug)]
pub struct GlobalParams {
    /// Rip-up-and-reroute rounds after the initial route.
    pub iterations: usize,
    pub initial_penalty: f64,
    pub penalty_multiplier: f64,
    pub history_increment: f64,
    pub seed: u64,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            iterations: 10,
            initial_penalty: 1.0,
            penalty_multiplier: 1.5,
            history_increment: 0.5,
            seed: 0,
        }
    }
}

pub struct GlobalSolution {
    /// Connections of every net, indexed like the design nets.
    pub routes: Vec<Vec<Connection>>,
    pub converged: bool,
    pub rounds: usize,
}

/// Routes every net on the two-plane grid, then negotiates congestion away
/// for at most `params.iterations` rounds.
pub fn run(grid: &mut DenseGrid, pins: &[Vec<GridCoord>], params: &GlobalParams) -> GlobalSolution {
    let total_nets = pins.len();
    let start_time = Instant::now();
    log::info!("GR: Starting Initial Route for {} nets...", total_nets);

    let mut routes: Vec<Vec<Connection>> = vec![Vec::new(); total_nets];
    let net_indices: Vec<usize> = (0..total_nets).collect();
    for chunk in net_indices.chunks(BATCH_SIZE) {
        let shared: &DenseGrid = grid;
        let results: Vec<(usize, Vec<Connection>)> = chunk
            .par_iter()
            .map(|&net| (net, route_net(shared, &pins[net])))
            .collect();

        for (net, connections) in results {
            commit(grid, &connections);
            routes[net] = connections;
        }
    }
    log::info!(
        "GR: Initial route done in {}ms, {} congested gcells.",
        start_time.elapsed().as_millis(),
        grid.total_conflicts()
    );

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut penalty = params.initial_penalty;
    let mut rounds = 0;

    for iter in 0..params.iterations {
        let start = Instant::now();
        let conflicts = grid.total_conflicts();
        if conflicts == 0 {
            log::info!("Global Routing Converged at iter {}!", iter);
            break;
        }
        rounds += 1;
        grid.update_history(params.history_increment);

        let mut to_reroute: Vec<usize> = (0..total_nets)
            .filter(|&net| touches_congestion(&*grid, &routes[net]))
            .collect();
        for &net in &to_reroute {
            release(grid, &routes[net]);
            routes[net].clear();
        }

        let ripped = to_reroute.len();
        to_reroute.shuffle(&mut rng);
        for &net in &to_reroute {
            let connections = route_net(&*grid, &pins[net]);
            commit(grid, &connections);
            routes[net] = connections;
        }

        log::info!(
            "GR Iter {}: Conflicts: {}, Ripped: {}, Penalty: {:.2}, Time: {}ms",
            iter,
            conflicts,
            ripped,
            penalty,
            start.elapsed().as_millis()
        );

        penalty *= params.penalty_multiplier;
        grid.set_penalty(penalty);
    }

    let converged = grid.total_conflicts() == 0;
    GlobalSolution {
        routes,
        converged,
        rounds,
    }
}

pub fn commit(grid: &mut DenseGrid, connections: &[Connection]) {
    for s in connections.iter().flat_map(|c| &c.segments) {
        grid.add_segment(s);
    }
}

pub fn release(grid: &mut DenseGrid, connections: &[Connection]) {
    for s in connections.iter().flat_map(|c| &c.segments) {
        grid.remove_segment(s);
    }
}

fn touches_congestion(grid: &DenseGrid, connections: &[Connection]) -> bool {
    connections
        .iter()
        .flat_map(|c| &c.segments)
        .flat_map(|s| s.gcells())
        .any(|c| grid.is_congested(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{H_PLANE, Segment};

    fn pins(coords: &[(u32, u32)]) -> Vec<GridCoord> {
        coords
            .iter()
            .map(|&(x, y)| GridCoord::new(x, y, H_PLANE))
            .collect()
    }

    #[test]
    fn overlapping_nets_are_negotiated_apart() {
        let mut grid = DenseGrid::new(8, 4, 2, 1);
        let nets = vec![pins(&[(0, 0), (6, 3)]), pins(&[(1, 0), (7, 3)]), pins(&[(2, 1), (5, 2)])];
        let params = GlobalParams {
            iterations: 20,
            ..Default::default()
        };

        let solution = run(&mut grid, &nets, &params);

        assert!(solution.converged, "{} conflicts left", grid.total_conflicts());
        for (net, conns) in solution.routes.iter().enumerate() {
            assert_eq!(conns.len(), 1);
            let segs: &Vec<Segment> = &conns[0].segments;
            let (source, sink) = (nets[net][0], nets[net][1]);
            assert_eq!(segs.first().map(|s| (s.from.x, s.from.y)), Some((source.x, source.y)));
            assert_eq!(segs.last().map(|s| (s.to.x, s.to.y)), Some((sink.x, sink.y)));
        }
    }

    #[test]
    fn zero_budget_keeps_the_initial_route() {
        let mut grid = DenseGrid::new(8, 1, 2, 1);
        let nets = vec![pins(&[(0, 0), (7, 0)]), pins(&[(0, 0), (7, 0)])];
        let params = GlobalParams {
            iterations: 0,
            ..Default::default()
        };

        let solution = run(&mut grid, &nets, &params);

        assert!(!solution.converged);
        assert_eq!(solution.rounds, 0);
        assert!(solution.routes.iter().all(|r| r.len() == 1));
    }
}
