use super::LegalizeStats;
use pnr_common::db::core::Design;
use pnr_common::engine::EngineError;
use pnr_common::geom::rect::Rect;

/// Greedy row legalizer: cells are taken left to right and dropped into the
/// free interval closest to their global position.
pub struct TetrisLegalizer {
    /// Rows searched around the ideal one before settling for the best slot
    /// found so far.
    search_radius: usize,
}

#[derive(Clone)]
struct RowIntervals {
    blockages: Vec<(f64, f64)>,
    row_y: f64,
    max_x: f64,
}

impl RowIntervals {
    fn new(row_y: f64, min_x: f64, max_x: f64) -> Self {
        Self {
            blockages: vec![(min_x, min_x)],
            row_y,
            max_x,
        }
    }

    fn add_occupancy(&mut self, start: f64, end: f64) {
        self.blockages.push((start, end));
        self.blockages.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(self.blockages.len());
        for &(start, end) in &self.blockages {
            match merged.last_mut() {
                Some(last) if start < last.1 + 1e-6 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        self.blockages = merged;
    }

    /// Closest legal x for a cell of `width` wanting to sit at `target_x`,
    /// with its distance.
    fn find_best_slot(&self, target_x: f64, width: f64) -> Option<(f64, f64)> {
        let mut best: Option<(f64, f64)> = None;

        for (i, &(_, occupied_end)) in self.blockages.iter().enumerate() {
            let next_start = self
                .blockages
                .get(i + 1)
                .map_or(self.max_x, |b| b.0);

            if next_start - occupied_end + 1e-9 >= width {
                let last_start = (next_start - width).max(occupied_end);
                let candidate = target_x.clamp(occupied_end, last_start);
                let dist = (candidate - target_x).abs();
                if best.is_none_or(|(_, d)| dist < d) {
                    best = Some((candidate, dist));
                }
            }
        }
        best
    }
}

impl Default for TetrisLegalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TetrisLegalizer {
    pub fn new() -> Self {
        Self { search_radius: 20 }
    }

    pub fn legalize(&self, design: &mut Design, area: Rect) -> Result<LegalizeStats, EngineError> {
        let row_height = design.row_height;
        let num_rows = ((area.height() + 1e-6) / row_height).floor() as usize;
        if num_rows == 0 {
            return Err(EngineError::Placement(format!(
                "abutment box height {:.2} holds no row of height {:.2}",
                area.height(),
                row_height
            )));
        }

        let mut rows: Vec<RowIntervals> = (0..num_rows)
            .map(|i| RowIntervals::new(area.min.y + i as f64 * row_height, area.min.x, area.max.x))
            .collect();

        for (cell, pos) in design.cells.iter().zip(&design.positions) {
            if !cell.is_fixed {
                continue;
            }
            let start_row = ((pos.y - area.min.y) / row_height).floor() as isize;
            let end_row = ((pos.y + cell.height - 1e-6 - area.min.y) / row_height).floor() as isize;
            for r in start_row.max(0)..=end_row.min(num_rows as isize - 1) {
                rows[r as usize].add_occupancy(pos.x, pos.x + cell.width);
            }
        }

        let mut order: Vec<usize> = (0..design.num_cells())
            .filter(|&i| !design.cells[i].is_fixed)
            .collect();
        order.sort_by(|&a, &b| design.positions[a].x.total_cmp(&design.positions[b].x));

        let mut stats = LegalizeStats::default();
        for &cell_idx in &order {
            let cell = &design.cells[cell_idx];
            let footprint = cell.footprint();
            let original = design.positions[cell_idx];
            let ideal_row = ((original.y - area.min.y) / row_height).round() as isize;

            let mut best: Option<(usize, f64, f64)> = None;
            for offset in 0..num_rows as isize + ideal_row.abs() {
                let candidates = if offset == 0 {
                    vec![0]
                } else {
                    vec![offset, -offset]
                };
                for dir in candidates {
                    let r = ideal_row + dir;
                    if r < 0 || r >= num_rows as isize {
                        continue;
                    }
                    let row = &rows[r as usize];
                    if let Some((x, x_cost)) = row.find_best_slot(original.x, footprint) {
                        let cost = x_cost + (row.row_y - original.y).abs() * 2.0;
                        if best.is_none_or(|(_, _, c)| cost < c) {
                            best = Some((r as usize, x, cost));
                        }
                    }
                }

                if let Some((_, _, cost)) = best
                    && (cost < row_height * 0.1 || offset as usize >= self.search_radius)
                {
                    break;
                }
            }

            let Some((row_idx, x, cost)) = best else {
                return Err(EngineError::Placement(format!(
                    "no room left for cell '{}' ({:.2} wide) in a {:.2} x {:.2} box",
                    cell.name,
                    footprint,
                    area.width(),
                    area.height()
                )));
            };

            let y = rows[row_idx].row_y;
            rows[row_idx].add_occupancy(x, x + footprint);
            design.positions[cell_idx].x = x;
            design.positions[cell_idx].y = y;

            stats.cells += 1;
            stats.total_displacement += cost;
            stats.max_displacement = stats.max_displacement.max(cost);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnr_common::geom::point::Point;

    fn overlaps(d: &Design, a: usize, b: usize) -> bool {
        let (pa, pb) = (d.positions[a], d.positions[b]);
        let (ca, cb) = (&d.cells[a], &d.cells[b]);
        pa.x + 1e-9 < pb.x + cb.width
            && pb.x + 1e-9 < pa.x + ca.width
            && pa.y + 1e-9 < pb.y + cb.height
            && pb.y + 1e-9 < pa.y + ca.height
    }

    #[test]
    fn stacked_cells_end_up_in_rows_without_overlap() {
        let mut d = Design::new("stack", 2.0);
        for i in 0..12 {
            d.add_cell(format!("c{}", i), "NAND2", 1.5, 2.0, false);
        }
        let blocker = d.add_cell("macro", "RAM", 4.0, 4.0, true);
        for p in d.positions.iter_mut() {
            *p = Point::new(3.0, 3.0);
        }
        d.positions[blocker.index()] = Point::new(0.0, 0.0);
        let area = Rect::from_size(Point::new(0.0, 0.0), 10.0, 8.0);

        let stats = TetrisLegalizer::new().legalize(&mut d, area).unwrap();

        assert_eq!(stats.cells, 12);
        for i in 0..d.num_cells() {
            let p = d.positions[i];
            assert!((p.y / 2.0 - (p.y / 2.0).round()).abs() < 1e-9);
            assert!(p.x >= 0.0 && p.x + d.cells[i].width <= 10.0 + 1e-9);
            for j in i + 1..d.num_cells() {
                assert!(!overlaps(&d, i, j), "cells {} and {} overlap", i, j);
            }
        }
        assert_eq!(d.positions[blocker.index()], Point::new(0.0, 0.0));
    }

    #[test]
    fn bloated_cells_keep_their_room_free() {
        let mut d = Design::new("bloat", 2.0);
        for i in 0..4 {
            d.add_cell(format!("c{}", i), "NAND2", 1.0, 2.0, false);
            d.cells[i].inflate(1.0);
        }
        for p in d.positions.iter_mut() {
            *p = Point::new(0.0, 0.0);
        }
        let area = Rect::from_size(Point::new(0.0, 0.0), 8.0, 2.0);

        TetrisLegalizer::new().legalize(&mut d, area).unwrap();

        let mut xs: Vec<f64> = d.positions.iter().map(|p| p.x).collect();
        xs.sort_by(f64::total_cmp);
        for pair in xs.windows(2) {
            assert!(pair[1] - pair[0] >= 2.0 - 1e-9);
        }
    }

    #[test]
    fn overfull_box_is_an_error() {
        let mut d = Design::new("full", 2.0);
        for i in 0..5 {
            d.add_cell(format!("c{}", i), "DFF", 4.0, 2.0, false);
        }
        let area = Rect::from_size(Point::new(0.0, 0.0), 8.0, 4.0);

        let err = TetrisLegalizer::new().legalize(&mut d, area).unwrap_err();
        assert!(matches!(err, EngineError::Placement(_)));
    }
}
