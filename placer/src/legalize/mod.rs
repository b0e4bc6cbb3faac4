pub mod tetris;

/// Summary of a legalization run.
#[derive(Clone, Copy, Debug, Default)]
pub struct LegalizeStats {
    pub cells: usize,
    pub total_displacement: f64,
    pub max_displacement: f64,
}
