use pnr_common::db::core::SharedDesign;
use pnr_common::geom::rect::Rect;
use pnr_common::util::breakpoint::StopHandler;
use pnr_common::util::visualization::{SnapshotLayers, draw_snapshot};
use pnr_common::viewer::Viewer;
use std::cell::{Cell, RefCell};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Headless stand-in for a layout editor: every refresh renders the design
/// into the next numbered PNG of `dir`.
pub struct SnapshotViewer {
    design: SharedDesign,
    dir: PathBuf,
    size: u32,
    layers: Cell<SnapshotLayers>,
    selection: RefCell<Vec<Rect>>,
    frame: Cell<usize>,
}

impl SnapshotViewer {
    pub fn new(design: SharedDesign, dir: PathBuf, size: u32) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            design,
            dir,
            size,
            layers: Cell::new(SnapshotLayers::default()),
            selection: RefCell::new(Vec::new()),
            frame: Cell::new(0),
        })
    }

    pub fn frames(&self) -> usize {
        self.frame.get()
    }
}

impl Viewer for SnapshotViewer {
    fn get_cell(&self) -> Option<SharedDesign> {
        Some(self.design.clone())
    }

    fn set_layer_visible(&self, layer: &str, visible: bool) {
        let mut layers = self.layers.get();
        match layer {
            "rubber" => layers.rubbers = visible,
            "routing" => layers.routing = visible,
            other => log::debug!("Snapshot viewer has no '{}' layer.", other),
        }
        self.layers.set(layers);
    }

    fn set_show_selection(&self, show: bool) {
        let mut layers = self.layers.get();
        layers.selection = show;
        self.layers.set(layers);
        if !show {
            self.selection.borrow_mut().clear();
        }
    }

    fn select(&self, area: Rect) {
        self.selection.borrow_mut().push(area);
    }

    fn refresh(&self) {
        let index = self.frame.get();
        let path = self.dir.join(format!("frame_{:03}.png", index));
        let result = draw_snapshot(
            &self.design.borrow(),
            &self.selection.borrow(),
            self.layers.get(),
            &path,
            self.size,
            self.size,
        );
        match result {
            Ok(()) => {
                log::info!("Snapshot written to {:?}", path);
                self.frame.set(index + 1);
            }
            Err(e) => log::warn!("Failed to write snapshot {:?}: {}", path, e),
        }
    }

    fn fit(&self) {
        log::debug!("Snapshots always frame the whole abutment box.");
    }
}

/// Pauses on breakpoints until Enter is pressed.
pub struct StdinStopHandler;

impl StopHandler for StdinStopHandler {
    fn stop(&self, level: u32, label: &str) {
        eprint!("\x1b[36m[Stop {}] {} -- press Enter to continue\x1b[0m ", level, label);
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
            log::warn!("Cannot read from stdin ({}), resuming.", e);
        }
    }
}
