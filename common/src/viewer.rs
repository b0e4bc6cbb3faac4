use crate::db::core::SharedDesign;
use crate::geom::rect::Rect;

/// Optional interactive front end. Every method defaults to a no-op, so a
/// headless run uses [`NoViewer`] instead of checking for presence.
pub trait Viewer {
    /// The design currently loaded in the viewer, if any.
    fn get_cell(&self) -> Option<SharedDesign> {
        None
    }
    fn set_layer_visible(&self, _layer: &str, _visible: bool) {}
    fn set_show_selection(&self, _show: bool) {}
    /// Adds an area to the selection overlay.
    fn select(&self, _area: Rect) {}
    fn refresh(&self) {}
    fn fit(&self) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoViewer;

impl Viewer for NoViewer {}
