use crate::db::core::Design;
use crate::geom::rect::Rect;
use image::{ImageResult, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

/// What a snapshot shows besides the cells.
#[derive(Clone, Copy, Debug)]
pub struct SnapshotLayers {
    pub rubbers: bool,
    pub routing: bool,
    pub selection: bool,
}

impl Default for SnapshotLayers {
    fn default() -> Self {
        Self {
            rubbers: true,
            routing: true,
            selection: true,
        }
    }
}

const LAYER_COLORS: [Rgb<u8>; 6] = [
    Rgb([0, 110, 255]),
    Rgb([255, 20, 80]),
    Rgb([0, 255, 100]),
    Rgb([255, 215, 0]),
    Rgb([180, 50, 255]),
    Rgb([0, 240, 255]),
];

pub fn draw_snapshot(
    design: &Design,
    selection: &[Rect],
    layers: SnapshotLayers,
    path: &Path,
    width: u32,
    height: u32,
) -> ImageResult<()> {
    let mut img = RgbImage::from_pixel(width, height, Rgb([20, 20, 20]));

    let ab = design.abutment_box;
    if ab.is_empty() {
        return img.save(path);
    }

    let scale_x = width as f64 / ab.width();
    let scale_y = height as f64 / ab.height();
    let map = |x: f64, y: f64| {
        (
            (x - ab.min.x) * scale_x,
            height as f64 - (y - ab.min.y) * scale_y,
        )
    };

    let color_cell = Rgb([180, 60, 60]);
    let color_fixed = Rgb([180, 120, 40]);
    if design.placed {
        for (cell, pos) in design.cells.iter().zip(&design.positions) {
            let (x, y_bot) = map(pos.x, pos.y);
            let w = (cell.width * scale_x).max(2.0);
            let h = (cell.height * scale_y).max(2.0);
            let rect = ImageRect::at(x as i32, (y_bot - h) as i32).of_size(w as u32, h as u32);
            let color = if cell.is_fixed { color_fixed } else { color_cell };
            draw_filled_rect_mut(&mut img, rect, color);
        }
    }

    if layers.rubbers && design.placed {
        let rubber = Rgb([90, 90, 110]);
        for net in &design.nets {
            let Some((&first, rest)) = net.pins.split_first() else {
                continue;
            };
            let origin = design.pin_position(first);
            let (x1, y1) = map(origin.x, origin.y);
            for &pin in rest {
                let p = design.pin_position(pin);
                let (x2, y2) = map(p.x, p.y);
                let (from, to) = ((x1 as f32, y1 as f32), (x2 as f32, y2 as f32));
                draw_line_segment_mut(&mut img, from, to, rubber);
            }
        }
    }

    if layers.routing {
        let mut segments: Vec<_> = design
            .nets
            .iter()
            .flat_map(|n| n.route_segments.iter())
            .collect();
        segments.sort_by_key(|s| s.layer);

        for seg in segments {
            let (x1, y1) = map(seg.p1.x, seg.p1.y);
            let (x2, y2) = map(seg.p2.x, seg.p2.y);
            if seg.length() < 1e-9 {
                let rect = ImageRect::at(x1 as i32 - 1, y1 as i32 - 1).of_size(3, 3);
                draw_filled_rect_mut(&mut img, rect, Rgb([255, 255, 255]));
            } else {
                let color = LAYER_COLORS[(seg.layer as usize).min(LAYER_COLORS.len() - 1)];
                let (from, to) = ((x1 as f32, y1 as f32), (x2 as f32, y2 as f32));
                draw_line_segment_mut(&mut img, from, to, color);
            }
        }
    }

    if layers.selection {
        let highlight = Rgb([255, 255, 255]);
        for area in selection {
            let (x, y_top) = map(area.min.x, area.max.y);
            let w = (area.width() * scale_x).max(2.0);
            let h = (area.height() * scale_y).max(2.0);
            let rect = ImageRect::at(x as i32, y_top as i32).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut img, rect, highlight);
        }
    }

    img.save(path)
}
