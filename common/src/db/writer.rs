use crate::db::core::Design;
use std::io::Write;
use std::path::Path;

const DEF_UNITS: f64 = 1000.0;

fn dbu(v: f64) -> i64 {
    (v * DEF_UNITS).round() as i64
}

pub fn save_def(design: &Design, path: &Path) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_def(design, &mut file)?;
    file.flush()
}

pub fn write_def<W: Write>(design: &Design, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "VERSION 5.8 ;")?;
    writeln!(out, "DIVIDERCHAR \"/\" ;")?;
    writeln!(out, "BUSBITCHARS \"[]\" ;")?;
    writeln!(out, "DESIGN {} ;", design.name)?;
    writeln!(out, "UNITS DISTANCE MICRONS {} ;", DEF_UNITS as i64)?;

    let ab = design.abutment_box;
    writeln!(
        out,
        "DIEAREA ( {} {} ) ( {} {} ) ;",
        dbu(ab.min.x),
        dbu(ab.min.y),
        dbu(ab.max.x),
        dbu(ab.max.y)
    )?;

    writeln!(out, "COMPONENTS {} ;", design.num_cells())?;
    for (cell, pos) in design.cells.iter().zip(&design.positions) {
        let status = if cell.is_fixed {
            "FIXED"
        } else if design.placed {
            "PLACED"
        } else {
            "UNPLACED"
        };
        if status == "UNPLACED" {
            writeln!(out, "- {} {} + UNPLACED ;", cell.name, cell.lib_name)?;
        } else {
            writeln!(
                out,
                "- {} {} + {} ( {} {} ) N ;",
                cell.name,
                cell.lib_name,
                status,
                dbu(pos.x),
                dbu(pos.y)
            )?;
        }
    }
    writeln!(out, "END COMPONENTS")?;

    writeln!(out, "NETS {} ;", design.num_nets())?;
    for net in &design.nets {
        write!(out, "- {} ", net.name)?;
        for &pin in &net.pins {
            let cell = design.pin_to_cell[pin.index()];
            write!(
                out,
                "( {} {} ) ",
                design.cells[cell.index()].name,
                design.pin_names[pin.index()]
            )?;
        }
        writeln!(out)?;

        for seg in &net.route_segments {
            let layer_name = design
                .layers
                .get(seg.layer as usize)
                .map(|l| l.name.as_str())
                .unwrap_or("M1");
            if seg.length() < 1e-9 {
                let upper = design
                    .layers
                    .get(seg.layer as usize + 1)
                    .map(|l| l.name.as_str())
                    .unwrap_or(layer_name);
                writeln!(
                    out,
                    "  + ROUTED {} ( {} {} ) VIA_{}_{}",
                    layer_name,
                    dbu(seg.p1.x),
                    dbu(seg.p1.y),
                    layer_name,
                    upper
                )?;
            } else {
                writeln!(
                    out,
                    "  + ROUTED {} ( {} {} ) ( {} {} )",
                    layer_name,
                    dbu(seg.p1.x),
                    dbu(seg.p1.y),
                    dbu(seg.p2.x),
                    dbu(seg.p2.y)
                )?;
            }
        }
        writeln!(out, "  ;")?;
    }
    writeln!(out, "END NETS")?;
    writeln!(out, "END DESIGN")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::core::RouteSegment;
    use crate::geom::point::Point;
    use crate::geom::rect::Rect;

    #[test]
    fn routed_net_is_written_with_layer_names() {
        let mut d = Design::new("tiny", 2.0);
        d.add_default_layers(2, 0.5);
        let a = d.add_cell("u0", "INV", 1.0, 2.0, false);
        let n = d.add_net("n0");
        d.add_pin(a, n, Point::new(0.5, 1.0), "A");
        d.abutment_box = Rect::from_size(Point::new(0.0, 0.0), 4.0, 4.0);
        d.positions[0] = Point::new(1.0, 2.0);
        d.placed = true;
        d.nets[0].route_segments.push(RouteSegment {
            layer: 1,
            p1: Point::new(1.5, 0.0),
            p2: Point::new(1.5, 3.0),
        });

        let mut buf = Vec::new();
        write_def(&d, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("DESIGN tiny ;"));
        assert!(text.contains("DIEAREA ( 0 0 ) ( 4000 4000 ) ;"));
        assert!(text.contains("- u0 INV + PLACED ( 1000 2000 ) N ;"));
        assert!(text.contains("+ ROUTED M2 ( 1500 0 ) ( 1500 3000 )"));
    }
}
