//! Renderer adapter: walks the finished layout in draw order and emits
//! drawing primitives to an SVG surface. PNG output rasterizes the SVG
//! document. Draw order: background, blocks (definition order,
//! autoblocks first), connection groups by effective priority, the
//! diagram label last.

use std::fs;
use std::path::Path;

use crate::attributes::{Color, FontStyle, FontWeight};
use crate::diagram::Diagram;
use crate::error::RenderError;
use crate::layout::{Layout, PlacedLabel, Rect};

/// Line style of one drawing primitive.
#[derive(Debug, Clone)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
    pub dasharray: Option<Vec<f64>>,
}

/// Minimal drawing surface: axis-aligned rectangles, orthogonal
/// polylines, arrow heads and text runs, collected into one SVG
/// document between construction and `finish`.
pub struct SvgCanvas {
    defs: String,
    body: String,
    clips: usize,
    width: f64,
    height: f64,
    scale: f64,
}

impl SvgCanvas {
    pub fn new(width: f64, height: f64, scale: f64) -> Self {
        Self {
            defs: String::new(),
            body: String::new(),
            clips: 0,
            width,
            height,
            scale,
        }
    }

    pub fn rectangle(&mut self, rect: &Rect, fill: Option<&Color>, stroke: Option<&Stroke>) {
        let fill_attr = match fill {
            Some(color) => color.css(),
            None => "none".to_string(),
        };
        let stroke_attr = stroke_attrs(stroke);
        self.body.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"{}/>",
            rect.xmin,
            rect.ymin,
            rect.width(),
            rect.height(),
            fill_attr,
            stroke_attr,
        ));
    }

    pub fn polyline(&mut self, points: &[(f64, f64)], stroke: &Stroke) {
        if points.len() < 2 {
            return;
        }
        let mut path = String::new();
        path.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
        for point in &points[1..] {
            path.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
        }
        self.body.push_str(&format!(
            "<path d=\"{}\" fill=\"none\"{}/>",
            path,
            stroke_attrs(Some(stroke)),
        ));
    }

    /// Filled triangular arrow head with its tip at `tip`, pointing in
    /// the `direction` unit vector.
    pub fn arrowhead(
        &mut self,
        tip: (f64, f64),
        direction: (f64, f64),
        length: f64,
        width: f64,
        fill: &Color,
    ) {
        let base = (tip.0 - direction.0 * length, tip.1 - direction.1 * length);
        let perp = (-direction.1, direction.0);
        let half = width / 2.0;
        let left = (base.0 + perp.0 * half, base.1 + perp.1 * half);
        let right = (base.0 - perp.0 * half, base.1 - perp.1 * half);
        self.body.push_str(&format!(
            "<path d=\"M {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2} z\" fill=\"{}\"/>",
            tip.0,
            tip.1,
            left.0,
            left.1,
            right.0,
            right.1,
            fill.css(),
        ));
    }

    pub fn text(&mut self, label: &PlacedLabel) {
        let style = &label.style;
        let Some(fill) = &style.text_fill else {
            return;
        };
        let lines: Vec<&str> = label.text.lines().collect();
        let line_height = style.font_size * style.text_line_height;
        let total = lines.len() as f64 * line_height;

        let mut run = String::new();
        let transform = if label.vertical {
            format!(" transform=\"rotate(-90 {:.2} {:.2})\"", label.x, label.y)
        } else {
            String::new()
        };
        let font_style = match style.font_style {
            FontStyle::Normal => "",
            FontStyle::Italic => " font-style=\"italic\"",
            FontStyle::Oblique => " font-style=\"oblique\"",
        };
        let font_weight = match style.font_weight {
            FontWeight::Normal => "",
            FontWeight::Bold => " font-weight=\"bold\"",
        };
        run.push_str(&format!("<g{transform}>"));
        for (index, line) in lines.iter().enumerate() {
            // Anchor vertically around the label centre; the 0.35em
            // nudge approximates the baseline offset of the middle of
            // a line of text.
            let y = label.y - total / 2.0
                + index as f64 * line_height
                + line_height / 2.0
                + style.font_size * 0.35;
            run.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\"{}{} fill=\"{}\">{}</text>",
                label.x,
                y,
                escape_xml(&style.font_family),
                style.font_size,
                font_style,
                font_weight,
                fill.css(),
                escape_xml(line),
            ));
        }
        run.push_str("</g>");

        if let Some(clip) = &label.clip {
            let id = self.clips;
            self.clips += 1;
            self.defs.push_str(&format!(
                "<clipPath id=\"clip{}\"><rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\"/></clipPath>",
                id,
                clip.xmin,
                clip.ymin,
                clip.width(),
                clip.height(),
            ));
            self.body
                .push_str(&format!("<g clip-path=\"url(#clip{id})\">{run}</g>"));
        } else {
            self.body.push_str(&run);
        }
    }

    pub fn finish(self) -> String {
        let out_width = self.width * self.scale;
        let out_height = self.height * self.scale;
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{:.2}\" height=\"{:.2}\" viewBox=\"0 0 {:.2} {:.2}\"><defs>{}</defs>{}</svg>",
            out_width, out_height, self.width, self.height, self.defs, self.body,
        )
    }
}

fn stroke_attrs(stroke: Option<&Stroke>) -> String {
    match stroke {
        None => String::new(),
        Some(stroke) => {
            let mut attrs = format!(
                " stroke=\"{}\" stroke-width=\"{:.2}\"",
                stroke.color.css(),
                stroke.width,
            );
            if let Some(dash) = &stroke.dasharray {
                let pattern: Vec<String> = dash.iter().map(|v| format!("{v}")).collect();
                attrs.push_str(&format!(" stroke-dasharray=\"{}\"", pattern.join(" ")));
            }
            attrs
        }
    }
}

/// Render the layout to an SVG document.
pub fn render_svg(diagram: &Diagram, layout: &Layout) -> String {
    let coords = &layout.coords;
    let mut canvas = SvgCanvas::new(coords.width, coords.height, diagram.attrs.scale);

    // Background.
    let backdrop = Rect {
        xmin: 0.0,
        ymin: 0.0,
        xmax: coords.width,
        ymax: coords.height,
    };
    let border = diagram.attrs.stroke.map(|color| Stroke {
        color,
        width: diagram.attrs.stroke_width,
        dasharray: None,
    });
    canvas.rectangle(&backdrop, diagram.attrs.fill.as_ref(), border.as_ref());

    // Blocks, in draw order, labels on top of their boxes.
    for (index, block) in diagram.blocks.iter().enumerate() {
        let rect = &coords.boxes[index];
        let stroke = block.attrs.stroke.map(|color| Stroke {
            color,
            width: block.attrs.stroke_width,
            dasharray: block.attrs.stroke_dasharray.clone(),
        });
        canvas.rectangle(rect, block.attrs.fill.as_ref(), stroke.as_ref());
        if let Some(label) = &layout.labels.blocks[index] {
            canvas.text(label);
        }
    }

    // Connections, grouped, lowest priority first.
    for group_index in layout.optimized.group_draw_order() {
        let group = &layout.optimized.groups[group_index];
        for &route_index in &group.routes {
            draw_route(&mut canvas, diagram, layout, route_index);
        }
        for &route_index in &group.routes {
            for (_, label) in layout
                .labels
                .connections
                .iter()
                .filter(|(owner, _)| *owner == route_index)
            {
                canvas.text(label);
            }
        }
    }

    if let Some(label) = &layout.labels.diagram {
        canvas.text(label);
    }

    canvas.finish()
}

fn draw_route(canvas: &mut SvgCanvas, diagram: &Diagram, layout: &Layout, route_index: usize) {
    let route = &layout.routes[route_index];
    let conn = &diagram.connections[route.connection];
    let attrs = &conn.attrs;
    let Some(stroke_color) = attrs.stroke else {
        return;
    };

    let mut points = layout.coords.polylines[route_index].clone();
    // Shorten the wire under the arrow heads so the stroke does not
    // poke past the tip.
    let arrow_length = attrs.arrow_length();
    if attrs.arrow_forward {
        trim_end(&mut points, arrow_length);
    }
    if attrs.arrow_back {
        trim_start(&mut points, arrow_length);
    }

    if attrs.buffer_width > 0.0 {
        if let Some(buffer_color) = &attrs.buffer_fill {
            canvas.polyline(
                &points,
                &Stroke {
                    color: *buffer_color,
                    width: attrs.stroke_width + 2.0 * attrs.buffer_width,
                    dasharray: None,
                },
            );
        }
    }
    canvas.polyline(
        &points,
        &Stroke {
            color: stroke_color,
            width: attrs.stroke_width,
            dasharray: attrs.stroke_dasharray.clone(),
        },
    );

    let original = &layout.coords.polylines[route_index];
    if attrs.arrow_forward && original.len() >= 2 {
        let tip = original[original.len() - 1];
        let from = original[original.len() - 2];
        canvas.arrowhead(
            tip,
            unit(from, tip),
            arrow_length,
            attrs.arrow_width(),
            &stroke_color,
        );
    }
    if attrs.arrow_back && original.len() >= 2 {
        let tip = original[0];
        let from = original[1];
        canvas.arrowhead(
            tip,
            unit(from, tip),
            arrow_length,
            attrs.arrow_width(),
            &stroke_color,
        );
    }
}

fn unit(from: (f64, f64), to: (f64, f64)) -> (f64, f64) {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-9 {
        (1.0, 0.0)
    } else {
        (dx / len, dy / len)
    }
}

fn trim_end(points: &mut [(f64, f64)], by: f64) {
    let count = points.len();
    if count < 2 {
        return;
    }
    let direction = unit(points[count - 2], points[count - 1]);
    let last = &mut points[count - 1];
    last.0 -= direction.0 * by;
    last.1 -= direction.1 * by;
}

fn trim_start(points: &mut [(f64, f64)], by: f64) {
    if points.len() < 2 {
        return;
    }
    let direction = unit(points[1], points[0]);
    let first = &mut points[0];
    first.0 -= direction.0 * by;
    first.1 -= direction.1 * by;
}

pub fn write_output_svg(svg: &str, path: &Path) -> Result<(), RenderError> {
    fs::write(path, svg).map_err(|err| RenderError::Output {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

pub fn write_output_png(svg: &str, path: &Path) -> Result<(), RenderError> {
    let raster = |message: String| RenderError::Raster { message };
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &options).map_err(|err| raster(err.to_string()))?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width().max(1), size.height().max(1))
        .ok_or_else(|| raster("failed to allocate pixmap".to_string()))?;
    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(path).map_err(|err| RenderError::Output {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::tests::diagram_from_yaml;
    use crate::layout::{compute_layout, LayoutOptions};

    fn rendered(yaml: &str) -> String {
        let diagram = diagram_from_yaml(yaml).unwrap();
        let layout = compute_layout(&diagram, &LayoutOptions::default()).unwrap();
        render_svg(&diagram, &layout)
    }

    #[test]
    fn produces_a_well_formed_document() {
        let svg = rendered(
            "rows:\n  - [a, b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n",
        );
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("<rect"));
        assert!(svg.contains("<path"));
    }

    #[test]
    fn scale_multiplies_the_document_size_only() {
        let plain = rendered("rows:\n  - [a]\nblocks:\n  - name: a\n");
        let scaled = rendered("diagram:\n  scale: 2\nrows:\n  - [a]\nblocks:\n  - name: a\n");
        let view = |svg: &str| {
            let start = svg.find("viewBox=\"").unwrap();
            svg[start..svg.len().min(start + 40)].to_string()
        };
        assert_eq!(view(&plain), view(&scaled));
        assert!(scaled.contains("width=\"512.00\""));
        assert!(plain.contains("width=\"256.00\""));
    }

    #[test]
    fn blocks_are_drawn_in_definition_order() {
        let svg = rendered(
            "rows:\n  - [a, b]\nblocks:\n  - name: frame\n    tags: [a, b]\n    fill: [0.9, 0.9, 0.5]\n  - name: a\n    fill: [1, 0, 0]\n  - name: b\n    fill: [0, 1, 0]\n",
        );
        // The frame rectangle is drawn under a, and a under b.
        let frame_pos = svg.find("rgb(230,230,128)").unwrap();
        let a_pos = svg.find("rgb(255,0,0)").unwrap();
        let b_pos = svg.find("rgb(0,255,0)").unwrap();
        assert!(frame_pos < a_pos);
        assert!(a_pos < b_pos);
    }
}
