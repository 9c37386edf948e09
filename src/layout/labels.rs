//! Label measurement and placement. Orientation resolution happens
//! here: `follow` labels take the orientation of the segment they sit
//! on, falling back to the longest segment and then to horizontal when
//! the preferred one is degenerate.

use crate::attributes::{LabelPosition, TextOrientation, TextStyle};
use crate::diagram::{ConnectionLabel, Diagram};
use crate::text_metrics;

use super::optimize::Optimized;
use super::route::Route;
use super::size::{Coordinates, Rect};
use super::Orientation;

/// A label with its final anchor (the centre of the text box).
#[derive(Debug, Clone)]
pub struct PlacedLabel {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub vertical: bool,
    pub style: TextStyle,
    pub clip: Option<Rect>,
}

#[derive(Debug, Clone, Default)]
pub struct PlacedLabels {
    /// One entry per block, in block order.
    pub blocks: Vec<Option<PlacedLabel>>,
    /// Connection labels, keyed by route index.
    pub connections: Vec<(usize, PlacedLabel)>,
    pub diagram: Option<PlacedLabel>,
}

/// Segment a middle label is attached to: the middle one, or the
/// longest when the middle one has no usable extent.
pub fn middle_segment_index(route: &Route) -> usize {
    let segments = &route.segments;
    let mid = segments.len() / 2;
    if !segments[mid].is_degenerate() {
        return mid;
    }
    segments
        .iter()
        .enumerate()
        .max_by_key(|(index, segment)| (segment.len(), usize::MAX - index))
        .map(|(index, _)| index)
        .unwrap_or(mid)
}

fn is_vertical_text(style: &TextStyle, segment: Option<Orientation>) -> bool {
    match style.text_orientation {
        TextOrientation::Horizontal => false,
        TextOrientation::Vertical => true,
        TextOrientation::Follow => matches!(segment, Some(Orientation::Vertical)),
    }
}

/// Drawn extents of a connection label relative to a segment:
/// `(along, perpendicular)`.
pub fn label_size(label: &ConnectionLabel, segment: Orientation) -> (f64, f64) {
    let vertical = is_vertical_text(&label.style, Some(segment));
    let (w, h) = text_metrics::measure_text(
        &label.text,
        label.style.font_size,
        &label.style.font_family,
        label.style.text_line_height,
    );
    let (box_w, box_h) = if vertical { (h, w) } else { (w, h) };
    match segment {
        Orientation::Horizontal => (box_w, box_h),
        Orientation::Vertical => (box_h, box_w),
    }
}

pub fn place_labels(
    diagram: &Diagram,
    routes: &[Route],
    optimized: &Optimized,
    coords: &Coordinates,
) -> PlacedLabels {
    let mut placed = PlacedLabels::default();
    placed.blocks = diagram
        .blocks
        .iter()
        .enumerate()
        .map(|(index, _)| place_block_label(diagram, index, &coords.boxes[index]))
        .collect();
    for (route_index, route) in routes.iter().enumerate() {
        place_connection_labels(
            diagram,
            route,
            route_index,
            optimized,
            coords,
            &mut placed.connections,
        );
    }
    placed.diagram = place_diagram_label(diagram, coords);
    placed
}

fn place_block_label(diagram: &Diagram, index: usize, rect: &Rect) -> Option<PlacedLabel> {
    let block = &diagram.blocks[index];
    let text = block.effective_label()?.to_string();
    let attrs = &block.attrs;
    let vertical = attrs.text.text_orientation == TextOrientation::Vertical;
    let (w, h) = text_metrics::measure_text(
        &text,
        attrs.text.font_size,
        &attrs.text.font_family,
        attrs.text.text_line_height,
    );
    let (box_w, box_h) = if vertical { (h, w) } else { (w, h) };
    let inset = attrs.stroke_width + attrs.label_distance;
    let position = attrs.label_position;
    let x = if position.is_left() {
        rect.xmin + inset + box_w / 2.0
    } else if position.is_right() {
        rect.xmax - inset - box_w / 2.0
    } else {
        (rect.xmin + rect.xmax) / 2.0
    };
    let y = if position.is_top() {
        rect.ymin + inset + box_h / 2.0
    } else if position.is_bottom() {
        rect.ymax - inset - box_h / 2.0
    } else {
        (rect.ymin + rect.ymax) / 2.0
    };
    Some(PlacedLabel {
        text,
        x,
        y,
        vertical,
        style: attrs.text.clone(),
        clip: Some(*rect),
    })
}

fn place_connection_labels(
    diagram: &Diagram,
    route: &Route,
    route_index: usize,
    optimized: &Optimized,
    coords: &Coordinates,
    out: &mut Vec<(usize, PlacedLabel)>,
) {
    let conn = &diagram.connections[route.connection];
    let polyline = &coords.polylines[route_index];
    let count = route.segments.len();

    if let Some(label) = &conn.start_label {
        let placed = place_terminal_label(
            label,
            route,
            0,
            polyline[0],
            polyline[1],
            optimized,
            coords,
            route_index,
            conn.attrs.wire_width(),
        );
        out.push((route_index, placed));
    }
    if let Some(label) = &conn.middle_label {
        let segment_index = middle_segment_index(route);
        let a = polyline[segment_index];
        let b = polyline[segment_index + 1];
        let orientation = route.segments[segment_index].orientation;
        let (_, perp) = label_size(label, orientation);
        let wire_index = optimized.segment_wires[route_index][segment_index];
        let wire = &optimized.wires[wire_index];
        let lane = coords.wire_lines[wire_index];
        let vertical = is_vertical_text(&label.style, Some(orientation));
        let shift = wire.width / 2.0 + label.distance + perp / 2.0;
        let (x, y) = match orientation {
            Orientation::Horizontal => ((a.0 + b.0) / 2.0, lane - shift),
            Orientation::Vertical => (lane - shift, (a.1 + b.1) / 2.0),
        };
        out.push((
            route_index,
            PlacedLabel {
                text: label.text.clone(),
                x,
                y,
                vertical,
                style: label.style.clone(),
                clip: None,
            },
        ));
    }
    if let Some(label) = &conn.end_label {
        let placed = place_terminal_label(
            label,
            route,
            count - 1,
            polyline[count],
            polyline[count - 1],
            optimized,
            coords,
            route_index,
            conn.attrs.wire_width(),
        );
        out.push((route_index, placed));
    }
}

/// Place a start or end label: just outside the block edge, beside the
/// terminal segment.
#[allow(clippy::too_many_arguments)]
fn place_terminal_label(
    label: &ConnectionLabel,
    route: &Route,
    segment_index: usize,
    edge_point: (f64, f64),
    inner_point: (f64, f64),
    optimized: &Optimized,
    coords: &Coordinates,
    route_index: usize,
    wire_width: f64,
) -> PlacedLabel {
    let orientation = route.segments[segment_index].orientation;
    let (along, perp) = label_size(label, orientation);
    let lane = coords.wire_lines[optimized.segment_wires[route_index][segment_index]];
    let vertical = is_vertical_text(&label.style, Some(orientation));
    let shift = wire_width / 2.0 + label.distance + perp / 2.0;
    match orientation {
        Orientation::Horizontal => {
            let direction = (inner_point.0 - edge_point.0).signum();
            PlacedLabel {
                text: label.text.clone(),
                x: edge_point.0 + direction * (label.distance + along / 2.0),
                y: lane - shift,
                vertical,
                style: label.style.clone(),
                clip: None,
            }
        }
        Orientation::Vertical => {
            let direction = (inner_point.1 - edge_point.1).signum();
            PlacedLabel {
                text: label.text.clone(),
                x: lane - shift,
                y: edge_point.1 + direction * (label.distance + along / 2.0),
                vertical,
                style: label.style.clone(),
                clip: None,
            }
        }
    }
}

fn place_diagram_label(diagram: &Diagram, coords: &Coordinates) -> Option<PlacedLabel> {
    let attrs = &diagram.attrs;
    let text = attrs.label.clone()?;
    let vertical = attrs.text.text_orientation == TextOrientation::Vertical;
    let (w, h) = text_metrics::measure_text(
        &text,
        attrs.text.font_size,
        &attrs.text.font_family,
        attrs.text.text_line_height,
    );
    let (box_w, box_h) = if vertical { (h, w) } else { (w, h) };
    let position = attrs.label_position;
    let inset_x = attrs.padding_left + attrs.stroke_width;
    let x = if position.is_left() {
        inset_x + box_w / 2.0
    } else if position.is_right() {
        coords.width - inset_x - box_w / 2.0
    } else {
        coords.width / 2.0
    };
    let y = if position.is_bottom() {
        coords.height - attrs.padding_bottom - attrs.stroke_width - box_h / 2.0
    } else if position == LabelPosition::Center {
        coords.height / 2.0
    } else {
        attrs.padding_top + attrs.stroke_width + box_h / 2.0
    };
    Some(PlacedLabel {
        text,
        x,
        y,
        vertical,
        style: attrs.text.clone(),
        clip: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::tests::diagram_from_yaml;
    use crate::layout::optimize::optimize;
    use crate::layout::refine::TrackGrid;
    use crate::layout::route::route_connections;
    use crate::layout::size::solve;

    fn placed(yaml: &str) -> (crate::diagram::Diagram, PlacedLabels) {
        let diagram = diagram_from_yaml(yaml).unwrap();
        let grid = TrackGrid::new(&diagram, 3);
        let routes = route_connections(&diagram, &grid).unwrap();
        let optimized = optimize(&diagram, &routes);
        let coords = solve(&diagram, &grid, &routes, &optimized).unwrap();
        let labels = place_labels(&diagram, &routes, &optimized, &coords);
        (diagram, labels)
    }

    #[test]
    fn block_labels_default_to_the_centre() {
        let (diagram, labels) = placed("rows:\n  - [a]\nblocks:\n  - name: a\n");
        let index = diagram.block_by_name("a").unwrap();
        let label = labels.blocks[index].as_ref().unwrap();
        assert_eq!(label.text, "a");
        assert!(label.clip.is_some());
    }

    #[test]
    fn middle_label_sits_beside_its_segment() {
        let (_, labels) = placed(
            "rows:\n  - [a, ~, b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n    middle_label: flow\n",
        );
        assert_eq!(labels.connections.len(), 1);
        assert_eq!(labels.connections[0].1.text, "flow");
    }

    #[test]
    fn diagram_label_lands_inside_the_drawing() {
        let (_, labels) = placed(
            "diagram:\n  label: overview\nrows:\n  - [a]\nblocks:\n  - name: a\n",
        );
        let label = labels.diagram.as_ref().unwrap();
        assert_eq!(label.text, "overview");
        assert!(label.y > 0.0);
    }
}
