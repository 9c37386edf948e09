//! The constraint sizer. Every refinement track becomes a band between
//! two shared boundary lines with a reference line inside; wire lanes
//! sit at fixed offsets around the band reference, block boxes span the
//! references of their cover and keep margins (including arrow and
//! terminal label room) from the band boundaries. One batch solve
//! produces every coordinate; an infeasible system is retried once with
//! the built-in minimum sizes before giving up.

use std::collections::HashMap;

use cassowary::strength::{REQUIRED, WEAK};
use cassowary::WeightedRelation::{EQ, GE, LE};
use cassowary::{Solver, Variable};
use indexmap::IndexMap;
use log::debug;

use crate::attributes::{BlockAttributes, Side, TextOrientation};
use crate::diagram::Diagram;
use crate::error::SizingError;
use crate::text_metrics;

use super::labels::label_size;
use super::optimize::Optimized;
use super::refine::TrackGrid;
use super::route::Route;
use super::Orientation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Rect {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn edge(&self, side: Side) -> f64 {
        match side {
            Side::Top => self.ymin,
            Side::Bottom => self.ymax,
            Side::Left => self.xmin,
            Side::Right => self.xmax,
        }
    }
}

/// Solved absolute coordinates for the whole drawing, before scaling.
#[derive(Debug, Clone)]
pub struct Coordinates {
    pub width: f64,
    pub height: f64,
    pub boxes: Vec<Rect>,
    /// Lane coordinate of every wire segment.
    pub wire_lines: Vec<f64>,
    /// Joint coordinates of every route, terminal points on the block
    /// edges included.
    pub polylines: Vec<Vec<(f64, f64)>>,
    pub row_lines: Vec<f64>,
    pub col_lines: Vec<f64>,
}

pub fn solve(
    diagram: &Diagram,
    grid: &TrackGrid,
    routes: &[Route],
    optimized: &Optimized,
) -> Result<Coordinates, SizingError> {
    match build_and_solve(diagram, grid, routes, optimized, false) {
        Ok(coords) => Ok(coords),
        Err(first) => {
            debug!("sizing infeasible, retrying with default minimums: {first}");
            build_and_solve(diagram, grid, routes, optimized, true)
                .map_err(|detail| SizingError::InfeasibleLayout { detail })
        }
    }
}

struct AxisVars {
    lines: Vec<Variable>,
    refs: Vec<Variable>,
}

impl AxisVars {
    fn new(tracks: usize) -> Self {
        Self {
            lines: (0..=tracks).map(|_| Variable::new()).collect(),
            refs: (0..tracks).map(|_| Variable::new()).collect(),
        }
    }
}

struct BoxVars {
    xmin: Variable,
    ymin: Variable,
    xmax: Variable,
    ymax: Variable,
}

fn build_and_solve(
    diagram: &Diagram,
    grid: &TrackGrid,
    routes: &[Route],
    optimized: &Optimized,
    relaxed: bool,
) -> Result<Coordinates, String> {
    let mut solver = Solver::new();
    let mut add = |constraint: cassowary::Constraint| -> Result<(), String> {
        solver
            .add_constraint(constraint)
            .map_err(|err| format!("{err:?}"))
    };

    let rows = AxisVars::new(grid.track_rows);
    let cols = AxisVars::new(grid.track_cols);
    let width = Variable::new();
    let height = Variable::new();

    let pads = diagram_paddings(diagram);

    // Band chains: boundary lines and references are ordered; the
    // first boundary starts at the drawing padding.
    for axis in [&rows, &cols] {
        for track in 0..axis.refs.len() {
            add(axis.lines[track] | LE(REQUIRED) | axis.refs[track])?;
            add(axis.refs[track] | LE(REQUIRED) | axis.lines[track + 1])?;
            add((axis.refs[track] * 2.0) | EQ(WEAK) | (axis.lines[track] + axis.lines[track + 1]))?;
        }
    }
    add(rows.lines[0] | GE(REQUIRED) | pads.top)?;
    add(cols.lines[0] | GE(REQUIRED) | pads.left)?;
    add(rows.lines[0] | EQ(WEAK) | pads.top)?;
    add(cols.lines[0] | EQ(WEAK) | pads.left)?;

    // Lane bundles: wires of one track sit at fixed offsets around the
    // band reference, spaced by the connection distance plus the wire
    // widths and any label room, and the band must be wide enough to
    // hold the whole bundle.
    let distance = diagram.attrs.connection_distance;
    let offsets = lane_offsets(optimized, distance);
    let mut bundle_extents: IndexMap<(Orientation, usize), (f64, f64)> = IndexMap::new();
    for (index, wire) in optimized.wires.iter().enumerate() {
        let before = wire.width / 2.0 + wire.before_extra;
        let after = wire.width / 2.0;
        let entry = bundle_extents
            .entry((wire.orientation, wire.track))
            .or_insert((0.0f64, 0.0f64));
        entry.0 = entry.0.max(before - offsets[index]);
        entry.1 = entry.1.max(offsets[index] + after);
    }
    for (&(orientation, track), &(before, after)) in &bundle_extents {
        let axis = match orientation {
            Orientation::Horizontal => &rows,
            Orientation::Vertical => &cols,
        };
        add((axis.refs[track] - axis.lines[track]) | GE(REQUIRED) | (before + distance))?;
        add((axis.lines[track + 1] - axis.refs[track]) | GE(REQUIRED) | (after + distance))?;
    }

    // Block boxes.
    let boxes: Vec<BoxVars> = diagram
        .blocks
        .iter()
        .map(|_| BoxVars {
            xmin: Variable::new(),
            ymin: Variable::new(),
            xmax: Variable::new(),
            ymax: Variable::new(),
        })
        .collect();
    for (index, block) in diagram.blocks.iter().enumerate() {
        let span = grid.block_span(index);
        let vars = &boxes[index];
        let attrs = effective_attrs(&block.attrs, relaxed);
        let half_w = attrs.min_width / 2.0;
        let half_h = attrs.min_height / 2.0;

        // The box brackets the reference lines of its cover.
        add((rows.refs[span.top] - vars.ymin) | GE(REQUIRED) | half_h)?;
        add((vars.ymax - rows.refs[span.bottom]) | GE(REQUIRED) | half_h)?;
        add((cols.refs[span.left] - vars.xmin) | GE(REQUIRED) | half_w)?;
        add((vars.xmax - cols.refs[span.right]) | GE(REQUIRED) | half_w)?;
        add((rows.refs[span.top] - vars.ymin) | EQ(WEAK) | half_h)?;
        add((vars.ymax - rows.refs[span.bottom]) | EQ(WEAK) | half_h)?;
        add((cols.refs[span.left] - vars.xmin) | EQ(WEAK) | half_w)?;
        add((vars.xmax - cols.refs[span.right]) | EQ(WEAK) | half_w)?;

        // Margins from the band boundaries, grown by arrow heads and
        // terminal labels on that side.
        let margin = |side: Side| side_margin(diagram, optimized, routes, index, side, &attrs);
        add((vars.ymin - rows.lines[span.top]) | GE(REQUIRED) | margin(Side::Top))?;
        add((rows.lines[span.bottom + 1] - vars.ymax) | GE(REQUIRED) | margin(Side::Bottom))?;
        add((vars.xmin - cols.lines[span.left]) | GE(REQUIRED) | margin(Side::Left))?;
        add((cols.lines[span.right + 1] - vars.xmax) | GE(REQUIRED) | margin(Side::Right))?;

        // Minimum size, including room for the label.
        let (need_w, need_h) = block_size_needs(block, &attrs);
        add((vars.xmax - vars.xmin) | GE(REQUIRED) | need_w)?;
        add((vars.ymax - vars.ymin) | GE(REQUIRED) | need_h)?;

        // The box must reach every attached wire, with clearance.
        for side in Side::ALL {
            for attachment in optimized.attachments_on(index, side) {
                let route = &routes[attachment.route];
                let conn = &diagram.connections[route.connection];
                let segment_index = if attachment.out {
                    0
                } else {
                    route.segments.len() - 1
                };
                let wire_index = optimized.segment_wires[attachment.route][segment_index];
                let wire = &optimized.wires[wire_index];
                let clearance = conn.attrs.wire_width() / 2.0 + distance;
                let offset = offsets[wire_index];
                match wire.orientation {
                    Orientation::Horizontal => {
                        let lane_ref = rows.refs[wire.track];
                        add((lane_ref - vars.ymin) | GE(REQUIRED) | (clearance - offset))?;
                        add((vars.ymax - lane_ref) | GE(REQUIRED) | (clearance + offset))?;
                    }
                    Orientation::Vertical => {
                        let lane_ref = cols.refs[wire.track];
                        add((lane_ref - vars.xmin) | GE(REQUIRED) | (clearance - offset))?;
                        add((vars.xmax - lane_ref) | GE(REQUIRED) | (clearance + offset))?;
                    }
                }
            }
        }
    }

    // Drawing extents: fit the content plus padding, respect the
    // requested minimum size, stay as small as possible and keep the
    // content centred in any slack.
    let diagram_min = if relaxed {
        let defaults = crate::attributes::DiagramAttributes::default();
        (defaults.min_width, defaults.min_height)
    } else {
        (diagram.attrs.min_width, diagram.attrs.min_height)
    };
    add(width | GE(REQUIRED) | (cols.lines[grid.track_cols] + pads.right))?;
    add(height | GE(REQUIRED) | (rows.lines[grid.track_rows] + pads.bottom))?;
    add(width | GE(REQUIRED) | diagram_min.0)?;
    add(height | GE(REQUIRED) | diagram_min.1)?;
    add(width | EQ(WEAK) | 0.0)?;
    add(height | EQ(WEAK) | 0.0)?;
    add(
        (cols.lines[0] + cols.lines[grid.track_cols]) | EQ(WEAK) | (width + pads.left - pads.right),
    )?;
    add(
        (rows.lines[0] + rows.lines[grid.track_rows]) | EQ(WEAK) | (height + pads.top - pads.bottom),
    )?;

    // One batch solve; read everything back.
    let mut values: HashMap<Variable, f64> = HashMap::new();
    for &(variable, value) in solver.fetch_changes() {
        values.insert(variable, value);
    }
    let value = |variable: Variable| values.get(&variable).copied().unwrap_or(0.0);

    let row_lines: Vec<f64> = rows.lines.iter().map(|&v| value(v)).collect();
    let col_lines: Vec<f64> = cols.lines.iter().map(|&v| value(v)).collect();
    let wire_lines: Vec<f64> = optimized
        .wires
        .iter()
        .enumerate()
        .map(|(index, wire)| {
            let axis = match wire.orientation {
                Orientation::Horizontal => &rows,
                Orientation::Vertical => &cols,
            };
            value(axis.refs[wire.track]) + offsets[index]
        })
        .collect();
    let box_rects: Vec<Rect> = boxes
        .iter()
        .map(|vars| Rect {
            xmin: value(vars.xmin),
            ymin: value(vars.ymin),
            xmax: value(vars.xmax),
            ymax: value(vars.ymax),
        })
        .collect();

    let polylines = routes
        .iter()
        .enumerate()
        .map(|(index, route)| {
            polyline(
                diagram,
                optimized,
                route,
                index,
                &wire_lines,
                &box_rects,
            )
        })
        .collect();

    Ok(Coordinates {
        width: value(width),
        height: value(height),
        boxes: box_rects,
        wire_lines,
        polylines,
        row_lines,
        col_lines,
    })
}

struct Paddings {
    top: f64,
    bottom: f64,
    left: f64,
    right: f64,
}

/// Drawing padding: the configured padding plus the diagram border and
/// room for the diagram label on its side.
fn diagram_paddings(diagram: &Diagram) -> Paddings {
    let attrs = &diagram.attrs;
    let mut pads = Paddings {
        top: attrs.padding_top + attrs.stroke_width,
        bottom: attrs.padding_bottom + attrs.stroke_width,
        left: attrs.padding_left + attrs.stroke_width,
        right: attrs.padding_right + attrs.stroke_width,
    };
    if let Some(label) = &attrs.label {
        let vertical = attrs.text.text_orientation == TextOrientation::Vertical;
        let (w, h) = text_metrics::measure_text(
            label,
            attrs.text.font_size,
            &attrs.text.font_family,
            attrs.text.text_line_height,
        );
        let (_, extent_v) = if vertical { (h, w) } else { (w, h) };
        if attrs.label_position.is_top() {
            pads.top += extent_v + attrs.label_distance;
        } else if attrs.label_position.is_bottom() {
            pads.bottom += extent_v + attrs.label_distance;
        }
    }
    pads
}

/// Lane offsets relative to the band reference. Wires sharing a slot
/// share one line; slots stack around the reference, each spaced from
/// the previous by the connection distance plus the half-widths and any
/// label room of the widest wires involved.
fn lane_offsets(optimized: &Optimized, distance: f64) -> Vec<f64> {
    let mut per_track: HashMap<(Orientation, usize), Vec<usize>> = HashMap::new();
    for (index, wire) in optimized.wires.iter().enumerate() {
        per_track
            .entry((wire.orientation, wire.track))
            .or_default()
            .push(index);
    }
    let mut offsets = vec![0.0f64; optimized.wires.len()];
    for (_, members) in per_track {
        let slot_count = members
            .iter()
            .map(|&index| optimized.wires[index].slot)
            .max()
            .unwrap_or(0)
            + 1;
        let mut before = vec![0.0f64; slot_count];
        let mut after = vec![0.0f64; slot_count];
        for &index in &members {
            let wire = &optimized.wires[index];
            before[wire.slot] = before[wire.slot].max(wire.width / 2.0 + wire.before_extra);
            after[wire.slot] = after[wire.slot].max(wire.width / 2.0);
        }
        let mut positions = Vec::with_capacity(slot_count);
        let mut cursor = 0.0f64;
        for slot in 0..slot_count {
            if slot > 0 {
                cursor += after[slot - 1] + distance + before[slot];
            }
            positions.push(cursor);
        }
        let shift = positions.last().copied().unwrap_or(0.0) / 2.0;
        for &index in &members {
            offsets[index] = positions[optimized.wires[index].slot] - shift;
        }
    }
    offsets
}

fn effective_attrs(attrs: &BlockAttributes, relaxed: bool) -> BlockAttributes {
    let mut attrs = attrs.clone();
    if relaxed {
        let defaults = BlockAttributes::default();
        attrs.min_width = defaults.min_width;
        attrs.min_height = defaults.min_height;
        attrs.margin_top = attrs.margin_top.min(defaults.margin_top);
        attrs.margin_bottom = attrs.margin_bottom.min(defaults.margin_bottom);
        attrs.margin_left = attrs.margin_left.min(defaults.margin_left);
        attrs.margin_right = attrs.margin_right.min(defaults.margin_right);
    }
    attrs
}

/// Margin of one block side: the configured margin, grown to make room
/// for arrow heads and start/end labels of the attached connections.
fn side_margin(
    diagram: &Diagram,
    optimized: &Optimized,
    routes: &[Route],
    block: usize,
    side: Side,
    attrs: &BlockAttributes,
) -> f64 {
    let mut margin = match side {
        Side::Top => attrs.margin_top,
        Side::Bottom => attrs.margin_bottom,
        Side::Left => attrs.margin_left,
        Side::Right => attrs.margin_right,
    };
    for attachment in optimized.attachments_on(block, side) {
        let conn = &diagram.connections[routes[attachment.route].connection];
        let has_arrow = if attachment.out {
            conn.attrs.arrow_back
        } else {
            conn.attrs.arrow_forward
        };
        if has_arrow {
            margin = margin.max(conn.attrs.arrow_length() + conn.attrs.stroke_width / 2.0);
        }
        let label = if attachment.out {
            &conn.start_label
        } else {
            &conn.end_label
        };
        if let Some(label) = label {
            // The label sits between the box edge and the band line,
            // along the terminal segment.
            let orientation = match side {
                Side::Left | Side::Right => Orientation::Horizontal,
                Side::Top | Side::Bottom => Orientation::Vertical,
            };
            let (along, _) = label_size(label, orientation);
            margin = margin.max(along + 2.0 * label.distance);
        }
    }
    margin
}

/// Minimum drawn size of a block: the configured minimum or the label
/// with its clearance, whichever is larger.
fn block_size_needs(block: &crate::diagram::Block, attrs: &BlockAttributes) -> (f64, f64) {
    let mut need_w = attrs.min_width;
    let mut need_h = attrs.min_height;
    if let Some(text) = block.effective_label() {
        let (w, h) = text_metrics::measure_text(
            text,
            attrs.text.font_size,
            &attrs.text.font_family,
            attrs.text.text_line_height,
        );
        let (w, h) = if attrs.text.text_orientation == TextOrientation::Vertical {
            (h, w)
        } else {
            (w, h)
        };
        let sides = 2.0 * (attrs.stroke_width + attrs.label_distance);
        need_w = need_w.max(w + sides);
        need_h = need_h.max(h + sides);
    }
    (need_w, need_h)
}

/// Joint coordinates of one route. Joints between segments take one
/// coordinate from each neighbouring lane; the terminal points sit on
/// the block edges.
fn polyline(
    diagram: &Diagram,
    optimized: &Optimized,
    route: &Route,
    route_index: usize,
    wire_lines: &[f64],
    boxes: &[Rect],
) -> Vec<(f64, f64)> {
    let conn = &diagram.connections[route.connection];
    let lane = |segment_index: usize| wire_lines[optimized.segment_wires[route_index][segment_index]];
    let count = route.segments.len();
    let mut points = Vec::with_capacity(count + 1);

    let start_box = &boxes[conn.start.block];
    let exit = route.exit_side();
    match route.segments[0].orientation {
        Orientation::Horizontal => points.push((start_box.edge(exit), lane(0))),
        Orientation::Vertical => points.push((lane(0), start_box.edge(exit))),
    }

    for index in 0..count - 1 {
        let point = match route.segments[index].orientation {
            Orientation::Horizontal => (lane(index + 1), lane(index)),
            Orientation::Vertical => (lane(index), lane(index + 1)),
        };
        points.push(point);
    }

    let end_box = &boxes[conn.end.block];
    let entry = route.entry_side();
    match route.segments[count - 1].orientation {
        Orientation::Horizontal => points.push((end_box.edge(entry), lane(count - 1))),
        Orientation::Vertical => points.push((lane(count - 1), end_box.edge(entry))),
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::tests::diagram_from_yaml;
    use crate::layout::optimize::optimize;
    use crate::layout::route::route_connections;

    fn solved(yaml: &str) -> (crate::diagram::Diagram, Optimized, Coordinates) {
        let diagram = diagram_from_yaml(yaml).unwrap();
        let grid = TrackGrid::new(&diagram, 3);
        let routes = route_connections(&diagram, &grid).unwrap();
        let optimized = optimize(&diagram, &routes);
        let coords = solve(&diagram, &grid, &routes, &optimized).unwrap();
        (diagram, optimized, coords)
    }

    #[test]
    fn boxes_meet_minimum_sizes_and_margins() {
        let (diagram, _, coords) = solved(
            "rows:\n  - [a, b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n",
        );
        for (index, block) in diagram.blocks.iter().enumerate() {
            let rect = &coords.boxes[index];
            assert!(rect.width() >= block.attrs.min_width - 1e-6);
            assert!(rect.height() >= block.attrs.min_height - 1e-6);
        }
        // Boxes of neighbouring cells do not overlap: the margins keep
        // them apart by at least the two margins.
        let a = &coords.boxes[diagram.block_by_name("a").unwrap()];
        let b = &coords.boxes[diagram.block_by_name("b").unwrap()];
        assert!(b.xmin - a.xmax >= 2.0 * 24.0 - 1e-6);
    }

    #[test]
    fn drawing_respects_minimum_size() {
        let (diagram, _, coords) = solved("rows:\n  - [a]\nblocks:\n  - name: a\n");
        assert!(coords.width >= diagram.attrs.min_width - 1e-6);
        assert!(coords.height >= diagram.attrs.min_height - 1e-6);
    }

    #[test]
    fn polylines_are_orthogonal_and_touch_the_boxes() {
        let (diagram, _, coords) = solved(
            "rows:\n  - [a]\n  - [~, b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n",
        );
        let line = &coords.polylines[0];
        assert!(line.len() >= 2);
        for pair in line.windows(2) {
            let dx = (pair[0].0 - pair[1].0).abs();
            let dy = (pair[0].1 - pair[1].1).abs();
            assert!(dx < 1e-6 || dy < 1e-6);
        }
        let a = &coords.boxes[diagram.block_by_name("a").unwrap()];
        let first = line[0];
        let on_edge = (first.1 - a.ymax).abs() < 1e-6
            || (first.1 - a.ymin).abs() < 1e-6
            || (first.0 - a.xmin).abs() < 1e-6
            || (first.0 - a.xmax).abs() < 1e-6;
        assert!(on_edge);
    }

    #[test]
    fn overlapping_lanes_keep_their_distance() {
        let (diagram, optimized, coords) = solved(
            "rows:\n  - [a, ~, b]\n  - [c, ~, d]\nblocks:\n  - name: a\n  - name: b\n  - name: c\n  - name: d\nconnections:\n  - start: a\n    end: b\n  - start: a\n    end: b\n",
        );
        let distance = diagram.attrs.connection_distance;
        for (index, wire) in optimized.wires.iter().enumerate() {
            for (other_index, other) in optimized.wires.iter().enumerate().skip(index + 1) {
                if wire.orientation == other.orientation
                    && wire.track == other.track
                    && wire.lo <= other.hi
                    && other.lo <= wire.hi
                {
                    let gap = (coords.wire_lines[index] - coords.wire_lines[other_index]).abs();
                    let needed =
                        distance + wire.width / 2.0 + other.width / 2.0;
                    assert!(gap >= needed - 1e-6);
                }
            }
        }
    }
}
