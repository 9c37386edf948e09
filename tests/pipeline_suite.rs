//! Full-pipeline scenarios: definition text in, routed and sized
//! geometry out, checked against the behaviour the engine guarantees.

use orthogram::diagram::{diagram_from_str, Diagram};
use orthogram::layout::{compute_layout, Layout, LayoutOptions, Orientation};
use orthogram::render::render_svg;

fn layed_out(yaml: &str) -> (Diagram, Layout) {
    let diagram = diagram_from_str(yaml).expect("diagram should build");
    let layout = compute_layout(&diagram, &LayoutOptions::default()).expect("layout should solve");
    (diagram, layout)
}

fn assert_orthogonal(points: &[(f64, f64)]) {
    assert!(points.len() >= 2);
    for pair in points.windows(2) {
        let dx = (pair[0].0 - pair[1].0).abs();
        let dy = (pair[0].1 - pair[1].1).abs();
        assert!(
            dx < 1e-6 || dy < 1e-6,
            "non-orthogonal step {:?} -> {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn minimal_diagram_routes_one_l_shape() {
    let (diagram, layout) = layed_out(
        "rows:
  - [a]
  - [~, b]
blocks:
  - name: a
  - name: b
connections:
  - start: a
    end: b
",
    );
    assert_eq!(layout.routes.len(), 1);
    let route = &layout.routes[0];
    // One bend, each leg crossing exactly one logical cell unit.
    assert_eq!(route.segments.len(), 2);
    for segment in &route.segments {
        assert_eq!(segment.len(), 3);
    }
    assert_orthogonal(&layout.coords.polylines[0]);

    // The blocks sit diagonally: a fully above and left of b.
    let a = &layout.coords.boxes[diagram.block_by_name("a").unwrap()];
    let b = &layout.coords.boxes[diagram.block_by_name("b").unwrap()];
    assert!(a.xmax < b.xmin);
    assert!(a.ymax < b.ymin);
}

#[test]
fn frame_block_is_drawn_first_and_spans_its_cover() {
    let (diagram, layout) = layed_out(
        "rows:
  - [a, b]
blocks:
  - name: frame
    tags: [a, b]
    drawing_priority: -1
  - name: a
  - name: b
",
    );
    let frame = diagram.block_by_name("frame").unwrap();
    let a = diagram.block_by_name("a").unwrap();
    let b = diagram.block_by_name("b").unwrap();
    // Definition order is draw order; the frame comes first.
    assert!(frame < a && a < b);

    let frame_rect = &layout.coords.boxes[frame];
    let a_rect = &layout.coords.boxes[a];
    let b_rect = &layout.coords.boxes[b];
    assert!(frame_rect.xmin <= a_rect.xmin + 1e-6);
    assert!(frame_rect.xmax >= b_rect.xmax - 1e-6);
    assert!(frame_rect.xmax > a_rect.xmax);
    assert!(frame_rect.xmin < b_rect.xmin);
    assert!(frame_rect.ymin <= a_rect.ymin + 1e-6);
    assert!(frame_rect.ymax >= a_rect.ymax - 1e-6);
}

#[test]
fn opaque_block_forces_a_two_bend_detour_to_the_north() {
    let (diagram, layout) = layed_out(
        "rows:
  - [a, x, b]
blocks:
  - name: a
  - name: x
  - name: b
connections:
  - start: a
    end: b
",
    );
    let route = &layout.routes[0];
    assert_eq!(route.segments.len(), 3);
    let x = &layout.coords.boxes[diagram.block_by_name("x").unwrap()];
    // The long leg runs through the channel above x.
    let polyline = &layout.coords.polylines[0];
    let min_y = polyline.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    assert!(min_y < x.ymin);
    assert_orthogonal(polyline);
}

#[test]
fn overlapping_connections_keep_their_distance() {
    let (diagram, layout) = layed_out(
        "rows:
  - [a, ~, ~, b]
blocks:
  - name: a
  - name: b
connections:
  - start: a
    end: b
  - start: a
    end: b
",
    );
    // Straight parallel runs on the same row must sit on distinct
    // lanes, at least connection_distance plus the stroke widths apart.
    let first = &layout.coords.polylines[0];
    let second = &layout.coords.polylines[1];
    let gap = (first[0].1 - second[0].1).abs();
    let strokes = diagram.connections[0].attrs.stroke_width / 2.0
        + diagram.connections[1].attrs.stroke_width / 2.0;
    assert!(gap >= diagram.attrs.connection_distance + strokes - 1e-6);
}

#[test]
fn collapsed_group_shares_one_trunk_with_three_arrowheads() {
    let yaml = "diagram:
  collapse_connections: true
rows:
  - [a, ~, ~, ~]
  - [b, ~, ~, d]
  - [c, ~, ~, ~]
blocks:
  - name: a
  - name: b
  - name: c
  - name: d
connections:
  - start: a
    end: d
    group: water
    entrances: [left]
  - start: b
    end: d
    group: water
    entrances: [left]
  - start: c
    end: d
    group: water
    entrances: [left]
";
    let (diagram, layout) = layed_out(yaml);
    // Every route approaches d with a horizontal run on d's row; the
    // collapsed group merges those runs into one wire on one lane.
    let mut trunk_wires = Vec::new();
    for (route_index, route) in layout.routes.iter().enumerate() {
        let last = route.segments.len() - 1;
        assert_eq!(route.segments[last].orientation, Orientation::Horizontal);
        trunk_wires.push(layout.optimized.segment_wires[route_index][last]);
    }
    assert_eq!(trunk_wires[0], trunk_wires[1]);
    assert_eq!(trunk_wires[1], trunk_wires[2]);

    // One drawn line: all three final legs share the same y.
    let y_of_last = |route_index: usize| {
        let polyline = &layout.coords.polylines[route_index];
        polyline[polyline.len() - 1].1
    };
    assert!((y_of_last(0) - y_of_last(1)).abs() < 1e-6);
    assert!((y_of_last(1) - y_of_last(2)).abs() < 1e-6);

    // Three arrowheads reach d's left edge.
    let svg = render_svg(&diagram, &layout);
    let arrowheads = svg.matches(" z\" fill=").count();
    assert_eq!(arrowheads, 3);
}

#[test]
fn exit_and_entrance_constraints_shape_the_route() {
    let (_, layout) = layed_out(
        "rows:
  - [a, ~]
  - [~, b]
blocks:
  - name: a
  - name: b
connections:
  - start: a
    end: b
    exits: [right]
    entrances: [left]
",
    );
    let route = &layout.routes[0];
    assert_eq!(route.exit_side(), orthogram::attributes::Side::Right);
    assert_eq!(route.entry_side(), orthogram::attributes::Side::Left);
    assert_eq!(route.segments.len(), 3);
}

#[test]
fn identical_input_renders_byte_identical_output() {
    let yaml = "rows:
  - [a, ~, b]
  - [c, d, ~]
blocks:
  - name: a
  - name: b
  - name: c
  - name: d
connections:
  - start: a
    end: d
  - start: c
    end: b
  - start: a
    end: b
    group: g
  - start: c
    end: d
    group: g
";
    let (diagram_one, layout_one) = layed_out(yaml);
    let (diagram_two, layout_two) = layed_out(yaml);
    assert_eq!(
        render_svg(&diagram_one, &layout_one),
        render_svg(&diagram_two, &layout_two)
    );
}

#[test]
fn renaming_a_block_keeps_the_geometry() {
    let original = "rows:
  - [a, ~, b]
blocks:
  - name: a
    label: Source
  - name: b
    label: Sink
connections:
  - start: a
    end: b
";
    let renamed = "rows:
  - [left_pump, ~, right_pump]
blocks:
  - name: left_pump
    label: Source
  - name: right_pump
    label: Sink
connections:
  - start: left_pump
    end: right_pump
";
    let (_, layout_one) = layed_out(original);
    let (_, layout_two) = layed_out(renamed);
    assert_eq!(layout_one.coords.boxes.len(), layout_two.coords.boxes.len());
    for (one, two) in layout_one
        .coords
        .boxes
        .iter()
        .zip(&layout_two.coords.boxes)
    {
        assert!((one.xmin - two.xmin).abs() < 1e-6);
        assert!((one.ymax - two.ymax).abs() < 1e-6);
    }
    assert_eq!(layout_one.coords.polylines, layout_two.coords.polylines);
}

#[test]
fn moving_a_connection_to_the_end_keeps_other_routes() {
    let before = "rows:
  - [a, ~, b]
  - [c, ~, d]
blocks:
  - name: a
  - name: b
  - name: c
  - name: d
connections:
  - start: a
    end: b
  - start: a
    end: d
  - start: c
    end: d
";
    let after = "rows:
  - [a, ~, b]
  - [c, ~, d]
blocks:
  - name: a
  - name: b
  - name: c
  - name: d
connections:
  - start: a
    end: b
  - start: c
    end: d
  - start: a
    end: d
";
    let (_, layout_before) = layed_out(before);
    let (_, layout_after) = layed_out(after);
    // a->b kept index 0; c->d moved from 2 to 1; their paths agree.
    assert_eq!(layout_before.routes[0].points, layout_after.routes[0].points);
    assert_eq!(layout_before.routes[2].points, layout_after.routes[1].points);
}

#[test]
fn scale_multiplies_the_rendered_size_only() {
    let base = "rows:
  - [a, b]
blocks:
  - name: a
  - name: b
connections:
  - start: a
    end: b
";
    let scaled = format!("diagram:\n  scale: 3\n{base}");
    let (diagram_one, layout_one) = layed_out(base);
    let (diagram_two, layout_two) = layed_out(&scaled);
    // Same solved geometry, three times the canvas.
    assert_eq!(layout_one.coords.polylines, layout_two.coords.polylines);
    let svg_one = render_svg(&diagram_one, &layout_one);
    let svg_two = render_svg(&diagram_two, &layout_two);
    let width_of = |svg: &str| {
        let start = svg.find("width=\"").unwrap() + 7;
        let end = svg[start..].find('"').unwrap() + start;
        svg[start..end].parse::<f64>().unwrap()
    };
    assert!((width_of(&svg_two) - 3.0 * width_of(&svg_one)).abs() < 1e-6);
}

#[test]
fn autoblocks_cover_leftover_tags_and_route_like_named_blocks() {
    let (diagram, layout) = layed_out(
        "rows:
  - [pump, ~, tank]
blocks:
  - name: pump
connections:
  - start: pump
    end: tank
",
    );
    let tank = diagram.block_by_name("tank").unwrap();
    assert!(diagram.blocks[tank].is_auto);
    assert_eq!(layout.routes.len(), 1);
    // Autoblocks draw before explicit blocks.
    assert!(tank < diagram.block_by_name("pump").unwrap());
}

#[test]
fn finer_subdivision_produces_the_same_topology() {
    let yaml = "rows:
  - [a, x, b]
blocks:
  - name: a
  - name: x
  - name: b
connections:
  - start: a
    end: b
";
    let diagram = diagram_from_str(yaml).unwrap();
    let coarse = compute_layout(&diagram, &LayoutOptions { tracks_per_band: 3 }).unwrap();
    let fine = compute_layout(&diagram, &LayoutOptions { tracks_per_band: 5 }).unwrap();
    // Same detour shape regardless of the subdivision.
    assert_eq!(coarse.routes[0].segments.len(), fine.routes[0].segments.len());
    assert_orthogonal(&fine.coords.polylines[0]);
}

#[test]
fn pass_through_admits_straight_crossing() {
    let (diagram, layout) = layed_out(
        "rows:
  - [a, bus, b]
blocks:
  - name: a
  - name: bus
    pass_through: true
  - name: b
connections:
  - start: a
    end: b
",
    );
    let route = &layout.routes[0];
    assert_eq!(route.segments.len(), 1);
    let bus = &layout.coords.boxes[diagram.block_by_name("bus").unwrap()];
    let y = layout.coords.polylines[0][0].1;
    assert!(y > bus.ymin && y < bus.ymax);
}
