//! Post-routing optimization: routes are regrouped so that members of
//! a connection group stay contiguous, same-group collinear overlaps
//! are collapsed into shared wire segments, and every wire segment on
//! an axis line receives an offset slot so that overlapping parallel
//! runs never coincide.

use indexmap::IndexMap;

use crate::attributes::Side;
use crate::diagram::Diagram;

use super::labels::{label_size, middle_segment_index};
use super::route::Route;
use super::Orientation;

/// A drawable straight run on one axis line. Without collapsing every
/// route segment becomes its own wire segment; collapsing merges
/// overlapping same-group runs into one.
#[derive(Debug, Clone)]
pub struct WireSegment {
    pub orientation: Orientation,
    pub track: usize,
    pub lo: usize,
    pub hi: usize,
    /// Offset slot within the track; distinct for overlapping wires.
    pub slot: usize,
    /// Owning `(route, segment)` pairs, in drawing order.
    pub members: Vec<(usize, usize)>,
    /// Widest member wire (stroke plus buffer on both sides).
    pub width: f64,
    /// Room reserved beside the line for middle labels.
    pub before_extra: f64,
}

impl WireSegment {
    fn overlaps(&self, other: &WireSegment) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }
}

/// Connection group as drawn: members in definition order, the group
/// anchored at its first appearance.
#[derive(Debug, Clone)]
pub struct DrawGroup {
    pub name: Option<String>,
    pub priority: i32,
    pub routes: Vec<usize>,
}

/// Terminal segment attached to a block border.
#[derive(Debug, Clone, Copy)]
pub struct Attachment {
    pub block: usize,
    pub side: Side,
    pub route: usize,
    pub out: bool,
}

#[derive(Debug, Clone)]
pub struct Optimized {
    pub groups: Vec<DrawGroup>,
    pub wires: Vec<WireSegment>,
    /// Wire index of every route segment.
    pub segment_wires: Vec<Vec<usize>>,
    pub attachments: Vec<Attachment>,
}

impl Optimized {
    /// Group indices in render order: effective drawing priority
    /// ascending, first appearance breaking ties.
    pub fn group_draw_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.groups.len()).collect();
        order.sort_by_key(|&index| self.groups[index].priority);
        order
    }

    /// Attachments of one block side.
    pub fn attachments_on(&self, block: usize, side: Side) -> impl Iterator<Item = &Attachment> {
        self.attachments
            .iter()
            .filter(move |attachment| attachment.block == block && attachment.side == side)
    }
}

pub fn optimize(diagram: &Diagram, routes: &[Route]) -> Optimized {
    let groups = make_groups(diagram, routes);
    let (mut wires, segment_wires) = make_wires(diagram, routes, &groups);
    assign_slots(&mut wires);
    let attachments = make_attachments(diagram, routes);
    Optimized {
        groups,
        wires,
        segment_wires,
        attachments,
    }
}

/// Group routes by connection group, anchored at the first appearance;
/// ungrouped connections form groups of one. The effective priority of
/// a group is the highest priority among its members.
fn make_groups(diagram: &Diagram, routes: &[Route]) -> Vec<DrawGroup> {
    #[derive(PartialEq, Eq, Hash)]
    enum Key {
        Named(String),
        Solo(usize),
    }
    let mut buckets: IndexMap<Key, Vec<usize>> = IndexMap::new();
    for (index, route) in routes.iter().enumerate() {
        let key = match &diagram.connections[route.connection].group {
            Some(name) => Key::Named(name.clone()),
            None => Key::Solo(index),
        };
        buckets.entry(key).or_default().push(index);
    }
    buckets
        .into_iter()
        .map(|(key, members)| {
            let priority = members
                .iter()
                .map(|&route| diagram.connections[routes[route].connection].attrs.drawing_priority)
                .max()
                .unwrap_or(0);
            DrawGroup {
                name: match key {
                    Key::Named(name) => Some(name),
                    Key::Solo(_) => None,
                },
                priority,
                routes: members,
            }
        })
        .collect()
}

fn make_wires(
    diagram: &Diagram,
    routes: &[Route],
    groups: &[DrawGroup],
) -> (Vec<WireSegment>, Vec<Vec<usize>>) {
    let collapse = diagram.attrs.collapse_connections;
    let mut wires: Vec<WireSegment> = Vec::new();
    let mut segment_wires: Vec<Vec<usize>> = routes
        .iter()
        .map(|route| vec![usize::MAX; route.segments.len()])
        .collect();

    for group in groups {
        if collapse && group.name.is_some() && group.routes.len() > 1 {
            // Bucket the group's segments per axis line and merge the
            // overlapping ones into single wire segments.
            let mut per_axis: IndexMap<(Orientation, usize), Vec<(usize, usize)>> =
                IndexMap::new();
            for &route_index in &group.routes {
                for (segment_index, segment) in routes[route_index].segments.iter().enumerate() {
                    per_axis
                        .entry((segment.orientation, segment.track))
                        .or_default()
                        .push((route_index, segment_index));
                }
            }
            for ((orientation, track), mut members) in per_axis {
                members.sort_by_key(|&(route_index, segment_index)| {
                    let segment = &routes[route_index].segments[segment_index];
                    (segment.lo(), segment.hi(), route_index, segment_index)
                });
                let mut current: Option<WireSegment> = None;
                for (route_index, segment_index) in members {
                    let segment = &routes[route_index].segments[segment_index];
                    if let Some(wire) = current.as_mut() {
                        if segment.lo() <= wire.hi {
                            wire.hi = wire.hi.max(segment.hi());
                            wire.members.push((route_index, segment_index));
                            continue;
                        }
                    }
                    if let Some(done) = current.take() {
                        push_wire(done, &mut wires, &mut segment_wires);
                    }
                    current = Some(WireSegment {
                        orientation,
                        track,
                        lo: segment.lo(),
                        hi: segment.hi(),
                        slot: 0,
                        members: vec![(route_index, segment_index)],
                        width: 0.0,
                        before_extra: 0.0,
                    });
                }
                if let Some(done) = current.take() {
                    push_wire(done, &mut wires, &mut segment_wires);
                }
            }
        } else {
            for &route_index in &group.routes {
                for (segment_index, segment) in routes[route_index].segments.iter().enumerate() {
                    let wire = WireSegment {
                        orientation: segment.orientation,
                        track: segment.track,
                        lo: segment.lo(),
                        hi: segment.hi(),
                        slot: 0,
                        members: vec![(route_index, segment_index)],
                        width: 0.0,
                        before_extra: 0.0,
                    };
                    push_wire(wire, &mut wires, &mut segment_wires);
                }
            }
        }
    }

    for wire in &mut wires {
        let mut width = 0.0f64;
        let mut before_extra = 0.0f64;
        for &(route_index, segment_index) in &wire.members {
            let route = &routes[route_index];
            let conn = &diagram.connections[route.connection];
            width = width.max(conn.attrs.wire_width());
            if segment_index == middle_segment_index(route) {
                if let Some(label) = &conn.middle_label {
                    let (_, perp) = label_size(label, wire.orientation);
                    before_extra = before_extra.max(perp + label.distance);
                }
            }
        }
        wire.width = width;
        wire.before_extra = before_extra;
    }

    (wires, segment_wires)
}

fn push_wire(
    wire: WireSegment,
    wires: &mut Vec<WireSegment>,
    segment_wires: &mut [Vec<usize>],
) {
    let index = wires.len();
    for &(route_index, segment_index) in &wire.members {
        segment_wires[route_index][segment_index] = index;
    }
    wires.push(wire);
}

/// Interval colouring per axis line: sweep the wire segments from the
/// lowest start coordinate and give each the smallest slot not taken by
/// an overlapping neighbour. The sweep order is stable under the
/// connection order, so slot assignments survive unrelated edits.
fn assign_slots(wires: &mut [WireSegment]) {
    let mut per_axis: IndexMap<(Orientation, usize), Vec<usize>> = IndexMap::new();
    for (index, wire) in wires.iter().enumerate() {
        per_axis
            .entry((wire.orientation, wire.track))
            .or_default()
            .push(index);
    }
    for (_, mut members) in per_axis {
        members.sort_by_key(|&index| (wires[index].lo, wires[index].hi, index));
        for position in 0..members.len() {
            let index = members[position];
            let mut taken: Vec<usize> = Vec::new();
            for &other_index in &members[..position] {
                if wires[index].overlaps(&wires[other_index]) {
                    taken.push(wires[other_index].slot);
                }
            }
            let mut slot = 0;
            while taken.contains(&slot) {
                slot += 1;
            }
            wires[index].slot = slot;
        }
    }
}

fn make_attachments(diagram: &Diagram, routes: &[Route]) -> Vec<Attachment> {
    let mut attachments = Vec::with_capacity(routes.len() * 2);
    for (index, route) in routes.iter().enumerate() {
        let conn = &diagram.connections[route.connection];
        attachments.push(Attachment {
            block: conn.start.block,
            side: route.exit_side(),
            route: index,
            out: true,
        });
        attachments.push(Attachment {
            block: conn.end.block,
            side: route.entry_side(),
            route: index,
            out: false,
        });
    }
    attachments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::tests::diagram_from_yaml;
    use crate::layout::refine::TrackGrid;
    use crate::layout::route::route_connections;

    fn optimized(yaml: &str) -> (crate::diagram::Diagram, Vec<Route>, Optimized) {
        let diagram = diagram_from_yaml(yaml).unwrap();
        let grid = TrackGrid::new(&diagram, 3);
        let routes = route_connections(&diagram, &grid).unwrap();
        let optimized = optimize(&diagram, &routes);
        (diagram, routes, optimized)
    }

    #[test]
    fn overlapping_parallel_segments_get_distinct_slots() {
        let (_, _, optimized) = optimized(
            "rows:\n  - [a, ~, b]\n  - [c, ~, d]\nblocks:\n  - name: a\n  - name: b\n  - name: c\n  - name: d\nconnections:\n  - start: a\n    end: b\n  - start: c\n    end: d\n  - start: a\n    end: b\n",
        );
        for (index, wire) in optimized.wires.iter().enumerate() {
            for other in &optimized.wires[index + 1..] {
                if wire.orientation == other.orientation
                    && wire.track == other.track
                    && wire.overlaps(other)
                {
                    assert_ne!(wire.slot, other.slot);
                }
            }
        }
    }

    #[test]
    fn group_members_are_contiguous_and_share_priority() {
        let (_, _, optimized) = optimized(
            "rows:\n  - [a, b]\n  - [c, d]\nblocks:\n  - name: a\n  - name: b\n  - name: c\n  - name: d\nconnections:\n  - start: a\n    end: b\n    group: wires\n  - start: c\n    end: d\n    drawing_priority: -2\n  - start: a\n    end: d\n    group: wires\n    drawing_priority: 5\n",
        );
        assert_eq!(optimized.groups.len(), 2);
        let wires_group = &optimized.groups[0];
        assert_eq!(wires_group.name.as_deref(), Some("wires"));
        assert_eq!(wires_group.routes, vec![0, 2]);
        assert_eq!(wires_group.priority, 5);
        // Render order: lowest priority first.
        let order = optimized.group_draw_order();
        assert_eq!(optimized.groups[order[0]].priority, -2);
    }

    #[test]
    fn collapse_merges_same_group_overlaps_into_one_wire() {
        let (_, routes, optimized) = optimized(
            "diagram:\n  collapse_connections: true\nrows:\n  - [a, ~, ~, b]\n  - [c, ~, ~, d]\nblocks:\n  - name: a\n  - name: b\n  - name: c\n  - name: d\nconnections:\n  - start: a\n    end: b\n    group: water\n  - start: a\n    end: b\n    group: water\n",
        );
        // Both routes are identical; every segment pair shares a wire.
        for segment_index in 0..routes[0].segments.len() {
            assert_eq!(
                optimized.segment_wires[0][segment_index],
                optimized.segment_wires[1][segment_index],
            );
        }
        let shared = optimized.segment_wires[0][0];
        assert_eq!(optimized.wires[shared].members.len(), 2);
    }

    #[test]
    fn without_collapse_same_group_segments_stay_apart() {
        let (_, _, optimized) = optimized(
            "rows:\n  - [a, ~, ~, b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n    group: water\n  - start: a\n    end: b\n    group: water\n",
        );
        assert_ne!(optimized.segment_wires[0][0], optimized.segment_wires[1][0]);
    }

    #[test]
    fn attachments_record_sides() {
        let (diagram, _, optimized) = optimized(
            "rows:\n  - [a, b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n",
        );
        let a = diagram.block_by_name("a").unwrap();
        let b = diagram.block_by_name("b").unwrap();
        assert_eq!(optimized.attachments_on(a, Side::Right).count(), 1);
        assert_eq!(optimized.attachments_on(b, Side::Left).count(), 1);
    }
}
