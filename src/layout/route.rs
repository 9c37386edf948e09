//! Orthogonal routing. Each connection runs a uniform-cost search over
//! the refinement lattice from the cell nodes of its start block to the
//! cell nodes of its end block. The scalar cost keeps length, bend
//! count and side preference in strictly separated weight tiers, so
//! minimizing it is the lexicographic minimization the optimizer and
//! the tests rely on; remaining ties fall to the smaller track node, in
//! row-major order, which makes reruns byte-identical.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::attributes::Side;
use crate::diagram::{Diagram, Terminal};
use crate::error::RoutingError;

use super::refine::TrackGrid;
use super::{Direction, Orientation};

/// A straight run of a route along one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSegment {
    pub orientation: Orientation,
    /// The track the segment lies on (a row track for horizontal
    /// segments, a column track for vertical ones).
    pub track: usize,
    /// Coordinate along the axis at the segment start, in path order.
    pub start: usize,
    pub end: usize,
}

impl RouteSegment {
    pub fn lo(&self) -> usize {
        self.start.min(self.end)
    }

    pub fn hi(&self) -> usize {
        self.start.max(self.end)
    }

    pub fn len(&self) -> usize {
        self.hi() - self.lo()
    }

    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }
}

/// The routed path of one connection, in refinement coordinates.
#[derive(Debug, Clone)]
pub struct Route {
    pub connection: usize,
    /// Track nodes the path passes through, start to end. The first
    /// and last nodes are cell nodes of the endpoint blocks.
    pub points: Vec<(usize, usize)>,
    pub segments: Vec<RouteSegment>,
}

impl Route {
    /// Side of the start block the route leaves through.
    pub fn exit_side(&self) -> Side {
        step_direction(self.points[0], self.points[1]).side()
    }

    /// Side of the end block the route enters through.
    pub fn entry_side(&self) -> Side {
        let n = self.points.len();
        step_direction(self.points[n - 2], self.points[n - 1])
            .opposite()
            .side()
    }
}

/// Route every connection in definition order.
pub fn route_connections(
    diagram: &Diagram,
    grid: &TrackGrid,
) -> Result<Vec<Route>, RoutingError> {
    let mut routes = Vec::with_capacity(diagram.connections.len());
    for (index, _) in diagram.connections.iter().enumerate() {
        routes.push(route_one(diagram, grid, index)?);
    }
    Ok(routes)
}

const START_DIR: u8 = 4;

fn route_one(
    diagram: &Diagram,
    grid: &TrackGrid,
    connection: usize,
) -> Result<Route, RoutingError> {
    let conn = &diagram.connections[connection];
    let source_cells = terminal_cells(diagram, &conn.start);
    let sink_cells = terminal_cells(diagram, &conn.end);
    let sources: Vec<(usize, usize)> = source_cells
        .iter()
        .map(|&(row, column)| grid.cell_node(row, column))
        .collect();
    let sinks: Vec<(usize, usize)> = sink_cells
        .iter()
        .map(|&(row, column)| grid.cell_node(row, column))
        .collect();
    let forbidden = forbidden_nodes(diagram, grid, &source_cells, &sink_cells);

    let node_count = grid.node_count();
    let unroutable = || RoutingError::Unroutable {
        start: diagram.block_name(conn.start.block).to_string(),
        end: diagram.block_name(conn.end.block).to_string(),
    };
    if node_count == 0 {
        return Err(unroutable());
    }

    // Weight tiers: with E an upper bound on the number of edges of any
    // path over (node, direction) states, a bend always outweighs the
    // total side bias and a unit of length always outweighs all bends.
    let edge_bound = 4 * node_count as u64;
    let bend_unit = edge_bound + 1;
    let length_unit = bend_unit * bend_unit;

    let mut source_set = vec![false; node_count];
    for &(row, column) in &sources {
        source_set[grid.node_index(row, column)] = true;
    }
    let mut sink_set = vec![false; node_count];
    for &(row, column) in &sinks {
        sink_set[grid.node_index(row, column)] = true;
    }

    // Heap entries carry the predecessor node so that equal-cost
    // arrivals at the same node settle in favour of the path coming
    // through the smaller (row-major) neighbour.
    let state_count = node_count * 5;
    let mut dist = vec![u64::MAX; state_count];
    let mut parent = vec![u32::MAX; state_count];
    let mut heap: BinaryHeap<Reverse<(u64, u32, u32, u8)>> = BinaryHeap::new();

    for &(row, column) in &sources {
        let node = grid.node_index(row, column) as u32;
        let state = node as usize * 5 + START_DIR as usize;
        if dist[state] == u64::MAX {
            dist[state] = 0;
            heap.push(Reverse((0, node, node, START_DIR)));
        }
    }

    let mut goal_state = None;
    while let Some(Reverse((cost, node, _pred, dir))) = heap.pop() {
        let state = node as usize * 5 + dir as usize;
        if cost > dist[state] {
            continue;
        }
        if sink_set[node as usize] && dir != START_DIR {
            goal_state = Some(state);
            break;
        }
        let row = node as usize / grid.track_cols;
        let column = node as usize % grid.track_cols;
        for next_dir in Direction::ALL {
            let Some((next_row, next_column)) = step(grid, row, column, next_dir) else {
                continue;
            };
            let next_node = grid.node_index(next_row, next_column);
            if forbidden[next_node] {
                continue;
            }
            if !edge_allowed(
                conn,
                &source_set,
                &sink_set,
                node as usize,
                next_node,
                next_dir,
            ) {
                continue;
            }
            let mut next_cost = cost + length_unit;
            if dir != START_DIR && next_dir as u8 != dir {
                next_cost += bend_unit;
            }
            if !is_light(&sources, &sinks, conn, row, column, next_row, next_column) {
                next_cost += 1;
            }
            let next_state = next_node * 5 + next_dir as usize;
            if next_cost < dist[next_state] {
                dist[next_state] = next_cost;
                parent[next_state] = state as u32;
                heap.push(Reverse((
                    next_cost,
                    next_node as u32,
                    node,
                    next_dir as u8,
                )));
            }
        }
    }

    let Some(goal) = goal_state else {
        return Err(unroutable());
    };

    // Walk the parents back to a start state.
    let mut points = Vec::new();
    let mut state = goal;
    loop {
        let node = state / 5;
        points.push((node / grid.track_cols, node % grid.track_cols));
        if state % 5 == START_DIR as usize {
            break;
        }
        state = parent[state] as usize;
    }
    points.reverse();

    let segments = make_segments(&points);
    Ok(Route {
        connection,
        points,
        segments,
    })
}

/// Cells a terminal attaches to: the targeted cell, or every cell of
/// the block's cover that carries one of its tags, in row-major order.
fn terminal_cells(diagram: &Diagram, terminal: &Terminal) -> Vec<(usize, usize)> {
    if let Some(cell) = terminal.cell {
        return vec![cell];
    }
    let block = &diagram.blocks[terminal.block];
    let bounds = block.bounds;
    let mut cells = Vec::new();
    for row in bounds.top..=bounds.bottom {
        for column in bounds.left..=bounds.right {
            if diagram
                .grid
                .tag_at(row, column)
                .is_some_and(|tag| block.claims(tag))
            {
                cells.push((row, column));
            }
        }
    }
    cells
}

/// Interior nodes of every block the connection may not cross. A block
/// is traversable when it is pass-through or when one of the terminal
/// cells belongs to its cover, which keeps overlapping blocks (frames)
/// from sealing in their own contents.
fn forbidden_nodes(
    diagram: &Diagram,
    grid: &TrackGrid,
    source_cells: &[(usize, usize)],
    sink_cells: &[(usize, usize)],
) -> Vec<bool> {
    let mut forbidden = vec![false; grid.node_count()];
    for (index, block) in diagram.blocks.iter().enumerate() {
        if block.attrs.pass_through {
            continue;
        }
        let owns_terminal = source_cells
            .iter()
            .chain(sink_cells.iter())
            .any(|&(row, column)| {
                diagram
                    .grid
                    .tag_at(row, column)
                    .is_some_and(|tag| block.claims(tag))
            });
        if owns_terminal {
            continue;
        }
        let span = grid.block_span(index);
        for row in span.top..=span.bottom {
            for column in span.left..=span.right {
                forbidden[grid.node_index(row, column)] = true;
            }
        }
    }
    forbidden
}

fn step(
    grid: &TrackGrid,
    row: usize,
    column: usize,
    dir: Direction,
) -> Option<(usize, usize)> {
    match dir {
        Direction::Up => (row > 0).then(|| (row - 1, column)),
        Direction::Down => (row + 1 < grid.track_rows).then(|| (row + 1, column)),
        Direction::Left => (column > 0).then(|| (row, column - 1)),
        Direction::Right => (column + 1 < grid.track_cols).then(|| (row, column + 1)),
    }
}

/// Edges touching a terminal node exist only on the permitted sides.
fn edge_allowed(
    conn: &crate::diagram::Connection,
    source_set: &[bool],
    sink_set: &[bool],
    from: usize,
    to: usize,
    dir: Direction,
) -> bool {
    if source_set[from] && !conn.attrs.exits.contains(&dir.side()) {
        return false;
    }
    if source_set[to] && !conn.attrs.exits.contains(&dir.opposite().side()) {
        return false;
    }
    if sink_set[from] && !conn.attrs.entrances.contains(&dir.side()) {
        return false;
    }
    if sink_set[to] && !conn.attrs.entrances.contains(&dir.opposite().side()) {
        return false;
    }
    true
}

/// Lighter edges bias the search toward the tracks of the permitted
/// approach sides, so a connection hugs the side it is told to use.
#[allow(clippy::too_many_arguments)]
fn is_light(
    sources: &[(usize, usize)],
    sinks: &[(usize, usize)],
    conn: &crate::diagram::Connection,
    row_a: usize,
    column_a: usize,
    row_b: usize,
    column_b: usize,
) -> bool {
    let attrs = &conn.attrs;
    if row_a == row_b {
        let row = row_a;
        let lo = column_a.min(column_b);
        let hi = column_a.max(column_b);
        let beside = |nodes: &[(usize, usize)], side: Side| {
            nodes.iter().any(|&(node_row, node_column)| {
                node_row == row
                    && match side {
                        Side::Left => hi <= node_column,
                        Side::Right => lo >= node_column,
                        _ => false,
                    }
            })
        };
        (attrs.entrances.contains(&Side::Left) && beside(sinks, Side::Left))
            || (attrs.entrances.contains(&Side::Right) && beside(sinks, Side::Right))
            || (attrs.exits.contains(&Side::Left) && beside(sources, Side::Left))
            || (attrs.exits.contains(&Side::Right) && beside(sources, Side::Right))
    } else {
        let column = column_a;
        let lo = row_a.min(row_b);
        let hi = row_a.max(row_b);
        let beside = |nodes: &[(usize, usize)], side: Side| {
            nodes.iter().any(|&(node_row, node_column)| {
                node_column == column
                    && match side {
                        Side::Top => hi <= node_row,
                        Side::Bottom => lo >= node_row,
                        _ => false,
                    }
            })
        };
        (attrs.entrances.contains(&Side::Top) && beside(sinks, Side::Top))
            || (attrs.entrances.contains(&Side::Bottom) && beside(sinks, Side::Bottom))
            || (attrs.exits.contains(&Side::Top) && beside(sources, Side::Top))
            || (attrs.exits.contains(&Side::Bottom) && beside(sources, Side::Bottom))
    }
}

fn step_direction(from: (usize, usize), to: (usize, usize)) -> Direction {
    if from.0 == to.0 {
        if to.1 > from.1 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if to.0 > from.0 {
        Direction::Down
    } else {
        Direction::Up
    }
}

/// Collapse collinear runs of path nodes into segments.
fn make_segments(points: &[(usize, usize)]) -> Vec<RouteSegment> {
    let mut segments = Vec::new();
    if points.len() < 2 {
        return segments;
    }
    let mut run_start = points[0];
    let mut previous = points[0];
    let mut run_dir = step_direction(points[0], points[1]);
    for &point in &points[1..] {
        let dir = step_direction(previous, point);
        if dir != run_dir {
            segments.push(segment_between(run_start, previous, run_dir));
            run_start = previous;
            run_dir = dir;
        }
        previous = point;
    }
    segments.push(segment_between(run_start, previous, run_dir));
    segments
}

fn segment_between(from: (usize, usize), to: (usize, usize), dir: Direction) -> RouteSegment {
    match dir.orientation() {
        Orientation::Horizontal => RouteSegment {
            orientation: Orientation::Horizontal,
            track: from.0,
            start: from.1,
            end: to.1,
        },
        Orientation::Vertical => RouteSegment {
            orientation: Orientation::Vertical,
            track: from.1,
            start: from.0,
            end: to.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::tests::diagram_from_yaml;

    fn routed(yaml: &str) -> (crate::diagram::Diagram, TrackGrid, Vec<Route>) {
        let diagram = diagram_from_yaml(yaml).unwrap();
        let grid = TrackGrid::new(&diagram, 3);
        let routes = route_connections(&diagram, &grid).unwrap();
        (diagram, grid, routes)
    }

    fn bends(route: &Route) -> usize {
        route.segments.len() - 1
    }

    #[test]
    fn diagonal_blocks_get_one_bend() {
        let (_, _, routes) = routed(
            "rows:\n  - [a]\n  - [~, b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n",
        );
        assert_eq!(routes.len(), 1);
        assert_eq!(bends(&routes[0]), 1);
        // Orthogonality: consecutive points differ in one coordinate.
        for pair in routes[0].points.windows(2) {
            let same_row = pair[0].0 == pair[1].0;
            let same_column = pair[0].1 == pair[1].1;
            assert!(same_row != same_column);
        }
    }

    #[test]
    fn blocking_block_forces_detour_through_north_channel() {
        let (diagram, grid, routes) = routed(
            "rows:\n  - [a, x, b]\nblocks:\n  - name: a\n  - name: x\n  - name: b\nconnections:\n  - start: a\n    end: b\n",
        );
        let route = &routes[0];
        assert_eq!(bends(route), 2);
        // The detour must not enter the interior of x.
        let x = diagram.block_by_name("x").unwrap();
        let x_span = grid.block_span(x);
        for &(row, column) in &route.points[1..route.points.len() - 1] {
            assert!(!x_span.contains(row, column));
        }
        // Equal-cost detours break ties toward the smaller row: north.
        assert!(route.points.iter().any(|&(row, _)| row < x_span.top));
        assert!(route.points.iter().all(|&(row, _)| row <= x_span.top));
    }

    #[test]
    fn pass_through_block_is_crossed_straight() {
        let (_, _, routes) = routed(
            "rows:\n  - [a, x, b]\nblocks:\n  - name: a\n  - name: x\n    pass_through: true\n  - name: b\nconnections:\n  - start: a\n    end: b\n",
        );
        assert_eq!(bends(&routes[0]), 0);
    }

    #[test]
    fn exit_and_entrance_sides_are_honoured() {
        let (_, _, routes) = routed(
            "rows:\n  - [a, ~]\n  - [~, b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n    exits: [right]\n    entrances: [left]\n",
        );
        let route = &routes[0];
        assert_eq!(route.exit_side(), crate::attributes::Side::Right);
        assert_eq!(route.entry_side(), crate::attributes::Side::Left);
        assert_eq!(bends(route), 2);
    }

    #[test]
    fn stacked_blocks_with_crossed_sides_still_route() {
        let (_, _, routes) = routed(
            "rows:\n  - [a]\n  - [b]\nblocks:\n  - name: a\n  - name: b\nconnections:\n  - start: a\n    end: b\n    exits: [right]\n    entrances: [left]\n",
        );
        let route = &routes[0];
        assert_eq!(route.exit_side(), crate::attributes::Side::Right);
        assert_eq!(route.entry_side(), crate::attributes::Side::Left);
    }

    #[test]
    fn unroutable_connection_is_reported() {
        // c is an autoblock completely walled in by x.
        let diagram = diagram_from_yaml(
            "rows:\n  - [x, x, x, ~]\n  - [x, c, x, ~]\n  - [x, x, x, a]\nblocks:\n  - name: x\n  - name: a\nconnections:\n  - start: a\n    end: c\n",
        )
        .unwrap();
        let grid = TrackGrid::new(&diagram, 3);
        let err = route_connections(&diagram, &grid);
        assert!(matches!(err, Err(RoutingError::Unroutable { .. })));
    }

    #[test]
    fn routing_is_deterministic() {
        let yaml = "rows:\n  - [a, ~, b]\n  - [c, ~, d]\nblocks:\n  - name: a\n  - name: b\n  - name: c\n  - name: d\nconnections:\n  - start: a\n    end: d\n  - start: c\n    end: b\n  - start: a\n    end: b\n";
        let (_, _, first) = routed(yaml);
        let (_, _, second) = routed(yaml);
        for (one, two) in first.iter().zip(&second) {
            assert_eq!(one.points, two.points);
        }
    }
}
