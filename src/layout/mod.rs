//! The layout pipeline: refinement grid, router, segment optimizer,
//! constraint sizer, label placement. Each stage consumes the previous
//! stage's artifact and the result is immutable once built.

pub mod labels;
pub mod optimize;
pub mod refine;
pub mod route;
pub mod size;

use serde::Serialize;

use crate::attributes::Side;
use crate::diagram::Diagram;
use crate::error::Result;

pub use labels::{PlacedLabel, PlacedLabels};
pub use optimize::{Attachment, DrawGroup, Optimized, WireSegment};
pub use refine::TrackGrid;
pub use route::{Route, RouteSegment};
pub use size::{Coordinates, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn orientation(self) -> Orientation {
        match self {
            Direction::Up | Direction::Down => Orientation::Vertical,
            Direction::Left | Direction::Right => Orientation::Horizontal,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Block side a move in this direction crosses.
    pub fn side(self) -> Side {
        match self {
            Direction::Up => Side::Top,
            Direction::Down => Side::Bottom,
            Direction::Left => Side::Left,
            Direction::Right => Side::Right,
        }
    }
}

/// Tuning knobs of the layout engine that are not diagram attributes.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Refinement tracks per logical row and column; minimum 3.
    pub tracks_per_band: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self { tracks_per_band: 3 }
    }
}

/// The finished layout of a diagram.
#[derive(Debug, Clone)]
pub struct Layout {
    pub routes: Vec<Route>,
    pub optimized: Optimized,
    pub coords: Coordinates,
    pub labels: PlacedLabels,
}

/// Run the full pipeline on a built diagram.
pub fn compute_layout(diagram: &Diagram, options: &LayoutOptions) -> Result<Layout> {
    let grid = TrackGrid::new(diagram, options.tracks_per_band);
    let routes = route::route_connections(diagram, &grid)?;
    let optimized = optimize::optimize(diagram, &routes);
    let coords = size::solve(diagram, &grid, &routes, &optimized)?;
    let labels = labels::place_labels(diagram, &routes, &optimized, &coords);
    Ok(Layout {
        routes,
        optimized,
        coords,
        labels,
    })
}
