//! The refinement grid: every logical row and column is split into `K`
//! parallel tracks (channels before the interior, the interior itself,
//! channels after it), giving connections room to run beside and
//! between the blocks. Routing happens on the lattice of track
//! crossings; the sizer later assigns a coordinate to every track.

use crate::diagram::Diagram;

/// Inclusive rectangle in track coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSpan {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl TrackSpan {
    pub fn contains(&self, row: usize, column: usize) -> bool {
        row >= self.top && row <= self.bottom && column >= self.left && column <= self.right
    }
}

/// Geometry of the refinement lattice for one diagram.
#[derive(Debug, Clone)]
pub struct TrackGrid {
    /// Tracks per logical band; at least 3.
    pub k: usize,
    /// Index of the interior track within a band.
    pub mid: usize,
    pub track_rows: usize,
    pub track_cols: usize,
    spans: Vec<TrackSpan>,
}

impl TrackGrid {
    pub fn new(diagram: &Diagram, tracks_per_band: usize) -> Self {
        let k = tracks_per_band.max(3);
        let mid = k / 2;
        let spans = diagram
            .blocks
            .iter()
            .map(|block| TrackSpan {
                top: block.bounds.top * k + mid,
                left: block.bounds.left * k + mid,
                bottom: block.bounds.bottom * k + mid,
                right: block.bounds.right * k + mid,
            })
            .collect();
        Self {
            k,
            mid,
            track_rows: diagram.grid.height * k,
            track_cols: diagram.grid.width * k,
            spans,
        }
    }

    pub fn node_count(&self) -> usize {
        self.track_rows * self.track_cols
    }

    pub fn node_index(&self, row: usize, column: usize) -> usize {
        row * self.track_cols + column
    }

    /// Track node at the centre of a logical cell.
    pub fn cell_node(&self, row: usize, column: usize) -> (usize, usize) {
        (row * self.k + self.mid, column * self.k + self.mid)
    }

    /// Interior span of a block: every track node in it lies inside the
    /// drawn box (the channels between covered cells included).
    pub fn block_span(&self, block: usize) -> TrackSpan {
        self.spans[block]
    }

    /// Logical band a track belongs to.
    pub fn band(&self, track: usize) -> usize {
        track / self.k
    }

    /// Position of a track within its band.
    pub fn sub(&self, track: usize) -> usize {
        track % self.k
    }

    /// True if the track is the interior track of its band.
    pub fn is_interior(&self, track: usize) -> bool {
        self.sub(track) == self.mid
    }
}
