//! Cluster detection - same-color groups and bubbles cut off from the top.
//!
//! Both scans share the same flood fill over the staggered neighbor graph,
//! with an explicit worklist and a visited set keyed by bubble identity.
//! Row 0 is the hidden anchor row: it is never entered from row 1 during a
//! scan, so it never takes part in a color match, but its bubbles seed the
//! connectivity scan.

use std::collections::HashSet;

use super::{
    bubble::{BubbleId, MatchColor, colors_match},
    grid::BubbleGrid,
    hex::CellCoord,
};

/// Vertical lift applied to first-degree neighbors after an attach.
pub const JIGGLE_LIFT: f32 = 10.0;

/// All bubbles transitively connected to `origin` through neighbors whose
/// color matches `color`.
///
/// A bubble qualifies once: its id goes into `visited` the first time it is
/// reached. `origin` itself is only part of the result if a neighbor leads
/// back to it, so a lone bubble yields an empty set. The minimum group size
/// is the caller's business.
pub fn find_matches(
    grid: &BubbleGrid,
    origin: CellCoord,
    color: MatchColor,
    visited: &mut HashSet<BubbleId>,
) -> Vec<CellCoord> {
    let mut matches = Vec::new();
    let mut worklist = vec![origin];

    while let Some(cell) = worklist.pop() {
        let staggered = grid.is_row_staggered(cell.row);
        for neighbor in cell.neighbors(staggered) {
            // hidden anchor row
            if neighbor.row == 0 && cell.row == 1 {
                continue;
            }
            let Some(bubble) = grid.get_at(neighbor).bubble() else {
                continue;
            };
            if !colors_match(bubble.color.into(), color) || !visited.insert(bubble.id) {
                continue;
            }
            matches.push(neighbor);
            worklist.push(neighbor);
        }
    }

    matches
}

/// Cells in rows below the anchor row that have no path of occupied cells
/// back to row 0.
pub fn find_dangling(grid: &BubbleGrid) -> Vec<CellCoord> {
    let mut connected = HashSet::new();
    let roots: Vec<CellCoord> = grid
        .row(0)
        .map(|row| {
            row.occupied()
                .map(|(col, bubble)| {
                    connected.insert(bubble.id);
                    CellCoord::new(0, col)
                })
                .collect()
        })
        .unwrap_or_default();

    for root in roots {
        find_matches(grid, root, MatchColor::Any, &mut connected);
    }

    grid.iter()
        .filter(|(cell, bubble)| cell.row >= 1 && !connected.contains(&bubble.id))
        .map(|(cell, _)| cell)
        .collect()
}

/// A neighbor nudged by a freshly attached bubble.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jiggle {
    pub bubble: BubbleId,
    /// How far up the bubble bobs before settling.
    pub lift: f32,
}

fn upper_neighbors(cell: CellCoord) -> [CellCoord; 5] {
    let (r, c) = (cell.row, cell.col);
    [
        CellCoord::new(r, c - 1),
        CellCoord::new(r, c + 1),
        CellCoord::new(r - 1, c),
        CellCoord::new(r - 1, c - 1),
        CellCoord::new(r - 1, c + 1),
    ]
}

/// Bubbles around `source` that bob when it lands.
///
/// First-degree neighbors (sides and above) get the full lift; when the
/// cell right above is occupied, its own upper neighbors get half. Each
/// bubble appears once, with the larger lift.
pub fn jiggle_neighbors(grid: &BubbleGrid, source: CellCoord) -> Vec<Jiggle> {
    let source_id = grid.get_at(source).bubble().map(|b| b.id);
    let above = CellCoord::new(source.row - 1, source.col);

    let mut degrees = vec![upper_neighbors(source)];
    if grid.get_at(above).is_occupied() {
        degrees.push(upper_neighbors(above));
    }

    let mut seen = HashSet::new();
    let mut jiggles = Vec::new();
    for (degree, cells) in degrees.iter().enumerate() {
        let lift = JIGGLE_LIFT / (degree + 1) as f32;
        for &cell in cells {
            let Some(bubble) = grid.get_at(cell).bubble() else {
                continue;
            };
            if Some(bubble.id) == source_id || !seen.insert(bubble.id) {
                continue;
            }
            jiggles.push(Jiggle {
                bubble: bubble.id,
                lift,
            });
        }
    }
    jiggles
}
