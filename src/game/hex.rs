//! Staggered-row cell coordinates and the grid's geometry.
//!
//! Rows are stored top to bottom (row 0 is the topmost, oldest row) and
//! adjacent rows alternate between "straight" and "staggered". A staggered
//! row is shifted half a bubble to the left and keeps column 0 as an unused
//! placeholder, so a staggered cell (r, c) sits between (r±1, c-1) and
//! (r±1, c), while a straight cell (r, c) sits between (r±1, c) and
//! (r±1, c+1).
//!
//! Positions are in grid space: x grows to the right, y grows downward.

use bevy::prelude::*;

use super::{bubble::BubbleSize, settings::GridSettings};

/// A (row, col) cell. Column indices only mean something relative to the
/// row's own staggering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub struct CellCoord {
    pub row: i32,
    pub col: i32,
}

impl CellCoord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The six neighbors of this cell, given whether its row is staggered.
    ///
    /// Staggered: top-left, top, right, bottom, bottom-left, left.
    /// Straight: top, top-right, right, bottom-right, bottom, left.
    pub fn neighbors(&self, staggered: bool) -> [CellCoord; 6] {
        let (r, c) = (self.row, self.col);
        if staggered {
            [
                CellCoord::new(r - 1, c - 1),
                CellCoord::new(r - 1, c),
                CellCoord::new(r, c + 1),
                CellCoord::new(r + 1, c),
                CellCoord::new(r + 1, c - 1),
                CellCoord::new(r, c - 1),
            ]
        } else {
            [
                CellCoord::new(r - 1, c),
                CellCoord::new(r - 1, c + 1),
                CellCoord::new(r, c + 1),
                CellCoord::new(r + 1, c + 1),
                CellCoord::new(r + 1, c),
                CellCoord::new(r, c - 1),
            ]
        }
    }
}

impl std::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// First usable column of a row.
#[inline]
pub const fn first_column(staggered: bool) -> i32 {
    if staggered { 1 } else { 0 }
}

/// Horizontal and vertical measurements of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    pub bubble: BubbleSize,
    pub bubbles_per_row: usize,
    /// Left edge of the area bubbles occupy.
    pub left: f32,
    /// Right edge of the area bubbles occupy.
    pub right: f32,
    /// Outer walls, for the physics collaborator's world bounds.
    pub wall_left: f32,
    pub wall_right: f32,
    /// Ceiling boundary. Moves down on every descent.
    pub top: f32,
    /// Vertical distance between row centers.
    pub row_interval: f32,
    /// How far the ceiling drops on a descent.
    pub descent_interval: f32,
}

impl GridGeometry {
    pub fn new(bubble: BubbleSize, settings: &GridSettings) -> Self {
        let content_width = bubble.width * settings.bubbles_per_row as f32;
        let left = settings.playfield_width * 0.5 - content_width * 0.5;
        let right = left + content_width;
        let wall_gap = settings.border_width * 0.5 + settings.side_gap;

        Self {
            bubble,
            bubbles_per_row: settings.bubbles_per_row,
            left,
            right,
            wall_left: left - wall_gap,
            wall_right: right + wall_gap,
            top: settings.ceiling_y,
            row_interval: bubble.height,
            descent_interval: settings.descent_interval,
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.bubble.radius()
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.bubble.width
    }

    /// Last usable column of any row.
    #[inline]
    pub fn last_column(&self) -> i32 {
        self.bubbles_per_row as i32 - 1
    }

    /// Center x of the leftmost possible bubble.
    pub fn leftmost_x(&self) -> f32 {
        self.left + self.radius()
    }

    /// Center x of the rightmost possible bubble.
    pub fn rightmost_x(&self) -> f32 {
        self.right - self.radius()
    }

    /// Center y of the first row under the ceiling.
    pub fn first_row_y(&self) -> f32 {
        self.top + self.radius()
    }

    /// Center x of a column.
    pub fn column_x(&self, col: i32, staggered: bool) -> f32 {
        let offset = if staggered { 0.0 } else { self.radius() };
        self.left + offset + col as f32 * self.width()
    }

    /// The usable column nearest to `x`.
    pub fn nearest_column(&self, x: f32, staggered: bool) -> i32 {
        let offset = if staggered { 0.0 } else { self.radius() };
        let col = ((x - self.left - offset) / self.width()).round() as i32;
        col.clamp(first_column(staggered), self.last_column())
    }

    /// Keep a target x inside the usable span. Staggered rows snap half a
    /// bubble further in so their columns stay aligned.
    pub fn clamp_x(&self, x: f32, staggered: bool) -> f32 {
        let half = self.width() * 0.5;
        if x < self.leftmost_x() {
            if staggered {
                self.leftmost_x() + half
            } else {
                self.leftmost_x()
            }
        } else if x > self.rightmost_x() {
            if staggered {
                self.rightmost_x() - half
            } else {
                self.rightmost_x()
            }
        } else {
            x
        }
    }
}
