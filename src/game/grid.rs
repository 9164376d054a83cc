//! The staggered grid that holds all bubbles.
//!
//! Rows are dense vectors of optional bubbles. An empty slot (no bubble) is
//! different from a slot that was never allocated; [`Slot`] keeps the two
//! apart so callers never have to guard against out-of-range coordinates.

use bevy::prelude::*;

use super::{
    bubble::{Bubble, BubbleId},
    hex::CellCoord,
};

/// One row of the grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridRow {
    staggered: bool,
    slots: Vec<Option<Bubble>>,
}

impl GridRow {
    pub fn new(staggered: bool) -> Self {
        Self {
            staggered,
            slots: Vec::new(),
        }
    }

    /// Build a row from prepared slots.
    pub fn from_slots(staggered: bool, slots: Vec<Option<Bubble>>) -> Self {
        Self { staggered, slots }
    }

    pub fn is_staggered(&self) -> bool {
        self.staggered
    }

    /// Allocated slots, occupied or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot holds a bubble.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn occupied(&self) -> impl Iterator<Item = (i32, &Bubble)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(col, slot)| slot.as_ref().map(|b| (col as i32, b)))
    }
}

/// Result of a point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot<'a> {
    /// The coordinate is outside the allocated grid.
    OutOfBounds,
    /// Allocated, but nothing is there.
    Empty,
    Occupied(&'a Bubble),
}

impl<'a> Slot<'a> {
    pub fn bubble(&self) -> Option<&'a Bubble> {
        match self {
            Slot::Occupied(bubble) => Some(bubble),
            _ => None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied(_))
    }
}

/// Sparse staggered storage. Row 0 is the topmost row.
#[derive(Debug, Clone, Default)]
pub struct BubbleGrid {
    rows: Vec<GridRow>,
    bubble_count: usize,
}

impl BubbleGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Bubbles currently held by the grid.
    pub fn bubble_count(&self) -> usize {
        self.bubble_count
    }

    pub fn is_empty(&self) -> bool {
        self.bubble_count == 0
    }

    pub fn row(&self, row: usize) -> Option<&GridRow> {
        self.rows.get(row)
    }

    /// Get whatever is at a cell.
    pub fn get_at(&self, cell: CellCoord) -> Slot<'_> {
        if cell.row < 0 || cell.col < 0 {
            return Slot::OutOfBounds;
        }
        let Some(row) = self.rows.get(cell.row as usize) else {
            return Slot::OutOfBounds;
        };
        match row.slots.get(cell.col as usize) {
            Some(Some(bubble)) => Slot::Occupied(bubble),
            Some(None) => Slot::Empty,
            None => Slot::OutOfBounds,
        }
    }

    /// Put a bubble at a cell, growing the grid downward and padding the row
    /// as needed.
    ///
    /// Returns whatever did not end up stored: the previous occupant, or
    /// `bubble` itself if the cell lies above or left of the grid.
    pub fn insert_at(&mut self, cell: CellCoord, bubble: Bubble) -> Option<Bubble> {
        if cell.row < 0 || cell.col < 0 {
            warn!("Refusing to insert bubble {} at {}", bubble.id, cell);
            return Some(bubble);
        }
        let (row, col) = (cell.row as usize, cell.col as usize);

        while self.rows.len() <= row {
            let staggered = self.rows.last().is_some_and(|last| !last.staggered);
            self.rows.push(GridRow::new(staggered));
        }

        let slots = &mut self.rows[row].slots;
        if slots.len() <= col {
            slots.resize(col + 1, None);
        }

        let previous = slots[col].replace(bubble);
        if previous.is_none() {
            self.bubble_count += 1;
        }
        previous
    }

    /// Clear every listed cell, returning the bubbles that were there.
    ///
    /// An already-empty cell means the caller's bookkeeping drifted; it is
    /// logged and skipped.
    pub fn remove_at(&mut self, cells: &[CellCoord]) -> Vec<Bubble> {
        let mut removed = Vec::with_capacity(cells.len());
        for &cell in cells {
            let slot = (cell.row >= 0 && cell.col >= 0)
                .then(|| self.rows.get_mut(cell.row as usize))
                .flatten()
                .and_then(|row| row.slots.get_mut(cell.col as usize));

            match slot.and_then(Option::take) {
                Some(bubble) => {
                    self.bubble_count -= 1;
                    removed.push(bubble);
                }
                None => warn!("Tried to remove a bubble from empty cell {}", cell),
            }
        }
        removed
    }

    /// Drop fully empty rows from the bottom, stopping at the first row that
    /// still holds a bubble. Returns how many rows were dropped.
    pub fn prune_empty_rows(&mut self) -> usize {
        let before = self.rows.len();
        while self.rows.last().is_some_and(GridRow::is_empty) {
            self.rows.pop();
        }
        before - self.rows.len()
    }

    /// Whether a row is staggered. Rows past either end are predicted from
    /// the alternation, so a row one past the bottom is the inverse of the
    /// last row.
    pub fn is_row_staggered(&self, row: i32) -> bool {
        let Some(last) = self.rows.len().checked_sub(1) else {
            return row.rem_euclid(2) == 1;
        };
        let last = last as i32;
        if row < 0 {
            self.rows[0].staggered ^ (row.rem_euclid(2) == 1)
        } else if row > last {
            self.rows[last as usize].staggered ^ ((row - last) % 2 == 1)
        } else {
            self.rows[row as usize].staggered
        }
    }

    /// Insert a new topmost row. Every existing row index shifts down by one.
    pub fn push_front(&mut self, row: GridRow) {
        self.bubble_count += row.occupied().count();
        self.rows.insert(0, row);
    }

    /// Locate a bubble by identity. Searches from the bottom, where recent
    /// collisions usually are.
    pub fn find(&self, id: BubbleId) -> Option<CellCoord> {
        self.rows.iter().enumerate().rev().find_map(|(r, row)| {
            row.occupied()
                .find(|(_, bubble)| bubble.id == id)
                .map(|(c, _)| CellCoord::new(r as i32, c))
        })
    }

    /// Iterate over all occupied cells, top to bottom.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, &Bubble)> {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.occupied()
                .map(move |(c, bubble)| (CellCoord::new(r as i32, c), bubble))
        })
    }

    pub fn bubbles_mut(&mut self) -> impl Iterator<Item = &mut Bubble> {
        self.rows
            .iter_mut()
            .flat_map(|row| row.slots.iter_mut().flatten())
    }

    /// Empty the grid, handing back every bubble.
    pub fn clear(&mut self) -> Vec<Bubble> {
        self.bubble_count = 0;
        self.rows
            .drain(..)
            .flat_map(|row| row.slots.into_iter().flatten())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::bubble::{BubbleColor, BubblePool, BubbleSize};

    fn pool() -> BubblePool {
        BubblePool::new(BubbleSize::new(40.0, 34.0))
    }

    #[test]
    fn test_get_reflects_last_write() {
        let mut pool = pool();
        let mut grid = BubbleGrid::new();
        let cell = CellCoord::new(2, 3);

        let first = pool.spawn(BubbleColor::Red, Vec2::ZERO);
        assert!(grid.insert_at(cell, first).is_none());
        let second = pool.spawn(BubbleColor::Blue, Vec2::ZERO);
        let second_id = second.id;
        let displaced = grid.insert_at(cell, second).unwrap();

        assert_eq!(displaced.color, BubbleColor::Red);
        assert_eq!(grid.get_at(cell).bubble().map(|b| b.id), Some(second_id));
        assert_eq!(grid.bubble_count(), 1);
    }

    #[test]
    fn test_out_of_bounds_is_not_empty() {
        let mut grid = BubbleGrid::new();
        grid.insert_at(CellCoord::new(0, 2), pool().spawn(BubbleColor::Red, Vec2::ZERO));

        assert_eq!(grid.get_at(CellCoord::new(0, 0)), Slot::Empty);
        assert_eq!(grid.get_at(CellCoord::new(0, 3)), Slot::OutOfBounds);
        assert_eq!(grid.get_at(CellCoord::new(1, 0)), Slot::OutOfBounds);
        assert_eq!(grid.get_at(CellCoord::new(-1, 0)), Slot::OutOfBounds);
        assert_eq!(grid.get_at(CellCoord::new(0, -1)), Slot::OutOfBounds);
    }

    #[test]
    fn test_rows_alternate_staggering() {
        let mut grid = BubbleGrid::new();
        grid.insert_at(CellCoord::new(5, 1), pool().spawn(BubbleColor::Red, Vec2::ZERO));

        assert_eq!(grid.row_count(), 6);
        assert!(!grid.is_row_staggered(0));
        for row in 1..grid.row_count() as i32 {
            assert_ne!(grid.is_row_staggered(row), grid.is_row_staggered(row - 1));
        }
    }

    #[test]
    fn test_staggering_predicted_past_the_end() {
        let mut grid = BubbleGrid::new();
        grid.insert_at(CellCoord::new(1, 1), pool().spawn(BubbleColor::Red, Vec2::ZERO));
        assert!(grid.is_row_staggered(1));
        assert!(!grid.is_row_staggered(2));
        assert!(grid.is_row_staggered(3));
        assert!(grid.is_row_staggered(-1));
    }

    #[test]
    fn test_remove_empty_cell_is_skipped() {
        let mut pool = pool();
        let mut grid = BubbleGrid::new();
        grid.insert_at(CellCoord::new(0, 0), pool.spawn(BubbleColor::Red, Vec2::ZERO));
        grid.insert_at(CellCoord::new(0, 2), pool.spawn(BubbleColor::Blue, Vec2::ZERO));

        let removed = grid.remove_at(&[
            CellCoord::new(0, 0),
            CellCoord::new(0, 1),
            CellCoord::new(7, 7),
        ]);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].color, BubbleColor::Red);
        assert_eq!(grid.bubble_count(), 1);
        assert_eq!(grid.get_at(CellCoord::new(0, 0)), Slot::Empty);
    }

    #[test]
    fn test_prune_only_trims_the_bottom() {
        let mut pool = pool();
        let mut grid = BubbleGrid::new();
        grid.insert_at(CellCoord::new(0, 0), pool.spawn(BubbleColor::Red, Vec2::ZERO));
        grid.insert_at(CellCoord::new(2, 0), pool.spawn(BubbleColor::Red, Vec2::ZERO));
        grid.insert_at(CellCoord::new(4, 1), pool.spawn(BubbleColor::Red, Vec2::ZERO));
        grid.remove_at(&[CellCoord::new(4, 1)]);

        assert_eq!(grid.prune_empty_rows(), 2);
        assert_eq!(grid.row_count(), 3);
        // Row 1 is empty but sits between occupied rows.
        assert!(grid.row(1).unwrap().is_empty());

        assert_eq!(grid.prune_empty_rows(), 0);
        assert_eq!(grid.row_count(), 3);
    }

    #[test]
    fn test_push_front_shifts_rows() {
        let mut pool = pool();
        let mut grid = BubbleGrid::new();
        let old = pool.spawn(BubbleColor::Red, Vec2::ZERO);
        let old_id = old.id;
        grid.insert_at(CellCoord::new(0, 0), old);

        let fresh = pool.spawn(BubbleColor::Blue, Vec2::ZERO);
        grid.push_front(GridRow::from_slots(true, vec![None, Some(fresh)]));

        assert_eq!(grid.find(old_id), Some(CellCoord::new(1, 0)));
        assert_eq!(grid.bubble_count(), 2);
        assert!(grid.is_row_staggered(0));
    }

    #[test]
    fn test_clear_returns_everything() {
        let mut pool = pool();
        let mut grid = BubbleGrid::new();
        for col in 0..4 {
            grid.insert_at(CellCoord::new(0, col), pool.spawn(BubbleColor::Green, Vec2::ZERO));
        }
        assert_eq!(grid.clear().len(), 4);
        assert!(grid.is_empty());
        assert_eq!(grid.row_count(), 0);
    }
}
