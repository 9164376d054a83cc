//! Attach resolution - turning a collision into a free grid cell.
//!
//! The shot's continuous impact point is compared against the struck
//! bubble's center to decide whether the new bubble lands beside it or in
//! the row above/below, and on which side. Occupied destinations are walked
//! away from diagonally, one row at a time, until a free cell turns up.

use bevy::prelude::*;

use super::{
    grid::BubbleGrid,
    hex::{CellCoord, GridGeometry, first_column},
};

/// Where an incoming bubble ends up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachTarget {
    pub cell: CellCoord,
    /// Resting center in grid space.
    pub position: Vec2,
}

/// Column reached by moving sideways within a row.
fn same_row_column(col: i32, staggered: bool, is_left: bool, geometry: &GridGeometry) -> i32 {
    let first = first_column(staggered);
    let last = geometry.last_column();
    let col = if is_left {
        if col > first { col - 1 } else { col }
    } else if col < last {
        col + 1
    } else {
        col
    };
    col.clamp(first, last)
}

/// Cell reached by moving one row up (`step < 0`) or down from `from`,
/// leaning left or right.
///
/// A staggered row sits half a bubble left of a straight one, so entering a
/// staggered row to the right bumps the column while entering a straight
/// row to the left drops it; the other two moves keep the column.
fn cross_row_cell(
    grid: &BubbleGrid,
    geometry: &GridGeometry,
    from: CellCoord,
    step: i32,
    is_left: bool,
) -> CellCoord {
    let row = from.row + step;
    let staggered = grid.is_row_staggered(row);
    let last = geometry.last_column();

    let mut col = from.col;
    if staggered {
        if !is_left && col < last {
            col += 1;
        }
    } else if is_left && col > 0 {
        col -= 1;
    }

    CellCoord::new(row, col.clamp(first_column(staggered), last))
}

/// Resolve the cell a shot attaches to.
///
/// `impact` and `velocity` describe the shot at the moment of contact;
/// `struck` and `struck_center` the grid bubble it touched. The returned
/// cell is never occupied, though it may lie past the grid's last row.
pub fn resolve_attach(
    grid: &BubbleGrid,
    geometry: &GridGeometry,
    impact: Vec2,
    velocity: Vec2,
    struck: CellCoord,
    struck_center: Vec2,
) -> AttachTarget {
    let radius = geometry.radius();
    let interval = geometry.row_interval;

    // Where the shot would have come to rest one radius further on.
    let heading = impact + velocity.normalize_or_zero() * radius;
    let is_left = heading.x < struck_center.x;
    let lateral = if is_left { -radius } else { radius };

    let dy = impact.y - struck_center.y;
    let same_row = dy.abs() <= radius;
    let mut step = if dy < 0.0 { -1 } else { 1 };

    let (mut cell, mut target) = if same_row {
        let staggered = grid.is_row_staggered(struck.row);
        (
            CellCoord::new(
                struck.row,
                same_row_column(struck.col, staggered, is_left, geometry),
            ),
            Vec2::new(struck_center.x + 2.0 * lateral, struck_center.y),
        )
    } else {
        if struck.row + step < 0 {
            step = 1;
        }
        (
            cross_row_cell(grid, geometry, struck, step, is_left),
            struck_center + Vec2::new(lateral, step as f32 * interval),
        )
    };

    while grid.get_at(cell).is_occupied() {
        if cell.row + step < 0 {
            debug!("Attach walk hit the top row, continuing below {}", struck);
            step = 1;
            cell = cross_row_cell(grid, geometry, struck, step, is_left);
            target = struck_center + Vec2::new(lateral, interval);
            continue;
        }
        cell = cross_row_cell(grid, geometry, cell, step, is_left);
        target += Vec2::new(lateral, step as f32 * interval);
    }

    target.x = geometry.clamp_x(target.x, grid.is_row_staggered(cell.row));
    AttachTarget {
        cell,
        position: target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        bubble::{BubbleColor, BubblePool, BubbleSize},
        settings::GridSettings,
    };

    struct Fixture {
        geometry: GridGeometry,
        pool: BubblePool,
        grid: BubbleGrid,
    }

    impl Fixture {
        fn new() -> Self {
            let size = BubbleSize::new(40.0, 34.0);
            Self {
                geometry: GridGeometry::new(size, &GridSettings::default()),
                pool: BubblePool::new(size),
                grid: BubbleGrid::new(),
            }
        }

        fn center(&self, cell: CellCoord) -> Vec2 {
            Vec2::new(
                self.geometry
                    .column_x(cell.col, self.grid.is_row_staggered(cell.row)),
                self.geometry.first_row_y() + cell.row as f32 * self.geometry.row_interval,
            )
        }

        fn put(&mut self, row: i32, col: i32) -> &mut Self {
            let cell = CellCoord::new(row, col);
            let position = self.center(cell);
            let bubble = self.pool.spawn(BubbleColor::Red, position);
            self.grid.insert_at(cell, bubble);
            self
        }

        fn full_row(&mut self, row: i32) -> &mut Self {
            let first = first_column(self.grid.is_row_staggered(row));
            for col in first..8 {
                self.put(row, col);
            }
            self
        }

        fn resolve(&self, impact: Vec2, velocity: Vec2, struck: CellCoord) -> AttachTarget {
            resolve_attach(
                &self.grid,
                &self.geometry,
                impact,
                velocity,
                struck,
                self.center(struck),
            )
        }
    }

    #[test]
    fn test_hit_from_below_lands_underneath() {
        let mut f = Fixture::new();
        f.full_row(0).put(1, 3).put(1, 4);

        let struck = CellCoord::new(1, 3);
        assert_eq!(f.center(struck), Vec2::new(160.0, 84.0));

        let target = f.resolve(Vec2::new(165.0, 114.0), Vec2::new(0.0, -1.0), struck);
        assert_eq!(target.cell, CellCoord::new(2, 3));
        assert_eq!(target.position, Vec2::new(180.0, 118.0));
        assert_eq!(target.position, f.center(target.cell));
    }

    #[test]
    fn test_side_hit_lands_in_same_row() {
        let mut f = Fixture::new();
        f.full_row(0).put(1, 3);

        let target = f.resolve(Vec2::new(175.0, 84.0), Vec2::new(1.0, 0.0), CellCoord::new(1, 3));
        assert_eq!(target.cell, CellCoord::new(1, 4));
        assert_eq!(target.position, Vec2::new(200.0, 84.0));
    }

    #[test]
    fn test_vertical_tie_goes_right() {
        let mut f = Fixture::new();
        f.full_row(0).put(1, 3);

        let target = f.resolve(Vec2::new(160.0, 84.0), Vec2::ZERO, CellCoord::new(1, 3));
        assert_eq!(target.cell, CellCoord::new(1, 4));
    }

    #[test]
    fn test_left_edge_of_staggered_row_walks_down_and_clamps() {
        let mut f = Fixture::new();
        f.full_row(0).put(1, 1);

        let target = f.resolve(Vec2::new(70.0, 84.0), Vec2::new(-1.0, 0.0), CellCoord::new(1, 1));
        assert_eq!(target.cell, CellCoord::new(2, 0));
        assert_eq!(target.position, Vec2::new(60.0, 118.0));
    }

    #[test]
    fn test_entering_staggered_row_to_the_left_keeps_column() {
        let mut f = Fixture::new();
        f.full_row(0).full_row(1).put(2, 3);

        let struck = CellCoord::new(2, 3);
        assert_eq!(f.center(struck), Vec2::new(180.0, 118.0));

        let target = f.resolve(Vec2::new(175.0, 140.0), Vec2::new(0.0, -1.0), struck);
        assert_eq!(target.cell, CellCoord::new(3, 3));
        assert_eq!(target.position, f.center(target.cell));
    }

    #[test]
    fn test_occupied_target_walks_further_away() {
        let mut f = Fixture::new();
        f.full_row(0).full_row(1).full_row(2);

        // (2,3) and (3,4) down and to the right of the struck bubble are taken.
        f.put(3, 4);
        let target = f.resolve(Vec2::new(165.0, 114.0), Vec2::new(0.0, -1.0), CellCoord::new(1, 3));
        assert_eq!(target.cell, CellCoord::new(4, 4));
        assert_eq!(target.position, Vec2::new(220.0, 186.0));
        assert_eq!(target.position, f.center(target.cell));
    }

    #[test]
    fn test_walk_off_the_top_restarts_below() {
        let mut f = Fixture::new();
        f.full_row(0).full_row(1);

        // Hit row 1 from above-left; (0,*) is full, so the walk continues downward.
        let target = f.resolve(Vec2::new(150.0, 60.0), Vec2::new(0.0, 1.0), CellCoord::new(1, 3));
        assert!(target.cell.row >= 2);
        assert!(!f.grid.get_at(target.cell).is_occupied());
    }

    #[test]
    fn test_resolved_cell_is_never_occupied() {
        let mut f = Fixture::new();
        for row in 0..5 {
            f.full_row(row);
        }

        for row in 1..5 {
            let first = first_column(f.grid.is_row_staggered(row));
            for col in first..8 {
                let struck = CellCoord::new(row, col);
                let center = f.center(struck);
                for (offset, velocity) in [
                    (Vec2::new(-15.0, 30.0), Vec2::new(0.3, -1.0)),
                    (Vec2::new(15.0, 30.0), Vec2::new(-0.3, -1.0)),
                    (Vec2::new(-38.0, 0.0), Vec2::new(1.0, 0.0)),
                    (Vec2::new(38.0, 0.0), Vec2::new(-1.0, 0.0)),
                    (Vec2::new(5.0, -30.0), Vec2::new(0.0, 1.0)),
                ] {
                    let target = f.resolve(center + offset, velocity, struck);
                    assert!(
                        !f.grid.get_at(target.cell).is_occupied(),
                        "{} hit at {:?} resolved to occupied {}",
                        struck,
                        offset,
                        target.cell
                    );
                    let staggered = f.grid.is_row_staggered(target.cell.row);
                    assert!(target.cell.col >= first_column(staggered));
                    assert!(target.cell.col <= f.geometry.last_column());
                }
            }
        }
    }
}
