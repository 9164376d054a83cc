//! The grid engine - one round's grid and everything that mutates it.
//!
//! [`GridEngine`] owns the storage, geometry, bubble pool and row generator
//! and exposes the round's operations: initial fill, spawn waves, ceiling
//! descents and shot attachment. Every operation mutates the grid first and
//! only then queues the matching [`GridEvent`]s, so observers always see the
//! grid as it already is. The queued events are turned into bevy messages
//! by [`flush_grid_events`] once per frame.

use std::collections::HashSet;

use bevy::{ecs::system::SystemParam, prelude::*};
use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;

use super::{
    attach::{AttachTarget, resolve_attach},
    bubble::{Bubble, BubbleColor, BubbleId, BubblePool},
    cluster::{Jiggle, find_dangling, find_matches, jiggle_neighbors},
    grid::{BubbleGrid, GridRow},
    hex::{CellCoord, GridGeometry},
    layout::RowGenerator,
    settings::{GridSettings, SettingsError},
    shot::{Falling, ShotFlow, ShotPhase},
};
use crate::{PausableSystems, screens::Screen};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<ShotFired>();
    app.add_message::<BubbleCollided>();
    app.add_message::<BubblesDestroyed>();
    app.add_message::<BubblesAdded>();
    app.add_message::<BubbleAttached>();
    app.add_message::<BubbleWillBeDestroyed>();
    app.add_message::<DanglingWillBeDestroyed>();
    app.add_message::<NeighborsJiggled>();
    app.add_message::<WaveSpawned>();
    app.add_message::<CeilingLowered>();
    app.add_message::<GridClosed>();

    app.configure_sets(
        Update,
        (
            GridSystems::Attach,
            GridSystems::Animate,
            GridSystems::Schedule,
            GridSystems::Flush,
        )
            .chain(),
    );

    app.add_systems(
        Update,
        (
            handle_collisions.in_set(GridSystems::Attach),
            advance_shot_animations.in_set(GridSystems::Animate),
            flush_grid_events.in_set(GridSystems::Flush),
        )
            .in_set(PausableSystems)
            .run_if(in_state(Screen::Gameplay).and(resource_exists::<GridEngine>)),
    );
}

/// Ordering of the per-frame grid work.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridSystems {
    /// Fired shots and collisions.
    Attach,
    /// Animation holds and falling bubbles.
    Animate,
    /// Automatic spawn waves and ceiling descents.
    Schedule,
    /// Queued grid events out to messages.
    Flush,
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error("bubble pool has no sample bubble to measure the grid from")]
    MissingSample,
    #[error("unusable grid settings: {0}")]
    Settings(#[from] SettingsError),
}

/// The shooter launched a bubble.
#[derive(Message, Debug, Clone)]
pub struct ShotFired;

/// What a shot ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionTarget {
    Bubble(BubbleId),
    Ceiling,
}

/// A shot touched the grid.
#[derive(Message, Debug, Clone)]
pub struct BubbleCollided {
    pub impact: Vec2,
    pub velocity: Vec2,
    pub color: BubbleColor,
    pub target: CollisionTarget,
}

/// Bubbles were removed by a pop. `dangling` of them were knocked loose.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubblesDestroyed {
    pub count: usize,
    pub dangling: usize,
}

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubblesAdded {
    pub count: usize,
}

#[derive(Message, Debug, Clone)]
pub struct BubbleAttached {
    pub bubble: Bubble,
    pub cell: CellCoord,
}

#[derive(Message, Debug, Clone)]
pub struct BubbleWillBeDestroyed {
    pub bubble: Bubble,
}

#[derive(Message, Debug, Clone)]
pub struct DanglingWillBeDestroyed {
    pub bubble: Bubble,
}

#[derive(Message, Debug, Clone)]
pub struct NeighborsJiggled {
    pub jiggles: Vec<Jiggle>,
}

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveSpawned {
    pub bubbles: usize,
}

#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct CeilingLowered {
    pub top: f32,
}

/// The round's grid is gone. Nothing else is sent after this.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridClosed;

/// Something the grid did, waiting to be published.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    BubblesDestroyed { count: usize, dangling: usize },
    BubblesAdded(usize),
    BubbleAttached { bubble: Bubble, cell: CellCoord },
    BubbleWillBeDestroyed(Bubble),
    DanglingWillBeDestroyed(Bubble),
    NeighborsJiggled(Vec<Jiggle>),
    WaveSpawned(usize),
    CeilingLowered(f32),
    Closed,
}

/// Result of asking for a new top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSpawn {
    /// No row generator configured.
    NoLayout,
    /// The generator had nothing left to give.
    Exhausted,
    /// The grid is closed.
    Closed,
    Spawned(usize),
}

/// What an attach did to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached {
        cell: CellCoord,
        bubble: BubbleId,
    },
    Popped {
        cell: CellCoord,
        matched: usize,
        dangling: usize,
    },
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Timings {
    snap_ms: f32,
    settle_ms: f32,
    fall_ms_per_pixel: f32,
    fall_to_y: f32,
}

#[derive(Resource, Debug)]
pub struct GridEngine {
    grid: BubbleGrid,
    geometry: GridGeometry,
    pool: BubblePool,
    layout: Option<RowGenerator>,
    rng: StdRng,
    min_match: usize,
    timings: Timings,
    events: Vec<GridEvent>,
    closed: bool,
}

impl GridEngine {
    /// Build an empty grid measured from the pool's sample bubble.
    pub fn new(settings: &GridSettings, pool: BubblePool) -> Result<Self, GridError> {
        settings.validate()?;
        let sample = pool.sample().ok_or(GridError::MissingSample)?;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        Ok(Self {
            grid: BubbleGrid::new(),
            geometry: GridGeometry::new(sample, settings),
            pool,
            layout: Some(RowGenerator::from_settings(settings)),
            rng,
            min_match: settings.min_match,
            timings: Timings {
                snap_ms: settings.snap_ms,
                settle_ms: settings.attach_settle_ms,
                fall_ms_per_pixel: settings.fall_ms_per_pixel,
                fall_to_y: settings.playfield_height * 0.9,
            },
            events: Vec::new(),
            closed: false,
        })
    }

    pub fn grid(&self) -> &BubbleGrid {
        &self.grid
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn pool(&self) -> &BubblePool {
        &self.pool
    }

    pub fn layout(&self) -> Option<&RowGenerator> {
        self.layout.as_ref()
    }

    pub fn set_layout(&mut self, layout: Option<RowGenerator>) {
        self.layout = layout;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn total_bubbles(&self) -> usize {
        self.grid.bubble_count()
    }

    /// Lowest edge of any bubble on the grid.
    pub fn bottom(&self) -> Option<f32> {
        self.grid
            .iter()
            .map(|(_, bubble)| bubble.position.y)
            .reduce(f32::max)
            .map(|y| y + self.geometry.radius())
    }

    /// Height the rows span below the ceiling.
    pub fn height(&self) -> f32 {
        self.grid.row_count() as f32 * self.geometry.row_interval
    }

    /// Resting center of a cell.
    pub fn cell_center(&self, cell: CellCoord) -> Vec2 {
        let staggered = self.grid.is_row_staggered(cell.row);
        Vec2::new(
            self.geometry.column_x(cell.col, staggered),
            self.geometry.first_row_y() + cell.row as f32 * self.geometry.row_interval,
        )
    }

    /// The cell whose center is nearest to `point`, ignoring occupancy.
    pub fn nearest_cell(&self, point: Vec2) -> CellCoord {
        let row = ((point.y - self.geometry.first_row_y()) / self.geometry.row_interval)
            .round()
            .max(0.0) as i32;
        let col = self
            .geometry
            .nearest_column(point.x, self.grid.is_row_staggered(row));
        CellCoord::new(row, col)
    }

    fn emit(&mut self, event: GridEvent) {
        if !self.closed {
            self.events.push(event);
        }
    }

    /// Take everything queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<GridEvent> {
        std::mem::take(&mut self.events)
    }

    /// Put a bubble straight into a cell, replacing any occupant.
    pub fn place(&mut self, cell: CellCoord, color: BubbleColor) -> BubbleId {
        let bubble = self.pool.spawn(color, self.cell_center(cell));
        let id = bubble.id;
        match self.grid.insert_at(cell, bubble) {
            Some(rejected) if rejected.id == id => {
                warn!("Could not place bubble at {}", cell);
                self.pool.despawn(rejected);
            }
            Some(previous) => self.pool.despawn(previous),
            None => {}
        }
        id
    }

    /// Shift every bubble on the grid down by `dy`.
    pub fn move_by(&mut self, dy: f32) {
        for bubble in self.grid.bubbles_mut() {
            bubble.position.y += dy;
        }
    }

    /// Push everything down one row and add a fresh row at the top.
    pub fn spawn_next_wave(&mut self) -> RowSpawn {
        if self.closed {
            return RowSpawn::Closed;
        }
        let Some(layout) = self.layout.as_mut() else {
            return RowSpawn::NoLayout;
        };

        let staggered = self.grid.is_row_staggered(-1);
        let colors = layout.generate_row(staggered, self.geometry.bubbles_per_row, &mut self.rng);
        if colors.iter().all(Option::is_none) {
            debug!("Row generator is exhausted");
            return RowSpawn::Exhausted;
        }

        self.move_by(self.geometry.row_interval);

        let y = self.geometry.first_row_y();
        let slots: Vec<Option<Bubble>> = colors
            .into_iter()
            .enumerate()
            .map(|(col, color)| {
                color.map(|color| {
                    let x = self.geometry.column_x(col as i32, staggered);
                    self.pool.spawn(color, Vec2::new(x, y))
                })
            })
            .collect();
        let spawned = slots.iter().flatten().count();
        self.grid.push_front(GridRow::from_slots(staggered, slots));

        debug!("Spawned a row of {} bubbles", spawned);
        self.emit(GridEvent::BubblesAdded(spawned));
        self.emit(GridEvent::WaveSpawned(spawned));
        RowSpawn::Spawned(spawned)
    }

    /// Fill the grid for a new round with `rows` spawn waves.
    ///
    /// Returns how many bubbles were added; stops early when the generator
    /// runs dry.
    pub fn generate_initial_bubbles(&mut self, rows: usize) -> usize {
        let mut total = 0;
        for _ in 0..rows {
            match self.spawn_next_wave() {
                RowSpawn::Spawned(n) => total += n,
                other => {
                    debug!("Initial fill stopped early: {:?}", other);
                    break;
                }
            }
        }
        info!("Generated {} initial bubbles", total);
        total
    }

    /// Drop the ceiling for good, taking the whole grid with it.
    pub fn descend(&mut self) {
        if self.closed {
            return;
        }
        let dy = self.geometry.descent_interval;
        self.geometry.top += dy;
        self.move_by(dy);
        info!("Ceiling lowered to {}", self.geometry.top);
        self.emit(GridEvent::CeilingLowered(self.geometry.top));
    }

    fn resolve(&self, collision: &BubbleCollided) -> AttachTarget {
        let struck = match collision.target {
            CollisionTarget::Bubble(id) => {
                let found = self.grid.find(id).and_then(|cell| {
                    self.grid
                        .get_at(cell)
                        .bubble()
                        .map(|bubble| (cell, bubble.position))
                });
                if found.is_none() {
                    warn!("Collision with bubble {} that is no longer on the grid", id);
                }
                found
            }
            CollisionTarget::Ceiling => None,
        };

        let (cell, center) = match struck {
            Some(struck) => struck,
            None => {
                let cell = self.nearest_cell(collision.impact);
                let center = self.cell_center(cell);
                if !self.grid.get_at(cell).is_occupied() {
                    return AttachTarget {
                        cell,
                        position: center,
                    };
                }
                (cell, center)
            }
        };

        resolve_attach(
            &self.grid,
            &self.geometry,
            collision.impact,
            collision.velocity,
            cell,
            center,
        )
    }

    /// Attach a shot to the grid and pop whatever it completes.
    pub fn attach_bubble(&mut self, shot: &mut ShotFlow, collision: &BubbleCollided) -> AttachOutcome {
        if self.closed {
            return AttachOutcome::Rejected;
        }

        shot.enter(ShotPhase::Resolving);
        let target = self.resolve(collision);

        shot.enter(ShotPhase::Mutating);
        let bubble = self.pool.spawn(collision.color, target.position);
        let id = bubble.id;
        if let Some(displaced) = self.grid.insert_at(target.cell, bubble.clone()) {
            warn!("Attach displaced bubble {} at {}", displaced.id, target.cell);
            self.pool.despawn(displaced);
        }

        let matches = find_matches(
            &self.grid,
            target.cell,
            collision.color.into(),
            &mut HashSet::new(),
        );

        if matches.len() < self.min_match {
            let jiggles = jiggle_neighbors(&self.grid, target.cell);
            self.emit(GridEvent::BubblesAdded(1));
            self.emit(GridEvent::BubbleAttached {
                bubble,
                cell: target.cell,
            });
            if !jiggles.is_empty() {
                self.emit(GridEvent::NeighborsJiggled(jiggles));
            }
            shot.animate(self.timings.snap_ms + self.timings.settle_ms, Vec::new());
            return AttachOutcome::Attached {
                cell: target.cell,
                bubble: id,
            };
        }

        let matched = self.grid.remove_at(&matches);
        let matched_count = matched.len();
        for bubble in matched {
            self.emit(GridEvent::BubbleWillBeDestroyed(bubble.clone()));
            self.pool.despawn(bubble);
        }

        let dangling_cells = find_dangling(&self.grid);
        let dangling = self.grid.remove_at(&dangling_cells);
        let dangling_count = dangling.len();
        self.grid.prune_empty_rows();

        let falling = dangling
            .into_iter()
            .map(|bubble| Falling {
                remaining_ms: (self.timings.fall_to_y - bubble.position.y).max(0.0)
                    * self.timings.fall_ms_per_pixel,
                bubble,
            })
            .collect();

        info!(
            "Popped {} {:?} bubbles at {}, {} dangling",
            matched_count, collision.color, target.cell, dangling_count
        );
        self.emit(GridEvent::BubblesDestroyed {
            count: matched_count + dangling_count,
            dangling: dangling_count,
        });
        shot.animate(self.timings.snap_ms, falling);

        AttachOutcome::Popped {
            cell: target.cell,
            matched: matched_count,
            dangling: dangling_count,
        }
    }

    /// Advance animations; bubbles that finished falling leave for good.
    pub fn advance(&mut self, shot: &mut ShotFlow, dt_ms: f32) {
        for bubble in shot.advance(dt_ms) {
            self.emit(GridEvent::BubbleWillBeDestroyed(bubble.clone()));
            self.emit(GridEvent::DanglingWillBeDestroyed(bubble.clone()));
            self.pool.despawn(bubble);
        }
    }

    /// Tear the grid down. Emits [`GridEvent::Closed`] once; further calls
    /// and operations do nothing.
    pub fn close(&mut self, shot: &mut ShotFlow) {
        if self.closed {
            return;
        }
        for bubble in shot.reset().into_iter().chain(self.grid.clear()) {
            self.pool.despawn(bubble);
        }
        self.emit(GridEvent::Closed);
        self.closed = true;
        info!("Grid closed");
    }
}

/// All outbound grid messages.
#[derive(SystemParam)]
pub struct GridWriters<'w> {
    destroyed: MessageWriter<'w, BubblesDestroyed>,
    added: MessageWriter<'w, BubblesAdded>,
    attached: MessageWriter<'w, BubbleAttached>,
    will_be_destroyed: MessageWriter<'w, BubbleWillBeDestroyed>,
    dangling: MessageWriter<'w, DanglingWillBeDestroyed>,
    jiggled: MessageWriter<'w, NeighborsJiggled>,
    waves: MessageWriter<'w, WaveSpawned>,
    ceiling: MessageWriter<'w, CeilingLowered>,
    closed: MessageWriter<'w, GridClosed>,
}

impl GridWriters<'_> {
    pub fn publish(&mut self, events: Vec<GridEvent>) {
        for event in events {
            match event {
                GridEvent::BubblesDestroyed { count, dangling } => {
                    self.destroyed.write(BubblesDestroyed { count, dangling });
                }
                GridEvent::BubblesAdded(count) => {
                    self.added.write(BubblesAdded { count });
                }
                GridEvent::BubbleAttached { bubble, cell } => {
                    self.attached.write(BubbleAttached { bubble, cell });
                }
                GridEvent::BubbleWillBeDestroyed(bubble) => {
                    self.will_be_destroyed.write(BubbleWillBeDestroyed { bubble });
                }
                GridEvent::DanglingWillBeDestroyed(bubble) => {
                    self.dangling.write(DanglingWillBeDestroyed { bubble });
                }
                GridEvent::NeighborsJiggled(jiggles) => {
                    self.jiggled.write(NeighborsJiggled { jiggles });
                }
                GridEvent::WaveSpawned(bubbles) => {
                    self.waves.write(WaveSpawned { bubbles });
                }
                GridEvent::CeilingLowered(top) => {
                    self.ceiling.write(CeilingLowered { top });
                }
                GridEvent::Closed => {
                    self.closed.write(GridClosed);
                }
            }
        }
    }
}

fn handle_collisions(
    mut engine: ResMut<GridEngine>,
    mut shot: ResMut<ShotFlow>,
    mut fired: MessageReader<ShotFired>,
    mut collisions: MessageReader<BubbleCollided>,
) {
    for _ in fired.read() {
        if !shot.fire() {
            warn!("Shot fired while the previous one is still in progress");
        }
    }

    for collision in collisions.read() {
        engine.attach_bubble(&mut shot, collision);
    }
}

fn advance_shot_animations(
    time: Res<Time>,
    mut engine: ResMut<GridEngine>,
    mut shot: ResMut<ShotFlow>,
) {
    engine.advance(&mut shot, time.delta_secs() * 1000.0);
}

fn flush_grid_events(mut engine: ResMut<GridEngine>, mut writers: GridWriters) {
    let events = engine.drain_events();
    if !events.is_empty() {
        writers.publish(events);
    }
}
