//! Descent scheduler - rows keep coming, and the ceiling keeps dropping.
//!
//! Elapsed time accumulates every frame. Once it reaches the current
//! level's spawn interval a spawn wave is requested and the interval is
//! subtracted, keeping the overshoot. Independently, each entry in the
//! descent milestone list lowers the ceiling once when the level reaches
//! it. Neither happens while a shot holds the grid.

use bevy::prelude::*;

use super::{
    engine::{GridEngine, GridSystems},
    settings::{GridSettings, SpawnRateStep},
    shot::ShotFlow,
    state::GameLevel,
};
use crate::{PausableSystems, screens::Screen};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<SpawnCountdown>();
    app.init_resource::<SpawnCountdown>();
    app.add_message::<CountdownChanged>();

    app.add_systems(
        Update,
        tick_scheduler
            .in_set(GridSystems::Schedule)
            .in_set(PausableSystems)
            .run_if(
                in_state(Screen::Gameplay)
                    .and(resource_exists::<GridEngine>)
                    .and(resource_exists::<DescentScheduler>),
            ),
    );
}

/// Whole seconds until the next automatic spawn.
#[derive(Resource, Debug, Default, Reflect)]
#[reflect(Resource)]
pub struct SpawnCountdown(pub u32);

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownChanged {
    pub seconds: u32,
}

/// What one scheduler update asks for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTick {
    pub spawn_wave: bool,
    pub descend: bool,
    /// Set only when the whole-second countdown changed.
    pub countdown: Option<u32>,
}

#[derive(Resource, Debug, Clone)]
pub struct DescentScheduler {
    elapsed_ms: f32,
    milestone: usize,
    last_countdown: Option<u32>,
    spawn_rates: Vec<SpawnRateStep>,
    fallback_ms: u32,
    descent_levels: Vec<u32>,
}

impl DescentScheduler {
    pub fn new(settings: &GridSettings) -> Self {
        Self {
            elapsed_ms: 0.0,
            milestone: 0,
            last_countdown: None,
            spawn_rates: settings.spawn_rates.clone(),
            fallback_ms: settings.fallback_spawn_interval_ms,
            descent_levels: settings.descent_levels.clone(),
        }
    }

    pub fn elapsed_ms(&self) -> f32 {
        self.elapsed_ms
    }

    /// Index of the next descent milestone.
    pub fn milestone(&self) -> usize {
        self.milestone
    }

    /// Milliseconds between automatic row spawns at `level`. Steps are
    /// checked in order; levels past the last step use the fallback.
    pub fn spawn_rate_ms(&self, level: u32) -> u32 {
        self.spawn_rates
            .iter()
            .find(|step| level <= step.up_to_level)
            .map_or(self.fallback_ms, |step| step.interval_ms)
    }

    pub fn update(&mut self, dt_ms: f32, level: u32, shooting: bool) -> SchedulerTick {
        let mut tick = SchedulerTick::default();
        let rate = self.spawn_rate_ms(level) as f32;
        self.elapsed_ms += dt_ms;

        if !shooting && self.elapsed_ms >= rate {
            self.elapsed_ms -= rate;
            tick.spawn_wave = true;
        }

        if !shooting
            && self
                .descent_levels
                .get(self.milestone)
                .is_some_and(|&milestone| level >= milestone)
        {
            self.milestone += 1;
            tick.descend = true;
        }

        let seconds = ((rate - self.elapsed_ms) / 1000.0).ceil().max(0.0) as u32;
        if self.last_countdown != Some(seconds) {
            self.last_countdown = Some(seconds);
            tick.countdown = Some(seconds);
        }

        tick
    }
}

fn tick_scheduler(
    time: Res<Time>,
    level: Res<GameLevel>,
    shot: Res<ShotFlow>,
    mut scheduler: ResMut<DescentScheduler>,
    mut engine: ResMut<GridEngine>,
    mut countdown: ResMut<SpawnCountdown>,
    mut changed: MessageWriter<CountdownChanged>,
) {
    let tick = scheduler.update(
        time.delta_secs() * 1000.0,
        level.level,
        shot.is_shooting(),
    );

    if tick.spawn_wave {
        engine.spawn_next_wave();
    }
    if tick.descend {
        engine.descend();
    }
    if let Some(seconds) = tick.countdown {
        countdown.0 = seconds;
        changed.write(CountdownChanged { seconds });
    }
}
