//! Round state - score, level and how the round ends.
//!
//! Win: clear every bubble below the anchor row after popping at least once.
//! Lose: the bottom of the grid reaches the danger line.

use bevy::prelude::*;

use super::{
    engine::{BubblesDestroyed, GridEngine, GridSystems},
    settings::GridSettings,
};
use crate::{PausableSystems, screens::Screen};

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<GameScore>();
    app.init_resource::<GameLevel>();
    app.register_type::<GameScore>();
    app.register_type::<GameLevel>();
    app.add_message::<RoundEnded>();

    app.add_systems(OnEnter(Screen::Gameplay), reset_round_state);

    app.add_systems(
        Update,
        (update_score, update_level, check_round_outcome)
            .chain()
            .after(GridSystems::Flush)
            .in_set(PausableSystems)
            .run_if(in_state(Screen::Gameplay).and(resource_exists::<GridEngine>)),
    );
}

/// Points awarded per bubble popped in a match.
const POINTS_PER_BUBBLE: u32 = 10;

/// Bonus multiplier for dangling bubbles.
const DANGLING_BONUS_MULTIPLIER: u32 = 2;

/// Resource tracking the current game score.
#[derive(Resource, Debug, Default, Reflect)]
#[reflect(Resource)]
pub struct GameScore {
    pub score: u32,
    pub bubbles_popped: u32,
    pub pops: u32,
}

impl GameScore {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Score one pop.
    pub fn record(&mut self, destroyed: &BubblesDestroyed) -> u32 {
        let matched = destroyed.count.saturating_sub(destroyed.dangling) as u32;
        let dangling = destroyed.dangling as u32;
        let points =
            matched * POINTS_PER_BUBBLE + dangling * POINTS_PER_BUBBLE * DANGLING_BONUS_MULTIPLIER;
        self.score += points;
        self.bubbles_popped += destroyed.count as u32;
        self.pops += 1;
        points
    }
}

/// Difficulty level. Drives the spawn rate and the ceiling descents.
#[derive(Resource, Debug, Reflect)]
#[reflect(Resource)]
pub struct GameLevel {
    pub level: u32,
    /// Bubbles destroyed since the last level up.
    pub progress: u32,
}

impl Default for GameLevel {
    fn default() -> Self {
        Self {
            level: 1,
            progress: 0,
        }
    }
}

impl GameLevel {
    /// Count destroyed bubbles toward the next level. Returns how many
    /// levels were gained.
    pub fn add_progress(&mut self, destroyed: u32, bubbles_per_level: u32) -> u32 {
        if bubbles_per_level == 0 {
            return 0;
        }
        self.progress += destroyed;
        let gained = self.progress / bubbles_per_level;
        self.progress %= bubbles_per_level;
        self.level += gained;
        gained
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum RoundOutcome {
    Won,
    Lost,
}

/// The round is over.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundEnded {
    pub outcome: RoundOutcome,
    pub score: u32,
}

fn reset_round_state(mut score: ResMut<GameScore>, mut level: ResMut<GameLevel>) {
    score.reset();
    *level = GameLevel::default();
    info!("Score and level reset");
}

fn update_score(mut score: ResMut<GameScore>, mut destroyed: MessageReader<BubblesDestroyed>) {
    for event in destroyed.read() {
        let points = score.record(event);
        info!(
            "Popped {} bubbles ({} dangling), +{} points (total: {})",
            event.count, event.dangling, points, score.score
        );
    }
}

fn update_level(
    settings: Res<GridSettings>,
    mut level: ResMut<GameLevel>,
    mut destroyed: MessageReader<BubblesDestroyed>,
) {
    for event in destroyed.read() {
        if level.add_progress(event.count as u32, settings.bubbles_per_level) > 0 {
            info!("Level up! Now level {}", level.level);
        }
    }
}

fn check_round_outcome(
    engine: Res<GridEngine>,
    settings: Res<GridSettings>,
    score: Res<GameScore>,
    mut next_screen: ResMut<NextState<Screen>>,
    mut ended: MessageWriter<RoundEnded>,
) {
    let outcome = if engine.bottom().is_some_and(|y| y >= settings.danger_line_y) {
        RoundOutcome::Lost
    } else if score.pops > 0 && engine.grid().iter().all(|(cell, _)| cell.row == 0) {
        RoundOutcome::Won
    } else {
        return;
    };

    match outcome {
        RoundOutcome::Won => info!("WIN! Grid cleared! Final score: {}", score.score),
        RoundOutcome::Lost => info!(
            "GAME OVER! Bubbles reached the danger line. Final score: {}",
            score.score
        ),
    }
    ended.write(RoundEnded {
        outcome,
        score: score.score,
    });
    next_screen.set(Screen::Title);
}
