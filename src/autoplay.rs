//! A stand-in for the shooter and the physics: aims at the lowest bubbles
//! and reports a hit from below, a few times a second.

use bevy::prelude::*;
use rand::{Rng, seq::IndexedRandom};

use bubble_grid::{
    game::{
        bubble::BubbleColor,
        engine::{BubbleCollided, CollisionTarget, GridEngine, GridSystems, ShotFired},
        settings::GridSettings,
        shot::ShotFlow,
        state::RoundEnded,
    },
    screens::Screen,
};

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Startup, start_round);
    app.add_systems(
        Update,
        (
            aim_and_fire
                .before(GridSystems::Attach)
                .run_if(in_state(Screen::Gameplay).and(resource_exists::<GridEngine>)),
            exit_when_round_ends,
        ),
    );
}

/// Seconds between shots.
const SHOT_INTERVAL: f32 = 0.4;

/// Chance the shot matches the bubble it aims at.
const MATCH_CHANCE: f64 = 0.6;

fn start_round(mut next_screen: ResMut<NextState<Screen>>) {
    next_screen.set(Screen::Gameplay);
}

fn aim_and_fire(
    time: Res<Time>,
    mut cooldown: Local<f32>,
    engine: Res<GridEngine>,
    shot: Res<ShotFlow>,
    settings: Res<GridSettings>,
    mut fired: MessageWriter<ShotFired>,
    mut collided: MessageWriter<BubbleCollided>,
) {
    *cooldown -= time.delta_secs();
    if *cooldown > 0.0 || shot.is_shooting() {
        return;
    }
    *cooldown = SHOT_INTERVAL;

    let mut rng = rand::rng();
    let lowest_y = engine
        .grid()
        .iter()
        .map(|(_, bubble)| bubble.position.y)
        .reduce(f32::max);
    let lowest: Vec<_> = engine
        .grid()
        .iter()
        .filter(|(_, bubble)| Some(bubble.position.y) == lowest_y)
        .map(|(_, bubble)| bubble)
        .collect();

    let collision = match lowest.choose(&mut rng) {
        Some(target) => {
            let color = if rng.random_bool(MATCH_CHANCE) {
                target.color
            } else {
                BubbleColor::random_from(&settings.palette, &mut rng).unwrap_or(target.color)
            };
            let offset = Vec2::new(
                rng.random_range(-10.0..10.0),
                engine.geometry().row_interval * 0.9,
            );
            BubbleCollided {
                impact: target.position + offset,
                velocity: Vec2::new(0.0, -1.0),
                color,
                target: CollisionTarget::Bubble(target.id),
            }
        }
        None => {
            let Some(color) = BubbleColor::random_from(&settings.palette, &mut rng) else {
                return;
            };
            let geometry = engine.geometry();
            BubbleCollided {
                impact: Vec2::new(
                    rng.random_range(geometry.leftmost_x()..geometry.rightmost_x()),
                    geometry.top,
                ),
                velocity: Vec2::new(0.0, -1.0),
                color,
                target: CollisionTarget::Ceiling,
            }
        }
    };

    debug!("Autoplay shot {:?} at {:?}", collision.color, collision.impact);
    fired.write(ShotFired);
    collided.write(collision);
}

fn exit_when_round_ends(mut ended: MessageReader<RoundEnded>, mut exit: MessageWriter<AppExit>) {
    for round in ended.read() {
        info!(
            "Round over: {:?} with {} points",
            round.outcome, round.score
        );
        exit.write(AppExit::Success);
    }
}
