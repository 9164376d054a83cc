//! The bubble grid engine.
//!
//! This module contains all the grid logic including:
//! - Staggered-row storage and geometry
//! - Row generation from a color palette and optional population budget
//! - Attach resolution for incoming shots
//! - Match and dangling detection
//! - The shot token and the descent scheduler
//! - Round state: score, level, win and loss

pub mod attach;
pub mod bubble;
pub mod cluster;
pub mod descent;
pub mod engine;
pub mod grid;
pub mod hex;
pub mod layout;
pub mod settings;
pub mod shot;
pub mod state;

use bevy::prelude::*;

use self::{
    bubble::BubblePool,
    descent::DescentScheduler,
    engine::{GridEngine, GridWriters},
    settings::GridSettings,
    shot::ShotFlow,
};
use crate::screens::Screen;

pub(super) fn plugin(app: &mut App) {
    app.add_plugins((
        settings::plugin,
        shot::plugin,
        engine::plugin,
        descent::plugin,
        state::plugin,
    ));

    app.add_systems(OnEnter(Screen::Gameplay), start_round);
    app.add_systems(OnExit(Screen::Gameplay), end_round);
}

/// Build the round's grid when entering gameplay.
fn start_round(
    mut commands: Commands,
    settings: Res<GridSettings>,
    mut shot: ResMut<ShotFlow>,
    mut next_screen: ResMut<NextState<Screen>>,
) {
    *shot = ShotFlow::default();

    let mut engine = match GridEngine::new(&settings, BubblePool::from_settings(&settings)) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Cannot start round: {}", e);
            next_screen.set(Screen::Title);
            return;
        }
    };
    engine.generate_initial_bubbles(settings.initial_rows);

    commands.insert_resource(DescentScheduler::new(&settings));
    commands.insert_resource(engine);
    info!("Round started");
}

/// Close the grid and publish its last messages.
fn end_round(
    mut commands: Commands,
    engine: Option<ResMut<GridEngine>>,
    mut shot: ResMut<ShotFlow>,
    mut writers: GridWriters,
) {
    if let Some(mut engine) = engine {
        engine.close(&mut shot);
        writers.publish(engine.drain_events());
    }
    commands.remove_resource::<GridEngine>();
    commands.remove_resource::<DescentScheduler>();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bevy::state::app::StatesPlugin;

    use super::*;
    use crate::{
        AppPlugin,
        game::{
            bubble::BubbleColor,
            engine::{
                BubbleCollided, BubblesAdded, BubblesDestroyed, CollisionTarget, GridClosed,
                GridSystems, ShotFired, WaveSpawned,
            },
            descent::{CountdownChanged, SpawnCountdown},
            shot::ShotPhase,
            hex::CellCoord,
            state::{GameScore, RoundEnded, RoundOutcome},
        },
    };

    #[derive(Resource, Default)]
    struct Seen {
        destroyed: Vec<BubblesDestroyed>,
        waves: usize,
        added: usize,
        countdowns: Vec<u32>,
        closed: usize,
        ended: Vec<RoundEnded>,
    }

    fn collect(
        mut seen: ResMut<Seen>,
        mut destroyed: MessageReader<BubblesDestroyed>,
        mut waves: MessageReader<WaveSpawned>,
        mut added: MessageReader<BubblesAdded>,
        mut countdowns: MessageReader<CountdownChanged>,
        mut closed: MessageReader<GridClosed>,
        mut ended: MessageReader<RoundEnded>,
    ) {
        seen.destroyed.extend(destroyed.read().copied());
        seen.waves += waves.read().count();
        seen.added += added.read().map(|event| event.count).sum::<usize>();
        seen.countdowns
            .extend(countdowns.read().map(|event| event.seconds));
        seen.closed += closed.read().count();
        seen.ended.extend(ended.read().copied());
    }

    fn settings() -> GridSettings {
        GridSettings {
            seed: Some(11),
            ..default()
        }
    }

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins(StatesPlugin);
        app.insert_resource(settings());
        app.add_plugins(AppPlugin);
        app.init_resource::<Time>();
        app.init_resource::<Seen>();
        app.add_systems(Update, collect.after(GridSystems::Flush));
        app
    }

    fn start(app: &mut App) {
        app.update();
        app.world_mut()
            .resource_mut::<NextState<Screen>>()
            .set(Screen::Gameplay);
        app.update();
    }

    fn advance(app: &mut App, ms: u64) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_millis(ms));
        app.update();
    }

    /// Row 0 all red, row 1 green with blue at columns 3 and 4.
    fn triangle_board() -> GridEngine {
        let settings = settings();
        let mut engine = GridEngine::new(&settings, BubblePool::from_settings(&settings)).unwrap();
        for col in 0..8 {
            engine.place(CellCoord::new(0, col), BubbleColor::Red);
        }
        for col in 1..8 {
            let color = if col == 3 || col == 4 {
                BubbleColor::Blue
            } else {
                BubbleColor::Green
            };
            engine.place(CellCoord::new(1, col), color);
        }
        engine
    }

    #[test]
    fn test_round_starts_with_initial_rows() {
        let mut app = app();
        start(&mut app);

        let engine = app.world().resource::<GridEngine>();
        assert_eq!(engine.grid().row_count(), settings().initial_rows);
        assert_eq!(app.world().resource::<Seen>().waves, settings().initial_rows);
        assert!(app.world().contains_resource::<DescentScheduler>());
    }

    #[test]
    fn test_time_brings_a_spawn_wave() {
        let mut app = app();
        start(&mut app);
        let initial = app.world().resource::<GridEngine>().total_bubbles();
        assert_eq!(app.world().resource::<Seen>().added, initial);

        // Level 1 spawns every 5500 ms.
        advance(&mut app, 3000);
        assert_eq!(app.world().resource::<Seen>().waves, settings().initial_rows);

        advance(&mut app, 3000);
        let seen = app.world().resource::<Seen>();
        assert_eq!(seen.waves, settings().initial_rows + 1);
        assert_eq!(
            seen.added,
            app.world().resource::<GridEngine>().total_bubbles()
        );
        assert_eq!(seen.countdowns, vec![6, 3, 5]);
        assert_eq!(app.world().resource::<SpawnCountdown>().0, 5);
    }

    #[test]
    fn test_second_shot_waits_and_holds_the_scheduler() {
        let mut app = app();
        start(&mut app);

        app.world_mut().write_message(ShotFired);
        app.world_mut().write_message(ShotFired);
        app.update();
        assert_eq!(
            app.world().resource::<ShotFlow>().phase(),
            ShotPhase::InFlight
        );

        advance(&mut app, 6000);
        assert_eq!(app.world().resource::<Seen>().waves, settings().initial_rows);
        assert!(app.world().resource::<ShotFlow>().is_shooting());
    }

    #[test]
    fn test_collision_message_pops_and_scores() {
        let mut app = app();
        start(&mut app);
        app.world_mut().insert_resource(triangle_board());

        let struck = app
            .world()
            .resource::<GridEngine>()
            .grid()
            .get_at(CellCoord::new(1, 3))
            .bubble()
            .unwrap()
            .id;
        app.world_mut().write_message(ShotFired);
        app.world_mut().write_message(BubbleCollided {
            impact: Vec2::new(165.0, 114.0),
            velocity: Vec2::new(0.0, -1.0),
            color: BubbleColor::Blue,
            target: CollisionTarget::Bubble(struck),
        });
        app.update();

        assert_eq!(
            app.world().resource::<Seen>().destroyed,
            vec![BubblesDestroyed {
                count: 3,
                dangling: 0
            }]
        );
        assert_eq!(app.world().resource::<GameScore>().score, 30);
        assert!(app.world().resource::<ShotFlow>().is_shooting());

        advance(&mut app, 100);
        assert!(!app.world().resource::<ShotFlow>().is_shooting());
    }

    #[test]
    fn test_reaching_danger_line_ends_round() {
        let mut app = app();
        start(&mut app);

        let mut engine = triangle_board();
        engine.place(CellCoord::new(15, 3), BubbleColor::Yellow);
        app.world_mut().insert_resource(engine);

        app.update();
        app.update();

        let seen = app.world().resource::<Seen>();
        assert_eq!(seen.ended.len(), 1);
        assert_eq!(seen.ended[0].outcome, RoundOutcome::Lost);
        assert_eq!(seen.closed, 1);
        assert!(!app.world().contains_resource::<GridEngine>());
        assert_eq!(
            *app.world().resource::<State<Screen>>().get(),
            Screen::Title
        );
    }
}
