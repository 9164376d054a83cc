//! Headless demo: plays one round with an autoplayer and exits.

mod autoplay;

use std::time::Duration;

use bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*, state::app::StatesPlugin};
use bubble_grid::AppPlugin;

fn main() -> AppExit {
    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 60.0,
            ))),
            LogPlugin::default(),
            StatesPlugin,
            AppPlugin,
            autoplay::plugin,
        ))
        .run()
}
