//! A bubble-shooter grid engine for bevy.
//!
//! Add [`AppPlugin`] to an app that already has bevy's states support to
//! get the grid, the descent scheduler and round handling. Settings come
//! from the user's config directory unless a [`GridSettings`] resource is
//! inserted first. The shooter,
//! physics and rendering talk to it through the messages in
//! [`game::engine`].

pub mod game;
pub mod screens;

use bevy::prelude::*;

use game::settings::GridSettings;

pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<GridSettings>() {
            app.insert_resource(GridSettings::load());
        }

        // Set up the `Pause` state.
        app.init_state::<Pause>();
        app.configure_sets(Update, PausableSystems.run_if(in_state(Pause(false))));

        app.add_plugins((screens::plugin, game::plugin));
    }
}

/// Whether or not the game is paused.
#[derive(States, Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Pause(pub bool);

/// A system set for systems that shouldn't run while the game is paused.
#[derive(SystemSet, Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PausableSystems;
