//! The game's main screen states.
//!
//! A round lives exactly as long as [`Screen::Gameplay`].

use bevy::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.init_state::<Screen>();
    app.add_systems(OnEnter(Screen::Title), log_title);
}

#[derive(States, Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Screen {
    #[default]
    Title,
    Gameplay,
}

fn log_title() {
    debug!("Entered title screen");
}
