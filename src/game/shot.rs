//! The shot token - who may touch the grid right now.
//!
//! A shot moves through `Idle -> InFlight -> Resolving -> Mutating ->
//! Animating -> Idle`. While it is anywhere but `Idle` the grid counts as
//! busy and the descent scheduler holds off. Dangling bubbles knocked loose
//! by a pop keep falling here after they left the grid; the token only
//! returns to `Idle` once every fall has finished.

use bevy::prelude::*;

use super::bubble::Bubble;

pub(super) fn plugin(app: &mut App) {
    app.register_type::<ShotPhase>();
    app.init_resource::<ShotFlow>();
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Reflect)]
pub enum ShotPhase {
    #[default]
    Idle,
    /// Fired, waiting for the collision.
    InFlight,
    /// Working out which cell the bubble lands in.
    Resolving,
    /// Placing the bubble and removing whatever it popped.
    Mutating,
    /// Grid is settled; presentation is still playing out.
    Animating { remaining_ms: f32 },
}

/// A bubble dropped off the grid, on its way out.
#[derive(Debug, Clone, PartialEq)]
pub struct Falling {
    pub bubble: Bubble,
    pub remaining_ms: f32,
}

#[derive(Resource, Debug, Default)]
pub struct ShotFlow {
    phase: ShotPhase,
    falling: Vec<Falling>,
}

impl ShotFlow {
    pub fn phase(&self) -> ShotPhase {
        self.phase
    }

    /// Whether the grid must not be spawned into or lowered.
    pub fn is_shooting(&self) -> bool {
        self.phase != ShotPhase::Idle
    }

    pub fn falling(&self) -> &[Falling] {
        &self.falling
    }

    /// Claim the token for a new shot. Fails while a previous shot is
    /// still being processed.
    pub fn fire(&mut self) -> bool {
        if self.is_shooting() {
            return false;
        }
        self.phase = ShotPhase::InFlight;
        true
    }

    pub fn enter(&mut self, phase: ShotPhase) {
        self.phase = phase;
    }

    /// Hold the token for `hold_ms`, and for as long as any of `falling`
    /// is still in the air.
    pub fn animate(&mut self, hold_ms: f32, falling: Vec<Falling>) {
        let remaining_ms = match self.phase {
            ShotPhase::Animating { remaining_ms } => remaining_ms.max(hold_ms),
            _ => hold_ms,
        };
        self.phase = ShotPhase::Animating { remaining_ms };
        self.falling.extend(falling);
    }

    /// Let time pass. Returns the bubbles whose fall just ended.
    pub fn advance(&mut self, dt_ms: f32) -> Vec<Bubble> {
        let mut landed = Vec::new();
        let mut index = 0;
        while index < self.falling.len() {
            self.falling[index].remaining_ms -= dt_ms;
            if self.falling[index].remaining_ms <= 0.0 {
                landed.push(self.falling.swap_remove(index).bubble);
            } else {
                index += 1;
            }
        }

        if let ShotPhase::Animating { remaining_ms } = &mut self.phase {
            *remaining_ms -= dt_ms;
            if *remaining_ms <= 0.0 && self.falling.is_empty() {
                self.phase = ShotPhase::Idle;
            }
        }

        landed
    }

    /// Drop everything in progress, handing back bubbles still falling.
    pub fn reset(&mut self) -> Vec<Bubble> {
        self.phase = ShotPhase::Idle;
        self.falling.drain(..).map(|f| f.bubble).collect()
    }
}
