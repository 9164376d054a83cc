//! Row generation - what colors the next top row gets.

use bevy::prelude::*;
use rand::{Rng, seq::SliceRandom};

use super::{bubble::BubbleColor, settings::GridSettings};

/// A finite budget of bubbles the generator may still emit.
///
/// Asking for `n` grants at most `n`; the remaining population never drops
/// below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnModel {
    population: u32,
}

impl SpawnModel {
    pub fn new(population: u32) -> Self {
        Self { population }
    }

    pub fn population(&self) -> u32 {
        self.population
    }

    /// Take up to `count` bubbles out of the budget.
    pub fn get_next(&mut self, count: u32) -> u32 {
        let granted = count.min(self.population);
        self.population -= granted;
        granted
    }
}

/// Produces new rows of random colors.
#[derive(Debug, Clone)]
pub struct RowGenerator {
    palette: Vec<BubbleColor>,
    model: Option<SpawnModel>,
}

impl RowGenerator {
    pub fn new(palette: Vec<BubbleColor>) -> Self {
        Self {
            palette,
            model: None,
        }
    }

    /// Cap the total number of bubbles this generator emits.
    pub fn with_budget(mut self, model: SpawnModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn from_settings(settings: &GridSettings) -> Self {
        let generator = Self::new(settings.palette.clone());
        match settings.population {
            Some(population) => generator.with_budget(SpawnModel::new(population)),
            None => generator,
        }
    }

    pub fn model(&self) -> Option<&SpawnModel> {
        self.model.as_ref()
    }

    /// Generate the slots of one row.
    ///
    /// A staggered row has one fewer visual slot and starts with an empty
    /// placeholder at column 0, so the result always has `bubbles_per_row`
    /// entries. When the budget grants fewer bubbles than there are visual
    /// slots, the granted bubbles are scattered across the row.
    pub fn generate_row<R: Rng + ?Sized>(
        &mut self,
        staggered: bool,
        bubbles_per_row: usize,
        rng: &mut R,
    ) -> Vec<Option<BubbleColor>> {
        let visual = if staggered {
            bubbles_per_row.saturating_sub(1)
        } else {
            bubbles_per_row
        };

        if self.palette.is_empty() {
            warn!("Row generator has an empty palette, row stays empty");
            return vec![None; bubbles_per_row];
        }

        let granted = match self.model.as_mut() {
            Some(model) => model.get_next(visual as u32) as usize,
            None => visual,
        };

        let mut colors: Vec<Option<BubbleColor>> = (0..visual)
            .map(|i| {
                if i < granted {
                    BubbleColor::random_from(&self.palette, rng)
                } else {
                    None
                }
            })
            .collect();

        if granted < visual {
            colors.shuffle(rng);
        }

        let mut row = Vec::with_capacity(bubbles_per_row);
        if staggered {
            row.push(None);
        }
        row.extend(colors);
        row
    }
}
