//! Bubbles - the records held by grid cells.
//!
//! A bubble is plain data: a stable id, a color and a position in grid
//! space. Rendering handles live with the presentation layer and are looked
//! up by [`BubbleId`].

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::settings::GridSettings;

/// The concrete bubble colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Default, Serialize, Deserialize)]
pub enum BubbleColor {
    #[default]
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl BubbleColor {
    /// Get all possible bubble colors.
    pub const ALL: [BubbleColor; 6] = [
        BubbleColor::Red,
        BubbleColor::Blue,
        BubbleColor::Green,
        BubbleColor::Yellow,
        BubbleColor::Purple,
        BubbleColor::Orange,
    ];

    /// Pick a color uniformly from `palette`.
    ///
    /// Returns `None` for an empty palette.
    pub fn random_from<R: Rng + ?Sized>(palette: &[BubbleColor], rng: &mut R) -> Option<Self> {
        if palette.is_empty() {
            return None;
        }
        Some(palette[rng.random_range(0..palette.len())])
    }
}

/// A color as used in grid scans.
///
/// `Any` only ever appears in queries (connectivity scans), never on a
/// stored bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchColor {
    Concrete(BubbleColor),
    Any,
}

impl From<BubbleColor> for MatchColor {
    fn from(color: BubbleColor) -> Self {
        MatchColor::Concrete(color)
    }
}

/// Whether two colors count as the same during a scan.
pub fn colors_match(a: MatchColor, b: MatchColor) -> bool {
    match (a, b) {
        (MatchColor::Any, _) | (_, MatchColor::Any) => true,
        (MatchColor::Concrete(a), MatchColor::Concrete(b)) => a == b,
    }
}

/// Stable identity of a bubble, never reused within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub struct BubbleId(pub u64);

impl std::fmt::Display for BubbleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A bubble placed on (or falling from) the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub id: BubbleId,
    pub color: BubbleColor,
    /// Center in grid space (y grows downward).
    pub position: Vec2,
}

/// Dimensions of one bubble.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleSize {
    pub width: f32,
    pub height: f32,
}

impl BubbleSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.width * 0.5
    }
}

/// Hands out bubbles and takes them back when they leave the grid.
#[derive(Debug, Clone, Default)]
pub struct BubblePool {
    sample: Option<BubbleSize>,
    next_id: u64,
    active: usize,
    released: usize,
}

impl BubblePool {
    /// A pool whose bubbles measure `sample`.
    pub fn new(sample: BubbleSize) -> Self {
        let sample = (sample.width > 0.0 && sample.height > 0.0).then_some(sample);
        Self {
            sample,
            ..default()
        }
    }

    /// A pool with nothing to measure; a grid cannot be built from it.
    pub fn without_sample() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &GridSettings) -> Self {
        Self::new(BubbleSize::new(settings.bubble_width, settings.bubble_height))
    }

    /// The size every bubble from this pool has, if known.
    pub fn sample(&self) -> Option<BubbleSize> {
        self.sample
    }

    pub fn spawn(&mut self, color: BubbleColor, position: Vec2) -> Bubble {
        let id = BubbleId(self.next_id);
        self.next_id += 1;
        self.active += 1;
        Bubble {
            id,
            color,
            position,
        }
    }

    pub fn despawn(&mut self, bubble: Bubble) {
        if self.active == 0 {
            warn!("Despawning bubble {} from a pool with no active bubbles", bubble.id);
            return;
        }
        self.active -= 1;
        self.released += 1;
    }

    /// Bubbles handed out and not yet returned.
    pub fn count_active(&self) -> usize {
        self.active
    }

    /// Bubbles returned over the pool's lifetime.
    pub fn count_released(&self) -> usize {
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_wildcard_matches_everything() {
        for color in BubbleColor::ALL {
            assert!(colors_match(MatchColor::Any, color.into()));
            assert!(colors_match(color.into(), MatchColor::Any));
        }
        assert!(colors_match(MatchColor::Any, MatchColor::Any));
    }

    #[test]
    fn test_concrete_colors_match_only_themselves() {
        assert!(colors_match(BubbleColor::Red.into(), BubbleColor::Red.into()));
        assert!(!colors_match(BubbleColor::Red.into(), BubbleColor::Blue.into()));
    }

    #[test]
    fn test_random_from_stays_in_palette() {
        let mut rng = StdRng::seed_from_u64(3);
        let palette = [BubbleColor::Green, BubbleColor::Yellow];
        for _ in 0..50 {
            let color = BubbleColor::random_from(&palette, &mut rng).unwrap();
            assert!(palette.contains(&color));
        }
        assert_eq!(BubbleColor::random_from(&[], &mut rng), None);
    }

    #[test]
    fn test_pool_ids_are_never_reused() {
        let mut pool = BubblePool::new(BubbleSize::new(40.0, 34.0));
        let a = pool.spawn(BubbleColor::Red, Vec2::ZERO);
        let a_id = a.id;
        pool.despawn(a);
        let b = pool.spawn(BubbleColor::Red, Vec2::ZERO);
        assert_ne!(a_id, b.id);
        assert_eq!(pool.count_active(), 1);
        assert_eq!(pool.count_released(), 1);
    }

    #[test]
    fn test_degenerate_sample_is_no_sample() {
        assert!(BubblePool::new(BubbleSize::new(0.0, 10.0)).sample().is_none());
        assert!(BubblePool::without_sample().sample().is_none());
        assert_eq!(
            BubblePool::new(BubbleSize::new(40.0, 34.0)).sample().map(|s| s.radius()),
            Some(20.0)
        );
    }
}
