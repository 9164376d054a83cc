//! Grid tuning loaded from a local JSON file.
//!
//! Settings live in the user's config directory. Missing or broken files
//! fall back to the defaults below.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::bubble::BubbleColor;

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<GridSettings>();
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bubbles_per_row must be at least 2, got {0}")]
    TooFewColumns(usize),
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
}

/// Spawn interval used up to and including `up_to_level`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnRateStep {
    pub up_to_level: u32,
    pub interval_ms: u32,
}

/// Everything tunable about a round.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub bubbles_per_row: usize,
    /// Size of the sample bubble the grid is measured from.
    pub bubble_width: f32,
    pub bubble_height: f32,
    pub playfield_width: f32,
    pub playfield_height: f32,
    pub border_width: f32,
    pub side_gap: f32,
    /// Initial ceiling y.
    pub ceiling_y: f32,
    pub descent_interval: f32,
    pub initial_rows: usize,
    /// Smallest same-color group that pops.
    pub min_match: usize,
    pub palette: Vec<BubbleColor>,
    /// Total bubbles the row generator may ever emit. `None` is unlimited.
    pub population: Option<u32>,
    pub spawn_rates: Vec<SpawnRateStep>,
    pub fallback_spawn_interval_ms: u32,
    /// Levels at which the ceiling drops, ascending.
    pub descent_levels: Vec<u32>,
    pub snap_ms: f32,
    pub attach_settle_ms: f32,
    pub fall_ms_per_pixel: f32,
    /// The round is lost once the grid's bottom reaches this y.
    pub danger_line_y: f32,
    pub bubbles_per_level: u32,
    pub seed: Option<u64>,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            bubbles_per_row: 8,
            bubble_width: 40.0,
            bubble_height: 34.0,
            playfield_width: 400.0,
            playfield_height: 640.0,
            border_width: 22.0,
            side_gap: 3.0,
            ceiling_y: 30.0,
            descent_interval: 48.0,
            initial_rows: 6,
            min_match: 3,
            palette: vec![
                BubbleColor::Red,
                BubbleColor::Blue,
                BubbleColor::Green,
                BubbleColor::Yellow,
            ],
            population: None,
            spawn_rates: vec![
                SpawnRateStep {
                    up_to_level: 2,
                    interval_ms: 5500,
                },
                SpawnRateStep {
                    up_to_level: 5,
                    interval_ms: 3000,
                },
            ],
            fallback_spawn_interval_ms: 2000,
            descent_levels: vec![2, 5, 7, 9, 12, 15, 17, 18, 19, 20],
            snap_ms: 50.0,
            attach_settle_ms: 150.0,
            fall_ms_per_pixel: 0.75,
            danger_line_y: 560.0,
            bubbles_per_level: 30,
            seed: None,
        }
    }
}

impl GridSettings {
    /// Reject settings the grid cannot be laid out with.
    ///
    /// A staggered row needs at least one usable column past its
    /// placeholder, and every measurement the geometry divides by or steps
    /// with has to be positive.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.bubbles_per_row < 2 {
            return Err(SettingsError::TooFewColumns(self.bubbles_per_row));
        }
        for (field, value) in [
            ("bubble_width", self.bubble_width),
            ("bubble_height", self.bubble_height),
            ("playfield_width", self.playfield_width),
            ("playfield_height", self.playfield_height),
            ("descent_interval", self.descent_interval),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(SettingsError::NonPositive { field, value });
            }
        }
        Ok(())
    }

    /// Get the file path for storing settings.
    fn file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bubble-grid").join("settings.json"))
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the config directory, or defaults.
    pub fn load() -> Self {
        let Some(path) = Self::file_path() else {
            warn!("Could not determine config directory for grid settings");
            return Self::default();
        };

        if !path.exists() {
            info!("No grid settings at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => {
                info!("Loaded grid settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to load grid settings: {}", e);
                Self::default()
            }
        }
    }

    /// Save settings to the config directory.
    pub fn save(&self) {
        let Some(path) = Self::file_path() else {
            warn!("Could not determine config directory for saving grid settings");
            return;
        };

        match self.save_to(&path) {
            Ok(()) => info!("Saved grid settings to {:?}", path),
            Err(e) => warn!("Failed to save grid settings: {}", e),
        }
    }

    /// Save settings to a specific file, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
