//! Game tuning and host preferences
//!
//! Persisted as JSON. Every field has a default, so a partial file is fine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable naming a settings file
pub const SETTINGS_ENV: &str = "TETRIS_RELOADED_SETTINGS";

/// Settings load/save failure
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Board tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Piece RNG seed; `None` picks a fresh one per session
    pub seed: Option<u64>,

    // === Settling heuristics (empirical) ===
    /// Consecutive illegal/ground steps before a stuck piece is committed
    pub stuck_step_limit: u32,
    /// A piece falling slower than `expected speed + margin` is committed
    pub settle_velocity_margin: f32,

    // === Controls ===
    /// Soft drop speed as a multiple of the mode's fall speed
    pub soft_drop_multiplier: f32,

    // === Host ===
    /// Steps the headless host runs after each input line
    pub frames_per_line: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: None,

            stuck_step_limit: 20,
            settle_velocity_margin: 1.0,

            soft_drop_multiplier: 3.0,

            frames_per_line: 1,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = serde_json::from_str(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Read settings, falling back to defaults on any failure
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load(path).unwrap_or_else(|e| {
                log::warn!("{}; using default settings", e);
                Self::default()
            }),
            None => {
                log::info!("Using default settings");
                Self::default()
            }
        }
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// The configured seed, or a random one
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}
