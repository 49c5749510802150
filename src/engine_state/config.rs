//! # World Configuration
//!
//! Tunables for terrain shape, streaming and gravity. Every field has a default, so a JSON
//! file only needs to name the values it changes.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use web_time::Duration;

use super::error::{WorldError, WorldResult};

/// Largest accepted `chunk_size`.
pub const MAX_CHUNK_SIZE: i32 = 4096;

/// Largest accepted `render_distance`.
pub const MAX_RENDER_DISTANCE: i32 = 64;

/// World and engine settings.
///
/// # Examples
///
/// ```
/// use voxel_sandbox::engine_state::config::WorldConfig;
///
/// let config = WorldConfig::from_json_str(r#"{ "render_distance": 3 }"#).unwrap();
/// assert_eq!(config.render_distance, 3);
/// assert_eq!(config.chunk_size, 16);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Columns along each chunk edge.
    pub chunk_size: i32,
    /// Chunks kept resident around the observer (Chebyshev radius).
    pub render_distance: i32,
    /// Terrain height where the fractal noise is zero.
    pub sea_level: i32,
    /// Amplitude of terrain height around the sea level.
    pub max_height: i32,
    /// Interval between full gravity scans, in milliseconds.
    pub gravity_tick_interval_ms: u64,
    /// Vertical speed under which a falling block resettles.
    pub landing_velocity_threshold: f32,
    /// Chunk generation threads; 0 generates on the coordinating thread.
    pub worker_threads: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            chunk_size: 16,
            render_distance: 2,
            sea_level: 5,
            max_height: 15,
            gravity_tick_interval_ms: 1000,
            landing_velocity_threshold: 0.1,
            worker_threads: 4,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> WorldResult<Self> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> WorldResult<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Checks that every value is in range.
    pub fn validate(&self) -> WorldResult<()> {
        if !(1..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(WorldError::InvalidConfig(format!(
                "chunk_size must be between 1 and {}, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }
        if !(0..=MAX_RENDER_DISTANCE).contains(&self.render_distance) {
            return Err(WorldError::InvalidConfig(format!(
                "render_distance must be between 0 and {}, got {}",
                MAX_RENDER_DISTANCE, self.render_distance
            )));
        }
        if self.max_height < 0 {
            return Err(WorldError::InvalidConfig(format!(
                "max_height must not be negative, got {}",
                self.max_height
            )));
        }
        if self.gravity_tick_interval_ms == 0 {
            return Err(WorldError::InvalidConfig(
                "gravity_tick_interval_ms must be positive".to_string(),
            ));
        }
        if !(self.landing_velocity_threshold > 0.0) {
            return Err(WorldError::InvalidConfig(format!(
                "landing_velocity_threshold must be positive, got {}",
                self.landing_velocity_threshold
            )));
        }
        Ok(())
    }

    /// Interval between full gravity scans.
    pub fn gravity_tick_interval(&self) -> Duration {
        Duration::from_millis(self.gravity_tick_interval_ms)
    }
}
