//! # Persistence
//!
//! The save format and a directory of named saves.
//!
//! A save holds the seed and the overlay only. Terrain is regenerated from the seed on
//! load, which keeps saves small no matter how far the observer has travelled.
//!
//! ```json
//! {
//!   "name": "island",
//!   "version": "2.0",
//!   "seed": 12345,
//!   "overlayBlocks": [{ "position": [5, 10, 5], "material": "glass" }],
//!   "removedTerrain": [[0, 5, 0]],
//!   "observerPosition": [0.0, 10.0, 0.0],
//!   "createdAt": 1760000000,
//!   "lastPlayed": 1760000000
//! }
//! ```

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use cgmath::Point3;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use web_time::SystemTime;

use super::{
    error::{WorldError, WorldResult},
    voxels::block::{BlockPosition, BlockRecord, MaterialId},
};

/// Version written into every save.
pub const SAVE_VERSION: &str = "2.0";

/// Where the observer starts when a save does not say.
pub const DEFAULT_OBSERVER_POSITION: [f64; 3] = [0.0, 10.0, 0.0];

const SAVE_EXTENSION: &str = "json";

/// One overlay block as stored on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedBlock {
    /// Cell coordinates; must be integral.
    pub position: [f64; 3],
    /// Block material.
    pub material: MaterialId,
}

/// Everything needed to rebuild a world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveData {
    /// Name the world was saved under.
    #[serde(default)]
    pub name: String,
    /// Format version.
    #[serde(default = "current_version")]
    pub version: String,
    /// Terrain seed.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Player-placed blocks.
    #[serde(default)]
    pub overlay_blocks: Vec<SavedBlock>,
    /// Broken terrain cells.
    #[serde(default)]
    pub removed_terrain: Vec<[f64; 3]>,
    /// Observer position.
    #[serde(default = "default_observer_position")]
    pub observer_position: [f64; 3],
    /// Creation time, Unix seconds.
    #[serde(default)]
    pub created_at: u64,
    /// Last load or save, Unix seconds.
    #[serde(default)]
    pub last_played: u64,
}

fn current_version() -> String {
    SAVE_VERSION.to_string()
}

fn default_observer_position() -> [f64; 3] {
    DEFAULT_OBSERVER_POSITION
}

/// A save that passed validation, in world types.
#[derive(Clone, Debug, PartialEq)]
pub struct RestoredWorld {
    /// Terrain seed.
    pub seed: u64,
    /// Overlay blocks in save order.
    pub blocks: Vec<BlockRecord>,
    /// Broken terrain cells.
    pub removed_terrain: Vec<BlockPosition>,
    /// Observer position.
    pub observer_position: Point3<f32>,
}

impl SaveData {
    /// Captures a world for saving. `last_played` is set to now.
    pub fn capture(
        seed: u64,
        blocks: &[BlockRecord],
        removed_terrain: &[BlockPosition],
        observer_position: Point3<f32>,
        created_at: u64,
    ) -> Self {
        SaveData {
            name: String::new(),
            version: current_version(),
            seed: Some(seed),
            overlay_blocks: blocks
                .iter()
                .map(|block| SavedBlock {
                    position: cell_to_array(block.position),
                    material: block.material,
                })
                .collect(),
            removed_terrain: removed_terrain.iter().copied().map(cell_to_array).collect(),
            observer_position: [
                observer_position.x as f64,
                observer_position.y as f64,
                observer_position.z as f64,
            ],
            created_at,
            last_played: unix_now(),
        }
    }

    /// Parses a save from JSON without validating it.
    pub fn from_json_str(json: &str) -> WorldResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the save as indented JSON.
    pub fn to_json_pretty(&self) -> WorldResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates the save and converts it into world types.
    ///
    /// # Errors
    /// - `UnsupportedVersion` if the version is not [`SAVE_VERSION`]
    /// - `MissingSeed` if there is no seed
    /// - `InvalidSaveData` if a coordinate is not finite or a cell is not integral
    pub fn decode(&self) -> WorldResult<RestoredWorld> {
        if self.version != SAVE_VERSION {
            return Err(WorldError::UnsupportedVersion(self.version.clone()));
        }
        let seed = self.seed.ok_or(WorldError::MissingSeed)?;

        let blocks = self
            .overlay_blocks
            .iter()
            .enumerate()
            .map(|(index, block)| {
                let position = array_to_cell(block.position, "overlay block", index)?;
                Ok(BlockRecord::new(position, block.material))
            })
            .collect::<WorldResult<Vec<_>>>()?;

        let removed_terrain = self
            .removed_terrain
            .iter()
            .enumerate()
            .map(|(index, position)| array_to_cell(*position, "removed terrain cell", index))
            .collect::<WorldResult<Vec<_>>>()?;

        let [x, y, z] = self.observer_position;
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(WorldError::InvalidSaveData(format!(
                "observer position {:?} is not finite",
                self.observer_position
            )));
        }

        Ok(RestoredWorld {
            seed,
            blocks,
            removed_terrain,
            observer_position: Point3::new(x as f32, y as f32, z as f32),
        })
    }
}

fn cell_to_array(position: BlockPosition) -> [f64; 3] {
    [position.x as f64, position.y as f64, position.z as f64]
}

fn array_to_cell(position: [f64; 3], what: &str, index: usize) -> WorldResult<BlockPosition> {
    let mut cell = [0i32; 3];
    for (axis, value) in position.iter().enumerate() {
        if !value.is_finite()
            || value.fract() != 0.0
            || *value < i32::MIN as f64
            || *value > i32::MAX as f64
        {
            return Err(WorldError::InvalidSaveData(format!(
                "{} {} has invalid position {:?}",
                what, index, position
            )));
        }
        cell[axis] = *value as i32;
    }
    Ok(BlockPosition::new(cell[0], cell[1], cell[2]))
}

/// Seconds since the Unix epoch, or 0 if the clock is before it.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Listing entry for a stored world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldSummary {
    /// Save name.
    pub name: String,
    /// Terrain seed, if the save has one.
    pub seed: Option<u64>,
    /// Creation time, Unix seconds.
    pub created_at: u64,
    /// Last load or save, Unix seconds.
    pub last_played: u64,
}

/// A directory of named saves, one JSON file per world.
pub struct SaveDirectory {
    root: PathBuf,
}

impl SaveDirectory {
    /// Opens `root`, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> WorldResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(SaveDirectory { root })
    }

    /// The directory saves live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> WorldResult<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !valid {
            return Err(WorldError::InvalidSaveData(format!(
                "invalid world name {:?}",
                name
            )));
        }
        Ok(self.root.join(format!("{}.{}", name, SAVE_EXTENSION)))
    }

    fn read(&self, name: &str) -> WorldResult<SaveData> {
        let path = self.path_for(name)?;
        let json = fs::read_to_string(&path).map_err(|error| match error.kind() {
            ErrorKind::NotFound => WorldError::WorldNotFound(name.to_string()),
            _ => WorldError::Io(error),
        })?;
        SaveData::from_json_str(&json)
    }

    /// Writes `data` under `name`, replacing any previous save of that name.
    pub fn save(&self, name: &str, data: &SaveData) -> WorldResult<()> {
        let path = self.path_for(name)?;
        let mut data = data.clone();
        data.name = name.to_string();
        fs::write(&path, data.to_json_pretty()?)?;
        info!("Saved world {:?} to {}", name, path.display());
        Ok(())
    }

    /// Reads and validates the save called `name`, and records that it was played now.
    ///
    /// # Errors
    /// `WorldNotFound` if there is no such save; any `SaveData::decode` error if it is
    /// malformed. A malformed save is left untouched on disk.
    pub fn load(&self, name: &str) -> WorldResult<SaveData> {
        let mut data = self.read(name)?;
        data.decode()?;
        data.last_played = unix_now();
        self.save(name, &data)?;
        Ok(data)
    }

    /// Every readable save, sorted by name. Unreadable files are skipped.
    pub fn list(&self) -> WorldResult<Vec<WorldSummary>> {
        let mut worlds = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SAVE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match self.read(name) {
                Ok(data) => worlds.push(WorldSummary {
                    name: name.to_string(),
                    seed: data.seed,
                    created_at: data.created_at,
                    last_played: data.last_played,
                }),
                Err(error) => warn!("Skipping unreadable save {}: {}", path.display(), error),
            }
        }
        worlds.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(worlds)
    }

    /// Deletes the save called `name`.
    pub fn delete(&self, name: &str) -> WorldResult<()> {
        let path = self.path_for(name)?;
        fs::remove_file(&path).map_err(|error| match error.kind() {
            ErrorKind::NotFound => WorldError::WorldNotFound(name.to_string()),
            _ => WorldError::Io(error),
        })?;
        info!("Deleted world {:?}", name);
        Ok(())
    }

    /// The save called `name` as indented JSON, for sharing outside the directory.
    pub fn export(&self, name: &str) -> WorldResult<String> {
        self.read(name)?.to_json_pretty()
    }
}
