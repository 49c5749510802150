#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Sandbox
//!
//! The simulation core of a voxel sandbox: infinite terrain generated deterministically
//! from a seed, streamed in chunks around a moving observer, and overlaid with player edits
//! that obey a simple support rule.
//!
//! ## Key Modules
//!
//! * `engine_state` - The coordinating loop, configuration, errors and persistence
//! * `engine_state::voxels` - Noise, terrain, chunks, streaming, the overlay and gravity
//! * `engine_state::task_management` - Worker pool for chunk generation
//!
//! ## Architecture
//!
//! Rendering, input and rigid-body physics are external collaborators. The core hands
//! them a merged block list, answers per-cell solidity queries, and accepts velocity
//! reports for falling blocks. Only the seed and the overlay are ever saved; terrain is
//! regenerated on demand.
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     voxel_sandbox::run();
//! }
//! ```

use std::{env, path::PathBuf};

use cgmath::Point3;
use engine_state::{
    config::WorldConfig,
    error::WorldResult,
    persistence::SaveDirectory,
    voxels::{
        block::{BlockPosition, MaterialId},
        gravity::KinematicFall,
    },
    EngineState,
};
use log::{error, info};

pub mod engine_state;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "VOXEL_SANDBOX_CONFIG";

/// Environment variable naming the directory saves are written to.
pub const SAVE_DIR_ENV: &str = "VOXEL_SANDBOX_SAVE_DIR";

/// Name of the world written by the headless run.
pub const HEADLESS_WORLD_NAME: &str = "headless";

const FALL_STEP_SECONDS: f32 = 1.0 / 60.0;
const MAX_FALL_STEPS: usize = 60 * 30;

/// Runs a headless session and logs what happens.
///
/// The session walks the observer across a few chunks, drops a block of a random material
/// from the sky, simulates its fall until it settles, and saves the result.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    if let Err(err) = run_headless() {
        error!("Headless run failed: {}", err);
    }
}

fn run_headless() -> WorldResult<()> {
    let config = match env::var_os(CONFIG_ENV) {
        Some(path) => WorldConfig::from_json_file(PathBuf::from(path))?,
        None => WorldConfig::default(),
    };
    let save_root = env::var_os(SAVE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("voxel-sandbox"));

    let mut engine = EngineState::new_world(config, None)?;
    info!("Seed: {}", engine.seed());

    let chunk_size = engine.config().chunk_size as f32;
    for step in 0..4 {
        let x = step as f32 * chunk_size + 0.5;
        if let Some(plan) = engine.update_observer(Point3::new(x, 10.0, 0.5)) {
            info!(
                "Observer at x={}: {} chunk(s) requested, {} evicted",
                x,
                plan.to_load.len(),
                plan.to_evict.len()
            );
        }
        engine.flush_tasks();
    }
    info!(
        "{} chunk(s) resident, {} visible block(s)",
        engine.world().chunks().len(),
        engine.visible_blocks().len()
    );

    let drop_at = BlockPosition::new(48, 40, 0);
    let material = MaterialId::random();
    engine.place_block(drop_at, material);
    engine.gravity_tick();

    let mut simulator = KinematicFall::default();
    let mut steps = 0;
    while !engine.falling_blocks().is_empty() && steps < MAX_FALL_STEPS {
        engine.step_falling(&mut simulator, FALL_STEP_SECONDS);
        steps += 1;
    }
    match engine
        .world()
        .overlay()
        .iter()
        .find(|block| block.position.x == drop_at.x && block.position.z == drop_at.z)
    {
        Some(block) => info!(
            "{} settled at ({}, {}, {}) after {} step(s)",
            block.material, block.position.x, block.position.y, block.position.z, steps
        ),
        None => info!("{} still falling after {} step(s)", material, steps),
    }

    let saves = SaveDirectory::open(save_root)?;
    saves.save(HEADLESS_WORLD_NAME, &engine.save_data())?;
    info!(
        "{} world(s) in {}",
        saves.list()?.len(),
        saves.root().display()
    );
    Ok(())
}
