//! # Gravity System
//!
//! Enforces the support rule on overlay blocks: a static block above the ground floor
//! needs an occupied cell directly beneath it.
//!
//! ## Lifecycle
//!
//! ```text
//! Resting --(loses support)--> Falling --(speed < threshold)--> Resting (new cell)
//! ```
//!
//! Support loss is detected in two ways:
//! - [`GravitySystem::tick`]: a full scan of the overlay, run on a fixed interval
//! - [`GravitySystem::check_around`]: a local check of the five cells above a mutated cell,
//!   run right after a place or break
//!
//! Both work from a snapshot: blocks that lose support because another block just started
//! falling are picked up by the next scan, never by recursion. A stack therefore collapses
//! one block per check, bottom first.
//!
//! Falling motion itself belongs to an external simulator. The coordinating loop pulls a
//! [`FallReport`] per falling block from a [`FallSimulator`] and feeds it back through
//! [`GravitySystem::apply_report`]. Generated terrain is never scanned; it is assumed to be
//! consistent as generated.

use cgmath::{Point3, Vector3};
use log::{debug, trace, warn};

use super::{
    block::{BlockPosition, MaterialId, SupportQuery, GROUND_FLOOR},
    overlay::{BlockId, BlockOverlay, LayeredSupport},
};

/// Cells whose support may depend on a mutated cell: directly above, and the four
/// horizontal neighbours of that.
pub const SUPPORT_CHECK_OFFSETS: [(i32, i32, i32); 5] =
    [(0, 1, 0), (1, 1, 0), (-1, 1, 0), (0, 1, 1), (0, 1, -1)];

/// Default vertical speed under which a falling block counts as landed.
pub const DEFAULT_LANDING_THRESHOLD: f32 = 0.1;

/// A block that has left the overlay and is moving.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FallingBlock {
    /// Id the block had while resting.
    pub id: BlockId,
    /// Cell the block fell from.
    pub origin: BlockPosition,
    /// What the block is made of.
    pub material: MaterialId,
    /// Last reported position.
    pub position: Point3<f32>,
    /// Last reported vertical velocity.
    pub vertical_velocity: f32,
    /// Whether any report so far showed the block moving.
    has_moved: bool,
}

/// One simulator update for one falling block.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FallReport {
    /// Which block the report is for.
    pub id: BlockId,
    /// Position after the step.
    pub position: Point3<f32>,
    /// Velocity after the step.
    pub velocity: Vector3<f32>,
}

/// What a report did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FallOutcome {
    /// The block is still falling.
    Falling,
    /// The block came to rest and was placed back into the overlay.
    Landed {
        /// Id of the block while it was falling.
        previous: BlockId,
        /// Id of the new overlay block.
        id: BlockId,
        /// Cell it rests in.
        position: BlockPosition,
    },
    /// No falling block had that id.
    Unknown,
}

/// Advances falling blocks. Implemented by the physics collaborator.
///
/// The simulator is told only which cells are solid; it owns acceleration and collision.
pub trait FallSimulator {
    /// Advances `block` by `dt` seconds and reports where it ended up.
    fn step(&mut self, block: &FallingBlock, dt: f32, world: &dyn SupportQuery) -> FallReport;
}

/// Tracks falling blocks and moves blocks between the overlay and the falling set.
pub struct GravitySystem {
    falling: Vec<FallingBlock>,
    landing_threshold: f32,
}

impl GravitySystem {
    /// Creates a gravity system that resettles blocks slower than `landing_threshold`.
    pub fn new(landing_threshold: f32) -> Self {
        GravitySystem {
            falling: Vec::new(),
            landing_threshold,
        }
    }

    /// Blocks currently falling, in the order they started.
    pub fn falling(&self) -> &[FallingBlock] {
        &self.falling
    }

    /// Whether the block with `id` is falling.
    pub fn is_falling(&self, id: BlockId) -> bool {
        self.falling.iter().any(|block| block.id == id)
    }

    /// Forgets every falling block.
    pub fn clear(&mut self) {
        self.falling.clear();
    }

    /// Scans the whole overlay and starts every unsupported block falling.
    ///
    /// # Arguments
    /// * `overlay` - Static blocks; unsupported ones are removed from it
    /// * `terrain` - Generated terrain underneath the overlay
    ///
    /// # Returns
    /// Ids of the blocks that started falling, in ascending order.
    pub fn tick(&mut self, overlay: &mut BlockOverlay, terrain: &dyn SupportQuery) -> Vec<BlockId> {
        let mut unsupported: Vec<BlockId> = {
            let support = LayeredSupport {
                overlay: &*overlay,
                terrain,
            };
            overlay
                .iter()
                .filter(|block| !is_supported(block.position, &support))
                .map(|block| block.id)
                .collect()
        };
        unsupported.sort();

        for id in &unsupported {
            self.begin_falling(*id, overlay);
        }
        if !unsupported.is_empty() {
            debug!("Gravity tick: {} block(s) started falling", unsupported.len());
        }
        unsupported
    }

    /// Checks the cells that could have lost support because `position` changed.
    ///
    /// Neighbours outside the `i32` range are skipped.
    ///
    /// # Returns
    /// Ids of the blocks that started falling.
    pub fn check_around(
        &mut self,
        position: BlockPosition,
        overlay: &mut BlockOverlay,
        terrain: &dyn SupportQuery,
    ) -> Vec<BlockId> {
        let unsupported: Vec<BlockId> = {
            let support = LayeredSupport {
                overlay: &*overlay,
                terrain,
            };
            SUPPORT_CHECK_OFFSETS
                .iter()
                .filter_map(|&(dx, dy, dz)| {
                    Some(Point3::new(
                        position.x.checked_add(dx)?,
                        position.y.checked_add(dy)?,
                        position.z.checked_add(dz)?,
                    ))
                })
                .filter_map(|neighbour| overlay.get_at(neighbour))
                .filter(|block| !is_supported(block.position, &support))
                .map(|block| block.id)
                .collect()
        };

        for id in &unsupported {
            self.begin_falling(*id, overlay);
        }
        unsupported
    }

    /// Applies one simulator report.
    ///
    /// A block resettles once its vertical speed drops below the landing threshold, provided
    /// it has been seen moving or is already resting on something; a block that has not
    /// started accelerating yet is left alone. The landing cell is the reported position
    /// rounded to the nearest cell, halves upward. If that cell is taken, the block stacks
    /// onto the first free cell above it.
    pub fn apply_report(
        &mut self,
        report: FallReport,
        overlay: &mut BlockOverlay,
        terrain: &dyn SupportQuery,
    ) -> FallOutcome {
        let Some(index) = self.falling.iter().position(|block| block.id == report.id) else {
            trace!("Ignoring report for unknown falling block {}", report.id);
            return FallOutcome::Unknown;
        };

        let block = &mut self.falling[index];
        block.position = report.position;
        block.vertical_velocity = report.velocity.y;

        if report.velocity.y.abs() >= self.landing_threshold {
            block.has_moved = true;
            return FallOutcome::Falling;
        }

        let cell = landing_cell(report.position);
        let support = LayeredSupport {
            overlay: &*overlay,
            terrain,
        };
        if !block.has_moved && !is_supported(cell, &support) {
            return FallOutcome::Falling;
        }
        let Some(cell) = first_free_cell(cell, &support) else {
            warn!(
                "No free cell above ({}, {}, {}) for block {}",
                cell.x, cell.y, cell.z, report.id
            );
            return FallOutcome::Falling;
        };

        let landed = self.falling.remove(index);
        let id = overlay.place(cell, landed.material);
        debug!(
            "Block {} landed at ({}, {}, {}) as {}",
            landed.id, cell.x, cell.y, cell.z, id
        );
        FallOutcome::Landed {
            previous: landed.id,
            id,
            position: cell,
        }
    }

    /// Steps every falling block through `simulator` and applies the reports.
    ///
    /// # Returns
    /// One outcome per block that was falling when the call started.
    pub fn step(
        &mut self,
        simulator: &mut dyn FallSimulator,
        dt: f32,
        overlay: &mut BlockOverlay,
        terrain: &dyn SupportQuery,
    ) -> Vec<FallOutcome> {
        let reports: Vec<FallReport> = {
            let support = LayeredSupport {
                overlay: &*overlay,
                terrain,
            };
            self.falling
                .iter()
                .map(|block| simulator.step(block, dt, &support))
                .collect()
        };

        reports
            .into_iter()
            .map(|report| self.apply_report(report, overlay, terrain))
            .collect()
    }

    fn begin_falling(&mut self, id: BlockId, overlay: &mut BlockOverlay) {
        if let Some(block) = overlay.remove(id) {
            trace!(
                "Block {} at ({}, {}, {}) lost support",
                id,
                block.position.x,
                block.position.y,
                block.position.z
            );
            self.falling.push(FallingBlock {
                id,
                origin: block.position,
                material: block.material,
                position: Point3::new(
                    block.position.x as f32,
                    block.position.y as f32,
                    block.position.z as f32,
                ),
                vertical_velocity: 0.0,
                has_moved: false,
            });
        }
    }
}

impl Default for GravitySystem {
    fn default() -> Self {
        Self::new(DEFAULT_LANDING_THRESHOLD)
    }
}

/// The cell a block at `position` comes to rest in: each axis rounded to the nearest
/// integer with halves rounded up, and never below the ground floor.
pub fn landing_cell(position: Point3<f32>) -> BlockPosition {
    Point3::new(
        round_half_up(position.x),
        round_half_up(position.y).max(GROUND_FLOOR),
        round_half_up(position.z),
    )
}

/// The first unoccupied cell at or above `cell`, or `None` if the column is full up to
/// `i32::MAX`.
pub fn first_free_cell(
    mut cell: BlockPosition,
    world: &dyn SupportQuery,
) -> Option<BlockPosition> {
    while world.is_occupied(cell) {
        cell.y = cell.y.checked_add(1)?;
    }
    Some(cell)
}

fn round_half_up(value: f32) -> i32 {
    (value + 0.5).floor() as i32
}

/// Whether a static block at `position` is held up.
fn is_supported(position: BlockPosition, world: &dyn SupportQuery) -> bool {
    position.y <= GROUND_FLOOR
        || world.is_occupied(Point3::new(position.x, position.y - 1, position.z))
}

/// Straight-down fall under constant acceleration.
///
/// A stand-in for a real physics engine: each step integrates velocity, and a block stops
/// dead on the first cell whose underside is solid, or on the ground floor.
#[derive(Copy, Clone, Debug)]
pub struct KinematicFall {
    /// Downward acceleration in cells per second squared.
    pub gravity: f32,
    /// Maximum downward speed in cells per second.
    pub terminal_speed: f32,
}

impl Default for KinematicFall {
    fn default() -> Self {
        KinematicFall {
            gravity: 9.81,
            terminal_speed: 50.0,
        }
    }
}

impl FallSimulator for KinematicFall {
    fn step(&mut self, block: &FallingBlock, dt: f32, world: &dyn SupportQuery) -> FallReport {
        let x = round_half_up(block.position.x);
        let z = round_half_up(block.position.z);

        let mut rest = (block.position.y.floor() as i32).max(GROUND_FLOOR);
        while rest > GROUND_FLOOR && !world.is_occupied(Point3::new(x, rest - 1, z)) {
            rest -= 1;
        }

        let mut velocity =
            (block.vertical_velocity - self.gravity * dt).max(-self.terminal_speed);
        let mut y = block.position.y + velocity * dt;
        if y <= rest as f32 {
            y = rest as f32;
            velocity = 0.0;
        }

        FallReport {
            id: block.id,
            position: Point3::new(block.position.x, y, block.position.z),
            velocity: Vector3::new(0.0, velocity, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::NoTerrain;

    fn p(x: i32, y: i32, z: i32) -> BlockPosition {
        BlockPosition::new(x, y, z)
    }

    fn settle(gravity: &mut GravitySystem, overlay: &mut BlockOverlay, terrain: &dyn SupportQuery) {
        let mut simulator = KinematicFall::default();
        for _ in 0..1000 {
            if gravity.falling().is_empty() {
                return;
            }
            gravity.step(&mut simulator, 0.05, overlay, terrain);
        }
        panic!("blocks never settled");
    }

    struct Plateau;

    impl SupportQuery for Plateau {
        fn is_occupied(&self, position: BlockPosition) -> bool {
            position.y >= 1 && position.y <= 4
        }
    }

    #[test]
    fn grounded_and_supported_blocks_stay() {
        let mut overlay = BlockOverlay::new();
        overlay.place(p(0, 1, 0), MaterialId::Stone);
        overlay.place(p(0, 2, 0), MaterialId::Stone);
        overlay.place(p(5, 0, 5), MaterialId::Stone);

        let mut gravity = GravitySystem::default();
        assert!(gravity.tick(&mut overlay, &NoTerrain).is_empty());
        assert_eq!(overlay.len(), 3);
    }

    #[test]
    fn unsupported_block_falls_and_lands_on_the_floor() {
        let mut overlay = BlockOverlay::new();
        let id = overlay.place(p(5, 10, 5), MaterialId::Sand);

        let mut gravity = GravitySystem::default();
        assert_eq!(gravity.tick(&mut overlay, &NoTerrain), vec![id]);
        assert!(!overlay.has(p(5, 10, 5)));
        assert_eq!(gravity.falling().len(), 1);
        assert_eq!(gravity.falling()[0].origin, p(5, 10, 5));
        assert_eq!(gravity.falling()[0].vertical_velocity, 0.0);

        settle(&mut gravity, &mut overlay, &NoTerrain);
        assert!(!gravity.is_falling(id));
        assert_eq!(overlay.get_at(p(5, 1, 5)).unwrap().material, MaterialId::Sand);
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn falling_block_lands_on_terrain() {
        let mut overlay = BlockOverlay::new();
        overlay.place(p(2, 12, 2), MaterialId::Gravel);

        let mut gravity = GravitySystem::default();
        gravity.tick(&mut overlay, &Plateau);
        settle(&mut gravity, &mut overlay, &Plateau);
        assert!(overlay.has(p(2, 5, 2)));
    }

    #[test]
    fn broken_terrain_no_longer_supports() {
        let mut overlay = BlockOverlay::new();
        overlay.place(p(0, 5, 0), MaterialId::Wood);
        let mut gravity = GravitySystem::default();
        assert!(gravity.tick(&mut overlay, &Plateau).is_empty());

        overlay.mark_terrain_removed(p(0, 4, 0));
        assert_eq!(gravity.tick(&mut overlay, &Plateau).len(), 1);
        settle(&mut gravity, &mut overlay, &Plateau);
        assert!(overlay.has(p(0, 4, 0)));
    }

    #[test]
    fn zero_velocity_before_moving_does_not_resettle() {
        let mut overlay = BlockOverlay::new();
        let id = overlay.place(p(0, 6, 0), MaterialId::Stone);
        let mut gravity = GravitySystem::default();
        gravity.tick(&mut overlay, &NoTerrain);

        let outcome = gravity.apply_report(
            FallReport {
                id,
                position: Point3::new(0.0, 6.0, 0.0),
                velocity: Vector3::new(0.0, 0.0, 0.0),
            },
            &mut overlay,
            &NoTerrain,
        );
        assert_eq!(outcome, FallOutcome::Falling);
        assert!(gravity.is_falling(id));
    }

    #[test]
    fn reports_round_to_the_nearest_cell() {
        let mut overlay = BlockOverlay::new();
        let id = overlay.place(p(0, 6, 0), MaterialId::Stone);
        let mut gravity = GravitySystem::default();
        gravity.tick(&mut overlay, &NoTerrain);

        let moving = FallReport {
            id,
            position: Point3::new(0.1, 4.0, -0.2),
            velocity: Vector3::new(0.0, -3.0, 0.0),
        };
        assert_eq!(
            gravity.apply_report(moving, &mut overlay, &NoTerrain),
            FallOutcome::Falling
        );

        let stopped = FallReport {
            id,
            position: Point3::new(0.4, 1.3, -0.4),
            velocity: Vector3::new(0.0, 0.05, 0.0),
        };
        match gravity.apply_report(stopped, &mut overlay, &NoTerrain) {
            FallOutcome::Landed {
                previous, position, ..
            } => {
                assert_eq!(previous, id);
                assert_eq!(position, p(0, 1, 0));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(gravity.falling().is_empty());
    }

    #[test]
    fn halves_round_toward_positive_infinity() {
        assert_eq!(landing_cell(Point3::new(-2.5, 3.5, 2.5)), p(-2, 4, 3));
        assert_eq!(landing_cell(Point3::new(-2.6, 0.4, -0.5)), p(-3, 1, 0));

        let mut overlay = BlockOverlay::new();
        let id = overlay.place(p(-2, 6, 0), MaterialId::Sand);
        let mut gravity = GravitySystem::default();
        gravity.tick(&mut overlay, &NoTerrain);
        gravity.apply_report(
            FallReport {
                id,
                position: Point3::new(-2.5, 3.0, -0.5),
                velocity: Vector3::new(0.0, -4.0, 0.0),
            },
            &mut overlay,
            &NoTerrain,
        );
        let outcome = gravity.apply_report(
            FallReport {
                id,
                position: Point3::new(-2.5, 1.0, -0.5),
                velocity: Vector3::new(0.0, 0.0, 0.0),
            },
            &mut overlay,
            &NoTerrain,
        );
        assert!(matches!(outcome, FallOutcome::Landed { position, .. } if position == p(-2, 1, 0)));
    }

    #[test]
    fn check_around_at_the_top_of_the_range_skips_missing_neighbours() {
        let mut overlay = BlockOverlay::new();
        overlay.place(p(0, i32::MAX, 0), MaterialId::Stone);
        overlay.place(p(i32::MAX, 5, 0), MaterialId::Stone);
        let mut gravity = GravitySystem::default();

        assert!(gravity
            .check_around(p(0, i32::MAX, 0), &mut overlay, &NoTerrain)
            .is_empty());
        assert_eq!(
            gravity
                .check_around(p(i32::MAX, 4, 0), &mut overlay, &NoTerrain)
                .len(),
            1
        );
    }

    #[test]
    fn first_free_cell_stops_at_the_top_of_the_range() {
        struct SolidAbove;
        impl SupportQuery for SolidAbove {
            fn is_occupied(&self, position: BlockPosition) -> bool {
                position.y >= i32::MAX - 1
            }
        }
        assert_eq!(first_free_cell(p(0, i32::MAX - 1, 0), &SolidAbove), None);
        assert_eq!(first_free_cell(p(0, 3, 0), &SolidAbove), Some(p(0, 3, 0)));
    }

    #[test]
    fn landing_on_an_occupied_cell_stacks_on_top() {
        let mut overlay = BlockOverlay::new();
        overlay.place(p(0, 1, 0), MaterialId::Stone);
        let id = overlay.place(p(3, 8, 3), MaterialId::Sand);
        let mut gravity = GravitySystem::default();
        gravity.tick(&mut overlay, &NoTerrain);

        gravity.apply_report(
            FallReport {
                id,
                position: Point3::new(0.0, 3.0, 0.0),
                velocity: Vector3::new(0.0, -5.0, 0.0),
            },
            &mut overlay,
            &NoTerrain,
        );
        let outcome = gravity.apply_report(
            FallReport {
                id,
                position: Point3::new(0.0, 1.0, 0.0),
                velocity: Vector3::new(0.0, 0.0, 0.0),
            },
            &mut overlay,
            &NoTerrain,
        );
        assert!(matches!(outcome, FallOutcome::Landed { position, .. } if position == p(0, 2, 0)));
        assert_eq!(overlay.get_at(p(0, 1, 0)).unwrap().material, MaterialId::Stone);
        assert_eq!(overlay.get_at(p(0, 2, 0)).unwrap().material, MaterialId::Sand);
    }

    #[test]
    fn stale_reports_are_ignored() {
        let mut overlay = BlockOverlay::new();
        let mut gravity = GravitySystem::default();
        let outcome = gravity.apply_report(
            FallReport {
                id: BlockId(42),
                position: Point3::new(0.0, 1.0, 0.0),
                velocity: Vector3::new(0.0, 0.0, 0.0),
            },
            &mut overlay,
            &NoTerrain,
        );
        assert_eq!(outcome, FallOutcome::Unknown);
        assert!(overlay.is_empty());
    }

    #[test]
    fn check_around_only_looks_at_the_cells_above() {
        let mut overlay = BlockOverlay::new();
        let above = overlay.place(p(0, 3, 0), MaterialId::Stone);
        let diagonal = overlay.place(p(1, 3, 0), MaterialId::Stone);
        let far = overlay.place(p(4, 3, 0), MaterialId::Stone);

        let mut gravity = GravitySystem::default();
        let mut fell = gravity.check_around(p(0, 2, 0), &mut overlay, &NoTerrain);
        fell.sort();
        assert_eq!(fell, vec![above, diagonal]);
        assert!(overlay.get(far).is_some());
        assert_eq!(gravity.tick(&mut overlay, &NoTerrain), vec![far]);
    }

    #[test]
    fn stacks_collapse_one_block_per_scan() {
        let mut overlay = BlockOverlay::new();
        for y in 3..=5 {
            overlay.place(p(0, y, 0), MaterialId::Stone);
        }
        let mut gravity = GravitySystem::default();
        let mut scans = 0;
        loop {
            let fell = gravity.tick(&mut overlay, &NoTerrain);
            settle(&mut gravity, &mut overlay, &NoTerrain);
            if fell.is_empty() {
                break;
            }
            scans += 1;
            assert!(scans <= 5, "support did not converge");
        }
        assert_eq!(scans, 3);
        for y in 1..=3 {
            assert!(overlay.has(p(0, y, 0)));
        }
        assert_eq!(overlay.len(), 3);
    }

    #[test]
    fn kinematic_fall_stops_on_solid_ground() {
        let block = FallingBlock {
            id: BlockId(0),
            origin: p(0, 7, 0),
            material: MaterialId::Sand,
            position: Point3::new(0.0, 5.1, 0.0),
            vertical_velocity: -30.0,
            has_moved: true,
        };
        let report = KinematicFall::default().step(&block, 0.1, &Plateau);
        assert_eq!(report.position.y, 5.0);
        assert_eq!(report.velocity.y, 0.0);
    }
}
