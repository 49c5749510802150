//! # World Streamer
//!
//! Decides which chunks should be resident around the observer.
//!
//! The streamer only plans; it does not own chunks. Each time the observer crosses into a
//! different chunk it produces a `StreamingPlan`: the chunks of the `(2r + 1)²` square
//! around the observer that are not loaded yet, and the loaded chunks that drifted further
//! than `r + 1` away. The one-chunk gap between the load radius and the evict radius keeps
//! chunks from thrashing when the observer walks back and forth across a border.

use std::collections::HashSet;

use cgmath::Point3;
use log::debug;

use super::chunk::ChunkCoordinate;

/// Chunk loads and evictions required after an observer move.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamingPlan {
    /// Chunks to request, nearest to the observer first.
    pub to_load: Vec<ChunkCoordinate>,
    /// Chunks to drop.
    pub to_evict: Vec<ChunkCoordinate>,
}

impl StreamingPlan {
    /// Whether the plan requires no work.
    pub fn is_empty(&self) -> bool {
        self.to_load.is_empty() && self.to_evict.is_empty()
    }
}

/// Tracks the observer's chunk and plans residency changes.
pub struct WorldStreamer {
    chunk_size: i32,
    render_distance: i32,
    last_chunk: Option<ChunkCoordinate>,
}

impl WorldStreamer {
    /// Creates a streamer that keeps chunks within `render_distance` (Chebyshev) loaded.
    pub fn new(chunk_size: i32, render_distance: i32) -> Self {
        WorldStreamer {
            chunk_size,
            render_distance,
            last_chunk: None,
        }
    }

    /// Load radius in chunks.
    pub fn render_distance(&self) -> i32 {
        self.render_distance
    }

    /// Chunks further than this (Chebyshev) from the observer are evicted.
    pub fn evict_distance(&self) -> i32 {
        self.render_distance + 1
    }

    /// The chunk the observer was last seen in.
    pub fn last_chunk(&self) -> Option<ChunkCoordinate> {
        self.last_chunk
    }

    /// Forgets the observer's chunk so the next update plans from scratch.
    pub fn reset(&mut self) {
        self.last_chunk = None;
    }

    /// Records a new observer position.
    ///
    /// Only `x` and `z` matter. `loaded` must hold every chunk that is resident or already
    /// requested, so nothing is requested twice.
    ///
    /// # Returns
    /// `None` when the observer is still in the same chunk as the previous call, otherwise
    /// the plan for the new chunk.
    pub fn update_observer(
        &mut self,
        position: Point3<f32>,
        loaded: &HashSet<ChunkCoordinate>,
    ) -> Option<StreamingPlan> {
        let center = ChunkCoordinate::containing(position.x, position.z, self.chunk_size);
        if self.last_chunk == Some(center) {
            return None;
        }
        self.last_chunk = Some(center);

        let plan = self.plan_around(center, loaded);
        debug!(
            "Observer entered chunk ({}, {}): {} to load, {} to evict",
            center.x,
            center.z,
            plan.to_load.len(),
            plan.to_evict.len()
        );
        Some(plan)
    }

    /// Computes the plan for an observer standing in `center`.
    ///
    /// Chunks outside the addressable range are never planned for loading.
    pub fn plan_around(
        &self,
        center: ChunkCoordinate,
        loaded: &HashSet<ChunkCoordinate>,
    ) -> StreamingPlan {
        let r = self.render_distance;
        let bounds = ChunkCoordinate::addressable_range(self.chunk_size);
        let span = |c: i32| {
            c.saturating_sub(r).max(*bounds.start())..=c.saturating_add(r).min(*bounds.end())
        };
        let z_span = span(center.z);
        let mut to_load: Vec<ChunkCoordinate> = span(center.x)
            .flat_map(|x| z_span.clone().map(move |z| ChunkCoordinate::new(x, z)))
            .filter(|coordinate| !loaded.contains(coordinate))
            .collect();
        to_load.sort_by_key(|coordinate| (coordinate.chebyshev_distance(&center), *coordinate));

        let mut to_evict: Vec<ChunkCoordinate> = loaded
            .iter()
            .copied()
            .filter(|coordinate| coordinate.chebyshev_distance(&center) > self.evict_distance())
            .collect();
        to_evict.sort();

        StreamingPlan { to_load, to_evict }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(plan: &StreamingPlan, loaded: &mut HashSet<ChunkCoordinate>) {
        for coordinate in &plan.to_load {
            loaded.insert(*coordinate);
        }
        for coordinate in &plan.to_evict {
            loaded.remove(coordinate);
        }
    }

    #[test]
    fn first_update_loads_the_full_square() {
        let mut streamer = WorldStreamer::new(16, 2);
        let plan = streamer
            .update_observer(Point3::new(0.0, 10.0, 0.0), &HashSet::new())
            .unwrap();
        assert_eq!(plan.to_load.len(), 25);
        assert!(plan.to_evict.is_empty());
        assert_eq!(plan.to_load[0], ChunkCoordinate::new(0, 0));
        assert!(plan
            .to_load
            .iter()
            .all(|c| c.chebyshev_distance(&ChunkCoordinate::new(0, 0)) <= 2));
    }

    #[test]
    fn same_chunk_is_idempotent() {
        let mut streamer = WorldStreamer::new(16, 2);
        let mut loaded = HashSet::new();
        let plan = streamer
            .update_observer(Point3::new(3.0, 0.0, 3.0), &loaded)
            .unwrap();
        apply(&plan, &mut loaded);

        assert_eq!(streamer.update_observer(Point3::new(3.0, 0.0, 3.0), &loaded), None);
        assert_eq!(streamer.update_observer(Point3::new(15.0, 80.0, 0.5), &loaded), None);
    }

    #[test]
    fn moving_one_chunk_loads_a_strip_and_keeps_the_hysteresis_band() {
        let mut streamer = WorldStreamer::new(16, 2);
        let mut loaded = HashSet::new();
        apply(
            &streamer.update_observer(Point3::new(8.0, 0.0, 8.0), &loaded).unwrap(),
            &mut loaded,
        );

        let plan = streamer
            .update_observer(Point3::new(24.0, 0.0, 8.0), &loaded)
            .unwrap();
        assert_eq!(plan.to_load.len(), 5);
        assert!(plan.to_load.iter().all(|c| c.x == 3));
        // x = -2 is now at distance 3, still inside the evict radius.
        assert!(plan.to_evict.is_empty());
        apply(&plan, &mut loaded);

        let plan = streamer
            .update_observer(Point3::new(40.0, 0.0, 8.0), &loaded)
            .unwrap();
        assert_eq!(plan.to_evict.len(), 5);
        assert!(plan.to_evict.iter().all(|c| c.x == -2));
    }

    #[test]
    fn reset_replans_from_scratch() {
        let mut streamer = WorldStreamer::new(16, 1);
        let loaded = HashSet::new();
        assert!(streamer.update_observer(Point3::new(0.0, 0.0, 0.0), &loaded).is_some());
        streamer.reset();
        assert_eq!(streamer.last_chunk(), None);
        let plan = streamer.update_observer(Point3::new(0.0, 0.0, 0.0), &loaded).unwrap();
        assert_eq!(plan.to_load.len(), 9);
    }

    #[test]
    fn square_is_cut_at_the_edge_of_the_coordinate_range() {
        let mut streamer = WorldStreamer::new(16, 2);
        let plan = streamer
            .update_observer(Point3::new(1.0e11, 10.0, 0.0), &HashSet::new())
            .unwrap();
        let edge = *ChunkCoordinate::addressable_range(16).end();
        assert_eq!(streamer.last_chunk(), Some(ChunkCoordinate::new(edge, 0)));
        assert_eq!(plan.to_load.len(), 15);
        assert!(plan.to_load.iter().all(|c| c.is_addressable(16)));

        let mut corner = WorldStreamer::new(1, 1);
        let plan = corner
            .update_observer(Point3::new(f32::MIN, 0.0, f32::MAX), &HashSet::new())
            .unwrap();
        assert_eq!(plan.to_load.len(), 4);
        assert!(plan.to_load.contains(&ChunkCoordinate::new(i32::MIN, i32::MAX)));
    }

    #[test]
    fn far_jump_evicts_everything_previously_loaded() {
        let mut streamer = WorldStreamer::new(16, 2);
        let mut loaded = HashSet::new();
        apply(
            &streamer.update_observer(Point3::new(0.0, 0.0, 0.0), &loaded).unwrap(),
            &mut loaded,
        );
        let plan = streamer
            .update_observer(Point3::new(-1000.0, 0.0, 1000.0), &loaded)
            .unwrap();
        assert_eq!(plan.to_evict.len(), 25);
        assert_eq!(plan.to_load.len(), 25);
    }
}
