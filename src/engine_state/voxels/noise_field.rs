//! # Noise Field
//!
//! Deterministic 2D gradient noise, the leaf dependency of terrain generation.
//!
//! The field owns a 512-entry permutation table built once from the world seed. The first
//! 256 entries are a seeded shuffle of `0..256`; the second half repeats the first so that
//! lookups of the form `perm[perm[x] + y + 1]` never need wrapping.
//!
//! ## Determinism
//!
//! The shuffle is driven by a splitmix64 sequence, so the same seed yields the same table,
//! and therefore the same terrain, on every platform.

/// Number of distinct lattice hashes.
const PERMUTATION_SIZE: usize = 256;

/// splitmix64 increment.
const SPLITMIX_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seeded 2D gradient noise.
///
/// # Examples
///
/// ```
/// use voxel_sandbox::engine_state::voxels::noise_field::NoiseField;
///
/// let field = NoiseField::new(12345);
/// let value = field.sample(0.5, 0.25);
/// assert!((-1.0..=1.0).contains(&value));
/// assert_eq!(value, NoiseField::new(12345).sample(0.5, 0.25));
/// ```
#[derive(Clone, Debug)]
pub struct NoiseField {
    seed: u64,
    perm: [u8; PERMUTATION_SIZE * 2],
}

impl NoiseField {
    /// Builds the permutation table for `seed`.
    pub fn new(seed: u64) -> Self {
        let mut perm = [0u8; PERMUTATION_SIZE * 2];
        for (i, entry) in perm.iter_mut().take(PERMUTATION_SIZE).enumerate() {
            *entry = i as u8;
        }

        // Fisher-Yates
        let mut state = seed;
        for i in (1..PERMUTATION_SIZE).rev() {
            let j = (splitmix64(&mut state) % (i as u64 + 1)) as usize;
            perm.swap(i, j);
        }

        let (low, high) = perm.split_at_mut(PERMUTATION_SIZE);
        high.copy_from_slice(low);

        NoiseField { seed, perm }
    }

    /// The seed this field was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Samples the noise at `(x, y)`.
    ///
    /// # Returns
    /// A value in `[-1, 1]`; exactly `0.0` on integer lattice points.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let floor_x = x.floor();
        let floor_y = y.floor();
        let cell_x = (floor_x as i64 & 255) as usize;
        let cell_y = (floor_y as i64 & 255) as usize;

        let x = x - floor_x;
        let y = y - floor_y;

        let u = fade(x);
        let v = fade(y);

        let p = &self.perm;
        let a = p[cell_x] as usize + cell_y;
        let aa = p[a] as usize;
        let ab = p[a + 1] as usize;
        let b = p[cell_x + 1] as usize + cell_y;
        let ba = p[b] as usize;
        let bb = p[b + 1] as usize;

        lerp(
            v,
            lerp(u, grad(p[aa], x, y), grad(p[ba], x - 1.0, y)),
            lerp(u, grad(p[ab], x, y - 1.0), grad(p[bb], x - 1.0, y - 1.0)),
        )
    }

    /// Sums `octaves` layers of [`NoiseField::sample`].
    ///
    /// Each octave doubles the frequency (starting at `scale`) and multiplies the amplitude
    /// by `persistence`. The sum is divided by the total amplitude so the result stays
    /// within roughly `[-1, 1]`.
    pub fn fractal(&self, x: f64, y: f64, octaves: u32, persistence: f64, scale: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = scale;
        let mut max_value = 0.0;

        for _ in 0..octaves {
            value += self.sample(x * frequency, y * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        if max_value == 0.0 {
            return 0.0;
        }
        value / max_value
    }
}

/// Quintic fade curve `6t^5 - 15t^4 + 10t^3`.
#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Dot product of `(x, y)` with the gradient selected by the low four bits of `hash`.
#[inline]
fn grad(hash: u8, x: f64, y: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        0.0
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(SPLITMIX_GAMMA);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
