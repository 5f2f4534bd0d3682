//! Deterministic 1D value noise.
//!
//! Every integer lattice point carries its own seeded value in `[-1, 1]`,
//! never zero, and the values in between are blended with a quintic fade.
//! The permutation table is shuffled once from a fixed seed so every build
//! and every frame sees the same values. Consecutive integers map to
//! distinct values, so `noise(k + chain)` differs per chain.

use std::sync::OnceLock;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

const NOISE_SEED: u64 = 0x5111_e0f5;
const TABLE_SIZE: usize = 256;

fn permutation() -> &'static [u8; TABLE_SIZE] {
    static TABLE: OnceLock<[u8; TABLE_SIZE]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0_u8; TABLE_SIZE];
        for (slot, value) in table.iter_mut().zip(0_u8..=255) {
            *slot = value;
        }
        let mut rng = StdRng::seed_from_u64(NOISE_SEED);
        table.shuffle(&mut rng);
        table
    })
}

/// Seeded value in `(-1, 1)` for a lattice point; `x / 127.5 - 1` is never 0.
fn lattice_value(lattice: i64) -> f64 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = lattice.rem_euclid(TABLE_SIZE as i64) as usize;
    f64::from(permutation()[index]) / 127.5 - 1.0
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Noise value at `x`.
#[must_use]
pub fn noise(x: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    let floor = x.floor();
    #[allow(clippy::cast_possible_truncation)]
    let lattice = floor as i64;
    let t = x - floor;
    let left = lattice_value(lattice);
    let right = lattice_value(lattice + 1);
    left + (right - left) * fade(t)
}
