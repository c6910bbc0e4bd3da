use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::prelude::*;

pub async fn clock_cycles(clk: Clock, n_cycles: u32) -> TbResult {
    for _ in 0..n_cycles {
        clk.rising_edge().await;
    }
    Ok(Val::None)
}

/// Ceiling of log2, with `log2c(0) == log2c(1) == 0`.
#[inline]
pub fn log2c(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        64 - (n - 1).leading_zeros()
    }
}

/// Random source of one testbench component. Components derive their own
/// stream from the test seed so runs are reproducible.
#[inline]
pub fn seeded_rng(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// True with `percent` percent probability.
#[inline]
pub fn chance(rng: &mut StdRng, percent: u32) -> bool {
    rng.gen_range(0..100) < percent
}
