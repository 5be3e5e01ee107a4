//!
//! Utilities for tests, benchmarks and the speed test
//!
use crate::prob::Score;
use approx::AbsDiffEq;
use ndarray::{Array3, ArrayBase, Data, Dimension, Zip};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::Instant;

///
/// measure time in milli-seconds (ms) of closure.
///
pub fn timer<F, T>(f: F) -> (T, u128)
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let ret = f();
    let duration = start.elapsed();
    (ret, duration.as_millis())
}

///
/// `[T, N, 2B(B+1)]` scores drawn uniformly from `[-scale, scale)` with a
/// fixed seed.
///
pub fn random_scores(
    n_blocks: usize,
    n_batch: usize,
    n_base: usize,
    scale: Score,
    seed: u64,
) -> Array3<Score> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let n_trans = 2 * n_base * (n_base + 1);
    Array3::from_shape_simple_fn((n_blocks, n_batch, n_trans), || {
        rng.gen_range(-scale..scale)
    })
}

///
/// `max_i |a[i] - b[i]|` of two arrays of the same shape.
///
pub fn max_abs_diff<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> Score
where
    S1: Data<Elem = Score>,
    S2: Data<Elem = Score>,
    D: Dimension,
{
    let mut diff: Score = 0.0;
    Zip::from(a).and(b).for_each(|&x, &y| diff = diff.max((x - y).abs()));
    diff
}

///
/// Are two arrays equal within `epsilon` element-wise?
/// Arrays of different shapes are never close.
///
pub fn all_close<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>, epsilon: Score) -> bool
where
    S1: Data<Elem = Score>,
    S2: Data<Elem = Score>,
    D: Dimension,
{
    a.abs_diff_eq(b, epsilon)
}
