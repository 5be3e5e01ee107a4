//!
//! Viterbi optimality against exhaustive search on small lattices
//!
#[macro_use]
extern crate approx;

use flipflop::utils::random_scores;
use flipflop::{decode_paths, FlipFlopLayout, Score, ScoreTensor};
use itertools::Itertools;
use ndarray::ArrayView2;

///
/// Best score over every state path of length `T+1` that starts in a flip
/// state.
///
fn brute_force_best(layout: &FlipFlopLayout, scores: ArrayView2<Score>) -> Score {
    let n_blocks = scores.nrows();
    let starts = 0..layout.n_base();
    let rest = (0..n_blocks).map(|_| 0..layout.n_state());
    starts
        .flat_map(|start| {
            rest.clone()
                .multi_cartesian_product()
                .map(move |tail| std::iter::once(start).chain(tail).collect::<Vec<_>>())
        })
        .filter_map(|path| layout.path_score(scores, &path))
        .fold(Score::NEG_INFINITY, Score::max)
}

fn check_optimality(n_blocks: usize, n_batch: usize, n_base: usize, seed: u64) {
    let layout = FlipFlopLayout::new(n_base).unwrap();
    let scores = ScoreTensor::new(random_scores(n_blocks, n_batch, n_base, 3.0, seed));
    let out = decode_paths(&scores, false).unwrap();
    let best = out.best_scores();

    for n in 0..n_batch {
        let seq = scores.sequence(n);
        let path = out.path_of(n);
        assert!(layout.is_flip(path[0]));
        let score = layout
            .path_score(seq, &path)
            .expect("decoded path uses only allowed transitions");
        assert_abs_diff_eq!(score, best[n], epsilon = 1e-9);
        assert_abs_diff_eq!(score, brute_force_best(&layout, seq), epsilon = 1e-9);
    }
}

#[test]
fn optimal_single_base() {
    for seed in 0..5 {
        check_optimality(5, 3, 1, seed);
    }
}

#[test]
fn optimal_two_bases() {
    for seed in 0..5 {
        check_optimality(4, 3, 2, seed);
    }
}

#[test]
fn optimal_four_bases() {
    check_optimality(3, 2, 4, 7);
}

#[test]
fn single_step_single_sequence() {
    check_optimality(1, 1, 1, 0);
}

#[test]
fn all_zero_scores() {
    for n_base in 1..=4 {
        let layout = FlipFlopLayout::new(n_base).unwrap();
        let scores = ScoreTensor::new(ndarray::Array3::zeros((6, 2, layout.n_trans())));
        let out = decode_paths(&scores, true).unwrap();
        for n in 0..2 {
            let path = out.path_of(n);
            assert_eq!(path.len(), 7);
            assert!(path.iter().all(|&k| k < layout.n_state()));
            assert_eq!(layout.path_score(scores.sequence(n), &path), Some(0.0));
            assert!(!out.bases(n).is_empty());
        }
    }
}
