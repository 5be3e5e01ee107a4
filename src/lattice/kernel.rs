//!
//! Per-sequence lattice kernels
//!
//! Each function sweeps the whole time axis of one batch element.
//! `scores` is the `[T, S]` matrix of that element, tables are `[T+1, 2B]`.
//!
//! ```text
//! F[0][k]   = 0 (flip k), -LARGE_VAL (flop k)
//! F[t+1][j] = sum_{k -> j} F[t][k] * score[t, k -> j]
//!
//! B[T][k]   = 1
//! B[t][k]   = sum_{k -> j} score[t, k -> j] * B[t+1][j]
//! ```
//!
//! where `sum` and `*` are the semiring operations in log space.
//!
use crate::flipflop::FlipFlopLayout;
use crate::prob::{argmax_first, Score, Semiring, LARGE_VAL};
use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

///
/// Initial forward scores: flip states 0, flop states `-LARGE_VAL`
/// (a path cannot start in a flop state).
///
pub fn init_forward(layout: &FlipFlopLayout, mut row: ArrayViewMut1<Score>) {
    for (k, x) in row.iter_mut().enumerate() {
        *x = if layout.is_flip(k) { 0.0 } else { -LARGE_VAL };
    }
}

///
/// Viterbi sweep of a single sequence.
///
/// Fills `fwd` (max-plus forward scores) and `traceback`, then writes the
/// best path into `path` (length `T+1`).
///
/// Ties go to the lowest origin state index.
///
pub fn viterbi(
    layout: &FlipFlopLayout,
    scores: ArrayView2<Score>,
    mut fwd: ArrayViewMut2<Score>,
    mut traceback: ArrayViewMut2<usize>,
    path: ArrayViewMut1<usize>,
) {
    let n_state = layout.n_state();
    init_forward(layout, fwd.row_mut(0));

    for (t, sc) in scores.outer_iter().enumerate() {
        for b in 0..layout.n_base() {
            // to flop b, either from flip b or staying in flop b
            let [flip, flop] = layout.flop_origins(b);
            let from_flip = sc[layout.to_flop_index(b, false)] + fwd[[t, flip]];
            let from_flop = sc[layout.to_flop_index(b, true)] + fwd[[t, flop]];
            let (origin, best) = if from_flip >= from_flop {
                (flip, from_flip)
            } else {
                (flop, from_flop)
            };
            fwd[[t + 1, layout.paired_flop(b)]] = best;
            traceback[[t, layout.paired_flop(b)]] = origin;

            // to flip b, from any state
            let mut origin = 0;
            let mut best = sc[layout.to_flip_index(b, 0)] + fwd[[t, 0]];
            for k in 1..n_state {
                let x = sc[layout.to_flip_index(b, k)] + fwd[[t, k]];
                if x > best {
                    best = x;
                    origin = k;
                }
            }
            fwd[[t + 1, layout.flip(b)]] = best;
            traceback[[t, layout.flip(b)]] = origin;
        }
    }

    let n_blocks = scores.nrows();
    backtrack(traceback.view(), fwd.row(n_blocks), path);
}

///
/// Follow the traceback from the best final state.
///
/// `path[T] = argmax F[T]`, `path[t] = traceback[t][path[t+1]]`.
///
pub fn backtrack(
    traceback: ArrayView2<usize>,
    last: ArrayView1<Score>,
    mut path: ArrayViewMut1<usize>,
) {
    let n_blocks = traceback.nrows();
    path[n_blocks] = argmax_first(last.iter().copied())
        .map(|(k, _)| k)
        .unwrap_or(0);
    for t in (0..n_blocks).rev() {
        path[t] = traceback[[t, path[t + 1]]];
    }
}

///
/// Forward sweep of a single sequence under semiring `R`.
///
/// Returns the total `sum_k F[T][k]`.
/// With `LogSumExp` this is the log-partition function, with `MaxPlus` the
/// best path score.
///
pub fn forward<R: Semiring>(
    layout: &FlipFlopLayout,
    scores: ArrayView2<Score>,
    mut fwd: ArrayViewMut2<Score>,
) -> Score {
    let n_state = layout.n_state();
    init_forward(layout, fwd.row_mut(0));

    for (t, sc) in scores.outer_iter().enumerate() {
        for b in 0..layout.n_base() {
            let [flip, flop] = layout.flop_origins(b);
            let from_flip = sc[layout.to_flop_index(b, false)] + fwd[[t, flip]];
            let from_flop = sc[layout.to_flop_index(b, true)] + fwd[[t, flop]];
            fwd[[t + 1, layout.paired_flop(b)]] = R::plus(from_flip, from_flop);

            let mut acc = R::zero();
            for k in 0..n_state {
                acc = R::plus(acc, sc[layout.to_flip_index(b, k)] + fwd[[t, k]]);
            }
            fwd[[t + 1, layout.flip(b)]] = acc;
        }
    }

    R::sum(fwd.row(scores.nrows()).iter().copied())
}

///
/// Backward sweep of a single sequence under semiring `R`.
///
/// `bwd[T]` is 0 (every state may end a path). Returns the total
/// `sum_k F[0][k] B[0][k]`, which equals the forward total.
///
pub fn backward<R: Semiring>(
    layout: &FlipFlopLayout,
    scores: ArrayView2<Score>,
    mut bwd: ArrayViewMut2<Score>,
) -> Score {
    let n_state = layout.n_state();
    let n_blocks = scores.nrows();
    bwd.row_mut(n_blocks).fill(0.0);

    for t in (0..n_blocks).rev() {
        let sc = scores.row(t);
        for k in 0..n_state {
            // to the flop of the same base
            let to_flop = layout.paired_flop(layout.base_of(k));
            let s_flop = layout.to_flop_index(layout.base_of(k), layout.is_flop(k));
            let mut acc = sc[s_flop] + bwd[[t + 1, to_flop]];
            // to any flip
            for b in 0..layout.n_base() {
                let x = sc[layout.to_flip_index(b, k)] + bwd[[t + 1, layout.flip(b)]];
                acc = R::plus(acc, x);
            }
            bwd[[t, k]] = acc;
        }
    }

    R::sum((0..n_state).map(|k| {
        let init = if layout.is_flip(k) { 0.0 } else { -LARGE_VAL };
        init + bwd[[0, k]]
    }))
}

///
/// Posterior probability of every transition of a single sequence.
///
/// ```text
/// P(k -> j at t) = F[t][k] score[t, k -> j] B[t+1][j] / Z
/// ```
///
/// `fwd` and `bwd` must be the `LogSumExp` tables and `log_z` their total.
///
pub fn posterior(
    layout: &FlipFlopLayout,
    scores: ArrayView2<Score>,
    fwd: ArrayView2<Score>,
    bwd: ArrayView2<Score>,
    log_z: Score,
    mut post: ArrayViewMut2<Score>,
) {
    for (t, sc) in scores.outer_iter().enumerate() {
        for (s, tr) in layout.transitions() {
            post[[t, s]] = (fwd[[t, tr.from]] + sc[s] + bwd[[t + 1, tr.to]] - log_z).exp();
        }
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prob::{LogSumExp, MaxPlus};
    use ndarray::{Array1, Array2};

    fn run_viterbi(layout: &FlipFlopLayout, scores: &Array2<Score>) -> (Array2<Score>, Vec<usize>) {
        let n_blocks = scores.nrows();
        let n_state = layout.n_state();
        let mut fwd = Array2::zeros((n_blocks + 1, n_state));
        let mut tb = Array2::zeros((n_blocks, n_state));
        let mut path = Array1::zeros(n_blocks + 1);
        viterbi(layout, scores.view(), fwd.view_mut(), tb.view_mut(), path.view_mut());
        (fwd, path.to_vec())
    }

    #[test]
    fn viterbi_single_base_prefers_flip_self_loop() {
        let layout = FlipFlopLayout::new(1).unwrap();
        // [flip->flip, flop->flip, flip->flop, flop->flop]
        let scores = Array2::from_shape_vec((2, 4), vec![2.0, 0.0, -1.0, 0.0, 2.0, 0.0, -1.0, 0.0])
            .unwrap();
        let (fwd, path) = run_viterbi(&layout, &scores);
        assert_eq!(path, vec![0, 0, 0]);
        assert_abs_diff_eq!(fwd[[2, 0]], 4.0);
        // flip -> flip (2) then flip -> flop (-1)
        assert_abs_diff_eq!(fwd[[2, 1]], 1.0);
    }
    #[test]
    fn viterbi_follows_alternation() {
        let layout = FlipFlopLayout::new(1).unwrap();
        // step 0 rewards flip->flop, step 1 rewards flop->flip
        let scores = Array2::from_shape_vec((2, 4), vec![0.0, 0.0, 3.0, 0.0, 0.0, 3.0, 0.0, 0.0])
            .unwrap();
        let (fwd, path) = run_viterbi(&layout, &scores);
        assert_eq!(path, vec![0, 1, 0]);
        assert_abs_diff_eq!(fwd[[2, 0]], 6.0);
        assert_eq!(layout.path_score(scores.view(), &path), Some(6.0));
    }
    #[test]
    fn forward_and_backward_totals_agree() {
        let layout = FlipFlopLayout::new(2).unwrap();
        let scores = Array2::from_shape_fn((5, layout.n_trans()), |(t, s)| {
            ((t * 7 + s * 3) % 11) as Score * 0.1 - 0.5
        });
        let mut fwd = Array2::zeros((6, 4));
        let mut bwd = Array2::zeros((6, 4));
        let zf = forward::<LogSumExp>(&layout, scores.view(), fwd.view_mut());
        let zb = backward::<LogSumExp>(&layout, scores.view(), bwd.view_mut());
        assert_abs_diff_eq!(zf, zb, epsilon = 1e-9);
        // F[t] B[t] summed over states is Z for every t (flop start excluded at t=0)
        for t in 1..=5 {
            let z = (0..4).map(|k| fwd[[t, k]] + bwd[[t, k]]);
            assert_abs_diff_eq!(LogSumExp::sum(z), zf, epsilon = 1e-9);
        }
    }
    #[test]
    fn max_plus_forward_is_viterbi_score() {
        let layout = FlipFlopLayout::new(2).unwrap();
        let scores = Array2::from_shape_fn((4, layout.n_trans()), |(t, s)| {
            ((t * 5 + s * 13) % 7) as Score - 3.0
        });
        let mut fwd = Array2::zeros((5, 4));
        let best = forward::<MaxPlus>(&layout, scores.view(), fwd.view_mut());
        let (vfwd, path) = run_viterbi(&layout, &scores);
        assert_eq!(fwd, vfwd);
        assert_abs_diff_eq!(layout.path_score(scores.view(), &path).unwrap(), best);
    }
    #[test]
    fn posterior_of_single_step_sums_to_one() {
        let layout = FlipFlopLayout::new(2).unwrap();
        let scores = Array2::from_shape_fn((3, layout.n_trans()), |(t, s)| (t + s) as Score * 0.05);
        let mut fwd = Array2::zeros((4, 4));
        let mut bwd = Array2::zeros((4, 4));
        let z = forward::<LogSumExp>(&layout, scores.view(), fwd.view_mut());
        backward::<LogSumExp>(&layout, scores.view(), bwd.view_mut());
        let mut post = Array2::zeros(scores.raw_dim());
        posterior(&layout, scores.view(), fwd.view(), bwd.view(), z, post.view_mut());
        // exactly one transition is used at each step
        for row in post.outer_iter() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
            assert!(row.iter().all(|&p| p >= 0.0 && p <= 1.0 + 1e-12));
        }
    }
}
