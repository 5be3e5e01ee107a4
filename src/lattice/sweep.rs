//!
//! Time-major batched sweeps
//!
//! One step `t -> t+1` is computed for the whole batch at once as array
//! operations over `[N, 2B]` tables, so the batch axis is vectorized and the
//! time axis is the only sequential loop.
//!
use super::{BackwardOutput, ForwardOutput, ViterbiOutput};
use crate::flipflop::FlipFlopLayout;
use crate::prob::{argmax_first, LogSumExp, MaxPlus, Score, Semiring, LARGE_VAL};
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};

///
/// `[N, 2B]` initial forward table: flip states 0, flop states `-LARGE_VAL`
///
pub fn initial_forward(layout: &FlipFlopLayout, n_batch: usize) -> Array2<Score> {
    Array2::from_shape_fn((n_batch, layout.n_state()), |(_, k)| {
        if layout.is_flip(k) {
            0.0
        } else {
            -LARGE_VAL
        }
    })
}

///
/// Viterbi decoding of a `[T, N, S]` score tensor.
///
/// For each target flip state `j` the candidates `F[t][k] + score(k -> j)`
/// for every origin `k` are built as one `[N, 2B]` array and reduced by
/// argmax; flop targets compare their two origins column-wise.
///
pub fn viterbi(layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> ViterbiOutput {
    let (n_blocks, n_batch, _) = scores.dim();
    let n_state = layout.n_state();
    let mut forward = Array3::zeros((n_blocks + 1, n_batch, n_state));
    let mut traceback = Array3::zeros((n_blocks, n_batch, n_state));
    forward
        .index_axis_mut(Axis(0), 0)
        .assign(&initial_forward(layout, n_batch));

    for t in 0..n_blocks {
        let step = scores.index_axis(Axis(0), t);
        let prev = forward.index_axis(Axis(0), t).to_owned();
        let mut next: Array2<Score> = Array2::zeros((n_batch, n_state));
        let mut tb: Array2<usize> = Array2::zeros((n_batch, n_state));

        for b in 0..layout.n_base() {
            let to_flip = &prev + &step.slice(s![.., layout.to_flip_range(b)]);
            for (n, row) in to_flip.outer_iter().enumerate() {
                let (origin, best) =
                    argmax_first(row.iter().copied()).unwrap_or((0, MaxPlus::zero()));
                next[[n, layout.flip(b)]] = best;
                tb[[n, layout.flip(b)]] = origin;
            }
        }

        let to_flop = &prev + &step.slice(s![.., layout.to_flop_range()]);
        for b in 0..layout.n_base() {
            let [flip, flop] = layout.flop_origins(b);
            let target = layout.paired_flop(b);
            Zip::from(next.column_mut(target))
                .and(tb.column_mut(target))
                .and(to_flop.column(flip))
                .and(to_flop.column(flop))
                .for_each(|f, o, &x, &y| {
                    if x >= y {
                        *f = x;
                        *o = flip;
                    } else {
                        *f = y;
                        *o = flop;
                    }
                });
        }

        forward.index_axis_mut(Axis(0), t + 1).assign(&next);
        traceback.index_axis_mut(Axis(0), t).assign(&tb);
    }

    let path = backtrack(traceback.view(), forward.index_axis(Axis(0), n_blocks));
    ViterbiOutput {
        layout: *layout,
        forward,
        traceback,
        path,
    }
}

///
/// `[T+1, N]` best paths from a `[T, N, 2B]` traceback and the `[N, 2B]`
/// final forward table.
///
pub fn backtrack(traceback: ArrayView3<usize>, last: ArrayView2<Score>) -> Array2<usize> {
    let n_blocks = traceback.len_of(Axis(0));
    let n_batch = last.nrows();
    let mut path = Array2::zeros((n_blocks + 1, n_batch));
    for (n, row) in last.outer_iter().enumerate() {
        path[[n_blocks, n]] = argmax_first(row.iter().copied())
            .map(|(k, _)| k)
            .unwrap_or(0);
    }
    for t in (0..n_blocks).rev() {
        for n in 0..n_batch {
            path[[t, n]] = traceback[[t, n, path[[t + 1, n]]]];
        }
    }
    path
}

///
/// Forward sweep under semiring `R` for the whole batch.
///
pub fn forward<R: Semiring>(layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> ForwardOutput {
    let (n_blocks, n_batch, _) = scores.dim();
    let n_state = layout.n_state();
    let mut forward = Array3::zeros((n_blocks + 1, n_batch, n_state));
    forward
        .index_axis_mut(Axis(0), 0)
        .assign(&initial_forward(layout, n_batch));

    for t in 0..n_blocks {
        let step = scores.index_axis(Axis(0), t);
        let prev = forward.index_axis(Axis(0), t).to_owned();
        let mut next: Array2<Score> = Array2::zeros((n_batch, n_state));

        let to_flop = &prev + &step.slice(s![.., layout.to_flop_range()]);
        for b in 0..layout.n_base() {
            let [flip, flop] = layout.flop_origins(b);
            Zip::from(next.column_mut(layout.paired_flop(b)))
                .and(to_flop.column(flip))
                .and(to_flop.column(flop))
                .for_each(|f, &x, &y| *f = R::plus(x, y));

            let to_flip = &prev + &step.slice(s![.., layout.to_flip_range(b)]);
            Zip::from(next.column_mut(layout.flip(b)))
                .and(to_flip.rows())
                .for_each(|f, row| *f = R::sum(row.iter().copied()));
        }

        forward.index_axis_mut(Axis(0), t + 1).assign(&next);
    }

    let log_z = forward
        .index_axis(Axis(0), n_blocks)
        .map_axis(Axis(1), |row| R::sum(row.iter().copied()));
    ForwardOutput { forward, log_z }
}

///
/// Backward sweep under semiring `R` for the whole batch.
///
/// `B[T] = 0`; the returned total includes the initial distribution so it
/// matches the forward total.
///
pub fn backward<R: Semiring>(layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> BackwardOutput {
    let (n_blocks, n_batch, _) = scores.dim();
    let n_state = layout.n_state();
    let mut backward = Array3::zeros((n_blocks + 1, n_batch, n_state));

    for t in (0..n_blocks).rev() {
        let step = scores.index_axis(Axis(0), t);
        let next = backward.index_axis(Axis(0), t + 1).to_owned();
        // B[t+1][flop(base_of(k))] for every origin k
        let next_flop = Array2::from_shape_fn((n_batch, n_state), |(n, k)| {
            next[[n, layout.paired_flop(layout.base_of(k))]]
        });
        let mut cur = &step.slice(s![.., layout.to_flop_range()]) + &next_flop;
        for b in 0..layout.n_base() {
            let to_flip = &step.slice(s![.., layout.to_flip_range(b)])
                + &next.column(layout.flip(b)).insert_axis(Axis(1));
            Zip::from(&mut cur)
                .and(&to_flip)
                .for_each(|c, &x| *c = R::plus(*c, x));
        }
        backward.index_axis_mut(Axis(0), t).assign(&cur);
    }

    let start = &initial_forward(layout, n_batch) + &backward.index_axis(Axis(0), 0);
    let log_z = start.map_axis(Axis(1), |row| R::sum(row.iter().copied()));
    BackwardOutput { backward, log_z }
}

///
/// Posterior probability of every transition for the whole batch.
///
/// ```text
/// P(s at t) = exp(F[t][from(s)] + score[t, s] + B[t+1][to(s)] - log Z)
/// ```
///
pub fn posterior(layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Array3<Score> {
    let fwd = forward::<LogSumExp>(layout, scores);
    let bwd = backward::<LogSumExp>(layout, scores);
    let n_blocks = scores.len_of(Axis(0));
    let mut post = Array3::zeros(scores.raw_dim());

    for t in 0..n_blocks {
        for (idx, tr) in layout.transitions() {
            Zip::from(post.slice_mut(s![t, .., idx]))
                .and(scores.slice(s![t, .., idx]))
                .and(fwd.forward.slice(s![t, .., tr.from]))
                .and(bwd.backward.slice(s![t + 1, .., tr.to]))
                .and(&fwd.log_z)
                .for_each(|p, &sc, &f, &b, &z| *p = (f + sc + b - z).exp());
        }
    }
    post
}

//
// tests
//
