//!
//! Accelerated backend
//!
//! Every batch element is an independent lattice, so the per-sequence
//! kernels of `lattice::kernel` run in parallel over the batch axis with
//! rayon. The time axis stays sequential inside each kernel.
//!
use super::{check_finite, BackendKind, LatticeBackend};
use crate::error::{LatticeError, Result};
use crate::flipflop::FlipFlopLayout;
use crate::lattice::{kernel, BackwardOutput, ForwardOutput, ViterbiOutput};
use crate::prob::{LogSumExp, Score};
use log::debug;
use ndarray::{Array1, Array2, Array3, ArrayView3, Axis, Zip};
use rayon::{ThreadPool, ThreadPoolBuilder};

///
/// Batch-parallel backend.
///
/// Runs on the global rayon pool, or on its own pool when created with
/// `with_threads`.
///
pub struct AcceleratedBackend {
    pool: Option<ThreadPool>,
}

impl AcceleratedBackend {
    /// Backend on the global rayon pool
    pub fn new() -> Self {
        AcceleratedBackend { pool: None }
    }
    ///
    /// Backend on a dedicated pool of `n_threads` threads.
    ///
    pub fn with_threads(n_threads: usize) -> Result<Self> {
        if n_threads == 0 {
            return Err(LatticeError::Backend(
                "thread pool needs at least one thread".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|e| LatticeError::Backend(e.to_string()))?;
        debug!("accelerated backend with {} threads", n_threads);
        Ok(AcceleratedBackend { pool: Some(pool) })
    }
    /// Number of worker threads
    pub fn n_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
    fn install<T, F>(&self, f: F) -> T
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

impl Default for AcceleratedBackend {
    fn default() -> Self {
        AcceleratedBackend::new()
    }
}

impl LatticeBackend for AcceleratedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerated
    }
    fn viterbi(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Result<ViterbiOutput> {
        let (n_blocks, n_batch, _) = scores.dim();
        let n_state = layout.n_state();
        let mut forward = Array3::zeros((n_blocks + 1, n_batch, n_state));
        let mut traceback = Array3::zeros((n_blocks, n_batch, n_state));
        let mut path = Array2::zeros((n_blocks + 1, n_batch));

        self.install(|| {
            Zip::from(scores.axis_iter(Axis(1)))
                .and(forward.axis_iter_mut(Axis(1)))
                .and(traceback.axis_iter_mut(Axis(1)))
                .and(path.axis_iter_mut(Axis(1)))
                .par_for_each(|sc, fwd, tb, p| kernel::viterbi(layout, sc, fwd, tb, p));
        });

        check_finite("viterbi", forward.iter())?;
        Ok(ViterbiOutput {
            layout: *layout,
            forward,
            traceback,
            path,
        })
    }
    fn forward(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Result<ForwardOutput> {
        let (n_blocks, n_batch, _) = scores.dim();
        let mut forward = Array3::zeros((n_blocks + 1, n_batch, layout.n_state()));
        let mut log_z = Array1::zeros(n_batch);

        self.install(|| {
            Zip::from(scores.axis_iter(Axis(1)))
                .and(forward.axis_iter_mut(Axis(1)))
                .and(&mut log_z)
                .par_for_each(|sc, fwd, z| *z = kernel::forward::<LogSumExp>(layout, sc, fwd));
        });

        check_finite("forward", log_z.iter())?;
        Ok(ForwardOutput { forward, log_z })
    }
    fn backward(
        &self,
        layout: &FlipFlopLayout,
        scores: ArrayView3<Score>,
    ) -> Result<BackwardOutput> {
        let (n_blocks, n_batch, _) = scores.dim();
        let mut backward = Array3::zeros((n_blocks + 1, n_batch, layout.n_state()));
        let mut log_z = Array1::zeros(n_batch);

        self.install(|| {
            Zip::from(scores.axis_iter(Axis(1)))
                .and(backward.axis_iter_mut(Axis(1)))
                .and(&mut log_z)
                .par_for_each(|sc, bwd, z| *z = kernel::backward::<LogSumExp>(layout, sc, bwd));
        });

        check_finite("backward", log_z.iter())?;
        Ok(BackwardOutput { backward, log_z })
    }
    fn posterior(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Result<Array3<Score>> {
        let n_blocks = scores.len_of(Axis(0));
        let n_state = layout.n_state();
        let mut post = Array3::zeros(scores.raw_dim());

        self.install(|| {
            Zip::from(scores.axis_iter(Axis(1)))
                .and(post.axis_iter_mut(Axis(1)))
                .par_for_each(|sc, p| {
                    let mut fwd = Array2::zeros((n_blocks + 1, n_state));
                    let mut bwd = Array2::zeros((n_blocks + 1, n_state));
                    let log_z = kernel::forward::<LogSumExp>(layout, sc, fwd.view_mut());
                    kernel::backward::<LogSumExp>(layout, sc, bwd.view_mut());
                    kernel::posterior(layout, sc, fwd.view(), bwd.view(), log_z, p);
                });
        });

        check_finite("posterior", post.iter())?;
        Ok(post)
    }
}

//
// tests
//
