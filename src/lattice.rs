//!
//! Flip-flop CRF lattice decoder
//!
//! # Overview of calculation
//!
//! scores[t, n, s] : transition scores of `T` steps for `N` sequences
//!
//! Forward
//! F[t][k]
//!  = sum over paths of length t that end at state k
//!
//! Backward
//! B[t][k]
//!  = sum over paths from state k at time t to any state at time T
//!
//! Viterbi
//!  uses `max` as the sum (`MaxPlus`) and records the argmax origin of every
//!  state in a traceback table. The best path is recovered backward from the
//!  best final state.
//!
//! Partition function
//!  uses `logaddexp` as the sum (`LogSumExp`), `log Z = sum_k F[T][k]`.
//!
//! Posterior of transition s = (k -> j) at time t
//! P(s, t) = F[t][k] score[t, s] B[t+1][j] / Z
//!         = d log Z / d score[t, s]
//!
//! F[t] = forward[t]  (0<=t<=T, forward[0] is the initial distribution)
//! B[t] = backward[t] (0<=t<=T, backward[T] = 0)
//!
pub mod kernel;
pub mod sweep;

use crate::backend::{
    accelerated_backend, select_backend, AcceleratorPolicy, BackendKind, LatticeBackend,
    PortableBackend,
};
use crate::config::LatticeConfig;
use crate::error::Result;
use crate::flipflop::FlipFlopLayout;
use crate::prob::Score;
use crate::scores::ScoreTensor;
use log::{debug, warn};
use ndarray::{Array1, Array2, Array3, ArrayView3, Axis};

/// Result of Viterbi decoding of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ViterbiOutput {
    /// flip-flop layout of the decoded scores
    pub layout: FlipFlopLayout,
    /// `[T+1, N, 2B]` max-plus forward scores
    pub forward: Array3<Score>,
    /// `[T, N, 2B]` best origin state of each `(t+1, n, state)`
    pub traceback: Array3<usize>,
    /// `[T+1, N]` best state path of each batch element
    pub path: Array2<usize>,
}

impl ViterbiOutput {
    /// Number of time steps `T`
    pub fn n_blocks(&self) -> usize {
        self.traceback.len_of(Axis(0))
    }
    /// Number of batch elements `N`
    pub fn n_batch(&self) -> usize {
        self.path.len_of(Axis(1))
    }
    ///
    /// Score of the best path of each batch element, `max_k F[T][k]`.
    ///
    pub fn best_scores(&self) -> Array1<Score> {
        self.forward
            .index_axis(Axis(0), self.n_blocks())
            .map_axis(Axis(1), |row| {
                row.iter().copied().fold(Score::NEG_INFINITY, Score::max)
            })
    }
    ///
    /// State path of the batch element `n`
    ///
    pub fn path_of(&self, n: usize) -> Vec<usize> {
        self.path.column(n).to_vec()
    }
    ///
    /// Base indices of the batch element `n`, collapsed from its state path.
    ///
    pub fn bases(&self, n: usize) -> Vec<usize> {
        self.layout.path_to_bases(self.path.column(n).iter().copied())
    }
}

/// Result of a forward sweep of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardOutput {
    /// `[T+1, N, 2B]` forward scores
    pub forward: Array3<Score>,
    /// `[N]` total over the final states (log-partition for `LogSumExp`)
    pub log_z: Array1<Score>,
}

/// Result of a backward sweep of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BackwardOutput {
    /// `[T+1, N, 2B]` backward scores
    pub backward: Array3<Score>,
    /// `[N]` total over the initial states (equal to the forward total)
    pub log_z: Array1<Score>,
}

///
/// Decoder front end.
///
/// Holds the portable backend, the accelerated backend (if it could be set
/// up) and the configuration, and dispatches every call to one of them.
///
pub struct Lattice {
    config: LatticeConfig,
    portable: PortableBackend,
    accelerated: Result<Box<dyn LatticeBackend>>,
}

impl Lattice {
    ///
    /// Create a decoder. A failure to set up the accelerated backend is kept
    /// and only surfaced when the configuration forces that backend.
    ///
    pub fn new(config: LatticeConfig) -> Self {
        let accelerated = accelerated_backend(&config);
        if let Err(e) = &accelerated {
            debug!("accelerated backend not set up: {}", e);
        }
        Lattice {
            config,
            portable: PortableBackend,
            accelerated,
        }
    }
    ///
    /// Create a decoder with an explicit accelerated backend.
    ///
    pub fn with_accelerated(config: LatticeConfig, backend: Box<dyn LatticeBackend>) -> Self {
        Lattice {
            config,
            portable: PortableBackend,
            accelerated: Ok(backend),
        }
    }
    /// Configuration of this decoder
    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }
    /// Is the accelerated backend set up?
    pub fn has_accelerated(&self) -> bool {
        self.accelerated.is_ok()
    }
    ///
    /// Backend that a call on `scores` will start on.
    ///
    pub fn backend_for(&self, scores: &ScoreTensor) -> BackendKind {
        select_backend(
            scores.residency(),
            self.config.policy,
            self.has_accelerated(),
        )
    }

    //
    // operations
    //

    ///
    /// Find the highest scoring flip-flop path of every batch element.
    ///
    pub fn decode_paths(&self, scores: &ScoreTensor) -> Result<ViterbiOutput> {
        self.dispatch(scores, "decode_paths", |backend, layout, view| {
            backend.viterbi(&layout, view)
        })
    }
    ///
    /// Forward scores under `LogSumExp` and the log-partition of each batch
    /// element.
    ///
    pub fn forward_scores(&self, scores: &ScoreTensor) -> Result<ForwardOutput> {
        self.dispatch(scores, "forward_scores", |backend, layout, view| {
            backend.forward(&layout, view)
        })
    }
    ///
    /// Backward scores under `LogSumExp`.
    ///
    pub fn backward_scores(&self, scores: &ScoreTensor) -> Result<BackwardOutput> {
        self.dispatch(scores, "backward_scores", |backend, layout, view| {
            backend.backward(&layout, view)
        })
    }
    ///
    /// `log Z` of each batch element, `[N]`.
    ///
    pub fn log_partition(&self, scores: &ScoreTensor) -> Result<Array1<Score>> {
        Ok(self.forward_scores(scores)?.log_z)
    }
    ///
    /// Posterior probability (not log) of every transition, `[T, N, S]`.
    /// Equal to the derivative of `log_partition` with respect to the
    /// scores.
    ///
    pub fn posterior_transitions(&self, scores: &ScoreTensor) -> Result<Array3<Score>> {
        self.dispatch(scores, "posterior_transitions", |backend, layout, view| {
            backend.posterior(&layout, view)
        })
    }

    ///
    /// Validate the scores, pick the backend and run `f` on it.
    ///
    /// Under `AcceleratorPolicy::Auto` a failing accelerated backend falls
    /// back to the portable one. Under `Forced` the error is returned.
    ///
    fn dispatch<T, F>(&self, scores: &ScoreTensor, op: &str, f: F) -> Result<T>
    where
        F: Fn(&dyn LatticeBackend, FlipFlopLayout, ArrayView3<Score>) -> Result<T>,
    {
        let layout = scores.layout()?;
        let kind = self.backend_for(scores);
        debug!(
            "{}: T={} N={} {} residency={} backend={}",
            op,
            scores.n_blocks(),
            scores.n_batch(),
            layout,
            scores.residency(),
            kind
        );
        match kind {
            BackendKind::Portable => f(&self.portable, layout, scores.view()),
            BackendKind::Accelerated => match &self.accelerated {
                Ok(backend) => match f(backend.as_ref(), layout, scores.view()) {
                    Err(e) if self.config.policy != AcceleratorPolicy::Forced => {
                        warn!("{}: accelerated backend failed ({}), using portable", op, e);
                        f(&self.portable, layout, scores.view())
                    }
                    r => r,
                },
                Err(e) => Err(e.clone()),
            },
        }
    }
}

impl Default for Lattice {
    fn default() -> Self {
        Lattice::new(LatticeConfig::default())
    }
}

//
// exposed functions
//

///
/// Find the highest scoring flip-flop paths of a batch of score matrices.
///
/// Returns `[T+1, N, 2B]` forward scores, `[T, N, 2B]` traceback and
/// `[T+1, N]` paths. The accelerated backend is used when the scores are
/// `Shared` unless `disable_accelerated` is set.
///
pub fn decode_paths(scores: &ScoreTensor, disable_accelerated: bool) -> Result<ViterbiOutput> {
    Lattice::new(LatticeConfig::disable_accelerated(disable_accelerated)).decode_paths(scores)
}

///
/// Log-partition function of each batch element, `[N]`.
///
pub fn log_partition(scores: &ScoreTensor) -> Result<Array1<Score>> {
    Lattice::default().log_partition(scores)
}

///
/// Posterior transition probabilities (not logs), `[T, N, S]`.
///
pub fn posterior_transitions(
    scores: &ScoreTensor,
    disable_accelerated: bool,
) -> Result<Array3<Score>> {
    Lattice::new(LatticeConfig::disable_accelerated(disable_accelerated))
        .posterior_transitions(scores)
}

//
// tests
//
