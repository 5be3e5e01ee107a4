//!
//! Lattice backends and the dispatch policy between them
//!
//! * `PortableBackend` always available, time-major batched sweeps
//! * `AcceleratedBackend` (feature `accelerated`) runs the per-sequence
//!   kernels in parallel over the batch axis
//!
//! Both produce the same results up to floating point tolerance.
//!
pub mod portable;

#[cfg(feature = "accelerated")]
pub mod accelerated;

pub use portable::PortableBackend;

#[cfg(feature = "accelerated")]
pub use accelerated::AcceleratedBackend;

use crate::config::LatticeConfig;
use crate::error::{LatticeError, Result};
use crate::flipflop::FlipFlopLayout;
use crate::lattice::{BackwardOutput, ForwardOutput, ViterbiOutput};
use crate::prob::Score;
use crate::scores::Residency;
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

/// Identifies which backend runs a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Reference implementation, always available.
    Portable,
    /// Batch-parallel implementation.
    Accelerated,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BackendKind::Portable => write!(f, "portable"),
            BackendKind::Accelerated => write!(f, "accelerated"),
        }
    }
}

///
/// Caller's choice about the accelerated backend
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceleratorPolicy {
    /// use it when available and the scores are `Shared`
    Auto,
    /// never use it
    Disabled,
    /// always use it, and surface its errors
    Forced,
}

impl Default for AcceleratorPolicy {
    fn default() -> Self {
        AcceleratorPolicy::Auto
    }
}

impl std::fmt::Display for AcceleratorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AcceleratorPolicy::Auto => write!(f, "auto"),
            AcceleratorPolicy::Disabled => write!(f, "disabled"),
            AcceleratorPolicy::Forced => write!(f, "forced"),
        }
    }
}

///
/// Pick the backend of a call.
///
/// * `Disabled` portable
/// * `Forced` accelerated, even if unavailable (the caller gets the error)
/// * `Auto` accelerated only if available and the scores are `Shared`
///
pub fn select_backend(
    residency: Residency,
    policy: AcceleratorPolicy,
    available: bool,
) -> BackendKind {
    match policy {
        AcceleratorPolicy::Disabled => BackendKind::Portable,
        AcceleratorPolicy::Forced => BackendKind::Accelerated,
        AcceleratorPolicy::Auto => {
            if available && residency == Residency::Shared {
                BackendKind::Accelerated
            } else {
                BackendKind::Portable
            }
        }
    }
}

///
/// A lattice implementation.
///
/// `layout` has already been validated against `scores` (`[T, N, S]`,
/// `T >= 1`, `N >= 1`).
///
pub trait LatticeBackend: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> BackendKind;
    /// Viterbi decoding
    fn viterbi(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Result<ViterbiOutput>;
    /// Forward sweep under `LogSumExp`
    fn forward(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Result<ForwardOutput>;
    /// Backward sweep under `LogSumExp`
    fn backward(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>)
        -> Result<BackwardOutput>;
    /// Posterior transition probabilities
    fn posterior(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Result<Array3<Score>>;
}

///
/// Set up the accelerated backend from the configuration.
///
#[cfg(feature = "accelerated")]
pub fn accelerated_backend(config: &LatticeConfig) -> Result<Box<dyn LatticeBackend>> {
    let backend = match config.n_threads {
        Some(n_threads) => AcceleratedBackend::with_threads(n_threads)?,
        None => AcceleratedBackend::new(),
    };
    Ok(Box::new(backend))
}

///
/// Set up the accelerated backend from the configuration.
///
#[cfg(not(feature = "accelerated"))]
pub fn accelerated_backend(_config: &LatticeConfig) -> Result<Box<dyn LatticeBackend>> {
    Err(LatticeError::BackendUnavailable {
        kind: BackendKind::Accelerated,
    })
}

///
/// Reject a backend that produced non-finite values.
///
/// Scores are validated before the sweep, so this only fires on a backend
/// bug; it keeps `nan` from reaching the caller.
///
pub(crate) fn check_finite<'a, I: IntoIterator<Item = &'a Score>>(op: &str, xs: I) -> Result<()> {
    if xs.into_iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(LatticeError::overflow(format!("{} produced a non-finite value", op)))
    }
}

//
// tests
//
