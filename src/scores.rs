//!
//! Score tensor `scores[t, n, s]`
//!
//! * `t` time step (block) in `0..T`
//! * `n` batch element in `0..N`
//! * `s` flip-flop transition in `0..S`, `S = 2B(B+1)`
//!
//! Values are log-scale transition weights: the score of a path is the sum
//! of the scores of its transitions.
//!
use crate::error::{LatticeError, Result};
use crate::flipflop::FlipFlopLayout;
use crate::prob::{Score, MAX_PATH_MAGNITUDE};
use ndarray::{Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

///
/// Where the score buffer lives.
///
/// `Shared` buffers are addressable by the accelerated backend, `Host`
/// buffers are only touched by the portable backend.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Residency {
    Host,
    Shared,
}

impl std::fmt::Display for Residency {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Residency::Host => write!(f, "host"),
            Residency::Shared => write!(f, "shared"),
        }
    }
}

///
/// Batch of flip-flop score matrices with dimensions `[T, N, S]`
///
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreTensor {
    data: Array3<Score>,
    residency: Residency,
}

impl ScoreTensor {
    ///
    /// Wrap a `[T, N, S]` array living in host memory.
    ///
    pub fn new(data: Array3<Score>) -> Self {
        ScoreTensor {
            data,
            residency: Residency::Host,
        }
    }
    ///
    /// Wrap a `[T, N, S]` array with an explicit residency.
    ///
    pub fn with_residency(data: Array3<Score>, residency: Residency) -> Self {
        ScoreTensor { data, residency }
    }
    ///
    /// Convert single precision network output.
    ///
    pub fn from_f32(data: &Array3<f32>, residency: Residency) -> Self {
        ScoreTensor {
            data: data.mapv(|x| x as Score),
            residency,
        }
    }
    ///
    /// Build from a flat row-major buffer of length `T*N*S`.
    ///
    pub fn from_shape_vec(shape: (usize, usize, usize), data: Vec<Score>) -> Result<Self> {
        let data = Array3::from_shape_vec(shape, data)
            .map_err(|e| LatticeError::shape(format!("{}", e)))?;
        Ok(ScoreTensor::new(data))
    }
    /// Move the tensor to another residency. The values are unchanged.
    pub fn into_residency(self, residency: Residency) -> Self {
        ScoreTensor {
            data: self.data,
            residency,
        }
    }

    //
    // accessors
    //

    /// Residency of the buffer
    pub fn residency(&self) -> Residency {
        self.residency
    }
    /// Number of time steps `T`
    pub fn n_blocks(&self) -> usize {
        self.data.len_of(Axis(0))
    }
    /// Number of batch elements `N`
    pub fn n_batch(&self) -> usize {
        self.data.len_of(Axis(1))
    }
    /// Number of transition scores per step `S`
    pub fn n_trans(&self) -> usize {
        self.data.len_of(Axis(2))
    }
    /// `[T, N, S]` view
    pub fn view(&self) -> ArrayView3<Score> {
        self.data.view()
    }
    /// `[T, S]` view of a single batch element
    pub fn sequence(&self, n: usize) -> ArrayView2<Score> {
        self.data.index_axis(Axis(1), n)
    }
    /// Unwrap the underlying array
    pub fn into_inner(self) -> Array3<Score> {
        self.data
    }

    //
    // validation
    //

    ///
    /// Validate the tensor and derive its flip-flop layout.
    ///
    /// * `T == 0`, `N == 0` or `S != 2B(B+1)` is `InvalidScoreShape`
    /// * a non-finite score, or `max|score| * T` above `MAX_PATH_MAGNITUDE`,
    ///   is `NumericOverflow`
    ///
    pub fn layout(&self) -> Result<FlipFlopLayout> {
        let (n_blocks, n_batch, n_trans) = self.data.dim();
        if n_blocks == 0 {
            return Err(LatticeError::shape("score tensor has no time steps (T=0)"));
        }
        if n_batch == 0 {
            return Err(LatticeError::shape("score tensor has an empty batch (N=0)"));
        }
        let layout = FlipFlopLayout::from_n_trans(n_trans)?;

        let mut max_abs: Score = 0.0;
        for &x in self.data.iter() {
            if !x.is_finite() {
                return Err(LatticeError::overflow(format!(
                    "non-finite score {} in input",
                    x
                )));
            }
            max_abs = max_abs.max(x.abs());
        }
        if max_abs * (n_blocks as Score) > MAX_PATH_MAGNITUDE {
            return Err(LatticeError::overflow(format!(
                "|score| up to {} over {} steps exceeds {}",
                max_abs, n_blocks, MAX_PATH_MAGNITUDE
            )));
        }
        Ok(layout)
    }
}

impl From<Array3<Score>> for ScoreTensor {
    fn from(data: Array3<Score>) -> Self {
        ScoreTensor::new(data)
    }
}

//
// tests
//
