//!
//! Flip-flop CRF decoding
//!
//! Batched dynamic programming over the flip-flop state space:
//! Viterbi decoding of the best state path, the log-partition function, and
//! the posterior probability of every transition.
//!
//! ```
//! use flipflop::{decode_paths, log_partition, ScoreTensor};
//! use ndarray::Array3;
//!
//! // T=10 steps, N=2 sequences, 4 bases (S=40)
//! let scores = ScoreTensor::new(Array3::zeros((10, 2, 40)));
//! let out = decode_paths(&scores, false).unwrap();
//! assert_eq!(out.path.dim(), (11, 2));
//! let log_z = log_partition(&scores).unwrap();
//! assert_eq!(log_z.len(), 2);
//! ```
//!
pub mod backend;
pub mod config;
pub mod error;
pub mod flipflop;
pub mod lattice;
pub mod prob;
pub mod scores;
pub mod utils;

#[cfg(test)]
#[macro_use]
extern crate approx;

pub use backend::{AcceleratorPolicy, BackendKind, LatticeBackend};
pub use config::LatticeConfig;
pub use error::{LatticeError, Result};
pub use flipflop::FlipFlopLayout;
pub use lattice::{
    decode_paths, log_partition, posterior_transitions, BackwardOutput, ForwardOutput, Lattice,
    ViterbiOutput,
};
pub use prob::{Score, LARGE_VAL, MAX_PATH_MAGNITUDE};
pub use scores::{Residency, ScoreTensor};
