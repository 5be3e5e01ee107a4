//!
//! Decoder configuration
//!
use crate::backend::AcceleratorPolicy;
use crate::error::{LatticeError, Result};
use serde::{Deserialize, Serialize};

///
/// Configuration of a `Lattice`.
///
/// * `policy` whether the accelerated backend may be used
/// * `n_threads` size of the dedicated thread pool of the accelerated
///   backend. `None` uses the global rayon pool.
///
/// Missing fields in JSON fall back to the defaults:
///
/// ```
/// use flipflop::config::LatticeConfig;
/// use flipflop::backend::AcceleratorPolicy;
/// let c = LatticeConfig::from_json_str(r#"{"policy": "forced"}"#).unwrap();
/// assert_eq!(c.policy, AcceleratorPolicy::Forced);
/// assert_eq!(c.n_threads, None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    pub policy: AcceleratorPolicy,
    pub n_threads: Option<usize>,
}

impl LatticeConfig {
    pub fn new(policy: AcceleratorPolicy, n_threads: Option<usize>) -> Self {
        LatticeConfig { policy, n_threads }
    }
    ///
    /// `Disabled` if `disable` is set, `Auto` otherwise.
    ///
    pub fn disable_accelerated(disable: bool) -> Self {
        let policy = if disable {
            AcceleratorPolicy::Disabled
        } else {
            AcceleratorPolicy::Auto
        };
        LatticeConfig {
            policy,
            n_threads: None,
        }
    }
    ///
    /// Parse from a JSON string.
    ///
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| LatticeError::InvalidConfig(e.to_string()))
    }
    ///
    /// Serialize into a JSON string.
    ///
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LatticeError::InvalidConfig(e.to_string()))
    }
}

impl std::fmt::Display for LatticeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "policy: {}", self.policy)?;
        match self.n_threads {
            Some(n) => writeln!(f, "n_threads: {}", n),
            None => writeln!(f, "n_threads: global"),
        }
    }
}

//
// tests
//
