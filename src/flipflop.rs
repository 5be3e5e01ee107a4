//!
//! Flip-flop state space and transition layout
//!
//! # States
//!
//! For `B` bases there are `2B` states.
//! `0..B` are flip states (one per base) and `B..2B` are flop states.
//! A run of the same base is written by alternating flip and flop, so two
//! consecutive identical bases are distinguishable.
//!
//! # Transition layout
//!
//! One time step of the score tensor has `S = 2B(B+1)` transition scores.
//!
//! ```text
//!        from state (flip uppercase, flop lowercase)
//!        A C G T a c g t
//!   A    0   ---     7        to flip A
//!   C    8   ---    15        to flip C
//!   G   16   ---    23        to flip G
//!   T   24   ---    31        to flip T
//!   X   32   ---    39        to flop, X = lower(from)
//! ```
//!
//! * `to_base * 2B + from_state`: any state to flip `to_base`
//! * `2B * B + b`:                flip `b` to flop `b`
//! * `2B * B + B + b`:            flop `b` stays in flop `b`
//!
//! Every state has exactly `B + 1` outgoing transitions.
//!
use crate::error::{LatticeError, Result};
use crate::prob::Score;
use itertools::Itertools;
use ndarray::ArrayView2;
use std::ops::Range;

/// Canonical alphabet size (ACGT)
pub const DEFAULT_N_BASE: usize = 4;

///
/// Index arithmetic of the flip-flop transition vector for a fixed number of
/// bases. Every consumer of the flat score vector goes through this struct.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlipFlopLayout {
    n_base: usize,
}

///
/// A single transition `from -> to` between two states.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
}

impl FlipFlopLayout {
    ///
    /// Layout for `n_base` bases. `n_base` must be positive.
    ///
    pub fn new(n_base: usize) -> Result<Self> {
        if n_base == 0 {
            return Err(LatticeError::shape("number of bases must be positive"));
        }
        Ok(FlipFlopLayout { n_base })
    }
    ///
    /// Derive the number of bases `B` from the transition-score length
    /// `S = 2B(B+1)`.
    ///
    /// ```
    /// use flipflop::flipflop::FlipFlopLayout;
    /// assert_eq!(FlipFlopLayout::from_n_trans(40).unwrap().n_base(), 4);
    /// assert!(FlipFlopLayout::from_n_trans(5).is_err());
    /// ```
    pub fn from_n_trans(n_trans: usize) -> Result<Self> {
        // B is within one of sqrt(S/2)
        let guess = ((n_trans / 2) as f64).sqrt() as usize;
        (guess.saturating_sub(1)..=guess.saturating_add(1))
            .filter(|&n_base| n_base > 0)
            .find(|&n_base| n_trans_of(n_base) == Some(n_trans))
            .map(|n_base| FlipFlopLayout { n_base })
            .ok_or_else(|| {
                LatticeError::shape(format!(
                    "{} transition scores is not 2B(B+1) for any positive B",
                    n_trans
                ))
            })
    }
    /// Number of bases `B`
    pub fn n_base(&self) -> usize {
        self.n_base
    }
    /// Number of states `2B`
    pub fn n_state(&self) -> usize {
        2 * self.n_base
    }
    /// Number of transitions `S = 2B(B+1)`
    pub fn n_trans(&self) -> usize {
        self.n_state() * (self.n_base + 1)
    }
    /// Number of transitions into flip states `S - 2B`
    pub fn n_to_flip(&self) -> usize {
        self.n_state() * self.n_base
    }

    //
    // states
    //

    /// Is the state a flip state?
    pub fn is_flip(&self, state: usize) -> bool {
        state < self.n_base
    }
    /// Is the state a flop state?
    pub fn is_flop(&self, state: usize) -> bool {
        state >= self.n_base && state < self.n_state()
    }
    /// Base index that the state represents
    pub fn base_of(&self, state: usize) -> usize {
        state % self.n_base
    }
    /// Flip state of the base
    pub fn flip(&self, base: usize) -> usize {
        base
    }
    /// Flop state of the base
    pub fn paired_flop(&self, base: usize) -> usize {
        self.n_base + base
    }

    //
    // transition indices
    //

    ///
    /// Index of the transition `from_state -> flip(to_base)`
    ///
    pub fn to_flip_index(&self, to_base: usize, from_state: usize) -> usize {
        to_base * self.n_state() + from_state
    }
    ///
    /// Index of the transition into `flop(base)`, either from `flip(base)`
    /// (`from_flop=false`) or from `flop(base)` itself (`from_flop=true`).
    ///
    pub fn to_flop_index(&self, base: usize, from_flop: bool) -> usize {
        let offset = if from_flop { self.n_base } else { 0 };
        self.n_to_flip() + offset + base
    }
    ///
    /// Range of the score vector holding transitions into `flip(to_base)`.
    /// The `k`-th element of the range is the transition from state `k`.
    ///
    pub fn to_flip_range(&self, to_base: usize) -> Range<usize> {
        let start = self.to_flip_index(to_base, 0);
        start..start + self.n_state()
    }
    ///
    /// Range of the score vector holding transitions into flop states.
    /// The `k`-th element of the range is the transition from state `k` into
    /// `flop(base_of(k))`.
    ///
    pub fn to_flop_range(&self) -> Range<usize> {
        self.n_to_flip()..self.n_trans()
    }
    ///
    /// The two states that may precede `flop(base)`, flip first.
    ///
    pub fn flop_origins(&self, base: usize) -> [usize; 2] {
        [self.flip(base), self.paired_flop(base)]
    }
    ///
    /// Decode a transition index into its `(from, to)` states.
    ///
    pub fn transition(&self, index: usize) -> Option<Transition> {
        if index < self.n_to_flip() {
            Some(Transition {
                from: index % self.n_state(),
                to: index / self.n_state(),
            })
        } else if index < self.n_trans() {
            let from = index - self.n_to_flip();
            Some(Transition {
                from,
                to: self.paired_flop(self.base_of(from)),
            })
        } else {
            None
        }
    }
    ///
    /// Index of the transition `from -> to`, or `None` if the flip-flop
    /// model does not allow it.
    ///
    pub fn transition_index(&self, from: usize, to: usize) -> Option<usize> {
        let n_state = self.n_state();
        if from >= n_state || to >= n_state {
            None
        } else if self.is_flip(to) {
            Some(self.to_flip_index(to, from))
        } else if self.base_of(from) == self.base_of(to) {
            Some(self.to_flop_index(self.base_of(to), self.is_flop(from)))
        } else {
            None
        }
    }
    ///
    /// Iterator of all `(index, transition)` in score vector order
    ///
    pub fn transitions(&self) -> impl Iterator<Item = (usize, Transition)> + '_ {
        (0..self.n_trans()).filter_map(move |s| self.transition(s).map(|tr| (s, tr)))
    }

    //
    // paths
    //

    ///
    /// Collapse a state path into base indices.
    ///
    /// A base is emitted at the first position and wherever the state changes,
    /// so a flip/flop alternation of the same base yields repeated bases.
    ///
    pub fn path_to_bases<I: IntoIterator<Item = usize>>(&self, path: I) -> Vec<usize> {
        path.into_iter()
            .dedup()
            .map(|state| self.base_of(state))
            .collect()
    }
    ///
    /// Total score `sum_t score[t, path[t] -> path[t+1]]` of a state path
    /// under a `(T, S)` score matrix.
    ///
    /// Returns `None` if the path length is not `T+1` or the path uses a
    /// transition the model does not allow.
    ///
    pub fn path_score(&self, scores: ArrayView2<Score>, path: &[usize]) -> Option<Score> {
        if path.len() != scores.nrows() + 1 || scores.ncols() != self.n_trans() {
            return None;
        }
        path.iter()
            .tuple_windows()
            .enumerate()
            .map(|(t, (&from, &to))| {
                self.transition_index(from, to)
                    .map(|s| scores[[t, s]])
            })
            .sum()
    }
}

///
/// `2B(B+1)`, or `None` if it does not fit in `usize`
///
fn n_trans_of(n_base: usize) -> Option<usize> {
    n_base
        .checked_add(1)
        .and_then(|x| x.checked_mul(n_base))
        .and_then(|x| x.checked_mul(2))
}

impl Default for FlipFlopLayout {
    fn default() -> Self {
        FlipFlopLayout {
            n_base: DEFAULT_N_BASE,
        }
    }
}

impl std::fmt::Display for FlipFlopLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "FlipFlop(n_base={}, n_state={}, n_trans={})",
            self.n_base,
            self.n_state(),
            self.n_trans()
        )
    }
}

//
// tests
//
