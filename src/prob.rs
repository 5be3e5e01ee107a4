//!
//! Log-space score calculation
//! implements logaddexp and the two semirings used by the lattice
//!
//! Every score in this crate is an unnormalized log weight, so "multiplying"
//! two weights is `+` and "adding" them is either `max` (Viterbi) or
//! `logaddexp` (partition function).
//!

/// Score value type of the lattice (log scale)
pub type Score = f64;

///
/// Large positive constant whose negation represents "impossible" in log
/// space. Finite so that `-LARGE_VAL + score` never becomes `-inf` or `nan`.
///
pub const LARGE_VAL: Score = 1e30;

///
/// Largest accepted `max|score| * T` of an input.
///
/// Forward, backward and `log Z` carry rounding errors proportional to the
/// magnitude of path scores, and posteriors exponentiate their difference.
/// Below this bound the error stays around `1e-7` in log space.
///
pub const MAX_PATH_MAGNITUDE: Score = 1e8;

///
/// Addition of two weights `exp(x) + exp(y)` in log space
///
/// If `x > y`:
///
/// ```text
/// log(exp(x) + exp(y))
///  = log(exp(x) (1 + exp(y-x)))
///  = x + log(1 + exp(y-x))
/// ```
#[inline]
pub fn log_add_exp(x: Score, y: Score) -> Score {
    let (x, y) = if x >= y { (x, y) } else { (y, x) };
    if y == Score::NEG_INFINITY {
        x
    } else if x == y {
        x + std::f64::consts::LN_2
    } else {
        x + (y - x).exp().ln_1p()
    }
}

///
/// `log(sum_i exp(x_i))` with the running max subtracted before
/// exponentiating.
///
/// Returns `-inf` for an empty iterator.
///
pub fn log_sum_exp<I: IntoIterator<Item = Score>>(xs: I) -> Score {
    xs.into_iter().fold(Score::NEG_INFINITY, log_add_exp)
}

///
/// Index and value of the maximum element.
///
/// Ties are broken by the first occurrence, so the result is deterministic
/// for a fixed iteration order. Returns `None` for an empty iterator.
///
pub fn argmax_first<I: IntoIterator<Item = Score>>(xs: I) -> Option<(usize, Score)> {
    xs.into_iter()
        .enumerate()
        .fold(None, |best, (i, x)| match best {
            Some((_, y)) if y >= x => best,
            _ => Some((i, x)),
        })
}

///
/// Commutative "sum" over alternative paths of a log-space semiring
///
/// `(Score, plus, +, zero, 0.0)` where the "product" is always ordinary
/// addition of log weights.
///
pub trait Semiring {
    /// identity of `plus`
    fn zero() -> Score;
    /// combine two alternative path weights
    fn plus(x: Score, y: Score) -> Score;
    /// combine all alternative path weights
    fn sum<I: IntoIterator<Item = Score>>(xs: I) -> Score {
        xs.into_iter().fold(Self::zero(), Self::plus)
    }
}

///
/// Tropical `(max, +)` semiring. Best single path.
///
#[derive(Clone, Copy, Debug)]
pub struct MaxPlus;

impl Semiring for MaxPlus {
    fn zero() -> Score {
        Score::NEG_INFINITY
    }
    fn plus(x: Score, y: Score) -> Score {
        x.max(y)
    }
}

///
/// Log `(logaddexp, +)` semiring. Total weight of all paths.
///
#[derive(Clone, Copy, Debug)]
pub struct LogSumExp;

impl Semiring for LogSumExp {
    fn zero() -> Score {
        Score::NEG_INFINITY
    }
    fn plus(x: Score, y: Score) -> Score {
        log_add_exp(x, y)
    }
}

//
// tests
//
