//!
//! Portable backend
//!
//! Reference implementation. Runs the time-major batched sweeps of
//! `lattice::sweep` on the calling thread.
//!
use super::{check_finite, BackendKind, LatticeBackend};
use crate::error::Result;
use crate::flipflop::FlipFlopLayout;
use crate::lattice::{sweep, BackwardOutput, ForwardOutput, ViterbiOutput};
use crate::prob::{LogSumExp, Score};
use ndarray::{Array3, ArrayView3};

#[derive(Debug, Clone, Copy, Default)]
pub struct PortableBackend;

impl LatticeBackend for PortableBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Portable
    }
    fn viterbi(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Result<ViterbiOutput> {
        let out = sweep::viterbi(layout, scores);
        check_finite("viterbi", out.forward.iter())?;
        Ok(out)
    }
    fn forward(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Result<ForwardOutput> {
        let out = sweep::forward::<LogSumExp>(layout, scores);
        check_finite("forward", out.log_z.iter())?;
        Ok(out)
    }
    fn backward(
        &self,
        layout: &FlipFlopLayout,
        scores: ArrayView3<Score>,
    ) -> Result<BackwardOutput> {
        let out = sweep::backward::<LogSumExp>(layout, scores);
        check_finite("backward", out.log_z.iter())?;
        Ok(out)
    }
    fn posterior(&self, layout: &FlipFlopLayout, scores: ArrayView3<Score>) -> Result<Array3<Score>> {
        let post = sweep::posterior(layout, scores);
        check_finite("posterior", post.iter())?;
        Ok(post)
    }
}
