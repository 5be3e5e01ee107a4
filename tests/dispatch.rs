//!
//! Fallback and error surfacing of the backend dispatch
//!
use flipflop::backend::{AcceleratorPolicy, BackendKind, LatticeBackend};
use flipflop::utils::random_scores;
use flipflop::{
    BackwardOutput, FlipFlopLayout, ForwardOutput, Lattice, LatticeConfig, LatticeError,
    Residency, Result, Score, ScoreTensor, ViterbiOutput,
};
use ndarray::{Array3, ArrayView3};

/// Accelerated backend that always fails
struct Broken;

impl Broken {
    fn fail<T>() -> Result<T> {
        Err(LatticeError::Backend("device lost".to_string()))
    }
}

impl LatticeBackend for Broken {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerated
    }
    fn viterbi(&self, _: &FlipFlopLayout, _: ArrayView3<Score>) -> Result<ViterbiOutput> {
        Broken::fail()
    }
    fn forward(&self, _: &FlipFlopLayout, _: ArrayView3<Score>) -> Result<ForwardOutput> {
        Broken::fail()
    }
    fn backward(&self, _: &FlipFlopLayout, _: ArrayView3<Score>) -> Result<BackwardOutput> {
        Broken::fail()
    }
    fn posterior(&self, _: &FlipFlopLayout, _: ArrayView3<Score>) -> Result<Array3<Score>> {
        Broken::fail()
    }
}

fn shared_scores() -> ScoreTensor {
    ScoreTensor::with_residency(random_scores(8, 2, 4, 2.0, 1), Residency::Shared)
}

#[test]
fn auto_falls_back_to_portable() {
    let scores = shared_scores();
    let broken = Lattice::with_accelerated(LatticeConfig::default(), Box::new(Broken));
    let portable = Lattice::new(LatticeConfig::disable_accelerated(true));
    assert_eq!(broken.backend_for(&scores), BackendKind::Accelerated);

    assert_eq!(
        broken.decode_paths(&scores).unwrap(),
        portable.decode_paths(&scores).unwrap()
    );
    assert_eq!(
        broken.log_partition(&scores).unwrap(),
        portable.log_partition(&scores).unwrap()
    );
    assert_eq!(
        broken.posterior_transitions(&scores).unwrap(),
        portable.posterior_transitions(&scores).unwrap()
    );
}

#[test]
fn forced_surfaces_the_error() {
    let scores = shared_scores();
    let config = LatticeConfig::new(AcceleratorPolicy::Forced, None);
    let broken = Lattice::with_accelerated(config, Box::new(Broken));
    let e = broken.decode_paths(&scores).unwrap_err();
    assert_eq!(e, LatticeError::Backend("device lost".to_string()));
    assert!(broken.posterior_transitions(&scores).is_err());
    assert!(broken.log_partition(&scores).is_err());
}

#[test]
fn disabled_never_touches_the_accelerated_backend() {
    let scores = shared_scores();
    let config = LatticeConfig::new(AcceleratorPolicy::Disabled, None);
    let broken = Lattice::with_accelerated(config, Box::new(Broken));
    assert_eq!(broken.backend_for(&scores), BackendKind::Portable);
    assert!(broken.decode_paths(&scores).is_ok());
}

#[test]
fn forced_with_a_bad_thread_count_is_an_error() {
    let config = LatticeConfig::new(AcceleratorPolicy::Forced, Some(0));
    let lattice = Lattice::new(config);
    assert!(!lattice.has_accelerated());
    assert!(lattice.decode_paths(&shared_scores()).is_err());

    // Auto with the same setup quietly uses the portable backend
    let lattice = Lattice::new(LatticeConfig::new(AcceleratorPolicy::Auto, Some(0)));
    assert!(lattice.decode_paths(&shared_scores()).is_ok());
}

#[test]
fn shape_errors_come_before_dispatch() {
    let broken = Lattice::with_accelerated(
        LatticeConfig::new(AcceleratorPolicy::Forced, None),
        Box::new(Broken),
    );
    let bad = ScoreTensor::new(Array3::zeros((3, 1, 5)));
    assert!(matches!(
        broken.decode_paths(&bad),
        Err(LatticeError::InvalidScoreShape { .. })
    ));
    let empty = ScoreTensor::new(Array3::zeros((0, 1, 4)));
    assert!(matches!(
        broken.log_partition(&empty),
        Err(LatticeError::InvalidScoreShape { .. })
    ));
    let huge = ScoreTensor::new(Array3::from_elem((2, 1, 4), 1e30));
    assert!(matches!(
        broken.posterior_transitions(&huge),
        Err(LatticeError::NumericOverflow { .. })
    ));
}
