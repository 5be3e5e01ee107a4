//!
//! Portable and accelerated backends produce the same results
//!
#![cfg(feature = "accelerated")]
#[macro_use]
extern crate approx;

use flipflop::backend::{AcceleratorPolicy, BackendKind};
use flipflop::utils::{max_abs_diff, random_scores};
use flipflop::{Lattice, LatticeConfig, Residency, ScoreTensor};
use proptest::prelude::*;

fn lattices() -> (Lattice, Lattice) {
    let portable = Lattice::new(LatticeConfig::new(AcceleratorPolicy::Disabled, None));
    let accelerated = Lattice::new(LatticeConfig::new(AcceleratorPolicy::Forced, Some(2)));
    (portable, accelerated)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn backends_agree(
        n_blocks in 1usize..30,
        n_batch in 1usize..6,
        n_base in 1usize..5,
        scale in 0.1f64..8.0,
        seed in any::<u64>(),
    ) {
        let scores = ScoreTensor::with_residency(
            random_scores(n_blocks, n_batch, n_base, scale, seed),
            Residency::Shared,
        );
        let (portable, accelerated) = lattices();
        prop_assert_eq!(portable.backend_for(&scores), BackendKind::Portable);
        prop_assert_eq!(accelerated.backend_for(&scores), BackendKind::Accelerated);

        let vp = portable.decode_paths(&scores).unwrap();
        let va = accelerated.decode_paths(&scores).unwrap();
        prop_assert!(max_abs_diff(&vp.forward, &va.forward) < 1e-9);
        prop_assert_eq!(&vp.path, &va.path);

        let zp = portable.log_partition(&scores).unwrap();
        let za = accelerated.log_partition(&scores).unwrap();
        prop_assert!(max_abs_diff(&zp, &za) < 1e-9);

        let pp = portable.posterior_transitions(&scores).unwrap();
        let pa = accelerated.posterior_transitions(&scores).unwrap();
        prop_assert!(max_abs_diff(&pp, &pa) < 1e-9);
    }
}

#[test]
fn auto_uses_accelerated_only_for_shared_scores() {
    let lattice = Lattice::default();
    let data = random_scores(10, 2, 4, 1.0, 0);
    let host = ScoreTensor::new(data.clone());
    let shared = ScoreTensor::with_residency(data, Residency::Shared);
    assert_eq!(lattice.backend_for(&host), BackendKind::Portable);
    assert_eq!(lattice.backend_for(&shared), BackendKind::Accelerated);

    let a = lattice.posterior_transitions(&host).unwrap();
    let b = lattice.posterior_transitions(&shared).unwrap();
    assert_abs_diff_eq!(a, b, epsilon = 1e-9);
}
