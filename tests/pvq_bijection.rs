//! Stress test for the PVQ index<->vector bijection across a wider range of
//! `(n, k)` than the small exhaustive cases already covered inline in
//! `sns::pvq`'s unit tests. Full enumeration is infeasible once `n`/`k`
//! grow, so this samples random pulse vectors per `(n, k)` and checks both
//! the round trip and that no two distinct vectors collide on the same
//! index.

use lc3_dsp_core::sns::pvq::{enumeration_size, mpvq2vec, vec2mpvq, PvqParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

fn random_pulse_vector(rng: &mut StdRng, n: usize, k: usize) -> Vec<i32> {
    let mut y = vec![0i32; n];
    let mut remaining = k;
    while remaining > 0 {
        let pos = rng.gen_range(0..n);
        let sign = if rng.gen_bool(0.5) { 1 } else { -1 };
        y[pos] += sign;
        remaining -= 1;
    }
    y
}

#[test]
fn pvq_bijection_stress_round_trips_and_stays_collision_free() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let mut total_checked = 0usize;

    for &n in &[6usize, 10, 16] {
        for k in 1..=10usize {
            let params = PvqParams { n, k };
            let size = enumeration_size(&params) as usize;
            let samples = 200.min(size.max(1));
            let mut seen: HashMap<u32, Vec<i32>> = HashMap::new();

            for _ in 0..samples {
                let v = random_pulse_vector(&mut rng, n, k);
                let magnitude_sum: i32 = v.iter().map(|x| x.abs()).sum();
                assert_eq!(magnitude_sum as usize, k);

                let (sign, index) = vec2mpvq(&v, &params);
                assert!(
                    (index as usize) < size,
                    "index {index} out of range for enumeration size {size} at (n={n}, k={k})"
                );

                let decoded = mpvq2vec(sign, index, &params);
                assert_eq!(decoded, v, "round trip mismatch at (n={n}, k={k})");

                if let Some(prior) = seen.insert(index, v.clone()) {
                    assert_eq!(
                        prior, v,
                        "index collision between distinct vectors at (n={n}, k={k})"
                    );
                }
                total_checked += 1;
            }
        }
    }

    assert!(total_checked >= 1_000, "expected a substantial sample, got {total_checked}");
}
