//! Method 4 — noise substitution (§ 4.7): overwrite the spectrum with a
//! sign-randomized scaled copy of the last good spectrum, damping
//! differently above and below a frame-energy threshold.

use super::damping::scramble_next;

/// Fraction of frame RMS energy above which a coefficient is treated as
/// "loud" and gets the faster fade plus additive noise term.
const LOUD_THRESHOLD_FRACTION: f64 = 0.1;
/// Additive noise scale applied to loud coefficients, relative to their
/// own magnitude.
const ADDITIVE_NOISE_SCALE: f64 = 0.05;

/// Conceal one lost frame via noise substitution. `last_good` is the
/// previous frame's decoded spectrum (unmodified source of truth);
/// `slow_fade`/`fast_fade` are this frame's cumulative damping factors
/// from [`super::damping::CumulativeFade`]; `seed` is the sign-scrambling
/// LCG state, advanced in place. Returns the concealed spectrum.
pub fn conceal(last_good: &[f64], slow_fade: f64, fast_fade: f64, pitch_present: bool, seed: &mut u16) -> Vec<f64> {
    let rms = (last_good.iter().map(|&v| v * v).sum::<f64>() / last_good.len().max(1) as f64).sqrt();
    let threshold = rms * LOUD_THRESHOLD_FRACTION;

    let mut out: Vec<f64> = last_good
        .iter()
        .map(|&v| {
            let sign_flip = scramble_next(seed, pitch_present);
            let magnitude = v.abs();
            let signed = if sign_flip { -v.signum() } else { v.signum() };
            if magnitude > threshold {
                let noise = signed * magnitude * ADDITIVE_NOISE_SCALE * if scramble_next(seed, pitch_present) { 1.0 } else { -1.0 };
                fast_fade * (signed * magnitude + noise)
            } else {
                signed * magnitude * slow_fade
            }
        })
        .collect();

    // High-pass the two lowest bins to avoid DC runaway (§ 4.7).
    if out.len() >= 2 {
        out[0] *= 0.0;
        out[1] *= 0.5;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conceal_preserves_length_and_zeros_dc() {
        let last_good: Vec<f64> = (0..32).map(|i| (i as f64).sin() * 50.0).collect();
        let mut seed = 1u16;
        let out = conceal(&last_good, 0.8, 0.5, false, &mut seed);
        assert_eq!(out.len(), last_good.len());
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn full_damping_to_zero_silences_output() {
        let last_good: Vec<f64> = (0..16).map(|i| (i as f64).cos() * 20.0).collect();
        let mut seed = 5u16;
        let out = conceal(&last_good, 0.0, 0.0, true, &mut seed);
        assert!(out.iter().all(|&v| v.abs() < 1e-9));
    }
}
