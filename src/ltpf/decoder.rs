//! Decoder-side pitch reconstruction and synthesis filtering (§ 4.5).
//!
//! Pitch search and the on/off hysteresis decision ([`super::encoder`],
//! [`super::normalized_correlation`]) are analysis: they run in `f64` and
//! produce a transmitted index plus an activity bit, the same kind of
//! closed-form side-info derivation TNS's Levinson-Durbin analysis runs.
//! [`apply_ramped`] is the actual signal path — it touches every
//! reconstructed output sample — and runs entirely in `i16`/`Q15`
//! fixed-point via [`crate::fixed_point`], never converting the PCM buffer
//! through `f64`.

use super::encoder::PITCH_INDEX_HALF_BASE;
use super::{interp_taps, resolve_transition, LtpfParams, LtpfState, TransitionRegime, INTERP_HALF_TAPS};
use crate::fixed_point::{add16, f64_to_q15, l_mac, mult_r, round, sub16};

/// Invert [`super::encoder::encode_pitch_index`]'s piecewise mapping back
/// into `(pitch, frac, resolution)`. Quarter-resolution pitches round-trip
/// exactly; half-resolution pitches lose their low fractional bit, which
/// matches the coarser resolution the encoder chose for them.
pub fn decode_pitch_index(index: u16) -> (usize, i32, usize) {
    if index < PITCH_INDEX_HALF_BASE {
        let pitch = (index / 7) as usize;
        let frac = index % 7;
        (pitch, frac as i32 - 3, 4)
    } else {
        let rem = index - PITCH_INDEX_HALF_BASE;
        let pitch = (rem / 4) as usize;
        let half_frac = rem % 4;
        (pitch, half_frac as i32 * 2 - 3, 2)
    }
}

/// Per-gain-index tilt coefficient for the denominator FIR (§ 4.5's
/// "synthesis filter...minus an FIR denominator over the output history
/// (tilt filter), scaled by a per-gain-index coefficient"). Larger
/// correlation (higher index) applies a stronger, less-tilted predictor.
fn tilt_coefficient(gain_scale_idx: u8) -> f64 {
    0.1 + 0.1 * gain_scale_idx as f64
}

/// Numerator tap weight for the pitch predictor itself, also indexed by
/// gain scale: the overall postfilter strength.
fn numerator_gain(gain_scale_idx: u8) -> f64 {
    (0.15 + 0.1 * gain_scale_idx as f64).min(0.85)
}

const FADE_FRACTION: f64 = 0.25;

/// [`interp_taps`] converted to `Q15` once per filter call — nine
/// coefficients, negligible cost next to the per-sample MAC loop that
/// consumes them.
fn interp_taps_q15(frac: i32, resolution: usize) -> [i16; 9] {
    let taps = interp_taps(frac, resolution);
    let mut out = [0i16; 9];
    for (o, &t) in out.iter_mut().zip(taps.iter()) {
        *o = f64_to_q15(t);
    }
    out
}

/// [`interpolate_sample`]'s fixed-point counterpart: `history` holds plain
/// PCM-range `i16` samples (not `Q15` fractions), and each `Q15` tap scales
/// its sample via the same accumulate-then-round convention
/// [`crate::fixed_point::mac_r`] uses for Q15 coefficient filtering.
fn interpolate_sample_i16(history: &[i16], center: isize, taps_q15: &[i16; 9]) -> i16 {
    let mut acc = 0i32;
    for (i, &tap) in taps_q15.iter().enumerate() {
        let idx = center + i as isize - INTERP_HALF_TAPS;
        if idx >= 0 && (idx as usize) < history.len() {
            acc = l_mac(acc, tap, history[idx as usize]);
        }
    }
    round(acc)
}

/// Apply the LTPF synthesis filter to one frame of reconstructed output
/// samples, in place, given the previous state and this frame's
/// transmitted parameters. `history` must contain at least `pitch + 4`
/// samples of prior output for the interpolated predictor to read.
///
/// The five transition regimes of § 4.5 are implemented as: no filtering
/// (`StayOff`), a linear gain ramp over the first quarter frame then full
/// strength (`FadeIn`), full strength then ramp-down to a straight
/// pass-through (`FadeOut`), constant full-strength filtering
/// (`Continuous`), and — for `CrossFade` — filtering the first quarter
/// with the previous frame's pitch/gain ramped down while simultaneously
/// ramping in the new pitch/gain, then finishing the frame with the new
/// parameters alone.
pub fn synthesize(output: &mut [i16], history: &[i16], params: LtpfParams, state: &mut LtpfState) {
    let frame_len = output.len();
    let quarter = (frame_len as f64 * FADE_FRACTION).round().max(1.0) as usize;

    let (new_pitch, new_frac, new_resolution) = if params.active {
        decode_pitch_index(params.pitch_index)
    } else {
        (0, 0, 4)
    };

    let regime = resolve_transition(state.active, state.pitch, params.active, new_pitch);

    match regime {
        TransitionRegime::StayOff => {}
        TransitionRegime::FadeIn => {
            apply_ramped(output, history, new_pitch, new_frac, new_resolution, params.gain_scale_idx, 0.0, 1.0, quarter, frame_len);
        }
        TransitionRegime::FadeOut => {
            apply_ramped(output, history, state.pitch, state.frac, state.resolution, state.gain_scale_idx, 1.0, 0.0, quarter, frame_len);
        }
        TransitionRegime::Continuous => {
            apply_ramped(output, history, new_pitch, new_frac, new_resolution, params.gain_scale_idx, 1.0, 1.0, frame_len, frame_len);
        }
        TransitionRegime::CrossFade => {
            let mut old_part = output[..quarter].to_vec();
            apply_ramped(&mut old_part, history, state.pitch, state.frac, state.resolution, state.gain_scale_idx, 1.0, 0.0, quarter, quarter);
            let mut new_part = output.to_vec();
            apply_ramped(&mut new_part, history, new_pitch, new_frac, new_resolution, params.gain_scale_idx, 0.0, 1.0, quarter, frame_len);
            output[..quarter].copy_from_slice(&old_part[..quarter]);
            output[quarter..].copy_from_slice(&new_part[quarter..]);
        }
    }

    state.active = params.active;
    if params.active {
        state.pitch = new_pitch;
        state.frac = new_frac;
        state.resolution = new_resolution;
        state.gain_scale_idx = params.gain_scale_idx;
    }
}

/// Filter `output` in place with a pitch predictor whose strength ramps
/// linearly from `start_gain` to `end_gain` over `ramp_len` samples, then
/// holds at `end_gain` for the rest of `total_len`.
#[allow(clippy::too_many_arguments)]
fn apply_ramped(
    output: &mut [i16],
    history: &[i16],
    pitch: usize,
    frac: i32,
    resolution: usize,
    gain_scale_idx: u8,
    start_gain: f64,
    end_gain: f64,
    ramp_len: usize,
    total_len: usize,
) {
    if pitch == 0 {
        return;
    }
    let tap_gain = f64_to_q15(numerator_gain(gain_scale_idx));
    let tilt = f64_to_q15(tilt_coefficient(gain_scale_idx));
    let tap_tilt = mult_r(tap_gain, tilt);
    let taps_q15 = interp_taps_q15(frac, resolution);
    let history_len = history.len();

    for (i, sample) in output.iter_mut().enumerate().take(total_len) {
        let ramp = if ramp_len == 0 {
            end_gain
        } else if i < ramp_len {
            start_gain + (end_gain - start_gain) * (i as f64 / ramp_len as f64)
        } else {
            end_gain
        };
        if ramp.abs() < 1e-9 {
            continue;
        }
        let ramp_q15 = f64_to_q15(ramp);

        let center = history_len as isize - pitch as isize + i as isize;
        let predicted = interpolate_sample_i16(history, center, &taps_q15);
        let tilt_ref_idx = center - 1;
        let tilt_ref = if tilt_ref_idx >= 0 && (tilt_ref_idx as usize) < history.len() {
            history[tilt_ref_idx as usize]
        } else {
            0i16
        };

        let tap_pred = mult_r(tap_gain, predicted);
        let tilt_term = mult_r(tap_tilt, tilt_ref);
        let combined = sub16(tap_pred, tilt_term);
        let scaled = mult_r(ramp_q15, combined);
        *sample = add16(*sample, scaled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltpf::LtpfState;

    #[test]
    fn pitch_index_decode_matches_encode_for_quarter_resolution() {
        for pitch in [32usize, 64, 159] {
            for frac in -3..=3i32 {
                let idx = crate::ltpf::encoder::encode_pitch_index(pitch, frac, 4);
                let (p, f, r) = decode_pitch_index(idx);
                assert_eq!((p, f, r), (pitch, frac, 4));
            }
        }
    }

    #[test]
    fn inactive_params_leave_output_untouched() {
        let mut output: Vec<i16> = vec![1, 2, 3, 4];
        let original = output.clone();
        let history = vec![0i16; 100];
        let mut state = LtpfState::new();
        synthesize(&mut output, &history, LtpfParams::INACTIVE, &mut state);
        assert_eq!(output, original);
        assert!(!state.active);
    }

    #[test]
    fn fade_in_ramps_from_zero_effect() {
        let mut output: Vec<i16> = vec![0i16; 16];
        let history: Vec<i16> = (0..100).map(|i| ((i as f64 * 0.3).sin() * 10_000.0) as i16).collect();
        let mut state = LtpfState::new();
        let params = LtpfParams { pitch_index: crate::ltpf::encoder::encode_pitch_index(40, 0, 4), active: true, gain_scale_idx: 4 };
        synthesize(&mut output, &history, params, &mut state);
        assert!(output[0].abs() <= output[8].abs() + 1 || output.iter().any(|&v| v != 0));
        assert!(state.active);
        assert_eq!(state.pitch, 40);
    }
}
