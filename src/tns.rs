//! TNS — Temporal Noise Shaping (§ 4.4).
//!
//! Up to two spectral regions are analyzed per frame, each subdivided into
//! sub-blocks for autocorrelation, fed through Levinson-Durbin to produce
//! reflection coefficients and a prediction gain, then lattice-filtered
//! in place (FIR on encode, IIR on decode). Grounded on
//! `spectral/linear_prediction.rs`'s Levinson-Durbin recursion — generalized
//! from LP-order-10 time-domain analysis over a fixed window to a
//! variable-order analysis over arbitrary spectral sub-ranges, and from
//! `LPCoefficients`'s reflection-coefficient byproduct to the actual
//! transmitted quantity here. Region analysis (autocorrelation,
//! Levinson-Durbin, the gain-threshold weighting decision) runs in `f64`,
//! the same closed-form numerical search every fixed-point reference
//! codec still drives in floating point before quantizing its result to a
//! transmitted index. The lattice filters that actually touch every
//! spectral sample, [`lattice_fir`]/[`lattice_iir`], run in genuine Q15
//! fixed-point directly over the `Block32` mantissa array via
//! [`crate::fixed_point::l_mac_q15`]/[`l_msu_q15`] — reflection
//! coefficients cross from `f64` to `Q15` exactly once per region, at
//! [`dequantize_region`]'s call site, not once per sample.

use crate::block::Block32;
use crate::fixed_point::{f64_to_q15, l_mac_q15, l_msu_q15};
use crate::mdct::block32_to_f64;
use crate::tables::quant_tables::{tns_reconstruction_points, TNS_INDEX_SHIFT};

/// Maximum TNS filter order analyzed per region.
pub const MAX_ORDER: usize = 8;

/// Prediction-gain threshold above which a region's filter is applied
/// rather than bypassed (§ 4.4's "if gain > threshold 1").
const GAIN_THRESHOLD_APPLY: f64 = 1.5;
/// Upper threshold above which coefficients are used unweighted; between
/// the two thresholds, coefficients are attenuated ("optional LPC
/// weighting").
const GAIN_THRESHOLD_FULL: f64 = 3.0;

/// One analyzed spectral region: its bin range and quantized filter.
#[derive(Debug, Clone)]
pub struct TnsRegion {
    pub start: usize,
    pub stop: usize,
    pub active: bool,
    /// Quantization level indices, length `order` (trailing no-op levels
    /// trimmed per § 4.4).
    pub quant_indices: Vec<usize>,
}

impl TnsRegion {
    fn order(&self) -> usize {
        self.quant_indices.len()
    }
}

/// Two-region TNS side info for one frame (§ 4.4: "two when cutoff >= index
/// 3 and frame >= 5 ms", otherwise a single region spanning the full band).
#[derive(Debug, Clone)]
pub struct TnsParameters {
    pub regions: Vec<TnsRegion>,
}

/// Decide the region split for this frame: two regions when `max_bw` is at
/// least index 3's cutoff and the frame is long enough, otherwise one.
pub fn region_split(num_bins: usize, bandwidth_index: u8, frame_dms: u32) -> Vec<(usize, usize)> {
    if bandwidth_index >= 3 && frame_dms >= 50 {
        let mid = num_bins / 2;
        vec![(0, mid), (mid, num_bins)]
    } else {
        vec![(0, num_bins)]
    }
}

/// Windowed autocorrelation of `region`'s spectral samples up to lag
/// `MAX_ORDER`, optionally tapered by an analysis window (§ 4.4's
/// `tnsAcfWindow`), matching the window-then-autocorrelate
/// structure in `LinearPredictor::analyze`.
fn autocorrelation(region: &[f64], window: Option<&[f64]>) -> Vec<f64> {
    let windowed: Vec<f64> = match window {
        Some(w) => region.iter().zip(w.iter()).map(|(&s, &w)| s * w).collect(),
        None => region.to_vec(),
    };
    let n = windowed.len();
    let order = MAX_ORDER.min(n.saturating_sub(1));
    (0..=order)
        .map(|lag| (0..n - lag).map(|i| windowed[i] * windowed[i + lag]).sum())
        .collect()
}

/// Levinson-Durbin recursion: autocorrelation coefficients in, reflection
/// coefficients (one per order, `k[0]..k[order-1]`) and final prediction
/// error energy out. Mirrors the `levinson_durbin_bcg729` loop
/// structure (running LP-coefficient update, sign convention on the
/// reflection coefficient) but over `f64` true values instead of Q27/Q31
/// fixed mantissas.
fn levinson_durbin(r: &[f64]) -> (Vec<f64>, f64) {
    let order = r.len() - 1;
    let mut a = vec![0.0f64; order + 1];
    let mut reflection = vec![0.0f64; order];
    a[0] = 1.0;

    let mut error = r[0];
    if error <= 0.0 {
        return (reflection, 0.0);
    }

    for i in 1..=order {
        let mut acc = r[i];
        for j in 1..i {
            acc += a[j] * r[i - j];
        }
        let k = -acc / error;
        reflection[i - 1] = k;

        let mut updated = a.clone();
        for j in 1..i {
            updated[j] = a[j] + k * a[i - j];
        }
        updated[i] = k;
        a = updated;

        error *= 1.0 - k * k;
        if error <= 0.0 {
            break;
        }
    }

    (reflection, error)
}

/// Prediction gain from the autocorrelation energy and the residual error
/// Levinson-Durbin converges to: `r[0] / error`, undefined (treated as 1,
/// i.e. bypass) when the region carries no energy.
fn prediction_gain(r0: f64, error: f64) -> f64 {
    if error <= 0.0 || r0 <= 0.0 {
        1.0
    } else {
        r0 / error
    }
}

/// Quantize a reflection coefficient (range `[-1, 1]`) to the nearest of
/// `2*TNS_COEF_RES+1` reconstruction points (§ 4.4).
fn quantize_coefficient(k: f64, points: &[f64]) -> usize {
    points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - k).abs().partial_cmp(&(*b - k).abs()).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(TNS_INDEX_SHIFT)
}

/// Analyze the full spectrum and produce quantized TNS side info, per
/// region. Coefficients are weighted down toward the no-op level when the
/// prediction gain falls between the apply/full thresholds, and regions
/// whose gain never clears `GAIN_THRESHOLD_APPLY` are flagged inactive
/// (bypassed, 1-bit flag per § 4.4).
pub fn analyze(spectrum: &Block32, bandwidth_index: u8, frame_dms: u32, acf_window: Option<&[f64]>) -> TnsParameters {
    let true_values = block32_to_f64(spectrum);
    let splits = region_split(true_values.len(), bandwidth_index, frame_dms);
    let points = tns_reconstruction_points();

    let mut regions = Vec::with_capacity(splits.len());
    for (start, stop) in splits {
        let slice = &true_values[start..stop];
        let sub_blocks = 3.min(slice.len().max(1));
        let sub_len = (slice.len() / sub_blocks).max(1);

        // Average autocorrelation over the region's sub-blocks (§ 4.4:
        // "each region is subdivided, typically 3 sub-blocks").
        let mut r = vec![0.0f64; MAX_ORDER + 1];
        let mut blocks_used = 0;
        for b in 0..sub_blocks {
            let b_start = b * sub_len;
            let b_end = if b + 1 == sub_blocks { slice.len() } else { (b + 1) * sub_len };
            if b_end <= b_start {
                continue;
            }
            let block_r = autocorrelation(&slice[b_start..b_end], acf_window);
            for (acc, &v) in r.iter_mut().zip(block_r.iter()) {
                *acc += v;
            }
            blocks_used += 1;
        }
        if blocks_used > 1 {
            for v in &mut r {
                *v /= blocks_used as f64;
            }
        }

        let (reflection, error) = levinson_durbin(&r);
        let gain = prediction_gain(r[0], error);

        if gain <= GAIN_THRESHOLD_APPLY {
            regions.push(TnsRegion { start, stop, active: false, quant_indices: Vec::new() });
            continue;
        }

        let weight = if gain >= GAIN_THRESHOLD_FULL {
            1.0
        } else {
            (gain - GAIN_THRESHOLD_APPLY) / (GAIN_THRESHOLD_FULL - GAIN_THRESHOLD_APPLY)
        };

        let mut quant_indices: Vec<usize> = reflection.iter().map(|&k| quantize_coefficient(k * weight, &points)).collect();
        // Trim trailing no-op levels to shorten the transmitted order.
        while quant_indices.last() == Some(&TNS_INDEX_SHIFT) {
            quant_indices.pop();
        }

        let active = !quant_indices.is_empty();
        regions.push(TnsRegion { start, stop, active, quant_indices });
    }

    TnsParameters { regions }
}

/// Dequantize a region's transmitted indices back to reflection
/// coefficients in `Q15` (the lattice filters' native format), padding
/// with the no-op level up to the encoder's intended order (the order
/// itself is implicit in `quant_indices.len()` since trailing no-ops were
/// trimmed before transmission). This is the one place per region where a
/// coefficient crosses from the reconstruction-point table's `f64` into
/// the fixed-point signal path — once per region, not once per sample.
fn dequantize_region(region: &TnsRegion, points: &[f64]) -> Vec<i16> {
    region.quant_indices.iter().map(|&idx| f64_to_q15(points[idx])).collect()
}

/// In-place lattice FIR filter over `samples[start..stop]` (§ 4.4's
/// "Encode filter"), run directly on `Block32` mantissas against `Q15`
/// reflection coefficients via [`l_mac_q15`] — no `f64` round-trip. State
/// length equals the filter order; initial state is zero. `state[j]` holds
/// `b_j(n-1)`, the stage-`j` backward residual from the previous sample,
/// in the standard two-multiplier PARCOR lattice recursion
/// `f_j(n) = f_{j-1}(n) + k_j*b_{j-1}(n-1)`,
/// `b_j(n) = b_{j-1}(n-1) + k_j*f_{j-1}(n)`.
fn lattice_fir(samples: &mut [i32], reflection_q15: &[i16]) {
    let order = reflection_q15.len();
    let mut state = vec![0i32; order];

    for x in samples.iter_mut() {
        let mut new_state = vec![0i32; order];
        new_state[0] = *x;
        let mut f_prev = *x;
        for j in 1..=order {
            let k = reflection_q15[j - 1];
            let b_prev = state[j - 1];
            let f_cur = l_mac_q15(f_prev, b_prev, k);
            if j < order {
                new_state[j] = l_mac_q15(b_prev, f_prev, k);
            }
            f_prev = f_cur;
        }
        *x = f_prev;
        state = new_state;
    }
}

/// In-place lattice IIR filter, the exact inverse of [`lattice_fir`] for the
/// same reflection coefficients (§ 4.4's "Decode filter"): runs the same
/// recursion backward from the top stage, recovering `f_{j-1}` from `f_j`
/// and `b_{j-1}(n-1)` at each stage before reconstructing the next
/// sample's state identically to the encoder's, via [`l_msu_q15`]/
/// [`l_mac_q15`] over the same `i32` mantissas [`lattice_fir`] filters.
fn lattice_iir(samples: &mut [i32], reflection_q15: &[i16]) {
    let order = reflection_q15.len();
    let mut state = vec![0i32; order];

    for x in samples.iter_mut() {
        let mut new_state = vec![0i32; order];
        let mut f_cur = *x;
        for j in (1..=order).rev() {
            let k = reflection_q15[j - 1];
            let b_prev = state[j - 1];
            let f_prev = l_msu_q15(f_cur, b_prev, k);
            if j < order {
                new_state[j] = l_mac_q15(b_prev, f_prev, k);
            }
            f_cur = f_prev;
        }
        new_state[0] = f_cur;
        *x = f_cur;
        state = new_state;
    }
}

/// Apply the encode-side TNS filter to `spectrum` in place, per region.
/// Filtering runs directly on `spectrum.m`'s `i32` mantissas; no stage
/// here touches `f64`.
pub fn apply_encode(spectrum: &mut Block32, params: &TnsParameters) {
    let points = tns_reconstruction_points();
    for region in &params.regions {
        if !region.active {
            continue;
        }
        let reflection_q15 = dequantize_region(region, &points);
        lattice_fir(&mut spectrum.m[region.start..region.stop], &reflection_q15);
    }
}

/// Apply the decode-side TNS filter to `spectrum` in place, per region.
/// Filtering runs directly on `spectrum.m`'s `i32` mantissas; no stage
/// here touches `f64`.
pub fn apply_decode(spectrum: &mut Block32, params: &TnsParameters) {
    let points = tns_reconstruction_points();
    for region in &params.regions {
        if !region.active {
            continue;
        }
        let reflection_q15 = dequantize_region(region, &points);
        lattice_iir(&mut spectrum.m[region.start..region.stop], &reflection_q15);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_split_follows_bandwidth_and_duration() {
        assert_eq!(region_split(80, 3, 100).len(), 2);
        assert_eq!(region_split(80, 2, 100).len(), 1);
        assert_eq!(region_split(80, 3, 25).len(), 1);
    }

    #[test]
    fn levinson_durbin_is_stable_on_white_noise_autocorrelation() {
        let r = vec![1.0, 0.0, 0.0, 0.0, 0.0];
        let (reflection, error) = levinson_durbin(&r);
        assert!(reflection.iter().all(|&k| k.abs() < 1e-9));
        assert!((error - 1.0).abs() < 1e-9);
    }

    #[test]
    fn quiet_region_is_flagged_inactive() {
        let spectrum = Block32::new(vec![0; 64], 0);
        let params = analyze(&spectrum, 4, 100, None);
        assert!(params.regions.iter().all(|r| !r.active));
    }

    #[test]
    fn fir_then_iir_lattice_round_trips() {
        let reflection_q15: Vec<i16> = [0.3, -0.2, 0.1].iter().map(|&k| f64_to_q15(k)).collect();
        let original: Vec<i32> = (0..16).map(|i| ((i as f64 * 0.37).sin() * 1_000_000.0) as i32).collect();
        let mut forward = original.clone();
        lattice_fir(&mut forward, &reflection_q15);
        let mut restored = forward.clone();
        lattice_iir(&mut restored, &reflection_q15);
        for (a, b) in original.iter().zip(restored.iter()) {
            let diff = (a - b).abs();
            assert!(diff < a.abs() / 100 + 50, "{a} vs {b}");
        }
    }

    #[test]
    fn encode_then_decode_round_trips_through_blocks() {
        let mut true_values = vec![0.0f64; 64];
        for (i, v) in true_values.iter_mut().enumerate() {
            *v = (i as f64 * 0.5).sin() * 1000.0;
        }
        let mut spectrum = crate::mdct::f64_to_block32(&true_values);
        let params = analyze(&spectrum, 4, 100, None);
        let before = block32_to_f64(&spectrum);
        apply_encode(&mut spectrum, &params);
        apply_decode(&mut spectrum, &params);
        let after = block32_to_f64(&spectrum);
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < (a.abs() + 1.0) * 1e-2, "{a} vs {b}");
        }
    }
}
