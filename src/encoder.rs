//! Frame-pipeline orchestration, encode side (§ 5): one call per frame, run
//! to completion, no suspension points. Stages run in the listed order;
//! exact bitstream bit-packing is delegated to an external packer per § 6 —
//! this stage produces the parsed per-frame fields the packer consumes.

use crate::block::{Block16, Block32};
use crate::config::{CodecConfig, FrameGeometry};
use crate::error::Result;
use crate::ltpf::{self, LtpfParams, LtpfState};
use crate::mdct::{self, MdctSpectrum};
use crate::quantize::{self, QuantizedSpectrum};
use crate::scratch::ScratchArena;
use crate::sns::{self, SnsParameters};
use crate::tns::{self, TnsParameters};

/// Energy, relative to a region's own peak band, below which a band is
/// considered silent for bandwidth-detection purposes (-40 dB).
const BANDWIDTH_QUIET_THRESHOLD: f64 = 1e-4;

/// Bandwidth detector (§ 2): splits the spectrum into `num_bands` segments,
/// finds the highest segment whose energy clears
/// [`BANDWIDTH_QUIET_THRESHOLD`] relative to the loudest segment, and
/// confirms every segment above it is also quiet (a brickwall) before
/// reporting anything below `ceiling_idx` — a single stray high-frequency
/// bin in an otherwise empty tail must not be mistaken for real content.
/// Returns the reported bandwidth index and the spectral bin at which the
/// cutoff should actually be applied.
fn detect_bandwidth(spectrum: &Block32, ceiling_idx: u8, ceiling_bin: usize, num_bands: usize) -> (u8, usize) {
    let true_values = mdct::block32_to_f64(spectrum);
    let usable_len = ceiling_bin.min(true_values.len()).max(1);
    let bins_per_band = (usable_len / num_bands).max(1);

    let mut band_energy = vec![0.0f64; num_bands];
    for (band, energy) in band_energy.iter_mut().enumerate() {
        let start = (band * bins_per_band).min(usable_len);
        let end = ((band + 1) * bins_per_band).min(usable_len);
        *energy = true_values[start..end].iter().map(|&v| v * v).sum();
    }
    let peak = band_energy.iter().cloned().fold(0.0, f64::max).max(1e-12);

    let mut highest_active = 0usize;
    for (band, &energy) in band_energy.iter().enumerate() {
        if energy / peak > BANDWIDTH_QUIET_THRESHOLD {
            highest_active = band;
        }
    }
    let brickwalled = band_energy[highest_active + 1..].iter().all(|&e| e / peak <= BANDWIDTH_QUIET_THRESHOLD);
    if !brickwalled {
        return (ceiling_idx, ceiling_bin);
    }

    let active_fraction = (highest_active + 1) as f64 / num_bands as f64;
    let detected_idx = (active_fraction * f64::from(ceiling_idx)).ceil().clamp(0.0, f64::from(ceiling_idx)) as u8;
    let cutoff_bin = ((active_fraction * usable_len as f64).ceil() as usize).clamp(1, ceiling_bin);
    (detected_idx, cutoff_bin)
}

/// Attack detector (§ 2): a transient whose second half carries
/// substantially more energy than either its first half or the previous
/// frame's trailing energy. On an attack, LTPF's predictor is suppressed
/// for the frame (via the caller overriding [`LtpfParams::active`]) since
/// running a long-term postfilter across an onset smears it into the
/// filter's history window.
fn detect_attack(history: &[f64], current: &[f64]) -> bool {
    const ATTACK_RISE_RATIO: f64 = 4.0;
    let half = current.len() / 2;
    if half == 0 {
        return false;
    }
    let first_half_energy: f64 = current[..half].iter().map(|v| v * v).sum();
    let second_half_energy: f64 = current[half..].iter().map(|v| v * v).sum();
    let prev_tail_start = history.len().saturating_sub(half);
    let prev_tail_energy: f64 = history[prev_tail_start..].iter().map(|v| v * v).sum::<f64>().max(1e-9);
    second_half_energy > first_half_energy.max(prev_tail_energy) * ATTACK_RISE_RATIO
}

/// Every parsed per-frame field the bitstream packer needs to carry,
/// matching the ordered list in § 6 (bit layout itself is out of scope).
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub bandwidth_index: u8,
    pub global_gain_index: u8,
    pub tns: TnsParameters,
    pub ltpf: LtpfParams,
    pub sns: SnsParameters,
    pub quantized: QuantizedSpectrum,
    pub noise_factor_idx: u8,
}

/// Per-channel encoder instance. Owns the low-delay MDCT's doubled-input
/// window history, the LTPF pitch-tracking state, and the time-domain
/// history used for LTPF's open-loop pitch search — the only state
/// persisted across frame calls (§ 5's "no shared mutable state" applies
/// across instances, not within one instance's own history).
pub struct EncoderState {
    config: CodecConfig,
    geometry: FrameGeometry,
    /// Previous frame's PCM, prepended to the current frame before the
    /// MDCT analysis transform per § 4.2's doubled-input window contract.
    mdct_prev: Vec<i16>,
    ltpf_state: LtpfState,
    pcm_history: Vec<f64>,
    /// Per-frame scratch storage for the doubled MDCT analysis window: sized
    /// once at open, reset at the top of every [`EncoderState::encode_frame`]
    /// call so building the window never reallocates.
    scratch: ScratchArena,
}

impl EncoderState {
    /// Open a new encoder instance, validating the configuration and
    /// resolving its derived per-rate constants once (§ 10.3).
    pub fn open(config: CodecConfig) -> Result<Self> {
        let geometry = config.validate()?;
        tracing::info!(
            sample_rate_hz = config.sampling_rate.hz(),
            frame_dms = geometry.frame_dms,
            block_len = geometry.block_len,
            "opening LC3 encoder instance"
        );
        Ok(Self {
            config,
            mdct_prev: vec![0; geometry.block_len],
            ltpf_state: LtpfState::new(),
            pcm_history: vec![0.0; geometry.block_len],
            scratch: ScratchArena::with_capacity(geometry.block_len * 2, 0),
            geometry,
        })
    }

    /// Reset persisted state (MDCT window history, LTPF history) without
    /// reallocating or re-validating the configuration.
    pub fn reset(&mut self) {
        self.mdct_prev.iter_mut().for_each(|v| *v = 0);
        self.ltpf_state = LtpfState::new();
        self.pcm_history.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Encode one frame of `frame_len` 16-bit PCM samples.
    pub fn encode_frame(&mut self, pcm: &[i16]) -> Result<EncodedFrame> {
        debug_assert_eq!(pcm.len(), self.geometry.frame_len);

        // 1. Low-delay MDCT analysis (§ 4.2): doubled input is the previous
        //    frame's samples followed by this frame's, built in the scratch
        //    arena rather than a freshly heap-allocated `Vec` every frame.
        self.scratch.reset();
        let doubled_handle = self.scratch.alloc_i16(self.mdct_prev.len() + pcm.len())?;
        {
            let doubled = self.scratch.get_i16_mut(doubled_handle);
            let (prev_half, cur_half) = doubled.split_at_mut(self.mdct_prev.len());
            prev_half.copy_from_slice(&self.mdct_prev);
            cur_half.copy_from_slice(pcm);
        }
        let input = Block16::new(self.scratch.get_i16(doubled_handle).to_vec(), 0);
        let MdctSpectrum { mut spectrum, .. } = mdct::analyze(input, self.geometry.block_len);
        self.mdct_prev.copy_from_slice(pcm);

        // 2. Bandwidth detection (§ 2): walk the spectrum's energy from the
        //    top down and cut at the highest band that actually carries
        //    content, rather than always transmitting this configuration's
        //    static sample-rate ceiling. Never reports a bandwidth above
        //    that ceiling.
        let (bandwidth_index, cutoff_bin) = detect_bandwidth(&spectrum, self.geometry.fs_idx as u8, self.geometry.max_bw, self.geometry.num_bands);
        if cutoff_bin < spectrum.len() {
            for v in &mut spectrum.m[cutoff_bin..] {
                *v = 0;
            }
        }

        // 3. SNS: per-band envelope, PVQ-quantize, apply gains (§ 4.3).
        const SNS_PULSE_BUDGET: usize = 10;
        let energies = sns::compute_band_energies(&spectrum, self.geometry.num_bands);
        let sns_params = sns::quantize_envelope(&energies, SNS_PULSE_BUDGET);
        let scf_q = sns::dequantize_envelope(&sns_params);
        let gains = sns::interpolate_gains(&scf_q, spectrum.len());
        sns::apply_gains(&mut spectrum, &gains);

        // 4. TNS: analyze and apply the lattice FIR in place (§ 4.4).
        let tns_params = tns::analyze(&spectrum, bandwidth_index, u32::from(self.geometry.frame_dms), None);
        tns::apply_encode(&mut spectrum, &tns_params);

        // 5. LTPF: open-loop pitch refinement and activation decision runs
        //    on the time-domain history, independent of the spectral path.
        let ol_pitch = self.estimate_open_loop_pitch();
        let ol_normcorr = self.open_loop_normcorr(ol_pitch);
        let current_pcm: Vec<f64> = pcm.iter().map(|&s| f64::from(s)).collect();
        let mut ltpf_params = ltpf::encoder::analyze(&self.pcm_history, &current_pcm, ol_pitch, ol_normcorr, &mut self.ltpf_state);
        if self.config.attack_handling && detect_attack(&self.pcm_history, &current_pcm) {
            ltpf_params.active = false;
        }
        self.pcm_history = current_pcm;

        // 6. Quantize the shaped spectrum against the target bit budget.
        let true_spectrum = mdct::block32_to_f64(&spectrum);
        let target_bits = u32::from(self.config.target_bytes) * 8;
        const LSB_MODE_MIN_TARGET_BYTES: u16 = 40;
        let lsb_mode_enabled = self.config.target_bytes >= LSB_MODE_MIN_TARGET_BYTES;
        let quantized = quantize::quantize(&true_spectrum, target_bits, lsb_mode_enabled, target_bits as usize / 8);

        // 7. Noise-factor index: flag the spectral flatness of the
        //    post-quantization residual so the decoder's noise filler can
        //    reconstruct a comparable perceptual floor.
        let noise_factor_idx = self.estimate_noise_factor(&true_spectrum, &quantized);

        Ok(EncodedFrame {
            bandwidth_index,
            global_gain_index: quantized.gain_index,
            tns: tns_params,
            ltpf: ltpf_params,
            sns: sns_params,
            quantized,
            noise_factor_idx,
        })
    }

    /// Open-loop pitch search over the pitch-history buffer, grounded on
    /// the same normalized-correlation idiom LTPF uses for its refined
    /// search, but over the full plausible pitch range.
    fn estimate_open_loop_pitch(&self) -> usize {
        const MIN_PITCH: usize = 32;
        let max_pitch = self.pcm_history.len().saturating_sub(1).max(MIN_PITCH);
        let mut best_pitch = MIN_PITCH;
        let mut best_corr = f64::MIN;
        for candidate in MIN_PITCH..=max_pitch {
            if candidate >= self.pcm_history.len() {
                break;
            }
            let a = &self.pcm_history[..self.pcm_history.len() - candidate];
            let b = &self.pcm_history[candidate..];
            let corr = ltpf::normalized_correlation(a, b);
            if corr > best_corr {
                best_corr = corr;
                best_pitch = candidate;
            }
        }
        best_pitch
    }

    fn open_loop_normcorr(&self, pitch: usize) -> f64 {
        if pitch >= self.pcm_history.len() {
            return 0.0;
        }
        let a = &self.pcm_history[..self.pcm_history.len() - pitch];
        let b = &self.pcm_history[pitch..];
        ltpf::normalized_correlation(a, b)
    }

    /// Estimate a 3-bit noise-factor index from how much energy the
    /// quantizer zeroed relative to the original shaped spectrum — a
    /// flatter discarded residual implies a higher appropriate noise
    /// floor to fill with at decode time.
    fn estimate_noise_factor(&self, original: &[f64], quantized: &QuantizedSpectrum) -> u8 {
        let dequantized = quantize::dequantize(quantized);
        let residual_energy: f64 = original
            .iter()
            .zip(dequantized.iter())
            .map(|(o, q)| (o - q) * (o - q))
            .sum();
        let total_energy: f64 = original.iter().map(|v| v * v).sum::<f64>().max(1e-9);
        let ratio = (residual_energy / total_energy).clamp(0.0, 1.0);
        (ratio * 7.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FrameDuration, SamplingRate};

    #[test]
    fn encodes_a_silent_frame_without_error() {
        let config = CodecConfig::new(SamplingRate::Hz16000, FrameDuration::Dms100);
        let mut encoder = EncoderState::open(config).expect("valid configuration");
        let pcm = vec![0i16; encoder.geometry.frame_len];
        let frame = encoder.encode_frame(&pcm).expect("encode must succeed");
        assert_eq!(frame.quantized.quantized.iter().filter(|&&q| q != 0).count(), 0);
    }

    #[test]
    fn encodes_a_tone_frame_and_selects_a_gain_index() {
        let config = CodecConfig::new(SamplingRate::Hz16000, FrameDuration::Dms100);
        let mut encoder = EncoderState::open(config).expect("valid configuration");
        let n = encoder.geometry.frame_len;
        let pcm: Vec<i16> = (0..n).map(|i| ((2.0 * std::f64::consts::PI * 440.0 * i as f64 / 16000.0).sin() * 8000.0) as i16).collect();
        let frame = encoder.encode_frame(&pcm).expect("encode must succeed");
        assert!(frame.quantized.quantized.iter().any(|&q| q != 0));
    }

    #[test]
    fn bandwidth_detector_reports_full_ceiling_for_full_band_noise() {
        let m: Vec<i32> = (0..64).map(|i| 1_000_000 + i * 1000).collect();
        let spectrum = crate::block::Block32::new(m, 0);
        let (idx, bin) = detect_bandwidth(&spectrum, 4, 64, 16);
        assert_eq!(idx, 4);
        assert_eq!(bin, 64);
    }

    #[test]
    fn bandwidth_detector_cuts_down_for_low_pass_content() {
        let mut m = vec![0i32; 64];
        for v in &mut m[..16] {
            *v = 1_000_000;
        }
        let spectrum = crate::block::Block32::new(m, 0);
        let (idx, bin) = detect_bandwidth(&spectrum, 4, 64, 16);
        assert!(idx < 4, "expected a reduced bandwidth index, got {idx}");
        assert!(bin <= 32, "expected a reduced cutoff bin, got {bin}");
    }

    #[test]
    fn attack_detector_fires_on_a_sharp_onset() {
        let history = vec![0.0f64; 64];
        let mut current = vec![0.0f64; 64];
        for v in &mut current[32..] {
            *v = 10_000.0;
        }
        assert!(detect_attack(&history, &current));
    }

    #[test]
    fn attack_detector_is_silent_for_steady_content() {
        let history = vec![5000.0f64; 64];
        let current = vec![5000.0f64; 64];
        assert!(!detect_attack(&history, &current));
    }

    #[test]
    fn reset_clears_pitch_history() {
        let config = CodecConfig::new(SamplingRate::Hz16000, FrameDuration::Dms100);
        let mut encoder = EncoderState::open(config).expect("valid configuration");
        let n = encoder.geometry.frame_len;
        let pcm = vec![1000i16; n];
        let _ = encoder.encode_frame(&pcm);
        encoder.reset();
        assert!(encoder.pcm_history.iter().all(|&v| v == 0.0));
    }
}
