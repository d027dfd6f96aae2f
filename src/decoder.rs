//! Frame-pipeline orchestration, decode side (§ 5): dequantize, reverse the
//! spectral shaping stages, inverse-transform, and apply the LTPF synthesis
//! filter — or, on a lost frame, dispatch into the PLC controller instead.

use crate::config::{CodecConfig, FrameGeometry};
use crate::encoder::EncodedFrame;
use crate::error::Result;
use crate::ltpf::{self, LtpfState};
use crate::mdct::{self, OverlapMemory};
use crate::plc::{classifier, ConcealedOutput, PlcState};
use crate::quantize::{self, noise_fill};
use crate::sns;
use crate::tns;

/// Per-channel decoder instance. Owns the IMDCT overlap memory, the LTPF
/// synthesis history, the noise-fill LCG seed, and the PLC controller state
/// (§ 5, § 4.7).
pub struct DecoderState {
    config: CodecConfig,
    geometry: FrameGeometry,
    overlap: OverlapMemory,
    ltpf_state: LtpfState,
    ltpf_history: Vec<i16>,
    noise_seed: u16,
    plc: PlcState,
    last_good_spectrum: Vec<f64>,
    last_good_noise_level: f64,
}

impl DecoderState {
    /// Open a new decoder instance, validating the configuration and
    /// resolving its derived per-rate constants once (§ 10.3).
    pub fn open(config: CodecConfig) -> Result<Self> {
        let geometry = config.validate()?;
        tracing::info!(
            sample_rate_hz = config.sampling_rate.hz(),
            frame_dms = geometry.frame_dms,
            block_len = geometry.block_len,
            "opening LC3 decoder instance"
        );
        Ok(Self {
            config,
            overlap: OverlapMemory::new(geometry.block_len / 2),
            ltpf_state: LtpfState::new(),
            ltpf_history: vec![0i16; geometry.block_len * 2],
            noise_seed: 0x2468,
            plc: PlcState::new(),
            last_good_spectrum: vec![0.0; geometry.block_len],
            last_good_noise_level: 0.0,
            geometry,
        })
    }

    /// Reset all persisted state without reallocating or re-validating the
    /// configuration.
    pub fn reset(&mut self) {
        self.overlap = OverlapMemory::new(self.geometry.block_len / 2);
        self.ltpf_state = LtpfState::new();
        self.ltpf_history.iter_mut().for_each(|v| *v = 0);
        self.plc = PlcState::new();
        self.last_good_spectrum.iter_mut().for_each(|v| *v = 0.0);
        self.last_good_noise_level = 0.0;
    }

    /// Decode one good (`bfi == 0`) or partially-concealed (`bfi == 2`)
    /// frame. Full losses (`bfi == 1`) go through [`DecoderState::conceal`]
    /// instead, since they carry no `EncodedFrame` payload to decode.
    pub fn decode_frame(&mut self, frame: &EncodedFrame, bfi: u8) -> Result<Vec<i16>> {
        debug_assert_ne!(bfi, 1, "bfi==1 frames must go through DecoderState::conceal");

        // 1. Dequantize, then noise-fill the quantization holes (§ 4.6).
        let mut spectrum = quantize::dequantize(&frame.quantized);
        let noise_width = 2;
        let spec_inv_idx = spectrum.len();
        noise_fill::fill(&mut spectrum, noise_width, frame.noise_factor_idx, spec_inv_idx, self.last_good_noise_level, &mut self.noise_seed);
        self.last_good_noise_level = noise_fill::noise_level(frame.noise_factor_idx);

        // 1b. Partial concealment (bfi==2): the classifier decides whether
        // this frame's payload is trustworthy enough to keep; if not, it is
        // escalated to a full loss and reconstructed the same way bfi==1
        // would be, discarding the unreliable payload entirely. A kept
        // partial frame is scaled down by a gain-interpolation factor
        // (§ 4.7's `fac`/`fac_e`) before the rest of the pipeline runs, the
        // same cumulative-damping idea full-loss concealment uses, but
        // applied once rather than compounded across a burst.
        if bfi == 2 {
            let total_energy: f64 = spectrum.iter().map(|v| v * v).sum::<f64>().max(1e-12);
            let sub_energy: f64 = spectrum[..spec_inv_idx.min(spectrum.len())].iter().map(|v| v * v).sum();
            let inputs = classifier::ClassifierInputs {
                prev_bfi: self.plc.prev_bfi,
                stability_factor: self.plc.stability_factor,
                pitch_present: self.ltpf_state.active,
                peak_misaligned: false,
                sub_inversion_energy_ratio: sub_energy / total_energy,
            };
            if self.plc.classify_partial(inputs) == 1 {
                return self.conceal();
            }
            let gain = self.plc.partial_concealment_gain(self.geometry.frame_dms);
            for v in spectrum.iter_mut() {
                *v *= gain;
            }
        }

        // 2. TNS decode: IIR lattice reverses the encoder's FIR (§ 4.4).
        let mut block = mdct::f64_to_block32(&spectrum);
        tns::apply_decode(&mut block, &frame.tns);

        // 3. SNS: reapply the same band gains the encoder derived (shape
        //    info is carried losslessly in `frame.sns.scf_q` at this core's
        //    abstraction level, since PVQ index<->vector round-trips
        //    exactly).
        let gains = sns::interpolate_gains(&frame.sns.scf_q, block.len());
        sns::apply_gains(&mut block, &gains);

        // 4. Low-delay IMDCT synthesis with overlap-add (§ 4.2).
        let time_domain = mdct::synthesize(&block, &mut self.overlap, self.geometry.block_len, self.geometry.max_bw);
        let mut output = time_domain.m;

        // 5. LTPF synthesis filter, applied in place over the reconstructed
        //    time-domain output using prior output as its predictor history.
        ltpf::decoder::synthesize(&mut output, &self.ltpf_history, frame.ltpf, &mut self.ltpf_state);
        self.push_ltpf_history(&output);

        // Remember this frame's shaped spectrum for PLC methods 3/4, which
        // conceal by perturbing the last known-good spectrum.
        self.last_good_spectrum = spectrum;

        if bfi == 2 {
            self.plc.update_after_frame(2);
        } else {
            self.plc.update_after_frame(0);
        }

        Ok(output)
    }

    /// Conceal one fully lost (`bfi == 1`) frame, or a `bfi == 2` frame the
    /// classifier escalated, via the PLC controller. Noise substitution
    /// yields a perturbed spectrum that still needs IMDCT synthesis;
    /// time-domain LPC and phase ECU both yield finished PCM directly, so
    /// synthesis is skipped for them rather than run a second time over
    /// already-reconstructed output.
    pub fn conceal(&mut self) -> Result<Vec<i16>> {
        let pitch_available = self.ltpf_state.active;
        let pitch_lag = self.ltpf_state.pitch.max(1);
        let sample_rate_hz = self.config.sampling_rate.hz();
        let last_good_signal: Vec<f64> = self.ltpf_history.iter().map(|&s| f64::from(s)).collect();

        let concealed = self.plc.conceal(
            &self.last_good_spectrum,
            &last_good_signal,
            sample_rate_hz,
            self.config.concealment_method_preference,
            self.geometry.frame_dms,
            self.geometry.block_len,
            pitch_available,
            pitch_lag,
        );

        let output: Vec<i16> = match concealed {
            ConcealedOutput::Spectral(spectrum) => {
                let block = mdct::f64_to_block32(&spectrum);
                let time_domain = mdct::synthesize(&block, &mut self.overlap, self.geometry.block_len, self.geometry.max_bw);
                self.last_good_spectrum = spectrum;
                time_domain.m
            }
            ConcealedOutput::TimeDomain(signal) => signal.into_iter().map(|v| v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16).collect(),
        };

        self.push_ltpf_history(&output);
        self.plc.update_after_frame(1);

        Ok(output)
    }

    fn push_ltpf_history(&mut self, output: &[i16]) {
        let keep = self.ltpf_history.len().saturating_sub(output.len());
        self.ltpf_history.copy_within(output.len().., 0);
        self.ltpf_history.truncate(keep);
        self.ltpf_history.extend_from_slice(output);
    }
}
