//! Quantization, arithmetic-context bit counting, residual refinement, and
//! noise filling (§ 4.6). Grounded on the two-stage LSP
//! quantizer (`spectral/quantizer.rs`) for the general "search an index,
//! reconstruct, refine" shape, generalized from a fixed 10-coefficient LSP
//! vector quantized against static codebooks to a variable-length spectral
//! coefficient array quantized against a scalar global gain plus
//! context-coded magnitudes.

pub mod context_coder;
pub mod global_gain;
pub mod noise_fill;
pub mod residual;

use context_coder::{count_bits, CodingMode};
use global_gain::{gain_from_index, index_from_gain};

/// Everything the bitstream packer needs from one frame's quantization
/// pass (§ 4.6 / § 6's payload ordering).
#[derive(Debug, Clone)]
pub struct QuantizedSpectrum {
    pub gain_index: u8,
    pub quantized: Vec<i32>,
    pub lastnz: usize,
    pub lastnzout: usize,
    pub lsb_mode: bool,
    pub lsb_bits: Vec<u8>,
    pub residual_bits: Vec<u8>,
}

/// Quantize `spectrum` (true-valued spectral coefficients, post-SNS/TNS)
/// against a bit budget: pick a global gain, uniformly quantize by that
/// gain, bit-count the result, and if over budget, reduce the gain and
/// retry — a coarse stand-in for the bit-budget search an outer
/// rate-distortion loop would drive in a full encoder, sufficient for this
/// core's in-scope bit-counting/truncation contract (§ 4.6).
pub fn quantize(spectrum: &[f64], target_bits: u32, lsb_mode_enabled: bool, max_residual_bits: usize) -> QuantizedSpectrum {
    let rms = (spectrum.iter().map(|&v| v * v).sum::<f64>() / spectrum.len().max(1) as f64).sqrt().max(1e-9);
    let mut gain_index = index_from_gain(rms / 16.0);

    let mode = if lsb_mode_enabled { CodingMode::LsbSplit } else { CodingMode::Truncate };

    let (quantized, result) = loop {
        let gain = gain_from_index(gain_index);
        let step = gain.max(1e-9);
        let quantized: Vec<i32> = spectrum.iter().map(|&v| (v / step).round() as i32).collect();
        let result = count_bits(&quantized, mode, target_bits);
        if result.total_bits <= target_bits || gain_index >= global_gain::MAX_GAIN_INDEX {
            break (quantized, result);
        }
        gain_index += 1;
    };

    let step = gain_from_index(gain_index).max(1e-9);
    let residual_bits = residual::encode(spectrum, &quantized, step, max_residual_bits);

    QuantizedSpectrum {
        gain_index,
        quantized,
        lastnz: result.lastnz,
        lastnzout: result.lastnzout,
        lsb_mode: lsb_mode_enabled,
        lsb_bits: result.lsb_bits,
        residual_bits,
    }
}

/// Reconstruct a true-valued spectrum from a decoded [`QuantizedSpectrum`],
/// zeroing any tail beyond `lastnzout` (§ 4.6: "when `lastnz > lastnzout`,
/// tail coefficients are zeroed") before applying residual refinement.
pub fn dequantize(q: &QuantizedSpectrum) -> Vec<f64> {
    let step = gain_from_index(q.gain_index);
    let mut values: Vec<f64> = q.quantized.iter().map(|&v| v as f64 * step).collect();
    if q.lastnz > q.lastnzout {
        let cutoff = (q.lastnzout * 2).min(values.len());
        for v in &mut values[cutoff..] {
            *v = 0.0;
        }
    }
    residual::apply(&mut values, &q.quantized, step, &q.residual_bits);
    values
}
