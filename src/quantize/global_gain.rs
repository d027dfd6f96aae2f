//! Global gain (§ 4.6): a 7-bit index selecting a linear gain on a log
//! scale via the shared `InvLog2` table also used by TNS/SNS-adjacent
//! lookups.

use crate::tables::quant_tables::inv_log2;

/// Index range: 7 bits, `0..=127`.
pub const MAX_GAIN_INDEX: u8 = 127;

/// Log-domain step between adjacent gain indices. Chosen so the full
/// 128-entry index range spans roughly 96 dB, the dynamic range this
/// core's `i16`/`i32` mantissa widths can represent without the gain
/// stage itself becoming the bottleneck.
const GAIN_STEP: f64 = 0.25;

/// Reconstruct the linear gain for a transmitted global gain index
/// (§ 4.6: `InvLog2(idx * k)`).
pub fn gain_from_index(index: u8) -> f64 {
    inv_log2(index as f64 * GAIN_STEP)
}

/// Choose the gain index whose reconstructed gain best approximates
/// `target_gain` (the encoder-side inverse of [`gain_from_index`]), used
/// to pick a starting point for the bit-budget search in
/// [`crate::quantize::context_coder`].
pub fn index_from_gain(target_gain: f64) -> u8 {
    if target_gain <= 0.0 {
        return 0;
    }
    let log2_gain = target_gain.log2();
    (log2_gain / GAIN_STEP).round().clamp(0.0, MAX_GAIN_INDEX as f64) as u8
}
