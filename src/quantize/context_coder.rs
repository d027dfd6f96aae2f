//! Arithmetic-context bit counting for the quantized spectrum (§ 4.6).
//!
//! This core treats the actual byte-level range coder as external (§ 1);
//! what lives here is the bit-counting pass that decides, per 2-tuple of
//! quantized coefficients, which context table entry would be consulted
//! and how many bits it would cost — the information the rate-control
//! loop and tail-truncation decision need regardless of which concrete
//! entropy coder ultimately packs the bits.

use crate::tables::quant_tables::{context_bit_cost, ESCAPE_BIT_COST, ESCAPE_THRESHOLD, A_THRES};

/// Coding mode (§ 4.6): `Count` never truncates the tail (mode `< 0`),
/// `Truncate` tracks the last 2-tuple whose cumulative cost still fits a
/// budget (mode `0`), `LsbSplit` additionally pulls large coefficients'
/// LSBs onto a side stream (mode `> 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingMode {
    Count,
    Truncate,
    LsbSplit,
}

/// Result of one bit-counting pass over a quantized spectrum.
#[derive(Debug, Clone)]
pub struct CountResult {
    pub total_bits: u32,
    /// Index one past the last nonzero 2-tuple actually present.
    pub lastnz: usize,
    /// Index one past the last 2-tuple whose cumulative cost still fits
    /// the budget (meaningful for `Truncate`/`LsbSplit`; equals `lastnz`
    /// for `Count`).
    pub lastnzout: usize,
    /// LSB side-stream bits, populated only under `LsbSplit`.
    pub lsb_bits: Vec<u8>,
}

fn half_flag(pair_index: usize, num_pairs: usize) -> bool {
    pair_index * 2 >= num_pairs
}

fn magnitude_class(mag: i32) -> u8 {
    mag.unsigned_abs().min(3) as u8
}

/// Count the arithmetic-context bit cost of encoding `quantized` (integer
/// coefficient magnitudes with sign folded in) under `mode`, stopping tail
/// accounting once `target_bits` is exceeded when `mode` permits
/// truncation.
pub fn count_bits(quantized: &[i32], mode: CodingMode, target_bits: u32) -> CountResult {
    let num_pairs = quantized.len() / 2;
    let mut total_bits = 0u32;
    let mut context: u8 = 0;
    let mut lastnz = 0usize;
    let mut lastnzout = 0usize;
    let mut lsb_bits = Vec::new();
    let mut budget_exceeded = false;

    for pair in 0..num_pairs {
        let a = quantized[2 * pair];
        let b = quantized[2 * pair + 1];
        let nonzero = a != 0 || b != 0;
        if nonzero {
            lastnz = pair + 1;
        }

        let mut mag_a = a.unsigned_abs() as i32;
        let mut mag_b = b.unsigned_abs() as i32;
        let mut pair_cost = 0u32;

        for mag in [&mut mag_a, &mut mag_b] {
            if mode == CodingMode::LsbSplit && *mag >= A_THRES {
                lsb_bits.push((*mag & 1) as u8);
                *mag >>= 1;
            }
            let mut symbol = magnitude_class(*mag);
            let mut escapes = 0u32;
            while *mag > ESCAPE_THRESHOLD && escapes < 8 {
                *mag >>= 1;
                symbol = magnitude_class(*mag);
                escapes += 1;
            }
            pair_cost += context_bit_cost(context, symbol) + escapes * ESCAPE_BIT_COST;
        }

        total_bits += pair_cost;

        if mode != CodingMode::Count && !budget_exceeded {
            if total_bits <= target_bits {
                lastnzout = pair + 1;
            } else {
                budget_exceeded = true;
            }
        }

        let half = half_flag(pair, num_pairs);
        let activity = if nonzero { 1u8 } else { 0u8 };
        let magnitude_bits = magnitude_class(mag_a.max(mag_b));
        context = activity | (magnitude_bits << 1) | ((half as u8) << 3);
    }

    if mode == CodingMode::Count {
        lastnzout = lastnz;
    }

    CountResult { total_bits, lastnz, lastnzout, lsb_bits }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_spectrum_costs_minimal_bits_and_no_lastnz() {
        let quantized = vec![0i32; 16];
        let result = count_bits(&quantized, CodingMode::Count, 0);
        assert_eq!(result.lastnz, 0);
        assert!(result.total_bits > 0); // each pair still costs the zero-symbol context price
    }

    #[test]
    fn truncation_stops_lastnzout_before_lastnz_under_tight_budget() {
        let mut quantized = vec![0i32; 40];
        for (i, v) in quantized.iter_mut().enumerate() {
            *v = (i as i32 % 5) - 2;
        }
        let full = count_bits(&quantized, CodingMode::Count, 0);
        let truncated = count_bits(&quantized, CodingMode::Truncate, full.total_bits / 4);
        assert!(truncated.lastnzout <= full.lastnz);
        assert_eq!(truncated.total_bits, full.total_bits);
    }

    #[test]
    fn lsb_split_emits_side_bits_for_large_magnitudes() {
        let quantized = vec![20, -15, 0, 0];
        let result = count_bits(&quantized, CodingMode::LsbSplit, 1000);
        assert!(!result.lsb_bits.is_empty());
    }
}
