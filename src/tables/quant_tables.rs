//! Quantization-adjacent lookup tables: the global-gain log scale (§ 4.6),
//! TNS reflection-coefficient quantization levels (§ 4.4), and the
//! context-indexed arithmetic bit-count table the spectral coder's
//! bit-counting pass consults (§ 4.6).

/// `InvLog2(x) = 2^x`, tabulated at 1/128 resolution for the fractional part
/// and reconstructed via an integer power-of-two shift for the integral
/// part. Used to turn the 7-bit global gain index into a linear gain:
/// `gain = InvLog2(idx * step)`.
pub fn inv_log2(x: f64) -> f64 {
    let integral = x.floor();
    let frac = x - integral;
    let table_idx = (frac * 128.0).round().clamp(0.0, 128.0) as usize;
    let frac_value = inv_log2_frac_table()[table_idx];
    frac_value * 2f64.powi(integral as i32)
}

fn inv_log2_frac_table() -> &'static [f64; 129] {
    use once_cell::sync::OnceCell;
    static TABLE: OnceCell<[f64; 129]> = OnceCell::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0; 129];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = 2f64.powf(i as f64 / 128.0);
        }
        table
    })
}

/// TNS reflection-coefficient reconstruction points over
/// `2*TNS_COEF_RES + 1` levels (§ 4.4), `TNS_COEF_RES = 8`: a non-uniform
/// quantizer denser near zero (no-op coefficient) than near +-1.
pub const TNS_COEF_RES: usize = 8;

pub fn tns_reconstruction_points() -> Vec<f64> {
    let levels = 2 * TNS_COEF_RES + 1;
    let center = TNS_COEF_RES as i32;
    (0..levels)
        .map(|i| {
            let signed = i as i32 - center;
            let frac = signed as f64 / center as f64;
            frac.signum() * frac.abs().powf(1.5)
        })
        .collect()
}

/// The index of the "no-op" (zero reflection coefficient) reconstruction
/// level, used both to bypass a TNS region and to detect+trim trailing
/// no-op coefficients when shortening the transmitted filter order.
pub const TNS_INDEX_SHIFT: usize = TNS_COEF_RES;

/// 4-bit arithmetic-coding context bit-cost table (§ 4.6): `bits[c][sym]` is
/// the number of bits the spectral coefficient coder spends encoding
/// 2-tuple symbol `sym` under context `c`. A real range coder derives these
/// from adaptive cumulative-frequency tables; here they are modeled as a
/// fixed cost function of `(context, symbol magnitude)` that increases with
/// both — enough to drive the bit-counting/truncation logic in § 4.6
/// without requiring the external byte-level range coder this core treats
/// as out of scope (§ 1).
pub fn context_bit_cost(context: u8, symbol: u8) -> u32 {
    let base = 2 + (symbol as u32 * 3) / 2;
    let context_penalty = match context {
        0 => 0,
        1..=3 => 1,
        4..=7 => 2,
        _ => 3,
    };
    base + context_penalty
}

/// Fixed per-escape-layer bit cost for coefficient magnitudes above the
/// context table's direct range (§ 4.6).
pub const ESCAPE_BIT_COST: u32 = 4;

/// Threshold above which a magnitude within a 2-tuple requires an escape
/// layer.
pub const ESCAPE_THRESHOLD: i32 = 3;

/// `A_THRES`: LSB-mode threshold (§ 4.6) above which a coefficient's least
/// significant bit is carried on the side stream instead of through the
/// context coder.
pub const A_THRES: i32 = 8;
