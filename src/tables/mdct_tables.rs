//! Twiddle tables for the FFT-based DCT-IV core (§ 4.2): pre/post rotation
//! factors indexed by a rate-dependent step, cached per transform length `M`
//! (half the MDCT block length `N = 2M`).

use num_complex::Complex64;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Mutex;

/// Pre/post twiddle factors `exp(-j*pi*(k + 1/8)/M)` for `k in 0..M`, shared
/// by both the pre-rotation before the length-`M` FFT and the post-rotation
/// after it (the standard split-radix DCT-IV-via-FFT construction).
pub fn dct_iv_twiddles(m: usize) -> Vec<Complex64> {
    twiddle_cache()
        .lock()
        .expect("twiddle cache poisoned")
        .entry(m)
        .or_insert_with(|| compute_twiddles(m))
        .clone()
}

fn twiddle_cache() -> &'static Mutex<HashMap<usize, Vec<Complex64>>> {
    static CACHE: OnceCell<Mutex<HashMap<usize, Vec<Complex64>>>> = OnceCell::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn compute_twiddles(m: usize) -> Vec<Complex64> {
    (0..m)
        .map(|k| {
            let theta = -std::f64::consts::PI * (k as f64 + 0.125) / m as f64;
            Complex64::new(theta.cos(), theta.sin())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twiddles_are_unit_magnitude() {
        for &t in &dct_iv_twiddles(40) {
            assert!((t.norm() - 1.0).abs() < 1e-9);
        }
    }
}
