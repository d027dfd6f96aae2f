//! PVQ — Pyramid Vector Quantization (§ 4.3).
//!
//! Two independent pieces: [`search`], the greedy one-pulse-at-a-time
//! encoder search that finds a good integer pulse vector for a target
//! direction, and [`vec2mpvq`]/[`mpvq2vec`], the bijective enumeration
//! between a pulse vector and (leading sign, index) pair that the
//! bitstream actually carries.
//!
//! The enumeration walks positions left to right, at each position
//! counting off every magnitude/sign combination that sorts before the
//! actual one using [`pyramid_count`] (§ 4.3's `A(n,k)` table) — a
//! factorial-number-system construction. Traversal direction (left-to-right
//! here, versus right-to-left) is a free choice as long as encode and
//! decode agree, and is documented explicitly for that reason.

use crate::tables::pvq_tables::pyramid_count;

#[derive(Debug, Clone, Copy)]
pub struct PvqParams {
    pub n: usize,
    pub k: usize,
}

/// Greedy one-pulse-at-a-time PVQ search (§ 4.3): seed from the
/// pre-projection `round(K*x/sum|x|)`, then repeatedly add the single pulse
/// that most increases `<x,y>^2/<y,y>` until `sum|y_i| == K`.
///
/// Returns the unsigned-magnitude pulse vector `y` (as `i32`, magnitudes
/// only meaningful up to `K`) together with its signs already applied, plus
/// a boolean for whether any sign flip occurred (kept for callers that want
/// to report it, though the signs are folded into `y` directly).
pub fn search(target: &[f64], params: &PvqParams) -> (Vec<i32>, bool) {
    let n = params.n;
    let k = params.k as i32;
    debug_assert_eq!(target.len(), n);

    if k == 0 || n == 0 {
        return (vec![0; n], false);
    }

    let sum_abs: f64 = target.iter().map(|v| v.abs()).sum::<f64>().max(1e-9);
    let mut y: Vec<i32> = target
        .iter()
        .map(|&v| (params.k as f64 * v / sum_abs).round() as i32)
        .collect();

    let mut used: i32 = y.iter().map(|v| v.abs()).sum();
    // Correct rounding drift from the pre-projection so exactly K pulses
    // remain to distribute, biasing toward/away from the largest-magnitude
    // target components first.
    while used != k {
        if used < k {
            let (idx, _) = target
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap())
                .unwrap();
            y[idx] += if target[idx] >= 0.0 { 1 } else { -1 };
            used += 1;
        } else {
            let (idx, _) = y
                .iter()
                .enumerate()
                .filter(|(_, &v)| v != 0)
                .max_by_key(|(_, &v)| v.abs())
                .unwrap();
            y[idx] -= y[idx].signum();
            used -= 1;
        }
    }

    // Greedy refinement: incrementally move single pulses between positions
    // when doing so improves the normalized correlation, matching § 4.3's
    // "one-pulse-at-a-time greedy augmentation with incremental
    // energy/correlation update".
    let correlation = |y: &[i32]| -> f64 {
        let dot: f64 = y.iter().zip(target.iter()).map(|(&yi, &xi)| yi as f64 * xi).sum();
        let energy: f64 = y.iter().map(|&yi| (yi * yi) as f64).sum::<f64>().max(1e-9);
        (dot * dot) / energy
    };

    let mut best_score = correlation(&y);
    let mut improved = true;
    let mut iterations = 0;
    while improved && iterations < n * 4 {
        improved = false;
        iterations += 1;
        for from in 0..n {
            if y[from] == 0 {
                continue;
            }
            for to in 0..n {
                if to == from {
                    continue;
                }
                let mut candidate = y.clone();
                candidate[from] -= candidate[from].signum();
                candidate[to] += if target[to] >= 0.0 { 1 } else { -1 };
                let score = correlation(&candidate);
                if score > best_score + 1e-12 {
                    y = candidate;
                    best_score = score;
                    improved = true;
                }
            }
        }
    }

    (y, true)
}

/// Encode a pulse vector into (leading sign, index) per § 4.3: walk
/// positions left to right, at each position counting off combinations
/// that sort before the actual `(magnitude, sign)` pair using
/// [`pyramid_count`] over the remaining positions and budget.
pub fn vec2mpvq(y: &[i32], params: &PvqParams) -> (bool, u32) {
    let mut index: u64 = 0;
    let mut k_rem = params.k;
    let mut leading_sign = false;
    let mut seen_nonzero = false;

    for (i, &yi) in y.iter().enumerate() {
        let remaining = params.n - i - 1;
        let ai = yi.unsigned_abs() as usize;
        for a in 0..ai {
            let ways = if a == 0 { 1 } else { 2 };
            index += ways as u64 * pyramid_count(remaining, k_rem - a);
        }
        if ai > 0 {
            if yi < 0 {
                index += pyramid_count(remaining, k_rem - ai);
            }
            if !seen_nonzero {
                leading_sign = yi < 0;
                seen_nonzero = true;
            }
        }
        k_rem -= ai;
    }

    (leading_sign, index as u32)
}

/// Inverse of [`vec2mpvq`]: reconstruct the pulse vector from (leading
/// sign, index). Per § 7, a caller that finds `index >= enumeration size`
/// should treat it as a BER condition and substitute a zero vector rather
/// than calling this function.
pub fn mpvq2vec(leading_sign: bool, index: u32, params: &PvqParams) -> Vec<i32> {
    let n = params.n;
    let mut k_rem = params.k;
    let mut idx = index as u64;
    let mut y = vec![0i32; n];
    let mut seen_nonzero = false;

    for i in 0..n {
        let remaining = n - i - 1;
        let mut a = 0usize;
        let mut magnitude_index = idx;
        loop {
            let ways = if a == 0 { 1 } else { 2 };
            let count = ways as u64 * pyramid_count(remaining, k_rem.saturating_sub(a));
            if a <= k_rem && magnitude_index < count {
                break;
            }
            if a <= k_rem {
                magnitude_index -= count;
            }
            a += 1;
            if a > k_rem {
                a = k_rem;
                magnitude_index = 0;
                break;
            }
        }
        idx = magnitude_index;

        if a == 0 {
            y[i] = 0;
        } else {
            let positive_count = pyramid_count(remaining, k_rem - a);
            let is_negative = if !seen_nonzero {
                seen_nonzero = true;
                leading_sign
            } else {
                idx >= positive_count
            };
            if is_negative && idx >= positive_count {
                idx -= positive_count;
            }
            y[i] = if is_negative { -(a as i32) } else { a as i32 };
        }
        k_rem -= a;
    }

    y
}

/// Total enumeration size for `(n, k)`: `A(n,k)` from § 4.3.
pub fn enumeration_size(params: &PvqParams) -> u32 {
    pyramid_count(params.n, params.k).min(u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_vectors(n: usize, k: usize) -> Vec<Vec<i32>> {
        // Brute-force enumerate every length-n vector with sum|v_i| == k,
        // for small (n,k) only — used to cross-check the bijection.
        fn recurse(n: usize, k: i32, prefix: &mut Vec<i32>, out: &mut Vec<Vec<i32>>) {
            if n == 0 {
                if k == 0 {
                    out.push(prefix.clone());
                }
                return;
            }
            for mag in 0..=k {
                if mag == 0 {
                    prefix.push(0);
                    recurse(n - 1, k - mag, prefix, out);
                    prefix.pop();
                } else {
                    for sign in [1, -1] {
                        prefix.push(mag * sign);
                        recurse(n - 1, k - mag, prefix, out);
                        prefix.pop();
                    }
                }
            }
        }
        let mut out = Vec::new();
        recurse(n, k as i32, &mut Vec::new(), &mut out);
        out
    }

    #[test]
    fn bijection_round_trip_small() {
        for &(n, k) in &[(3usize, 2usize), (4, 3), (2, 4)] {
            let params = PvqParams { n, k };
            for v in all_vectors(n, k) {
                let (sign, index) = vec2mpvq(&v, &params);
                let decoded = mpvq2vec(sign, index, &params);
                assert_eq!(decoded, v, "round trip failed for {:?} (n={n},k={k})", v);
            }
        }
    }

    #[test]
    fn bijection_indices_are_dense_and_unique() {
        let params = PvqParams { n: 3, k: 3 };
        let vectors = all_vectors(3, 3);
        let size = enumeration_size(&params) as usize;
        assert_eq!(vectors.len(), size);
        let mut seen = vec![false; size];
        for v in &vectors {
            let (_, index) = vec2mpvq(v, &params);
            assert!(!seen[index as usize], "duplicate index {index}");
            seen[index as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn search_uses_exactly_k_pulses() {
        let target = [0.6, -0.3, 0.1, 0.9, -0.2];
        let params = PvqParams { n: 5, k: 6 };
        let (y, _) = search(&target, &params);
        let used: i32 = y.iter().map(|v| v.abs()).sum();
        assert_eq!(used, 6);
    }

    #[test]
    fn search_correlates_with_target_sign() {
        let target = [1.0, -1.0, 0.0, 0.0];
        let params = PvqParams { n: 4, k: 2 };
        let (y, _) = search(&target, &params);
        assert!(y[0] > 0);
        assert!(y[1] < 0);
    }
}
