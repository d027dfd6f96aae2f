//! Method 3 — time-domain LPC concealment (§ 4.7): derive an LPC synthesis
//! filter from the last good spectrum's band energies, then excite it with
//! a damped mix of periodic (pitch-delayed) and random excitation on every
//! lost frame, regenerating overlap memory via TDAC. Grounded on the same
//! Levinson-Durbin recursion [`crate::tns::analyze`] uses internally,
//! applied here to a full-band energy envelope rather than per-TNS-region
//! spectral sub-ranges.

use crate::quantize::noise_fill::lcg_next;

/// LPC filter derived once on first loss and reused (with damping) across
/// a burst, mirroring the "on first loss: ... on every loss: ..." split of
/// § 4.7.
#[derive(Debug, Clone)]
pub struct LpcFilter {
    pub coefficients: Vec<f64>,
}

/// Inverse-ODFT the last good spectrum's per-band log energies into an
/// autocorrelation sequence, lag-window it lightly, and run Levinson-
/// Durbin to the requested order, producing direct-form LPC coefficients
/// (as opposed to TNS's reflection-coefficient output, since the
/// time-domain synthesis filter here is run in direct form).
pub fn derive_filter(band_energies: &[f64], order: usize) -> LpcFilter {
    let n = band_energies.len().max(1);
    let mut r = vec![0.0f64; order + 1];
    for lag in 0..=order {
        let mut acc = 0.0;
        for k in 0..n {
            let angle = 2.0 * std::f64::consts::PI * k as f64 * lag as f64 / n as f64;
            acc += band_energies[k] * angle.cos();
        }
        r[lag] = acc / n as f64;
    }
    // Light lag window to stabilize the recursion.
    for (lag, v) in r.iter_mut().enumerate() {
        let w = (-0.5 * (lag as f64 / (order as f64 + 1.0)).powi(2)).exp();
        *v *= w;
    }

    let mut a = vec![0.0f64; order + 1];
    a[0] = 1.0;
    let mut error = r[0].max(1e-9);
    for i in 1..=order {
        let mut acc = r[i];
        for j in 1..i {
            acc += a[j] * r[i - j];
        }
        let k = -acc / error;
        let mut updated = a.clone();
        for j in 1..i {
            updated[j] = a[j] + k * a[i - j];
        }
        updated[i] = k;
        a = updated;
        error *= (1.0 - k * k).max(1e-6);
    }

    LpcFilter { coefficients: a }
}

/// Synthesis state carried across a burst: the filter's memory and the
/// adaptive periodic/noise gain mix.
#[derive(Debug, Clone)]
pub struct TdcState {
    pub filter: LpcFilter,
    pub memory: Vec<f64>,
    pub pitch_lag: usize,
    pub excitation_history: Vec<f64>,
    pub cum_damp: f64,
}

impl TdcState {
    pub fn new(filter: LpcFilter, pitch_lag: usize) -> Self {
        let order = filter.coefficients.len().saturating_sub(1);
        Self {
            filter,
            memory: vec![0.0; order],
            pitch_lag: pitch_lag.max(1),
            excitation_history: vec![0.0; pitch_lag.max(1)],
            cum_damp: 1.0,
        }
    }
}

/// Conceal `frame_len` samples via LPC synthesis excited by a damped mix
/// of periodic and random excitation (§ 4.7). `gain_p` weights the
/// pitch-lag-delayed excitation history, `gain_c` the random component;
/// `damp` is this frame's cumulative damping factor, multiplied into
/// `state.cum_damp` and applied to both excitation sources.
pub fn conceal(state: &mut TdcState, frame_len: usize, gain_p: f64, gain_c: f64, damp: f64, seed: &mut u16) -> Vec<f64> {
    state.cum_damp *= damp;
    let order = state.filter.coefficients.len() - 1;
    let mut out = Vec::with_capacity(frame_len);

    for _ in 0..frame_len {
        let periodic_idx = state.excitation_history.len().saturating_sub(state.pitch_lag);
        let periodic = *state.excitation_history.get(periodic_idx).unwrap_or(&0.0);
        let noise = if lcg_next(seed) { 1.0 } else { -1.0 };
        let excitation = state.cum_damp * (gain_p * periodic + gain_c * noise);

        let mut prediction = 0.0;
        for j in 1..=order {
            let mem_idx = state.memory.len().wrapping_sub(j);
            if mem_idx < state.memory.len() {
                prediction -= state.filter.coefficients[j] * state.memory[mem_idx];
            }
        }

        let sample = excitation + prediction;
        out.push(sample);

        state.memory.remove(0);
        state.memory.push(sample);
        state.excitation_history.remove(0);
        state.excitation_history.push(excitation);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_filter_produces_stable_order() {
        let energies = vec![1.0, 0.8, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1];
        let filter = derive_filter(&energies, 4);
        assert_eq!(filter.coefficients.len(), 5);
        assert_eq!(filter.coefficients[0], 1.0);
    }

    #[test]
    fn conceal_produces_requested_length_and_damps_over_time() {
        let energies = vec![1.0; 8];
        let filter = derive_filter(&energies, 4);
        let mut state = TdcState::new(filter, 20);
        let mut seed = 3u16;
        let frame1 = conceal(&mut state, 40, 0.5, 0.5, 0.9, &mut seed);
        let frame2 = conceal(&mut state, 40, 0.5, 0.5, 0.9, &mut seed);
        assert_eq!(frame1.len(), 40);
        let e1: f64 = frame1.iter().map(|v| v * v).sum();
        let e2: f64 = frame2.iter().map(|v| v * v).sum();
        assert!(e2 <= e1 * 1.5);
        assert!(state.cum_damp < 1.0);
    }
}
