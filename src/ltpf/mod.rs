//! LTPF — Long-Term Postfilter (§ 4.5).
//!
//! A harmonic postfilter applied to the reconstructed time-domain signal:
//! the encoder searches for a pitch period and decides whether applying a
//! pitch predictor would sharpen the spectrum, the decoder runs that
//! predictor as an FIR-numerator / tilt-FIR-denominator synthesis filter
//! with one of five fade regimes depending on how the on/off state and
//! pitch changed since the previous frame. Grounded on
//! `perception/pitch_tracker.rs`'s open-loop search (three-range maximum
//! search, normalized correlation) generalized from its fixed 8 kHz/240
//! sample ITU-T window to an arbitrary sampling-rate buffer, and on
//! `perception/weighting_filter.rs`'s FIR-over-history idiom for the
//! synthesis-side tilt filter.

pub mod decoder;
pub mod encoder;

use std::collections::VecDeque;

/// Number of taps either side of center in the fractional-delay
/// interpolation filter (9-tap total, § 4.5).
const INTERP_HALF_TAPS: isize = 4;

/// Depth of the correlation history the hysteresis decision consults.
const CORR_HISTORY_LEN: usize = 4;

/// Correlation value above which the encoder considers enabling the
/// postfilter at all.
const ACTIVATE_THRESHOLD: f64 = 0.6;
/// Correlation value below which an already-active filter is turned off.
const DEACTIVATE_THRESHOLD: f64 = 0.4;
/// Maximum integer-pitch jump between frames still considered "the same
/// pitch" for the continuous-filter transition regime.
const PITCH_STABILITY_TOLERANCE: i32 = 4;

/// Side info the encoder emits and the decoder consumes (§ 4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LtpfParams {
    pub pitch_index: u16,
    pub active: bool,
    pub gain_scale_idx: u8,
}

impl LtpfParams {
    pub const INACTIVE: LtpfParams = LtpfParams { pitch_index: 0, active: false, gain_scale_idx: 0 };
}

/// Persistent encoder/decoder state carried frame to frame: previous
/// decision, previous pitch (for the stability check), and a short
/// correlation history for the hysteresis decision (§ 4.5's "(d)
/// correlation history").
#[derive(Debug, Clone)]
pub struct LtpfState {
    pub active: bool,
    pub pitch: usize,
    pub frac: i32,
    pub resolution: usize,
    pub gain_scale_idx: u8,
    corr_history: VecDeque<f64>,
}

impl LtpfState {
    pub fn new() -> Self {
        Self {
            active: false,
            pitch: 0,
            frac: 0,
            resolution: 4,
            gain_scale_idx: 0,
            corr_history: VecDeque::with_capacity(CORR_HISTORY_LEN),
        }
    }

    fn push_correlation(&mut self, corr: f64) {
        if self.corr_history.len() == CORR_HISTORY_LEN {
            self.corr_history.pop_front();
        }
        self.corr_history.push_back(corr);
    }

    fn average_correlation(&self) -> f64 {
        if self.corr_history.is_empty() {
            return 0.0;
        }
        self.corr_history.iter().sum::<f64>() / self.corr_history.len() as f64
    }
}

impl Default for LtpfState {
    fn default() -> Self {
        Self::new()
    }
}

/// The five frame-to-frame transition regimes (§ 4.5's table), resolved
/// once per frame from the previous/current active flags and pitch
/// stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRegime {
    StayOff,
    FadeIn,
    FadeOut,
    Continuous,
    CrossFade,
}

pub fn resolve_transition(prev_active: bool, prev_pitch: usize, current_active: bool, current_pitch: usize) -> TransitionRegime {
    match (prev_active, current_active) {
        (false, false) => TransitionRegime::StayOff,
        (false, true) => TransitionRegime::FadeIn,
        (true, false) => TransitionRegime::FadeOut,
        (true, true) => {
            if (prev_pitch as i32 - current_pitch as i32).abs() <= PITCH_STABILITY_TOLERANCE {
                TransitionRegime::Continuous
            } else {
                TransitionRegime::CrossFade
            }
        }
    }
}

/// Normalized cross-correlation between two equal-length windows,
/// `<a,b> / sqrt(<a,a>*<b,b>)`, the building block both the open-loop
/// refinement and the activation decision consult.
pub fn normalized_correlation(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f64 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let ea: f64 = a.iter().map(|&x| x * x).sum();
    let eb: f64 = b.iter().map(|&x| x * x).sum();
    let denom = (ea * eb).sqrt();
    if denom <= 1e-9 {
        0.0
    } else {
        dot / denom
    }
}

/// The 9-tap windowed-sinc fractional-delay interpolation filter evaluated
/// at sub-sample offset `frac/resolution`, cached per `(resolution, frac)`
/// since both are drawn from a small fixed set (§ 4.5: resolution 4 or 2,
/// offsets in `{-3..3}`).
pub fn interp_taps(frac: i32, resolution: usize) -> [f64; 9] {
    let offset = frac as f64 / resolution as f64;
    let mut taps = [0.0f64; 9];
    for (i, tap) in taps.iter_mut().enumerate() {
        let n = i as isize - INTERP_HALF_TAPS;
        let x = n as f64 - offset;
        let sinc = if x.abs() < 1e-9 { 1.0 } else { (std::f64::consts::PI * x).sin() / (std::f64::consts::PI * x) };
        let window = 0.54 + 0.46 * (std::f64::consts::PI * x / (INTERP_HALF_TAPS as f64 + 1.0)).cos();
        *tap = sinc * window;
    }
    taps
}

/// Apply the 9-tap interpolation filter centered at integer position
/// `center` in `buffer`, producing one fractionally-delayed sample.
/// `center - 4` and `center + 4` must both be valid indices into `buffer`.
pub fn interpolate_sample(buffer: &[f64], center: isize, frac: i32, resolution: usize) -> f64 {
    let taps = interp_taps(frac, resolution);
    let mut acc = 0.0;
    for (i, &tap) in taps.iter().enumerate() {
        let idx = center + i as isize - INTERP_HALF_TAPS;
        if idx >= 0 && (idx as usize) < buffer.len() {
            acc += tap * buffer[idx as usize];
        }
    }
    acc
}

/// Build a fractionally-delayed copy of `frame_len` samples starting at
/// `center` in `buffer`, used both to form the refined open-loop
/// correlation target and the decoder's predicted frame.
pub fn predicted_frame(buffer: &[f64], center: isize, frame_len: usize, frac: i32, resolution: usize) -> Vec<f64> {
    (0..frame_len).map(|i| interpolate_sample(buffer, center + i as isize, frac, resolution)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_correlation_of_identical_signals_is_one() {
        let a = [1.0, 2.0, -1.0, 0.5];
        assert!((normalized_correlation(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalized_correlation_of_silence_is_zero() {
        let a = [0.0, 0.0, 0.0];
        let b = [0.0, 0.0, 0.0];
        assert_eq!(normalized_correlation(&a, &b), 0.0);
    }

    #[test]
    fn interp_taps_at_zero_offset_is_near_identity() {
        let taps = interp_taps(0, 4);
        assert!((taps[4] - 1.0).abs() < 1e-6);
        for (i, &t) in taps.iter().enumerate() {
            if i != 4 {
                assert!(t.abs() < 1e-6, "tap {i} = {t}");
            }
        }
    }

    #[test]
    fn transition_regimes_match_table() {
        assert_eq!(resolve_transition(false, 0, false, 0), TransitionRegime::StayOff);
        assert_eq!(resolve_transition(false, 0, true, 50), TransitionRegime::FadeIn);
        assert_eq!(resolve_transition(true, 50, false, 0), TransitionRegime::FadeOut);
        assert_eq!(resolve_transition(true, 50, true, 51), TransitionRegime::Continuous);
        assert_eq!(resolve_transition(true, 50, true, 90), TransitionRegime::CrossFade);
    }
}
