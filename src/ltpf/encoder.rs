//! Encoder-side pitch refinement and hysteretic on/off decision (§ 4.5).

use super::{
    normalized_correlation, predicted_frame, LtpfParams, LtpfState, ACTIVATE_THRESHOLD,
    DEACTIVATE_THRESHOLD,
};

/// Pitch resolution (quarter- or half-sample) used for the fractional
/// search, per § 4.5's "scaled by a pitch-dependent resolution (4 or 2)":
/// longer pitches need less fractional precision relative to their period.
fn resolution_for_pitch(pitch: usize) -> usize {
    if pitch < 160 {
        4
    } else {
        2
    }
}

/// Encode one frame's LTPF side info.
///
/// `history` is the reconstructed signal preceding this frame (long enough
/// to cover the widest pitch search plus interpolation margin); `current`
/// is this frame's samples, length `frame_len`. `ol_pitch`/`ol_normcorr`
/// are the open-loop pitch estimate and its normalized correlation from
/// the upstream pitch-analysis stage (external per § 4.5's "given...from
/// the OLPA module").
pub fn analyze(
    history: &[f64],
    current: &[f64],
    ol_pitch: usize,
    ol_normcorr: f64,
    state: &mut LtpfState,
) -> LtpfParams {
    let frame_len = current.len();
    let history_len = history.len();

    if ol_normcorr <= ACTIVATE_THRESHOLD || ol_pitch == 0 || ol_pitch + 4 + frame_len > history_len {
        state.push_correlation(0.0);
        let was_active = state.active;
        state.active = decide_active(state, 0.0, was_active);
        return if state.active {
            LtpfParams { pitch_index: encode_pitch_index(state.pitch, state.frac, state.resolution), active: true, gain_scale_idx: state.gain_scale_idx }
        } else {
            LtpfParams::INACTIVE
        };
    }

    // Refine the integer pitch by searching +-4 samples around the
    // open-loop estimate (§ 4.5).
    let search_center = history_len as isize - ol_pitch as isize;
    let mut best_pitch = ol_pitch;
    let mut best_corr = f64::MIN;
    for delta in -4..=4 {
        let candidate_pitch = (ol_pitch as isize - delta) as usize;
        let center = search_center + delta;
        if center < 0 || center as usize + frame_len > history_len {
            continue;
        }
        let candidate = &history[center as usize..center as usize + frame_len];
        let corr = normalized_correlation(current, candidate);
        if corr > best_corr {
            best_corr = corr;
            best_pitch = candidate_pitch;
        }
    }

    // Fractional refinement around the best integer pitch.
    let resolution = resolution_for_pitch(best_pitch);
    let center = history_len as isize - best_pitch as isize;
    let mut best_frac = 0i32;
    let mut best_frac_corr = best_corr;
    for frac in -3..=3 {
        if frac == 0 {
            continue;
        }
        let predicted = predicted_frame(history, center, frame_len, frac, resolution);
        let corr = normalized_correlation(current, &predicted);
        if corr > best_frac_corr {
            best_frac_corr = corr;
            best_frac = frac;
        }
    }

    state.push_correlation(best_frac_corr);
    let was_active = state.active;
    let want_active = decide_active(state, best_frac_corr, was_active);

    if !want_active {
        state.active = false;
        return LtpfParams::INACTIVE;
    }

    let gain_scale_idx = gain_index_from_correlation(best_frac_corr);

    state.active = true;
    state.pitch = best_pitch;
    state.frac = best_frac;
    state.resolution = resolution;
    state.gain_scale_idx = gain_scale_idx;

    LtpfParams { pitch_index: encode_pitch_index(best_pitch, best_frac, resolution), active: true, gain_scale_idx }
}

fn decide_active(state: &LtpfState, current_corr: f64, was_active: bool) -> bool {
    let history_avg = state.average_correlation();
    if was_active {
        current_corr > DEACTIVATE_THRESHOLD || history_avg > DEACTIVATE_THRESHOLD
    } else {
        current_corr > ACTIVATE_THRESHOLD
    }
}

fn gain_index_from_correlation(corr: f64) -> u8 {
    ((corr.clamp(0.0, 1.0) * 7.0).round()) as u8
}

/// Pack integer pitch, fractional offset, and resolution into the 9-bit
/// (plus activity bits, handled by the caller) transmitted pitch index, via
/// the piecewise mapping § 4.5 describes: quarter-resolution pitches occupy
/// the low range of the index space, half-resolution pitches the high
/// range.
pub fn encode_pitch_index(pitch: usize, frac: i32, resolution: usize) -> u16 {
    let frac_unsigned = (frac + 3).clamp(0, 6) as u16;
    if resolution == 4 {
        (pitch as u16) * 7 + frac_unsigned
    } else {
        let half_frac = (frac_unsigned / 2).min(3);
        PITCH_INDEX_HALF_BASE + (pitch as u16) * 4 + half_frac
    }
}

pub(crate) const PITCH_INDEX_HALF_BASE: u16 = 160 * 7;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltpf::LtpfState;

    fn make_periodic_history(period: usize, len: usize) -> Vec<f64> {
        (0..len).map(|i| (2.0 * std::f64::consts::PI * (i % period) as f64 / period as f64).sin()).collect()
    }

    #[test]
    fn strongly_periodic_signal_activates_filter() {
        let period = 50;
        let signal = make_periodic_history(period, 400);
        let history = &signal[..300];
        let current = &signal[300..380];
        let mut state = LtpfState::new();
        let params = analyze(history, current, period, 0.9, &mut state);
        assert!(params.active);
    }

    #[test]
    fn low_correlation_keeps_filter_inactive() {
        let history = vec![0.0f64; 300];
        let current = vec![0.0f64; 80];
        let mut state = LtpfState::new();
        let params = analyze(&history, &current, 50, 0.9, &mut state);
        assert!(!params.active);
    }

    #[test]
    fn pitch_index_round_trips_through_decode() {
        let idx = encode_pitch_index(120, 1, 4);
        let (pitch, frac, resolution) = crate::ltpf::decoder::decode_pitch_index(idx);
        assert_eq!(pitch, 120);
        assert_eq!(frac, 1);
        assert_eq!(resolution, 4);
    }
}
