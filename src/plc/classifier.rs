//! Partial-concealment classifier (§ 4.7): decides whether a `bfi==2`
//! frame is actually usable, or should be escalated to a full loss.

/// Inputs the classifier needs to reach its escalate/keep decision.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInputs {
    pub prev_bfi: u8,
    pub stability_factor: f64,
    pub pitch_present: bool,
    /// Whether the pitch-present path detected a low-frequency peak
    /// misaligned with the bitstream-signalled spectral-inversion index.
    pub peak_misaligned: bool,
    /// Fraction (0..1) of total residual energy that lies below
    /// `spec_inv_idx`, consulted on the non-pitch path.
    pub sub_inversion_energy_ratio: f64,
}

const STABILITY_THRESHOLD: f64 = 0.5;
const RESIDUAL_ENERGY_THRESHOLD: f64 = 0.30;

/// Returns `true` when the frame should be escalated (`bfi <- 1`, full
/// loss), `false` when the partial-concealment payload may be used as-is.
pub fn classify(inputs: ClassifierInputs) -> bool {
    if inputs.prev_bfi == 1 {
        return true;
    }
    if inputs.stability_factor < STABILITY_THRESHOLD {
        return true;
    }
    if inputs.pitch_present {
        if inputs.peak_misaligned {
            return true;
        }
    } else if inputs.sub_inversion_energy_ratio < RESIDUAL_ENERGY_THRESHOLD {
        return true;
    }
    false
}
