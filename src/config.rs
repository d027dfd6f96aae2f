//! Codec configuration and the rate/duration-indexed constant tables that
//! hang off it.
//!
//! Per § 9's "Global-looking state" design note, all derived per-rate
//! constants are resolved once at [`CodecConfig::validate`] time and stored
//! on the instance, rather than recomputed every frame or looked up through
//! process-wide globals.

use crate::error::{CodecError, Result};

/// Sampling rate, indexed 0..5 as `fs_idx` throughout the codec (§ GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplingRate {
    Hz8000,
    Hz16000,
    Hz24000,
    Hz32000,
    Hz48000,
}

impl SamplingRate {
    /// The `fs_idx` used to index rate-dependent tables throughout the core.
    pub const fn fs_idx(self) -> usize {
        match self {
            Self::Hz8000 => 0,
            Self::Hz16000 => 1,
            Self::Hz24000 => 2,
            Self::Hz32000 => 3,
            Self::Hz48000 => 4,
        }
    }

    pub const fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz16000 => 16000,
            Self::Hz24000 => 24000,
            Self::Hz32000 => 32000,
            Self::Hz48000 => 48000,
        }
    }

    pub const ALL: [SamplingRate; 5] = [
        Self::Hz8000,
        Self::Hz16000,
        Self::Hz24000,
        Self::Hz32000,
        Self::Hz48000,
    ];
}

/// Frame duration in deci-milliseconds (`frame_dms`, § GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameDuration {
    Dms25,
    Dms50,
    Dms100,
}

impl FrameDuration {
    pub const fn dms(self) -> u16 {
        match self {
            Self::Dms25 => 25,
            Self::Dms50 => 50,
            Self::Dms100 => 100,
        }
    }

    /// Index into the 3-entry frame-duration axis of rate-dependent tables.
    pub const fn idx(self) -> usize {
        match self {
            Self::Dms25 => 0,
            Self::Dms50 => 1,
            Self::Dms100 => 2,
        }
    }
}

/// Concealment-method preference, where the host wants to pin the PLC
/// classifier to a specific strategy rather than let it choose (§ 4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcealmentMethod {
    Muted,
    PhaseEcu,
    TimeDomainLpc,
    NoiseSubstitution,
}

/// Frame-pipeline configuration (§ 6).
#[derive(Debug, Clone, Copy)]
pub struct CodecConfig {
    pub sampling_rate: SamplingRate,
    pub frame_duration: FrameDuration,
    pub target_bytes: u16,
    pub enable_lpc_weighting: bool,
    pub attack_handling: bool,
    pub concealment_method_preference: Option<ConcealmentMethod>,
}

impl CodecConfig {
    pub fn new(sampling_rate: SamplingRate, frame_duration: FrameDuration) -> Self {
        Self {
            sampling_rate,
            frame_duration,
            target_bytes: 80,
            enable_lpc_weighting: true,
            attack_handling: true,
            concealment_method_preference: None,
        }
    }

    /// Validate the `(sampling_rate, frame_duration)` pair and resolve the
    /// derived [`FrameGeometry`]. All 5x3 combinations are standardized for
    /// LC3, so validation currently only guards against configurations this
    /// core has not been sized for (`target_bytes` below the minimum the
    /// range coder needs to carry side info).
    pub fn validate(&self) -> Result<FrameGeometry> {
        let geometry = FrameGeometry::resolve(self.sampling_rate, self.frame_duration);
        if self.target_bytes < MIN_TARGET_BYTES {
            return Err(CodecError::UnsupportedConfiguration {
                sample_rate_hz: self.sampling_rate.hz(),
                frame_dms: self.frame_duration.dms(),
            });
        }
        Ok(geometry)
    }
}

/// Minimum payload size (bytes) this core supports; below this, side info
/// alone would not fit the target bit budget.
pub const MIN_TARGET_BYTES: u16 = 20;

/// Per-rate/duration derived geometry: frame length, MDCT block length, and
/// the bandwidth ceiling used to zero tail spectral bins (§ 4.2's `max_bw`).
#[derive(Debug, Clone, Copy)]
pub struct FrameGeometry {
    pub fs_idx: usize,
    pub frame_dms: u16,
    /// Number of PCM samples per frame at the configured native rate.
    pub frame_len: usize,
    /// MDCT/IMDCT block length `N` (§ 4.2): one of
    /// {20,30,40,60,80,120,160,240,320,480}.
    pub block_len: usize,
    /// `max_bw`: highest spectral bin index this configuration carries;
    /// bins beyond it are zeroed before the inverse transform.
    pub max_bw: usize,
    /// Number of SNS scale factors before interpolation to 64 bins (16 for
    /// 10 ms frames per § 4.3; fewer for shorter durations).
    pub num_bands: usize,
}

impl FrameGeometry {
    pub fn resolve(rate: SamplingRate, duration: FrameDuration) -> Self {
        // Table of block lengths N = fs * frame_duration, matching the
        // standardized set enumerated in § 4.2.
        const BLOCK_LEN: [[usize; 3]; 5] = [
            // 2.5ms  5ms   10ms
            [20, 40, 80],     // 8 kHz
            [40, 80, 160],    // 16 kHz
            [60, 120, 240],   // 24 kHz
            [80, 160, 320],   // 32 kHz
            [120, 240, 480],  // 48 kHz
        ];
        let fs_idx = rate.fs_idx();
        let dur_idx = duration.idx();
        let block_len = BLOCK_LEN[fs_idx][dur_idx];
        let num_bands = match duration {
            FrameDuration::Dms100 => 64,
            FrameDuration::Dms50 => 40,
            FrameDuration::Dms25 => 32,
        };
        Self {
            fs_idx,
            frame_dms: duration.dms(),
            frame_len: block_len,
            block_len,
            max_bw: block_len,
            num_bands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_standard_combinations() {
        for rate in SamplingRate::ALL {
            for duration in [FrameDuration::Dms25, FrameDuration::Dms50, FrameDuration::Dms100] {
                let cfg = CodecConfig::new(rate, duration);
                let geom = cfg.validate().expect("standardized combination must validate");
                assert_eq!(geom.frame_len, geom.block_len);
                assert!(geom.block_len > 0);
            }
        }
    }

    #[test]
    fn rejects_undersized_target_bytes() {
        let mut cfg = CodecConfig::new(SamplingRate::Hz16000, FrameDuration::Dms100);
        cfg.target_bytes = 4;
        assert!(cfg.validate().is_err());
    }
}
