//! # lc3-dsp-core: Fixed-Point LC3 Signal-Processing Core
//!
//! The analysis/synthesis pipeline, packet-loss-concealment subsystem, and
//! dynamic fixed-point discipline underlying an LC3 (Low-Complexity
//! Communication Codec) implementation: low-delay MDCT/IMDCT, spectral
//! noise shaping (SNS), temporal noise shaping (TNS), the long-term
//! postfilter (LTPF), quantization with arithmetic-context bit counting,
//! noise filling, and PLC (phase ECU, time-domain LPC concealment, noise
//! substitution).
//!
//! ## Scope
//!
//! This crate produces and consumes the *parsed* per-frame fields a
//! bitstream packer would carry (gain indices, TNS/LTPF/SNS side info,
//! quantized coefficients) rather than packing bits itself — the range
//! coder's byte-level emission is out of scope, matching this core's
//! non-faulting, allocation-free hot path.
//!
//! ## Usage
//!
//! ```rust
//! use lc3_dsp_core::config::{CodecConfig, FrameDuration, SamplingRate};
//! use lc3_dsp_core::encoder::EncoderState;
//! use lc3_dsp_core::decoder::DecoderState;
//!
//! let config = CodecConfig::new(SamplingRate::Hz16000, FrameDuration::Dms100);
//! let mut encoder = EncoderState::open(config)?;
//! let mut decoder = DecoderState::open(config)?;
//!
//! let pcm = vec![0i16; 1600]; // 100 ms at 16 kHz
//! let frame = encoder.encode_frame(&pcm)?;
//! let decoded = decoder.decode_frame(&frame, 0)?;
//! assert_eq!(decoded.len(), pcm.len());
//! # Ok::<(), lc3_dsp_core::error::CodecError>(())
//! ```
//!
//! ## Error Handling
//!
//! The hot path is non-faulting; `CodecError` only surfaces from
//! instance-lifecycle calls (`open`) and from bitstream-adjacent decode
//! calls that can observe external corruption.
//!
//! ```rust
//! use lc3_dsp_core::config::{CodecConfig, FrameDuration, SamplingRate};
//! use lc3_dsp_core::encoder::EncoderState;
//! use lc3_dsp_core::error::CodecError;
//!
//! let mut config = CodecConfig::new(SamplingRate::Hz16000, FrameDuration::Dms100);
//! config.target_bytes = 2; // below the minimum this core supports
//!
//! match EncoderState::open(config) {
//!     Ok(_) => println!("opened"),
//!     Err(CodecError::UnsupportedConfiguration { sample_rate_hz, frame_dms }) => {
//!         println!("unsupported: {sample_rate_hz} Hz / {frame_dms} dms");
//!     }
//!     Err(e) => println!("other error: {e}"),
//! }
//! ```

#![deny(missing_docs)]
#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod fixed_point;
pub mod ltpf;
pub mod mdct;
pub mod plc;
pub mod quantize;
pub mod scaling;
pub mod scratch;
pub mod sns;
pub mod tables;
pub mod tns;

pub use config::{CodecConfig, ConcealmentMethod, FrameDuration, FrameGeometry, SamplingRate};
pub use decoder::DecoderState;
pub use encoder::{EncodedFrame, EncoderState};
pub use error::{CodecError, Result};

/// Crate version, mirroring the `Cargo.toml` package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the default `tracing` subscriber and log the resolved
/// configuration table sizes. Safe to call multiple times; only the first
/// call actually installs a subscriber.
///
/// # Errors
///
/// Never returns an error today; the `Result` return keeps the signature
/// stable if subscriber installation gains fallible steps later.
pub fn init() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    tracing::info!("lc3-dsp-core v{} initialized", VERSION);
    Ok(())
}

/// Runtime library information.
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    /// Crate version.
    pub version: &'static str,
    /// Sampling rates this core is validated against (§ 6).
    pub supported_sampling_rates_hz: Vec<u32>,
    /// Frame durations this core is validated against (§ 6), in
    /// deci-milliseconds.
    pub supported_frame_durations_dms: Vec<u16>,
}

/// Get library information.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        supported_sampling_rates_hz: config::SamplingRate::ALL.iter().map(|r| r.hz()).collect(),
        supported_frame_durations_dms: vec![
            config::FrameDuration::Dms25.dms(),
            config::FrameDuration::Dms50.dms(),
            config::FrameDuration::Dms100.dms(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_info() {
        let info = info();
        assert_eq!(info.version, VERSION);
        assert_eq!(info.supported_sampling_rates_hz.len(), 5);
        assert_eq!(info.supported_frame_durations_dms.len(), 3);
    }

    #[test]
    fn encode_decode_round_trip_preserves_frame_length() {
        let config = config::CodecConfig::new(config::SamplingRate::Hz16000, config::FrameDuration::Dms100);
        let mut encoder = encoder::EncoderState::open(config).expect("valid configuration");
        let mut decoder = decoder::DecoderState::open(config).expect("valid configuration");
        let pcm = vec![0i16; 1600];
        let frame = encoder.encode_frame(&pcm).expect("encode must succeed");
        let decoded = decoder.decode_frame(&frame, 0).expect("decode must succeed");
        assert_eq!(decoded.len(), pcm.len());
    }
}
