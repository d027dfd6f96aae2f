//! End-to-end frame-loss scenarios driven entirely through the public
//! `EncoderState`/`DecoderState` API: a clean round trip, a single lost
//! frame in the middle of a steady tone, and a five-frame burst loss.

use lc3_dsp_core::config::{CodecConfig, FrameDuration, SamplingRate};
use lc3_dsp_core::decoder::DecoderState;
use lc3_dsp_core::encoder::EncoderState;

fn config() -> CodecConfig {
    CodecConfig::new(SamplingRate::Hz16000, FrameDuration::Dms100)
}

fn tone_frame(frame_idx: usize, frame_len: usize, freq_hz: f64, sample_rate_hz: f64, amplitude: f64) -> Vec<i16> {
    (0..frame_len)
        .map(|i| {
            let t = (frame_idx * frame_len + i) as f64;
            (amplitude * (2.0 * std::f64::consts::PI * freq_hz * t / sample_rate_hz).sin()) as i16
        })
        .collect()
}

fn rms(samples: &[i16]) -> f64 {
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

#[test]
fn clean_round_trip_preserves_tone_energy_roughly() {
    let config = config();
    let mut encoder = EncoderState::open(config).expect("valid configuration");
    let mut decoder = DecoderState::open(config).expect("valid configuration");
    let frame_len = config.validate().expect("valid configuration").frame_len;

    let mut last_rms = 0.0;
    for frame_idx in 0..8 {
        let pcm = tone_frame(frame_idx, frame_len, 440.0, 16000.0, 6000.0);
        let frame = encoder.encode_frame(&pcm).expect("encode must succeed");
        let decoded = decoder.decode_frame(&frame, 0).expect("decode must succeed");
        assert_eq!(decoded.len(), frame_len);
        if frame_idx >= 2 {
            last_rms = rms(&decoded);
        }
    }
    assert!(last_rms > 500.0, "decoded tone lost too much energy: rms={last_rms}");
}

#[test]
fn single_frame_loss_mid_tone_recovers_comparable_energy() {
    let config = config();
    let mut encoder = EncoderState::open(config).expect("valid configuration");
    let mut decoder = DecoderState::open(config).expect("valid configuration");
    let frame_len = config.validate().expect("valid configuration").frame_len;

    let mut pre_loss_rms = 0.0;
    let mut frames: Vec<_> = (0..10)
        .map(|i| encoder.encode_frame(&tone_frame(i, frame_len, 440.0, 16000.0, 6000.0)).expect("encode must succeed"))
        .collect();

    for (i, frame) in frames.drain(..).enumerate() {
        if i == 4 {
            let concealed = decoder.conceal().expect("concealment must succeed");
            assert_eq!(concealed.len(), frame_len);
            continue;
        }
        let decoded = decoder.decode_frame(&frame, 0).expect("decode must succeed");
        if i == 3 {
            pre_loss_rms = rms(&decoded);
        }
        if i == 5 {
            let post_loss_rms = rms(&decoded);
            // Phase-ECU/noise-substitution concealment followed by one good
            // frame should recover comparable amplitude, not silence or a
            // runaway spike.
            assert!(post_loss_rms > pre_loss_rms * 0.2, "recovered frame too quiet: {post_loss_rms} vs {pre_loss_rms}");
            assert!(post_loss_rms < pre_loss_rms * 5.0, "recovered frame spiked: {post_loss_rms} vs {pre_loss_rms}");
        }
    }
}

#[test]
fn burst_loss_of_five_frames_fades_without_growing() {
    let config = config();
    let mut encoder = EncoderState::open(config).expect("valid configuration");
    let mut decoder = DecoderState::open(config).expect("valid configuration");
    let frame_len = config.validate().expect("valid configuration").frame_len;

    // Prime the decoder with a few good frames so PLC has a non-trivial
    // last-known-good spectrum to conceal from.
    for i in 0..3 {
        let frame = encoder.encode_frame(&tone_frame(i, frame_len, 440.0, 16000.0, 8000.0)).expect("encode must succeed");
        decoder.decode_frame(&frame, 0).expect("decode must succeed");
    }

    let mut prev_energy = f64::MAX;
    let mut energies = Vec::new();
    for _ in 0..5 {
        let concealed = decoder.conceal().expect("concealment must succeed");
        let energy: f64 = concealed.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        assert!(energy <= prev_energy * 1.05 + 1.0, "burst-loss energy increased: {energy} > {prev_energy}");
        prev_energy = energy;
        energies.push(energy);
    }

    let first = energies[0].sqrt();
    let last = energies[4].sqrt();
    assert!(last <= first * 1.05 + 1.0, "final burst-loss frame did not stay bounded relative to the first: {last} vs {first}");
}
