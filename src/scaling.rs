//! Output-scaling byte packing (§ 4.8): convert block-scaled time-domain
//! samples into little-endian PCM at a caller-selected bit depth, with
//! support for sparse interleaved writes via `out_skip`.

use crate::error::{CodecError, Result};

/// Compute the right-shift `scale` for a given output bit depth and the
/// block exponent of the time-domain samples being packed. 16-bit output
/// uses the documented special case (`15 - q_fx_exp`); 24/32-bit use the
/// general form (`31 + 16 - bits - q_fx_exp`).
fn scale_for(bits: u32, q_fx_exp: i32) -> i32 {
    if bits == 16 {
        15 - q_fx_exp
    } else {
        31 + 16 - bits as i32 - q_fx_exp
    }
}

/// Rounding offset added before the shift, matching the per-depth
/// constants named in § 4.8 (24-bit rounds by `128 << (scale-16)`, 32-bit
/// by `32768 << (scale-16)`; 16-bit needs no offset beyond the shift's own
/// rounding since it shares the mantissa's native width).
fn rounding_offset(bits: u32, scale: i32) -> i64 {
    match bits {
        24 => 128i64 << (scale - 16).max(0),
        32 => 32768i64 << (scale - 16).max(0),
        _ => 1i64 << (scale - 1).max(0),
    }
}

fn shift_saturate(value: i64, scale: i32, bits: u32) -> i64 {
    let rounded = if scale >= 0 {
        (value + rounding_offset(bits, scale)) >> scale
    } else {
        value << (-scale)
    };
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    rounded.clamp(min, max)
}

/// Pack one block-scaled time-domain frame into little-endian PCM bytes at
/// the requested bit depth. `out_skip` is the byte stride between
/// consecutive samples in `out` (use `bytes_per_sample(bits)` for
/// contiguous mono output, or a multiple of it for interleaved channels).
/// `out` must already be sized to hold `out_skip * (mantissa.len() - 1) +
/// bytes_per_sample(bits)` bytes from `out_offset`.
pub fn pack_pcm(mantissa: &[i32], q_fx_exp: i32, bits: u32, out: &mut [u8], out_offset: usize, out_skip: usize) -> Result<()> {
    let bytes_per_sample = match bits {
        16 | 24 | 32 => (bits / 8) as usize,
        other => return Err(CodecError::UnsupportedOutputDepth { bits: other }),
    };
    let scale = scale_for(bits, q_fx_exp);

    for (i, &m) in mantissa.iter().enumerate() {
        let sample = shift_saturate(m as i64, scale, bits);
        let base = out_offset + i * out_skip;
        let bytes = sample.to_le_bytes();
        out[base..base + bytes_per_sample].copy_from_slice(&bytes[..bytes_per_sample]);
    }
    Ok(())
}

/// Inverse of [`pack_pcm`]: read PCM bytes at the given depth back into a
/// mantissa array at a fixed exponent of 0 (raw integer value), for the
/// decoder's input-scaling stage.
pub fn unpack_pcm(input: &[u8], bits: u32, count: usize, in_offset: usize, in_skip: usize) -> Result<Vec<i32>> {
    let bytes_per_sample = match bits {
        16 | 24 | 32 => (bits / 8) as usize,
        other => return Err(CodecError::UnsupportedOutputDepth { bits: other }),
    };
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let base = in_offset + i * in_skip;
        let mut buf = [0u8; 8];
        buf[..bytes_per_sample].copy_from_slice(&input[base..base + bytes_per_sample]);
        let sign_extend = bytes_per_sample < 8 && (buf[bytes_per_sample - 1] & 0x80) != 0;
        if sign_extend {
            for b in buf.iter_mut().skip(bytes_per_sample) {
                *b = 0xFF;
            }
        }
        out.push(i64::from_le_bytes(buf) as i32);
    }
    Ok(out)
}
