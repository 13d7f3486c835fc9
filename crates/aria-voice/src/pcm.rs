//! PCM16 conversion and framing helpers.
//!
//! Decode multiplies by exactly 1/32768 so round-trips compare bit-exactly
//! against the reference decoder; encode clamps to [-1, 1] and scales to
//! signed 16-bit.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

/// Exact decode factor: 1/32768.
pub const PCM_DECODE_FACTOR: f32 = 0.000030517578125;

/// Encode one float sample to signed 16-bit.
#[inline]
pub fn encode_sample(x: f32) -> i16 {
    let scaled = x.clamp(-1.0, 1.0) * 32768.0;
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Decode one signed 16-bit sample to float.
#[inline]
pub fn decode_sample(s: i16) -> f32 {
    s as f32 * PCM_DECODE_FACTOR
}

pub fn encode(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(encode_sample).collect()
}

pub fn decode(samples: &[i16]) -> Vec<f32> {
    samples.iter().copied().map(decode_sample).collect()
}

/// PCM16 to little-endian bytes.
pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// Little-endian bytes to PCM16. A trailing odd byte is dropped.
pub fn from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// PCM16 to the base64 payload embedded in transport frames.
pub fn to_base64(samples: &[i16]) -> String {
    B64.encode(to_le_bytes(samples))
}

/// Base64 transport payload to PCM16.
pub fn from_base64(data: &str) -> Result<Vec<i16>, base64::DecodeError> {
    Ok(from_le_bytes(&B64.decode(data)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_factor_is_exact() {
        assert_eq!(PCM_DECODE_FACTOR, 1.0 / 32768.0);
    }

    #[test]
    fn round_trip_within_one_ulp_of_s16() {
        // one ULP at signed-16-bit resolution
        let ulp = 1.0 / 32768.0;
        let mut x = -1.0f32;
        while x <= 1.0 {
            let back = decode_sample(encode_sample(x));
            assert!(
                (back - x).abs() <= ulp,
                "x={x} back={back} err={}",
                (back - x).abs()
            );
            x += 0.001;
        }
    }

    #[test]
    fn full_scale_clamps_cleanly() {
        assert_eq!(encode_sample(1.0), i16::MAX);
        assert_eq!(encode_sample(-1.0), i16::MIN);
        assert_eq!(encode_sample(2.5), i16::MAX);
        assert_eq!(encode_sample(-2.5), i16::MIN);
        assert_eq!(encode_sample(0.0), 0);
    }

    #[test]
    fn half_scale_is_exact() {
        let s = encode_sample(0.5);
        assert_eq!(s, 16384);
        assert_eq!(decode_sample(s), 0.5);
    }

    #[test]
    fn le_bytes_round_trip() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN, 12345, -12345];
        assert_eq!(from_le_bytes(&to_le_bytes(&samples)), samples);
    }

    #[test]
    fn base64_round_trip() {
        let samples = vec![100i16, -200, 300];
        assert_eq!(from_base64(&to_base64(&samples)).unwrap(), samples);
    }

    #[test]
    fn odd_trailing_byte_is_dropped() {
        assert_eq!(from_le_bytes(&[0x01, 0x00, 0xFF]), vec![1i16]);
    }
}
