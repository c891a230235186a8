//! Input validation utilities for decode operations

use crate::error::{OpusError, Result};

/// Range of the persistent decode gain, in Q8 dB units
pub const GAIN_MIN: i32 = -32768;
/// See [`GAIN_MIN`]
pub const GAIN_MAX: i32 = 32767;

/// Validate a decode gain value
pub fn validate_gain(gain: i32) -> Result<()> {
    if !(GAIN_MIN..=GAIN_MAX).contains(&gain) {
        return Err(OpusError::bad_argument(format!(
            "gain {} out of range [{}, {}]",
            gain, GAIN_MIN, GAIN_MAX
        )));
    }
    Ok(())
}

/// Check an output buffer can hold `frame_size` samples per channel
pub fn validate_pcm_capacity(pcm: &[i16], frame_size: usize, channels: usize) -> Result<()> {
    let needed = frame_size * channels;
    if pcm.len() < needed {
        return Err(OpusError::BufferTooSmall {
            needed,
            actual: pcm.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_range() {
        assert!(validate_gain(0).is_ok());
        assert!(validate_gain(GAIN_MIN).is_ok());
        assert!(validate_gain(GAIN_MAX).is_ok());
        assert!(validate_gain(GAIN_MAX + 1).is_err());
        assert!(validate_gain(GAIN_MIN - 1).is_err());
    }

    #[test]
    fn test_pcm_capacity() {
        let pcm = vec![0i16; 960];
        assert!(validate_pcm_capacity(&pcm, 480, 2).is_ok());
        assert!(validate_pcm_capacity(&pcm, 960, 1).is_ok());
        assert!(validate_pcm_capacity(&pcm, 960, 2).is_err());
    }
}
