//! Sub-decoder adapter contracts
//!
//! The two sample-domain decoders are opaque external collaborators:
//! the linear-prediction (SILK) decoder for speech-band content and the
//! transform/overlap-add (CELT) decoder for general audio. This module
//! defines the narrow call contract the frame state machine drives them
//! through. Engine internals (entropy coding, DSP kernels) are not part
//! of this crate.

use crate::error::Result;
use crate::range::RangeDecoder;
use crate::types::FrameKind;

/// Loss signalling for a prediction-decoder call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilkFrameFlag {
    /// Real coded data follows
    Normal,
    /// Frame lost; run the built-in concealment
    Lost,
    /// Decode the low-bitrate redundancy copy of this frame
    ForwardErrorCorrection,
}

impl From<FrameKind> for SilkFrameFlag {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Normal => Self::Normal,
            FrameKind::Concealment => Self::Lost,
            FrameKind::ForwardErrorCorrection => Self::ForwardErrorCorrection,
        }
    }
}

/// Control values shared with the prediction decoder across calls
///
/// Owned by the decoder state; the engine reads the configuration
/// fields and writes back `prev_pitch_lag`.
#[derive(Debug, Clone)]
pub struct SilkControl {
    /// Sample rate PCM is produced at
    pub api_sample_rate: u32,
    /// Channel count of the output PCM
    pub api_channels: usize,
    /// Channel count coded in the current stream
    pub internal_channels: usize,
    /// Sample rate the prediction filter runs at (8/12/16 kHz)
    pub internal_sample_rate: u32,
    /// Duration of the payload being decoded, in milliseconds
    pub payload_size_ms: usize,
    /// Pitch lag of the last decoded frame, for diagnostics
    pub prev_pitch_lag: i32,
}

impl SilkControl {
    /// Initial control state for a stream
    pub fn new(api_sample_rate: u32, api_channels: usize) -> Self {
        Self {
            api_sample_rate,
            api_channels,
            internal_channels: api_channels,
            internal_sample_rate: 16000,
            payload_size_ms: 0,
            prev_pitch_lag: 0,
        }
    }
}

/// Contract for the linear-prediction sub-decoder
///
/// One instance per stream, constructed for a fixed API sample rate and
/// channel count, exclusively owned by its decoder state.
pub trait SilkEngine: Send {
    /// Clear all decode history back to construction defaults
    fn reset(&mut self) -> Result<()>;

    /// Decode one prediction-coder frame (or conceal one) into `pcm`
    ///
    /// `range` carries the shared entropy cursor when real data is
    /// present; `first_frame` distinguishes the first chunk of a decode
    /// loop. Returns the number of samples produced per channel.
    fn decode(
        &mut self,
        control: &mut SilkControl,
        flag: SilkFrameFlag,
        first_frame: bool,
        range: Option<&mut RangeDecoder<'_>>,
        pcm: &mut [i16],
    ) -> Result<usize>;
}

/// Contract for the transform sub-decoder
///
/// Band range, channel count, and signalling mode are sticky control
/// values; `decode` consumes either the shared entropy cursor or a
/// detached byte range (redundancy sub-frames).
pub trait CeltEngine: Send {
    /// Clear all decode history back to construction defaults
    fn reset(&mut self) -> Result<()>;

    /// First band to decode (0 for a full-range frame, 17 above the
    /// prediction coder's bands)
    fn set_start_band(&mut self, band: u32) -> Result<()>;

    /// One past the last band to decode, per bandwidth tier
    fn set_end_band(&mut self, band: u32) -> Result<()>;

    /// Channel count coded in the current stream
    fn set_channels(&mut self, channels: usize) -> Result<()>;

    /// Enable or disable in-band signalling (disabled under this core;
    /// the packet layer owns all signalling)
    fn set_signalling(&mut self, enabled: bool) -> Result<()>;

    /// Entropy-coder diagnostic value of the last decoded frame
    fn final_range(&self) -> u32;

    /// Pitch estimate of the last decoded frame, for diagnostics
    fn pitch(&self) -> i32;

    /// Disable phase inversion of the second channel
    fn set_phase_inversion_disabled(&mut self, disabled: bool) -> Result<()>;

    /// Whether phase inversion is currently disabled
    fn phase_inversion_disabled(&self) -> bool;

    /// Decode one transform-coder frame into `pcm`
    ///
    /// `data` is `None` for concealment. When `range` is given the
    /// engine continues from the shared entropy cursor over `data`;
    /// otherwise it reads `data` standalone. With `accumulate` set the
    /// output is added on top of `pcm` instead of replacing it.
    /// Returns the number of samples produced per channel.
    fn decode(
        &mut self,
        data: Option<&[u8]>,
        pcm: &mut [i16],
        frame_size: usize,
        range: Option<&mut RangeDecoder<'_>>,
        accumulate: bool,
    ) -> Result<usize>;
}
