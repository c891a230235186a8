//! Core types for the decoder library
//!
//! This module defines the fundamental enums shared by the packet parser
//! and the frame decode state machine.

use crate::error::{OpusError, Result};
use std::fmt;

/// Sample rates supported at the decoder API level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRate {
    /// 8 kHz (narrowband)
    Rate8000,
    /// 12 kHz
    Rate12000,
    /// 16 kHz (wideband)
    Rate16000,
    /// 24 kHz
    Rate24000,
    /// 48 kHz (fullband)
    Rate48000,
}

impl SampleRate {
    /// Get the sample rate value in Hz
    pub fn hz(self) -> u32 {
        match self {
            Self::Rate8000 => 8000,
            Self::Rate12000 => 12000,
            Self::Rate16000 => 16000,
            Self::Rate24000 => 24000,
            Self::Rate48000 => 48000,
        }
    }

    /// Create from an Hz value
    ///
    /// # Errors
    ///
    /// Returns an error for rates outside {8000, 12000, 16000, 24000, 48000}
    pub fn try_from_hz(hz: u32) -> Result<Self> {
        match hz {
            8000 => Ok(Self::Rate8000),
            12000 => Ok(Self::Rate12000),
            16000 => Ok(Self::Rate16000),
            24000 => Ok(Self::Rate24000),
            48000 => Ok(Self::Rate48000),
            rate => Err(OpusError::InvalidSampleRate {
                rate,
                supported: vec![8000, 12000, 16000, 24000, 48000],
            }),
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.hz())
    }
}

/// Channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channels {
    /// Single channel
    Mono,
    /// Two interleaved channels
    Stereo,
}

impl Channels {
    /// Number of channels
    pub fn count(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }

    /// Create from a channel count
    ///
    /// # Errors
    ///
    /// Returns an error for counts other than 1 or 2
    pub fn try_from_count(channels: u8) -> Result<Self> {
        match channels {
            1 => Ok(Self::Mono),
            2 => Ok(Self::Stereo),
            other => Err(OpusError::InvalidChannelCount {
                channels: other,
                supported: vec![1, 2],
            }),
        }
    }
}

/// Per-frame coding mode, signalled in the TOC byte
///
/// The prediction coder (SILK) covers speech-band content, the transform
/// coder (CELT) covers general audio, and hybrid mode runs both over
/// disjoint frequency bands and sums them in the time domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecMode {
    /// Linear-prediction coder only
    SilkOnly,
    /// Both coders over disjoint bands
    Hybrid,
    /// Transform coder only
    CeltOnly,
}

/// Audio bandwidth, one of five nested frequency ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bandwidth {
    /// 4 kHz passband
    Narrowband,
    /// 6 kHz passband
    Mediumband,
    /// 8 kHz passband
    Wideband,
    /// 12 kHz passband
    Superwideband,
    /// 20 kHz passband
    Fullband,
}

impl Bandwidth {
    /// Last transform-coder band to decode for this bandwidth tier
    pub fn celt_end_band(self) -> u32 {
        match self {
            Self::Narrowband => 13,
            Self::Mediumband | Self::Wideband => 17,
            Self::Superwideband => 19,
            Self::Fullband => 21,
        }
    }

    /// Internal sample rate the prediction coder runs at in SILK-only mode
    ///
    /// Wideband and above clamp to 16 kHz; everything higher is carried
    /// by the transform coder.
    pub fn silk_internal_rate(self) -> u32 {
        match self {
            Self::Narrowband => 8000,
            Self::Mediumband => 12000,
            _ => 16000,
        }
    }
}

/// How a frame decode call is being driven
///
/// The same state-machine entry point serves real packets, loss
/// concealment, and forward-error-correction recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Real coded data is present
    Normal,
    /// No data; synthesize from prior decoder state
    Concealment,
    /// Pull only the redundancy sub-frame of a future packet
    ForwardErrorCorrection,
}
