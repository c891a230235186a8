//! Error handling for the decoder core
//!
//! This module defines the error types that can occur during packet
//! parsing and decoding, providing detailed information for debugging
//! and error recovery.

#![allow(missing_docs)]

use thiserror::Error;

/// Result type alias for decoder operations
pub type Result<T> = std::result::Result<T, OpusError>;

/// Error type for packet parsing and decode operations
#[derive(Error, Debug)]
pub enum OpusError {
    /// Caller misuse: null/invalid sizes, invalid sample rate or channel count
    #[error("Bad argument: {details}")]
    BadArgument { details: String },

    /// Malformed packet framing: length mismatches, overflow, inconsistent counts
    #[error("Invalid packet: {details}")]
    InvalidPacket { details: String },

    /// Output capacity insufficient for the parsed content
    #[error("Buffer too small: need {needed} samples, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    /// Sub-decoder failure on a non-concealment path
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Construction-time resource exhaustion
    #[error("Allocation failed: {reason}")]
    AllocationFailed { reason: String },

    /// Unknown control request
    #[error("Unimplemented request: {request}")]
    Unimplemented { request: String },

    /// Invalid sample rate
    #[error("Invalid sample rate: {rate}Hz (supported: {supported:?})")]
    InvalidSampleRate { rate: u32, supported: Vec<u32> },

    /// Invalid channel count
    #[error("Invalid channel count: {channels} (supported: {supported:?})")]
    InvalidChannelCount { channels: u8, supported: Vec<u8> },
}

impl OpusError {
    /// Create a new bad argument error
    pub fn bad_argument(details: impl Into<String>) -> Self {
        Self::BadArgument {
            details: details.into(),
        }
    }

    /// Create a new invalid packet error
    pub fn invalid_packet(details: impl Into<String>) -> Self {
        Self::InvalidPacket {
            details: details.into(),
        }
    }

    /// Create a new internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Create a new unimplemented request error
    pub fn unimplemented(request: impl Into<String>) -> Self {
        Self::Unimplemented {
            request: request.into(),
        }
    }

    /// Check if this error is recoverable
    ///
    /// Malformed packets and undersized buffers can be retried with
    /// corrected input; argument and internal errors cannot.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidPacket { .. } | Self::BufferTooSmall { .. } => true,

            Self::BadArgument { .. }
            | Self::InternalError { .. }
            | Self::AllocationFailed { .. }
            | Self::Unimplemented { .. }
            | Self::InvalidSampleRate { .. }
            | Self::InvalidChannelCount { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OpusError::invalid_packet("truncated size prefix");
        assert!(matches!(err, OpusError::InvalidPacket { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_recoverability() {
        let recoverable = OpusError::BufferTooSmall {
            needed: 960,
            actual: 480,
        };
        assert!(recoverable.is_recoverable());

        let non_recoverable = OpusError::bad_argument("frame_size must be positive");
        assert!(!non_recoverable.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = OpusError::BufferTooSmall {
            needed: 960,
            actual: 480,
        };
        let display = format!("{}", err);
        assert!(display.contains("need 960"));
        assert!(display.contains("got 480"));
    }
}
