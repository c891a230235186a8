//! # Opus-Core: Packet Framing and Frame Decode Core
//!
//! This library implements the mode-agnostic core of an Opus decoder:
//! the packet layer (TOC parsing, frame splitting, self-delimited
//! framing) and the per-frame decode state machine (mode transitions,
//! loss concealment, in-band redundancy, forward error correction).
//!
//! The two sample-domain sub-decoders are supplied by the caller as
//! trait objects; this crate drives them, it does not contain them.
//!
//! ## Features
//!
//! - **Packet parsing**: all four frame-count codes, padding, CBR/VBR
//!   and self-delimited framing, with full malformed-input rejection
//! - **Decode driver**: multi-frame packets, concealment of arbitrary
//!   2.5 ms-aligned gaps, FEC recovery with graceful degradation
//! - **Mode transitions**: lookahead decode and power-preserving
//!   cross-fades between the prediction and transform coders
//! - **Range decoder**: the shared entropy cursor handed to both
//!   sub-decoders, including raw-bit reads from the frame tail
//!
//! ## Usage
//!
//! ```rust,no_run
//! use opus_core::{OpusDecoder, SilkEngine, CeltEngine};
//!
//! # fn engines() -> (Box<dyn SilkEngine>, Box<dyn CeltEngine>) { unimplemented!() }
//! let (silk, celt) = engines();
//! let mut decoder = OpusDecoder::new(48000, 2, silk, celt)?;
//!
//! let packet: &[u8] = &[];
//! let mut pcm = vec![0i16; 960 * 2];
//! let samples = decoder.decode(Some(packet), &mut pcm, 960, false)?;
//! # Ok::<(), opus_core::OpusError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod decoder;
pub mod engine;
pub mod error;
pub mod packet;
pub mod range;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types and traits
pub use decoder::OpusDecoder;
pub use engine::{CeltEngine, SilkControl, SilkEngine, SilkFrameFlag};
pub use error::{OpusError, Result};
pub use packet::{parse, ParsedPacket, Toc};
pub use types::{Bandwidth, Channels, CodecMode, FrameKind, SampleRate};

/// Version information for the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
///
/// Sets up logging if no global subscriber is installed yet. Safe to
/// call multiple times.
///
/// # Errors
///
/// Currently infallible; the `Result` reserves room for future global
/// state.
pub fn init() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    tracing::info!("Opus-Core v{} initialized", VERSION);
    Ok(())
}
