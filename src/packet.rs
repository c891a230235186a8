//! Packet framing and parsing
//!
//! A packet is one TOC (table-of-contents) byte followed by 1-48 coded
//! frames. The low two bits of the TOC select the framing sub-format:
//!
//! - code 0: one frame spanning the remaining bytes
//! - code 1: two frames of equal size
//! - code 2: two frames, the first with an explicit size prefix
//! - code 3: a count byte, optional padding, then CBR or VBR frames
//!
//! Parsing is pure and side-effect-free: on any inconsistency the whole
//! packet is rejected and no partial results are returned.

use crate::error::{OpusError, Result};
use crate::types::{Bandwidth, Channels, CodecMode};

/// Maximum number of frames in one packet (48 x 2.5 ms = 120 ms)
pub const MAX_FRAMES_PER_PACKET: usize = 48;

/// Maximum size of an implicitly-coded frame in bytes
pub const MAX_FRAME_BYTES: usize = 1275;

/// Maximum packet duration in samples at 48 kHz (120 ms)
const MAX_PACKET_SAMPLES_48K: usize = 5760;

/// The table-of-contents byte at the start of every packet
///
/// Encodes the coding mode, audio bandwidth, channel count, and the
/// frame-count code selecting the framing sub-format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toc(
    /// The raw TOC byte
    pub u8,
);

impl Toc {
    /// Coding mode of every frame in the packet
    pub fn mode(self) -> CodecMode {
        if self.0 & 0x80 != 0 {
            CodecMode::CeltOnly
        } else if self.0 & 0x60 == 0x60 {
            CodecMode::Hybrid
        } else {
            CodecMode::SilkOnly
        }
    }

    /// Audio bandwidth of the packet
    ///
    /// The transform-only configuration has no 6 kHz tier; its lowest
    /// encoded bandwidth collapses to narrowband.
    pub fn bandwidth(self) -> Bandwidth {
        let code = (self.0 >> 5) & 0x3;
        if self.0 & 0x80 != 0 {
            match code {
                0 => Bandwidth::Narrowband,
                1 => Bandwidth::Wideband,
                2 => Bandwidth::Superwideband,
                _ => Bandwidth::Fullband,
            }
        } else if self.0 & 0x60 == 0x60 {
            if self.0 & 0x10 != 0 {
                Bandwidth::Fullband
            } else {
                Bandwidth::Superwideband
            }
        } else {
            match code {
                0 => Bandwidth::Narrowband,
                1 => Bandwidth::Mediumband,
                // Code 3 selects the hybrid family, handled above
                _ => Bandwidth::Wideband,
            }
        }
    }

    /// Coded channel count (bit 2)
    pub fn channels(self) -> Channels {
        if self.0 & 0x4 != 0 {
            Channels::Stereo
        } else {
            Channels::Mono
        }
    }

    /// Frame-count code (bits 0-1) selecting the framing sub-format
    pub fn frame_count_code(self) -> u8 {
        self.0 & 0x3
    }

    /// Samples per frame at the given sample rate
    pub fn samples_per_frame(self, fs: u32) -> usize {
        let b = self.0 as u32;
        let samples = if b & 0x80 != 0 {
            (fs << ((b >> 3) & 0x3)) / 400
        } else if b & 0x60 == 0x60 {
            if b & 0x08 != 0 {
                fs / 50
            } else {
                fs / 100
            }
        } else {
            let code = (b >> 3) & 0x3;
            if code == 3 {
                fs * 60 / 1000
            } else {
                (fs << code) / 100
            }
        };
        samples as usize
    }
}

/// A validated packet: TOC plus per-frame byte ranges
#[derive(Debug)]
pub struct ParsedPacket<'a> {
    /// The table-of-contents byte
    pub toc: Toc,
    /// One subslice per frame, in packet order (1-48 entries)
    pub frames: Vec<&'a [u8]>,
    /// Offset of the first frame byte from the start of the packet
    pub payload_offset: usize,
    /// Total bytes consumed including padding; for self-delimited
    /// packets this is where the next concatenated packet starts
    pub packet_offset: usize,
}

/// Encode a frame length into the 1- or 2-byte wire form
///
/// Values below 252 use one byte. Larger values set
/// `byte0 = 252 + (size & 3)` and `byte1 = (size - byte0) >> 2`, which
/// the decoder reads back as `4 * byte1 + byte0`.
pub fn encode_size(size: usize) -> ([u8; 2], usize) {
    if size < 252 {
        ([size as u8, 0], 1)
    } else {
        let b0 = 252 + (size & 0x3);
        let b1 = (size - b0) >> 2;
        ([b0 as u8, b1 as u8], 2)
    }
}

/// Decode a frame-length prefix
///
/// `len` is the logical number of bytes still available; `data` may be
/// physically longer when trailing padding is present. Returns the
/// decoded size and the number of prefix bytes consumed.
pub fn parse_size(data: &[u8], len: isize) -> Result<(usize, usize)> {
    if len < 1 {
        return Err(OpusError::invalid_packet("missing frame size prefix"));
    }
    if data[0] < 252 {
        Ok((data[0] as usize, 1))
    } else if len < 2 {
        Err(OpusError::invalid_packet("truncated two-byte size prefix"))
    } else {
        Ok((4 * data[1] as usize + data[0] as usize, 2))
    }
}

/// Number of frames in a packet, from the TOC and count byte alone
pub fn nb_frames(packet: &[u8]) -> Result<usize> {
    if packet.is_empty() {
        return Err(OpusError::bad_argument("empty packet"));
    }
    match packet[0] & 0x3 {
        0 => Ok(1),
        1 | 2 => Ok(2),
        _ => {
            if packet.len() < 2 {
                Err(OpusError::invalid_packet("missing frame count byte"))
            } else {
                Ok((packet[1] & 0x3F) as usize)
            }
        }
    }
}

/// Number of samples per channel a packet will decode to at `fs`
///
/// Rejects packets exceeding the 120 ms bound.
pub fn nb_samples(packet: &[u8], fs: u32) -> Result<usize> {
    let count = nb_frames(packet)?;
    let samples = count * Toc(packet[0]).samples_per_frame(fs);
    // Can't have more than 120 ms
    if samples * 25 > fs as usize * 3 {
        Err(OpusError::invalid_packet("packet exceeds 120 ms"))
    } else {
        Ok(samples)
    }
}

/// Split a packet into its frames
///
/// Returns the TOC and one subslice per frame. With `self_delimited`
/// set, the last frame also carries an explicit size prefix and any
/// trailing bytes beyond `packet_offset` belong to the next packet.
///
/// # Errors
///
/// `InvalidPacket` on any framing inconsistency: truncated prefixes,
/// odd CBR splits, zero or oversized frame counts, padding or size
/// underflow, or an implicit frame length above 1275 bytes.
pub fn parse(data: &[u8], self_delimited: bool) -> Result<ParsedPacket<'_>> {
    if data.is_empty() {
        return Err(OpusError::invalid_packet("empty packet"));
    }

    let toc = Toc(data[0]);
    let framesize = toc.samples_per_frame(48000);

    let mut sizes = [0usize; MAX_FRAMES_PER_PACKET];
    let mut offset = 1usize;
    let mut len = (data.len() - 1) as isize;
    let mut last_size = len;
    let mut cbr = false;
    let mut pad = 0usize;

    let count = match toc.frame_count_code() {
        // One frame
        0 => 1,
        // Two CBR frames
        1 => {
            cbr = true;
            if !self_delimited {
                if len & 0x1 != 0 {
                    return Err(OpusError::invalid_packet("odd length for two CBR frames"));
                }
                last_size = len / 2;
                // If last_size exceeds the implicit limit, it is caught below
                sizes[0] = last_size as usize;
            }
            2
        }
        // Two VBR frames
        2 => {
            let (sz, bytes) = parse_size(&data[offset..], len)?;
            len -= bytes as isize;
            if sz as isize > len {
                return Err(OpusError::invalid_packet("first frame size exceeds packet"));
            }
            offset += bytes;
            sizes[0] = sz;
            last_size = len - sz as isize;
            2
        }
        // Multiple CBR/VBR frames (from 0 to 120 ms)
        _ => {
            if len < 1 {
                return Err(OpusError::invalid_packet("missing frame count byte"));
            }
            let ch = data[offset];
            offset += 1;
            len -= 1;
            // Number of frames encoded in bits 0 to 5
            let count = (ch & 0x3F) as usize;
            if count == 0 || framesize * count > MAX_PACKET_SAMPLES_48K {
                return Err(OpusError::invalid_packet("invalid frame count"));
            }
            // Padding flag is bit 6
            if ch & 0x40 != 0 {
                loop {
                    if len <= 0 {
                        return Err(OpusError::invalid_packet("truncated padding length"));
                    }
                    let p = data[offset];
                    offset += 1;
                    len -= 1;
                    let tmp = if p == 255 { 254 } else { p as isize };
                    len -= tmp;
                    pad += tmp as usize;
                    if p != 255 {
                        break;
                    }
                }
            }
            if len < 0 {
                return Err(OpusError::invalid_packet("padding exceeds packet length"));
            }
            // VBR flag is bit 7
            cbr = ch & 0x80 == 0;
            if !cbr {
                last_size = len;
                for size in sizes.iter_mut().take(count - 1) {
                    let (sz, bytes) = parse_size(&data[offset..], len)?;
                    len -= bytes as isize;
                    if sz as isize > len {
                        return Err(OpusError::invalid_packet("VBR frame size exceeds packet"));
                    }
                    offset += bytes;
                    *size = sz;
                    last_size -= (bytes + sz) as isize;
                }
                if last_size < 0 {
                    return Err(OpusError::invalid_packet("VBR sizes exceed packet length"));
                }
            } else if !self_delimited {
                last_size = len / count as isize;
                if last_size * count as isize != len {
                    return Err(OpusError::invalid_packet("CBR length not divisible by count"));
                }
                for size in sizes.iter_mut().take(count - 1) {
                    *size = last_size as usize;
                }
            }
            count
        }
    };

    // Self-delimited framing has an extra size for the last frame
    if self_delimited {
        let (sz, bytes) = parse_size(&data[offset..], len)?;
        len -= bytes as isize;
        if sz as isize > len {
            return Err(OpusError::invalid_packet("trailing frame size exceeds packet"));
        }
        offset += bytes;
        sizes[count - 1] = sz;
        // For CBR packets, apply the size to all the frames
        if cbr {
            if (sz * count) as isize > len {
                return Err(OpusError::invalid_packet("CBR frames exceed packet length"));
            }
            for size in sizes.iter_mut().take(count - 1) {
                *size = sz;
            }
        } else if (bytes + sz) as isize > last_size {
            return Err(OpusError::invalid_packet("trailing frame exceeds remainder"));
        }
    } else {
        // Because it's not coded explicitly, the implicit last frame (or
        // every frame in the CBR case) could exceed the wire maximum
        if last_size > MAX_FRAME_BYTES as isize {
            return Err(OpusError::invalid_packet("implicit frame exceeds 1275 bytes"));
        }
        sizes[count - 1] = last_size as usize;
    }

    let payload_offset = offset;
    let mut frames = Vec::with_capacity(count);
    for &size in sizes.iter().take(count) {
        frames.push(&data[offset..offset + size]);
        offset += size;
    }
    let packet_offset = pad + offset;

    Ok(ParsedPacket {
        toc,
        frames,
        payload_offset,
        packet_offset,
    })
}
