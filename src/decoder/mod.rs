//! Decoder state and the top-level decode driver
//!
//! [`OpusDecoder`] owns the two sub-decoder engines and all per-stream
//! mutable state. One instance serves one logical audio stream and is
//! not safe for concurrent use; independent streams use independent
//! instances.

mod frame;


use crate::engine::{CeltEngine, SilkControl, SilkEngine};
use crate::error::{OpusError, Result};
use crate::packet::{self, Toc};
use crate::types::{Bandwidth, Channels, CodecMode, SampleRate};
use crate::utils::validation;
use tracing::{debug, trace};

/// Stateful decoder for one audio stream
///
/// Constructed once with a fixed sample rate and channel count plus the
/// two sub-decoder engines; the engines stay allocated for the decoder's
/// lifetime, including across [`reset`](Self::reset).
pub struct OpusDecoder {
    sample_rate: SampleRate,
    channels: Channels,
    silk: Box<dyn SilkEngine>,
    celt: Box<dyn CeltEngine>,
    pub(crate) silk_control: SilkControl,
    decode_gain: i32,

    // Everything below is cleared on a reset
    pub(crate) stream_channels: usize,
    pub(crate) bandwidth: Option<Bandwidth>,
    pub(crate) mode: Option<CodecMode>,
    pub(crate) prev_mode: Option<CodecMode>,
    pub(crate) frame_size: usize,
    pub(crate) prev_redundancy: bool,
    last_packet_duration: usize,
    pub(crate) final_range: u32,
}

impl OpusDecoder {
    /// Create a decoder for one stream
    ///
    /// The engines must have been constructed for the same sample rate
    /// and channel count.
    ///
    /// # Errors
    ///
    /// Rejects unsupported sample rates and channel counts; propagates
    /// engine failures while disabling transform-coder signalling.
    pub fn new(
        sample_rate_hz: u32,
        channels: u8,
        silk: Box<dyn SilkEngine>,
        mut celt: Box<dyn CeltEngine>,
    ) -> Result<Self> {
        let sample_rate = SampleRate::try_from_hz(sample_rate_hz)?;
        let channels = Channels::try_from_count(channels)?;

        // The packet layer owns all signalling
        celt.set_signalling(false)?;

        let fs = sample_rate.hz();
        debug!("decoder created: {} {:?}", sample_rate, channels);
        Ok(Self {
            sample_rate,
            channels,
            silk,
            celt,
            silk_control: SilkControl::new(fs, channels.count()),
            decode_gain: 0,
            stream_channels: channels.count(),
            bandwidth: None,
            mode: None,
            prev_mode: None,
            frame_size: fs as usize / 400,
            prev_redundancy: false,
            last_packet_duration: 0,
            final_range: 0,
        })
    }

    /// Clear all decode history back to post-construction defaults
    ///
    /// Idempotent; keeps the sample rate, channel count, gain, and the
    /// allocated engines.
    pub fn reset(&mut self) -> Result<()> {
        self.stream_channels = self.channels.count();
        self.bandwidth = None;
        self.mode = None;
        self.prev_mode = None;
        self.frame_size = self.sample_rate.hz() as usize / 400;
        self.prev_redundancy = false;
        self.last_packet_duration = 0;
        self.final_range = 0;
        self.celt.reset()?;
        self.silk.reset()?;
        debug!("decoder state reset");
        Ok(())
    }

    /// Decode one packet (or conceal a gap) into `pcm`
    ///
    /// `data` of `None` or empty produces exactly `frame_size` samples
    /// per channel of concealment. With `decode_fec` set, the packet's
    /// redundancy data recovers the gap preceding it, degrading to
    /// plain concealment when no redundancy can apply.
    ///
    /// Returns the number of samples produced per channel.
    ///
    /// # Errors
    ///
    /// `BadArgument` for a zero or misaligned frame size or undersized
    /// output slice, `InvalidPacket` for malformed framing,
    /// `BufferTooSmall` when the packet holds more audio than
    /// `frame_size`, and `InternalError` for sub-decoder failures on
    /// real data.
    pub fn decode(
        &mut self,
        data: Option<&[u8]>,
        pcm: &mut [i16],
        frame_size: usize,
        decode_fec: bool,
    ) -> Result<usize> {
        self.decode_native(data, pcm, frame_size, decode_fec, false)
            .map(|(samples, _)| samples)
    }

    /// Decode with self-delimited framing support
    ///
    /// Identical to [`decode`](Self::decode) but also returns the total
    /// packet bytes consumed, so concatenated self-delimited packets
    /// can be walked without an external length.
    pub fn decode_native(
        &mut self,
        data: Option<&[u8]>,
        pcm: &mut [i16],
        frame_size: usize,
        decode_fec: bool,
        self_delimited: bool,
    ) -> Result<(usize, usize)> {
        if frame_size == 0 {
            return Err(OpusError::bad_argument("frame_size must be positive"));
        }
        let fs = self.sample_rate.hz() as usize;
        let channels = self.channels.count();
        validation::validate_pcm_capacity(pcm, frame_size, channels)
            .map_err(|_| OpusError::bad_argument("output slice shorter than frame_size"))?;

        let data = match data {
            Some(d) if !d.is_empty() => Some(d),
            _ => None,
        };

        // For FEC/PLC, frame_size has to be a multiple of 2.5 ms
        if (decode_fec || data.is_none()) && frame_size % (fs / 400) != 0 {
            return Err(OpusError::bad_argument(
                "concealment frame size must be a multiple of 2.5 ms",
            ));
        }

        let Some(data) = data else {
            trace!(frame_size, "concealing missing packet");
            let mut pcm_count = 0;
            while pcm_count < frame_size {
                let produced = self.decode_frame(
                    None,
                    &mut pcm[pcm_count * channels..],
                    frame_size - pcm_count,
                    false,
                )?;
                pcm_count += produced;
            }
            debug_assert_eq!(pcm_count, frame_size);
            self.last_packet_duration = pcm_count;
            return Ok((pcm_count, 0));
        };

        let toc = Toc(data[0]);
        let packet_mode = toc.mode();
        let packet_bandwidth = toc.bandwidth();
        let packet_frame_size = toc.samples_per_frame(fs as u32);
        let packet_stream_channels = toc.channels().count();

        let parsed = packet::parse(data, self_delimited)?;
        let count = parsed.frames.len();
        let packet_offset = parsed.packet_offset;

        if decode_fec {
            // If no FEC can be present, run plain concealment
            if frame_size < packet_frame_size
                || packet_mode == CodecMode::CeltOnly
                || self.mode == Some(CodecMode::CeltOnly)
            {
                trace!("no applicable FEC data; degrading to concealment");
                return self.decode_native(None, pcm, frame_size, false, false);
            }
            // Conceal everything except the size we might have FEC for
            let duration_copy = self.last_packet_duration;
            if frame_size != packet_frame_size {
                let ret =
                    self.decode_native(None, pcm, frame_size - packet_frame_size, false, false);
                if let Err(e) = ret {
                    self.last_packet_duration = duration_copy;
                    return Err(e);
                }
            }
            // Complete with the redundancy copy
            self.mode = Some(packet_mode);
            self.bandwidth = Some(packet_bandwidth);
            self.frame_size = packet_frame_size;
            self.stream_channels = packet_stream_channels;
            self.decode_frame(
                Some(parsed.frames[0]),
                &mut pcm[channels * (frame_size - packet_frame_size)..],
                packet_frame_size,
                true,
            )?;
            self.last_packet_duration = frame_size;
            return Ok((frame_size, packet_offset));
        }

        if count * packet_frame_size > frame_size {
            return Err(OpusError::BufferTooSmall {
                needed: count * packet_frame_size,
                actual: frame_size,
            });
        }

        // Update the state as the last step to avoid updating it on an
        // invalid packet
        self.mode = Some(packet_mode);
        self.bandwidth = Some(packet_bandwidth);
        self.frame_size = packet_frame_size;
        self.stream_channels = packet_stream_channels;

        trace!(
            ?packet_mode,
            ?packet_bandwidth,
            count,
            packet_frame_size,
            "decoding packet"
        );

        let mut nb_samples = 0;
        for frame in &parsed.frames {
            let produced = self.decode_frame(
                Some(frame),
                &mut pcm[nb_samples * channels..],
                frame_size - nb_samples,
                false,
            )?;
            debug_assert_eq!(produced, packet_frame_size);
            nb_samples += produced;
        }
        self.last_packet_duration = nb_samples;
        Ok((nb_samples, packet_offset))
    }

    /// Sample rate fixed at construction
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Channel count fixed at construction
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Bandwidth of the last parsed packet, if any packet has been seen
    pub fn bandwidth(&self) -> Option<Bandwidth> {
        self.bandwidth
    }

    /// Entropy-coder diagnostic value of the last decoded frame,
    /// folded with the redundancy sub-frame's own value
    pub fn final_range(&self) -> u32 {
        self.final_range
    }

    /// Duration of the last decode call in samples per channel
    pub fn last_packet_duration(&self) -> usize {
        self.last_packet_duration
    }

    /// Persistent decode gain in Q8 dB units
    pub fn gain(&self) -> i32 {
        self.decode_gain
    }

    /// Set the persistent decode gain, in Q8 dB units
    ///
    /// # Errors
    ///
    /// `BadArgument` outside [-32768, 32767]
    pub fn set_gain(&mut self, gain: i32) -> Result<()> {
        validation::validate_gain(gain)?;
        self.decode_gain = gain;
        Ok(())
    }

    /// Pitch lag of the last decoded frame
    ///
    /// Sourced from the transform coder after a transform-only frame,
    /// from the prediction coder otherwise.
    pub fn pitch(&self) -> i32 {
        if self.prev_mode == Some(CodecMode::CeltOnly) {
            self.celt.pitch()
        } else {
            self.silk_control.prev_pitch_lag
        }
    }

    /// Disable or re-enable phase inversion of the second channel
    pub fn set_phase_inversion_disabled(&mut self, disabled: bool) -> Result<()> {
        self.celt.set_phase_inversion_disabled(disabled)
    }

    /// Whether phase inversion is currently disabled
    pub fn phase_inversion_disabled(&self) -> bool {
        self.celt.phase_inversion_disabled()
    }

    /// Samples per channel `packet` would decode to at this decoder's rate
    pub fn nb_samples(&self, packet: &[u8]) -> Result<usize> {
        packet::nb_samples(packet, self.sample_rate.hz())
    }
}
