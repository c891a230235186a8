//! Integration test suite for the decoder core
//!
//! These tests drive the packet layer and the decode state machine
//! together, with stateful scripted engines standing in for the real
//! sub-decoders.

use crate::engine::*;
use crate::error::*;
use crate::range::RangeDecoder;
use crate::*;

/// Common test utilities: packet builders and scripted engines
pub mod utils {
    use super::*;

    /// TOC byte for a given config, stereo flag, and frame count code
    pub fn toc(config: u8, stereo: bool, code: u8) -> u8 {
        (config << 3) | (u8::from(stereo) << 2) | code
    }

    /// Code 0 packet: one frame
    pub fn code0_packet(toc: u8, frame: &[u8]) -> Vec<u8> {
        let mut packet = vec![toc & !0x03];
        packet.extend_from_slice(frame);
        packet
    }

    /// Code 3 CBR packet from equal-length frames
    pub fn code3_cbr_packet(toc: u8, frames: &[&[u8]]) -> Vec<u8> {
        let mut packet = vec![(toc & !0x03) | 3, frames.len() as u8];
        for frame in frames {
            packet.extend_from_slice(frame);
        }
        packet
    }

    /// Code 3 VBR packet with explicit padding bytes
    pub fn code3_vbr_padded_packet(toc: u8, frames: &[&[u8]], padding: usize) -> Vec<u8> {
        assert!(padding > 0 && padding < 255, "single padding byte only");
        let mut packet = vec![(toc & !0x03) | 3, 0x80 | 0x40 | frames.len() as u8];
        // A length byte below 255 announces that many trailing pad bytes
        packet.push(padding as u8);
        for frame in &frames[..frames.len() - 1] {
            let (encoded, bytes) = packet::encode_size(frame.len());
            packet.extend_from_slice(&encoded[..bytes]);
        }
        for frame in frames {
            packet.extend_from_slice(frame);
        }
        packet.extend(std::iter::repeat(0).take(padding));
        packet
    }

    /// Self-delimited rendition of a code 0 packet
    pub fn self_delimited_code0(toc: u8, frame: &[u8]) -> Vec<u8> {
        let mut packet = vec![toc & !0x03];
        let (encoded, bytes) = packet::encode_size(frame.len());
        packet.extend_from_slice(&encoded[..bytes]);
        packet.extend_from_slice(frame);
        packet
    }

    /// Prediction engine that fills each call with a running counter
    pub struct RampSilk {
        next: i16,
    }

    impl RampSilk {
        /// Engine starting at zero
        pub fn new() -> Self {
            Self { next: 0 }
        }
    }

    impl SilkEngine for RampSilk {
        fn reset(&mut self) -> Result<()> {
            self.next = 0;
            Ok(())
        }

        fn decode(
            &mut self,
            control: &mut SilkControl,
            _flag: SilkFrameFlag,
            _first_frame: bool,
            _range: Option<&mut RangeDecoder<'_>>,
            pcm: &mut [i16],
        ) -> Result<usize> {
            let produced =
                control.api_sample_rate as usize / 1000 * control.payload_size_ms.min(20);
            pcm[..produced * control.api_channels].fill(self.next);
            self.next += 1;
            Ok(produced)
        }
    }

    /// Transform engine that fills each call with a running counter
    pub struct RampCelt {
        next: i16,
        api_channels: usize,
        rng: u32,
        phase_inversion_disabled: bool,
    }

    impl RampCelt {
        /// Engine starting at zero
        pub fn new(api_channels: usize) -> Self {
            Self {
                next: 0,
                api_channels,
                rng: 0,
                phase_inversion_disabled: false,
            }
        }
    }

    impl CeltEngine for RampCelt {
        fn reset(&mut self) -> Result<()> {
            self.next = 0;
            Ok(())
        }

        fn set_start_band(&mut self, _band: u32) -> Result<()> {
            Ok(())
        }

        fn set_end_band(&mut self, _band: u32) -> Result<()> {
            Ok(())
        }

        fn set_channels(&mut self, _channels: usize) -> Result<()> {
            Ok(())
        }

        fn set_signalling(&mut self, _enabled: bool) -> Result<()> {
            Ok(())
        }

        fn final_range(&self) -> u32 {
            self.rng
        }

        fn pitch(&self) -> i32 {
            0
        }

        fn set_phase_inversion_disabled(&mut self, disabled: bool) -> Result<()> {
            self.phase_inversion_disabled = disabled;
            Ok(())
        }

        fn phase_inversion_disabled(&self) -> bool {
            self.phase_inversion_disabled
        }

        fn decode(
            &mut self,
            data: Option<&[u8]>,
            pcm: &mut [i16],
            frame_size: usize,
            _range: Option<&mut RangeDecoder<'_>>,
            accumulate: bool,
        ) -> Result<usize> {
            let n = frame_size * self.api_channels;
            if accumulate {
                for sample in pcm[..n].iter_mut() {
                    *sample = sample.saturating_add(self.next);
                }
            } else {
                pcm[..n].fill(self.next);
            }
            self.next += 1;
            self.rng = 0x1000 + u32::from(data.map_or(0, |d| d[0]));
            Ok(frame_size)
        }
    }

    /// Decoder wired to fresh ramp engines
    pub fn ramp_decoder(sample_rate: u32, channels: u8) -> OpusDecoder {
        OpusDecoder::new(
            sample_rate,
            channels,
            Box::new(RampSilk::new()),
            Box::new(RampCelt::new(channels as usize)),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod stream_tests {
    use super::utils::*;
    use super::*;

    // SILK narrowband 20 ms, config 1
    const SILK_TOC: u8 = 1 << 3;
    // CELT fullband 20 ms, config 31
    const CELT_TOC: u8 = 31 << 3;

    #[test]
    fn test_stream_with_loss_keeps_accounting() {
        let mut dec = ramp_decoder(48000, 1);
        let packet = code0_packet(SILK_TOC, &[0xAA, 0xBB]);
        let mut pcm = vec![0i16; 960];

        let mut total = 0;
        total += dec.decode(Some(&packet), &mut pcm, 960, false).unwrap();
        total += dec.decode(None, &mut pcm, 960, false).unwrap();
        total += dec.decode(Some(&packet), &mut pcm, 960, false).unwrap();
        assert_eq!(total, 2880);
        assert_eq!(dec.last_packet_duration(), 960);
    }

    #[test]
    fn test_self_delimited_stream_walk() {
        let mut stream = Vec::new();
        for payload in [&[0x11, 0x12][..], &[0x21, 0x22, 0x23], &[0x31, 0x32]] {
            stream.extend(self_delimited_code0(SILK_TOC, payload));
        }

        let mut dec = ramp_decoder(48000, 1);
        let mut pcm = vec![0i16; 960];
        let mut offset = 0;
        let mut packets = 0;
        while offset < stream.len() {
            let (samples, consumed) = dec
                .decode_native(Some(&stream[offset..]), &mut pcm, 960, false, true)
                .unwrap();
            assert_eq!(samples, 960);
            offset += consumed;
            packets += 1;
        }
        assert_eq!(offset, stream.len());
        assert_eq!(packets, 3);
    }

    #[test]
    fn test_vbr_padded_packet_decodes() {
        let frames: [&[u8]; 2] = [&[0x41, 0x42], &[0x51, 0x52]];
        let packet = code3_vbr_padded_packet(CELT_TOC, &frames, 5);

        let mut dec = ramp_decoder(48000, 1);
        assert_eq!(dec.nb_samples(&packet).unwrap(), 1920);

        let mut pcm = vec![0i16; 1920];
        let n = dec.decode(Some(&packet), &mut pcm, 1920, false).unwrap();
        assert_eq!(n, 1920);
        // Consecutive frames hit the transform engine separately
        assert_ne!(pcm[0], pcm[1919]);
    }

    #[test]
    fn test_decode_at_lower_api_rate() {
        let mut dec = ramp_decoder(8000, 1);
        let packet = code0_packet(SILK_TOC, &[0xAA, 0xBB]);
        let mut pcm = vec![0i16; 160];
        let n = dec.decode(Some(&packet), &mut pcm, 160, false).unwrap();
        assert_eq!(n, 160);
    }

    #[test]
    fn test_short_concealment_granularity() {
        let mut dec = ramp_decoder(16000, 1);
        // SILK narrowband 10 ms, config 0
        let packet = code0_packet(0, &[0xAA, 0xBB]);
        let mut pcm = vec![0i16; 640];
        dec.decode(Some(&packet), &mut pcm, 640, false).unwrap();

        // A single 2.5 ms gap is still concealable
        let n = dec.decode(None, &mut pcm, 40, false).unwrap();
        assert_eq!(n, 40);
    }

    #[test]
    fn test_stereo_output_is_fully_written() {
        let mut dec = ramp_decoder(48000, 2);
        let packet = code0_packet(CELT_TOC | 0x04, &[0x61, 0x62]);
        let mut pcm = vec![-1i16; 1920];
        let n = dec.decode(Some(&packet), &mut pcm, 960, false).unwrap();
        assert_eq!(n, 960);
        assert!(pcm.iter().all(|&s| s >= 0));
    }

    #[test]
    fn test_noise_packets_never_break_the_decoder() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(0x0505);
        let mut dec = ramp_decoder(48000, 1);
        let mut pcm = vec![0i16; 5760];
        for _ in 0..200 {
            let len = rng.gen_range(1..64usize);
            let packet: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            // Garbage either parses into some bounded amount of audio or
            // is rejected as a malformed packet; it never corrupts the
            // decoder into a fatal state
            match dec.decode(Some(&packet), &mut pcm, 5760, false) {
                Ok(n) => assert!(n > 0 && n <= 5760),
                Err(e) => assert!(e.is_recoverable(), "unexpected error: {e}"),
            }
        }
    }

    #[test]
    fn test_reset_replays_stream_identically() {
        let packets = [
            code0_packet(SILK_TOC, &[0xAA, 0xBB]),
            code0_packet(CELT_TOC, &[0xCC, 0xDD]),
            code0_packet(SILK_TOC, &[0xEE, 0xFF]),
        ];

        let mut dec = ramp_decoder(48000, 1);
        let mut run = |dec: &mut OpusDecoder| {
            let mut out = Vec::new();
            let mut pcm = vec![0i16; 960];
            for packet in &packets {
                dec.decode(Some(packet), &mut pcm, 960, false).unwrap();
                out.extend_from_slice(&pcm);
            }
            out
        };
        let first = run(&mut dec);
        dec.reset().unwrap();
        let second = run(&mut dec);
        assert_eq!(first, second);
    }
}

#[cfg(test)]
mod packet_layer_tests {
    use super::utils::*;
    use super::*;

    #[test]
    fn test_all_configs_have_consistent_durations() {
        for config in 0u8..32 {
            let packet = code0_packet(toc(config, false, 0), &[0xAA, 0xBB]);
            let parsed_toc = Toc(packet[0]);
            let per_frame = parsed_toc.samples_per_frame(48000) as usize;
            assert!(per_frame >= 120 && per_frame <= 2880, "config {}", config);
            assert_eq!(
                packet::nb_samples(&packet, 48000).unwrap(),
                per_frame,
                "config {}",
                config
            );
        }
    }

    #[test]
    fn test_cbr_frames_share_length() {
        let frames: [&[u8]; 3] = [&[1, 2], &[3, 4], &[5, 6]];
        let packet = code3_cbr_packet(toc(31, false, 3), &frames);
        let parsed = parse(&packet, false).unwrap();
        assert_eq!(parsed.frames.len(), 3);
        assert!(parsed.frames.iter().all(|f| f.len() == 2));
    }

    #[test]
    fn test_mode_metadata_reaches_decoder() {
        let mut dec = ramp_decoder(48000, 1);
        let mut pcm = vec![0i16; 960];

        // SILK wideband 20 ms, config 5
        let packet = code0_packet(toc(5, false, 0), &[0xAA, 0xBB]);
        dec.decode(Some(&packet), &mut pcm, 960, false).unwrap();
        assert_eq!(dec.bandwidth(), Some(Bandwidth::Wideband));

        // CELT superwideband 20 ms, config 27
        let packet = code0_packet(toc(27, false, 0), &[0xAA, 0xBB]);
        dec.decode(Some(&packet), &mut pcm, 960, false).unwrap();
        assert_eq!(dec.bandwidth(), Some(Bandwidth::Superwideband));
    }
}
