//! The per-frame decode state machine
//!
//! One entry point serves real frames, loss concealment, transition
//! lookahead, and forward-error-correction recovery; the caller's
//! arguments select the path. The control flow mirrors the wire
//! format's constraints: redundancy signalling is read from the frame's
//! own entropy stream, and every exit commits the previous-mode state
//! needed by the next frame's transition handling.

use crate::engine::SilkFrameFlag;
use crate::error::{OpusError, Result};
use crate::range::RangeDecoder;
use crate::types::{CodecMode, FrameKind};
use crate::utils::fade;
use tracing::{trace, warn};

use super::OpusDecoder;

impl OpusDecoder {
    /// Decode one logical frame (or conceal one) into `pcm`
    ///
    /// Produces exactly the committed frame duration for real data and
    /// a supported concealment granularity otherwise. Returns samples
    /// per channel.
    pub(crate) fn decode_frame(
        &mut self,
        data: Option<&[u8]>,
        pcm: &mut [i16],
        mut frame_size: usize,
        decode_fec: bool,
    ) -> Result<usize> {
        let fs = self.sample_rate.hz() as usize;
        let channels = self.channels.count();
        let f20 = fs / 50;
        let f10 = f20 >> 1;
        let f5 = f10 >> 1;
        let f2_5 = f5 >> 1;

        if frame_size < f2_5 {
            return Err(OpusError::BufferTooSmall {
                needed: f2_5,
                actual: frame_size,
            });
        }
        // Bound working-memory sizes to 120 ms
        frame_size = frame_size.min(fs / 25 * 3);

        // Payloads of 1 (2 including the TOC) or 0 bytes trigger PLC/DTX
        let data = match data {
            Some(d) if d.len() > 1 => Some(d),
            _ => {
                // Don't conceal more than what the TOC says
                frame_size = frame_size.min(self.frame_size);
                None
            }
        };

        let mut audiosize;
        let mode;
        let bandwidth;
        let mut range = match data {
            Some(d) => {
                audiosize = self.frame_size;
                mode = self.mode.ok_or_else(|| {
                    OpusError::internal_error("frame decode before mode commit")
                })?;
                bandwidth = self.bandwidth;
                Some(RangeDecoder::new(d))
            }
            None => {
                audiosize = frame_size;
                bandwidth = None;

                match self.prev_mode {
                    None => {
                        // No packet seen yet: all we can do is silence
                        pcm[..audiosize * channels].fill(0);
                        return Ok(audiosize);
                    }
                    Some(prev) => mode = prev,
                }

                // Conceal long gaps in 20 ms steps, and round odd sizes
                // down to a supported granularity (the prediction coder's
                // concealment has no 5 ms tier)
                if audiosize > f20 {
                    let mut done = 0;
                    while done < audiosize {
                        let chunk = (audiosize - done).min(f20);
                        let produced =
                            self.decode_frame(None, &mut pcm[done * channels..], chunk, false)?;
                        done += produced;
                    }
                    return Ok(frame_size);
                } else if audiosize < f20 {
                    if audiosize > f10 {
                        audiosize = f10;
                    } else if mode != CodecMode::SilkOnly && audiosize > f5 && audiosize < f10 {
                        audiosize = f5;
                    }
                }
                None
            }
        };

        // The transform coder can accumulate on top of the prediction
        // coder's PCM, sparing a scratch buffer
        let celt_accum = mode != CodecMode::CeltOnly && frame_size >= f10;

        let mut transition = false;
        let mut pcm_transition: Option<Vec<i16>> = None;
        if data.is_some() {
            if let Some(prev) = self.prev_mode {
                let crossing = (mode == CodecMode::CeltOnly
                    && prev != CodecMode::CeltOnly
                    && !self.prev_redundancy)
                    || (mode != CodecMode::CeltOnly && prev == CodecMode::CeltOnly);
                if crossing {
                    transition = true;
                    // A transition into the transform coder needs the
                    // lookahead decoded before the main frame disturbs
                    // the prediction coder's state
                    if mode == CodecMode::CeltOnly {
                        let mut lookahead = vec![0i16; f5 * channels];
                        let _ =
                            self.decode_frame(None, &mut lookahead, f5.min(audiosize), false);
                        pcm_transition = Some(lookahead);
                    }
                }
            }
        }

        if audiosize > frame_size {
            return Err(OpusError::bad_argument(
                "committed frame duration exceeds output capacity",
            ));
        }
        frame_size = audiosize;

        let mut pcm_silk = if mode != CodecMode::CeltOnly && !celt_accum {
            vec![0i16; f10.max(frame_size) * channels]
        } else {
            Vec::new()
        };

        // Prediction-coder processing
        if mode != CodecMode::CeltOnly {
            // Its state is stale after a pure transform stretch
            if self.prev_mode == Some(CodecMode::CeltOnly) {
                self.silk.reset()?;
            }

            // The prediction coder's concealment cannot produce frames
            // shorter than 10 ms
            self.silk_control.payload_size_ms = (1000 * audiosize / fs).max(10);

            if data.is_some() {
                self.silk_control.internal_channels = self.stream_channels;
                self.silk_control.internal_sample_rate = match (mode, bandwidth) {
                    (CodecMode::SilkOnly, Some(bw)) => bw.silk_internal_rate(),
                    // Hybrid mode always runs the prediction coder wideband
                    _ => 16000,
                };
            }

            let kind = if data.is_none() {
                FrameKind::Concealment
            } else if decode_fec {
                FrameKind::ForwardErrorCorrection
            } else {
                FrameKind::Normal
            };
            let flag = SilkFrameFlag::from(kind);

            let mut decoded = 0usize;
            while decoded < frame_size {
                let first_frame = decoded == 0;
                let result = {
                    let out = if celt_accum {
                        &mut pcm[decoded * channels..frame_size * channels]
                    } else {
                        &mut pcm_silk[decoded * channels..]
                    };
                    self.silk
                        .decode(&mut self.silk_control, flag, first_frame, range.as_mut(), out)
                };
                match result {
                    Ok(produced) if produced > 0 => decoded += produced,
                    Ok(_) => {
                        return Err(OpusError::internal_error(
                            "prediction decoder made no progress",
                        ))
                    }
                    Err(e) => {
                        if flag == SilkFrameFlag::Normal {
                            return Err(OpusError::internal_error(format!(
                                "prediction decoder failed: {e}"
                            )));
                        }
                        // Concealment failure must not be fatal
                        let out = if celt_accum {
                            &mut pcm[decoded * channels..frame_size * channels]
                        } else {
                            &mut pcm_silk[decoded * channels..frame_size * channels]
                        };
                        out.fill(0);
                        decoded = frame_size;
                    }
                }
            }
        }

        // Redundancy sub-frame detection: enough entropy-coded bits must
        // remain for the signalling and a minimal payload
        let mut start_band = 0u32;
        let mut redundancy = false;
        let mut celt_to_silk = false;
        let mut redundancy_bytes = 0usize;
        let mut effective_len = data.map_or(0, <[u8]>::len);
        if let (false, Some(dec)) = (decode_fec || mode == CodecMode::CeltOnly, range.as_mut()) {
            let hybrid_bits = if self.mode == Some(CodecMode::Hybrid) { 20 } else { 0 };
            if (dec.tell() + 17 + hybrid_bits) as usize <= 8 * effective_len {
                redundancy = if mode == CodecMode::Hybrid {
                    dec.decode_bit_logp(12)
                } else {
                    true
                };
                if redundancy {
                    celt_to_silk = dec.decode_bit_logp(1);
                    // At least two bytes in the non-hybrid case, by the
                    // bit-budget check above
                    redundancy_bytes = if mode == CodecMode::Hybrid {
                        dec.decode_uint(256) as usize + 2
                    } else {
                        effective_len - ((dec.tell() as usize + 7) >> 3)
                    };
                    let mut len = effective_len as isize - redundancy_bytes as isize;
                    // A valid packet never trips this; keep the frame
                    // decodable and drop the redundancy
                    if len * 8 < dec.tell() as isize {
                        warn!("redundancy length exceeds frame; ignoring it");
                        len = 0;
                        redundancy_bytes = 0;
                        redundancy = false;
                    }
                    effective_len = len as usize;
                    // The redundancy bytes are raw tail bytes, invisible
                    // to the range-coded part
                    dec.shrink_storage(redundancy_bytes);
                }
            }
        }
        if mode != CodecMode::CeltOnly {
            start_band = 17;
        }

        // A redundancy sub-frame covers the transition by itself
        if redundancy {
            transition = false;
        }

        if transition && mode != CodecMode::CeltOnly {
            let mut lookahead = vec![0i16; f5 * channels];
            let _ = self.decode_frame(None, &mut lookahead, f5.min(audiosize), false);
            pcm_transition = Some(lookahead);
        }

        if let Some(bw) = bandwidth {
            self.celt.set_end_band(bw.celt_end_band())?;
        }
        self.celt.set_channels(self.stream_channels)?;

        let mut redundant_audio = if redundancy {
            vec![0i16; f5 * channels]
        } else {
            Vec::new()
        };
        let mut redundant_rng = 0u32;

        // 5 ms redundant frame for a transform -> prediction handover
        // decodes first so the main output can fade in over it
        if let (true, true, Some(d)) = (redundancy, celt_to_silk, data) {
            self.celt.set_start_band(0)?;
            let red = &d[effective_len..effective_len + redundancy_bytes];
            let _ = self.celt.decode(Some(red), &mut redundant_audio, f5, None, false);
            redundant_rng = self.celt.final_range();
        }

        // Must come after any redundancy decode at start band 0
        self.celt.set_start_band(start_band)?;

        let mut celt_error: Option<OpusError> = None;
        if mode != CodecMode::SilkOnly {
            let celt_frame_size = f20.min(frame_size);
            // Discard stale transform state on an uncovered mode change
            if let Some(prev) = self.prev_mode {
                if mode != prev && !self.prev_redundancy {
                    self.celt.reset()?;
                }
            }
            let celt_data = if decode_fec { None } else { data };
            if let Err(e) = self.celt.decode(
                celt_data,
                &mut pcm[..frame_size * channels],
                celt_frame_size,
                range.as_mut(),
                celt_accum,
            ) {
                celt_error = Some(OpusError::internal_error(format!(
                    "transform decoder failed: {e}"
                )));
            }
        } else {
            if !celt_accum {
                pcm[..frame_size * channels].fill(0);
            }
            // For hybrid -> prediction-only transitions, let the
            // transform coder fade itself out by decoding silence
            if self.prev_mode == Some(CodecMode::Hybrid)
                && !(redundancy && celt_to_silk && self.prev_redundancy)
            {
                const SILENCE: [u8; 2] = [0xFF, 0xFF];
                self.celt.set_start_band(0)?;
                let _ = self.celt.decode(
                    Some(&SILENCE),
                    &mut pcm[..frame_size * channels],
                    f2_5,
                    None,
                    celt_accum,
                );
            }
        }

        if mode != CodecMode::CeltOnly && !celt_accum {
            for (out, &silk) in pcm[..frame_size * channels]
                .iter_mut()
                .zip(pcm_silk.iter())
            {
                *out = (i32::from(*out) + i32::from(silk)).clamp(-32768, 32767) as i16;
            }
        }

        // 5 ms redundant frame for a prediction -> transform handover:
        // fade the main output's tail into it
        if let (true, false, Some(d)) = (redundancy, celt_to_silk, data) {
            self.celt.reset()?;
            self.celt.set_start_band(0)?;
            let red = &d[effective_len..effective_len + redundancy_bytes];
            let _ = self.celt.decode(Some(red), &mut redundant_audio, f5, None, false);
            redundant_rng = self.celt.final_range();
            let tail = channels * (frame_size - f2_5);
            fade::fade_to(
                &mut pcm[tail..tail + channels * f2_5],
                &redundant_audio[channels * f2_5..],
                f2_5,
                channels,
                fs as u32,
            );
        }
        if redundancy && celt_to_silk {
            pcm[..channels * f2_5].copy_from_slice(&redundant_audio[..channels * f2_5]);
            fade::fade_from(
                &redundant_audio[channels * f2_5..],
                &mut pcm[channels * f2_5..channels * f5],
                f2_5,
                channels,
                fs as u32,
            );
        }

        if transition {
            if let Some(lookahead) = pcm_transition.as_deref() {
                if audiosize >= f5 {
                    pcm[..channels * f2_5].copy_from_slice(&lookahead[..channels * f2_5]);
                    fade::fade_from(
                        &lookahead[channels * f2_5..channels * f5],
                        &mut pcm[channels * f2_5..channels * f5],
                        f2_5,
                        channels,
                        fs as u32,
                    );
                } else {
                    // Not enough audio for a clean handover; blend over
                    // what there is
                    fade::fade_from(
                        &lookahead[..channels * f2_5],
                        &mut pcm[..channels * f2_5],
                        f2_5,
                        channels,
                        fs as u32,
                    );
                }
            }
        }

        if self.decode_gain != 0 {
            // decode_gain is in Q8 dB; 6.48814081e-4 = log2(10) / (20 * 256)
            let gain = (6.48814081e-4_f64 * f64::from(self.decode_gain)).exp2();
            for sample in pcm[..frame_size * channels].iter_mut() {
                let scaled = (f64::from(*sample) * gain).round();
                *sample = scaled.clamp(-32767.0, 32767.0) as i16;
            }
        }

        self.final_range = if effective_len <= 1 {
            0
        } else {
            range.as_ref().map_or(0, RangeDecoder::range) ^ redundant_rng
        };
        self.prev_mode = Some(mode);
        self.prev_redundancy = redundancy && !celt_to_silk;

        trace!(?mode, audiosize, redundancy, transition, "frame decoded");

        match celt_error {
            Some(e) => Err(e),
            None => Ok(audiosize),
        }
    }
}
