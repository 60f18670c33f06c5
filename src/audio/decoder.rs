// Audio decoder using Symphonia
// Decodes audio files to interleaved stereo f32 frames

use symphonia::core::audio::{AudioBufferRef, AudioPlanes, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::{u24, Sample};
use symphonia::core::units::{Time, TimeBase};
use std::fs::File;
use std::path::Path;

use crate::error::{AudioError, AudioResult};

/// Outcome of a single decode step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// `frames` new stereo frames were appended to the output buffer.
    Frames(usize),
    /// The stream has no more packets.
    EndOfStream,
}

pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    source_channels: usize,
    total_frames: Option<u64>,
    time_base: Option<TimeBase>,
}

impl AudioDecoder {
    /// Open an audio file and prepare for decoding
    pub fn open(path: &Path) -> AudioResult<Self> {
        let file = File::open(path).map_err(|source| AudioError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint using the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::Probe(e.to_string()))?;

        let format = probed.format;

        // Find the first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(AudioError::NoAudioTrack)?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let source_channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);
        let total_frames = track.codec_params.n_frames;
        let time_base = track.codec_params.time_base;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Codec(e.to_string()))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            source_channels,
            total_frames,
            time_base,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the file itself; decoded output is always stereo.
    pub fn source_channels(&self) -> usize {
        self.source_channels
    }

    /// Length of the stream in frames, if the container reports it
    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    /// Duration in seconds, or 0 when the length is unknown
    pub fn duration_secs(&self) -> f64 {
        match self.total_frames {
            Some(frames) if self.sample_rate > 0 => frames as f64 / self.sample_rate as f64,
            _ => 0.0,
        }
    }

    /// Decode the next packet and append its frames to `out` as interleaved stereo.
    ///
    /// Recoverable decode errors skip the offending packet. Any other error
    /// is reported as end of stream so playback winds down instead of stalling.
    pub fn decode_next(&mut self, out: &mut Vec<f32>) -> DecodeStatus {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return DecodeStatus::EndOfStream;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    log::warn!("Failed to read packet, ending stream: {}", e);
                    return DecodeStatus::EndOfStream;
                }
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let frames = Self::append_stereo(&decoded, out);
                    return DecodeStatus::Frames(frames);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Decode error (skipping packet): {}", e);
                    continue;
                }
                Err(e) => {
                    log::warn!("Decode failed, ending stream: {}", e);
                    return DecodeStatus::EndOfStream;
                }
            }
        }
    }

    /// Seek to `seconds`; returns the frame position actually reached
    pub fn seek(&mut self, seconds: f64) -> AudioResult<u64> {
        let seconds = seconds.max(0.0);
        let time = Time::new(seconds.trunc() as u64, seconds.fract());

        let seeked_to = self
            .format
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| AudioError::Stream(format!("seek failed: {}", e)))?;

        // Reset decoder state after seek
        self.decoder.reset();

        Ok(ts_to_frames(seeked_to.actual_ts, self.time_base, self.sample_rate))
    }

    /// Convert any AudioBufferRef to interleaved stereo f32 frames
    fn append_stereo(buf: &AudioBufferRef, out: &mut Vec<f32>) -> usize {
        match buf {
            AudioBufferRef::F32(b) => {
                Self::interleave_stereo(b.planes(), b.frames(), out, |s: f32| s)
            }
            AudioBufferRef::F64(b) => {
                Self::interleave_stereo(b.planes(), b.frames(), out, |s: f64| s as f32)
            }
            AudioBufferRef::S8(b) => {
                let scale = 1.0 / 128.0;
                Self::interleave_stereo(b.planes(), b.frames(), out, |s: i8| s as f32 * scale)
            }
            AudioBufferRef::S16(b) => {
                let scale = 1.0 / 32768.0;
                Self::interleave_stereo(b.planes(), b.frames(), out, |s: i16| s as f32 * scale)
            }
            AudioBufferRef::S24(b) => {
                let scale = 1.0 / 8388608.0;
                Self::interleave_stereo(b.planes(), b.frames(), out, |s| s.inner() as f32 * scale)
            }
            AudioBufferRef::S32(b) => {
                let scale = 1.0 / 2147483648.0;
                Self::interleave_stereo(b.planes(), b.frames(), out, |s: i32| s as f32 * scale)
            }
            AudioBufferRef::U8(b) => {
                let convert = |s: u8| (s as f32 - 128.0) / 128.0;
                Self::interleave_stereo(b.planes(), b.frames(), out, convert)
            }
            AudioBufferRef::U16(b) => {
                let convert = |s: u16| (s as f32 - 32768.0) / 32768.0;
                Self::interleave_stereo(b.planes(), b.frames(), out, convert)
            }
            AudioBufferRef::U24(b) => {
                let convert = |s: u24| (s.inner() as f32 - 8388608.0) / 8388608.0;
                Self::interleave_stereo(b.planes(), b.frames(), out, convert)
            }
            AudioBufferRef::U32(b) => {
                let convert = |s: u32| (s as f64 - 2147483648.0) as f32 / 2147483648.0;
                Self::interleave_stereo(b.planes(), b.frames(), out, convert)
            }
        }
    }

    /// Mono is duplicated to both sides; anything wider keeps its first two channels.
    fn interleave_stereo<T: Sample + Copy, F: Fn(T) -> f32>(
        planes: AudioPlanes<T>,
        frames: usize,
        out: &mut Vec<f32>,
        convert: F,
    ) -> usize {
        let planes = planes.planes();
        if planes.is_empty() || frames == 0 {
            return 0;
        }

        let left = planes[0];
        let right = planes.get(1).copied().unwrap_or(left);

        out.reserve(frames * 2);
        for frame in 0..frames {
            out.push(convert(left[frame]));
            out.push(convert(right[frame]));
        }

        frames
    }
}

/// Convert a container timestamp to a sample frame index.
///
/// Timestamps are in the track's time base, which only matches the sample
/// rate for some containers. Without a time base the timestamp is taken as-is.
fn ts_to_frames(ts: u64, time_base: Option<TimeBase>, sample_rate: u32) -> u64 {
    match time_base {
        Some(tb) if sample_rate > 0 => {
            let time = tb.calc_time(ts);
            ((time.seconds as f64 + time.frac) * sample_rate as f64).round() as u64
        }
        _ => ts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_in_sample_units_are_unchanged() {
        let tb = TimeBase::new(1, 44100);
        assert_eq!(ts_to_frames(22050, Some(tb), 44100), 22050);
    }

    #[test]
    fn timestamps_in_other_timescales_are_rescaled() {
        // MP4 video-style 90 kHz timescale over 44.1 kHz audio
        let tb = TimeBase::new(1, 90000);
        assert_eq!(ts_to_frames(45000, Some(tb), 44100), 22050);

        let tb = TimeBase::new(1, 1000);
        assert_eq!(ts_to_frames(1500, Some(tb), 48000), 72000);
    }

    #[test]
    fn missing_time_base_keeps_raw_timestamp() {
        assert_eq!(ts_to_frames(1234, None, 44100), 1234);
        assert_eq!(ts_to_frames(1234, Some(TimeBase::new(1, 1000)), 0), 1234);
    }
}
