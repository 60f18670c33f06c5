// Shared helpers for the integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use aurora_overlay::ManualBackend;

/// Left channel value of frame `i` in [`write_ramp_wav`] files
pub fn ramp_value(i: usize) -> i16 {
    (i % 4096) as i16 * 8
}

/// Write a 16-bit stereo PCM WAV whose left channel ramps up and right channel mirrors it.
pub fn write_ramp_wav(dir: &Path, name: &str, frames: usize, sample_rate: u32) -> PathBuf {
    write_pcm16_wav(dir, name, 2, frames, sample_rate, |i| vec![ramp_value(i), -ramp_value(i)])
}

/// Write a 16-bit mono PCM WAV carrying the ramp alone.
pub fn write_mono_ramp_wav(dir: &Path, name: &str, frames: usize, sample_rate: u32) -> PathBuf {
    write_pcm16_wav(dir, name, 1, frames, sample_rate, |i| vec![ramp_value(i)])
}

fn write_pcm16_wav(
    dir: &Path,
    name: &str,
    channels: u16,
    frames: usize,
    sample_rate: u32,
    frame: impl Fn(usize) -> Vec<i16>,
) -> PathBuf {
    let block_align = channels * 2;
    let data_len = (frames * block_align as usize) as u32;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames {
        let samples = frame(i);
        assert_eq!(samples.len(), channels as usize);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }

    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Pump the device until `done` holds, failing the test after a few seconds.
pub fn pump_until(backend: &ManualBackend, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out pumping audio");
        if backend.pump(256) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
}
