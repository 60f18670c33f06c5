// Audio engine
// Owns the active source (decoder worker + output stream) and the visualization ring

use parking_lot::Mutex;
use ringbuf::traits::{Observer, Producer, Split};
use ringbuf::HeapRb;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::decoder::{AudioDecoder, DecodeStatus};
use super::output::{CpalBackend, FrameRenderer, OutputBackend, OutputStream, StreamSpec};
use super::pcm_ring::{PcmRing, DEFAULT_RING_FRAMES};
use super::transport::Transport;
use crate::error::AudioResult;
use crate::settings::AudioSettings;

/// The engine always hands the device interleaved stereo.
pub const OUTPUT_CHANNELS: u16 = 2;

/// Sample rate reported while nothing is loaded
pub const FALLBACK_SAMPLE_RATE: u32 = 44100;

type RingProducer = ringbuf::HeapProd<f32>;

/// Source of playback time, polled by the overlay every tick.
pub trait PlaybackClock {
    /// Seconds played so far; 0 when nothing is loaded
    fn position_secs(&self) -> f64;
    /// Total length in seconds; 0 when unknown or nothing is loaded
    fn duration_secs(&self) -> f64;
}

struct LoadedSource {
    path: PathBuf,
    sample_rate: u32,
    transport: Arc<Transport>,
    stream: Box<dyn OutputStream>,
    worker: Option<JoinHandle<()>>,
    playing: bool,
}

pub struct AudioEngine {
    backend: Box<dyn OutputBackend>,
    ring: Arc<Mutex<PcmRing>>,
    // Fixed at construction, so readers can size buffers without the lock
    ring_frames: usize,
    queue_ms: u32,
    source: Option<LoadedSource>,
}

impl AudioEngine {
    /// Engine on the default output device
    pub fn new(settings: &AudioSettings) -> Self {
        Self::with_backend(settings, Box::new(CpalBackend))
    }

    pub fn with_backend(settings: &AudioSettings, backend: Box<dyn OutputBackend>) -> Self {
        let ring = PcmRing::new(settings.viz_ring_frames);
        Self {
            backend,
            ring_frames: ring.capacity(),
            ring: Arc::new(Mutex::new(ring)),
            queue_ms: settings.playback_queue_ms.max(1),
            source: None,
        }
    }

    /// Load a file, replacing any active source.
    ///
    /// The previous source is always torn down first. On failure nothing of
    /// the new source is retained and the engine stays closed. A freshly
    /// loaded source is paused.
    pub fn load(&mut self, path: impl AsRef<Path>) -> AudioResult<()> {
        self.close();

        let path = path.as_ref();
        let decoder = AudioDecoder::open(path).map_err(|e| {
            log::warn!("Failed to open audio file {:?}: {}", path, e);
            e
        })?;

        let sample_rate = decoder.sample_rate();
        let channels = decoder.source_channels();
        let duration = decoder.duration_secs();
        let transport = Arc::new(Transport::new(decoder.total_frames()));

        let (producer, consumer) = HeapRb::<f32>::new(self.queue_capacity(sample_rate)).split();
        let renderer = FrameRenderer::new(consumer, self.ring.clone(), transport.clone());

        let spec = StreamSpec {
            sample_rate,
            channels: OUTPUT_CHANNELS,
        };
        let stream = self.backend.open_stream(spec, renderer).map_err(|e| {
            log::warn!("Failed to open playback device: {}", e);
            e
        })?;

        let worker_transport = transport.clone();
        let worker = thread::Builder::new()
            .name("aurora-decode".to_string())
            .spawn(move || decode_worker(decoder, producer, worker_transport))?;

        self.ring.lock().clear();

        log::info!(
            "Loaded {:?} ({} Hz, {} ch, {:.2} s)",
            path,
            sample_rate,
            channels,
            duration
        );

        self.source = Some(LoadedSource {
            path: path.to_path_buf(),
            sample_rate,
            transport,
            stream,
            worker: Some(worker),
            playing: false,
        });

        Ok(())
    }

    /// Release the device and decoder. Safe to call when already closed.
    pub fn close(&mut self) {
        let Some(source) = self.source.take() else {
            return;
        };

        let LoadedSource {
            path,
            transport,
            stream,
            worker,
            ..
        } = source;

        // Dropping the stream is the point after which no callback runs
        drop(stream);

        transport.request_shutdown();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                log::error!("Decode worker panicked");
            }
        }

        self.ring.lock().clear();
        log::info!("Closed {:?}", path);
    }

    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    pub fn play(&mut self) {
        if let Some(source) = self.source.as_mut() {
            match source.stream.play() {
                Ok(()) => source.playing = true,
                Err(e) => log::warn!("Failed to start playback: {}", e),
            }
        }
    }

    pub fn pause(&mut self) {
        if let Some(source) = self.source.as_mut() {
            match source.stream.pause() {
                Ok(()) => source.playing = false,
                Err(e) => log::warn!("Failed to pause playback: {}", e),
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.source.as_ref().map(|s| s.playing).unwrap_or(false)
    }

    /// Seek to `seconds`, clamped to the stream. The decode worker applies it.
    pub fn seek(&mut self, seconds: f64) {
        let duration = self.duration();
        if let Some(source) = self.source.as_ref() {
            let mut target = seconds.max(0.0);
            if duration > 0.0 {
                target = target.min(duration);
            }
            let frame = (target * source.sample_rate as f64) as u64;
            log::debug!("Seek to {:.2} s (frame {})", target, frame);
            source.transport.request_seek(frame);
        }
    }

    /// Playback position in seconds; 0 when closed
    pub fn current_position(&self) -> f64 {
        match self.source.as_ref() {
            Some(source) => source.transport.position_frames() as f64 / source.sample_rate as f64,
            None => 0.0,
        }
    }

    /// Stream length in seconds; 0 when closed or unknown
    pub fn duration(&self) -> f64 {
        match self.source.as_ref() {
            Some(source) => source.transport.total_frames() as f64 / source.sample_rate as f64,
            None => 0.0,
        }
    }

    /// The decoder hit end of stream and every decoded frame has been played
    pub fn is_finished(&self) -> bool {
        self.source
            .as_ref()
            .map(|s| s.transport.is_drained())
            .unwrap_or(false)
    }

    pub fn sample_rate(&self) -> u32 {
        self.source
            .as_ref()
            .map(|s| s.sample_rate)
            .unwrap_or(FALLBACK_SAMPLE_RATE)
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.source.as_ref().map(|s| s.path.as_path())
    }

    pub fn ring_capacity(&self) -> usize {
        self.ring_frames
    }

    /// Most recent `frame_count` frames as interleaved stereo, oldest first.
    ///
    /// `frame_count` is clamped to the ring capacity. Frames that were never
    /// written read as silence, so the first snapshots after a load start with
    /// leading zeros.
    pub fn pcm_snapshot(&self, frame_count: usize) -> Vec<f32> {
        let mut out = vec![0.0; frame_count.min(self.ring_frames) * 2];
        self.ring.lock().snapshot_into(&mut out);
        out
    }

    /// Non-allocating snapshot for the render loop.
    ///
    /// Returns the frames copied, 0 (with `out` zeroed) when nothing is loaded.
    pub fn pcm_snapshot_into(&self, out: &mut [f32]) -> usize {
        if self.source.is_none() {
            out.fill(0.0);
            return 0;
        }
        self.ring.lock().snapshot_into(out)
    }

    /// Frames mirrored into the ring since the current source was loaded
    pub fn frames_visualized(&self) -> u64 {
        self.ring.lock().frames_written()
    }

    fn queue_capacity(&self, sample_rate: u32) -> usize {
        let samples = sample_rate as u64 * OUTPUT_CHANNELS as u64 * self.queue_ms as u64 / 1000;
        // Even so the queue only ever holds whole frames
        (samples as usize).max(DEFAULT_RING_FRAMES * 2) & !1
    }
}

impl PlaybackClock for AudioEngine {
    fn position_secs(&self) -> f64 {
        self.current_position()
    }

    fn duration_secs(&self) -> f64 {
        self.duration()
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decode ahead of the device, keeping the playback queue topped up.
fn decode_worker(mut decoder: AudioDecoder, mut producer: RingProducer, transport: Arc<Transport>) {
    let mut pending: Vec<f32> = Vec::with_capacity(16 * 1024);
    let mut offset = 0;
    let mut decoded_frames: u64 = 0;

    while !transport.is_shutdown() {
        if let Some(frame) = transport.take_seek_request() {
            let seconds = frame as f64 / decoder.sample_rate().max(1) as f64;
            match decoder.seek(seconds) {
                Ok(reached) => {
                    pending.clear();
                    offset = 0;
                    decoded_frames = reached;
                    transport.begin_flush(reached);
                }
                Err(e) => log::warn!("{}", e),
            }
        }

        // Hold new audio back until the callback has dropped the old queue
        if transport.flush_pending() {
            thread::sleep(Duration::from_millis(1));
            continue;
        }

        if offset >= pending.len() {
            pending.clear();
            offset = 0;

            if transport.is_end_of_stream() {
                // Idle until a seek or shutdown
                thread::sleep(Duration::from_millis(5));
                continue;
            }

            match decoder.decode_next(&mut pending) {
                DecodeStatus::Frames(frames) => decoded_frames += frames as u64,
                DecodeStatus::EndOfStream => {
                    log::debug!("End of stream after {} frames", decoded_frames);
                    transport.mark_end_of_stream(decoded_frames);
                    continue;
                }
            }
        }

        let vacant = producer.vacant_len() & !1;
        let end = (offset + vacant).min(pending.len());
        if end > offset {
            offset += producer.push_slice(&pending[offset..end]);
        } else {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ManualBackend;

    fn engine(ring_frames: usize) -> AudioEngine {
        let settings = AudioSettings {
            viz_ring_frames: ring_frames,
            ..AudioSettings::default()
        };
        AudioEngine::with_backend(&settings, Box::new(ManualBackend::new()))
    }

    #[test]
    fn ring_capacity_is_read_without_the_lock() {
        let engine = engine(1000);
        let _guard = engine.ring.lock();
        // Would deadlock if the capacity went through the ring mutex
        assert_eq!(engine.ring_capacity(), 1024);
    }

    #[test]
    fn snapshot_is_sized_from_the_ring_capacity() {
        let engine = engine(64);
        assert_eq!(engine.pcm_snapshot(16).len(), 32);
        let clamped = engine.pcm_snapshot(10_000);
        assert_eq!(clamped.len(), 128);
        assert!(clamped.iter().all(|&s| s == 0.0));
    }
}
