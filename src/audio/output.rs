// Audio output using cpal
// The realtime callback plays queued frames and mirrors them into the visualization ring

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::pcm_ring::PcmRing;
use super::transport::Transport;
use crate::error::{AudioError, AudioResult};

pub type RingConsumer = ringbuf::HeapCons<f32>;

/// Format requested from an output backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// An opened output stream. Dropping it must stop the callback for good.
pub trait OutputStream {
    fn play(&self) -> AudioResult<()>;
    fn pause(&self) -> AudioResult<()>;
}

/// Opens output streams that drive a [`FrameRenderer`].
pub trait OutputBackend {
    /// Open a paused stream. The renderer must only be invoked from one thread.
    fn open_stream(
        &self,
        spec: StreamSpec,
        renderer: FrameRenderer,
    ) -> AudioResult<Box<dyn OutputStream>>;
}

/// Body of the audio callback.
///
/// Pops decoded stereo frames from the playback queue, writes them to the
/// device buffer and copies the same frames into the visualization ring under
/// its lock. Never allocates or blocks beyond that lock.
pub struct FrameRenderer {
    consumer: RingConsumer,
    ring: Arc<Mutex<PcmRing>>,
    transport: Arc<Transport>,
}

impl FrameRenderer {
    pub fn new(
        consumer: RingConsumer,
        ring: Arc<Mutex<PcmRing>>,
        transport: Arc<Transport>,
    ) -> Self {
        Self {
            consumer,
            ring,
            transport,
        }
    }

    /// Fill an interleaved stereo device buffer; returns the frames played.
    pub fn fill<T: SizedSample + FromSample<f32>>(&mut self, data: &mut [T]) -> usize {
        if self.transport.take_flush() {
            while self.consumer.try_pop().is_some() {}
        }

        let mut played = 0;
        {
            let mut ring = self.ring.lock();
            for out in data.chunks_exact_mut(2) {
                if self.consumer.occupied_len() < 2 {
                    break;
                }
                let left = self.consumer.try_pop().unwrap_or(0.0);
                let right = self.consumer.try_pop().unwrap_or(0.0);
                out[0] = T::from_sample(left);
                out[1] = T::from_sample(right);
                ring.push_frame([left, right]);
                played += 1;
            }
        }

        for sample in data[played * 2..].iter_mut() {
            *sample = T::EQUILIBRIUM;
        }

        if played > 0 {
            self.transport.add_played(played as u64);
        } else if self.transport.is_end_of_stream() && !self.transport.flush_pending() {
            self.transport.mark_drained();
        }

        played
    }
}

/// Default backend: the host's default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

struct CpalStream {
    stream: Stream,
}

impl OutputStream for CpalStream {
    fn play(&self) -> AudioResult<()> {
        self.stream
            .play()
            .map_err(|e| AudioError::Stream(format!("failed to start stream: {}", e)))
    }

    fn pause(&self) -> AudioResult<()> {
        self.stream
            .pause()
            .map_err(|e| AudioError::Stream(format!("failed to pause stream: {}", e)))
    }
}

impl OutputBackend for CpalBackend {
    fn open_stream(
        &self,
        spec: StreamSpec,
        renderer: FrameRenderer,
    ) -> AudioResult<Box<dyn OutputStream>> {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or(AudioError::NoOutputDevice)?;

        let unsupported = AudioError::UnsupportedConfig {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        };
        let candidates: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| AudioError::Stream(format!("failed to query output configs: {}", e)))?
            .filter(|c| {
                c.channels() == spec.channels
                    && c.min_sample_rate().0 <= spec.sample_rate
                    && c.max_sample_rate().0 >= spec.sample_rate
            })
            .collect();

        // Prefer float output so the device gets the decoder's samples untouched
        let sample_format = candidates
            .iter()
            .map(|c| c.sample_format())
            .find(|f| *f == cpal::SampleFormat::F32)
            .or_else(|| candidates.first().map(|c| c.sample_format()))
            .ok_or(unsupported)?;

        let config = StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, renderer)?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, renderer)?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, renderer)?,
            cpal::SampleFormat::I32 => Self::build_stream::<i32>(&device, &config, renderer)?,
            format => {
                return Err(AudioError::Stream(format!(
                    "unsupported sample format: {:?}",
                    format
                )))
            }
        };

        // Some hosts start streams on creation
        stream
            .pause()
            .map_err(|e| AudioError::Stream(format!("failed to pause new stream: {}", e)))?;

        log::debug!(
            "Opened output stream: {} Hz, {} channels, {:?}",
            spec.sample_rate,
            spec.channels,
            sample_format
        );

        Ok(Box::new(CpalStream { stream }))
    }
}

impl CpalBackend {
    fn build_stream<T: SizedSample + FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut renderer: FrameRenderer,
    ) -> AudioResult<Stream> {
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    renderer.fill(data);
                },
                move |err| {
                    log::error!("Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::Stream(format!("failed to build output stream: {}", e)))
    }
}

/// Backend whose callback is driven by hand with [`ManualBackend::pump`].
///
/// Used by headless hosts (offline rendering) and tests. Clones share the
/// same device slot, so a clone kept by the caller can drive a stream the
/// engine opened.
#[derive(Clone, Default)]
pub struct ManualBackend {
    inner: Arc<ManualDevice>,
}

#[derive(Default)]
struct ManualDevice {
    renderer: Mutex<Option<FrameRenderer>>,
    playing: AtomicBool,
    open_streams: AtomicUsize,
    fail_next_open: AtomicBool,
}

struct ManualStream {
    device: Arc<ManualDevice>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open_stream` fail as if the device were busy.
    pub fn fail_next_open(&self) {
        self.inner.fail_next_open.store(true, Ordering::SeqCst);
    }

    /// Streams currently open on this device.
    pub fn open_streams(&self) -> usize {
        self.inner.open_streams.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::SeqCst)
    }

    /// Run one callback of `frames` frames if a stream is open and playing.
    ///
    /// Returns the frames actually played from the queue.
    pub fn pump(&self, frames: usize) -> usize {
        if !self.is_playing() {
            return 0;
        }
        let mut slot = self.inner.renderer.lock();
        match slot.as_mut() {
            Some(renderer) => {
                let mut buffer = vec![0.0f32; frames * 2];
                renderer.fill(&mut buffer)
            }
            None => 0,
        }
    }
}

impl OutputBackend for ManualBackend {
    fn open_stream(
        &self,
        _spec: StreamSpec,
        renderer: FrameRenderer,
    ) -> AudioResult<Box<dyn OutputStream>> {
        if self.inner.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(AudioError::NoOutputDevice);
        }

        let mut slot = self.inner.renderer.lock();
        if slot.is_some() {
            return Err(AudioError::Stream("device busy".to_string()));
        }
        *slot = Some(renderer);
        self.inner.playing.store(false, Ordering::SeqCst);
        self.inner.open_streams.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ManualStream {
            device: self.inner.clone(),
        }))
    }
}

impl OutputStream for ManualStream {
    fn play(&self) -> AudioResult<()> {
        self.device.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) -> AudioResult<()> {
        self.device.playing.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        self.device.playing.store(false, Ordering::SeqCst);
        *self.device.renderer.lock() = None;
        self.device.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Producer, Split};
    use ringbuf::HeapRb;

    fn renderer_with(samples: &[f32]) -> (FrameRenderer, Arc<Mutex<PcmRing>>, Arc<Transport>) {
        let (mut producer, consumer) = HeapRb::<f32>::new(64).split();
        producer.push_slice(samples);
        let ring = Arc::new(Mutex::new(PcmRing::new(8)));
        let transport = Arc::new(Transport::new(Some(100)));
        (
            FrameRenderer::new(consumer, ring.clone(), transport.clone()),
            ring,
            transport,
        )
    }

    #[test]
    fn fill_plays_and_mirrors_whole_frames() {
        let (mut renderer, ring, transport) = renderer_with(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);

        let mut out = [0.0f32; 8];
        assert_eq!(renderer.fill(&mut out), 3);
        assert_eq!(out, [0.1, -0.1, 0.2, -0.2, 0.3, -0.3, 0.0, 0.0]);
        assert_eq!(transport.played_frames(), 3);

        let mut snapshot = [0.0f32; 6];
        ring.lock().snapshot_into(&mut snapshot);
        assert_eq!(snapshot, [0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);
    }

    #[test]
    fn underrun_writes_silence_without_touching_ring() {
        let (mut renderer, ring, _transport) = renderer_with(&[]);

        let mut out = [1i16; 4];
        assert_eq!(renderer.fill(&mut out), 0);
        assert_eq!(out, [0; 4]);
        assert_eq!(ring.lock().frames_written(), 0);
    }

    #[test]
    fn empty_queue_after_end_of_stream_marks_drained() {
        let (mut renderer, _ring, transport) = renderer_with(&[0.5, 0.5]);
        transport.mark_end_of_stream(1);

        let mut out = [0.0f32; 4];
        renderer.fill(&mut out);
        assert!(!transport.is_drained());
        renderer.fill(&mut out);
        assert!(transport.is_drained());
    }

    #[test]
    fn flush_discards_queued_audio() {
        let (mut renderer, _ring, transport) = renderer_with(&[0.5, 0.5, 0.5, 0.5]);
        transport.begin_flush(40);

        let mut out = [0.0f32; 4];
        assert_eq!(renderer.fill(&mut out), 0);
        assert_eq!(transport.played_frames(), 40);
    }

    #[test]
    fn seek_after_end_of_stream_is_not_reported_finished() {
        let (mut renderer, _ring, transport) = renderer_with(&[]);
        transport.mark_end_of_stream(100);
        transport.begin_flush(10);
        transport.mark_drained();

        let mut out = [0.0f32; 4];
        assert_eq!(renderer.fill(&mut out), 0);
        assert!(!transport.is_drained());
        assert_eq!(transport.position_frames(), 10);
    }

    #[test]
    fn manual_backend_refuses_second_stream() {
        let backend = ManualBackend::new();
        let (first, _, _) = renderer_with(&[]);
        let (second, _, _) = renderer_with(&[]);
        let spec = StreamSpec {
            sample_rate: 44100,
            channels: 2,
        };

        let stream = backend.open_stream(spec, first).unwrap();
        assert!(backend.open_stream(spec, second).is_err());
        assert_eq!(backend.open_streams(), 1);

        drop(stream);
        assert_eq!(backend.open_streams(), 0);
    }
}
