// Transport state shared by the engine, the decode worker and the audio callback
// Everything here is a lock-free scalar so the render thread can poll it every tick

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const NO_SEEK: u64 = u64::MAX;

#[derive(Debug)]
pub struct Transport {
    /// Frames handed to the device since load (rebased on seek)
    played_frames: AtomicU64,
    /// Stream length in frames, 0 while unknown
    total_frames: AtomicU64,
    /// Pending seek target in frames
    seek_request: AtomicU64,
    /// Frame position the callback rebases to after a flush
    seek_base: AtomicU64,
    /// Set by the worker after a seek; the callback drops queued audio once
    flush_pending: AtomicBool,
    /// Decoder ran out of packets and everything decoded was queued
    end_of_stream: AtomicBool,
    /// End of stream reached and the queue has been played out
    drained: AtomicBool,
    shutdown: AtomicBool,
}

impl Transport {
    pub fn new(total_frames: Option<u64>) -> Self {
        Self {
            played_frames: AtomicU64::new(0),
            total_frames: AtomicU64::new(total_frames.unwrap_or(0)),
            seek_request: AtomicU64::new(NO_SEEK),
            seek_base: AtomicU64::new(0),
            flush_pending: AtomicBool::new(false),
            end_of_stream: AtomicBool::new(false),
            drained: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn played_frames(&self) -> u64 {
        self.played_frames.load(Ordering::Acquire)
    }

    pub fn add_played(&self, frames: u64) {
        self.played_frames.fetch_add(frames, Ordering::AcqRel);
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames.load(Ordering::Acquire)
    }

    /// Position in frames, clamped to the stream length and pinned to it once drained.
    pub fn position_frames(&self) -> u64 {
        let total = self.total_frames();
        if total == 0 {
            return self.played_frames();
        }
        if self.is_drained() {
            return total;
        }
        self.played_frames().min(total)
    }

    pub fn request_seek(&self, frame: u64) {
        self.seek_request.store(frame.min(NO_SEEK - 1), Ordering::Release);
    }

    pub fn take_seek_request(&self) -> Option<u64> {
        match self.seek_request.swap(NO_SEEK, Ordering::AcqRel) {
            NO_SEEK => None,
            frame => Some(frame),
        }
    }

    /// Worker side of a seek: rebase the position and ask the callback to flush.
    ///
    /// `flush_pending` is published last so the callback that takes the flush
    /// sees the new base and a cleared end-of-stream flag.
    pub fn begin_flush(&self, base_frame: u64) {
        self.end_of_stream.store(false, Ordering::Release);
        self.drained.store(false, Ordering::Release);
        self.seek_base.store(base_frame, Ordering::Release);
        self.played_frames.store(base_frame, Ordering::Release);
        self.flush_pending.store(true, Ordering::Release);
    }

    pub fn flush_pending(&self) -> bool {
        self.flush_pending.load(Ordering::Acquire)
    }

    /// Callback side of a seek; returns true if a flush was pending.
    ///
    /// Also drops a `drained` mark left by a callback that raced the seek.
    pub fn take_flush(&self) -> bool {
        if self.flush_pending.swap(false, Ordering::AcqRel) {
            self.drained.store(false, Ordering::Release);
            self.played_frames
                .store(self.seek_base.load(Ordering::Acquire), Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Called once everything decoded has been queued.
    pub fn mark_end_of_stream(&self, decoded_frames: u64) {
        // A stream without a reported length learns it here
        let _ = self.total_frames.compare_exchange(
            0,
            decoded_frames,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.end_of_stream.store(true, Ordering::Release);
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream.load(Ordering::Acquire)
    }

    pub fn mark_drained(&self) {
        self.drained.store(true, Ordering::Release);
    }

    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
