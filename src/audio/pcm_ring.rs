// Visualization ring buffer
// Holds the most recent interleaved stereo frames played by the output callback

/// One left/right sample pair.
pub type StereoFrame = [f32; 2];

pub const DEFAULT_RING_FRAMES: usize = 1024;

/// Fixed-capacity circular store of stereo frames.
///
/// The buffer starts zeroed and overwrites its oldest frame on every write
/// once full. It does no locking itself; the engine wraps it in a single
/// `parking_lot::Mutex` shared by the audio callback and snapshot readers.
pub struct PcmRing {
    frames: Vec<StereoFrame>,
    /// Index of the next frame slot to be written.
    write_pos: usize,
    /// Total frames written since creation or the last `clear`.
    written: u64,
}

impl PcmRing {
    /// Create a ring holding `capacity` frames, rounded up to a power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            frames: vec![[0.0; 2]; capacity],
            write_pos: 0,
            written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Total frames ever written; may exceed the capacity.
    pub fn frames_written(&self) -> u64 {
        self.written
    }

    /// Write a single frame, overwriting the oldest one.
    #[inline]
    pub fn push_frame(&mut self, frame: StereoFrame) {
        self.frames[self.write_pos] = frame;
        self.write_pos = (self.write_pos + 1) & (self.frames.len() - 1);
        self.written += 1;
    }

    /// Write interleaved stereo samples. A trailing half frame is ignored.
    pub fn write_interleaved(&mut self, samples: &[f32]) {
        for pair in samples.chunks_exact(2) {
            self.push_frame([pair[0], pair[1]]);
        }
    }

    /// Copy the most recent frames into `out` (interleaved, oldest first).
    ///
    /// `out.len() / 2` frames are requested, clamped to the capacity; the
    /// number of frames copied is returned. Slots that were never written
    /// read back as silence.
    pub fn snapshot_into(&self, out: &mut [f32]) -> usize {
        let capacity = self.frames.len();
        let count = (out.len() / 2).min(capacity);
        let mask = capacity - 1;

        // Oldest frame of the window sits `count` slots behind the cursor
        let start = (self.write_pos + capacity - count) & mask;
        for i in 0..count {
            let frame = self.frames[(start + i) & mask];
            out[i * 2] = frame[0];
            out[i * 2 + 1] = frame[1];
        }

        count
    }

    /// Zero every slot and rewind the cursor.
    pub fn clear(&mut self) {
        self.frames.fill([0.0; 2]);
        self.write_pos = 0;
        self.written = 0;
    }
}

impl Default for PcmRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(from: usize, count: usize) -> Vec<f32> {
        (from..from + count)
            .flat_map(|i| [i as f32, -(i as f32)])
            .collect()
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        assert_eq!(PcmRing::new(1000).capacity(), 1024);
        assert_eq!(PcmRing::new(1024).capacity(), 1024);
        assert_eq!(PcmRing::new(0).capacity(), 1);
    }

    #[test]
    fn snapshot_returns_recent_frames_oldest_first() {
        let mut ring = PcmRing::new(16);
        ring.write_interleaved(&ramp(0, 10));

        let mut out = vec![0.0; 4 * 2];
        assert_eq!(ring.snapshot_into(&mut out), 4);
        assert_eq!(out, ramp(6, 4));
    }

    #[test]
    fn wraparound_keeps_only_last_capacity_frames() {
        let mut ring = PcmRing::new(8);
        ring.write_interleaved(&ramp(0, 16));

        let mut out = vec![0.0; 8 * 2];
        ring.snapshot_into(&mut out);
        assert_eq!(out, ramp(8, 8));
        assert_eq!(ring.frames_written(), 16);
    }

    #[test]
    fn wraparound_with_cursor_mid_buffer() {
        let mut ring = PcmRing::new(8);
        // 2 * capacity + 3 so the wrap boundary falls inside the window
        ring.write_interleaved(&ramp(0, 19));

        let mut out = vec![0.0; 8 * 2];
        ring.snapshot_into(&mut out);
        assert_eq!(out, ramp(11, 8));

        let mut tail = vec![0.0; 5 * 2];
        ring.snapshot_into(&mut tail);
        assert_eq!(tail, ramp(14, 5));
    }

    #[test]
    fn unwritten_frames_read_as_leading_silence() {
        let mut ring = PcmRing::new(8);
        ring.write_interleaved(&ramp(1, 3));

        let mut out = vec![9.0; 5 * 2];
        ring.snapshot_into(&mut out);
        assert_eq!(&out[..4], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&out[4..], ramp(1, 3).as_slice());
    }

    #[test]
    fn oversized_request_is_clamped() {
        let mut ring = PcmRing::new(4);
        ring.write_interleaved(&ramp(0, 4));

        let mut out = vec![7.0; 6 * 2];
        assert_eq!(ring.snapshot_into(&mut out), 4);
        assert_eq!(&out[..8], ramp(0, 4).as_slice());
        // Tail beyond the capacity is left untouched
        assert_eq!(&out[8..], &[7.0; 4]);
    }

    #[test]
    fn clear_zeroes_content() {
        let mut ring = PcmRing::new(4);
        ring.write_interleaved(&ramp(1, 4));
        ring.clear();

        let mut out = vec![1.0; 4 * 2];
        ring.snapshot_into(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(ring.frames_written(), 0);
    }
}
