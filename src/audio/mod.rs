// Audio playback module
// Uses Symphonia for decoding and cpal for output

pub mod decoder;
pub mod engine;
pub mod output;
pub mod pcm_ring;
pub mod transport;

pub use engine::{AudioEngine, PlaybackClock};
pub use output::{CpalBackend, ManualBackend, OutputBackend, OutputStream, StreamSpec};
pub use pcm_ring::{PcmRing, StereoFrame};
