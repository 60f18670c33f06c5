// Aurora Overlay - audio-reactive visual overlay engine
// Module declarations
pub mod audio;
pub mod error;
pub mod overlay;
pub mod queue;
pub mod render;
pub mod settings;

pub use audio::{AudioEngine, CpalBackend, ManualBackend, PlaybackClock};
pub use error::{AudioError, AudioResult};
pub use overlay::{AnimationPhase, LyricLine, TextMeasurer, TitleAnimator, TitleFrame};
pub use queue::PlayQueue;
pub use render::{FrameLoop, OverlayFrame, Visualizer};
pub use settings::OverlayConfig;

/// Install `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
