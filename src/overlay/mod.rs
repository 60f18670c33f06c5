// Text overlays drawn over the visualizer
pub mod animator;
pub mod geometry;
pub mod lyrics;
pub mod title;
pub mod wrap;

pub use animator::{AnimationPhase, TitleAnimator, TitleFrame};
pub use geometry::{MonospaceMeasurer, Rgba, TextBounds, TextMeasurer, Vec2};
pub use lyrics::{LyricLine, LyricsTrack};
pub use title::{compose_title, title_from_path};
pub use wrap::{wrap_paragraphs, wrap_words};
