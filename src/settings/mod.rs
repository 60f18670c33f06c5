// Configuration module
// Immutable settings passed into each component

pub mod settings;

pub use settings::{
    AnimationSettings, AudioSettings, LyricsSettings, OverlayConfig, RenderSettings, TitleSettings,
};
