// Engine configuration
// One immutable value built by the host and handed to each component at construction
use serde::{Deserialize, Serialize};

use crate::audio::pcm_ring::DEFAULT_RING_FRAMES;
use crate::overlay::geometry::Rgba;

/// Title overlay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleSettings {
    pub font_size: u32,
    pub line_length_target: usize,
    pub color: Rgba,
    /// Credited under the title unless the title already names them
    pub artist: Option<String>,
}

impl Default for TitleSettings {
    fn default() -> Self {
        Self {
            font_size: 48,
            line_length_target: 20,
            color: Rgba::WHITE,
            artist: None,
        }
    }
}

/// Lyrics overlay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsSettings {
    pub line_length_target: usize,
}

impl Default for LyricsSettings {
    fn default() -> Self {
        Self {
            line_length_target: 40,
        }
    }
}

/// Title animation timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    pub fade_duration: f32,   // seconds
    pub bounce_duration: f32, // seconds
    pub target_alpha: f32,    // 0-1
    pub tick_interval_ms: u64,
    pub speed_px_per_tick: f32,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            fade_duration: 3.0,
            bounce_duration: 10.0,
            target_alpha: 0.4,
            tick_interval_ms: 16,
            speed_px_per_tick: 2.0,
        }
    }
}

impl AnimationSettings {
    /// Animator time advanced per tick, in seconds
    pub fn tick_secs(&self) -> f32 {
        self.tick_interval_ms as f32 / 1000.0
    }
}

/// Render loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub pcm_snapshot_frames: usize,
    /// Height reserved at the top of the window (menu bar etc.)
    pub top_chrome_height: f32,
    /// Keep the visualizer's default preset instead of shuffling on song start
    pub use_default_preset: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            pcm_snapshot_frames: 512,
            top_chrome_height: 0.0,
            use_default_preset: false,
        }
    }
}

/// Audio engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub viz_ring_frames: usize,
    pub playback_queue_ms: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            viz_ring_frames: DEFAULT_RING_FRAMES,
            playback_queue_ms: 250,
        }
    }
}

/// Complete configuration surface of the engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub title: TitleSettings,
    pub lyrics: LyricsSettings,
    pub animation: AnimationSettings,
    pub render: RenderSettings,
    pub audio: AudioSettings,
}

impl OverlayConfig {
    /// Clamp every value into its usable range.
    ///
    /// Degenerate timings (zero durations) are kept; the animator treats them
    /// as phases that are already over.
    pub fn validated(mut self) -> Self {
        let non_negative = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };

        self.title.font_size = self.title.font_size.max(1);
        self.title.line_length_target = self.title.line_length_target.max(1);
        self.title.color = self.title.color.clamped();
        if let Some(artist) = &self.title.artist {
            if artist.trim().is_empty() {
                self.title.artist = None;
            }
        }

        self.lyrics.line_length_target = self.lyrics.line_length_target.max(1);

        self.animation.fade_duration = non_negative(self.animation.fade_duration);
        self.animation.bounce_duration = non_negative(self.animation.bounce_duration);
        self.animation.target_alpha = if self.animation.target_alpha.is_finite() {
            self.animation.target_alpha.clamp(0.0, 1.0)
        } else {
            AnimationSettings::default().target_alpha
        };
        self.animation.tick_interval_ms = self.animation.tick_interval_ms.max(1);
        self.animation.speed_px_per_tick = non_negative(self.animation.speed_px_per_tick);

        self.render.pcm_snapshot_frames = self.render.pcm_snapshot_frames.max(1);
        self.render.top_chrome_height = non_negative(self.render.top_chrome_height);

        self.audio.viz_ring_frames = self.audio.viz_ring_frames.max(1).next_power_of_two();
        self.audio.playback_queue_ms = self.audio.playback_queue_ms.max(1);

        if self.render.pcm_snapshot_frames > self.audio.viz_ring_frames {
            log::warn!(
                "[Settings] Snapshot of {} frames exceeds ring of {}, clamping",
                self.render.pcm_snapshot_frames,
                self.audio.viz_ring_frames
            );
            self.render.pcm_snapshot_frames = self.audio.viz_ring_frames;
        }

        self
    }
}
