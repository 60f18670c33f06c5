// Song title animator
// Time-driven state machine moving, scaling and fading the title block

use rand::Rng;
use std::f32::consts::TAU;

use super::geometry::{Rgba, TextBounds, TextMeasurer, Vec2};
use super::wrap::wrap_paragraphs;
use crate::audio::PlaybackClock;
use crate::settings::{AnimationSettings, OverlayConfig};

const BREATH_AMPLITUDE: f32 = 0.025;
const BREATH_RATE: f32 = 2.0; // rad/s of animator time

/// Phase of the title animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationPhase {
    Hidden,
    FadeIn,
    Bouncing,
    FadeToTransparent,
    FadeToOpaque,
    /// Gliding back to the center, starting from `from`
    ReturnToCenter { from: Vec2 },
}

/// What the text renderer needs to draw the title for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitleFrame<'a> {
    pub text: &'a str,
    /// Top-left corner inside the drawable area
    pub position: Vec2,
    pub scale: f32,
    pub color: Rgba,
    pub phase: AnimationPhase,
}

pub struct TitleAnimator {
    settings: AnimationSettings,
    color: Rgba,
    line_length_target: usize,
    top_chrome_height: f32,

    phase: AnimationPhase,
    wrapped: String,
    bounds: TextBounds,
    position: Vec2,
    velocity: Vec2,
    scale: f32,
    final_scale: f32,
    alpha: f32,
    elapsed: f32,
    area: Vec2,

    song_duration: f64,
    /// Playback time at which the title first started fading out
    fade_out_started: Option<f64>,
    /// Alpha when the late-song fade back to opaque began
    fade_back_from: f32,
}

impl TitleAnimator {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            settings: config.animation.clone(),
            color: config.title.color,
            line_length_target: config.title.line_length_target,
            top_chrome_height: config.render.top_chrome_height,
            phase: AnimationPhase::Hidden,
            wrapped: String::new(),
            bounds: TextBounds::default(),
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            scale: 1.0,
            final_scale: 1.0,
            alpha: 0.0,
            elapsed: 0.0,
            area: Vec2::new(800.0, 600.0),
            song_duration: 0.0,
            fade_out_started: None,
            fade_back_from: 0.0,
        }
    }

    /// Begin animating toward the end of the song reported by `clock`.
    ///
    /// The song duration is read once here. The title starts centered and
    /// heads off in a random direction.
    pub fn start(
        &mut self,
        screen_width: f32,
        screen_height: f32,
        measurer: &dyn TextMeasurer,
        clock: &dyn PlaybackClock,
    ) {
        let heading = random_heading(&mut rand::thread_rng());
        self.start_with_heading(screen_width, screen_height, measurer, clock, heading);
    }

    /// [`start`](Self::start) with a caller-chosen direction of travel.
    pub fn start_with_heading(
        &mut self,
        screen_width: f32,
        screen_height: f32,
        measurer: &dyn TextMeasurer,
        clock: &dyn PlaybackClock,
        heading: Vec2,
    ) {
        self.song_duration = clock.duration_secs().max(0.0);
        self.set_screen_size(screen_width, screen_height);
        self.bounds = measurer.measure(&self.wrapped, self.scale);

        self.elapsed = 0.0;
        self.final_scale = self.scale;
        self.alpha = 0.0;
        self.fade_out_started = None;
        self.position = self.center();
        self.velocity = heading.normalized() * self.settings.speed_px_per_tick;

        log::debug!(
            "Title animation started: duration {:.2} s, bounds {:?}",
            self.song_duration,
            self.bounds
        );
        self.set_phase(AnimationPhase::FadeIn);
    }

    /// Replace the title text; it is wrapped and measured again.
    pub fn set_text(&mut self, text: &str, measurer: &dyn TextMeasurer) {
        self.wrapped = wrap_paragraphs(text, self.line_length_target);
        self.bounds = measurer.measure(&self.wrapped, self.scale);
    }

    /// Update the bounds used for bouncing; position and velocity are kept.
    pub fn set_screen_size(&mut self, width: f32, height: f32) {
        self.area = Vec2::new(
            width.max(0.0),
            (height - self.top_chrome_height).max(0.0),
        );
    }

    /// Advance one tick against the current playback time.
    pub fn tick(&mut self, clock: &dyn PlaybackClock) {
        if self.phase == AnimationPhase::Hidden {
            return;
        }

        let now = clock.position_secs();
        let remaining = self.song_duration - now;
        let fade = self.settings.fade_duration as f64;
        let bounce = self.settings.bounce_duration as f64;
        let full = self.color.a;
        let target = self.settings.target_alpha;

        self.elapsed += self.settings.tick_secs();
        let breath = 1.0 + (self.elapsed * BREATH_RATE).sin() * BREATH_AMPLITUDE;
        self.final_scale = self.scale * breath;

        match self.phase {
            AnimationPhase::Hidden => {}

            AnimationPhase::FadeIn => {
                self.advance_motion();
                if remaining <= 0.0 {
                    self.alpha = full;
                    self.enter_return();
                } else if now > fade {
                    self.alpha = full;
                    self.set_phase(AnimationPhase::Bouncing);
                } else {
                    self.alpha = full * progress(now, fade);
                }
            }

            AnimationPhase::Bouncing => {
                self.advance_motion();
                if remaining <= 0.0 {
                    self.enter_return();
                } else if now > bounce {
                    self.fade_out_started.get_or_insert(now);
                    self.set_phase(AnimationPhase::FadeToTransparent);
                }
            }

            AnimationPhase::FadeToTransparent => {
                self.advance_motion();
                let started = *self.fade_out_started.get_or_insert(now);
                let in_state = now - started;
                if in_state <= fade {
                    self.alpha = full - (full - target) * progress(in_state, fade);
                } else {
                    self.alpha = target;
                    self.set_phase(AnimationPhase::Bouncing);
                }
                // Late-song override applies whatever the fade is doing
                if remaining <= fade + bounce {
                    self.fade_back_from = self.alpha;
                    self.set_phase(AnimationPhase::FadeToOpaque);
                }
            }

            AnimationPhase::FadeToOpaque => {
                self.advance_motion();
                let until_end_fade = remaining - fade;
                if until_end_fade <= 0.0 {
                    self.alpha = full;
                    self.enter_return();
                } else {
                    let p = if fade > 0.0 {
                        (1.0 - until_end_fade / fade).clamp(0.0, 1.0) as f32
                    } else {
                        1.0
                    };
                    self.alpha = self.fade_back_from + (full - self.fade_back_from) * p;
                }
            }

            AnimationPhase::ReturnToCenter { from } => {
                let center = self.center();
                if remaining <= 0.0 {
                    self.position = center;
                    self.alpha = 0.0;
                    self.set_phase(AnimationPhase::Hidden);
                } else {
                    let t = if fade > 0.0 {
                        (1.0 - remaining / fade).clamp(0.0, 1.0) as f32
                    } else {
                        1.0
                    };
                    self.position = from.lerp(center, t);
                    self.clamp_to_area();
                }
            }
        }
    }

    pub fn phase(&self) -> AnimationPhase {
        self.phase
    }

    /// False once the animation has finished (or never started)
    pub fn is_active(&self) -> bool {
        self.phase != AnimationPhase::Hidden
    }

    pub fn text(&self) -> &str {
        &self.wrapped
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Render scale including the breathing oscillation
    pub fn scale(&self) -> f32 {
        self.final_scale
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn color(&self) -> Rgba {
        self.color.with_alpha(self.alpha)
    }

    /// Size of the title at its current render scale
    pub fn text_size(&self) -> TextBounds {
        self.bounds.scaled(self.final_scale)
    }

    /// Drawable area (width, height below the top chrome)
    pub fn area(&self) -> Vec2 {
        self.area
    }

    pub fn song_duration(&self) -> f64 {
        self.song_duration
    }

    pub fn frame(&self) -> TitleFrame<'_> {
        TitleFrame {
            text: &self.wrapped,
            position: self.position,
            scale: self.final_scale,
            color: self.color(),
            phase: self.phase,
        }
    }

    fn set_phase(&mut self, phase: AnimationPhase) {
        if phase != self.phase {
            log::debug!("Title phase {:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;
    }

    fn enter_return(&mut self) {
        let from = self.position;
        self.set_phase(AnimationPhase::ReturnToCenter { from });
    }

    fn center(&self) -> Vec2 {
        let size = self.text_size();
        Vec2::new(
            ((self.area.x - size.width) / 2.0).max(0.0),
            ((self.area.y - size.height) / 2.0).max(0.0),
        )
    }

    /// Move one step and bounce off whichever edges the box would cross.
    fn advance_motion(&mut self) {
        self.position += self.velocity;

        let (max_x, max_y) = self.max_position();
        if self.position.x < 0.0 {
            self.velocity.x = self.velocity.x.abs();
            self.position.x = 0.0;
        } else if self.position.x > max_x {
            self.velocity.x = -self.velocity.x.abs();
            self.position.x = max_x;
        }

        if self.position.y < 0.0 {
            self.velocity.y = self.velocity.y.abs();
            self.position.y = 0.0;
        } else if self.position.y > max_y {
            self.velocity.y = -self.velocity.y.abs();
            self.position.y = max_y;
        }
    }

    fn clamp_to_area(&mut self) {
        let (max_x, max_y) = self.max_position();
        self.position.x = self.position.x.clamp(0.0, max_x);
        self.position.y = self.position.y.clamp(0.0, max_y);
    }

    fn max_position(&self) -> (f32, f32) {
        let size = self.text_size();
        (
            (self.area.x - size.width).max(0.0),
            (self.area.y - size.height).max(0.0),
        )
    }
}

/// Fraction of `span` covered by `elapsed`; a zero-length span is already complete.
fn progress(elapsed: f64, span: f64) -> f32 {
    if span <= 0.0 {
        1.0
    } else {
        (elapsed / span).clamp(0.0, 1.0) as f32
    }
}

fn random_heading<R: Rng>(rng: &mut R) -> Vec2 {
    let angle: f32 = rng.gen_range(0.0..TAU);
    Vec2::new(angle.cos(), angle.sin())
}
