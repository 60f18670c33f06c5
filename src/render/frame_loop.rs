// Render coordinator
// Drives one overlay frame per tick: PCM snapshot -> visualizer -> title and lyrics

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use super::presets::{random_preset, PresetHistory, Visualizer};
use crate::audio::AudioEngine;
use crate::error::AudioResult;
use crate::overlay::{
    compose_title, title_from_path, LyricLine, LyricsTrack, TextMeasurer, TitleAnimator,
    TitleFrame,
};
use crate::queue::PlayQueue;
use crate::settings::OverlayConfig;

/// Everything the text-drawing collaborator needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayFrame<'a> {
    /// Present once a song has been loaded
    pub title: Option<TitleFrame<'a>>,
    /// Wrapped active lyric line, empty when none
    pub lyrics: &'a str,
}

pub struct FrameLoop {
    config: OverlayConfig,
    engine: AudioEngine,
    visualizer: Box<dyn Visualizer>,
    measurer: Box<dyn TextMeasurer>,
    animator: TitleAnimator,
    lyrics: LyricsTrack,
    queue: PlayQueue,
    history: PresetHistory,
    pcm: Vec<f32>,
    screen_width: f32,
    screen_height: f32,
    song_started: bool,
    // Set on the first tick with real audio after a load
    audio_flowing: bool,
}

impl FrameLoop {
    pub fn new(
        config: OverlayConfig,
        engine: AudioEngine,
        visualizer: Box<dyn Visualizer>,
        measurer: Box<dyn TextMeasurer>,
        screen_width: f32,
        screen_height: f32,
    ) -> Self {
        let config = config.validated();
        let mut animator = TitleAnimator::new(&config);
        animator.set_screen_size(screen_width, screen_height);

        Self {
            pcm: vec![0.0; config.render.pcm_snapshot_frames * 2],
            lyrics: LyricsTrack::new(config.lyrics.line_length_target),
            animator,
            config,
            engine,
            visualizer,
            measurer,
            queue: PlayQueue::new(),
            history: PresetHistory::default(),
            screen_width,
            screen_height,
            song_started: false,
            audio_flowing: false,
        }
    }

    /// Frame loop playing through the default output device.
    pub fn with_default_device(
        config: OverlayConfig,
        visualizer: Box<dyn Visualizer>,
        measurer: Box<dyn TextMeasurer>,
        screen_width: f32,
        screen_height: f32,
    ) -> Self {
        let engine = AudioEngine::new(&config.audio);
        Self::new(config, engine, visualizer, measurer, screen_width, screen_height)
    }

    /// Produce one frame.
    ///
    /// The snapshot feeds the visualizer before it renders, and the overlay
    /// is advanced after it so text is drawn on top.
    pub fn tick(&mut self) -> OverlayFrame<'_> {
        let frames = self.engine.pcm_snapshot_into(&mut self.pcm);
        if frames > 0 && self.engine.frames_visualized() > 0 {
            if !self.audio_flowing {
                self.audio_flowing = true;
                if !self.config.render.use_default_preset {
                    self.shuffle_preset();
                }
            }
            self.visualizer.add_pcm(&self.pcm[..frames * 2]);
        }
        self.visualizer.render_frame();

        if self.song_started {
            self.animator.tick(&self.engine);
        }
        self.lyrics
            .update(self.engine.current_position(), self.engine.is_playing());

        OverlayFrame {
            title: self.song_started.then(|| self.animator.frame()),
            lyrics: self.lyrics.current_text(),
        }
    }

    /// Load `path` and start its title animation. The new track starts paused.
    pub fn load_track(&mut self, path: &Path) -> AudioResult<()> {
        self.reset();
        self.engine.load(path)?;

        let title = compose_title(&title_from_path(path), self.config.title.artist.as_deref());
        self.animator.set_text(&title, &*self.measurer);
        self.animator.start(
            self.screen_width,
            self.screen_height,
            &*self.measurer,
            &self.engine,
        );
        self.song_started = true;
        Ok(())
    }

    /// Close the current track and hide the overlay.
    pub fn reset(&mut self) {
        self.engine.close();
        self.lyrics.clear();
        self.animator = TitleAnimator::new(&self.config);
        self.animator
            .set_screen_size(self.screen_width, self.screen_height);
        self.song_started = false;
        self.audio_flowing = false;
    }

    /// Remember the current preset and jump to a random one.
    pub fn next_preset(&mut self) {
        if let Some(current) = self.visualizer.selected_preset() {
            self.history.push(current);
        }
        self.shuffle_preset();
    }

    /// Go back to the last preset left with [`next_preset`](Self::next_preset).
    pub fn previous_preset(&mut self) -> bool {
        match self.history.pop() {
            Some(index) => {
                log::debug!("Returning to preset {}", index);
                self.visualizer.select_preset(index);
                true
            }
            None => false,
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.screen_width = width;
        self.screen_height = height;
        self.animator.set_screen_size(width, height);
        self.visualizer.resize(width as u32, height as u32);
    }

    pub fn set_lyrics(&mut self, lines: Vec<LyricLine>) {
        self.lyrics.set_lines(lines);
    }

    pub fn clear_lyrics(&mut self) {
        self.lyrics.clear();
    }

    /// Advance the queue once the current track has played out.
    ///
    /// Returns true when another track was started.
    pub fn song_finished(&mut self) -> Result<bool> {
        if !self.engine.is_finished() || self.queue.is_empty() {
            return Ok(false);
        }
        log::info!("Track finished, advancing queue");
        self.play_next()?;
        Ok(true)
    }

    pub fn play_next(&mut self) -> Result<()> {
        match self.queue.next().map(Path::to_path_buf) {
            Some(path) => self.switch_track(path),
            None => Ok(()),
        }
    }

    pub fn play_previous(&mut self) -> Result<()> {
        match self.queue.previous().map(Path::to_path_buf) {
            Some(path) => self.switch_track(path),
            None => Ok(()),
        }
    }

    /// Pause if playing, otherwise play (loading the first queued track if needed).
    pub fn toggle_playback(&mut self) -> Result<()> {
        if self.engine.is_playing() {
            self.engine.pause();
            return Ok(());
        }
        if self.queue.current().is_none() && !self.queue.is_empty() {
            self.play_next()?;
        }
        self.engine.play();
        Ok(())
    }

    /// Tick at the configured rate until `shutdown` fires or its sender is dropped.
    ///
    /// `on_frame` receives every frame for drawing. The engine is not `Send`,
    /// so drive this with `block_on` or inside a `LocalSet`.
    pub async fn run<F>(&mut self, mut on_frame: F, mut shutdown: oneshot::Receiver<()>)
    where
        F: FnMut(&OverlayFrame<'_>),
    {
        let period = Duration::from_millis(self.config.animation.tick_interval_ms);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log::info!("Frame loop running every {:?}", period);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    if let Err(e) = self.song_finished() {
                        log::warn!("Failed to advance queue: {:#}", e);
                    }
                    let frame = self.tick();
                    on_frame(&frame);
                }
            }
        }

        log::info!("Frame loop stopped");
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AudioEngine {
        &mut self.engine
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut PlayQueue {
        &mut self.queue
    }

    pub fn animator(&self) -> &TitleAnimator {
        &self.animator
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    fn switch_track(&mut self, path: PathBuf) -> Result<()> {
        let was_playing = self.engine.is_playing();
        self.load_track(&path)
            .with_context(|| format!("could not load {}", path.display()))?;
        if was_playing {
            self.engine.play();
        }
        Ok(())
    }

    fn shuffle_preset(&mut self) {
        let count = self.visualizer.preset_count();
        let current = self.visualizer.selected_preset();
        if let Some(index) = random_preset(&mut rand::thread_rng(), count, current) {
            log::debug!("Selecting preset {} of {}", index, count);
            self.visualizer.select_preset(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ManualBackend;
    use crate::overlay::MonospaceMeasurer;
    use crate::settings::AudioSettings;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Calls {
        pcm_batches: usize,
        frames_rendered: usize,
        size: Option<(u32, u32)>,
    }

    struct FakeVisualizer {
        calls: Rc<RefCell<Calls>>,
        presets: usize,
        selected: Option<usize>,
    }

    impl Visualizer for FakeVisualizer {
        fn add_pcm(&mut self, _interleaved: &[f32]) {
            self.calls.borrow_mut().pcm_batches += 1;
        }
        fn render_frame(&mut self) {
            self.calls.borrow_mut().frames_rendered += 1;
        }
        fn resize(&mut self, width: u32, height: u32) {
            self.calls.borrow_mut().size = Some((width, height));
        }
        fn preset_count(&self) -> usize {
            self.presets
        }
        fn selected_preset(&self) -> Option<usize> {
            self.selected
        }
        fn select_preset(&mut self, index: usize) {
            self.selected = Some(index);
        }
    }

    fn frame_loop() -> (FrameLoop, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let visualizer = FakeVisualizer {
            calls: calls.clone(),
            presets: 8,
            selected: Some(0),
        };
        let config = OverlayConfig::default();
        let backend = Box::new(ManualBackend::new());
        let engine = AudioEngine::with_backend(&AudioSettings::default(), backend);
        let measurer = MonospaceMeasurer {
            char_width: 10.0,
            line_height: 20.0,
        };
        let frame_loop = FrameLoop::new(
            config,
            engine,
            Box::new(visualizer),
            Box::new(measurer),
            1280.0,
            720.0,
        );
        (frame_loop, calls)
    }

    #[test]
    fn idle_tick_renders_without_audio_or_title() {
        let (mut frame_loop, calls) = frame_loop();
        let frame = frame_loop.tick();
        assert_eq!(frame.title, None);
        assert_eq!(frame.lyrics, "");

        let calls = calls.borrow();
        assert_eq!(calls.frames_rendered, 1);
        assert_eq!(calls.pcm_batches, 0);
    }

    #[test]
    fn preset_history_round_trip() {
        let (mut frame_loop, _) = frame_loop();
        assert!(!frame_loop.previous_preset());

        frame_loop.next_preset();
        let after_first = frame_loop.visualizer.selected_preset();
        assert_ne!(after_first, Some(0));

        frame_loop.next_preset();
        assert!(frame_loop.previous_preset());
        assert_eq!(frame_loop.visualizer.selected_preset(), after_first);
        assert!(frame_loop.previous_preset());
        assert_eq!(frame_loop.visualizer.selected_preset(), Some(0));
        assert!(!frame_loop.previous_preset());
    }

    #[test]
    fn resize_reaches_visualizer_and_title() {
        let (mut frame_loop, calls) = frame_loop();
        frame_loop.resize(640.0, 480.0);
        assert_eq!(calls.borrow().size, Some((640, 480)));
        assert_eq!(frame_loop.animator().area().x, 640.0);
    }

    #[test]
    fn missing_track_leaves_overlay_hidden() {
        let (mut frame_loop, _) = frame_loop();
        assert!(frame_loop.load_track(Path::new("/no/such/song.mp3")).is_err());
        assert!(!frame_loop.engine().is_loaded());
        assert_eq!(frame_loop.tick().title, None);
    }

    #[test]
    fn queue_errors_carry_the_path() {
        let (mut frame_loop, _) = frame_loop();
        frame_loop.queue_mut().add("/no/such/song.mp3");

        let err = frame_loop.play_next().unwrap_err();
        assert!(format!("{:#}", err).contains("/no/such/song.mp3"));
        assert_eq!(frame_loop.queue().current_index(), Some(0));
    }

    #[test]
    fn empty_queue_is_a_no_op() {
        let (mut frame_loop, _) = frame_loop();
        assert!(frame_loop.play_next().is_ok());
        assert!(frame_loop.play_previous().is_ok());
        assert!(frame_loop.toggle_playback().is_ok());
        assert!(!frame_loop.song_finished().unwrap());
        assert!(!frame_loop.engine().is_playing());
    }

    #[test]
    fn lyrics_hidden_while_stopped() {
        let (mut frame_loop, _) = frame_loop();
        frame_loop.set_lyrics(vec![LyricLine::new("hello", 0.0, 10.0)]);
        assert_eq!(frame_loop.tick().lyrics, "");
        frame_loop.clear_lyrics();
        assert_eq!(frame_loop.tick().lyrics, "");
    }

    #[test]
    fn run_stops_on_shutdown() {
        let (mut frame_loop, calls) = frame_loop();
        let (tx, rx) = oneshot::channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let mut frames = 0;
        let mut tx = Some(tx);
        runtime.block_on(frame_loop.run(
            |_frame| {
                frames += 1;
                if frames == 3 {
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(());
                    }
                }
            },
            rx,
        ));

        assert!(frames >= 3);
        assert_eq!(calls.borrow().frames_rendered, frames);
    }
}
