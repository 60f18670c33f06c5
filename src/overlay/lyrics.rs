// Lyrics overlay
// Picks the lyric line matching the playback position

use super::wrap::wrap_words;

/// One timed lyric line, times in seconds from the start of the track.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl LyricLine {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    fn covers(&self, position: f64) -> bool {
        self.start <= position && position < self.end
    }
}

pub struct LyricsTrack {
    lines: Vec<LyricLine>,
    line_length_target: usize,
    current: Option<usize>,
    current_text: String,
}

impl LyricsTrack {
    pub fn new(line_length_target: usize) -> Self {
        Self {
            lines: Vec::new(),
            line_length_target: line_length_target.max(1),
            current: None,
            current_text: String::new(),
        }
    }

    pub fn set_lines(&mut self, lines: Vec<LyricLine>) {
        self.lines = lines;
        self.select(None);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.select(None);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Select the line under `position`. Nothing is shown while paused.
    ///
    /// Returns true when the displayed line changed.
    pub fn update(&mut self, position: f64, playing: bool) -> bool {
        let next = if playing {
            self.lines.iter().position(|line| line.covers(position))
        } else {
            None
        };

        if next == self.current {
            return false;
        }
        self.select(next);
        true
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Wrapped text of the active line, empty when none is active
    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    fn select(&mut self, index: Option<usize>) {
        self.current = index;
        self.current_text = match index.and_then(|i| self.lines.get(i)) {
            Some(line) => wrap_words(&line.text, self.line_length_target),
            None => String::new(),
        };
    }
}
