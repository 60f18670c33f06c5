// Queue management module
// In-memory play queue: ordered track paths plus the current index

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    tracks: Vec<PathBuf>,
    current_track_index: Option<usize>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track. Returns false if the path is already queued.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.tracks.contains(&path) {
            log::debug!("[Queue] Skipping duplicate {}", path.display());
            return false;
        }
        self.tracks.push(path);
        true
    }

    /// Add several tracks, skipping duplicates; returns how many were added
    pub fn extend<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut added = 0;
        for path in paths {
            if self.add(path) {
                added += 1;
            }
        }
        added
    }

    /// Remove the track at `index`, keeping the current track selected when possible.
    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        if index >= self.tracks.len() {
            return None;
        }
        let removed = self.tracks.remove(index);

        self.current_track_index = match self.current_track_index {
            _ if self.tracks.is_empty() => None,
            Some(current) if current > index => Some(current - 1),
            Some(current) if current == index => Some(current.min(self.tracks.len() - 1)),
            other => other,
        };
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_track_index = None;
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_track_index
    }

    pub fn current(&self) -> Option<&Path> {
        self.current_track_index
            .and_then(|i| self.tracks.get(i))
            .map(PathBuf::as_path)
    }

    /// Make `index` the current track
    pub fn select(&mut self, index: usize) -> Option<&Path> {
        if index >= self.tracks.len() {
            return None;
        }
        self.current_track_index = Some(index);
        self.current()
    }

    /// Advance to the next track, wrapping to the first.
    ///
    /// With nothing selected yet this starts at the first track.
    pub fn next(&mut self) -> Option<&Path> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let index = match self.current_track_index {
            Some(current) => (current + 1) % len,
            None => 0,
        };
        self.select(index)
    }

    /// Step back to the previous track, wrapping to the last.
    pub fn previous(&mut self) -> Option<&Path> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let index = match self.current_track_index {
            Some(current) => (current + len - 1) % len,
            None => len - 1,
        };
        self.select(index)
    }
}
