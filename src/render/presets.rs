// Visualizer seam and preset navigation history
use rand::Rng;
use std::collections::VecDeque;

/// Most presets remembered for "previous preset"
pub const PRESET_HISTORY_LIMIT: usize = 20;

/// Audio-reactive visualizer driven by the frame loop.
///
/// Implementations own their GPU context; the frame loop only feeds audio,
/// asks for a frame and picks presets.
pub trait Visualizer {
    /// Feed the latest interleaved stereo snapshot (oldest frame first)
    fn add_pcm(&mut self, interleaved: &[f32]);

    fn render_frame(&mut self);

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn preset_count(&self) -> usize;

    fn selected_preset(&self) -> Option<usize>;

    fn select_preset(&mut self, index: usize);
}

/// Bounded stack of previously shown presets.
#[derive(Debug, Clone)]
pub struct PresetHistory {
    entries: VecDeque<usize>,
    limit: usize,
}

impl Default for PresetHistory {
    fn default() -> Self {
        Self::new(PRESET_HISTORY_LIMIT)
    }
}

impl PresetHistory {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Remember a preset, forgetting the oldest one when full
    pub fn push(&mut self, index: usize) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(index);
    }

    /// Most recently remembered preset
    pub fn pop(&mut self) -> Option<usize> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Pick a random preset, avoiding `current` when there is a choice.
pub fn random_preset<R: Rng>(rng: &mut R, count: usize, current: Option<usize>) -> Option<usize> {
    match count {
        0 => None,
        1 => Some(0),
        _ => match current.filter(|&c| c < count) {
            Some(current) => {
                // Draw from the other presets, then skip over the current one
                let index = rng.gen_range(0..count - 1);
                Some(if index >= current { index + 1 } else { index })
            }
            None => Some(rng.gen_range(0..count)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn history_pops_most_recent_first() {
        let mut history = PresetHistory::default();
        history.push(3);
        history.push(7);
        assert_eq!(history.pop(), Some(7));
        assert_eq!(history.pop(), Some(3));
        assert_eq!(history.pop(), None);
    }

    #[test]
    fn history_forgets_oldest_past_limit() {
        let mut history = PresetHistory::default();
        for i in 0..25 {
            history.push(i);
        }
        assert_eq!(history.len(), PRESET_HISTORY_LIMIT);

        let mut popped = Vec::new();
        while let Some(i) = history.pop() {
            popped.push(i);
        }
        assert_eq!(popped.first(), Some(&24));
        assert_eq!(popped.last(), Some(&5));
    }

    #[test]
    fn random_preset_never_repeats_current() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let pick = random_preset(&mut rng, 4, Some(2)).unwrap();
            assert!(pick < 4);
            assert_ne!(pick, 2);
        }
    }

    #[test]
    fn random_preset_edge_counts() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(random_preset(&mut rng, 0, None), None);
        assert_eq!(random_preset(&mut rng, 1, Some(0)), Some(0));
        for _ in 0..100 {
            assert!(random_preset(&mut rng, 3, None).unwrap() < 3);
            assert!(random_preset(&mut rng, 3, Some(9)).unwrap() < 3);
        }
    }
}
