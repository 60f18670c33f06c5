// Render coordination: visualizer seam and the per-frame loop
pub mod frame_loop;
pub mod presets;

pub use frame_loop::{FrameLoop, OverlayFrame};
pub use presets::{PresetHistory, Visualizer, PRESET_HISTORY_LIMIT};
