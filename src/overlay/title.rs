// Song title text shown by the title overlay
use std::path::Path;

/// Build the overlay text for a track.
///
/// Underscores and dashes in the raw title become spaces. The artist is
/// appended as a separate paragraph unless the title already mentions it
/// (case-insensitive). The result is unwrapped; the animator wraps it.
pub fn compose_title(raw_title: &str, artist: Option<&str>) -> String {
    let title: String = raw_title
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");

    match artist.map(str::trim).filter(|a| !a.is_empty()) {
        Some(artist) if !contains_ignore_case(raw_title, artist) => {
            format!("{}\n\n{}", title, artist)
        }
        _ => title,
    }
}

/// Raw title of a track: its file name without the extension
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
