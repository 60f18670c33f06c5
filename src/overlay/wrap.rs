// Greedy word wrap shared by the title and lyrics overlays

/// Pack whitespace-separated words onto lines of at most `target` chars.
///
/// Words are never split. A line is closed when adding the next word (plus
/// its separating space) would exceed `target`; a word longer than `target`
/// gets a line to itself. Lines are joined with `\n`.
pub fn wrap_words(text: &str, target: usize) -> String {
    let mut wrapped = String::with_capacity(text.len());
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if line_len > 0 && line_len + 1 + word_len > target {
            wrapped.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            wrapped.push(' ');
            line_len += 1;
        }
        wrapped.push_str(word);
        line_len += word_len;
    }

    wrapped
}

/// Wrap each blank-line separated paragraph on its own, keeping the blank lines.
pub fn wrap_paragraphs(text: &str, target: usize) -> String {
    split_paragraphs(text)
        .map(|p| wrap_words(p, target))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").flat_map(|chunk| chunk.split("\r\n\r\n"))
}
