//! Removal of markdown code fences from model output.

const FENCE: &str = "```";

/// Strip markdown fence markers from generated source text.
///
/// Lines opening with a fence at column 0 (optionally followed by `fence_tag`
/// or any other bare language tag) are dropped; a fence followed by code on
/// the same line keeps the code. Indented fences are content and survive
/// unless they end the text. Trailing backticks and surrounding whitespace are
/// removed. Applying this twice gives the same result as applying it once.
pub fn strip_fences(text: &str, fence_tag: Option<&str>) -> String {
    let mut current = strip_pass(text, fence_tag);
    // A pass only ever deletes characters, so this reaches a fixed point.
    loop {
        let next = strip_pass(&current, fence_tag);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_pass(text: &str, fence_tag: Option<&str>) -> String {
    let kept: Vec<&str> = text
        .trim()
        .split('\n')
        .filter_map(|line| strip_line_markers(line, fence_tag))
        .collect();

    kept.join("\n")
        .trim_end_matches(|c: char| c == '`' || c.is_whitespace())
        .trim()
        .to_string()
}

/// Returns `None` when the whole line is fence syntax.
fn strip_line_markers<'a>(line: &'a str, fence_tag: Option<&str>) -> Option<&'a str> {
    let mut rest = line;

    while let Some(after_marker) = rest.strip_prefix(FENCE) {
        let after_tag = fence_tag
            .and_then(|tag| after_marker.strip_prefix(tag))
            .filter(|after| after.is_empty() || after.starts_with(char::is_whitespace))
            .unwrap_or(after_marker);

        let remainder = after_tag.trim_start();
        if remainder.trim_end().is_empty() || is_language_tag(remainder.trim_end()) {
            return None;
        }
        rest = remainder;
    }

    Some(rest)
}

fn is_language_tag(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '+' | '-' | '#' | '.' | '_'))
}
