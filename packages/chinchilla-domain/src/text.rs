use unicode_segmentation::UnicodeSegmentation;

/// Returns the longest prefix of `text` holding at most `max` grapheme clusters.
pub fn truncate_graphemes(text: &str, max: usize) -> &str {
	match text.grapheme_indices(true).nth(max) {
		Some((idx, _)) => &text[..idx],
		None => text,
	}
}

pub fn preview(text: &str, max: usize) -> String {
	truncate_graphemes(text.trim(), max).trim_end().to_string()
}
