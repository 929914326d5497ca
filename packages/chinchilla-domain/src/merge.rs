use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

use crate::document::Document;

pub const FINGERPRINT_CHARS: usize = 100;

/// NFC-normalised, trimmed prefix of the content.
pub fn fingerprint(content: &str) -> String {
	let prefix: String = content.nfc().take(FINGERPRINT_CHARS).collect();

	prefix.trim().to_string()
}

/// Drops every document whose fingerprint was already seen. Order is preserved and the first
/// occurrence wins.
pub fn dedup<I>(docs: I) -> Vec<Document>
where
	I: IntoIterator<Item = Document>,
{
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for doc in docs {
		if seen.insert(fingerprint(&doc.content)) {
			out.push(doc);
		}
	}

	out
}

/// Internal evidence first, then web evidence, deduplicated.
pub fn merge_documents(internal: &[Document], web: &[Document]) -> Vec<Document> {
	dedup(internal.iter().chain(web.iter()).cloned())
}
