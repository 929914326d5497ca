use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use chinchilla_domain::{
	conversation::{self, ChatMessage},
	document::Document,
	merge, text,
};

use crate::{
	nodes::NodeContext,
	request::SourcePreview,
	session::{SessionPatch, SessionState},
};

pub const APOLOGY_ANSWER: &str =
	"Sorry, something went wrong while preparing the answer. Please try again in a moment.";

const MAX_SOURCES: usize = 5;
const SOURCE_PREVIEW_CHARS: usize = 200;
const NO_DOCUMENTS: &str = "No relevant documents were found.";

/// Picks a human-readable label from metadata. `source` wins over a title, and the ordinal is
/// the last resort.
pub fn document_label(doc: &Document, ordinal: usize) -> String {
	if let Some(source) = doc.metadata_str("source") {
		return source.to_string();
	}

	let title = doc.metadata_str("job_title").or_else(|| doc.metadata_str("title"));

	match (title, doc.metadata_str("organization")) {
		(Some(title), Some(organization)) => format!("{title} - {organization}"),
		(Some(title), None) => title.to_string(),
		(None, Some(organization)) => format!("Document {ordinal} - {organization}"),
		(None, None) => format!("Document {ordinal}"),
	}
}

pub fn format_context(docs: &[Document]) -> String {
	if docs.is_empty() {
		return NO_DOCUMENTS.to_string();
	}

	docs.iter()
		.enumerate()
		.map(|(idx, doc)| format!("[{}]\n{}\n", document_label(doc, idx + 1), doc.content.trim()))
		.collect::<Vec<_>>()
		.join("\n")
}

pub fn origin_counts(docs: &[Document]) -> BTreeMap<String, usize> {
	let mut counts = BTreeMap::new();

	for doc in docs {
		*counts.entry(doc.origin.as_str().to_string()).or_insert(0) += 1;
	}

	counts
}

pub fn source_previews(docs: &[Document]) -> Vec<SourcePreview> {
	docs.iter()
		.take(MAX_SOURCES)
		.map(|doc| {
			let mut metadata = doc.metadata.clone();

			metadata.insert("origin".to_string(), Value::String(doc.origin.as_str().to_string()));
			metadata.insert("relevance_score".to_string(), Value::from(doc.relevance_score()));

			SourcePreview {
				content_preview: text::preview(&doc.content, SOURCE_PREVIEW_CHARS),
				metadata,
			}
		})
		.collect()
}

pub fn answer_messages(
	answer_prompt: &str,
	state: &SessionState,
	docs: &[Document],
	history_turns: usize,
) -> Vec<ChatMessage> {
	let mut messages = vec![ChatMessage::system(answer_prompt)];

	messages.extend(
		conversation::trim_history(&state.history, history_turns).iter().map(ChatMessage::from),
	);
	messages.push(ChatMessage::user(format!(
		"Question: {}\n\nReference documents:\n{}\n\nAnswer the question using the reference documents above.",
		state.original_query.trim(),
		format_context(docs)
	)));

	messages
}

/// Merges internal and web evidence and asks for the final answer. Never fails: a broken call
/// yields the apology answer with no sources.
pub async fn generate(ctx: &NodeContext<'_>, state: &SessionState) -> SessionPatch {
	let merged = merge::merge_documents(&state.documents, &state.web_documents);
	let counts = origin_counts(&merged);
	let messages = answer_messages(&ctx.category.answer_prompt, state, &merged, ctx.history_turns);

	match ctx.llm.complete(&messages).await {
		Ok(answer) if !answer.trim().is_empty() => SessionPatch {
			answer: Some(answer.trim().to_string()),
			sources: Some(source_previews(&merged)),
			origin_counts: Some(counts),
			..Default::default()
		},
		outcome => {
			let error = match outcome {
				Ok(_) => "empty completion".to_string(),
				Err(err) => err.to_string(),
			};

			warn!(category = %ctx.category.name, error = %error, "Answer generation failed.");

			SessionPatch {
				answer: Some(APOLOGY_ANSWER.to_string()),
				sources: Some(Vec::new()),
				origin_counts: Some(counts),
				error: Some(format!("Answer generation failed: {error}")),
				..Default::default()
			}
		},
	}
}
