use tracing::warn;

use chinchilla_domain::conversation::{self, ChatMessage};

use crate::{
	nodes::NodeContext,
	registry::CategoryConfig,
	session::{SessionPatch, SessionState},
};

/// Turns the question into a retrieval query. Any failure keeps the original query.
pub async fn rewrite(ctx: &NodeContext<'_>, state: &SessionState) -> SessionPatch {
	let original = state.original_query.trim();

	if original.is_empty() {
		return SessionPatch { rewritten_query: Some(String::new()), ..Default::default() };
	}

	let messages = rewrite_messages(ctx.category, state, ctx.history_turns);
	let rewritten = match ctx.llm.complete(&messages).await {
		Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
		Ok(_) => {
			warn!(
				category = %ctx.category.name,
				"Rewrite returned no text. Keeping the original query."
			);

			original.to_string()
		},
		Err(err) => {
			warn!(
				category = %ctx.category.name,
				error = %err,
				"Rewrite failed. Keeping the original query."
			);

			original.to_string()
		},
	};

	SessionPatch { rewritten_query: Some(rewritten), ..Default::default() }
}

pub fn rewrite_messages(
	category: &CategoryConfig,
	state: &SessionState,
	history_turns: usize,
) -> Vec<ChatMessage> {
	let mut messages = vec![ChatMessage::system(category.rewrite_prompt.as_str())];

	messages.extend(
		conversation::trim_history(&state.history, history_turns).iter().map(ChatMessage::from),
	);

	let mut prompt = String::new();
	let previous = state.rewritten_query.trim();

	if state.retry_count > 0 && !previous.is_empty() {
		prompt.push_str(&format!(
			"Previous search query: {previous}\nIt did not find relevant documents. Write a different search query.\n\n"
		));
	}

	prompt.push_str(&format!("Question: {}\n\nSearch query:", state.original_query.trim()));
	messages.push(ChatMessage::user(prompt));

	messages
}
