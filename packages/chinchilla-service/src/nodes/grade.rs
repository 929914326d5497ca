use tracing::{info, warn};

use chinchilla_domain::{conversation::ChatMessage, document::Document, text};

use crate::{
	nodes::NodeContext,
	registry::GradeFailurePolicy,
	session::{GradeDecision, SessionPatch, SessionState, TraceEvent},
};

pub const GRADE_SYSTEM_PROMPT: &str =
	"You judge whether retrieved documents are relevant to a question. Answer only yes or no.";

const GRADED_DOCUMENTS: usize = 3;
const GRADED_DOCUMENT_CHARS: usize = 300;

/// Cheap, authoritative gate: at least one document must reach the threshold.
pub fn passes_threshold(docs: &[Document], threshold: f32) -> bool {
	docs.iter().any(|doc| doc.relevance_score() >= threshold)
}

/// `None` when the completion is neither a yes nor a no.
pub fn parse_verdict(completion: &str) -> Option<GradeDecision> {
	let lowered = completion.to_lowercase();

	if lowered.contains("yes") {
		return Some(GradeDecision::Accept);
	}
	if lowered.split(|ch: char| !ch.is_alphanumeric()).any(|word| word == "no") {
		return Some(GradeDecision::Reject);
	}

	None
}

pub fn grade_messages(query: &str, docs: &[Document]) -> Vec<ChatMessage> {
	let context = docs
		.iter()
		.take(GRADED_DOCUMENTS)
		.enumerate()
		.map(|(idx, doc)| {
			let excerpt = text::truncate_graphemes(&doc.content, GRADED_DOCUMENT_CHARS);

			format!("Document {}:\n{excerpt}", idx + 1)
		})
		.collect::<Vec<_>>()
		.join("\n\n");
	let prompt = format!(
		"Question: {query}\n\nRetrieved documents:\n{context}\n\nDo the documents contain information that helps answer the question? Answer \"yes\" or \"no\"."
	);

	vec![ChatMessage::system(GRADE_SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

pub async fn grade(ctx: &NodeContext<'_>, state: &SessionState) -> SessionPatch {
	let category = ctx.category;

	if state.documents.is_empty() {
		info!(category = %category.name, "No documents retrieved. Rejecting.");

		return decided(GradeDecision::Reject);
	}
	if !passes_threshold(&state.documents, category.relevance_threshold) {
		info!(
			category = %category.name,
			threshold = category.relevance_threshold,
			"No document reaches the relevance threshold. Rejecting."
		);

		return decided(GradeDecision::Reject);
	}

	let messages = grade_messages(state.search_query(), &state.documents);
	let reason = match ctx.llm.complete(&messages).await {
		Ok(completion) => match parse_verdict(&completion) {
			Some(decision) => return decided(decision),
			None => format!("inconclusive completion: {}", text::preview(&completion, 50)),
		},
		Err(err) => err.to_string(),
	};
	let policy = category.grade_failure_policy;
	let decision = match policy {
		GradeFailurePolicy::Accept => GradeDecision::Accept,
		GradeFailurePolicy::Reject => GradeDecision::Reject,
	};

	warn!(
		category = %category.name,
		policy = ?policy,
		reason = %reason,
		"Relevance confirmation unavailable. Applying the grade failure policy."
	);

	decided(decision).traced(TraceEvent::GradeFallback { policy, reason })
}

fn decided(decision: GradeDecision) -> SessionPatch {
	SessionPatch { grade_decision: Some(decision), ..Default::default() }
}
