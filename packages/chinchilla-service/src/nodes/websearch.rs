use serde_json::{Map, Value};
use tracing::{info, warn};

use chinchilla_domain::document::Document;

use crate::{
	nodes::NodeContext,
	session::{SessionPatch, SessionState, TraceEvent},
};

pub async fn web_search(ctx: &NodeContext<'_>, state: &SessionState) -> SessionPatch {
	let query = state.search_query().to_string();
	let skip_reason = if query.is_empty() {
		Some("empty_query")
	} else if !ctx.category.web_search {
		Some("disabled")
	} else if !ctx.web_search.is_configured() {
		Some("missing_api_key")
	} else {
		None
	};

	if let Some(reason) = skip_reason {
		info!(category = %ctx.category.name, reason, "Web search skipped.");

		return SessionPatch::default()
			.traced(TraceEvent::WebSearchSkipped { reason: reason.to_string() });
	}

	match ctx.web_search.search(&query).await {
		Ok(Some(text)) => {
			let mut metadata = Map::new();

			metadata.insert("source".to_string(), Value::String("web_search".to_string()));
			metadata.insert("query".to_string(), Value::String(query.clone()));

			let mut web_documents = state.web_documents.clone();

			web_documents.push(Document::web(text, metadata));

			SessionPatch { web_documents: Some(web_documents), ..Default::default() }
				.traced(TraceEvent::WebSearch { query, doc_count: 1 })
		},
		Ok(None) => SessionPatch::default().traced(TraceEvent::WebSearch { query, doc_count: 0 }),
		Err(err) => {
			warn!(
				category = %ctx.category.name,
				error = %err,
				"Web search failed. Continuing without it."
			);

			SessionPatch::default()
				.traced(TraceEvent::WebSearchError { query, error: err.to_string() })
		},
	}
}
