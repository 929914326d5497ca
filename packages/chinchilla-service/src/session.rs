//! Per-request state threaded through the orchestrator, and the patches nodes return.

use std::collections::BTreeMap;

use serde::Serialize;

use chinchilla_domain::{
	conversation::ConversationTurn,
	document::Document,
	pattern::PatternAnalysis,
	profile::Profile,
	quality::SearchQuality,
};

use crate::{registry::GradeFailurePolicy, request::SourcePreview};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeDecision {
	Accept,
	Reject,
}

/// A diagnostic entry recorded while the request runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
	Retrieval {
		filter_level: u8,
		retry_count: u8,
		query: String,
		requested: usize,
		count: usize,
		quality: SearchQuality,
		avg_score: f32,
	},
	RetrievalFailed {
		filter_level: u8,
		error: String,
	},
	RetrievalTimedOut {
		filter_level: u8,
	},
	PatternScan {
		cached: bool,
		documents: usize,
	},
	PatternScanFailed {
		error: String,
	},
	GradeFallback {
		policy: GradeFailurePolicy,
		reason: String,
	},
	WebSearch {
		query: String,
		doc_count: usize,
	},
	WebSearchSkipped {
		reason: String,
	},
	WebSearchError {
		query: String,
		error: String,
	},
}

/// Owned by exactly one in-flight request.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
	pub category: String,
	pub original_query: String,
	pub rewritten_query: String,
	pub profile: Option<Profile>,
	pub history: Vec<ConversationTurn>,
	pub sender: Option<String>,
	pub documents: Vec<Document>,
	pub web_documents: Vec<Document>,
	pub retry_count: u8,
	pub filter_level: u8,
	pub grade_decision: Option<GradeDecision>,
	pub search_quality: SearchQuality,
	pub avg_relevance_score: f32,
	pub answer: Option<String>,
	pub sources: Vec<SourcePreview>,
	pub origin_counts: BTreeMap<String, usize>,
	pub pattern_analysis: Option<PatternAnalysis>,
	/// Set once the scan ran, hit the cache, failed or timed out. A request scans at most once.
	pub pattern_scan_attempted: bool,
	pub error: Option<String>,
	pub trace: Vec<TraceEvent>,
}
impl SessionState {
	pub fn new(category: impl Into<String>, query: impl Into<String>) -> Self {
		let query = query.into();

		Self {
			category: category.into(),
			rewritten_query: query.clone(),
			original_query: query,
			..Default::default()
		}
	}

	/// The query retrieval and web search should use.
	pub fn search_query(&self) -> &str {
		let rewritten = self.rewritten_query.trim();

		if rewritten.is_empty() { self.original_query.trim() } else { rewritten }
	}
}

/// A partial update returned by a node.
///
/// Every `Some` field replaces the session value, so the last writer wins per key. `trace` is the
/// exception: its events are appended.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
	pub rewritten_query: Option<String>,
	pub documents: Option<Vec<Document>>,
	pub web_documents: Option<Vec<Document>>,
	pub retry_count: Option<u8>,
	pub filter_level: Option<u8>,
	pub grade_decision: Option<GradeDecision>,
	pub search_quality: Option<SearchQuality>,
	pub avg_relevance_score: Option<f32>,
	pub answer: Option<String>,
	pub sources: Option<Vec<SourcePreview>>,
	pub origin_counts: Option<BTreeMap<String, usize>>,
	pub pattern_analysis: Option<PatternAnalysis>,
	pub pattern_scan_attempted: Option<bool>,
	pub error: Option<String>,
	pub trace: Vec<TraceEvent>,
}
impl SessionPatch {
	pub fn traced(mut self, event: TraceEvent) -> Self {
		self.trace.push(event);

		self
	}

	pub fn apply(self, state: &mut SessionState) {
		if let Some(value) = self.rewritten_query {
			state.rewritten_query = value;
		}
		if let Some(value) = self.documents {
			state.documents = value;
		}
		if let Some(value) = self.web_documents {
			state.web_documents = value;
		}
		if let Some(value) = self.retry_count {
			state.retry_count = value;
		}
		if let Some(value) = self.filter_level {
			state.filter_level = value;
		}
		if let Some(value) = self.grade_decision {
			state.grade_decision = Some(value);
		}
		if let Some(value) = self.search_quality {
			state.search_quality = value;
		}
		if let Some(value) = self.avg_relevance_score {
			state.avg_relevance_score = value;
		}
		if let Some(value) = self.answer {
			state.answer = Some(value);
		}
		if let Some(value) = self.sources {
			state.sources = value;
		}
		if let Some(value) = self.origin_counts {
			state.origin_counts = value;
		}
		if let Some(value) = self.pattern_analysis {
			state.pattern_analysis = Some(value);
		}
		if let Some(value) = self.pattern_scan_attempted {
			state.pattern_scan_attempted = value;
		}
		if let Some(value) = self.error {
			state.error = Some(value);
		}

		state.trace.extend(self.trace);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn patch_overwrites_present_keys_and_appends_trace() {
		let mut state = SessionState::new("jobs", "query");

		state.filter_level = 2;
		state.trace.push(TraceEvent::WebSearchSkipped { reason: "first".to_string() });

		SessionPatch { retry_count: Some(1), filter_level: Some(0), ..Default::default() }
			.traced(TraceEvent::WebSearchSkipped { reason: "second".to_string() })
			.apply(&mut state);

		assert_eq!(state.retry_count, 1);
		assert_eq!(state.filter_level, 0);
		assert_eq!(state.rewritten_query, "query");
		assert_eq!(state.trace.len(), 2);
	}

	#[test]
	fn search_query_falls_back_to_original() {
		let mut state = SessionState::new("jobs", " original ");

		state.rewritten_query = "  ".to_string();

		assert_eq!(state.search_query(), "original");
	}
}
