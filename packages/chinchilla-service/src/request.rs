use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use chinchilla_domain::{
	conversation::ConversationTurn, pattern::PatternAnalysis, profile::Profile,
	quality::SearchQuality,
};

use crate::session::TraceEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
	pub category: String,
	pub query: String,
	#[serde(default)]
	pub profile: Option<Profile>,
	#[serde(default)]
	pub history: Vec<ConversationTurn>,
	#[serde(default)]
	pub sender: Option<String>,
}
impl AgentRequest {
	pub fn new(category: impl Into<String>, query: impl Into<String>) -> Self {
		Self {
			category: category.into(),
			query: query.into(),
			profile: None,
			history: Vec::new(),
			sender: None,
		}
	}

	pub fn with_profile(mut self, profile: Profile) -> Self {
		self.profile = Some(profile);

		self
	}

	pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
		self.history = history;

		self
	}

	pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
		self.sender = Some(sender.into());

		self
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
	pub answer: String,
	pub sources: Vec<SourcePreview>,
	pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePreview {
	pub content_preview: String,
	pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
	pub request_id: Uuid,
	pub category: String,
	pub rewritten_query: String,
	pub retrieval_stats: RetrievalStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalStats {
	/// Merged evidence counts keyed by origin, e.g. `{"internal": 4, "web": 1}`.
	pub origin_counts: BTreeMap<String, usize>,
	/// Executed nodes in order.
	pub path: Vec<String>,
	pub trace: Vec<TraceEvent>,
	pub filter_level: u8,
	pub retry_count: u8,
	pub search_quality: SearchQuality,
	pub avg_relevance_score: f32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pattern_analysis: Option<PatternAnalysis>,
}
