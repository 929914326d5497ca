use std::{collections::BTreeMap, path::PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub orchestrator: Orchestrator,
	#[serde(default)]
	pub cache: Cache,
	/// Keyed by category name, e.g. "jobs" or "scam_defense".
	#[serde(default)]
	pub categories: BTreeMap<String, Category>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Wall-clock budget for one request, checked between orchestrator steps.
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub vector_dim: u32,
	/// Named vector to query. Unnamed collections leave this unset.
	#[serde(default)]
	pub vector_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
	pub web_search: WebSearchProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Missing credentials turn web fallback into a logged skip.
	#[serde(default)]
	pub api_key: Option<String>,
	pub path: String,
	#[serde(default = "default_web_search_engine")]
	pub engine: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Orchestrator {
	#[serde(default = "default_max_retries")]
	pub max_retries: u8,
	#[serde(default = "default_max_filter_level")]
	pub max_filter_level: u8,
	#[serde(default = "default_step_ceiling")]
	pub step_ceiling: u32,
	#[serde(default = "default_history_turns")]
	pub history_turns: usize,
	#[serde(default = "default_fetch_multiplier")]
	pub fetch_multiplier: u32,
	#[serde(default = "default_fanout_timeout_ms")]
	pub fanout_timeout_ms: u64,
}
impl Default for Orchestrator {
	fn default() -> Self {
		Self {
			max_retries: default_max_retries(),
			max_filter_level: default_max_filter_level(),
			step_ceiling: default_step_ceiling(),
			history_turns: default_history_turns(),
			fetch_multiplier: default_fetch_multiplier(),
			fanout_timeout_ms: default_fanout_timeout_ms(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cache {
	#[serde(default = "default_cache_capacity")]
	pub capacity: usize,
}
impl Default for Cache {
	fn default() -> Self {
		Self { capacity: default_cache_capacity() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
	pub collection: String,
	pub rewrite_prompt: String,
	pub answer_prompt: String,
	#[serde(default = "default_relevance_threshold")]
	pub relevance_threshold: f32,
	#[serde(default = "default_top_k")]
	pub top_k: u32,
	#[serde(default)]
	pub fetch_multiplier: Option<u32>,
	#[serde(default)]
	pub max_retries: Option<u8>,
	/// `0` disables filter widening and leaves only query rewrites as recovery.
	#[serde(default)]
	pub max_filter_level: Option<u8>,
	/// Either "accept" or "reject"; applied when the LLM grading call is inconclusive.
	#[serde(default = "default_grade_failure_policy")]
	pub grade_failure_policy: String,
	#[serde(default = "default_true")]
	pub web_search: bool,
	/// JSON file with known scam patterns, keywords and official contacts.
	#[serde(default)]
	pub pattern_dataset: Option<PathBuf>,
}

fn default_request_timeout_ms() -> u64 {
	30_000
}

fn default_web_search_engine() -> String {
	"google".to_string()
}

fn default_max_retries() -> u8 {
	2
}

fn default_max_filter_level() -> u8 {
	3
}

fn default_step_ceiling() -> u32 {
	50
}

fn default_history_turns() -> usize {
	8
}

fn default_fetch_multiplier() -> u32 {
	3
}

fn default_fanout_timeout_ms() -> u64 {
	1_000
}

fn default_cache_capacity() -> usize {
	100
}

fn default_relevance_threshold() -> f32 {
	0.3
}

fn default_top_k() -> u32 {
	5
}

fn default_grade_failure_policy() -> String {
	"accept".to_string()
}

fn default_true() -> bool {
	true
}
