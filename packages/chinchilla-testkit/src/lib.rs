//! In-memory collaborators and fixtures for exercising the agent without network access.

use std::{
	collections::BTreeMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value};

use chinchilla_config::{
	Cache, Category, Config, EmbeddingProviderConfig, LlmProviderConfig, Orchestrator, Providers,
	Qdrant, Service, Storage, WebSearchProviderConfig,
};
use chinchilla_domain::{conversation::ChatMessage, document::Document, filter::StructuredFilter};
use chinchilla_service::{
	AgentService, BoxFuture, CategoryConfig, Error, GRADE_SYSTEM_PROMPT, LlmPort, Ports, Registry,
	Result, RetrieverPort, WebSearchPort,
};

pub const REWRITE_PROMPT: &str = "Rewrite the question into a search query.";
pub const ANSWER_PROMPT: &str = "Answer the question from the reference documents.";

pub fn test_config() -> Config {
	let mut categories = BTreeMap::new();

	categories.insert("jobs".to_string(), test_category("jobs"));
	categories.insert("legal".to_string(), Category {
		max_filter_level: Some(0),
		grade_failure_policy: "reject".to_string(),
		..test_category("legal")
	});
	categories.insert("scam_defense".to_string(), Category {
		max_filter_level: Some(0),
		web_search: false,
		..test_category("scam_defense")
	});

	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			request_timeout_ms: 30_000,
		},
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				vector_dim: 3,
				vector_name: None,
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "key".to_string(),
				path: "/embeddings".to_string(),
				model: "m".to_string(),
				dimensions: 3,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			llm: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "key".to_string(),
				path: "/chat/completions".to_string(),
				model: "m".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			web_search: WebSearchProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: None,
				path: "/search".to_string(),
				engine: "google".to_string(),
				timeout_ms: 1_000,
			},
		},
		orchestrator: Orchestrator::default(),
		cache: Cache::default(),
		categories,
	}
}

pub fn test_category(collection: &str) -> Category {
	Category {
		collection: collection.to_string(),
		rewrite_prompt: REWRITE_PROMPT.to_string(),
		answer_prompt: ANSWER_PROMPT.to_string(),
		relevance_threshold: 0.3,
		top_k: 5,
		fetch_multiplier: None,
		max_retries: None,
		max_filter_level: None,
		grade_failure_policy: "accept".to_string(),
		web_search: true,
		pattern_dataset: None,
	}
}

/// Resolves a category from [`test_config`] with the given retriever.
pub fn category(cfg: &Config, name: &str, retriever: Arc<dyn RetrieverPort>) -> CategoryConfig {
	let settings = cfg.categories.get(name).cloned().unwrap_or_else(|| test_category(name));

	CategoryConfig::from_settings(name, &settings, &cfg.orchestrator, retriever, None)
		.expect("Test category settings must be valid.")
}

pub fn service(
	cfg: Config,
	categories: Vec<CategoryConfig>,
	llm: Arc<dyn LlmPort>,
	web_search: Arc<dyn WebSearchPort>,
) -> AgentService {
	let mut registry = Registry::new();

	for category in categories {
		registry.register(category);
	}

	AgentService::with_ports(cfg, registry, Ports::new(llm, web_search))
}

pub fn doc(content: &str, score: f32) -> Document {
	Document::internal(content, Map::new(), score)
}

/// `count` documents with distinct content and the same score.
pub fn docs(count: usize, score: f32) -> Vec<Document> {
	(0..count).map(|idx| doc(&format!("document number {idx}"), score)).collect()
}

pub fn doc_with(content: &str, score: f32, metadata: &[(&str, Value)]) -> Document {
	let metadata = metadata.iter().map(|(key, value)| (key.to_string(), value.clone())).collect();

	Document::internal(content, metadata, score)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalCall {
	pub query: String,
	pub filter: Option<StructuredFilter>,
	pub k: usize,
}

type RetrievalScript =
	dyn Fn(&RetrievalCall) -> std::result::Result<Vec<Document>, String> + Send + Sync;

/// A retriever answering from a closure and recording every call.
pub struct ScriptedRetriever {
	script: Box<RetrievalScript>,
	delay: Option<Duration>,
	calls: Mutex<Vec<RetrievalCall>>,
}
impl ScriptedRetriever {
	pub fn new<F>(script: F) -> Self
	where
		F: Fn(&RetrievalCall) -> std::result::Result<Vec<Document>, String> + Send + Sync + 'static,
	{
		Self { script: Box::new(script), delay: None, calls: Mutex::new(Vec::new()) }
	}

	pub fn always(docs: Vec<Document>) -> Self {
		Self::new(move |_| Ok(docs.clone()))
	}

	pub fn empty() -> Self {
		Self::always(Vec::new())
	}

	pub fn failing(message: &str) -> Self {
		let message = message.to_string();

		Self::new(move |_| Err(message.clone()))
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn calls(&self) -> Vec<RetrievalCall> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).len()
	}
}
impl RetrieverPort for ScriptedRetriever {
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		filter: Option<&'a StructuredFilter>,
		k: usize,
	) -> BoxFuture<'a, Result<Vec<Document>>> {
		let call = RetrievalCall { query: query.to_string(), filter: filter.cloned(), k };
		let outcome = (self.script)(&call);

		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(call);

		Box::pin(async move {
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			match outcome {
				Ok(mut docs) => {
					docs.truncate(k);

					Ok(docs)
				},
				Err(message) => Err(Error::Storage { message }),
			}
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
	Text(String),
	Fail,
}
impl Reply {
	pub fn text(text: &str) -> Self {
		Self::Text(text.to_string())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmCallKind {
	Rewrite,
	Grade,
	Answer,
	Other,
}

/// Answers rewrite, grading and answer calls with fixed replies, told apart by system prompt.
pub struct ScriptedLlm {
	rewrite: Reply,
	grade: Reply,
	answer: Reply,
	calls: Mutex<Vec<LlmCallKind>>,
}
impl ScriptedLlm {
	pub fn new() -> Self {
		Self {
			rewrite: Reply::text("rewritten query"),
			grade: Reply::text("yes"),
			answer: Reply::text("scripted answer"),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn with_rewrite(mut self, reply: Reply) -> Self {
		self.rewrite = reply;

		self
	}

	pub fn with_grade(mut self, reply: Reply) -> Self {
		self.grade = reply;

		self
	}

	pub fn with_answer(mut self, reply: Reply) -> Self {
		self.answer = reply;

		self
	}

	pub fn calls(&self) -> Vec<LlmCallKind> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn count(&self, kind: LlmCallKind) -> usize {
		self.calls().into_iter().filter(|call| *call == kind).count()
	}

	fn classify(messages: &[ChatMessage]) -> LlmCallKind {
		match messages.first().map(|message| message.content.as_str()) {
			Some(REWRITE_PROMPT) => LlmCallKind::Rewrite,
			Some(ANSWER_PROMPT) => LlmCallKind::Answer,
			Some(GRADE_SYSTEM_PROMPT) => LlmCallKind::Grade,
			_ => LlmCallKind::Other,
		}
	}
}
impl Default for ScriptedLlm {
	fn default() -> Self {
		Self::new()
	}
}
impl LlmPort for ScriptedLlm {
	fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, Result<String>> {
		let kind = Self::classify(messages);
		let reply = match kind {
			LlmCallKind::Rewrite => self.rewrite.clone(),
			LlmCallKind::Grade => self.grade.clone(),
			LlmCallKind::Answer => self.answer.clone(),
			LlmCallKind::Other => Reply::Fail,
		};

		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(kind);

		Box::pin(async move {
			match reply {
				Reply::Text(text) => Ok(text),
				Reply::Fail => {
					Err(Error::Provider { message: "Scripted LLM failure.".to_string() })
				},
			}
		})
	}
}

/// Every completion fails.
#[derive(Default)]
pub struct FailingLlm {
	calls: AtomicUsize,
}
impl FailingLlm {
	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl LlmPort for FailingLlm {
	fn complete<'a>(&'a self, _messages: &'a [ChatMessage]) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async { Err(Error::Provider { message: "LLM unavailable.".to_string() }) })
	}
}

pub struct StaticWebSearch {
	reply: Option<String>,
	configured: bool,
	calls: AtomicUsize,
}
impl StaticWebSearch {
	pub fn new(reply: &str) -> Self {
		Self { reply: Some(reply.to_string()), configured: true, calls: AtomicUsize::new(0) }
	}

	/// Configured, but finds nothing.
	pub fn empty() -> Self {
		Self { reply: None, configured: true, calls: AtomicUsize::new(0) }
	}

	/// Behaves like a provider without credentials.
	pub fn unconfigured() -> Self {
		Self { reply: None, configured: false, calls: AtomicUsize::new(0) }
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl WebSearchPort for StaticWebSearch {
	fn is_configured(&self) -> bool {
		self.configured
	}

	fn search<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let reply = self.reply.clone();

		Box::pin(async move { Ok(reply) })
	}
}

#[derive(Default)]
pub struct FailingWebSearch {
	calls: AtomicUsize,
}
impl FailingWebSearch {
	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl WebSearchPort for FailingWebSearch {
	fn is_configured(&self) -> bool {
		true
	}

	fn search<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async {
			Err(Error::Provider { message: "Search provider unavailable.".to_string() })
		})
	}
}
