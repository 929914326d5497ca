pub mod cache;
pub mod fanout;
pub mod nodes;
pub mod orchestrator;
pub mod registry;
pub mod request;
pub mod session;
pub mod vector;

mod error;

pub use error::{Error, Result};
pub use nodes::{APOLOGY_ANSWER, GRADE_SYSTEM_PROMPT};
pub use registry::{CategoryConfig, GradeFailurePolicy, Registry, RetrieverFactory};
pub use request::{AgentRequest, AgentResponse, ResponseMetadata, RetrievalStats, SourcePreview};

use std::{
	future::Future,
	pin::Pin,
	sync::Arc,
	time::{Duration, Instant},
};

use tracing::{info, warn};
use uuid::Uuid;

use chinchilla_config::{Config, LlmProviderConfig, WebSearchProviderConfig};
use chinchilla_domain::{
	conversation::ChatMessage, document::Document, filter::StructuredFilter, pattern::PatternScan,
};
use chinchilla_providers::{chat, web_search};
use chinchilla_storage::qdrant::QdrantStore;

use crate::{
	cache::ResultCache,
	nodes::NodeContext,
	orchestrator::{Execution, Limits},
	session::SessionState,
	vector::VectorRetrieverFactory,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Chat completion capability. Failures are transient and callers always degrade.
pub trait LlmPort
where
	Self: Send + Sync,
{
	fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, Result<String>>;
}

/// Similarity search over one category's knowledge store.
///
/// Returns at most `k` documents in descending relevance, and an empty list when nothing
/// matches.
pub trait RetrieverPort
where
	Self: Send + Sync,
{
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		filter: Option<&'a StructuredFilter>,
		k: usize,
	) -> BoxFuture<'a, Result<Vec<Document>>>;
}

/// External search used once internal recovery is exhausted.
pub trait WebSearchPort
where
	Self: Send + Sync,
{
	/// `false` when credentials are missing, which turns the search into a skip.
	fn is_configured(&self) -> bool;

	/// `Ok(None)` means the provider answered without usable text.
	fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Option<String>>>;
}

#[derive(Clone)]
pub struct Ports {
	pub llm: Arc<dyn LlmPort>,
	pub web_search: Arc<dyn WebSearchPort>,
}
impl Ports {
	pub fn new(llm: Arc<dyn LlmPort>, web_search: Arc<dyn WebSearchPort>) -> Self {
		Self { llm, web_search }
	}

	pub fn from_config(cfg: &Config) -> Self {
		Self {
			llm: Arc::new(HttpLlm { cfg: cfg.providers.llm.clone() }),
			web_search: Arc::new(HttpWebSearch { cfg: cfg.providers.web_search.clone() }),
		}
	}
}

pub struct AgentService {
	pub cfg: Config,
	pub registry: Registry,
	pub ports: Ports,
	pub scan_cache: Arc<ResultCache<PatternScan>>,
}
impl AgentService {
	/// Wires the HTTP providers and a Qdrant-backed retriever for every configured category.
	pub fn new(cfg: Config) -> Result<Self> {
		let store = Arc::new(QdrantStore::new(&cfg.storage.qdrant)?);
		let factory = VectorRetrieverFactory::new(store, cfg.providers.embedding.clone());
		let registry = Registry::from_config(&cfg, &factory)?;
		let ports = Ports::from_config(&cfg);

		Ok(Self::with_ports(cfg, registry, ports))
	}

	pub fn with_ports(cfg: Config, registry: Registry, ports: Ports) -> Self {
		let scan_cache = Arc::new(ResultCache::new(cfg.cache.capacity));

		Self { cfg, registry, ports, scan_cache }
	}

	pub fn categories(&self) -> Vec<String> {
		self.registry.names()
	}

	pub fn web_search_configured(&self) -> bool {
		self.ports.web_search.is_configured()
	}

	pub async fn query(&self, req: AgentRequest) -> Result<AgentResponse> {
		let started = Instant::now();
		let category = self.registry.get(&req.category)?;

		if req.query.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let request_id = Uuid::new_v4();
		let limits = Limits::for_category(&category, self.cfg.orchestrator.step_ceiling);
		let deadline = started + Duration::from_millis(self.cfg.service.request_timeout_ms);
		let ctx = NodeContext {
			category: &category,
			llm: self.ports.llm.as_ref(),
			web_search: self.ports.web_search.as_ref(),
			scan_cache: self.scan_cache.as_ref(),
			history_turns: self.cfg.orchestrator.history_turns,
			fanout_timeout: Duration::from_millis(self.cfg.orchestrator.fanout_timeout_ms),
		};
		let mut state = SessionState::new(category.name.clone(), req.query.trim());

		state.profile = req.profile.filter(|profile| !profile.is_empty());
		state.history = req.history;
		state.sender = req.sender.filter(|sender| !sender.trim().is_empty());

		let execution = match orchestrator::run(&ctx, state, limits, Some(deadline)).await {
			Ok(execution) => execution,
			Err(err) => {
				warn!(%request_id, category = %category.name, error = %err, "Agent run aborted.");

				return Err(err);
			},
		};

		info!(
			%request_id,
			category = %category.name,
			steps = execution.path.len(),
			filter_level = execution.state.filter_level,
			retry_count = execution.state.retry_count,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Agent run finished."
		);

		Ok(build_response(request_id, execution))
	}
}

struct HttpLlm {
	cfg: LlmProviderConfig,
}
impl LlmPort for HttpLlm {
	fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(chat::complete(&self.cfg, messages).await?) })
	}
}

struct HttpWebSearch {
	cfg: WebSearchProviderConfig,
}
impl WebSearchPort for HttpWebSearch {
	fn is_configured(&self) -> bool {
		self.cfg.api_key.is_some()
	}

	fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move { Ok(web_search::search(&self.cfg, query).await?) })
	}
}

fn build_response(request_id: Uuid, execution: Execution) -> AgentResponse {
	let Execution { state, path } = execution;
	let answer = state.answer.unwrap_or_else(|| APOLOGY_ANSWER.to_string());

	AgentResponse {
		answer,
		sources: state.sources,
		metadata: ResponseMetadata {
			request_id,
			category: state.category,
			rewritten_query: state.rewritten_query,
			retrieval_stats: RetrievalStats {
				origin_counts: state.origin_counts,
				path: path.iter().map(|node| node.as_str().to_string()).collect(),
				trace: state.trace,
				filter_level: state.filter_level,
				retry_count: state.retry_count,
				search_quality: state.search_quality,
				avg_relevance_score: state.avg_relevance_score,
				pattern_analysis: state.pattern_analysis,
			},
		},
	}
}
