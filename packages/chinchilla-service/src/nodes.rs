//! Node functions. Each reads the session and returns a patch; none of them mutate shared state
//! except the scan cache, which is written only after a scan has completed.

pub mod generate;
pub mod grade;
pub mod recovery;
pub mod retrieve;
pub mod rewrite;
pub mod websearch;

pub use generate::APOLOGY_ANSWER;
pub use grade::GRADE_SYSTEM_PROMPT;

use std::time::Duration;

use chinchilla_domain::pattern::PatternScan;

use crate::{
	LlmPort, WebSearchPort,
	cache::ResultCache,
	orchestrator::{Limits, Node},
	registry::CategoryConfig,
	session::{SessionPatch, SessionState},
};

/// Read-only collaborators a node may use.
pub struct NodeContext<'a> {
	pub category: &'a CategoryConfig,
	pub llm: &'a dyn LlmPort,
	pub web_search: &'a dyn WebSearchPort,
	pub scan_cache: &'a ResultCache<PatternScan>,
	pub history_turns: usize,
	pub fanout_timeout: Duration,
}

pub async fn execute(
	node: Node,
	ctx: &NodeContext<'_>,
	state: &SessionState,
	limits: &Limits,
) -> SessionPatch {
	match node {
		Node::Rewrite => rewrite::rewrite(ctx, state).await,
		Node::Retrieve => retrieve::retrieve(ctx, state).await,
		Node::Grade => grade::grade(ctx, state).await,
		Node::WidenFilter => recovery::widen_filter(state, limits),
		Node::IncrementRetry => recovery::increment_retry(state, limits),
		Node::WebSearch => websearch::web_search(ctx, state).await,
		Node::Generate => generate::generate(ctx, state).await,
		Node::End => SessionPatch::default(),
	}
}
