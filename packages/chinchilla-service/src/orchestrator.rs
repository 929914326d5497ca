//! The bounded state machine that sequences the nodes of one request.
//!
//! ```text
//! REWRITE -> RETRIEVE -> GRADE
//! GRADE(accept)                                  -> GENERATE
//! GRADE(reject, level < max level)               -> WIDEN_FILTER -> RETRIEVE
//! GRADE(reject, level == max, retry < max)       -> INCREMENT_RETRY -> REWRITE
//! GRADE(reject, level == max, retry == max)      -> WEBSEARCH -> GENERATE
//! GENERATE -> END
//! ```

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error};

use crate::{
	Error, Result,
	nodes::{self, NodeContext},
	registry::CategoryConfig,
	session::{GradeDecision, SessionState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Node {
	Rewrite,
	Retrieve,
	Grade,
	WidenFilter,
	IncrementRetry,
	WebSearch,
	Generate,
	End,
}
impl Node {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Rewrite => "REWRITE",
			Self::Retrieve => "RETRIEVE",
			Self::Grade => "GRADE",
			Self::WidenFilter => "WIDEN_FILTER",
			Self::IncrementRetry => "INCREMENT_RETRY",
			Self::WebSearch => "WEBSEARCH",
			Self::Generate => "GENERATE",
			Self::End => "END",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
	pub max_retries: u8,
	pub max_filter_level: u8,
	/// Maximum node executions per request.
	pub step_ceiling: u32,
}
impl Limits {
	pub fn for_category(category: &CategoryConfig, step_ceiling: u32) -> Self {
		Self {
			max_retries: category.max_retries,
			max_filter_level: category.max_filter_level,
			step_ceiling,
		}
	}
}

/// The finished session and the nodes executed to reach it, `END` excluded.
#[derive(Debug, Clone)]
pub struct Execution {
	pub state: SessionState,
	pub path: Vec<Node>,
}

/// Recovery strategies in priority order: widen the filter, then retry with a new rewrite, then
/// fall back to web search.
pub fn route_after_grade(
	decision: Option<GradeDecision>,
	filter_level: u8,
	retry_count: u8,
	limits: &Limits,
) -> Node {
	if decision == Some(GradeDecision::Accept) {
		return Node::Generate;
	}
	if filter_level < limits.max_filter_level {
		return Node::WidenFilter;
	}
	if retry_count < limits.max_retries {
		return Node::IncrementRetry;
	}

	Node::WebSearch
}

pub fn next_node(current: Node, state: &SessionState, limits: &Limits) -> Node {
	match current {
		Node::Rewrite => Node::Retrieve,
		Node::Retrieve => Node::Grade,
		Node::Grade => {
			route_after_grade(state.grade_decision, state.filter_level, state.retry_count, limits)
		},
		Node::WidenFilter => Node::Retrieve,
		Node::IncrementRetry => Node::Rewrite,
		Node::WebSearch => Node::Generate,
		Node::Generate | Node::End => Node::End,
	}
}

/// Drives one request from `REWRITE` to `END`.
///
/// The deadline is checked between nodes; a running node always finishes.
pub async fn run(
	ctx: &NodeContext<'_>,
	mut state: SessionState,
	limits: Limits,
	deadline: Option<Instant>,
) -> Result<Execution> {
	let started = Instant::now();
	let mut node = Node::Rewrite;
	let mut path = Vec::new();

	while node != Node::End {
		if path.len() as u32 >= limits.step_ceiling {
			error!(
				category = %state.category,
				step_ceiling = limits.step_ceiling,
				filter_level = state.filter_level,
				retry_count = state.retry_count,
				"Step ceiling exceeded."
			);

			return Err(Error::StepCeilingExceeded { ceiling: limits.step_ceiling });
		}
		if let Some(deadline) = deadline
			&& Instant::now() >= deadline
		{
			return Err(Error::DeadlineExceeded {
				elapsed_ms: started.elapsed().as_millis() as u64,
			});
		}

		debug!(
			category = %state.category,
			node = node.as_str(),
			filter_level = state.filter_level,
			retry_count = state.retry_count,
			"Executing node."
		);

		let patch = nodes::execute(node, ctx, &state, &limits).await;

		patch.apply(&mut state);
		path.push(node);

		node = next_node(node, &state, &limits);
	}

	Ok(Execution { state, path })
}
