use std::sync::Arc;

use tracing::{debug, warn};

use chinchilla_domain::{
	document::Document,
	filter::{self, MAX_FILTER_LEVEL, StructuredFilter},
	pattern::{self, PatternDataset, PatternScan},
	quality,
};

use crate::{
	Result,
	cache,
	fanout::{self, Branch},
	nodes::NodeContext,
	session::{SessionPatch, SessionState, TraceEvent},
};

/// Maps a category's own filter level onto the shared widening ladder.
///
/// Categories with fewer widening steps use the tail of the ladder, so their last level is always
/// an unfiltered search and a category without widening never filters at all.
pub fn ladder_level(max_filter_level: u8, filter_level: u8) -> u8 {
	let offset = MAX_FILTER_LEVEL.saturating_sub(max_filter_level.min(MAX_FILTER_LEVEL));

	offset.saturating_add(filter_level).min(MAX_FILTER_LEVEL)
}

/// Number of documents to ask the retriever for. Over-fetches when a client-side post filter
/// will drop some of them.
pub fn fetch_size(
	top_k: usize,
	fetch_multiplier: usize,
	filter: Option<&StructuredFilter>,
) -> usize {
	match filter {
		Some(filter) if filter.has_post_filter() => top_k.saturating_mul(fetch_multiplier.max(1)),
		_ => top_k,
	}
}

pub async fn retrieve(ctx: &NodeContext<'_>, state: &SessionState) -> SessionPatch {
	let category = ctx.category;
	let query = state.search_query().to_string();
	let level = ladder_level(category.max_filter_level, state.filter_level);
	let filter = filter::filter_for_level(state.profile.as_ref(), level);
	let requested = fetch_size(category.top_k, category.fetch_multiplier, filter.as_ref());
	let retrieval = category.retriever.retrieve(&query, filter.as_ref(), requested);
	let mut patch = SessionPatch::default();
	let retrieved = match &category.patterns {
		Some(dataset) if !state.pattern_scan_attempted => {
			let (retrieved, scan) = retrieve_with_scan(ctx, state, dataset, retrieval).await;

			record_scan(ctx, state, scan, &mut patch);

			retrieved
		},
		Some(_) => fanout::bounded(retrieval, ctx.fanout_timeout).await,
		None => match retrieval.await {
			Ok(docs) => Branch::Ready(docs),
			Err(err) => Branch::Failed(err.to_string()),
		},
	};
	let docs = match retrieved {
		Branch::Ready(docs) => docs,
		Branch::Failed(error) => {
			warn!(
				category = %category.name,
				filter_level = state.filter_level,
				error = %error,
				"Retrieval failed. Continuing with no documents."
			);
			patch
				.trace
				.push(TraceEvent::RetrievalFailed { filter_level: state.filter_level, error });

			Vec::new()
		},
		Branch::TimedOut => {
			warn!(
				category = %category.name,
				filter_level = state.filter_level,
				"Retrieval timed out. Continuing with no documents."
			);
			patch.trace.push(TraceEvent::RetrievalTimedOut { filter_level: state.filter_level });

			Vec::new()
		},
	};
	let docs = finalize(docs, filter.as_ref(), category.top_k);
	let report = quality::assess(&docs, category.relevance_threshold);

	debug!(
		category = %category.name,
		filter_level = state.filter_level,
		retry_count = state.retry_count,
		filter = filter::describe_level(level),
		count = report.count,
		quality = report.quality.as_str(),
		"Retrieved documents."
	);

	patch.trace.push(TraceEvent::Retrieval {
		filter_level: state.filter_level,
		retry_count: state.retry_count,
		query,
		requested,
		count: report.count,
		quality: report.quality,
		avg_score: report.avg_score,
	});
	patch.documents = Some(docs);
	patch.search_quality = Some(report.quality);
	patch.avg_relevance_score = Some(report.avg_score);

	patch
}

fn finalize(docs: Vec<Document>, filter: Option<&StructuredFilter>, top_k: usize) -> Vec<Document> {
	let mut docs = match filter {
		Some(filter) if filter.has_post_filter() => filter.apply_post_filter(docs),
		_ => docs,
	};

	docs.truncate(top_k);

	docs
}

/// Runs retrieval and the pattern scan side by side. A cached scan skips the scan branch.
async fn retrieve_with_scan<F>(
	ctx: &NodeContext<'_>,
	state: &SessionState,
	dataset: &Arc<PatternDataset>,
	retrieval: F,
) -> (Branch<Vec<Document>>, ScanOutcome)
where
	F: Future<Output = Result<Vec<Document>>>,
{
	let key = cache::scan_key(&state.original_query, state.sender.as_deref());

	if let Some(scan) = ctx.scan_cache.get(&key) {
		let retrieved = fanout::bounded(retrieval, ctx.fanout_timeout).await;

		return (retrieved, ScanOutcome::Cached(scan));
	}

	let dataset = Arc::clone(dataset);
	let query = state.original_query.clone();
	let sender = state.sender.clone();
	let scan =
		tokio::task::spawn_blocking(move || pattern::scan(&dataset, &query, sender.as_deref()));
	let (retrieved, scanned) = fanout::join_bounded(retrieval, scan, ctx.fanout_timeout).await;
	let outcome = match scanned {
		Branch::Ready(scan) => ScanOutcome::Fresh { key, scan },
		Branch::Failed(error) => ScanOutcome::Failed(error),
		Branch::TimedOut => ScanOutcome::Failed("timed out".to_string()),
	};

	(retrieved, outcome)
}

enum ScanOutcome {
	Cached(PatternScan),
	Fresh { key: String, scan: PatternScan },
	Failed(String),
}

fn record_scan(
	ctx: &NodeContext<'_>,
	state: &SessionState,
	outcome: ScanOutcome,
	patch: &mut SessionPatch,
) {
	patch.pattern_scan_attempted = Some(true);

	let (scan, cached) = match outcome {
		ScanOutcome::Cached(scan) => (scan, true),
		ScanOutcome::Fresh { key, scan } => {
			ctx.scan_cache.insert(key, scan.clone());

			(scan, false)
		},
		ScanOutcome::Failed(error) => {
			warn!(
				category = %ctx.category.name,
				error = %error,
				"Pattern scan failed. Continuing without it."
			);
			patch.trace.push(TraceEvent::PatternScanFailed { error });

			return;
		},
	};
	let mut web_documents = state.web_documents.clone();

	patch.trace.push(TraceEvent::PatternScan { cached, documents: scan.documents.len() });
	web_documents.extend(scan.documents);
	patch.web_documents = Some(web_documents);
	patch.pattern_analysis = Some(scan.analysis);
}
