use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::{Duration, Instant},
};

use chinchilla_config::Category;
use chinchilla_domain::profile::Profile;
use chinchilla_service::{
	APOLOGY_ANSWER, AgentRequest, AgentService, CategoryConfig, Error, LlmPort, RetrievalStats,
	WebSearchPort,
	cache::ResultCache,
	nodes::{NodeContext, rewrite},
	orchestrator::{self, Limits, Node},
	session::{GradeDecision, SessionState, TraceEvent},
};
use chinchilla_testkit::{
	self as testkit, FailingLlm, FailingWebSearch, LlmCallKind, Reply, ScriptedLlm,
	ScriptedRetriever, StaticWebSearch,
};

fn service_for(
	name: &str,
	retriever: Arc<ScriptedRetriever>,
	llm: Arc<dyn LlmPort>,
	web_search: Arc<dyn WebSearchPort>,
) -> AgentService {
	let cfg = testkit::test_config();
	let category = testkit::category(&cfg, name, retriever);

	testkit::service(cfg, vec![category], llm, web_search)
}

fn senior_profile() -> Profile {
	Profile {
		age: Some(65),
		gender: None,
		location: Some("경기도 수원시".to_string()),
		interest: None,
	}
}

fn trajectory(stats: &RetrievalStats) -> Vec<(u8, u8)> {
	stats
		.trace
		.iter()
		.filter_map(|event| match event {
			TraceEvent::Retrieval { filter_level, retry_count, .. } => {
				Some((*filter_level, *retry_count))
			},
			_ => None,
		})
		.collect()
}

fn path(stats: &RetrievalStats) -> Vec<&str> {
	stats.path.iter().map(String::as_str).collect()
}

#[tokio::test]
async fn widens_filters_until_unfiltered_search_succeeds() {
	let retriever = Arc::new(ScriptedRetriever::new(|call| {
		Ok(if call.filter.is_some() { Vec::new() } else { testkit::docs(5, 0.8) })
	}));
	let service = service_for(
		"jobs",
		retriever.clone(),
		Arc::new(ScriptedLlm::new()),
		Arc::new(StaticWebSearch::new("unused")),
	);
	let response = service
		.query(AgentRequest::new("jobs", "아파트 경비 일자리").with_profile(senior_profile()))
		.await
		.expect("Expected a response.");
	let stats = &response.metadata.retrieval_stats;

	assert_eq!(path(stats), vec![
		"REWRITE",
		"RETRIEVE",
		"GRADE",
		"WIDEN_FILTER",
		"RETRIEVE",
		"GRADE",
		"WIDEN_FILTER",
		"RETRIEVE",
		"GRADE",
		"WIDEN_FILTER",
		"RETRIEVE",
		"GRADE",
		"GENERATE",
	]);
	assert_eq!(stats.filter_level, 3);
	assert_eq!(stats.retry_count, 0);
	assert_eq!(response.answer, "scripted answer");
	assert_eq!(response.sources.len(), 5);
	assert_eq!(stats.origin_counts.get("internal"), Some(&5));

	let calls = retriever.calls();

	assert_eq!(calls.len(), 4);
	assert_eq!(calls.iter().map(|call| call.k).collect::<Vec<_>>(), vec![15, 15, 15, 5]);
	assert_eq!(calls[0].filter.as_ref().map(|filter| filter.conditions.len()), Some(2));
	assert_eq!(calls[1].filter.as_ref().map(|filter| filter.conditions.len()), Some(1));
	assert_eq!(calls[2].filter.as_ref().map(|filter| filter.conditions.len()), Some(0));
	assert!(calls.iter().all(|call| call.query == "rewritten query"));
}

#[tokio::test]
async fn exhausted_recovery_falls_back_to_web_search() {
	let retriever = Arc::new(ScriptedRetriever::empty());
	let web_search = Arc::new(StaticWebSearch::new("From the web."));
	let service =
		service_for("jobs", retriever.clone(), Arc::new(ScriptedLlm::new()), web_search.clone());
	let response = service
		.query(AgentRequest::new("jobs", "senior jobs near me"))
		.await
		.expect("Expected a response.");
	let stats = &response.metadata.retrieval_stats;
	let steps = path(stats);

	assert_eq!(steps.len(), 40);
	assert_eq!(&steps[steps.len() - 3..], ["GRADE", "WEBSEARCH", "GENERATE"]);
	assert_eq!(steps.iter().filter(|step| **step == "INCREMENT_RETRY").count(), 2);
	assert_eq!(retriever.call_count(), 12);
	assert_eq!(trajectory(stats), vec![
		(0, 0),
		(1, 0),
		(2, 0),
		(3, 0),
		(0, 1),
		(1, 1),
		(2, 1),
		(3, 1),
		(0, 2),
		(1, 2),
		(2, 2),
		(3, 2),
	]);
	assert_eq!(web_search.count(), 1);
	assert_eq!(stats.origin_counts.get("web"), Some(&1));
	assert_eq!(response.sources.len(), 1);
	assert_eq!(response.sources[0].content_preview, "From the web.");
}

#[tokio::test]
async fn failing_llm_degrades_every_node() {
	let retriever = Arc::new(ScriptedRetriever::always(testkit::docs(5, 0.8)));
	let llm = Arc::new(FailingLlm::default());
	let service =
		service_for("jobs", retriever, llm.clone(), Arc::new(StaticWebSearch::unconfigured()));
	let response = service
		.query(AgentRequest::new("jobs", "  원래 질문  "))
		.await
		.expect("Expected a response.");

	assert_eq!(response.metadata.rewritten_query, "원래 질문");
	assert_eq!(path(&response.metadata.retrieval_stats), vec![
		"REWRITE", "RETRIEVE", "GRADE", "GENERATE"
	]);
	assert_eq!(response.answer, APOLOGY_ANSWER);
	assert!(response.sources.is_empty());
	assert_eq!(llm.count(), 3);
	assert!(response.metadata.retrieval_stats.trace.iter().any(|event| matches!(
		event,
		TraceEvent::GradeFallback { .. }
	)));
}

#[tokio::test]
async fn zero_documents_are_rejected_without_asking_the_llm() {
	let llm = Arc::new(ScriptedLlm::new().with_grade(Reply::text("yes")));
	let service = service_for(
		"jobs",
		Arc::new(ScriptedRetriever::empty()),
		llm.clone(),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let response =
		service.query(AgentRequest::new("jobs", "anything")).await.expect("Expected a response.");

	assert_eq!(llm.count(LlmCallKind::Grade), 0);
	assert_eq!(llm.count(LlmCallKind::Rewrite), 3);
	assert_eq!(llm.count(LlmCallKind::Answer), 1);
	assert!(response.metadata.retrieval_stats.trace.iter().any(|event| matches!(
		event,
		TraceEvent::WebSearchSkipped { reason } if reason == "missing_api_key"
	)));
}

#[tokio::test]
async fn documents_below_threshold_are_rejected() {
	let llm = Arc::new(ScriptedLlm::new());
	let service = service_for(
		"jobs",
		Arc::new(ScriptedRetriever::always(testkit::docs(5, 0.1))),
		llm.clone(),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let response =
		service.query(AgentRequest::new("jobs", "anything")).await.expect("Expected a response.");

	assert_eq!(llm.count(LlmCallKind::Grade), 0);
	assert_eq!(response.metadata.retrieval_stats.retry_count, 2);
	assert_eq!(response.metadata.retrieval_stats.filter_level, 3);
}

#[tokio::test]
async fn reject_policy_recovers_when_grading_is_unavailable() {
	let llm = Arc::new(ScriptedLlm::new().with_grade(Reply::Fail));
	let service = service_for(
		"legal",
		Arc::new(ScriptedRetriever::always(testkit::docs(5, 0.9))),
		llm.clone(),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let response = service
		.query(AgentRequest::new("legal", "임대차 보증금 반환"))
		.await
		.expect("Expected a response.");
	let stats = &response.metadata.retrieval_stats;

	assert_eq!(path(stats), vec![
		"REWRITE",
		"RETRIEVE",
		"GRADE",
		"INCREMENT_RETRY",
		"REWRITE",
		"RETRIEVE",
		"GRADE",
		"INCREMENT_RETRY",
		"REWRITE",
		"RETRIEVE",
		"GRADE",
		"WEBSEARCH",
		"GENERATE",
	]);
	assert_eq!(llm.count(LlmCallKind::Grade), 3);
	let fallbacks = stats
		.trace
		.iter()
		.filter(|event| matches!(event, TraceEvent::GradeFallback { .. }))
		.count();

	assert_eq!(fallbacks, 3);
	assert_eq!(response.answer, "scripted answer");
}

#[tokio::test]
async fn inconclusive_grade_uses_accept_policy() {
	let service = service_for(
		"jobs",
		Arc::new(ScriptedRetriever::always(testkit::docs(3, 0.5))),
		Arc::new(ScriptedLlm::new().with_grade(Reply::text("it depends"))),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let response =
		service.query(AgentRequest::new("jobs", "anything")).await.expect("Expected a response.");

	assert_eq!(path(&response.metadata.retrieval_stats), vec![
		"REWRITE", "RETRIEVE", "GRADE", "GENERATE"
	]);
}

#[tokio::test]
async fn explicit_no_rejects() {
	let service = service_for(
		"jobs",
		Arc::new(ScriptedRetriever::always(testkit::docs(3, 0.5))),
		Arc::new(ScriptedLlm::new().with_grade(Reply::text("No"))),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let response =
		service.query(AgentRequest::new("jobs", "anything")).await.expect("Expected a response.");

	assert_eq!(response.metadata.retrieval_stats.path.len(), 40);
}

#[tokio::test]
async fn rewrite_only_category_never_filters() {
	let retriever = Arc::new(ScriptedRetriever::empty());
	let service = service_for(
		"legal",
		retriever.clone(),
		Arc::new(ScriptedLlm::new()),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let response = service
		.query(AgentRequest::new("legal", "question").with_profile(senior_profile()))
		.await
		.expect("Expected a response.");

	assert_eq!(response.metadata.retrieval_stats.path.len(), 13);
	assert_eq!(retriever.call_count(), 3);
	assert!(retriever.calls().iter().all(|call| call.filter.is_none() && call.k == 5));
}

#[test]
fn retries_ask_for_a_different_query() {
	let cfg = testkit::test_config();
	let category = testkit::category(&cfg, "legal", Arc::new(ScriptedRetriever::empty()));
	let state = SessionState {
		retry_count: 1,
		rewritten_query: "first attempt".to_string(),
		..SessionState::new("legal", "question")
	};
	let messages = rewrite::rewrite_messages(&category, &state, 8);
	let prompt = &messages.last().expect("Expected a user message.").content;

	assert_eq!(messages[0].content, testkit::REWRITE_PROMPT);
	assert!(prompt.contains("Previous search query: first attempt"));
	assert!(prompt.contains("Question: question"));
}

#[tokio::test]
async fn failing_web_search_still_generates() {
	let web_search = Arc::new(FailingWebSearch::default());
	let service = service_for(
		"jobs",
		Arc::new(ScriptedRetriever::empty()),
		Arc::new(ScriptedLlm::new()),
		web_search.clone(),
	);
	let response =
		service.query(AgentRequest::new("jobs", "anything")).await.expect("Expected a response.");

	assert_eq!(web_search.count(), 1);
	assert_eq!(response.answer, "scripted answer");
	assert!(response.sources.is_empty());
	assert!(
		response
			.metadata
			.retrieval_stats
			.trace
			.iter()
			.any(|event| matches!(event, TraceEvent::WebSearchError { .. }))
	);
}

#[tokio::test]
async fn retrieval_errors_degrade_to_empty_results() {
	let service = service_for(
		"jobs",
		Arc::new(ScriptedRetriever::failing("collection missing")),
		Arc::new(ScriptedLlm::new()),
		Arc::new(StaticWebSearch::new("web")),
	);
	let response =
		service.query(AgentRequest::new("jobs", "anything")).await.expect("Expected a response.");
	let failures = response
		.metadata
		.retrieval_stats
		.trace
		.iter()
		.filter(|event| matches!(event, TraceEvent::RetrievalFailed { .. }))
		.count();

	assert_eq!(failures, 12);
	assert_eq!(response.answer, "scripted answer");
}

#[tokio::test]
async fn disabled_web_search_is_skipped() {
	let web_search = Arc::new(StaticWebSearch::new("web"));
	let service = service_for(
		"scam_defense",
		Arc::new(ScriptedRetriever::empty()),
		Arc::new(ScriptedLlm::new()),
		web_search.clone(),
	);
	let response = service
		.query(AgentRequest::new("scam_defense", "이 문자 사기인가요?"))
		.await
		.expect("Expected a response.");

	assert_eq!(web_search.count(), 0);
	assert!(response.metadata.retrieval_stats.trace.iter().any(|event| matches!(
		event,
		TraceEvent::WebSearchSkipped { reason } if reason == "disabled"
	)));
}

#[tokio::test]
async fn unknown_category_fails_before_any_node_runs() {
	let retriever = Arc::new(ScriptedRetriever::empty());
	let llm = Arc::new(ScriptedLlm::new());
	let service = service_for(
		"jobs",
		retriever.clone(),
		llm.clone(),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let err = service
		.query(AgentRequest::new("astrology", "anything"))
		.await
		.expect_err("Expected category error.");

	assert!(matches!(err, Error::CategoryNotFound { category } if category == "astrology"));
	assert_eq!(retriever.call_count(), 0);
	assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn blank_query_is_invalid() {
	let service = service_for(
		"jobs",
		Arc::new(ScriptedRetriever::empty()),
		Arc::new(ScriptedLlm::new()),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let err = service.query(AgentRequest::new("jobs", "   ")).await.expect_err("Expected error.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn step_ceiling_aborts_the_request() {
	// The category is resolved under the default ceiling; only the running service is lowered.
	let category =
		testkit::category(&testkit::test_config(), "jobs", Arc::new(ScriptedRetriever::empty()));
	let mut cfg = testkit::test_config();

	cfg.orchestrator.step_ceiling = 10;

	let service = testkit::service(
		cfg,
		vec![category],
		Arc::new(ScriptedLlm::new()),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let err =
		service.query(AgentRequest::new("jobs", "anything")).await.expect_err("Expected error.");

	assert!(matches!(err, Error::StepCeilingExceeded { ceiling: 10 }));
}

#[tokio::test]
async fn deadline_is_checked_between_nodes() {
	let mut cfg = testkit::test_config();

	cfg.service.request_timeout_ms = 50;

	let retriever = Arc::new(ScriptedRetriever::empty().with_delay(Duration::from_millis(120)));
	let category = testkit::category(&cfg, "jobs", retriever.clone());
	let service = testkit::service(
		cfg,
		vec![category],
		Arc::new(ScriptedLlm::new()),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let err =
		service.query(AgentRequest::new("jobs", "anything")).await.expect_err("Expected error.");

	assert!(matches!(err, Error::DeadlineExceeded { .. }));
	assert_eq!(retriever.call_count(), 1);
}

#[tokio::test]
async fn expired_deadline_runs_no_nodes() {
	let cfg = testkit::test_config();
	let retriever = Arc::new(ScriptedRetriever::empty());
	let category = testkit::category(&cfg, "jobs", retriever.clone());
	let llm = ScriptedLlm::new();
	let web_search = StaticWebSearch::unconfigured();
	let cache = ResultCache::new(4);
	let ctx = NodeContext {
		category: &category,
		llm: &llm,
		web_search: &web_search,
		scan_cache: &cache,
		history_turns: 8,
		fanout_timeout: Duration::from_secs(1),
	};
	let limits = Limits { max_retries: 2, max_filter_level: 3, step_ceiling: 50 };
	let result = orchestrator::run(
		&ctx,
		SessionState::new("jobs", "anything"),
		limits,
		Some(Instant::now() - Duration::from_millis(1)),
	)
	.await;

	assert!(matches!(result, Err(Error::DeadlineExceeded { .. })));
	assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn every_grade_sequence_terminates_within_bounds() {
	let limits = Limits { max_retries: 2, max_filter_level: 3, step_ceiling: 50 };

	// Accept on the n-th retrieval for every n, 13 meaning never.
	for accept_at in 1..=13 {
		let seen = Arc::new(AtomicUsize::new(0));
		let retriever = Arc::new(ScriptedRetriever::new({
			let seen = Arc::clone(&seen);

			move |_| {
				let nth = seen.fetch_add(1, Ordering::SeqCst) + 1;

				Ok(if nth == accept_at { testkit::docs(5, 0.9) } else { Vec::new() })
			}
		}));
		let cfg = testkit::test_config();
		let category = testkit::category(&cfg, "jobs", retriever.clone());
		let llm = ScriptedLlm::new();
		let web_search = StaticWebSearch::new("web");
		let cache = ResultCache::new(4);
		let ctx = NodeContext {
			category: &category,
			llm: &llm,
			web_search: &web_search,
			scan_cache: &cache,
			history_turns: 8,
			fanout_timeout: Duration::from_secs(1),
		};
		let execution = orchestrator::run(
			&ctx,
			SessionState::new("jobs", "anything"),
			limits,
			None,
		)
		.await
		.expect("Expected the run to finish.");

		assert!(execution.path.len() <= 40, "accept_at={accept_at}");
		assert_eq!(execution.path.last(), Some(&Node::Generate));
		assert!(execution.state.filter_level <= 3);
		assert!(execution.state.retry_count <= 2);

		let mut previous_retry = 0;

		for event in &execution.state.trace {
			if let TraceEvent::Retrieval { filter_level, retry_count, .. } = event {
				if *retry_count > previous_retry {
					assert_eq!(*filter_level, 0, "Filter level must reset on retry.");
				}

				previous_retry = *retry_count;
			}
		}

		if accept_at <= 12 {
			assert_eq!(execution.state.grade_decision, Some(GradeDecision::Accept));
			assert_eq!(retriever.call_count(), accept_at);
		} else {
			assert_eq!(execution.path.len(), 40);
			assert_eq!(retriever.call_count(), 12);
		}
	}
}

#[tokio::test]
async fn identical_runs_follow_identical_trajectories() {
	let run = || async {
		let service = service_for(
			"jobs",
			Arc::new(ScriptedRetriever::new(|call| {
				Ok(match call.filter.as_ref().map(|filter| filter.level) {
					Some(2) => testkit::docs(4, 0.6),
					_ => Vec::new(),
				})
			})),
			Arc::new(ScriptedLlm::new()),
			Arc::new(StaticWebSearch::unconfigured()),
		);

		service
			.query(AgentRequest::new("jobs", "q").with_profile(senior_profile()))
			.await
			.expect("Expected a response.")
	};
	let first = run().await;
	let second = run().await;

	assert_eq!(
		trajectory(&first.metadata.retrieval_stats),
		trajectory(&second.metadata.retrieval_stats)
	);
	assert_eq!(trajectory(&first.metadata.retrieval_stats), vec![(0, 0), (1, 0), (2, 0)]);
}

#[tokio::test]
async fn concurrent_requests_do_not_share_sessions() {
	let service = Arc::new(service_for(
		"jobs",
		Arc::new(ScriptedRetriever::new(|call| {
			Ok(if call.query.contains("rewritten") { testkit::docs(5, 0.9) } else { Vec::new() })
		})),
		Arc::new(ScriptedLlm::new()),
		Arc::new(StaticWebSearch::unconfigured()),
	));
	let handles: Vec<_> = (0..8)
		.map(|idx| {
			let service = Arc::clone(&service);

			tokio::spawn(async move {
				service.query(AgentRequest::new("jobs", format!("question {idx}"))).await
			})
		})
		.collect();

	for handle in handles {
		let response = handle.await.expect("Task panicked.").expect("Expected a response.");

		assert_eq!(response.metadata.retrieval_stats.path.len(), 4);
	}
}

#[test]
fn categories_beyond_the_filter_ladder_are_rejected() {
	let cfg = testkit::test_config();
	let settings = Category { max_filter_level: Some(5), ..testkit::test_category("jobs") };
	let result = CategoryConfig::from_settings(
		"jobs",
		&settings,
		&cfg.orchestrator,
		Arc::new(ScriptedRetriever::empty()),
		None,
	);

	assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[test]
fn categories_exceeding_the_step_ceiling_are_rejected() {
	let mut cfg = testkit::test_config();

	cfg.orchestrator.step_ceiling = 39;

	let settings = testkit::test_category("jobs");
	let result = CategoryConfig::from_settings(
		"jobs",
		&settings,
		&cfg.orchestrator,
		Arc::new(ScriptedRetriever::empty()),
		None,
	);

	assert!(matches!(result, Err(Error::Configuration { .. })));

	cfg.orchestrator.step_ceiling = 40;

	let accepted = CategoryConfig::from_settings(
		"jobs",
		&settings,
		&cfg.orchestrator,
		Arc::new(ScriptedRetriever::empty()),
		None,
	);

	assert!(accepted.is_ok());
}
