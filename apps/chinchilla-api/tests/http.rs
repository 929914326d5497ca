use std::{sync::Arc, time::Duration};

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use chinchilla_api::{routes, state::AppState};
use chinchilla_testkit::{self as testkit, ScriptedLlm, ScriptedRetriever, StaticWebSearch};

fn app_with(retriever: Arc<ScriptedRetriever>, request_timeout_ms: u64) -> Router {
	let mut cfg = testkit::test_config();

	cfg.service.request_timeout_ms = request_timeout_ms;

	let categories = ["jobs", "legal"]
		.into_iter()
		.map(|name| testkit::category(&cfg, name, retriever.clone()))
		.collect();
	let service = testkit::service(
		cfg,
		categories,
		Arc::new(ScriptedLlm::new()),
		Arc::new(StaticWebSearch::unconfigured()),
	);

	routes::router(AppState::from_service(service))
}

fn app() -> Router {
	app_with(Arc::new(ScriptedRetriever::always(testkit::docs(3, 0.9))), 30_000)
}

async fn post_query(app: Router, payload: Value) -> (StatusCode, Value) {
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/agent/query")
				.header("content-type", "application/json")
				.body(Body::from(payload.to_string()))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /v1/agent/query.");
	let status = response.status();
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = serde_json::from_slice(&body).expect("Failed to parse response.");

	(status, json)
}

#[tokio::test]
async fn health_lists_categories() {
	for uri in ["/", "/health"] {
		let response = app()
			.oneshot(
				Request::builder().uri(uri).body(Body::empty()).expect("Failed to build request."),
			)
			.await
			.expect("Failed to call the info endpoint.");

		assert_eq!(response.status(), StatusCode::OK);

		let body = body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Failed to read response body.");
		let json: Value = serde_json::from_slice(&body).expect("Failed to parse response.");

		assert_eq!(json["status"], "ok");
		assert_eq!(json["categories"], json!(["jobs", "legal"]));
		assert_eq!(json["web_search_configured"], false);
	}
}

#[tokio::test]
async fn answers_a_query() {
	let (status, json) = post_query(
		app(),
		json!({
			"category": "jobs",
			"query": "경비 일자리 있나요?",
			"profile": { "age": 67, "location": "서울 강남구" },
			"history": [
				{ "role": "user", "content": "안녕하세요" },
				{ "role": "assistant", "content": "무엇을 도와드릴까요?" }
			]
		}),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["answer"], "scripted answer");
	assert_eq!(json["sources"].as_array().map(Vec::len), Some(3));
	assert_eq!(json["metadata"]["category"], "jobs");
	assert_eq!(json["metadata"]["rewritten_query"], "rewritten query");
	assert_eq!(json["metadata"]["retrieval_stats"]["path"], json!([
		"REWRITE", "RETRIEVE", "GRADE", "GENERATE"
	]));
	assert_eq!(json["metadata"]["retrieval_stats"]["origin_counts"]["internal"], 3);
	assert!(json["metadata"]["request_id"].is_string());
	assert!(json["metadata"]["retrieval_stats"].get("pattern_analysis").is_none());
}

#[tokio::test]
async fn rejects_blank_queries() {
	let (status, json) = post_query(app(), json!({ "category": "jobs", "query": "   " })).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_REQUEST");
	assert_eq!(json["fields"][0], "$.query");
}

#[tokio::test]
async fn rejects_overlong_queries() {
	let retriever = Arc::new(ScriptedRetriever::empty());
	let app = app_with(retriever.clone(), 30_000);
	let query = "가".repeat(routes::MAX_QUERY_CHARS + 1);
	let (status, json) = post_query(app, json!({ "category": "jobs", "query": query })).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_REQUEST");
	assert_eq!(retriever.call_count(), 0);
}

#[tokio::test]
async fn accepts_a_query_at_the_length_limit() {
	let query = "a".repeat(routes::MAX_QUERY_CHARS);
	let (status, _) = post_query(app(), json!({ "category": "jobs", "query": query })).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_category_is_a_bad_request() {
	let (status, json) =
		post_query(app(), json!({ "category": "horoscope", "query": "오늘 운세" })).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "CATEGORY_NOT_FOUND");
	assert_eq!(json["fields"][0], "$.category");
}

#[tokio::test]
async fn deadline_maps_to_gateway_timeout() {
	let retriever = Arc::new(ScriptedRetriever::empty().with_delay(Duration::from_millis(120)));
	let (status, json) =
		post_query(app_with(retriever, 50), json!({ "category": "legal", "query": "질문" })).await;

	assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
	assert_eq!(json["error_code"], "DEADLINE_EXCEEDED");
}

#[tokio::test]
async fn step_ceiling_is_an_internal_error() {
	// The category is resolved under the default ceiling; only the running service is lowered.
	let category =
		testkit::category(&testkit::test_config(), "jobs", Arc::new(ScriptedRetriever::empty()));
	let mut cfg = testkit::test_config();

	cfg.orchestrator.step_ceiling = 5;

	let service = testkit::service(
		cfg,
		vec![category],
		Arc::new(ScriptedLlm::new()),
		Arc::new(StaticWebSearch::unconfigured()),
	);
	let app = routes::router(AppState::from_service(service));
	let (status, json) = post_query(app, json!({ "category": "jobs", "query": "질문" })).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(json["error_code"], "INTERNAL_ERROR");
	assert_eq!(json["message"], "An internal error occurred.");
}
