use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use chinchilla_config::WebSearchProviderConfig;

#[test]
fn builds_bearer_auth_header() {
	let headers = chinchilla_providers::auth_headers("secret", &Map::new())
		.expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), Value::from(3));

	let err = chinchilla_providers::auth_headers("secret", &defaults)
		.expect_err("Expected invalid header error.");

	assert!(err.to_string().contains("Default header values must be strings."));
}

#[tokio::test]
async fn web_search_without_key_is_a_config_error() {
	let cfg = WebSearchProviderConfig {
		provider_id: "serpapi".to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: None,
		path: "/search".to_string(),
		engine: "google".to_string(),
		timeout_ms: 100,
	};
	let err = chinchilla_providers::web_search::search(&cfg, "query")
		.await
		.expect_err("Expected missing key error.");

	assert!(matches!(err, chinchilla_providers::Error::InvalidConfig { .. }));
}
