use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

const MAX_ORGANIC_RESULTS: usize = 3;

/// Runs a SerpAPI-style search and flattens the response into plain text.
///
/// Returns `Ok(None)` when the provider answered but had nothing usable.
pub async fn search(
	cfg: &chinchilla_config::WebSearchProviderConfig,
	query: &str,
) -> Result<Option<String>> {
	let api_key = cfg.api_key.as_deref().ok_or_else(|| Error::InvalidConfig {
		message: "Web search API key is not configured.".to_string(),
	})?;
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.get(url)
		.query(&[("q", query), ("api_key", api_key), ("engine", cfg.engine.as_str())])
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	if let Some(message) = json.get("error").and_then(Value::as_str) {
		return Err(Error::InvalidResponse { message: format!("Web search failed: {message}") });
	}

	Ok(flatten_results(&json))
}

fn flatten_results(json: &Value) -> Option<String> {
	let answer_box = json.get("answer_box");

	if let Some(answer) = answer_box
		.and_then(|boxed| boxed.get("answer").or_else(|| boxed.get("snippet")))
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|text| !text.is_empty())
	{
		return Some(answer.to_string());
	}

	let mut parts = Vec::new();

	if let Some(description) = json
		.get("knowledge_graph")
		.and_then(|graph| graph.get("description"))
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|text| !text.is_empty())
	{
		parts.push(description.to_string());
	}

	for result in json
		.get("organic_results")
		.and_then(Value::as_array)
		.into_iter()
		.flatten()
		.take(MAX_ORGANIC_RESULTS)
	{
		let Some(snippet) = result
			.get("snippet")
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|text| !text.is_empty())
		else {
			continue;
		};

		match result.get("title").and_then(Value::as_str) {
			Some(title) => parts.push(format!("{}: {snippet}", title.trim())),
			None => parts.push(snippet.to_string()),
		}
	}

	if parts.is_empty() { None } else { Some(parts.join("\n")) }
}
