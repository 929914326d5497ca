use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use chinchilla_domain::conversation::ChatMessage;

use crate::{Error, Result};

const MAX_ATTEMPTS: usize = 3;

/// Sends a chat completion request and returns the first choice's text.
///
/// Responses without usable content are retried. Transport and HTTP status errors are returned
/// immediately so the caller can degrade.
pub async fn complete(
	cfg: &chinchilla_config::LlmProviderConfig,
	messages: &[ChatMessage],
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});

	for _ in 0..MAX_ATTEMPTS {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		if let Ok(content) = parse_chat_content(&json) {
			return Ok(content);
		}
	}

	Err(Error::InvalidResponse { message: "Chat response is missing message content.".to_string() })
}

fn parse_chat_content(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::trim)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing message content.".to_string(),
		})?;

	if content.is_empty() {
		return Err(Error::InvalidResponse {
			message: "Chat response content is empty.".to_string(),
		});
	}

	Ok(content.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_first_choice_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "role": "assistant", "content": "  yes  " } },
				{ "message": { "role": "assistant", "content": "no" } }
			]
		});

		assert_eq!(parse_chat_content(&json).expect("parse failed"), "yes");
	}

	#[test]
	fn rejects_blank_or_missing_content() {
		let blank = serde_json::json!({ "choices": [{ "message": { "content": " " } }] });
		let missing = serde_json::json!({ "choices": [] });

		assert!(parse_chat_content(&blank).is_err());
		assert!(parse_chat_content(&missing).is_err());
	}
}
