mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Category, Config, EmbeddingProviderConfig, LlmProviderConfig, Orchestrator, Providers,
	Qdrant, Service, Storage, WebSearchProviderConfig,
};

use std::{fs, path::Path};

/// Highest filter level any category may widen to.
pub const FILTER_LEVEL_LIMIT: u8 = 3;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.request_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "service.request_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}
	if cfg.providers.llm.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.llm.api_key must be non-empty.".to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number.".to_string(),
		});
	}
	if cfg.orchestrator.max_filter_level > FILTER_LEVEL_LIMIT {
		return Err(Error::Validation {
			message: format!("orchestrator.max_filter_level must be at most {FILTER_LEVEL_LIMIT}."),
		});
	}
	if cfg.orchestrator.step_ceiling == 0 {
		return Err(Error::Validation {
			message: "orchestrator.step_ceiling must be greater than zero.".to_string(),
		});
	}
	if cfg.orchestrator.fetch_multiplier == 0 {
		return Err(Error::Validation {
			message: "orchestrator.fetch_multiplier must be greater than zero.".to_string(),
		});
	}
	if cfg.orchestrator.fanout_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "orchestrator.fanout_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.capacity == 0 {
		return Err(Error::Validation {
			message: "cache.capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.categories.is_empty() {
		return Err(Error::Validation {
			message: "At least one [categories.<name>] table is required.".to_string(),
		});
	}

	for (name, category) in &cfg.categories {
		validate_category(cfg, name, category)?;
	}

	Ok(())
}

/// Upper bound on node executions for one request with the given recovery bounds.
///
/// Every retry cycle runs one rewrite plus a retrieve/grade pair per filter level and the
/// widenings between them. Cycles are joined by retry increments, and the run ends with at most
/// one web search and one generation.
pub fn worst_case_steps(max_retries: u8, max_filter_level: u8) -> u32 {
	let retries = u32::from(max_retries);
	let levels = u32::from(max_filter_level);
	let cycle = 1 + (levels + 1) * 2 + levels;

	(retries + 1) * cycle + retries + 2
}

fn validate_category(cfg: &Config, name: &str, category: &Category) -> Result<()> {
	let field = |key: &str| format!("categories.{name}.{key}");

	if name.trim().is_empty() {
		return Err(Error::Validation { message: "Category names must be non-empty.".to_string() });
	}
	if category.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: format!("{} must be non-empty.", field("collection")),
		});
	}
	if category.rewrite_prompt.trim().is_empty() {
		return Err(Error::Validation {
			message: format!("{} must be non-empty.", field("rewrite_prompt")),
		});
	}
	if category.answer_prompt.trim().is_empty() {
		return Err(Error::Validation {
			message: format!("{} must be non-empty.", field("answer_prompt")),
		});
	}
	if !category.relevance_threshold.is_finite() {
		return Err(Error::Validation {
			message: format!("{} must be a finite number.", field("relevance_threshold")),
		});
	}
	if !(0.0..=1.0).contains(&category.relevance_threshold) {
		return Err(Error::Validation {
			message: format!("{} must be in the range 0.0-1.0.", field("relevance_threshold")),
		});
	}
	if category.top_k == 0 {
		return Err(Error::Validation {
			message: format!("{} must be greater than zero.", field("top_k")),
		});
	}
	if category.fetch_multiplier == Some(0) {
		return Err(Error::Validation {
			message: format!("{} must be greater than zero.", field("fetch_multiplier")),
		});
	}
	if !matches!(category.grade_failure_policy.as_str(), "accept" | "reject") {
		return Err(Error::Validation {
			message: format!("{} must be one of accept or reject.", field("grade_failure_policy")),
		});
	}

	let max_filter_level = category.max_filter_level.unwrap_or(cfg.orchestrator.max_filter_level);
	let max_retries = category.max_retries.unwrap_or(cfg.orchestrator.max_retries);

	if max_filter_level > FILTER_LEVEL_LIMIT {
		return Err(Error::Validation {
			message: format!("{} must be at most {FILTER_LEVEL_LIMIT}.", field("max_filter_level")),
		});
	}
	if worst_case_steps(max_retries, max_filter_level) > cfg.orchestrator.step_ceiling {
		return Err(Error::Validation {
			message: format!(
				"orchestrator.step_ceiling is too small for the recovery bounds of categories.{name}."
			),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.vector_name.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false)
	{
		cfg.storage.qdrant.vector_name = None;
	}
	if cfg
		.providers
		.web_search
		.api_key
		.as_deref()
		.map(|key| key.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.web_search.api_key = None;
	}

	for category in cfg.categories.values_mut() {
		category.grade_failure_policy = category.grade_failure_policy.trim().to_lowercase();

		if category
			.pattern_dataset
			.as_deref()
			.map(|path| path.as_os_str().is_empty())
			.unwrap_or(false)
		{
			category.pattern_dataset = None;
		}
	}
}
