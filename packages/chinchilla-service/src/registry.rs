use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use serde::Serialize;

use chinchilla_config::{Category, Config, FILTER_LEVEL_LIMIT, Orchestrator};
use chinchilla_domain::pattern::PatternDataset;

use crate::{Error, Result, RetrieverPort};

/// What grading falls back to when the LLM confirmation is inconclusive or fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeFailurePolicy {
	#[default]
	Accept,
	Reject,
}
impl GradeFailurePolicy {
	pub fn parse(raw: &str) -> Result<Self> {
		match raw.trim().to_lowercase().as_str() {
			"accept" => Ok(Self::Accept),
			"reject" => Ok(Self::Reject),
			other => Err(Error::Configuration {
				message: format!("Unknown grade failure policy: {other}."),
			}),
		}
	}
}

/// Builds the retriever a category searches with.
pub trait RetrieverFactory
where
	Self: Send + Sync,
{
	fn build(&self, name: &str, category: &Category) -> Result<Arc<dyn RetrieverPort>>;
}

/// Immutable per-category settings, resolved once at startup.
#[derive(Clone)]
pub struct CategoryConfig {
	pub name: String,
	pub rewrite_prompt: String,
	pub answer_prompt: String,
	pub relevance_threshold: f32,
	pub top_k: usize,
	pub fetch_multiplier: usize,
	pub max_retries: u8,
	pub max_filter_level: u8,
	pub grade_failure_policy: GradeFailurePolicy,
	pub web_search: bool,
	pub retriever: Arc<dyn RetrieverPort>,
	pub patterns: Option<Arc<PatternDataset>>,
}
impl CategoryConfig {
	pub fn from_settings(
		name: &str,
		category: &Category,
		defaults: &Orchestrator,
		retriever: Arc<dyn RetrieverPort>,
		patterns: Option<Arc<PatternDataset>>,
	) -> Result<Self> {
		let max_retries = category.max_retries.unwrap_or(defaults.max_retries);
		let max_filter_level = category.max_filter_level.unwrap_or(defaults.max_filter_level);

		if max_filter_level > FILTER_LEVEL_LIMIT {
			return Err(Error::Configuration {
				message: format!(
					"Category {name} has max_filter_level {max_filter_level}, above {FILTER_LEVEL_LIMIT}."
				),
			});
		}

		let worst_case = chinchilla_config::worst_case_steps(max_retries, max_filter_level);

		if worst_case > defaults.step_ceiling {
			return Err(Error::Configuration {
				message: format!(
					"Category {name} needs up to {worst_case} steps, above the step ceiling of {}.",
					defaults.step_ceiling
				),
			});
		}

		Ok(Self {
			name: name.to_string(),
			rewrite_prompt: category.rewrite_prompt.clone(),
			answer_prompt: category.answer_prompt.clone(),
			relevance_threshold: category.relevance_threshold,
			top_k: category.top_k as usize,
			fetch_multiplier: category.fetch_multiplier.unwrap_or(defaults.fetch_multiplier)
				as usize,
			max_retries,
			max_filter_level,
			grade_failure_policy: GradeFailurePolicy::parse(&category.grade_failure_policy)?,
			web_search: category.web_search,
			retriever,
			patterns,
		})
	}
}

#[derive(Clone, Default)]
pub struct Registry {
	categories: BTreeMap<String, Arc<CategoryConfig>>,
}
impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_config(cfg: &Config, factory: &dyn RetrieverFactory) -> Result<Self> {
		let mut registry = Self::new();

		for (name, category) in &cfg.categories {
			let retriever = factory.build(name, category)?;
			let patterns = category
				.pattern_dataset
				.as_deref()
				.map(load_pattern_dataset)
				.transpose()?
				.map(Arc::new);

			registry.register(CategoryConfig::from_settings(
				name,
				category,
				&cfg.orchestrator,
				retriever,
				patterns,
			)?);
		}

		Ok(registry)
	}

	pub fn register(&mut self, category: CategoryConfig) {
		self.categories.insert(category.name.clone(), Arc::new(category));
	}

	pub fn get(&self, name: &str) -> Result<Arc<CategoryConfig>> {
		self.categories
			.get(name.trim())
			.cloned()
			.ok_or_else(|| Error::CategoryNotFound { category: name.trim().to_string() })
	}

	pub fn names(&self) -> Vec<String> {
		self.categories.keys().cloned().collect()
	}
}

pub fn load_pattern_dataset(path: &Path) -> Result<PatternDataset> {
	let raw = fs::read_to_string(path).map_err(|err| Error::Configuration {
		message: format!("Failed to read pattern dataset at {path:?}: {err}"),
	})?;

	serde_json::from_str(&raw).map_err(|err| Error::Configuration {
		message: format!("Failed to parse pattern dataset at {path:?}: {err}"),
	})
}
