use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Filter, Query, QueryPointsBuilder, ScoredPoint, Value, value::Kind,
};
use serde_json::{Map, Number};

use chinchilla_domain::{document::Document, filter::StructuredFilter};

use crate::{Error, Result};

/// Payload keys that may hold the document body, in lookup order.
pub const CONTENT_KEYS: [&str; 3] = ["content", "page_content", "text"];
/// Nested payload object whose fields are lifted into document metadata.
pub const NESTED_METADATA_KEY: &str = "metadata";

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub vector_name: Option<String>,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &chinchilla_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, vector_name: cfg.vector_name.clone(), vector_dim: cfg.vector_dim })
	}

	/// Nearest-neighbour search with the filter's payload conditions pushed down.
	///
	/// Client-side post filters are left to the caller, which knows how far it over-fetched.
	pub async fn search(
		&self,
		collection: &str,
		vector: Vec<f32>,
		filter: Option<&StructuredFilter>,
		limit: u64,
	) -> Result<Vec<Document>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, expected {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let mut search = QueryPointsBuilder::new(collection)
			.query(Query::new_nearest(vector))
			.with_payload(true)
			.limit(limit);

		if let Some(name) = self.vector_name.as_deref() {
			search = search.using(name);
		}
		if let Some(filter) = filter.and_then(build_filter) {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;

		Ok(response.result.into_iter().filter_map(point_to_document).collect())
	}
}

/// Maps the pushed-down part of a structured filter to a Qdrant `must` filter.
pub fn build_filter(filter: &StructuredFilter) -> Option<Filter> {
	if filter.conditions.is_empty() {
		return None;
	}

	Some(Filter::all(
		filter
			.conditions
			.iter()
			.map(|condition| Condition::matches(condition.field.clone(), condition.value.clone())),
	))
}

/// Cosine similarity in `[-1, 1]` mapped onto `[0, 1]`.
pub fn normalize_score(similarity: f32) -> f32 {
	(similarity + 1.0) / 2.0
}

/// Points without a readable content field are dropped.
pub fn point_to_document(point: ScoredPoint) -> Option<Document> {
	let score = normalize_score(point.score);
	let (content, metadata) = split_payload(point.payload)?;

	Some(Document::internal(content, metadata, score))
}

fn split_payload(
	payload: HashMap<String, Value>,
) -> Option<(String, Map<String, serde_json::Value>)> {
	let mut metadata = Map::new();
	let mut content = None;

	for (key, value) in payload {
		let json = to_json(value);

		if key == NESTED_METADATA_KEY
			&& let serde_json::Value::Object(fields) = json
		{
			for (nested_key, nested_value) in fields {
				metadata.entry(nested_key).or_insert(nested_value);
			}

			continue;
		}

		metadata.insert(key, json);
	}

	for key in CONTENT_KEYS {
		if let Some(serde_json::Value::String(text)) = metadata.remove(key)
			&& !text.trim().is_empty()
			&& content.is_none()
		{
			content = Some(text);
		}
	}

	content.map(|content| (content, metadata))
}

fn to_json(value: Value) -> serde_json::Value {
	match value.kind {
		Some(Kind::BoolValue(flag)) => serde_json::Value::Bool(flag),
		Some(Kind::IntegerValue(number)) => serde_json::Value::Number(number.into()),
		Some(Kind::DoubleValue(number)) => Number::from_f64(number)
			.map(serde_json::Value::Number)
			.unwrap_or(serde_json::Value::Null),
		Some(Kind::StringValue(text)) => serde_json::Value::String(text),
		Some(Kind::ListValue(list)) => {
			serde_json::Value::Array(list.values.into_iter().map(to_json).collect())
		},
		Some(Kind::StructValue(object)) => serde_json::Value::Object(
			object.fields.into_iter().map(|(key, value)| (key, to_json(value))).collect(),
		),
		Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
	}
}
