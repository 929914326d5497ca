use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
	Internal,
	Web,
}
impl Origin {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Internal => "internal",
			Self::Web => "web",
		}
	}
}

/// A unit of retrieved evidence.
///
/// The relevance score is kept inside `[0, 1]`: the constructors, the setter, and the
/// deserializer all clamp, and non-finite inputs collapse to `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
	pub content: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(default, deserialize_with = "deserialize_score")]
	relevance_score: f32,
	pub origin: Origin,
}
impl Document {
	pub fn new(
		content: impl Into<String>,
		metadata: Map<String, Value>,
		relevance_score: f32,
		origin: Origin,
	) -> Self {
		Self {
			content: content.into(),
			metadata,
			relevance_score: clamp_score(relevance_score),
			origin,
		}
	}

	pub fn internal(content: impl Into<String>, metadata: Map<String, Value>, score: f32) -> Self {
		Self::new(content, metadata, score, Origin::Internal)
	}

	pub fn web(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
		Self::new(content, metadata, 0.0, Origin::Web)
	}

	pub fn relevance_score(&self) -> f32 {
		self.relevance_score
	}

	/// Returns a trimmed, non-empty string metadata value.
	pub fn metadata_str(&self, key: &str) -> Option<&str> {
		let text = self.metadata.get(key)?.as_str()?.trim();

		if text.is_empty() { None } else { Some(text) }
	}

	/// Reads an integer metadata value, accepting numbers and strings such as `"60세 이상"`.
	pub fn metadata_int(&self, key: &str) -> Option<i64> {
		match self.metadata.get(key)? {
			Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|v| v as i64)),
			Value::String(text) => text
				.split(|ch: char| !ch.is_ascii_digit())
				.find(|part| !part.is_empty())
				.and_then(|digits| digits.parse().ok()),
			_ => None,
		}
	}
}

pub fn clamp_score(score: f32) -> f32 {
	if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 }
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<f32>::deserialize(deserializer)?;

	Ok(raw.map(clamp_score).unwrap_or(0.0))
}
