use serde::{Deserialize, Serialize};

use crate::document::Document;

pub const HIGH_MIN_COUNT: usize = 5;
pub const HIGH_MIN_AVG_SCORE: f32 = 0.7;
pub const MEDIUM_MIN_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchQuality {
	#[default]
	Low,
	Medium,
	High,
}
impl SearchQuality {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityReport {
	pub quality: SearchQuality,
	pub avg_score: f32,
	pub count: usize,
}

/// Buckets a result set by size and mean score. Both boundaries are inclusive.
pub fn assess(docs: &[Document], threshold: f32) -> QualityReport {
	let count = docs.len();
	let avg = mean_score(docs);
	let quality = if count >= HIGH_MIN_COUNT && avg >= f64::from(HIGH_MIN_AVG_SCORE) {
		SearchQuality::High
	} else if count >= MEDIUM_MIN_COUNT && avg >= f64::from(threshold) {
		SearchQuality::Medium
	} else {
		SearchQuality::Low
	};

	QualityReport { quality, avg_score: avg as f32, count }
}

// Accumulates in f64 so that n copies of the same f32 score average back to that exact score.
fn mean_score(docs: &[Document]) -> f64 {
	if docs.is_empty() {
		return 0.0;
	}

	let sum: f64 = docs.iter().map(|doc| f64::from(doc.relevance_score())).sum();

	sum / docs.len() as f64
}
