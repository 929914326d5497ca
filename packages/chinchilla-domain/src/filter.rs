//! The discrete widening ladder used to relax structured retrieval filters.
//!
//! | Level | Constraints |
//! |-------|-------------|
//! | 0 | province, city, interest, age |
//! | 1 | province, interest, age |
//! | 2 | age |
//! | 3 | none |

use serde::Serialize;

use crate::{document::Document, location, profile::Profile};

pub const MAX_FILTER_LEVEL: u8 = 3;
pub const PROVINCE_FIELD: &str = "region_province";
pub const CITY_FIELD: &str = "region_city";
pub const INTEREST_FIELD: &str = "interest";
pub const MIN_AGE_FIELD: &str = "min_age";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMatch {
	pub field: String,
	pub value: String,
}

/// Constraints for one retrieval call.
///
/// `conditions` are pushed down to the vector store. `max_min_age` is evaluated client side
/// against each document's `min_age` metadata after over-fetching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructuredFilter {
	pub level: u8,
	pub conditions: Vec<FieldMatch>,
	pub max_min_age: Option<u32>,
}
impl StructuredFilter {
	pub fn is_empty(&self) -> bool {
		self.conditions.is_empty() && self.max_min_age.is_none()
	}

	pub fn has_post_filter(&self) -> bool {
		self.max_min_age.is_some()
	}

	/// Documents without a readable `min_age` are admitted.
	pub fn admits(&self, doc: &Document) -> bool {
		let Some(age) = self.max_min_age else { return true };

		doc.metadata_int(MIN_AGE_FIELD).map(|min_age| min_age <= i64::from(age)).unwrap_or(true)
	}

	pub fn apply_post_filter(&self, docs: Vec<Document>) -> Vec<Document> {
		docs.into_iter().filter(|doc| self.admits(doc)).collect()
	}
}

pub fn filter_for_level(profile: Option<&Profile>, level: u8) -> Option<StructuredFilter> {
	let profile = profile?;

	if level >= MAX_FILTER_LEVEL {
		return None;
	}

	let location =
		profile.location.as_deref().map(location::normalize_location).unwrap_or_default();
	let mut conditions = Vec::new();

	if level <= 1
		&& let Some(province) = location.province
	{
		conditions.push(FieldMatch { field: PROVINCE_FIELD.to_string(), value: province });
	}
	if level == 0
		&& let Some(city) = location.city
	{
		conditions.push(FieldMatch { field: CITY_FIELD.to_string(), value: city });
	}
	if level <= 1
		&& let Some(interest) = profile.interest.as_deref().map(str::trim)
		&& !interest.is_empty()
	{
		conditions.push(FieldMatch {
			field: INTEREST_FIELD.to_string(),
			value: interest.to_string(),
		});
	}

	let filter = StructuredFilter { level, conditions, max_min_age: profile.age };

	if filter.is_empty() { None } else { Some(filter) }
}

pub fn describe_level(level: u8) -> &'static str {
	match level {
		0 => "full profile",
		1 => "coarse locality and age",
		2 => "age only",
		_ => "no structured filter",
	}
}
