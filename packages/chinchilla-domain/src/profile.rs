use serde::{Deserialize, Serialize};

/// Optional structured attributes a category can turn into retrieval filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
	#[serde(default)]
	pub age: Option<u32>,
	#[serde(default)]
	pub gender: Option<String>,
	#[serde(default, alias = "region")]
	pub location: Option<String>,
	#[serde(default)]
	pub interest: Option<String>,
}
impl Profile {
	pub fn is_empty(&self) -> bool {
		self.age.is_none()
			&& blank(self.gender.as_deref())
			&& blank(self.location.as_deref())
			&& blank(self.interest.as_deref())
	}
}

fn blank(value: Option<&str>) -> bool {
	value.map(|text| text.trim().is_empty()).unwrap_or(true)
}
