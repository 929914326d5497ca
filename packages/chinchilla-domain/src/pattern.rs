//! Local heuristic scan of a suspicious message against a known scam-pattern dataset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{document::Document, text};

pub const HIGH_RISK_SCORE: i32 = 3;

const MAX_SCAMS: usize = 20;
const MAX_KEYWORDS_PER_LEVEL: usize = 10;
const MAX_CONTACTS: usize = 5;
const MAX_MATCHED_TERMS: usize = 3;
const MAX_SCAM_MATCHES: usize = 5;
const MAX_LEGITIMATE_MATCHES: usize = 3;
const MAX_DOCUMENTS: usize = 5;
const QUERY_ECHO_CHARS: usize = 100;
const SENDER_ECHO_CHARS: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternDataset {
	#[serde(default)]
	pub financial_scams: Vec<ScamPattern>,
	#[serde(default)]
	pub keywords: BTreeMap<String, Vec<String>>,
	#[serde(default)]
	pub legitimate_contacts: BTreeMap<String, String>,
}
impl PatternDataset {
	pub fn is_empty(&self) -> bool {
		self.financial_scams.is_empty()
			&& self.keywords.is_empty()
			&& self.legitimate_contacts.is_empty()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScamPattern {
	#[serde(rename = "type", default = "default_scam_type")]
	pub scam_type: String,
	#[serde(default = "default_danger_level")]
	pub danger_level: String,
	#[serde(default)]
	pub patterns: Vec<String>,
	#[serde(default)]
	pub sender_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskSummary {
	pub highest_level: Option<String>,
	pub score: i32,
	pub is_high_risk: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScamMatch {
	pub scam_type: String,
	pub danger_level: String,
	pub matched_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegitimateContact {
	pub organization: String,
	pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternAnalysis {
	pub query: String,
	pub sender: String,
	pub risk_summary: RiskSummary,
	pub scam_matches: Vec<ScamMatch>,
	pub keyword_matches: BTreeMap<String, Vec<String>>,
	pub legitimate_contacts: Vec<LegitimateContact>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternScan {
	pub documents: Vec<Document>,
	pub analysis: PatternAnalysis,
}

/// Orders danger labels. Unknown labels score `-1`.
pub fn danger_score(level: &str) -> i32 {
	match level.trim() {
		"매우높음" | "very_high" => 4,
		"높음" | "high" | "high_risk" => 3,
		"중간" | "medium" | "medium_risk" => 2,
		"낮음" | "low" | "low_risk" => 1,
		"정보" | "info" => 0,
		_ => -1,
	}
}

pub fn scan(dataset: &PatternDataset, query: &str, sender: Option<&str>) -> PatternScan {
	let query_lower = query.trim().to_lowercase();
	let sender_lower = sender.unwrap_or_default().trim().to_lowercase();
	let mut analysis = PatternAnalysis {
		query: text::preview(query, QUERY_ECHO_CHARS),
		sender: text::preview(sender.unwrap_or_default(), SENDER_ECHO_CHARS),
		risk_summary: RiskSummary { highest_level: None, score: -1, is_high_risk: false },
		..Default::default()
	};

	if query_lower.is_empty() || dataset.is_empty() {
		return PatternScan { documents: Vec::new(), analysis };
	}

	let query_digits = digits_only(query);
	let sender_digits = digits_only(sender.unwrap_or_default());
	let mut documents = Vec::new();
	let mut highest: Option<(i32, String)> = None;

	for scam in dataset.financial_scams.iter().take(MAX_SCAMS) {
		let patterns: Vec<String> = scam
			.patterns
			.iter()
			.filter(|pattern| contains_term(&query_lower, pattern))
			.cloned()
			.collect();
		let sender_hit = scam.sender_patterns.iter().any(|pattern| {
			contains_term(&query_lower, pattern)
				|| (!sender_lower.is_empty() && contains_term(&sender_lower, pattern))
		});

		if patterns.is_empty() && !sender_hit {
			continue;
		}

		raise(&mut highest, &scam.danger_level);

		let mut content = format!("Type: {} | Danger: {}", scam.scam_type, scam.danger_level);

		if !patterns.is_empty() {
			content.push_str("\nPatterns: ");
			content.push_str(&patterns[..patterns.len().min(MAX_MATCHED_TERMS)].join(", "));
		}

		let mut metadata = Map::new();

		metadata.insert("source".to_string(), Value::String("realtime_alert".to_string()));
		metadata.insert("scam_type".to_string(), Value::String(scam.scam_type.clone()));
		metadata.insert("danger_level".to_string(), Value::String(scam.danger_level.clone()));
		documents.push(Document::web(content, metadata));

		analysis.scam_matches.push(ScamMatch {
			scam_type: scam.scam_type.clone(),
			danger_level: scam.danger_level.clone(),
			matched_patterns: patterns.into_iter().take(MAX_MATCHED_TERMS).collect(),
		});
	}

	for (risk_level, keywords) in &dataset.keywords {
		let hits: Vec<String> = keywords
			.iter()
			.take(MAX_KEYWORDS_PER_LEVEL)
			.filter(|keyword| contains_term(&query_lower, keyword))
			.take(MAX_MATCHED_TERMS)
			.cloned()
			.collect();

		if hits.is_empty() {
			continue;
		}

		raise(&mut highest, risk_level);
		analysis.keyword_matches.insert(risk_level.clone(), hits);
	}

	for (organization, phone) in dataset.legitimate_contacts.iter().take(MAX_CONTACTS) {
		let phone_digits = digits_only(phone);
		let org_hit = contains_term(&query_lower, organization);
		let phone_hit = !phone_digits.is_empty()
			&& (query_digits.contains(&phone_digits) || sender_digits.contains(&phone_digits));

		if !org_hit && !phone_hit {
			continue;
		}

		let mut metadata = Map::new();

		metadata.insert("source".to_string(), Value::String("official_contact".to_string()));
		metadata.insert("organization".to_string(), Value::String(organization.clone()));
		documents
			.push(Document::web(format!("{organization} official contact: {phone}"), metadata));

		analysis
			.legitimate_contacts
			.push(LegitimateContact { organization: organization.clone(), phone: phone.clone() });
	}

	if let Some((score, level)) = highest {
		analysis.risk_summary = RiskSummary {
			highest_level: Some(level),
			score,
			is_high_risk: score >= HIGH_RISK_SCORE,
		};
	}

	analysis.scam_matches.truncate(MAX_SCAM_MATCHES);
	analysis.legitimate_contacts.truncate(MAX_LEGITIMATE_MATCHES);
	documents.truncate(MAX_DOCUMENTS);

	PatternScan { documents, analysis }
}

fn contains_term(haystack_lower: &str, term: &str) -> bool {
	let term = term.trim();

	!term.is_empty() && haystack_lower.contains(&term.to_lowercase())
}

fn raise(highest: &mut Option<(i32, String)>, level: &str) {
	let score = danger_score(level);

	if highest.as_ref().map(|(current, _)| score > *current).unwrap_or(true) {
		*highest = Some((score, level.to_string()));
	}
}

fn digits_only(value: &str) -> String {
	value.chars().filter(|ch| ch.is_ascii_digit()).collect()
}

fn default_scam_type() -> String {
	"unknown".to_string()
}

fn default_danger_level() -> String {
	"info".to_string()
}
