use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a feedback record, as assigned by the source export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
	Number(i64),
	Text(String),
}
impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Number(value) => write!(f, "{value}"),
			Self::Text(value) => f.write_str(value),
		}
	}
}

/// One citizen feedback item. Field names follow the payload layout stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
	#[serde(rename = "ID")]
	pub id: RecordId,
	#[serde(rename = "Text", default)]
	pub text: String,
	#[serde(rename = "Level")]
	pub rating: i64,
	#[serde(rename = "service", default)]
	pub service_name: String,
	#[serde(rename = "office", default)]
	pub office_name: String,
}

/// Exact-match constraints over record metadata. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackFilter {
	#[serde(default)]
	pub office: Option<String>,
	#[serde(default)]
	pub service: Option<String>,
	#[serde(default)]
	pub level: Option<i64>,
}
impl FeedbackFilter {
	pub fn is_empty(&self) -> bool {
		self.office.is_none() && self.service.is_none() && self.level.is_none()
	}

	pub fn matches(&self, record: &FeedbackRecord) -> bool {
		self.office.as_ref().is_none_or(|office| *office == record.office_name)
			&& self.service.as_ref().is_none_or(|service| *service == record.service_name)
			&& self.level.is_none_or(|level| level == record.rating)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
	pub score: f32,
	#[serde(rename = "payload")]
	pub record: FeedbackRecord,
}
impl SearchHit {
	/// Score assigned to hits that did not come from a similarity query.
	pub const UNRANKED_SCORE: f32 = 1.0;

	pub fn unranked(record: FeedbackRecord) -> Self {
		Self { score: Self::UNRANKED_SCORE, record }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hit_serializes_in_payload_layout() {
		let hit = SearchHit {
			score: 0.5,
			record: FeedbackRecord {
				id: RecordId::Number(7),
				text: "Form keeps timing out".to_string(),
				rating: 2,
				service_name: "passport".to_string(),
				office_name: "interior".to_string(),
			},
		};
		let json = serde_json::to_value(&hit).expect("serialize failed");

		assert_eq!(json["score"], 0.5);
		assert_eq!(json["payload"]["ID"], 7);
		assert_eq!(json["payload"]["Level"], 2);
		assert_eq!(json["payload"]["office"], "interior");
	}

	#[test]
	fn filters_match_exactly_on_set_fields() {
		let record = FeedbackRecord {
			id: RecordId::Number(1),
			text: "Slow pages".to_string(),
			rating: 2,
			service_name: "passport".to_string(),
			office_name: "interior".to_string(),
		};
		let office = FeedbackFilter { office: Some("interior".to_string()), ..Default::default() };
		let wrong_level = FeedbackFilter { level: Some(3), ..office.clone() };

		assert!(FeedbackFilter::default().is_empty());
		assert!(FeedbackFilter::default().matches(&record));
		assert!(office.matches(&record));
		assert!(!wrong_level.matches(&record));
	}

	#[test]
	fn record_ids_accept_numbers_and_strings() {
		let numeric: FeedbackRecord =
			serde_json::from_value(serde_json::json!({ "ID": 12, "Level": 4 }))
				.expect("numeric id");
		let text: FeedbackRecord =
			serde_json::from_value(serde_json::json!({ "ID": "fb-12", "Level": 4, "Text": "ok" }))
				.expect("text id");

		assert_eq!(numeric.id, RecordId::Number(12));
		assert_eq!(numeric.text, "");
		assert_eq!(text.id, RecordId::Text("fb-12".to_string()));
		assert_eq!(text.id.to_string(), "fb-12");
	}
}
