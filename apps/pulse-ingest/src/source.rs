//! Feedback export rows and their conversion into index records.

use std::io::Read;

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use pulse_storage::{FeedbackRecord, RecordId};

use crate::{Error, Result};

/// Header names the export must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = ["ID", "Level", "Text", "ServiceName"];

/// One row of the export, in the column naming of the source system.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceRow {
	#[serde(rename = "ID")]
	pub id: RecordId,
	#[serde(rename = "Level")]
	pub level: i64,
	#[serde(rename = "Text")]
	pub text: String,
	#[serde(rename = "ServiceName")]
	pub service_name: String,
}
impl SourceRow {
	pub fn into_record(self) -> FeedbackRecord {
		let (service_name, office_name) = split_service_name(&self.service_name);

		FeedbackRecord {
			id: self.id,
			text: self.text,
			rating: self.level,
			service_name,
			office_name,
		}
	}
}

/// Parses a CSV export with a header row. Extra columns are ignored; a missing required column
/// fails before any row is read.
pub fn parse_rows<R: Read>(input: R) -> Result<Vec<SourceRow>> {
	let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(input);
	let headers = reader.headers()?.clone();

	if let Some(missing) =
		REQUIRED_COLUMNS.iter().find(|column| !headers.iter().any(|header| header == **column))
	{
		return Err(Error::MissingColumn(missing.to_string()));
	}

	reader
		.deserialize::<SourceRow>()
		.enumerate()
		.map(|(idx, row)| row.map_err(|source| Error::Row { record: idx + 1, source }))
		.collect()
}

/// Splits `service@office.domain` into `(service, office)`. Values without an `@` yield two
/// empty strings.
pub fn split_service_name(raw: &str) -> (String, String) {
	let mut parts = raw.split('@');
	let service = parts.next().unwrap_or_default();

	match parts.next() {
		Some(rest) => {
			let office = rest.split('.').next().unwrap_or_default();

			(service.to_string(), office.to_string())
		},
		None => (String::new(), String::new()),
	}
}

/// Text sent to the embedding model for one record.
pub fn embedding_text(record: &FeedbackRecord) -> String {
	format!(
		"Rating: {}\nService: {}\nOffice: {}\nFeedback: {}",
		record.rating, record.service_name, record.office_name, record.text
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn service_names_split_at_the_mailbox_separator() {
		assert_eq!(
			split_service_name("tax-filing@revenue.gov.example"),
			("tax-filing".to_string(), "revenue".to_string())
		);
		assert_eq!(
			split_service_name("portal@digital"),
			("portal".to_string(), "digital".to_string())
		);
		assert_eq!(split_service_name("no-separator"), (String::new(), String::new()));
		assert_eq!(split_service_name("@.gov"), (String::new(), String::new()));
	}

	#[test]
	fn missing_columns_are_named() {
		let raw = "ID,Level,ServiceName\n1,2,a@b.gov\n";
		let err = parse_rows(raw.as_bytes()).expect_err("no Text column");

		assert!(matches!(&err, Error::MissingColumn(column) if column == "Text"));
		assert_eq!(err.to_string(), "Missing column: Text.");
	}

	#[test]
	fn bad_values_report_their_record() {
		let raw = "ID,Level,Text,ServiceName\n1,2,ok,a@b.gov\n2,high,bad,a@b.gov\n";
		let err = parse_rows(raw.as_bytes()).expect_err("non-numeric level");

		assert!(matches!(err, Error::Row { record: 2, .. }));
	}

	#[test]
	fn embedding_text_lists_metadata_before_feedback() {
		let record = SourceRow {
			id: RecordId::Number(12),
			level: 4,
			text: "Fast reply.".to_string(),
			service_name: "passport@interior.gov".to_string(),
		}
		.into_record();

		assert_eq!(
			embedding_text(&record),
			"Rating: 4\nService: passport\nOffice: interior\nFeedback: Fast reply."
		);
	}
}
