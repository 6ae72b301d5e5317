use pulse_ingest::source::{self, SourceRow};
use pulse_storage::{FeedbackRecord, RecordId};

const EXPORT: &str = include_str!("fixtures/feedback_export.csv");

fn records() -> Vec<FeedbackRecord> {
	source::parse_rows(EXPORT.as_bytes())
		.expect("export parses")
		.into_iter()
		.map(SourceRow::into_record)
		.collect()
}

#[test]
fn export_rows_become_index_records() {
	let records = records();

	assert_eq!(records.len(), 4);
	assert_eq!(
		records.iter().map(|record| record.id.clone()).collect::<Vec<_>>(),
		vec![
			RecordId::Number(101),
			RecordId::Number(102),
			RecordId::Text("fb-103".to_string()),
			RecordId::Number(104),
		]
	);
	assert_eq!(records[0].text, "Slow pages, and the upload timed out twice.");
	assert_eq!(records[0].service_name, "tax-filing");
	assert_eq!(records[0].office_name, "revenue");
	assert_eq!(records[1].rating, 4);
}

#[test]
fn quoted_text_keeps_embedded_newlines() {
	let records = records();

	assert_eq!(records[2].text, "The form asked for the same field\non two separate pages.");
	assert_eq!(records[2].office_name, "economy");
}

#[test]
fn malformed_service_names_leave_metadata_empty() {
	let records = records();

	assert_eq!(records[3].service_name, "");
	assert_eq!(records[3].office_name, "");
	assert_eq!(
		source::embedding_text(&records[3]),
		"Rating: 3\nService: \nOffice: \nFeedback: No comment."
	);
}
