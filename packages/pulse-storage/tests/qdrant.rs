use std::env;

use uuid::Uuid;

use pulse_storage::{FeedbackFilter, FeedbackRecord, RecordId, qdrant::QdrantStore};

fn test_qdrant_url() -> Option<String> {
	env::var("PULSE_QDRANT_URL").ok()
}

fn record(id: RecordId, rating: i64, office: &str) -> FeedbackRecord {
	FeedbackRecord {
		id,
		text: format!("Feedback rated {rating}."),
		rating,
		service_name: "portal".to_string(),
		office_name: office.to_string(),
	}
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set PULSE_QDRANT_URL to run."]
async fn round_trips_records_through_a_live_collection() {
	let Some(url) = test_qdrant_url() else {
		eprintln!("Skipping live Qdrant test; set PULSE_QDRANT_URL to run this test.");

		return;
	};
	let collection = format!("pulse_test_{}", Uuid::new_v4().simple());
	let store = QdrantStore::new(&pulse_config::Qdrant { url, collection, vector_dim: 3 })
		.expect("Failed to build Qdrant client.");

	assert!(store.ensure_collection(3).await.expect("create"));
	assert!(!store.ensure_collection(3).await.expect("exists"));

	let points = vec![
		(record(RecordId::Number(1), 1, "revenue"), vec![1.0, 0.0, 0.0]),
		(record(RecordId::Number(2), 4, "transport"), vec![0.0, 1.0, 0.0]),
		(record(RecordId::Text("fb-3".to_string()), 5, "transport"), vec![0.0, 0.9, 0.1]),
	];

	assert_eq!(store.upsert(points).await.expect("upsert"), 3);

	let all = store.fetch_all(10, 2).await.expect("fetch");
	let rated = store.filter_by_rating(4, 5, 10, 2).await.expect("rating filter");
	let transport = FeedbackFilter { office: Some("transport".to_string()), ..Default::default() };
	let listed = store.list(&transport, 10, 2).await.expect("list");
	let nearest = store.search(vec![0.0, 1.0, 0.0], 2).await.expect("search");

	assert_eq!(all.len(), 3);
	assert!(all.iter().all(|hit| hit.score == 1.0));
	assert_eq!(rated.len(), 2);
	assert_eq!(listed.len(), 2);
	assert_eq!(nearest[0].record.id, RecordId::Number(2));
	assert!(nearest[0].score >= nearest[1].score);

	store.client.delete_collection(store.collection.clone()).await.expect("cleanup");
}
