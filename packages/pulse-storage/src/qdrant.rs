use std::collections::HashMap;

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		Condition, CreateCollectionBuilder, Distance, Filter, PointId, PointStruct, Query,
		QueryPointsBuilder, Range, ScrollPointsBuilder, UpsertPointsBuilder, Value,
		VectorParamsBuilder, value::Kind,
	},
};
use uuid::Uuid;

use crate::{Error, FeedbackFilter, FeedbackRecord, RecordId, Result, SearchHit};

pub const RATING_FIELD: &str = "Level";
pub const OFFICE_FIELD: &str = "office";
pub const SERVICE_FIELD: &str = "service";

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &pulse_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the collection with a cosine dense vector of `dim` when it is absent.
	/// Returns whether a collection was created.
	pub async fn ensure_collection(&self, dim: u64) -> Result<bool> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(false);
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone())
					.vectors_config(VectorParamsBuilder::new(dim, Distance::Cosine)),
			)
			.await?;

		tracing::info!(collection = %self.collection, dim, "Created feedback collection.");

		Ok(true)
	}

	pub async fn upsert(&self, points: Vec<(FeedbackRecord, Vec<f32>)>) -> Result<usize> {
		if points.is_empty() {
			return Ok(0);
		}

		let count = points.len();
		let points: Vec<PointStruct> = points
			.into_iter()
			.map(|(record, vector)| {
				PointStruct::new(point_id(&record.id), vector, record_payload(&record))
			})
			.collect();

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), points).wait(true))
			.await?;

		Ok(count)
	}

	/// Nearest-neighbour search, descending by score.
	pub async fn search(&self, vector: Vec<f32>, limit: u64) -> Result<Vec<SearchHit>> {
		if limit == 0 {
			return Err(Error::InvalidArgument("search limit must be positive.".to_string()));
		}

		let response = self
			.client
			.query(
				QueryPointsBuilder::new(self.collection.clone())
					.query(Query::new_nearest(vector))
					.limit(limit)
					.with_payload(true),
			)
			.await?;
		let mut hits = Vec::with_capacity(response.result.len());

		for point in response.result {
			match record_from_payload(&point.payload) {
				Ok(record) => hits.push(SearchHit { score: point.score, record }),
				Err(err) => tracing::warn!(error = %err, "Skipping search hit with bad payload."),
			}
		}

		Ok(hits)
	}

	/// Every record up to `limit`, paginated in pages of `page_size`, each scored 1.0.
	pub async fn fetch_all(&self, limit: u64, page_size: u32) -> Result<Vec<SearchHit>> {
		let records = self.scroll(None, limit, page_size).await?;

		Ok(records.into_iter().map(SearchHit::unranked).collect())
	}

	/// Records whose rating lies in `[min, max]`.
	pub async fn filter_by_rating(
		&self,
		min: i64,
		max: i64,
		limit: u64,
		page_size: u32,
	) -> Result<Vec<FeedbackRecord>> {
		if min > max {
			return Err(Error::InvalidArgument(format!(
				"rating range is empty: min {min} is greater than max {max}."
			)));
		}

		let filter = Filter::must([Condition::range(
			RATING_FIELD,
			Range { gte: Some(min as f64), lte: Some(max as f64), ..Default::default() },
		)]);

		self.scroll(Some(filter), limit, page_size).await
	}

	/// Records matching every set field of `filter`, in scroll order.
	pub async fn list(
		&self,
		filter: &FeedbackFilter,
		limit: u64,
		page_size: u32,
	) -> Result<Vec<FeedbackRecord>> {
		let mut conditions = Vec::new();

		if let Some(office) = &filter.office {
			conditions.push(Condition::matches(OFFICE_FIELD, office.clone()));
		}
		if let Some(service) = &filter.service {
			conditions.push(Condition::matches(SERVICE_FIELD, service.clone()));
		}
		if let Some(level) = filter.level {
			conditions.push(Condition::matches(RATING_FIELD, level));
		}

		let filter = (!conditions.is_empty()).then(|| Filter::must(conditions));

		self.scroll(filter, limit, page_size).await
	}

	async fn scroll(
		&self,
		filter: Option<Filter>,
		limit: u64,
		page_size: u32,
	) -> Result<Vec<FeedbackRecord>> {
		let mut out = Vec::new();
		let mut offset: Option<PointId> = None;
		let mut remaining = limit;

		while remaining > 0 {
			let batch = remaining.min(page_size.max(1) as u64) as u32;
			let mut request = ScrollPointsBuilder::new(self.collection.clone())
				.limit(batch)
				.with_payload(true)
				.with_vectors(false);

			if let Some(filter) = filter.clone() {
				request = request.filter(filter);
			}
			if let Some(offset) = offset.take() {
				request = request.offset(offset);
			}

			let response = self.client.scroll(request).await?;

			if response.result.is_empty() {
				break;
			}

			remaining = remaining.saturating_sub(response.result.len() as u64);

			for point in response.result {
				match record_from_payload(&point.payload) {
					Ok(record) => out.push(record),
					Err(err) => tracing::warn!(error = %err, "Skipping point with bad payload."),
				}
			}

			match response.next_page_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		out.truncate(limit as usize);

		Ok(out)
	}
}

/// Non-negative numeric ids map to integer point ids; everything else to a UUIDv5 of the text.
pub fn point_id(id: &RecordId) -> PointId {
	match id {
		RecordId::Number(value) if *value >= 0 => PointId::from(*value as u64),
		other => {
			let name = other.to_string();

			PointId::from(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
		},
	}
}

pub fn record_payload(record: &FeedbackRecord) -> Payload {
	let mut payload = Payload::new();
	let id = match &record.id {
		RecordId::Number(value) => Value::from(*value),
		RecordId::Text(value) => Value::from(value.clone()),
	};

	payload.insert("ID", id);
	payload.insert("Text", record.text.clone());
	payload.insert(RATING_FIELD, Value::from(record.rating));
	payload.insert(SERVICE_FIELD, record.service_name.clone());
	payload.insert(OFFICE_FIELD, record.office_name.clone());

	payload
}

pub fn record_from_payload(payload: &HashMap<String, Value>) -> Result<FeedbackRecord> {
	let id = match payload.get("ID").and_then(|value| value.kind.as_ref()) {
		Some(Kind::IntegerValue(value)) => RecordId::Number(*value),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 => RecordId::Number(*value as i64),
		Some(Kind::StringValue(value)) => RecordId::Text(value.clone()),
		_ => return Err(Error::InvalidPayload("payload is missing ID.".to_string())),
	};
	let rating = payload_i64(payload, RATING_FIELD)
		.ok_or_else(|| Error::InvalidPayload(format!("record {id} is missing Level.")))?;

	Ok(FeedbackRecord {
		id,
		text: payload_string(payload, "Text").unwrap_or_default(),
		rating,
		service_name: payload_string(payload, SERVICE_FIELD).unwrap_or_default(),
		office_name: payload_string(payload, OFFICE_FIELD).unwrap_or_default(),
	})
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				Some(*value as i64)
			} else {
				None
			},
		Some(Kind::StringValue(text)) => text.trim().parse().ok(),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_record(id: RecordId) -> FeedbackRecord {
		FeedbackRecord {
			id,
			text: "Payment page crashed twice".to_string(),
			rating: 1,
			service_name: "tax-payments".to_string(),
			office_name: "mof".to_string(),
		}
	}

	#[test]
	fn payload_round_trips_through_qdrant_values() {
		let record = sample_record(RecordId::Number(42));
		let payload: HashMap<String, Value> = record_payload(&record).into();
		let decoded = record_from_payload(&payload).expect("decode failed");

		assert_eq!(decoded, record);
	}

	#[test]
	fn missing_rating_is_rejected() {
		let mut payload: HashMap<String, Value> =
			record_payload(&sample_record(RecordId::Number(1))).into();

		payload.remove(RATING_FIELD);

		assert!(matches!(record_from_payload(&payload), Err(Error::InvalidPayload(_))));
	}

	#[test]
	fn text_ids_map_to_stable_uuid_points() {
		let first = point_id(&RecordId::Text("fb-1".to_string()));
		let second = point_id(&RecordId::Text("fb-1".to_string()));
		let numeric = point_id(&RecordId::Number(5));

		assert_eq!(first, second);
		assert_eq!(numeric, PointId::from(5_u64));
	}
}
