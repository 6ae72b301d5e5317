//! Deterministic stand-ins for the model providers and the feedback index.

mod error;

pub use error::{Error, Result};

use std::{
	collections::VecDeque,
	hash::{DefaultHasher, Hash, Hasher},
	sync::{Arc, Mutex},
};

use serde_json::Map;

use pulse_agent::{
	AgentService, BoxFuture, ChatProvider, EmbeddingProvider, FeedbackIndex, Providers,
	prompt::PIPELINE_PROMPT,
};
use pulse_config::{EmbeddingProviderConfig, LlmProviderConfig};
use pulse_providers::{ChatRequest, EmbeddingInput};
use pulse_storage::{FeedbackFilter, FeedbackRecord, RecordId, SearchHit};

const FEEDBACK_JSONL: &str = include_str!("../fixtures/feedback.jsonl");
pub const VECTOR_DIM: u32 = 64;

/// Chat model that answers synthesis requests from a queue of programs.
///
/// Any other request (relevance filtering, `ask_llm`) gets `other_reply`. Every request is
/// recorded in order.
pub struct ScriptedChat {
	programs: Mutex<VecDeque<String>>,
	other_reply: String,
	calls: Mutex<Vec<ChatRequest>>,
}
impl ScriptedChat {
	pub fn new<I, S>(programs: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			programs: Mutex::new(programs.into_iter().map(Into::into).collect()),
			other_reply: "[]".to_string(),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn with_other_reply(mut self, reply: impl Into<String>) -> Self {
		self.other_reply = reply.into();

		self
	}

	pub fn calls(&self) -> Vec<ChatRequest> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	/// Requests that asked for a pipeline program.
	pub fn synthesis_calls(&self) -> Vec<ChatRequest> {
		self.calls().into_iter().filter(|call| call.system_prompt == PIPELINE_PROMPT).collect()
	}

	fn reply(&self, request: &ChatRequest) -> pulse_agent::Result<String> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(request.clone());

		if request.system_prompt != PIPELINE_PROMPT {
			return Ok(self.other_reply.clone());
		}

		self.programs.lock().unwrap_or_else(|err| err.into_inner()).pop_front().ok_or_else(|| {
			pulse_agent::Error::Provider { message: "No scripted program left.".to_string() }
		})
	}
}
impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, pulse_agent::Result<String>> {
		let reply = self.reply(request);

		Box::pin(async move { reply })
	}
}

/// Bag-of-words embedder using the hashing trick. Texts sharing words get similar vectors.
pub struct HashingEmbedder {
	pub vector_dim: u32,
}
impl HashingEmbedder {
	pub fn vector(&self, text: &str) -> Vec<f32> {
		let dim = self.vector_dim.max(1) as usize;
		let mut vector = vec![0.0_f32; dim];

		for word in text.split(|c: char| !c.is_alphanumeric()).filter(|word| !word.is_empty()) {
			let mut hasher = DefaultHasher::new();

			word.to_lowercase().hash(&mut hasher);

			vector[(hasher.finish() % dim as u64) as usize] += 1.0;
		}

		let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();

		if norm > 0.0 {
			vector.iter_mut().for_each(|x| *x /= norm);
		}

		vector
	}
}
impl Default for HashingEmbedder {
	fn default() -> Self {
		Self { vector_dim: VECTOR_DIM }
	}
}
impl EmbeddingProvider for HashingEmbedder {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
		_input: EmbeddingInput,
	) -> BoxFuture<'a, pulse_agent::Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|text| self.vector(text)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

/// In-memory feedback index. Scans keep insertion order; search ranks by cosine similarity.
pub struct MemoryIndex {
	points: Vec<(Vec<f32>, FeedbackRecord)>,
}
impl MemoryIndex {
	pub fn new(records: Vec<FeedbackRecord>, embedder: &HashingEmbedder) -> Self {
		let points =
			records.into_iter().map(|record| (embedder.vector(&record.text), record)).collect();

		Self { points }
	}

	pub fn len(&self) -> usize {
		self.points.len()
	}

	pub fn is_empty(&self) -> bool {
		self.points.is_empty()
	}

	fn records(&self) -> impl Iterator<Item = &FeedbackRecord> {
		self.points.iter().map(|(_, record)| record)
	}
}
impl FeedbackIndex for MemoryIndex {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		limit: u64,
	) -> BoxFuture<'a, pulse_agent::Result<Vec<SearchHit>>> {
		let mut hits: Vec<SearchHit> = self
			.points
			.iter()
			.map(|(point, record)| SearchHit {
				score: cosine(vector, point),
				record: record.clone(),
			})
			.collect();

		hits.sort_by(|a, b| b.score.total_cmp(&a.score));
		hits.truncate(limit as usize);

		Box::pin(async move { Ok(hits) })
	}

	fn fetch_all<'a>(
		&'a self,
		limit: u64,
		_page_size: u32,
	) -> BoxFuture<'a, pulse_agent::Result<Vec<SearchHit>>> {
		let hits = self.records().take(limit as usize).cloned().map(SearchHit::unranked).collect();

		Box::pin(async move { Ok(hits) })
	}

	fn filter_by_rating<'a>(
		&'a self,
		min: i64,
		max: i64,
		limit: u64,
		_page_size: u32,
	) -> BoxFuture<'a, pulse_agent::Result<Vec<FeedbackRecord>>> {
		let records = self
			.records()
			.filter(|record| (min..=max).contains(&record.rating))
			.take(limit as usize)
			.cloned()
			.collect();

		Box::pin(async move { Ok(records) })
	}

	fn list<'a>(
		&'a self,
		filter: &'a FeedbackFilter,
		limit: u64,
		_page_size: u32,
	) -> BoxFuture<'a, pulse_agent::Result<Vec<FeedbackRecord>>> {
		let records = self
			.records()
			.filter(|record| filter.matches(record))
			.take(limit as usize)
			.cloned()
			.collect();

		Box::pin(async move { Ok(records) })
	}
}

/// The bundled sample corpus.
pub fn corpus() -> Result<Vec<FeedbackRecord>> {
	records_from_jsonl(FEEDBACK_JSONL)
}

pub fn records_from_jsonl(raw: &str) -> Result<Vec<FeedbackRecord>> {
	raw.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty())
		.enumerate()
		.map(|(idx, line)| {
			serde_json::from_str(line).map_err(|err| {
				Error::Message(format!("Fixture line {} is not a feedback record: {err}.", idx + 1))
			})
		})
		.collect()
}

/// `count` records with ids `1..=count`, cycling ratings 1 to 5.
pub fn numbered(count: usize) -> Vec<FeedbackRecord> {
	(1..=count as i64)
		.map(|id| record(id, (id - 1) % 5 + 1, &format!("Feedback number {id}.")))
		.collect()
}

/// One record per rating, ids counting from 1.
pub fn rated(ratings: &[i64]) -> Vec<FeedbackRecord> {
	ratings
		.iter()
		.zip(1_i64..)
		.map(|(rating, id)| record(id, *rating, &format!("Rated {rating}.")))
		.collect()
}

pub fn record(id: i64, rating: i64, text: &str) -> FeedbackRecord {
	FeedbackRecord {
		id: RecordId::Number(id),
		text: text.to_string(),
		rating,
		service_name: "portal".to_string(),
		office_name: "digital".to_string(),
	}
}

/// A complete configuration pointing at unreachable endpoints.
pub fn test_config() -> pulse_config::Config {
	pulse_config::Config {
		service: pulse_config::Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: pulse_config::Storage {
			qdrant: pulse_config::Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "feedback_vectors_test".to_string(),
				vector_dim: VECTOR_DIM,
			},
		},
		providers: pulse_config::Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "hashing".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
				query_input_type: Some("query".to_string()),
				passage_input_type: Some("passage".to_string()),
			},
			llm: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "scripted".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		agent: pulse_config::Agent::default(),
		sandbox: pulse_config::Sandbox::default(),
		cutoff: pulse_config::Cutoff::default(),
		ingest: pulse_config::Ingest::default(),
	}
}

/// A service over `records` that answers synthesis requests with `chat`.
pub fn service(
	cfg: pulse_config::Config,
	records: Vec<FeedbackRecord>,
	chat: Arc<ScriptedChat>,
) -> AgentService {
	let embedder = Arc::new(HashingEmbedder { vector_dim: cfg.storage.qdrant.vector_dim });
	let index = Arc::new(MemoryIndex::new(records, &embedder));

	AgentService::with_providers(cfg, index, Providers::new(embedder, chat))
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
	let denom = norm(a) * norm(b);

	if denom > 0.0 { dot / denom } else { 0.0 }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bundled_corpus_parses() {
		let records = corpus().expect("corpus");

		assert_eq!(records.len(), 8);
		assert_eq!(records[6].id, RecordId::Text("fb-7".to_string()));
	}

	#[test]
	fn shared_words_rank_higher() {
		let embedder = HashingEmbedder::default();
		let query = embedder.vector("slow login");
		let near = embedder.vector("The login is slow today");
		let far = embedder.vector("Friendly passport renewal form");

		assert!(cosine(&query, &near) > cosine(&query, &far));
	}
}
