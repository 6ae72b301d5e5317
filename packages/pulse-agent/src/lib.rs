pub mod chart;
pub mod console;
pub mod cutoff;
pub mod envelope;
pub mod merge;
pub mod prompt;
pub mod retry;
pub mod sandbox;
pub mod stream;
pub mod synthesize;
pub mod tabular;

mod error;

pub use console::{ConsoleSink, StreamEvent};
pub use cutoff::CutoffParams;
pub use envelope::{EnvelopeMetadata, ResultEnvelope, ResultKind};
pub use error::{
	AttemptError, Error, ExecutionError, ExecutionErrorKind, Result, SynthesisError,
};
pub use merge::MergeMode;
pub use retry::{AttemptRecord, QueryOutcome};

use std::{future::Future, pin::Pin, sync::Arc};

use pulse_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use pulse_providers::{ChatRequest, EmbeddingInput, chat, embedding};
use pulse_storage::{FeedbackFilter, FeedbackRecord, SearchHit, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
		input: EmbeddingInput,
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, Result<String>>;
}

/// Read side of the feedback vector index.
pub trait FeedbackIndex
where
	Self: Send + Sync,
{
	/// Nearest neighbours of `vector`, highest score first.
	fn search<'a>(&'a self, vector: &'a [f32], limit: u64) -> BoxFuture<'a, Result<Vec<SearchHit>>>;

	/// Every record up to `limit`, each carrying [`SearchHit::UNRANKED_SCORE`].
	fn fetch_all<'a>(&'a self, limit: u64, page_size: u32) -> BoxFuture<'a, Result<Vec<SearchHit>>>;

	/// Records whose rating lies in the inclusive range `[min, max]`.
	fn filter_by_rating<'a>(
		&'a self,
		min: i64,
		max: i64,
		limit: u64,
		page_size: u32,
	) -> BoxFuture<'a, Result<Vec<FeedbackRecord>>>;

	/// Records matching `filter` exactly, in storage order.
	fn list<'a>(
		&'a self,
		filter: &'a FeedbackFilter,
		limit: u64,
		page_size: u32,
	) -> BoxFuture<'a, Result<Vec<FeedbackRecord>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub chat: Arc<dyn ChatProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
		Self { embedding, chat }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), chat: provider }
	}
}

/// Process-wide handles shared by every query. Holds no per-query state.
pub struct AgentService {
	pub cfg: Config,
	pub index: Arc<dyn FeedbackIndex>,
	pub providers: Providers,
}
impl AgentService {
	pub fn new(cfg: Config, index: Arc<dyn FeedbackIndex>) -> Self {
		Self { cfg, index, providers: Providers::default() }
	}

	pub fn with_providers(
		cfg: Config,
		index: Arc<dyn FeedbackIndex>,
		providers: Providers,
	) -> Self {
		Self { cfg, index, providers }
	}

	/// Raw records for browsing, filtered by exact office, service, and rating.
	pub async fn list_feedback(
		&self,
		filter: &FeedbackFilter,
		limit: Option<u64>,
	) -> Result<Vec<FeedbackRecord>> {
		let limit = limit.unwrap_or(self.cfg.sandbox.default_fetch_limit);

		if limit == 0 {
			return Err(Error::InvalidRequest {
				message: "limit must be a positive integer.".to_string(),
			});
		}

		self.index.list(filter, limit, self.cfg.sandbox.fetch_page_size).await
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
		input: EmbeddingInput,
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts, input).await?) })
	}
}
impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(chat::complete(cfg, request).await?) })
	}
}

impl FeedbackIndex for QdrantStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		limit: u64,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move { Ok(QdrantStore::search(self, vector.to_vec(), limit).await?) })
	}

	fn fetch_all<'a>(
		&'a self,
		limit: u64,
		page_size: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move { Ok(QdrantStore::fetch_all(self, limit, page_size).await?) })
	}

	fn filter_by_rating<'a>(
		&'a self,
		min: i64,
		max: i64,
		limit: u64,
		page_size: u32,
	) -> BoxFuture<'a, Result<Vec<FeedbackRecord>>> {
		Box::pin(async move {
			Ok(QdrantStore::filter_by_rating(self, min, max, limit, page_size).await?)
		})
	}

	fn list<'a>(
		&'a self,
		filter: &'a FeedbackFilter,
		limit: u64,
		page_size: u32,
	) -> BoxFuture<'a, Result<Vec<FeedbackRecord>>> {
		Box::pin(async move { Ok(QdrantStore::list(self, filter, limit, page_size).await?) })
	}
}
