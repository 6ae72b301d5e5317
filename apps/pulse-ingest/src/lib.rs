pub mod source;

mod error;

pub use error::{Error, Result};

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use pulse_providers::{EmbeddingInput, embedding};
use pulse_storage::{FeedbackRecord, qdrant::QdrantStore};

#[derive(Debug, Parser)]
#[command(
	version = pulse_cli::VERSION,
	rename_all = "kebab",
	styles = pulse_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Feedback export as CSV with `ID`, `Level`, `Text`, and `ServiceName` columns.
	#[arg(long, short = 'i', value_name = "FILE")]
	pub input: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = pulse_config::load(&args.config)?;

	pulse_cli::init_tracing(&config.service.log_level);

	let raw = tokio::fs::read_to_string(&args.input).await?;
	let rows = source::parse_rows(raw.as_bytes())?;
	let records: Vec<FeedbackRecord> =
		rows.into_iter().map(source::SourceRow::into_record).collect();
	let store = QdrantStore::new(&config.storage.qdrant)?;
	let inserted = ingest(&config, &store, records).await?;

	tracing::info!(inserted, input = %args.input.display(), "Ingestion finished.");

	Ok(())
}

/// Embeds `records` batch by batch and upserts them. The collection is created on the first
/// batch with the dimension the model returned.
pub async fn ingest(
	config: &pulse_config::Config,
	store: &QdrantStore,
	records: Vec<FeedbackRecord>,
) -> Result<usize> {
	let batch_size = config.ingest.batch_size.max(1);
	let pause = Duration::from_millis(config.ingest.pause_ms);
	let total = records.len();
	let mut collection_ready = false;
	let mut inserted = 0;

	for (idx, batch) in records.chunks(batch_size).enumerate() {
		if idx > 0 && !pause.is_zero() {
			tokio::time::sleep(pause).await;
		}

		let texts: Vec<String> = batch.iter().map(source::embedding_text).collect();
		let vectors =
			embedding::embed(&config.providers.embedding, &texts, EmbeddingInput::Passage).await?;

		if vectors.len() != batch.len() {
			return Err(Error::Validation(format!(
				"Embedding provider returned {} vectors for {} texts.",
				vectors.len(),
				batch.len()
			)));
		}
		if !collection_ready {
			let dim = vectors.first().map(Vec::len).unwrap_or_default();

			if dim == 0 {
				return Err(Error::Validation("Embedding provider returned empty vectors.".into()));
			}

			store.ensure_collection(dim as u64).await?;

			collection_ready = true;
		}

		inserted += store.upsert(batch.iter().cloned().zip(vectors).collect()).await?;

		tracing::info!(inserted, total, "Feedback batch indexed.");
	}

	Ok(inserted)
}
