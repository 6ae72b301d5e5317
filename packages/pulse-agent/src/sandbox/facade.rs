use std::sync::Arc;

use serde_json::Value as Json;
use starlark::{
	environment::GlobalsBuilder,
	eval::Evaluator,
	starlark_module,
	values::{Value, list::UnpackList},
};

use pulse_config::{EmbeddingProviderConfig, LlmProviderConfig};
use pulse_providers::{ChatRequest, EmbeddingInput};
use pulse_storage::{FeedbackRecord, RecordId, SearchHit};

use super::{
	SandboxContext,
	convert::{alloc, float, from_starlark, int, optional_json, positive_int, to_json},
};
use crate::{
	AgentService, CutoffParams, Error, FeedbackIndex, MergeMode, Providers, Result, merge,
};

/// Data-access capabilities bound into a pipeline, with the limits that apply to them.
#[derive(Clone)]
pub struct Capabilities {
	pub index: Arc<dyn FeedbackIndex>,
	pub providers: Providers,
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
	pub limits: pulse_config::Sandbox,
	pub cutoff: CutoffParams,
}
impl Capabilities {
	pub fn from_service(service: &AgentService) -> Self {
		Self {
			index: service.index.clone(),
			providers: service.providers.clone(),
			embedding: service.cfg.providers.embedding.clone(),
			llm: service.cfg.providers.llm.clone(),
			limits: service.cfg.sandbox.clone(),
			cutoff: CutoffParams::from_config(&service.cfg.cutoff),
		}
	}

	pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
		if text.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "embed() needs a non-empty semantic term.".to_string(),
			});
		}

		let texts = vec![text.to_string()];
		let mut vectors =
			self.providers.embedding.embed(&self.embedding, &texts, EmbeddingInput::Query).await?;

		vectors.pop().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vector.".to_string(),
		})
	}

	/// Similarity search. `limit` must be positive and is clamped to the configured maximum.
	pub async fn search(&self, vector: &[f32], limit: u64) -> Result<Vec<SearchHit>> {
		if limit == 0 {
			return Err(Error::InvalidRequest {
				message: "search_feedback() limit must be a positive integer.".to_string(),
			});
		}

		let limit = limit.min(self.limits.max_search_limit);

		self.index.search(vector, limit).await
	}

	pub async fn get_all_feedback(&self, limit: Option<u64>) -> Result<Vec<SearchHit>> {
		let limit = limit.unwrap_or(self.limits.default_fetch_limit);

		self.index.fetch_all(limit, self.limits.fetch_page_size).await
	}

	/// Records rated within `[min, max]`; `max` defaults to `min`.
	pub async fn filter_by_rating(
		&self,
		min: i64,
		max: Option<i64>,
		limit: Option<u64>,
	) -> Result<Vec<FeedbackRecord>> {
		let max = max.unwrap_or(min);

		if min > max {
			return Err(Error::InvalidRequest {
				message: format!("filter_by_rating() range is empty: {min} > {max}."),
			});
		}

		let limit = limit.unwrap_or(self.limits.default_fetch_limit);

		self.index.filter_by_rating(min, max, limit, self.limits.fetch_page_size).await
	}

	pub async fn ask_llm(
		&self,
		system_prompt: &str,
		user_prompt: &str,
		max_tokens: Option<u32>,
	) -> Result<String> {
		let request = ChatRequest::new(
			system_prompt,
			user_prompt,
			max_tokens.unwrap_or(self.limits.chat_max_tokens),
		);

		self.complete(&request).await
	}

	pub async fn complete(&self, request: &ChatRequest) -> Result<String> {
		self.providers.chat.complete(&self.llm, request).await
	}
}

fn context<'a>(eval: &Evaluator<'_, 'a, '_>) -> anyhow::Result<&'a SandboxContext> {
	eval.extra
		.and_then(|extra| extra.downcast_ref::<SandboxContext>())
		.ok_or_else(|| anyhow::anyhow!("Sandbox context is not installed."))
}

/// Identifies a hit or a bare record by its `ID`.
fn record_id(item: &Json) -> anyhow::Result<RecordId> {
	let id = item
		.get("payload")
		.unwrap_or(item)
		.get("ID")
		.ok_or_else(|| anyhow::anyhow!("merge_results() item has no ID: {item}"))?;

	serde_json::from_value(id.clone())
		.map_err(|err| anyhow::anyhow!("merge_results() item has an invalid ID {id}: {err}"))
}

#[starlark_module]
pub(super) fn register(builder: &mut GlobalsBuilder) {
	fn embed<'v>(text: &'v str, eval: &mut Evaluator<'v, '_, '_>) -> anyhow::Result<Value<'v>> {
		let ctx = context(eval)?;
		let vector = ctx.block_on(ctx.capabilities.embed(text))?;

		alloc(eval.heap(), &vector)
	}

	fn search_feedback<'v>(
		vector: Value<'v>,
		limit: Value<'v>,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let ctx = context(eval)?;
		let vector: Vec<f32> = from_starlark(vector, "search_feedback() vector")?;
		let limit = positive_int(&to_json(limit)?, "search_feedback() limit")?;
		let hits = ctx.block_on(ctx.capabilities.search(&vector, limit))?;

		alloc(eval.heap(), &hits)
	}

	fn dynamic_cutoff<'v>(
		query: &'v str,
		results: Value<'v>,
		min_keep: Option<Value<'v>>,
		drop_ratio: Option<Value<'v>>,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let ctx = context(eval)?;
		let hits: Vec<SearchHit> = from_starlark(results, "dynamic_cutoff() results")?;
		let min_keep = optional_json(min_keep)?
			.map(|value| positive_int(&value, "dynamic_cutoff() min_keep"))
			.transpose()?
			.map(|value| value as usize);
		let drop_ratio = optional_json(drop_ratio)?
			.map(|value| float(&value, "dynamic_cutoff() drop_ratio"))
			.transpose()?;
		let kept = ctx.dynamic_cutoff(query, hits, min_keep, drop_ratio)?;

		alloc(eval.heap(), &kept)
	}

	fn get_all_feedback<'v>(
		limit: Option<Value<'v>>,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let ctx = context(eval)?;
		let limit = optional_json(limit)?
			.map(|value| positive_int(&value, "get_all_feedback() limit"))
			.transpose()?;
		let hits = ctx.block_on(ctx.capabilities.get_all_feedback(limit))?;

		alloc(eval.heap(), &hits)
	}

	fn filter_by_rating<'v>(
		min_rating: Value<'v>,
		max_rating: Option<Value<'v>>,
		limit: Option<Value<'v>>,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let ctx = context(eval)?;
		let min = int(&to_json(min_rating)?, "filter_by_rating() min_rating")?;
		let max = optional_json(max_rating)?
			.map(|value| int(&value, "filter_by_rating() max_rating"))
			.transpose()?;
		let limit = optional_json(limit)?
			.map(|value| positive_int(&value, "filter_by_rating() limit"))
			.transpose()?;
		let records = ctx.block_on(ctx.capabilities.filter_by_rating(min, max, limit))?;

		alloc(eval.heap(), &records)
	}

	fn ask_llm<'v>(
		system_prompt: &'v str,
		user_prompt: &'v str,
		max_tokens: Option<Value<'v>>,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<String> {
		let ctx = context(eval)?;
		let max_tokens = optional_json(max_tokens)?
			.map(|value| positive_int(&value, "ask_llm() max_tokens"))
			.transpose()?
			.map(|value| u32::try_from(value).unwrap_or(u32::MAX));

		ctx.block_on(ctx.capabilities.ask_llm(system_prompt, user_prompt, max_tokens))
	}

	fn merge_results<'v>(
		result_sets: UnpackList<Value<'v>>,
		mode: &'v str,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let mode: MergeMode = mode.parse()?;
		let mut sets = Vec::with_capacity(result_sets.items.len());

		for set in result_sets.items {
			let items: Vec<Json> = from_starlark(set, "merge_results() result set")?;
			let keyed = items
				.into_iter()
				.map(|item| Ok((record_id(&item)?, item)))
				.collect::<anyhow::Result<Vec<_>>>()?;

			sets.push(keyed);
		}

		let merged: Vec<Json> = merge::merge_by_id(sets, mode, |(id, _)| id.clone())
			.into_iter()
			.map(|(_, item)| item)
			.collect();

		alloc(eval.heap(), &merged)
	}
}
