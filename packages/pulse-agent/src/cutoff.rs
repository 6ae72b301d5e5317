//! Two-stage relevance pruning applied after every semantic search.
//!
//! Stage 1 truncates the ranked list at the first significant relative score drop. Stage 2 asks
//! the model which of the survivors are off-topic and removes them. Both stages keep the input
//! order and never return fewer than `min_keep` items unless the input itself is smaller.

use std::collections::BTreeSet;

use pulse_providers::ChatRequest;
use pulse_storage::SearchHit;

use crate::Result;

const FILTER_SYSTEM_PROMPT: &str = "You are a strict semantic relevance filter for vector search results.
Your task:
Given a ranked list of feedback items, decide which indices should be removed because they are NOT semantically relevant to the user query.

Rules:
- Return ONLY a JSON array of integers (for example [1, 3]).
- Do NOT return explanations, markdown, or additional text.
- Each index refers to the 1-based position in the ranked list.
- Ignore the similarity score except as a hint; judge by meaning only.
- If all items are relevant, return [].
- Remove only items that clearly do not match the semantic meaning of the query.";

#[derive(Debug, Clone, PartialEq)]
pub struct CutoffParams {
	pub min_keep: usize,
	pub drop_ratio: f64,
	/// Character budget for the ranked block sent to the model.
	pub max_prompt_chars: usize,
	pub reply_max_tokens: u32,
}
impl CutoffParams {
	pub fn from_config(cfg: &pulse_config::Cutoff) -> Self {
		Self {
			min_keep: cfg.min_keep,
			drop_ratio: cfg.drop_ratio,
			max_prompt_chars: cfg.max_prompt_tokens.saturating_mul(cfg.chars_per_token),
			reply_max_tokens: cfg.reply_max_tokens,
		}
	}

	pub fn with_overrides(mut self, min_keep: Option<usize>, drop_ratio: Option<f64>) -> Self {
		if let Some(min_keep) = min_keep {
			self.min_keep = min_keep;
		}
		if let Some(drop_ratio) = drop_ratio {
			self.drop_ratio = drop_ratio;
		}

		self
	}
}

/// Runs both stages. `ask` performs the stage-2 model call; its failures are logged and treated
/// as "remove nothing".
pub fn dynamic_cutoff<F>(
	query: &str,
	hits: Vec<SearchHit>,
	params: &CutoffParams,
	ask: F,
) -> Vec<SearchHit>
where
	F: FnOnce(ChatRequest) -> Result<String>,
{
	let input_len = hits.len();
	let mut survivors = hits;

	survivors.truncate(statistical_cutoff(&survivors, params.min_keep, params.drop_ratio));

	tracing::debug!(input = input_len, kept = survivors.len(), "Statistical cutoff applied.");

	// Removing anything from a list this short would fall back to the same list.
	if survivors.len() <= params.min_keep {
		return survivors;
	}

	let block = render_ranked_block(&survivors, params.max_prompt_chars);
	let request = ChatRequest::new(
		FILTER_SYSTEM_PROMPT,
		format!(
			"User query:\n{query}\n\nRanked search results:\n{block}\n\nReturn a JSON array of indexes to remove. If none should be removed, return []."
		),
		params.reply_max_tokens,
	);
	let removals = match ask(request) {
		Ok(reply) => parse_removal_indices(&reply),
		Err(err) => {
			tracing::warn!(error = %err, "Relevance filter call failed. Keeping all survivors.");

			BTreeSet::new()
		},
	};

	semantic_prune(survivors, &removals, params.min_keep)
}

/// Number of leading hits kept by the score-drop rule.
pub fn statistical_cutoff(hits: &[SearchHit], min_keep: usize, drop_ratio: f64) -> usize {
	let n = hits.len();
	let mut cutoff = n;

	for i in 1..n {
		let prev = f64::from(hits[i - 1].score);
		let curr = f64::from(hits[i].score);

		if prev == 0.0 {
			continue;
		}
		if i >= min_keep && (prev - curr) / prev > drop_ratio {
			cutoff = i;

			break;
		}
	}

	cutoff.max(min_keep.min(n))
}

/// One line per hit, `"{index}. [score=0.912] text"`, with whitespace collapsed. Trailing lines
/// that would push the block, separators included, past `max_chars` are dropped.
pub fn render_ranked_block(hits: &[SearchHit], max_chars: usize) -> String {
	let mut lines = Vec::with_capacity(hits.len());
	let mut used = 0;

	for (idx, hit) in hits.iter().enumerate() {
		let text = hit.record.text.split_whitespace().collect::<Vec<_>>().join(" ");
		let line = format!("{}. [score={:.3}] {text}", idx + 1, hit.score);
		let len = line.chars().count() + usize::from(!lines.is_empty());

		if used + len > max_chars {
			break;
		}

		used += len;

		lines.push(line);
	}

	lines.join("\n")
}

/// Parses the model reply as a JSON array of 1-based indices. Anything else yields no removals.
pub fn parse_removal_indices(reply: &str) -> BTreeSet<usize> {
	let trimmed = crate::synthesize::strip_code_fence(reply);

	match serde_json::from_str::<Vec<i64>>(trimmed.trim()) {
		Ok(indices) => indices
			.into_iter()
			.filter_map(|idx| usize::try_from(idx).ok())
			.filter(|idx| *idx > 0)
			.collect(),
		Err(err) => {
			tracing::debug!(error = %err, "Relevance filter reply is not an index list.");

			BTreeSet::new()
		},
	}
}

fn semantic_prune(
	survivors: Vec<SearchHit>,
	removals: &BTreeSet<usize>,
	min_keep: usize,
) -> Vec<SearchHit> {
	if removals.is_empty() {
		return survivors;
	}

	let kept: Vec<SearchHit> = survivors
		.iter()
		.enumerate()
		.filter(|(idx, _)| !removals.contains(&(idx + 1)))
		.map(|(_, hit)| hit.clone())
		.collect();

	if kept.len() < min_keep {
		return survivors.into_iter().take(min_keep).collect();
	}

	kept
}
