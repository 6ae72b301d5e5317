use std::sync::LazyLock;

use regex::Regex;

use pulse_config::LlmProviderConfig;
use pulse_providers::ChatRequest;

use crate::{AttemptRecord, ChatProvider, SynthesisError, prompt::PIPELINE_PROMPT};

static CODE_FENCE: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[^\n]*\n(.*?)```").ok());

/// Turns a question into candidate pipeline source through the chat model.
pub struct CodeSynthesizer<'a> {
	chat: &'a dyn ChatProvider,
	cfg: &'a LlmProviderConfig,
	max_tokens: u32,
}
impl<'a> CodeSynthesizer<'a> {
	pub fn new(chat: &'a dyn ChatProvider, cfg: &'a LlmProviderConfig, max_tokens: u32) -> Self {
		Self { chat, cfg, max_tokens }
	}

	/// Requests a complete program for `attempt` and appends its record to `history`.
	///
	/// Attempts after the first must carry the previous failure; it is embedded verbatim in a
	/// corrective instruction that asks for a full regeneration.
	pub async fn synthesize(
		&self,
		question: &str,
		attempt: u32,
		history: &mut Vec<AttemptRecord>,
		last_error: Option<&str>,
	) -> Result<String, SynthesisError> {
		let source = self.request_source(question, attempt, last_error).await;
		let code = source.clone().unwrap_or_default();

		history.push(AttemptRecord { attempt, code, error: None });

		source
	}

	async fn request_source(
		&self,
		question: &str,
		attempt: u32,
		last_error: Option<&str>,
	) -> Result<String, SynthesisError> {
		let user_prompt = user_prompt(question, attempt, last_error)?;
		let request = ChatRequest::new(PIPELINE_PROMPT, user_prompt, self.max_tokens);
		let reply = self
			.chat
			.complete(self.cfg, &request)
			.await
			.map_err(|err| SynthesisError::Provider { message: err.to_string() })?;
		let source = strip_code_fence(&reply).trim();

		if source.is_empty() {
			return Err(SynthesisError::EmptySource);
		}

		tracing::debug!(attempt, bytes = source.len(), "Synthesized pipeline source.");

		Ok(source.to_string())
	}
}

pub fn user_prompt(
	question: &str,
	attempt: u32,
	last_error: Option<&str>,
) -> Result<String, SynthesisError> {
	if attempt <= 1 {
		return Ok(question.to_string());
	}

	let Some(last_error) = last_error.filter(|err| !err.trim().is_empty()) else {
		return Err(SynthesisError::MissingFeedback);
	};

	Ok(format!(
		"Previous attempt failed.
Error cause:
{last_error}

Your task:
Regenerate the entire Starlark program from scratch. Do not patch the previous program.
Fix the specific cause of failure directly and explicitly, using only the functions available in the sandbox.
Keep the original user request unchanged:
{question}

Output:
Only the corrected Starlark code."
	))
}

/// Returns the body of the first Markdown code fence in `reply`, or `reply` itself.
pub fn strip_code_fence(reply: &str) -> &str {
	CODE_FENCE
		.as_ref()
		.and_then(|re| re.captures(reply))
		.and_then(|caps| caps.get(1))
		.map(|body| body.as_str())
		.unwrap_or(reply)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_attempt_sends_the_raw_question() {
		let prompt = user_prompt("Which office has the most complaints?", 1, None).expect("prompt");

		assert_eq!(prompt, "Which office has the most complaints?");
	}

	#[test]
	fn corrective_prompt_embeds_error_and_question() {
		let prompt = user_prompt(
			"Summarize payment issues",
			2,
			Some("error: Variable `df` not found"),
		)
		.expect("prompt");

		assert!(prompt.starts_with("Previous attempt failed."));
		assert!(prompt.contains("error: Variable `df` not found"));
		assert!(prompt.contains("Summarize payment issues"));
		assert!(prompt.contains("from scratch"));
	}

	#[test]
	fn corrective_prompt_requires_an_error() {
		assert_eq!(user_prompt("q", 2, None), Err(SynthesisError::MissingFeedback));
		assert_eq!(user_prompt("q", 3, Some("  ")), Err(SynthesisError::MissingFeedback));
	}

	#[test]
	fn fences_are_stripped() {
		assert_eq!(strip_code_fence("```python\nx = 1\n```").trim(), "x = 1");
		assert_eq!(
			strip_code_fence("Here you go:\n```\nx = 1\ny = 2\n```\nDone.").trim(),
			"x = 1\ny = 2"
		);
		assert_eq!(strip_code_fence("x = 1"), "x = 1");
	}
}
