use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::{
	AgentService, AttemptError, ConsoleSink, ResultEnvelope,
	prompt::LOG_PREFIX,
	sandbox::{self, CancelFlag, Capabilities, SandboxContext},
	synthesize::CodeSynthesizer,
};

/// One synthesize-then-execute attempt, as reported to developers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
	pub attempt: u32,
	pub code: String,
	pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
	pub answer: ResultEnvelope,
	pub history: Vec<AttemptRecord>,
}

enum AttemptState {
	Attempting { attempt: u32, last_error: Option<String> },
	Done(ResultEnvelope),
}

/// Bounded, strictly sequential synthesize-then-execute loop for one question.
pub struct RetryCoordinator<'a> {
	service: &'a AgentService,
	console: Arc<ConsoleSink>,
}
impl<'a> RetryCoordinator<'a> {
	pub fn new(service: &'a AgentService, console: Arc<ConsoleSink>) -> Self {
		Self { service, console }
	}

	/// Always yields exactly one envelope: the first valid pipeline result, or the fallback once
	/// every attempt has failed.
	pub async fn run(&self, question: &str) -> QueryOutcome {
		let max_attempts = self.service.cfg.agent.max_attempts.max(1);
		let synthesizer = CodeSynthesizer::new(
			self.service.providers.chat.as_ref(),
			&self.service.cfg.providers.llm,
			self.service.cfg.agent.synthesis_max_tokens,
		);
		let mut history = Vec::with_capacity(max_attempts as usize);
		let mut state = AttemptState::Attempting { attempt: 1, last_error: None };

		loop {
			state = match state {
				AttemptState::Done(answer) => return QueryOutcome { answer, history },
				AttemptState::Attempting { attempt, last_error } => {
					let banner = format!("{LOG_PREFIX}attempt {attempt}/{max_attempts}");

					self.console.write_line(&banner);

					let last_error = last_error.as_deref();
					let result = self
						.attempt(&synthesizer, question, attempt, &mut history, last_error)
						.await;

					match result {
						Ok(answer) => {
							tracing::info!(attempt, max_attempts, "Query answered.");

							AttemptState::Done(answer)
						},
						Err(err) => {
							let detail = err.detail();

							tracing::warn!(attempt, max_attempts, error = %err, "Attempt failed.");

							if let Some(record) = history.last_mut() {
								record.error = Some(detail.clone());
							}

							if attempt >= max_attempts {
								tracing::warn!(max_attempts, "Attempts exhausted.");

								AttemptState::Done(ResultEnvelope::fallback())
							} else {
								AttemptState::Attempting {
									attempt: attempt + 1,
									last_error: Some(detail),
								}
							}
						},
					}
				},
			};
		}
	}

	async fn attempt(
		&self,
		synthesizer: &CodeSynthesizer<'_>,
		question: &str,
		attempt: u32,
		history: &mut Vec<AttemptRecord>,
		last_error: Option<&str>,
	) -> Result<ResultEnvelope, AttemptError> {
		let source = synthesizer.synthesize(question, attempt, history, last_error).await?;
		let context = SandboxContext::new(
			Capabilities::from_service(self.service),
			Handle::current(),
			self.console.clone(),
			CancelFlag::default(),
		);
		let limit = Duration::from_millis(self.service.cfg.agent.attempt_timeout_ms);

		Ok(sandbox::execute_with_timeout(source, context, limit).await?)
	}
}
