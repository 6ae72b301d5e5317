//! Query entry points: a one-shot call and a live event stream.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
	AgentService, ConsoleSink, Error, QueryOutcome, Result, StreamEvent, retry::RetryCoordinator,
};

impl AgentService {
	/// Answers `question` and returns the envelope with the attempt history.
	///
	/// Console output is mirrored to `tracing` only.
	pub async fn submit_query(&self, question: &str) -> Result<QueryOutcome> {
		let question = validate_question(question)?;
		let console = Arc::new(ConsoleSink::detached());
		let outcome = RetryCoordinator::new(self, console.clone()).run(question).await;

		console.close();

		Ok(outcome)
	}

	/// Answers `question` on a background task and streams its progress.
	///
	/// The receiver yields console lines as [`StreamEvent::Log`], then exactly one
	/// [`StreamEvent::Result`] or [`StreamEvent::Error`], then [`StreamEvent::Done`], after which
	/// the channel closes. Dropping the receiver does not cancel the query.
	pub fn stream_query(
		self: &Arc<Self>,
		question: impl Into<String>,
	) -> UnboundedReceiver<StreamEvent> {
		let (tx, rx) = mpsc::unbounded_channel();

		tokio::spawn(bridge(self.clone(), question.into(), tx));

		rx
	}
}

async fn bridge(
	service: Arc<AgentService>,
	question: String,
	events: UnboundedSender<StreamEvent>,
) {
	let console = Arc::new(ConsoleSink::new(events.clone()));
	let worker_console = console.clone();
	let worker = tokio::spawn(async move {
		let question = validate_question(&question)?;

		Ok::<_, Error>(RetryCoordinator::new(&service, worker_console).run(question).await)
	});
	let terminal = match worker.await {
		Ok(Ok(outcome)) => StreamEvent::Result { answer: outcome.answer, history: outcome.history },
		Ok(Err(err)) => StreamEvent::Error { error: err.to_string() },
		Err(err) => {
			let err = Error::Worker { message: err.to_string() };

			tracing::error!(error = %err, "Query worker failed.");

			StreamEvent::Error { error: err.to_string() }
		},
	};

	console.close();

	for event in [terminal, StreamEvent::Done] {
		if events.send(event).is_err() {
			tracing::debug!("Stream subscriber disconnected before the end of the query.");

			break;
		}
	}
}

fn validate_question(question: &str) -> Result<&str> {
	let question = question.trim();

	if question.is_empty() {
		return Err(Error::InvalidRequest {
			message: "question must be a non-empty string.".to_string(),
		});
	}

	Ok(question)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn questions_are_trimmed_and_must_not_be_blank() {
		let question = validate_question("  Which office is slowest?\n").expect("valid question");

		assert_eq!(question, "Which office is slowest?");
		assert!(matches!(validate_question(" \t\n"), Err(Error::InvalidRequest { .. })));
	}
}
