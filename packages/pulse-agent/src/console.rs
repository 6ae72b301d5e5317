use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::{AttemptRecord, ResultEnvelope};

/// Events delivered to a streaming subscriber: any number of `Log`, then exactly one `Result`
/// or `Error`, then `Done`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
	Log { message: String },
	Result { answer: ResultEnvelope, history: Vec<AttemptRecord> },
	Error { error: String },
	Done,
}
impl StreamEvent {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Result { .. } | Self::Error { .. })
	}
}

/// Line-buffered console of one query.
///
/// Writes are split on `\n`; each completed line is trimmed and, when non-blank, forwarded as a
/// [`StreamEvent::Log`] and mirrored to `tracing`. A trailing partial line waits for a later
/// newline or for [`ConsoleSink::close`]. Writes after close are discarded.
pub struct ConsoleSink {
	state: Mutex<ConsoleState>,
}
impl ConsoleSink {
	pub fn new(subscriber: UnboundedSender<StreamEvent>) -> Self {
		Self::with_subscriber(Some(subscriber))
	}

	/// A console whose lines only reach `tracing`.
	pub fn detached() -> Self {
		Self::with_subscriber(None)
	}

	fn with_subscriber(subscriber: Option<UnboundedSender<StreamEvent>>) -> Self {
		let state = ConsoleState { partial: String::new(), subscriber, closed: false };

		Self { state: Mutex::new(state) }
	}

	pub fn write(&self, chunk: &str) {
		self.state.lock().unwrap_or_else(|err| err.into_inner()).write(chunk);
	}

	pub fn write_line(&self, line: &str) {
		self.write(&format!("{line}\n"));
	}

	/// Writes `line` only if `live` holds, evaluated under the console lock. Returns whether the
	/// line was accepted.
	pub fn write_line_if(&self, line: &str, live: impl FnOnce() -> bool) -> bool {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		if !live() {
			return false;
		}

		state.write(&format!("{line}\n"));

		true
	}

	/// Flushes any partial line and detaches the subscriber. Idempotent.
	pub fn close(&self) {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		if state.closed {
			return;
		}

		let rest = std::mem::take(&mut state.partial);

		state.forward(&rest);
		state.subscriber = None;
		state.closed = true;
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().unwrap_or_else(|err| err.into_inner()).closed
	}
}

struct ConsoleState {
	partial: String,
	subscriber: Option<UnboundedSender<StreamEvent>>,
	closed: bool,
}
impl ConsoleState {
	fn write(&mut self, chunk: &str) {
		if self.closed {
			return;
		}

		self.partial.push_str(chunk);

		while let Some(pos) = self.partial.find('\n') {
			let line: String = self.partial.drain(..=pos).collect();

			self.forward(&line);
		}
	}

	fn forward(&mut self, raw: &str) {
		let line = raw.trim();

		if line.is_empty() {
			return;
		}

		tracing::debug!(line, "Pipeline console.");

		if let Some(subscriber) = &self.subscriber
			&& subscriber.send(StreamEvent::Log { message: line.to_string() }).is_err()
		{
			tracing::debug!("Console subscriber disconnected.");

			self.subscriber = None;
		}
	}
}

#[cfg(test)]
mod tests {
	use tokio::sync::mpsc::{self, UnboundedReceiver};

	use super::*;

	fn drain(rx: &mut UnboundedReceiver<StreamEvent>) -> Vec<String> {
		let mut lines = Vec::new();

		while let Ok(event) = rx.try_recv() {
			match event {
				StreamEvent::Log { message } => lines.push(message),
				other => panic!("unexpected event {other:?}"),
			}
		}

		lines
	}

	#[test]
	fn gated_lines_are_dropped_once_the_gate_closes() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let console = ConsoleSink::new(tx);

		assert!(console.write_line_if("kept", || true));
		assert!(!console.write_line_if("dropped", || false));

		console.write_line("banner");

		assert_eq!(drain(&mut rx), vec!["kept", "banner"]);
	}

	#[test]
	fn partial_lines_wait_for_a_newline() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let console = ConsoleSink::new(tx);

		console.write("a\nb\nc");

		assert_eq!(drain(&mut rx), vec!["a", "b"]);

		console.write("d\n");

		assert_eq!(drain(&mut rx), vec!["cd"]);
	}

	#[test]
	fn close_flushes_the_tail_and_detaches() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let console = ConsoleSink::new(tx);

		console.write("a\nb\nc");
		console.close();
		console.write("late\n");
		console.close();

		assert_eq!(drain(&mut rx), vec!["a", "b", "c"]);
		assert!(console.is_closed());
		assert!(rx.try_recv().is_err());
	}

	#[test]
	fn blank_lines_are_skipped_and_lines_trimmed() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let console = ConsoleSink::new(tx);

		console.write("  § step one  \n\n   \n§ step two\r\n");

		assert_eq!(drain(&mut rx), vec!["§ step one", "§ step two"]);
	}

	#[test]
	fn dropped_subscriber_does_not_fail_writes() {
		let (tx, rx) = mpsc::unbounded_channel();
		let console = ConsoleSink::new(tx);

		drop(rx);

		console.write_line("§ still running");
		console.close();

		assert!(console.is_closed());
	}

	#[test]
	fn events_serialize_with_a_type_tag() {
		let log = serde_json::to_value(StreamEvent::Log { message: "§ hi".to_string() })
			.expect("serialize log");
		let done = serde_json::to_value(StreamEvent::Done).expect("serialize done");
		let error = StreamEvent::Error { error: "worker failed".to_string() };

		assert_eq!(log, serde_json::json!({ "type": "log", "message": "§ hi" }));
		assert_eq!(done, serde_json::json!({ "type": "done" }));
		assert!(error.is_terminal());
		assert!(!StreamEvent::Done.is_terminal());
	}
}
