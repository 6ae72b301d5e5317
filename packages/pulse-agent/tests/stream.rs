use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use pulse_agent::{AgentService, BoxFuture, ChatProvider, Providers, ResultEnvelope, StreamEvent};
use pulse_config::LlmProviderConfig;
use pulse_providers::ChatRequest;
use pulse_testkit::{HashingEmbedder, MemoryIndex, ScriptedChat};

const OK_PROGRAM: &str = "final_answer = {\"type\": \"text\", \"text\": \"ok\"}\n";

async fn collect(mut rx: UnboundedReceiver<StreamEvent>) -> Vec<StreamEvent> {
	let mut events = Vec::new();

	while let Some(event) = rx.recv().await {
		events.push(event);
	}

	events
}

fn service(programs: &[&str]) -> Arc<pulse_agent::AgentService> {
	let chat = Arc::new(ScriptedChat::new(programs.iter().copied()));

	Arc::new(pulse_testkit::service(
		pulse_testkit::test_config(),
		pulse_testkit::numbered(4),
		chat,
	))
}

/// Chat model whose worker dies mid-query.
struct PanickingChat;
impl ChatProvider for PanickingChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_request: &'a ChatRequest,
	) -> BoxFuture<'a, pulse_agent::Result<String>> {
		panic!("chat backend crashed");
	}
}

fn log(message: &str) -> StreamEvent {
	StreamEvent::Log { message: message.to_string() }
}

#[tokio::test(flavor = "multi_thread")]
async fn logs_precede_a_single_result_and_done() {
	let service = service(&[r#"
print("§ step one")
print("")
print("   §   step two   ")
final_answer = {"type": "text", "text": "ok"}
"#]);
	let events = collect(service.stream_query("Summarize everything")).await;

	assert_eq!(events.len(), 5);
	assert_eq!(&events[..3], &[log("§ attempt 1/3"), log("§ step one"), log("§   step two")]);
	assert!(matches!(
		&events[3],
		StreamEvent::Result { answer, history }
			if answer == &ResultEnvelope::text("ok") && history.len() == 1
	));
	assert_eq!(events[4], StreamEvent::Done);
}

#[tokio::test(flavor = "multi_thread")]
async fn retries_stream_every_attempt_banner() {
	let service = service(&["fail(\"nope\")\n", OK_PROGRAM]);
	let events = collect(service.stream_query("Anything?")).await;
	let logs: Vec<&StreamEvent> =
		events.iter().filter(|event| matches!(event, StreamEvent::Log { .. })).collect();

	assert_eq!(logs, vec![&log("§ attempt 1/3"), &log("§ attempt 2/3")]);
	assert_eq!(events.iter().filter(|event| event.is_terminal()).count(), 1);
	assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_questions_end_with_an_error_event() {
	let service = service(&[]);
	let events = collect(service.stream_query("  ")).await;

	assert_eq!(events.len(), 2);
	assert!(matches!(&events[0], StreamEvent::Error { error } if error.contains("non-empty")));
	assert_eq!(events[1], StreamEvent::Done);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_subscribers_do_not_stop_the_query() {
	let chat = Arc::new(ScriptedChat::new([OK_PROGRAM]));
	let service = Arc::new(pulse_testkit::service(
		pulse_testkit::test_config(),
		pulse_testkit::numbered(1),
		chat.clone(),
	));

	drop(service.stream_query("Anything?"));

	for _ in 0..200 {
		if !chat.synthesis_calls().is_empty() {
			break;
		}

		tokio::time::sleep(std::time::Duration::from_millis(10)).await;
	}

	assert_eq!(chat.synthesis_calls().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_crashes_end_with_a_worker_error_then_done() {
	let embedder = Arc::new(HashingEmbedder::default());
	let index = Arc::new(MemoryIndex::new(pulse_testkit::numbered(3), &embedder));
	let service = Arc::new(AgentService::with_providers(
		pulse_testkit::test_config(),
		index,
		Providers::new(embedder, Arc::new(PanickingChat)),
	));
	let mut rx = service.stream_query("Which office is slowest?");
	let mut events = Vec::new();

	while let Some(event) = rx.recv().await {
		events.push(event);
	}

	let (done, rest) = events.split_last().expect("events");
	let (terminal, logs) = rest.split_last().expect("terminal event");

	assert_eq!(done, &StreamEvent::Done);
	assert!(matches!(
		terminal,
		StreamEvent::Error { error } if error.contains("Worker error")
	));
	assert!(logs.iter().all(|event| matches!(event, StreamEvent::Log { .. })));
	assert_eq!(events.iter().filter(|event| event.is_terminal()).count(), 1);
	assert!(rx.recv().await.is_none());
}
