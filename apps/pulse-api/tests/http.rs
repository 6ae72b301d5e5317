use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::util::ServiceExt;

use pulse_api::{routes, state::AppState};
use pulse_testkit::ScriptedChat;

const COUNT_PROGRAM: &str = r#"
rows = get_all_feedback()
print("§ Found %d feedback records." % len(rows))
final_answer = {"type": "text", "text": "There are %d records." % len(rows)}
"#;

fn app(programs: &[&str]) -> Router {
	let chat = Arc::new(ScriptedChat::new(programs.iter().copied()));
	let records = pulse_testkit::corpus().expect("corpus");
	let service = pulse_testkit::service(pulse_testkit::test_config(), records, chat);

	routes::router(AppState::from_service(Arc::new(service)))
}

async fn body_text(response: axum::response::Response) -> String {
	let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("body");

	String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

async fn body_json(response: axum::response::Response) -> Value {
	serde_json::from_str(&body_text(response).await).expect("json body")
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("request")
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(payload.to_string()))
		.expect("request")
}

#[tokio::test]
async fn health_ok() {
	let response = app(&[]).oneshot(get("/health")).await.expect("response");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_returns_the_answer_with_history() {
	let response = app(&[COUNT_PROGRAM])
		.oneshot(post_json("/ask", &serde_json::json!({ "question": "How many records?" })))
		.await
		.expect("response");

	assert_eq!(response.status(), StatusCode::OK);

	let json = body_json(response).await;

	assert_eq!(json["answer"]["type"], "text");
	assert_eq!(json["answer"]["text"], "There are 8 records.");
	assert_eq!(json["answer"]["metadata"]["source"], "agent");
	assert_eq!(json["dev_history"].as_array().map(Vec::len), Some(1));
	assert_eq!(json["dev_history"][0]["attempt"], 1);
	assert_eq!(json["dev_history"][0]["error"], Value::Null);
}

#[tokio::test]
async fn blank_questions_are_bad_requests() {
	let response = app(&[])
		.oneshot(post_json("/ask", &serde_json::json!({ "question": " " })))
		.await
		.expect("response");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = body_json(response).await;

	assert_eq!(json["error_code"], "invalid_request");
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_stream_emits_logs_result_and_done() {
	let response = app(&[COUNT_PROGRAM])
		.oneshot(get("/ask_stream?question=How%20many%20records%3F"))
		.await
		.expect("response");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		response.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()),
		Some("text/event-stream")
	);

	let events: Vec<Value> = body_text(response)
		.await
		.lines()
		.filter_map(|line| line.strip_prefix("data:"))
		.map(|data| serde_json::from_str(data.trim_start()).expect("event json"))
		.collect();
	let kinds: Vec<&str> = events.iter().filter_map(|event| event["type"].as_str()).collect();

	assert_eq!(kinds, vec!["log", "log", "result", "done"]);
	assert_eq!(events[1]["message"], "§ Found 8 feedback records.");
	assert_eq!(events[2]["answer"]["text"], "There are 8 records.");
	assert_eq!(events[2]["history"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn feedbacks_filter_by_exact_metadata() {
	let app = app(&[]);
	let by_office =
		body_json(app.clone().oneshot(get("/feedbacks?office=transport")).await.expect("response"))
			.await;
	let by_level =
		body_json(app.clone().oneshot(get("/feedbacks?level=2&limit=2")).await.expect("response"))
			.await;
	let everything = body_json(app.oneshot(get("/feedbacks")).await.expect("response")).await;

	let ids = |json: &Value| -> Vec<Value> {
		json["feedbacks"]
			.as_array()
			.expect("feedbacks")
			.iter()
			.map(|record| record["ID"].clone())
			.collect()
	};

	assert_eq!(ids(&by_office), vec![Value::from(3), Value::from(4)]);
	assert_eq!(ids(&by_level), vec![Value::from(2), Value::from(4)]);
	assert_eq!(ids(&everything).len(), 8);
	assert_eq!(by_office["feedbacks"][0]["service"], "vehicle-fees");
}

#[tokio::test]
async fn feedbacks_reject_a_zero_limit() {
	let response = app(&[]).oneshot(get("/feedbacks?limit=0")).await.expect("response");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
