use std::{convert::Infallible, time::Duration};

use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{
		IntoResponse, Response,
		sse::{Event, KeepAlive, Sse},
	},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt as _, wrappers::UnboundedReceiverStream};

use pulse_agent::{AttemptRecord, ResultEnvelope, StreamEvent};
use pulse_storage::{FeedbackFilter, FeedbackRecord};

use crate::state::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct AskRequest {
	pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
	pub answer: ResultEnvelope,
	pub dev_history: Vec<AttemptRecord>,
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
	pub question: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackQuery {
	pub office: Option<String>,
	pub service: Option<String>,
	pub level: Option<i64>,
	pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
	pub feedbacks: Vec<FeedbackRecord>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/ask", post(ask))
		.route("/ask_stream", get(ask_stream))
		.route("/feedbacks", get(feedbacks))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn ask(
	State(state): State<AppState>,
	Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
	let outcome = state.service.submit_query(&payload.question).await?;

	Ok(Json(AskResponse { answer: outcome.answer, dev_history: outcome.history }))
}

async fn ask_stream(
	State(state): State<AppState>,
	Query(params): Query<StreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
	let events = UnboundedReceiverStream::new(state.service.stream_query(params.question))
		.map(|event| Ok::<Event, Infallible>(sse_event(&event)));

	Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

async fn feedbacks(
	State(state): State<AppState>,
	Query(query): Query<FeedbackQuery>,
) -> Result<Json<FeedbackResponse>, ApiError> {
	let filter = FeedbackFilter {
		office: query.office.filter(|office| !office.is_empty()),
		service: query.service.filter(|service| !service.is_empty()),
		level: query.level,
	};
	let feedbacks = state.service.list_feedback(&filter, query.limit).await?;

	Ok(Json(FeedbackResponse { feedbacks }))
}

fn sse_event(event: &StreamEvent) -> Event {
	match serde_json::to_string(event) {
		Ok(data) => Event::default().data(data),
		Err(err) => {
			tracing::warn!(error = %err, "Failed to encode stream event.");

			Event::default().data(r#"{"type":"error","error":"Failed to encode stream event."}"#)
		},
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<pulse_agent::Error> for ApiError {
	fn from(err: pulse_agent::Error) -> Self {
		match err {
			pulse_agent::Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			pulse_agent::Error::Provider { message } =>
				json_error(StatusCode::BAD_GATEWAY, "provider_error", message),
			pulse_agent::Error::Index { message } =>
				json_error(StatusCode::SERVICE_UNAVAILABLE, "index_unavailable", message),
			err @ (pulse_agent::Error::Sandbox { .. } | pulse_agent::Error::Worker { .. }) => {
				tracing::error!(error = %err, "Request failed.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal error.")
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}
