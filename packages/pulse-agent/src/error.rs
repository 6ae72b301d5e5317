use std::time::Duration;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Sandbox error: {message}")]
	Sandbox { message: String },
	#[error("Worker error: {message}")]
	Worker { message: String },
}
impl From<pulse_providers::Error> for Error {
	fn from(err: pulse_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<pulse_storage::Error> for Error {
	fn from(err: pulse_storage::Error) -> Self {
		match err {
			pulse_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::Index { message: other.to_string() },
		}
	}
}

/// Failure to obtain runnable pipeline source from the model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
	#[error("A corrective attempt requires the previous error detail.")]
	MissingFeedback,
	#[error("Model call failed: {message}")]
	Provider { message: String },
	#[error("Model reply contained no pipeline source.")]
	EmptySource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
	/// Parse, runtime, or capability failure raised by the pipeline.
	Fault,
	/// The pipeline finished without binding `final_answer`.
	MissingOutput,
	/// `final_answer` was bound but is not a valid result envelope.
	InvalidOutput,
	TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
	pub kind: ExecutionErrorKind,
	pub message: String,
	pub trace: String,
}
impl ExecutionError {
	pub fn fault(message: impl Into<String>, trace: impl Into<String>) -> Self {
		Self { kind: ExecutionErrorKind::Fault, message: message.into(), trace: trace.into() }
	}

	pub fn missing_output() -> Self {
		Self {
			kind: ExecutionErrorKind::MissingOutput,
			message: "error: final_answer variable not defined in the generated code".to_string(),
			trace: String::new(),
		}
	}

	pub fn invalid_output(message: impl Into<String>) -> Self {
		Self {
			kind: ExecutionErrorKind::InvalidOutput,
			message: message.into(),
			trace: String::new(),
		}
	}

	pub fn timed_out(limit: Duration) -> Self {
		Self {
			kind: ExecutionErrorKind::TimedOut,
			message: format!("Pipeline exceeded the {} ms execution limit.", limit.as_millis()),
			trace: String::new(),
		}
	}

	/// Message and trace joined the way they are fed back to the synthesizer.
	pub fn detail(&self) -> String {
		if self.trace.is_empty() {
			self.message.clone()
		} else {
			format!("{}\n{}", self.message, self.trace)
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
	#[error(transparent)]
	Synthesis(#[from] SynthesisError),
	#[error(transparent)]
	Execution(#[from] ExecutionError),
}
impl AttemptError {
	pub fn detail(&self) -> String {
		match self {
			Self::Synthesis(err) => err.to_string(),
			Self::Execution(err) => err.detail(),
		}
	}
}
