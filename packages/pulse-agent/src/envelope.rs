use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ExecutionError;

pub const FALLBACK_TEXT: &str = "After several attempts the request could not be completed due to an error. Please try rephrasing the question.";
pub const AGENT_SOURCE: &str = "agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
	Text,
	Image,
	Table,
	Chart,
	Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
	#[serde(default = "default_source")]
	pub source: String,
	#[serde(default)]
	pub details: Option<Value>,
}
impl Default for EnvelopeMetadata {
	fn default() -> Self {
		Self { source: default_source(), details: None }
	}
}

/// The single structured answer produced for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
	#[serde(rename = "type")]
	pub kind: ResultKind,
	#[serde(default)]
	pub text: Option<String>,
	/// Base64-encoded PNG.
	#[serde(default)]
	pub image: Option<String>,
	#[serde(default)]
	pub table: Option<Vec<Map<String, Value>>>,
	#[serde(default)]
	pub metadata: EnvelopeMetadata,
}
impl ResultEnvelope {
	pub fn text(text: impl Into<String>) -> Self {
		Self {
			kind: ResultKind::Text,
			text: Some(text.into()),
			image: None,
			table: None,
			metadata: EnvelopeMetadata::default(),
		}
	}

	/// Returned when every attempt has failed.
	pub fn fallback() -> Self {
		Self::text(FALLBACK_TEXT)
	}

	/// Decodes and validates the value a pipeline bound to `final_answer`.
	pub fn from_pipeline_value(value: Value) -> Result<Self, ExecutionError> {
		let envelope: Self = serde_json::from_value(value).map_err(|err| {
			ExecutionError::invalid_output(format!("final_answer does not match the schema: {err}"))
		})?;

		envelope.validate()?;

		Ok(envelope)
	}

	pub fn validate(&self) -> Result<(), ExecutionError> {
		let has_text = self.text.as_deref().is_some_and(|text| !text.trim().is_empty());
		let has_image = self.image.as_deref().is_some_and(|image| !image.trim().is_empty());
		let has_table = self.table.is_some();

		match self.kind {
			ResultKind::Text =>
				require_only("text", has_text, [("image", has_image), ("table", has_table)])?,
			ResultKind::Image | ResultKind::Chart =>
				require_only("image", has_image, [("text", has_text), ("table", has_table)])?,
			ResultKind::Table =>
				require_only("table", has_table, [("text", has_text), ("image", has_image)])?,
			ResultKind::Mixed => {
				let populated = [has_text, has_image, has_table].into_iter().filter(|p| *p).count();

				if populated < 2 {
					return Err(ExecutionError::invalid_output(
						"final_answer of type mixed must populate at least two of text, image, table.",
					));
				}
			},
		}

		if let Some(image) = self.image.as_deref().filter(|_| has_image)
			&& STANDARD.decode(image.trim()).is_err()
		{
			return Err(ExecutionError::invalid_output("final_answer image is not valid base64."));
		}

		Ok(())
	}
}

fn require_only<const N: usize>(
	field: &str,
	present: bool,
	others: [(&str, bool); N],
) -> Result<(), ExecutionError> {
	if !present {
		return Err(ExecutionError::invalid_output(format!(
			"final_answer must populate {field} for its declared type."
		)));
	}

	for (other, populated) in others {
		if populated {
			return Err(ExecutionError::invalid_output(format!(
				"final_answer populates {other}, which its declared type does not allow; use type mixed."
			)));
		}
	}

	Ok(())
}

fn default_source() -> String {
	AGENT_SOURCE.to_string()
}
