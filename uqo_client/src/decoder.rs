use crate::error::ServerError;
use crate::{ApiError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use uqo_model::problem::Embedding;

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

/// Every field a UQO reply may carry; which ones are present depends on the task.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct Reply {
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
	#[serde(default)]
	pub solver: Option<String>,
	#[serde(default)]
	pub solver_details: Option<SolverDetails>,
	#[serde(default)]
	pub error_details: Option<Map<String, Value>>,
	#[serde(default)]
	pub message: Option<Value>,
	#[serde(default)]
	pub quota: Option<Value>,
	#[serde(default)]
	pub details: Option<Vec<Value>>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct SolverDetails {
	#[serde(default)]
	pub answer: Option<Value>,
	#[serde(default)]
	pub embedding: Option<Map<String, Value>>,
	#[serde(default)]
	pub details: Option<Vec<Value>>,
}

impl Reply {
	pub fn is_success(&self) -> bool {
		self.status.as_deref() == Some(STATUS_SUCCESS)
	}

	pub fn message_text(&self) -> Option<String> {
		self.message.as_ref().map(display_value)
	}

	/// Fail with the classified [`ServerError`] if this is an error reply.
	pub fn check_errors(&self) -> Result<()> {
		if self.status.as_deref() != Some(STATUS_ERROR) {
			return Ok(());
		}
		let message = self.message_text();
		Err(ServerError::classify(
			self.kind.as_deref().unwrap_or_default(),
			self.error_details.as_ref(),
			message.as_deref(),
		)?
		.into())
	}

	/// Like [`check_errors`](Self::check_errors), and also fail on any other
	/// non-success status.
	pub fn check_success(&self) -> Result<()> {
		self.check_errors()?;
		if self.is_success() {
			return Ok(());
		}
		let message = self.message_text().unwrap_or_else(|| {
			format!(
				"The server answered with status '{}'",
				self.status.as_deref().unwrap_or("<missing>")
			)
		});
		Err(ServerError::SolveFailed { message }.into())
	}

	fn solver_details(&self) -> Result<&SolverDetails> {
		self.solver_details
			.as_ref()
			.ok_or_else(|| missing("solver_details"))
	}

	pub fn answer(&self) -> Result<&Value> {
		self.solver_details()?
			.answer
			.as_ref()
			.ok_or_else(|| missing("solver_details.answer"))
	}

	pub fn embedding(&self) -> Result<Embedding> {
		let raw = self
			.solver_details()?
			.embedding
			.as_ref()
			.ok_or_else(|| missing("solver_details.embedding"))?;
		decode_embedding(raw)
	}

	pub fn solver_names(&self) -> Result<Vec<String>> {
		let names = self
			.solver_details()?
			.details
			.as_ref()
			.ok_or_else(|| missing("solver_details.details"))?;
		Ok(names.iter().map(display_value).collect())
	}

	pub fn platform_names(&self) -> Result<Vec<String>> {
		let names = self.details.as_ref().ok_or_else(|| missing("details"))?;
		Ok(names.iter().map(display_value).collect())
	}

	pub fn quota(&self) -> Result<f64> {
		let quota = self.quota.as_ref().ok_or_else(|| missing("quota"))?;
		quota
			.as_f64()
			.ok_or_else(|| ApiError::Decode(format!("quota {} is not a number", quota)))
	}
}

fn missing(field: &str) -> ApiError {
	ApiError::Decode(format!("reply lacks '{}'", field))
}

/// Embedding keys arrive as strings; turn them back into variable indices.
pub(crate) fn decode_embedding(raw: &Map<String, Value>) -> Result<Embedding> {
	raw.iter()
		.map(|(key, chain)| -> Result<(usize, Vec<usize>)> {
			let variable = key.trim().parse::<usize>().map_err(|_| {
				ApiError::Decode(format!("embedding key '{}' is not a variable index", key))
			})?;
			Ok((variable, Vec::<usize>::deserialize(chain)?))
		})
		.collect()
}

/// Strings as they are, anything else in its JSON form.
pub(crate) fn display_value(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}
