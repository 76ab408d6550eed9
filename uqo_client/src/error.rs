//! Errors reported by a UQO server.
//!
//! Every reply with `status == "error"` is classified into exactly one
//! [`ServerError`] by its `type` field; the detail fields the server sends along
//! are kept in the variant and rendered into the message.
use crate::decoder::display_value;
use crate::{ApiError, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

const RULE: &str = "----------";

/// Frame `body` between two horizontal rules, the layout of every UQO error message.
pub fn framed(body: &str) -> String {
	format!("\n\n{rule}\n\n{body}\n\n{rule}", rule = RULE, body = body)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
	/// Credentials or method rejected, or not allowed to run the request.
	Authentication,
	/// Missing or invalid task, platform or solver.
	Request,
	/// The remote solver failed.
	Backend,
	/// The server used an error type this client does not know.
	Unclassified,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServerError {
	MissingAuthMethod,
	InvalidAuthMethod {
		sent: String,
		available: Vec<String>,
	},
	InvalidCredentials,
	MalformedAuthMessage,
	GenericAuth,
	AuthAdminFailed,
	InsufficientQuota,
	/// Rate limited; another QUBO may be sent after `interval` seconds.
	FastRetry {
		interval: u64,
	},
	MissingTask,
	InvalidTask {
		sent: String,
		available: Vec<String>,
	},
	InvalidPlatform,
	MissingPlatform {
		available: Vec<String>,
	},
	InvalidSolver {
		solver: String,
		platform: String,
	},
	GenericBackend,
	Solver {
		message: String,
	},
	Fujitsu {
		message: String,
	},
	Tabu {
		message: String,
	},
	/// A solve reply that was neither successful nor a classified error.
	SolveFailed {
		message: String,
	},
	Unknown {
		kind: String,
		message: Option<String>,
	},
}

impl ServerError {
	/// Map an error reply's `type`, `error_details` and `message` to its variant.
	///
	/// Fails with [`ApiError::Decode`] when a detail field the variant requires
	/// is absent.
	pub fn classify(
		kind: &str,
		details: Option<&Map<String, Value>>,
		message: Option<&str>,
	) -> Result<Self> {
		let empty = Map::new();
		let details = Details {
			fields: details.unwrap_or(&empty),
			kind,
		};
		Ok(match kind {
			"MissingAuthenticationMethod" => ServerError::MissingAuthMethod,
			"InvalidAuthenticationMethod" => ServerError::InvalidAuthMethod {
				sent: details.text("parameters_sent")?,
				available: details.list("auth_methods_available")?,
			},
			"InvalidCredentials" => ServerError::InvalidCredentials,
			"MissingAuthenticationCredentials" => ServerError::MalformedAuthMessage,
			"generic_auth_error" => ServerError::GenericAuth,
			"auth_admin_failed" => ServerError::AuthAdminFailed,
			"InsufficientQuota" => ServerError::InsufficientQuota,
			"fast_retry_exception" => ServerError::FastRetry {
				interval: details.seconds("interval")?,
			},
			"MissingTask" => ServerError::MissingTask,
			"InvalidTask" => ServerError::InvalidTask {
				sent: details
					.text("parameters_sent")
					.or_else(|_| details.text("value"))?,
				available: details.list("tasks_available").unwrap_or_default(),
			},
			"InvalidPlatform" => ServerError::InvalidPlatform,
			"MissingPlatform" => ServerError::MissingPlatform {
				available: details.list("available_platforms")?,
			},
			"InvalidSolver" => ServerError::InvalidSolver {
				solver: details.text("parameters_sent")?,
				platform: details.text("platform")?,
			},
			"generic_backend_error" => ServerError::GenericBackend,
			"solver_error" => ServerError::Solver {
				message: details.text("message")?,
			},
			"FujitsuException" => ServerError::Fujitsu {
				message: details.text("message")?,
			},
			"TabuException" => ServerError::Tabu {
				message: details.text("message")?,
			},
			other => ServerError::Unknown {
				kind: other.to_owned(),
				message: message.map(str::to_owned),
			},
		})
	}

	/// The wire `type` this variant is classified from.
	pub fn tag(&self) -> &str {
		match self {
			ServerError::MissingAuthMethod => "MissingAuthenticationMethod",
			ServerError::InvalidAuthMethod { .. } => "InvalidAuthenticationMethod",
			ServerError::InvalidCredentials => "InvalidCredentials",
			ServerError::MalformedAuthMessage => "MissingAuthenticationCredentials",
			ServerError::GenericAuth => "generic_auth_error",
			ServerError::AuthAdminFailed => "auth_admin_failed",
			ServerError::InsufficientQuota => "InsufficientQuota",
			ServerError::FastRetry { .. } => "fast_retry_exception",
			ServerError::MissingTask => "MissingTask",
			ServerError::InvalidTask { .. } => "InvalidTask",
			ServerError::InvalidPlatform => "InvalidPlatform",
			ServerError::MissingPlatform { .. } => "MissingPlatform",
			ServerError::InvalidSolver { .. } => "InvalidSolver",
			ServerError::GenericBackend => "generic_backend_error",
			ServerError::Solver { .. } => "solver_error",
			ServerError::Fujitsu { .. } => "FujitsuException",
			ServerError::Tabu { .. } => "TabuException",
			ServerError::SolveFailed { .. } => "failed",
			ServerError::Unknown { kind, .. } => kind.as_str(),
		}
	}

	pub fn category(&self) -> ErrorCategory {
		match self {
			ServerError::MissingAuthMethod
			| ServerError::InvalidAuthMethod { .. }
			| ServerError::InvalidCredentials
			| ServerError::MalformedAuthMessage
			| ServerError::GenericAuth
			| ServerError::AuthAdminFailed
			| ServerError::InsufficientQuota
			| ServerError::FastRetry { .. } => ErrorCategory::Authentication,
			ServerError::MissingTask
			| ServerError::InvalidTask { .. }
			| ServerError::InvalidPlatform
			| ServerError::MissingPlatform { .. }
			| ServerError::InvalidSolver { .. } => ErrorCategory::Request,
			ServerError::GenericBackend
			| ServerError::Solver { .. }
			| ServerError::Fujitsu { .. }
			| ServerError::Tabu { .. }
			| ServerError::SolveFailed { .. } => ErrorCategory::Backend,
			ServerError::Unknown { .. } => ErrorCategory::Unclassified,
		}
	}

	/// How long to wait before sending again, for rate-limit errors.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			ServerError::FastRetry { interval } => Some(Duration::from_secs(*interval)),
			_ => None,
		}
	}

	/// The unframed message body.
	pub fn detail(&self) -> String {
		match self {
			ServerError::MissingAuthMethod => {
				"Authentication failed\nNo authentication information provided".to_owned()
			}
			ServerError::InvalidAuthMethod { sent, available } => format!(
				"Authentication failed\nInvalid authentication method: '{}'\nAvailable authentication methods are: {}",
				sent,
				quoted_list(available)
			),
			ServerError::InvalidCredentials => "Authentication failed\nInvalid credentials".to_owned(),
			ServerError::MalformedAuthMessage => {
				"Authentication failed\nMalformed authentication message".to_owned()
			}
			ServerError::GenericAuth => {
				"An unexpected error occurred\nPlease try again later!\n\nShould this problem persist for several hours, contact the service operator.".to_owned()
			}
			ServerError::AuthAdminFailed => "Invalid user or insufficient permissions".to_owned(),
			ServerError::InsufficientQuota => {
				"Your quota is insufficient to perform this task.".to_owned()
			}
			ServerError::FastRetry { interval } => format!(
				"You sent too many QUBOs.\nYou are allowed to solve one QUBO every {} seconds",
				interval
			),
			ServerError::MissingTask => "No task specified".to_owned(),
			ServerError::InvalidTask { sent, available } if available.is_empty() => {
				format!("Invalid task: '{}'", sent)
			}
			ServerError::InvalidTask { sent, available } => format!(
				"Invalid task: '{}'\nAvailable tasks are: {}",
				sent,
				quoted_list(available)
			),
			ServerError::InvalidPlatform => {
				"The platform you specified in your request is not valid.".to_owned()
			}
			ServerError::MissingPlatform { available } => format!(
				"No platform was specified.\nValid platforms are: {}",
				available
					.iter()
					.map(|p| format!("'{}'", p))
					.collect::<Vec<_>>()
					.join(", ")
			),
			ServerError::InvalidSolver { solver, platform } => format!(
				"There is no solver named '{}' for the platform '{}'",
				solver, platform
			),
			ServerError::GenericBackend => {
				"An unexpected error occurred\nPlease try again later".to_owned()
			}
			ServerError::Solver { message } => format!(
				"An error occurred while solving the problem\n\n{}",
				message
			),
			ServerError::Fujitsu { message } => {
				format!("Error while accessing Fujitsu Solver:\n{}", message)
			}
			ServerError::Tabu { message } => format!("Error while accessing Tabu Solver:\n{}", message),
			ServerError::SolveFailed { message } => message.clone(),
			ServerError::Unknown { kind, message } => match message {
				Some(message) => format!("The server reported an error of type '{}'\n\n{}", kind, message),
				None => format!("The server reported an error of type '{}'", kind),
			},
		}
	}
}

impl fmt::Display for ServerError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&framed(&self.detail()))
	}
}

impl std::error::Error for ServerError {}

/// `['a', 'b']`
fn quoted_list(items: &[String]) -> String {
	let quoted: Vec<String> = items.iter().map(|s| format!("'{}'", s)).collect();
	format!("[{}]", quoted.join(", "))
}

struct Details<'a> {
	fields: &'a Map<String, Value>,
	kind: &'a str,
}

impl<'a> Details<'a> {
	fn get(&self, key: &str) -> Result<&'a Value> {
		self.fields.get(key).ok_or_else(|| {
			ApiError::Decode(format!(
				"'{}' error reply lacks error_details.{}",
				self.kind, key
			))
		})
	}

	fn text(&self, key: &str) -> Result<String> {
		self.get(key).map(display_value)
	}

	fn list(&self, key: &str) -> Result<Vec<String>> {
		match self.get(key)? {
			Value::Array(items) => Ok(items.iter().map(display_value).collect()),
			other => Err(ApiError::Decode(format!(
				"error_details.{} of '{}' is not a list: {}",
				key, self.kind, other
			))),
		}
	}

	fn seconds(&self, key: &str) -> Result<u64> {
		let value = self.get(key)?;
		value
			.as_u64()
			.or_else(|| value.as_f64().filter(|s| *s >= 0.0).map(|s| s.ceil() as u64))
			.ok_or_else(|| {
				ApiError::Decode(format!(
					"error_details.{} of '{}' is not a number of seconds: {}",
					key, self.kind, value
				))
			})
	}
}
