extern crate async_trait;
extern crate ini;
extern crate serde;
extern crate serde_json;
extern crate shellexpand;
extern crate tokio;
extern crate uqo_model;
extern crate zmq;
#[macro_use]
extern crate serde_derive;

pub mod config;
mod decoder;
mod encoder;
pub mod error;
mod profile;
pub mod response;
pub mod session;
pub mod transport;

pub use config::Config;
pub use encoder::Topology;
pub use error::{ErrorCategory, ServerError};
pub use response::{Response, SolverKind};
pub use session::{Connection, Session};
pub use transport::{CurveTransport, ScriptedTransport, Transport};

pub type Result<T> = std::result::Result<T, ApiError>;

use ini::Error as IniError;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uqo_model::problem::ProblemType;
use uqo_model::{DecodeError, ModelError};

#[derive(Debug, Error)]
pub enum ApiError {
	/// Error reported by the server.
	#[error(transparent)]
	Server(#[from] ServerError),
	/// The solve operation does not match the problem's model.
	#[error("{}", not_a_qubo(.expected, .found))]
	NotAQubo {
		expected: ProblemType,
		found: ProblemType,
	},
	#[error("unknown solver '{0}' in reply")]
	UnknownSolver(String),
	#[error("cannot load config: {0}")]
	LoadConfig(String),
	#[error("config parse error: {0}")]
	IniParse(#[from] IniError),
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("cannot encode request: {0}")]
	Encode(String),
	#[error("transport error: {0}")]
	Transport(#[from] zmq::Error),
	#[error("transport closed: {0}")]
	Closed(String),
	#[error("no reply from {endpoint} within {timeout:?}")]
	Timeout { endpoint: String, timeout: Duration },
	#[error("bad key file {}: {reason}", .path.display())]
	Key { path: PathBuf, reason: String },
	#[error("malformed reply: {0}")]
	Decode(String),
	#[error("cannot decode answer: {0}")]
	SampleSet(#[from] DecodeError),
	#[error("invalid problem: {0}")]
	Problem(String),
	#[error("invalid model: {0}")]
	Model(#[from] ModelError),
	#[error("runtime error: {0}")]
	Runtime(String),
}

fn not_a_qubo(expected: &ProblemType, found: &ProblemType) -> String {
	error::framed(&format!(
		"The specified problem is not a {} problem (found: {})",
		expected, found
	))
}

/// Drive `future` to completion on a fresh current-thread runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()?;
	Ok(runtime.block_on(future))
}

#[test]
fn not_a_qubo_is_framed() {
	let e = ApiError::NotAQubo {
		expected: ProblemType::Qubo,
		found: ProblemType::Ising,
	};
	let text = e.to_string();
	assert!(text.starts_with("\n\n----------\n\n"));
	assert!(text.contains("not a qubo problem (found: ising)"));
}
