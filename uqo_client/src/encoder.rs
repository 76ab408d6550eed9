use crate::{ApiError, Result};
use serde::Serialize;
use serde_json::Value;
use uqo_model::problem::{Embedding, Params, Problem, ProblemType};

pub(crate) const DEFAULT_TASK: &str = "solve";
pub(crate) const DWAVE_PLATFORM: &str = "dwave";

#[derive(Serialize, Debug)]
pub(crate) struct Authentication<'a> {
	pub method: &'a str,
	pub credentials: &'a str,
}

#[derive(Serialize, Debug)]
pub(crate) struct Request<'a, D> {
	pub task: &'a str,
	pub authentication: Authentication<'a>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub task_details: Option<D>,
}

#[derive(Serialize, Debug)]
pub(crate) struct SolveDetails<'a> {
	#[serde(rename = "type")]
	pub problem_type: ProblemType,
	pub task: &'a str,
	pub platform: Option<&'a str>,
	pub value: Value,
	pub params: SolveParams<'a>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pref_platform: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub embedding: Option<&'a Embedding>,
}

#[derive(Serialize, Debug)]
pub(crate) struct SolveParams<'a> {
	pub uq_params: &'a Params,
	pub solver_params: &'a Params,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pref_solver: Option<&'a str>,
}

/// Qubit graph family an embedding is searched for.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
	#[serde(rename = "find_chimera_embedding")]
	Chimera,
	#[serde(rename = "find_pegasus_embedding")]
	Pegasus,
}

#[derive(Serialize, Debug)]
pub(crate) struct EmbeddingDetails<'a> {
	pub platform: &'a str,
	pub params: EmbeddingParams<'a>,
	#[serde(rename = "type")]
	pub topology: Topology,
	pub problem: Value,
}

#[derive(Serialize, Debug)]
pub(crate) struct EmbeddingParams<'a> {
	pub pref_solver: Option<&'a str>,
}

#[derive(Serialize, Debug)]
pub(crate) struct InfoDetails<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub platform: Option<&'a str>,
	#[serde(rename = "type")]
	pub kind: &'a str,
}

impl<'a> SolveDetails<'a> {
	/// Compose the `task_details` of a solve request.
	pub fn compose(
		problem: &'a Problem,
		task: &'a str,
		pref_solver: Option<&'a str>,
		pref_platform: Option<&'a str>,
	) -> Result<Self> {
		Ok(Self {
			problem_type: problem.problem_type(),
			task,
			platform: problem.platform.as_deref(),
			value: problem.to_json()?,
			params: SolveParams {
				uq_params: &problem.uq_params,
				solver_params: &problem.solver_params,
				pref_solver,
			},
			pref_platform,
			embedding: problem.embedding.as_ref(),
		})
	}
}

/// Serialize an outgoing message into the JSON value handed to the transport.
///
/// Integer map keys become decimal strings; any other non-string key fails.
pub(crate) fn to_wire<T: Serialize>(message: &T) -> Result<Value> {
	serde_json::to_value(message).map_err(|e| ApiError::Encode(e.to_string()))
}
