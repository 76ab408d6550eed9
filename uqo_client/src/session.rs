use crate::decoder::Reply;
use crate::encoder::{
	self, Authentication, EmbeddingDetails, EmbeddingParams, InfoDetails, Request, SolveDetails,
	Topology, DEFAULT_TASK, DWAVE_PLATFORM,
};
use crate::response::{Response, SolverKind};
use crate::transport::{default_server_key_file, CurveTransport, Transport};
use crate::{ApiError, Result};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uqo_model::problem::{Embedding, Problem, ProblemType};
use uqo_model::solution::Sample;

const AVAILABLE_TASKS: &[&str] = &[DEFAULT_TASK];

macro_rules! builder_pattern {
	($name: ident) => {
		/// Builder function for property $name.
		pub fn $name<'a, S: Into<Cow<'a, str>>>(mut self, $name: S) -> Self {
			self.$name = Some($name.into().into_owned());
			self
		}
	};
}

/// Endpoint, credentials and the transport every request goes through.
pub struct Session {
	pub endpoint: String,
	auth_method: String,
	credentials: String,
	transport: Arc<dyn Transport>,
}

impl Session {
	/// A session talking CURVE-encrypted ZeroMQ to `endpoint` (`host:port`).
	///
	/// The server's public key is read from `uqo_public.key` next to
	/// `private_key_file`.
	pub fn new<P: Into<PathBuf>>(
		endpoint: &str,
		auth_method: &str,
		credentials: &str,
		private_key_file: P,
	) -> Self {
		let private_key_file = private_key_file.into();
		let server_key_file = default_server_key_file(&private_key_file);
		let transport = CurveTransport::new(endpoint, private_key_file, server_key_file);
		Self::with_transport(endpoint, auth_method, credentials, Arc::new(transport))
	}

	pub fn with_transport<T: Transport + 'static>(
		endpoint: &str,
		auth_method: &str,
		credentials: &str,
		transport: Arc<T>,
	) -> Self {
		Self {
			endpoint: endpoint.to_owned(),
			auth_method: auth_method.to_owned(),
			credentials: credentials.to_owned(),
			transport,
		}
	}

	pub fn auth_method(&self) -> &str {
		&self.auth_method
	}

	fn authentication(&self) -> Authentication<'_> {
		Authentication {
			method: &self.auth_method,
			credentials: &self.credentials,
		}
	}

	/// Send one request and classify its reply; error replies become
	/// [`ApiError::Server`].
	#[instrument(skip(self, details), fields(endpoint = %self.endpoint))]
	pub(crate) async fn send_message<D: Serialize>(
		&self,
		task: &str,
		details: Option<D>,
	) -> Result<Reply> {
		let message = encoder::to_wire(&Request {
			task,
			authentication: self.authentication(),
			task_details: details,
		})?;
		debug!("sending request");
		let raw = self.transport.request(message).await?;
		let reply: Reply = serde_json::from_value(raw)?;
		debug!(status = ?reply.status, kind = ?reply.kind, "received reply");
		reply.check_errors()?;
		Ok(reply)
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("endpoint", &self.endpoint)
			.field("auth_method", &self.auth_method)
			.field("credentials", &"<redacted>")
			.finish()
	}
}

/// A shared [`Session`] plus per-handle request preferences.
///
/// Clones share the session and its transport; preferences are per clone.
#[derive(Clone, Debug)]
pub struct Connection {
	inner: Arc<Session>,
	pub preferred_solver: Option<String>,
	pub preferred_platform: Option<String>,
	pub task: Option<String>,
}

impl Connection {
	pub fn new<P: Into<PathBuf>>(
		endpoint: &str,
		auth_method: &str,
		credentials: &str,
		private_key_file: P,
	) -> Self {
		Self::from_session(Session::new(
			endpoint,
			auth_method,
			credentials,
			private_key_file,
		))
	}

	pub fn from_session(session: Session) -> Self {
		Self {
			inner: Arc::new(session),
			preferred_solver: None,
			preferred_platform: None,
			task: None,
		}
	}

	builder_pattern!(preferred_solver);
	builder_pattern!(preferred_platform);
	builder_pattern!(task);

	pub fn set_preferred_solver(&mut self, solver: Option<String>) {
		self.preferred_solver = solver;
	}

	pub fn set_preferred_platform(&mut self, platform: Option<String>) {
		self.preferred_platform = platform;
	}

	pub fn set_task(&mut self, task: Option<String>) {
		self.task = task;
	}

	pub fn session(&self) -> &Session {
		&self.inner
	}

	/// The task solve requests are sent as.
	pub fn effective_task(&self) -> &str {
		self.task.as_deref().unwrap_or(DEFAULT_TASK)
	}

	pub fn available_tasks(&self) -> &'static [&'static str] {
		AVAILABLE_TASKS
	}

	pub(crate) fn task_details<'a>(&'a self, problem: &'a Problem) -> Result<SolveDetails<'a>> {
		SolveDetails::compose(
			problem,
			self.effective_task(),
			self.preferred_solver.as_deref(),
			self.preferred_platform.as_deref(),
		)
	}

	/// Liveness check; a healthy server answers `"pong"`.
	#[instrument(skip(self))]
	pub async fn ping(&self) -> Result<String> {
		let reply = self.inner.send_message::<()>("ping", None).await?;
		reply
			.kind
			.ok_or_else(|| ApiError::Decode("ping reply lacks 'type'".to_owned()))
	}

	pub async fn find_chimera_embedding(&self, problem: &Problem) -> Result<Embedding> {
		self.find_embedding(problem, Topology::Chimera).await
	}

	pub async fn find_pegasus_embedding(&self, problem: &Problem) -> Result<Embedding> {
		self.find_embedding(problem, Topology::Pegasus).await
	}

	/// Ask the server to embed `problem` into the qubit graph of `topology`.
	#[instrument(skip(self, problem))]
	pub async fn find_embedding(&self, problem: &Problem, topology: Topology) -> Result<Embedding> {
		let details = EmbeddingDetails {
			platform: DWAVE_PLATFORM,
			params: EmbeddingParams {
				pref_solver: problem.solver.as_deref(),
			},
			topology,
			problem: problem.to_json()?,
		};
		let reply = self.inner.send_message("util", Some(details)).await?;
		let embedding = reply.embedding()?;
		debug!(variables = embedding.len(), "received embedding");
		Ok(embedding)
	}

	/// Solve a QUBO problem; any other model fails before a request is sent.
	pub async fn solve_qubo(&self, problem: &Problem) -> Result<Response> {
		self.solve_as(problem, ProblemType::Qubo).await
	}

	/// Solve an Ising problem; any other model fails before a request is sent.
	pub async fn solve_ising(&self, problem: &Problem) -> Result<Response> {
		self.solve_as(problem, ProblemType::Ising).await
	}

	/// Solve `problem` with whichever model it holds.
	pub async fn solve(&self, problem: &Problem) -> Result<Response> {
		self.solve_as(problem, problem.problem_type()).await
	}

	#[instrument(skip(self, problem), fields(task = %self.effective_task()))]
	async fn solve_as(&self, problem: &Problem, expected: ProblemType) -> Result<Response> {
		let found = problem.problem_type();
		if found != expected {
			return Err(ApiError::NotAQubo { expected, found });
		}
		if problem.platform.is_none() && self.preferred_platform.is_none() {
			warn!("no platform selected, the server will reject the request");
		}
		let reply = self
			.inner
			.send_message(self.effective_task(), Some(self.task_details(problem)?))
			.await?;
		reply.check_success()?;
		let name = reply
			.solver
			.as_deref()
			.ok_or_else(|| ApiError::Decode("solve reply lacks 'solver'".to_owned()))?;
		let solver =
			SolverKind::from_wire(name).ok_or_else(|| ApiError::UnknownSolver(name.to_owned()))?;
		let response = Response::from_answer(solver, reply.answer()?)?;
		debug!(%solver, samples = response.len(), "solved");
		Ok(response)
	}

	/// Solve `problem` and return the first sample of the answer.
	#[instrument(skip(self, problem))]
	pub async fn find_initial_state(&self, problem: &Problem) -> Result<Sample> {
		let response = self.solve(problem).await?;
		let state = response
			.solutions
			.first()
			.cloned()
			.ok_or_else(|| ApiError::Decode("answer contains no samples".to_owned()))?;
		if let (Some(&first), Some(lowest)) = (
			response.energies.first(),
			response.sampleset.lowest_energy(),
		) {
			if first > lowest {
				warn!(first, lowest, "first sample is not of minimal energy");
			}
		}
		info!(%state, "calculated initial state");
		println!("Calculated initial state: {}", state);
		Ok(state)
	}

	#[instrument(skip(self))]
	pub async fn get_available_dwave_solvers(&self) -> Result<Vec<String>> {
		let details = InfoDetails {
			platform: Some(DWAVE_PLATFORM),
			kind: "available_solvers",
		};
		self.inner
			.send_message("dwave_info", Some(details))
			.await?
			.solver_names()
	}

	#[instrument(skip(self))]
	pub async fn get_available_platforms(&self) -> Result<Vec<String>> {
		let details = InfoDetails {
			platform: None,
			kind: "available_platforms",
		};
		self.inner
			.send_message("uq_info", Some(details))
			.await?
			.platform_names()
	}

	/// Print and return the remaining quota.
	#[instrument(skip(self))]
	pub async fn show_quota(&self) -> Result<f64> {
		let quota = self
			.inner
			.send_message::<()>("show_quota", None)
			.await?
			.quota()?;
		info!(quota, "remaining quota");
		println!("{}", quota);
		Ok(quota)
	}

	pub fn ping_sync(&self) -> Result<String> {
		crate::block_on(self.ping())?
	}

	pub fn get_available_platforms_sync(&self) -> Result<Vec<String>> {
		crate::block_on(self.get_available_platforms())?
	}

	pub fn get_available_dwave_solvers_sync(&self) -> Result<Vec<String>> {
		crate::block_on(self.get_available_dwave_solvers())?
	}

	pub fn show_quota_sync(&self) -> Result<f64> {
		crate::block_on(self.show_quota())?
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ServerError;
	use crate::transport::ScriptedTransport;
	use serde_json::{json, Map, Value};
	use uqo_model::bqm::{ModelError, Vartype};
	use uqo_model::problem::{Ising, Qubo};
	use uqo_model::sampleset::SampleSet;

	fn connection(replies: Vec<Value>) -> (Connection, Arc<ScriptedTransport>) {
		let transport = Arc::new(ScriptedTransport::new(replies));
		let session = Session::with_transport("localhost:5555", "token", "s3cret", transport.clone());
		(Connection::from_session(session), transport)
	}

	fn qubo_problem() -> Problem {
		let qubo: Qubo = vec![((0, 0), -2), ((1, 1), -2), ((0, 1), 5)]
			.into_iter()
			.collect();
		Problem::new(qubo)
	}

	fn answer(energies: Vec<f64>, info: Map<String, Value>) -> Value {
		let samples = energies.iter().map(|_| vec![1, 0]).collect();
		SampleSet::new(Vartype::Binary, vec![0, 1], samples, energies, None, info)
			.unwrap()
			.to_serializable()
	}

	fn solved(solver: &str, answer: Value) -> Value {
		json!({"status": "success", "solver": solver, "solver_details": {"answer": answer}})
	}

	#[tokio::test]
	async fn ping_returns_type() {
		let (conn, transport) = connection(vec![json!({"status": "success", "type": "pong"})]);
		assert_eq!(conn.ping().await.unwrap(), "pong");
		assert_eq!(
			transport.requests(),
			vec![json!({"task": "ping", "authentication": {"method": "token", "credentials": "s3cret"}})]
		);
	}

	#[tokio::test]
	async fn wrong_model_fails_before_sending() {
		let (conn, transport) = connection(vec![]);
		let ising = Problem::new(Ising::new(vec![(0, 1.0)], Vec::<((usize, usize), f64)>::new()).unwrap());
		match conn.solve_qubo(&ising).await {
			Err(ApiError::NotAQubo { expected, found }) => {
				assert_eq!(expected, ProblemType::Qubo);
				assert_eq!(found, ProblemType::Ising);
			}
			other => panic!("unexpected {:?}", other),
		}
		assert!(matches!(
			conn.solve_ising(&qubo_problem()).await,
			Err(ApiError::NotAQubo { .. })
		));
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn non_finite_model_fails_before_sending() {
		let (conn, transport) = connection(vec![]);
		let qubo: Qubo = vec![((0, 0), f64::NAN), ((0, 1), 1.0)].into_iter().collect();
		let problem = Problem::new(qubo).with_platform("qbsolv");
		assert!(matches!(
			conn.solve_qubo(&problem).await,
			Err(ApiError::Model(ModelError::NonFiniteBias { term: (0, 0), .. }))
		));
		assert!(matches!(
			conn.find_chimera_embedding(&problem).await,
			Err(ApiError::Model(_))
		));
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn preferences_set_after_problem_reach_envelope() {
		let (mut conn, transport) =
			connection(vec![solved("QBsolvSolver", answer(vec![-2.0], Map::new()))]);
		let problem = qubo_problem()
			.with_platform("qbsolv")
			.with_param("num_repeats_inner", 3)
			.with_uq_param("num_repeats", 2);
		conn.set_preferred_platform(Some("tabu".to_owned()));
		conn.set_preferred_solver(Some("Advantage_system4.1".to_owned()));
		let response = conn.solve_qubo(&problem).await.unwrap();
		assert_eq!(response.solver, SolverKind::QbSolv);

		let request = &transport.requests()[0];
		assert_eq!(request["task"], "solve");
		let details = &request["task_details"];
		assert_eq!(details["type"], "qubo");
		assert_eq!(details["task"], "solve");
		assert_eq!(details["platform"], "qbsolv");
		assert_eq!(details["pref_platform"], "tabu");
		assert_eq!(details["params"]["pref_solver"], "Advantage_system4.1");
		assert_eq!(details["params"]["uq_params"], json!({"num_repeats": 2}));
		assert_eq!(details["params"]["solver_params"], json!({"num_repeats_inner": 3}));
		assert_eq!(details["value"], problem.to_json().unwrap());
		assert!(details.get("embedding").is_none());
	}

	#[tokio::test]
	async fn task_override_is_used_twice() {
		let (conn, transport) = connection(vec![solved("TabuSolver", answer(vec![0.0], Map::new()))]);
		let conn = conn.task("solve_async");
		conn.solve_qubo(&qubo_problem()).await.unwrap();
		let request = &transport.requests()[0];
		assert_eq!(request["task"], "solve_async");
		assert_eq!(request["task_details"]["task"], "solve_async");
	}

	#[tokio::test]
	async fn unknown_solver_is_an_error() {
		let (conn, _) = connection(vec![solved("GeneticSolver", answer(vec![0.0], Map::new()))]);
		match conn.solve_qubo(&qubo_problem()).await {
			Err(ApiError::UnknownSolver(name)) => assert_eq!(name, "GeneticSolver"),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[tokio::test]
	async fn server_errors_are_classified() {
		let (conn, _) = connection(vec![json!({
			"status": "error",
			"type": "fast_retry_exception",
			"error_details": {"interval": 10},
		})]);
		match conn.solve_qubo(&qubo_problem()).await {
			Err(ApiError::Server(e)) => {
				assert_eq!(e, ServerError::FastRetry { interval: 10 });
				assert_eq!(e.retry_after(), Some(std::time::Duration::from_secs(10)));
			}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[tokio::test]
	async fn non_success_solve_fails() {
		let (conn, _) = connection(vec![json!({"status": "failed", "message": "no answer"})]);
		assert!(matches!(
			conn.solve_qubo(&qubo_problem()).await,
			Err(ApiError::Server(ServerError::SolveFailed { .. }))
		));
	}

	#[tokio::test]
	async fn dwave_answer_keeps_timing() {
		let mut info = Map::new();
		info.insert("timing".to_owned(), json!({"qpu_access_time": 12000}));
		let (conn, _) = connection(vec![solved("DWaveSolver", answer(vec![-2.0, -2.0], info))]);
		let response = conn.solve_qubo(&qubo_problem()).await.unwrap();
		assert_eq!(response.solver, SolverKind::DWave);
		assert_eq!(response.len(), 2);
		assert_eq!(response.timing.unwrap()["qpu_access_time"], 12000);
	}

	#[tokio::test]
	async fn embedding_request_and_keys() {
		let (conn, transport) = connection(vec![json!({
			"status": "success",
			"solver_details": {"embedding": {"0": [0, 4], "1": [1]}},
		})]);
		let problem = qubo_problem().with_solver("Advantage_system4.1");
		let embedding = conn.find_pegasus_embedding(&problem).await.unwrap();
		assert_eq!(embedding[&0], vec![0, 4]);
		assert_eq!(embedding[&1], vec![1]);
		let request = &transport.requests()[0];
		assert_eq!(request["task"], "util");
		assert_eq!(
			request["task_details"],
			json!({
				"platform": "dwave",
				"params": {"pref_solver": "Advantage_system4.1"},
				"type": "find_pegasus_embedding",
				"problem": problem.to_json().unwrap(),
			})
		);
	}

	#[tokio::test]
	async fn info_requests() {
		let (conn, transport) = connection(vec![
			json!({"status": "success", "solver_details": {"details": ["Advantage_system4.1", "DW_2000Q_6"]}}),
			json!({"status": "success", "details": ["dwave", "qbsolv", "fujitsu"]}),
			json!({"status": "success", "quota": 1500}),
		]);
		assert_eq!(
			conn.get_available_dwave_solvers().await.unwrap(),
			vec!["Advantage_system4.1", "DW_2000Q_6"]
		);
		assert_eq!(
			conn.get_available_platforms().await.unwrap(),
			vec!["dwave", "qbsolv", "fujitsu"]
		);
		assert_eq!(conn.show_quota().await.unwrap(), 1500.0);
		let requests = transport.requests();
		assert_eq!(
			requests[0]["task_details"],
			json!({"platform": "dwave", "type": "available_solvers"})
		);
		assert_eq!(requests[1]["task"], "uq_info");
		assert_eq!(requests[1]["task_details"], json!({"type": "available_platforms"}));
		assert_eq!(requests[2]["task"], "show_quota");
		assert!(requests[2].get("task_details").is_none());
	}

	#[tokio::test]
	async fn initial_state_is_first_sample() {
		let (conn, _) = connection(vec![solved("QBsolvSolver", answer(vec![-2.0, 0.0], Map::new()))]);
		let state = conn.find_initial_state(&qubo_problem()).await.unwrap();
		assert_eq!(state.to_string(), "{0: 1, 1: 0}");
	}

	#[test]
	fn clones_keep_own_preferences() {
		let (conn, _) = connection(vec![]);
		let tuned = conn.clone().preferred_platform("dwave");
		assert_eq!(tuned.preferred_platform.as_deref(), Some("dwave"));
		assert_eq!(conn.preferred_platform, None);
		assert_eq!(conn.available_tasks(), &["solve"]);
		assert!(!format!("{:?}", conn).contains("s3cret"));
	}

	#[test]
	fn sync_wrappers_drive_the_future() {
		let (conn, _) = connection(vec![json!({"status": "success", "type": "pong"})]);
		assert_eq!(conn.ping_sync().unwrap(), "pong");
	}
}
