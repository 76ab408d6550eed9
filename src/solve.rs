use crate::{ApiError, Config, Connection, Embedding, Problem, ProblemType, Response, Result, Sample};
use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;
use uqo_client::block_on;

/// A problem bound to the connection that solves it.
#[derive(Clone, Debug)]
pub struct RemoteSolver {
	pub problem: Problem,
	pub connection: Connection,
}

impl RemoteSolver {
	pub fn new(problem: Problem, connection: Connection) -> Self {
		Self {
			problem,
			connection,
		}
	}

	pub fn from_config(config: &Config, problem: Problem) -> Self {
		Self::new(problem, config.create_connection())
	}

	pub fn with_solver<'a, S: Into<Cow<'a, str>>>(mut self, solver: S) -> Self {
		self.problem = self.problem.with_solver(solver);
		self
	}

	pub fn with_platform<'a, S: Into<Cow<'a, str>>>(mut self, platform: S) -> Self {
		self.problem = self.problem.with_platform(platform);
		self
	}

	pub fn with_params<I, K, V>(mut self, params: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		self.problem = self.problem.with_params(params);
		self
	}

	pub fn with_uq_params<I, K, V>(mut self, params: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		self.problem = self.problem.with_uq_params(params);
		self
	}

	pub fn with_embedding(mut self, embedding: Embedding) -> Self {
		self.problem = self.problem.with_embedding(embedding);
		self
	}

	pub fn embedding(&self) -> Option<&Embedding> {
		self.problem.embedding.as_ref()
	}

	/// Ask the server for a Chimera embedding and keep it on the problem.
	pub async fn find_chimera_embedding(&mut self) -> Result<&Embedding> {
		let embedding = self.connection.find_chimera_embedding(&self.problem).await?;
		Ok(&*self.problem.embedding.insert(embedding))
	}

	/// Ask the server for a Pegasus embedding and keep it on the problem.
	pub async fn find_pegasus_embedding(&mut self) -> Result<&Embedding> {
		let embedding = self.connection.find_pegasus_embedding(&self.problem).await?;
		Ok(&*self.problem.embedding.insert(embedding))
	}

	/// Solve `times` times and return the first sample.
	pub async fn find_initial_state(&mut self, times: usize) -> Result<Sample> {
		self.set_num_repeats(times)?;
		self.connection.find_initial_state(&self.problem).await
	}

	/// Solve `times` times.
	///
	/// The problem's solver and platform, when set, become the connection's
	/// preferred ones.
	pub async fn solve(&mut self, times: usize) -> Result<Response> {
		self.set_num_repeats(times)?;
		if let Some(solver) = self.problem.solver.as_ref() {
			self.connection.set_preferred_solver(Some(solver.clone()));
		}
		if let Some(platform) = self.problem.platform.as_ref() {
			self.connection.set_preferred_platform(Some(platform.clone()));
		}
		debug!(times, problem_type = %self.problem.problem_type(), "solving");
		match self.problem.problem_type() {
			ProblemType::Qubo => self.connection.solve_qubo(&self.problem).await,
			ProblemType::Ising => self.connection.solve_ising(&self.problem).await,
		}
	}

	pub fn find_chimera_embedding_sync(&mut self) -> Result<&Embedding> {
		block_on(self.find_chimera_embedding())?
	}

	pub fn find_pegasus_embedding_sync(&mut self) -> Result<&Embedding> {
		block_on(self.find_pegasus_embedding())?
	}

	pub fn find_initial_state_sync(&mut self, times: usize) -> Result<Sample> {
		block_on(self.find_initial_state(times))?
	}

	pub fn solve_sync(&mut self, times: usize) -> Result<Response> {
		block_on(self.solve(times))?
	}

	fn set_num_repeats(&mut self, times: usize) -> Result<()> {
		if times == 0 {
			return Err(ApiError::Problem(
				"the number of repeats must be positive".to_owned(),
			));
		}
		self.problem.set_num_repeats(times);
		Ok(())
	}
}
