//! UQO is a client for UQO solving servers: describe a QUBO or Ising
//! problem, send it over a CURVE-encrypted channel and read back the samples.
//!
//! # Examples
//!
//! ## Solving a QUBO
//! ```no_run
//! # extern crate uqo;
//! # use uqo::{Config, Problem, Qubo, RemoteSolver};
//! let qubo: Qubo = vec![((0, 0), -2), ((1, 1), -2), ((0, 1), 5)].into_iter().collect();
//! let config = Config::from_json_file("config.json")?;
//! let mut solver = RemoteSolver::from_config(&config, Problem::new(qubo))
//! 	.with_platform("qbsolv");
//! let response = solver.solve_sync(10)?;
//! response.print_solutions_nice();
//! # Ok::<(), uqo::ApiError>(())
//! ```
//!
//! ## Talking to the server directly
//! ```no_run
//! # extern crate uqo;
//! # use uqo::Config;
//! let connection = Config::from_file(None, None)?.create_connection();
//! assert_eq!(connection.ping_sync()?, "pong");
//! for platform in connection.get_available_platforms_sync()? {
//! 	println!("{}", platform);
//! }
//! # Ok::<(), uqo::ApiError>(())
//! ```
extern crate tracing;
extern crate uqo_client;
extern crate uqo_model;

pub mod solve;
pub mod util;

pub use solve::RemoteSolver;
pub use uqo_client::{
	ApiError, Config, Connection, ErrorCategory, Response, Result, ServerError, Session,
	SolverKind, Topology, Transport,
};
pub use uqo_model::problem::{pair_keyed, Embedding, Ising, Model, Problem, ProblemType, Qubo};
pub use uqo_model::sampleset::SampleSet;
pub use uqo_model::ModelError;
pub use uqo_model::solution::Sample;

pub mod transport {
	pub use uqo_client::transport::*;
}
