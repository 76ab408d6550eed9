//! Problem and answer models of the UQO client.
//!
//! A [`Problem`](problem::Problem) holds either a QUBO or an Ising model together
//! with the parameters a UQO server needs to solve it. Both models are lowered to a
//! [`BinaryQuadraticModel`](bqm::BinaryQuadraticModel) before they are sent, and the
//! answers come back as a [`SampleSet`](sampleset::SampleSet).
extern crate base64;
extern crate serde;
extern crate serde_json;
#[macro_use]
extern crate serde_derive;

pub mod bqm;
pub mod problem;
pub mod sampleset;
pub mod solution;

pub mod prelude {
	pub use crate::bqm::{BinaryQuadraticModel, ModelError, Vartype};
	pub use crate::problem::{Embedding, Ising, Model, Params, Problem, ProblemType, Qubo};
	pub use crate::sampleset::SampleSet;
	pub use crate::solution::Sample;
}

pub use bqm::ModelError;
pub use sampleset::DecodeError;
