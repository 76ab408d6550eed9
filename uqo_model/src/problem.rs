use crate::bqm::{unordered, BinaryQuadraticModel, ModelError, Vartype};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::iter::FromIterator;

/// Free-form parameter mapping forwarded to the server as JSON.
pub type Params = Map<String, Value>;

/// Mapping from a logical variable to the chain of physical qubits representing it.
pub type Embedding = BTreeMap<usize, Vec<usize>>;

pub const NUM_REPEATS: &str = "num_repeats";

macro_rules! builder_pattern {
	($fname:ident, $name:ident) => {
		/// Builder function for property $name.
		pub fn $fname<'a, S: Into<Cow<'a, str>>>(mut self, $name: S) -> Self {
			self.$name = Some($name.into().into_owned());
			self
		}
	};
}

/// QUBO coefficients keyed by unordered variable pairs.
///
/// `(i, i)` holds the linear coefficient of `i`. `(i, j)` and `(j, i)` name the same
/// entry, the later insertion wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Qubo {
	terms: BTreeMap<(usize, usize), f64>,
}

impl Qubo {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, i: usize, j: usize, coefficient: f64) -> Option<f64> {
		self.terms.insert(unordered(i, j), coefficient)
	}

	pub fn get(&self, i: usize, j: usize) -> Option<f64> {
		self.terms.get(&unordered(i, j)).copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
		self.terms.iter().map(|(&k, &w)| (k, w))
	}

	pub fn len(&self) -> usize {
		self.terms.len()
	}

	pub fn is_empty(&self) -> bool {
		self.terms.is_empty()
	}

	/// Largest variable index mentioned by any coefficient.
	pub fn max_variable(&self) -> Option<usize> {
		self.terms.keys().map(|&(_, j)| j).max()
	}

	pub fn to_bqm(&self) -> BinaryQuadraticModel {
		let mut bqm = BinaryQuadraticModel::new(Vartype::Binary);
		for (&(i, j), &w) in self.terms.iter() {
			if i == j {
				bqm.set_linear(i, w);
			} else {
				bqm.quadratic.insert((i, j), w);
			}
		}
		bqm
	}
}

impl<W: Into<f64>> FromIterator<((usize, usize), W)> for Qubo {
	fn from_iter<I: IntoIterator<Item = ((usize, usize), W)>>(iter: I) -> Self {
		let mut qubo = Qubo::new();
		qubo.extend(iter);
		qubo
	}
}

impl<W: Into<f64>> Extend<((usize, usize), W)> for Qubo {
	fn extend<I: IntoIterator<Item = ((usize, usize), W)>>(&mut self, iter: I) {
		for ((i, j), w) in iter {
			self.insert(i, j, w.into());
		}
	}
}

/// Ising model: external fields per spin and couplings between spins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ising {
	linear: BTreeMap<usize, f64>,
	quadratic: BTreeMap<(usize, usize), f64>,
}

impl Ising {
	/// Fails if a coupling pairs a spin with itself.
	pub fn new<L, Q, A, B>(linear: L, quadratic: Q) -> Result<Self, ModelError>
	where
		L: IntoIterator<Item = (usize, A)>,
		Q: IntoIterator<Item = ((usize, usize), B)>,
		A: Into<f64>,
		B: Into<f64>,
	{
		let mut ising = Self::default();
		for (i, h) in linear {
			ising.set_field(i, h.into());
		}
		for ((i, j), coupling) in quadratic {
			ising.set_coupling(i, j, coupling.into())?;
		}
		Ok(ising)
	}

	pub fn set_field(&mut self, spin: usize, h: f64) -> Option<f64> {
		self.linear.insert(spin, h)
	}

	pub fn set_coupling(
		&mut self,
		i: usize,
		j: usize,
		coupling: f64,
	) -> Result<Option<f64>, ModelError> {
		if i == j {
			return Err(ModelError::SelfInteraction(i));
		}
		Ok(self.quadratic.insert(unordered(i, j), coupling))
	}

	pub fn linear(&self) -> &BTreeMap<usize, f64> {
		&self.linear
	}

	pub fn quadratic(&self) -> &BTreeMap<(usize, usize), f64> {
		&self.quadratic
	}

	pub fn to_bqm(&self) -> BinaryQuadraticModel {
		BinaryQuadraticModel {
			linear: self.linear.clone(),
			quadratic: self.quadratic.clone(),
			offset: 0.0,
			vartype: Vartype::Spin,
		}
	}
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
	Qubo,
	Ising,
}

impl std::fmt::Display for ProblemType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ProblemType::Qubo => f.write_str("qubo"),
			ProblemType::Ising => f.write_str("ising"),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum Model {
	Qubo(Qubo),
	Ising(Ising),
}

impl Model {
	pub fn problem_type(&self) -> ProblemType {
		match self {
			Model::Qubo(_) => ProblemType::Qubo,
			Model::Ising(_) => ProblemType::Ising,
		}
	}

	pub fn to_bqm(&self) -> BinaryQuadraticModel {
		match self {
			Model::Qubo(qubo) => qubo.to_bqm(),
			Model::Ising(ising) => ising.to_bqm(),
		}
	}
}

impl From<Qubo> for Model {
	fn from(qubo: Qubo) -> Self {
		Model::Qubo(qubo)
	}
}

impl From<Ising> for Model {
	fn from(ising: Ising) -> Self {
		Model::Ising(ising)
	}
}

/// A model plus everything the server needs to solve it.
///
/// ```
/// # use uqo_model::problem::{Problem, Qubo};
/// let qubo: Qubo = vec![((0, 0), -2), ((1, 1), -2), ((0, 1), 5)].into_iter().collect();
/// let problem = Problem::new(qubo)
/// 	.with_platform("dwave")
/// 	.with_param("num_reads", 100);
/// assert_eq!(problem.solver_params["num_reads"], 100);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Problem {
	model: Model,
	/// Forwarded verbatim to the solver.
	pub solver_params: Params,
	/// Interpreted by the UQO server itself (e.g. `num_repeats`).
	pub uq_params: Params,
	pub solver: Option<String>,
	pub platform: Option<String>,
	pub embedding: Option<Embedding>,
}

impl Problem {
	pub fn new<M: Into<Model>>(model: M) -> Self {
		Self {
			model: model.into(),
			solver_params: Params::new(),
			uq_params: Params::new(),
			solver: None,
			platform: None,
			embedding: None,
		}
	}

	builder_pattern!(with_solver, solver);
	builder_pattern!(with_platform, platform);

	/// Merge `params` into the solver parameters; existing keys are overwritten.
	pub fn with_params<I, K, V>(mut self, params: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		merge(&mut self.solver_params, params);
		self
	}

	pub fn with_param<K: Into<String>, V: Into<Value>>(self, key: K, value: V) -> Self {
		self.with_params(Some((key, value)))
	}

	/// Merge `params` into the UQO parameters; existing keys are overwritten.
	pub fn with_uq_params<I, K, V>(mut self, params: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		merge(&mut self.uq_params, params);
		self
	}

	pub fn with_uq_param<K: Into<String>, V: Into<Value>>(self, key: K, value: V) -> Self {
		self.with_uq_params(Some((key, value)))
	}

	pub fn with_embedding(mut self, embedding: Embedding) -> Self {
		self.embedding = Some(embedding);
		self
	}

	pub fn set_num_repeats(&mut self, times: usize) {
		self.uq_params.insert(NUM_REPEATS.to_owned(), Value::from(times));
	}

	pub fn num_repeats(&self) -> Option<u64> {
		self.uq_params.get(NUM_REPEATS).and_then(Value::as_u64)
	}

	pub fn model(&self) -> &Model {
		&self.model
	}

	pub fn problem_type(&self) -> ProblemType {
		self.model.problem_type()
	}

	pub fn to_bqm(&self) -> BinaryQuadraticModel {
		self.model.to_bqm()
	}

	/// The model as a serialized BQM document.
	pub fn to_json(&self) -> Result<Value, ModelError> {
		self.to_bqm().to_serializable()
	}
}

fn merge<I, K, V>(target: &mut Params, entries: I)
where
	I: IntoIterator<Item = (K, V)>,
	K: Into<String>,
	V: Into<Value>,
{
	for (key, value) in entries {
		target.insert(key.into(), value.into());
	}
}

/// Build a parameter object keyed by variable pairs, rendered as `"(a, b)"`.
///
/// JSON objects only have string keys, so solver parameters that are naturally
/// indexed by pairs go through this helper.
pub fn pair_keyed<I, V>(entries: I) -> Value
where
	I: IntoIterator<Item = ((usize, usize), V)>,
	V: Into<Value>,
{
	Value::Object(
		entries
			.into_iter()
			.map(|((a, b), v)| (format!("({}, {})", a, b), v.into()))
			.collect(),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn small_qubo_lowers_to_binary_bqm() {
		let qubo: Qubo = vec![((0, 0), -2), ((1, 1), -2), ((0, 1), 5)]
			.into_iter()
			.collect();
		let bqm = qubo.to_bqm();
		assert_eq!(bqm.vartype, Vartype::Binary);
		assert_eq!(bqm.offset, 0.0);
		assert_eq!(bqm.linear, vec![(0, -2.0), (1, -2.0)].into_iter().collect());
		assert_eq!(bqm.quadratic, vec![((0, 1), 5.0)].into_iter().collect());
	}

	#[test]
	fn mirrored_pair_overwrites() {
		let mut qubo = Qubo::new();
		qubo.insert(0, 1, 5.0);
		assert_eq!(qubo.insert(1, 0, 3.0), Some(5.0));
		assert_eq!(qubo.len(), 1);
		assert_eq!(qubo.get(0, 1), Some(3.0));
		assert_eq!(qubo.to_bqm().quadratic[&(0, 1)], 3.0);
	}

	#[test]
	fn ising_lowers_to_spin_bqm() {
		let ising = Ising::new(vec![(0, 1.0), (1, -0.5)], vec![((1, 0), -1.0)]).unwrap();
		let bqm = Problem::new(ising).to_bqm();
		assert_eq!(bqm.vartype, Vartype::Spin);
		assert_eq!(bqm.quadratic[&(0, 1)], -1.0);
		assert_eq!(bqm.linear[&1], -0.5);
	}

	#[test]
	fn params_merge_and_overwrite() {
		let problem = Problem::new(Qubo::new())
			.with_params(vec![("a", 1), ("b", 2)])
			.with_params(vec![("b", 3), ("c", 4)])
			.with_uq_param("num_repeats", 7);
		assert_eq!(
			Value::Object(problem.solver_params.clone()),
			json!({"a": 1, "b": 3, "c": 4})
		);
		assert_eq!(problem.num_repeats(), Some(7));
	}

	#[test]
	fn num_repeats_overwrites_uq_param() {
		let mut problem = Problem::new(Qubo::new()).with_uq_param("num_repeats", 2);
		problem.set_num_repeats(50);
		assert_eq!(problem.uq_params["num_repeats"], json!(50));
	}

	#[test]
	fn pair_keyed_renders_tuples() {
		let value = pair_keyed(vec![((0, 1), 5), ((1, 2), 3)]);
		assert_eq!(value, json!({"(0, 1)": 5, "(1, 2)": 3}));
	}

	#[test]
	fn problem_json_is_a_bqm_document() {
		let qubo: Qubo = vec![((0, 0), -2), ((1, 1), -2), ((0, 1), 5)]
			.into_iter()
			.collect();
		let doc = Problem::new(qubo).to_json().unwrap();
		assert_eq!(doc["type"], json!("BinaryQuadraticModel"));
		assert_eq!(doc["variable_labels"], json!([0, 1]));
		assert_eq!(doc["linear_biases"], json!([-2.0, -2.0]));
		assert_eq!(doc["quadratic_biases"], json!([5.0]));
	}

	#[test]
	fn ising_self_coupling_is_an_error() {
		assert_eq!(
			Ising::new(vec![(0, 1.0)], vec![((0, 0), 2.0)]),
			Err(ModelError::SelfInteraction(0))
		);
		let mut ising = Ising::default();
		assert_eq!(ising.set_coupling(2, 2, 1.0), Err(ModelError::SelfInteraction(2)));
		assert!(ising.quadratic().is_empty());
	}

	#[test]
	fn non_finite_qubo_fails_to_serialize() {
		let qubo: Qubo = vec![((0, 0), f64::NAN), ((0, 1), f64::INFINITY)]
			.into_iter()
			.collect();
		assert!(matches!(
			Problem::new(qubo).to_json(),
			Err(ModelError::NonFiniteBias { term: (0, 0), .. })
		));
	}

	/// Rebuild the upper-triangular QUBO from a serialized BQM document.
	fn qubo_from_document(doc: &Value) -> BTreeMap<(usize, usize), f64> {
		let labels: Vec<usize> = serde_json::from_value(doc["variable_labels"].clone()).unwrap();
		let linear: Vec<f64> = serde_json::from_value(doc["linear_biases"].clone()).unwrap();
		let heads: Vec<usize> = serde_json::from_value(doc["quadratic_head"].clone()).unwrap();
		let tails: Vec<usize> = serde_json::from_value(doc["quadratic_tail"].clone()).unwrap();
		let biases: Vec<f64> = serde_json::from_value(doc["quadratic_biases"].clone()).unwrap();
		assert_eq!(labels.len(), linear.len());
		assert_eq!(heads.len(), biases.len());
		assert_eq!(tails.len(), biases.len());
		let mut qubo: BTreeMap<(usize, usize), f64> = labels
			.iter()
			.zip(linear.iter())
			.map(|(&v, &bias)| ((v, v), bias))
			.collect();
		for ((&h, &t), &bias) in heads.iter().zip(tails.iter()).zip(biases.iter()) {
			qubo.insert(unordered(labels[h], labels[t]), bias);
		}
		qubo
	}

	fn ordered_pair() -> impl Strategy<Value = (usize, usize)> {
		(0usize..20, 0usize..20).prop_map(|(a, b)| unordered(a, b))
	}

	proptest! {
		#[test]
		fn qubo_terms_survive_lowering(
			entries in proptest::collection::btree_map(ordered_pair(), -100i32..100, 0..40)
		) {
			let qubo: Qubo = entries.iter().map(|(&k, &w)| (k, w)).collect();
			let bqm = qubo.to_bqm();
			let diagonal = entries.keys().filter(|(i, j)| i == j).count();
			prop_assert_eq!(bqm.linear.len(), diagonal);
			prop_assert_eq!(bqm.quadratic.len(), entries.len() - diagonal);
			prop_assert_eq!(bqm.offset, 0.0);
			prop_assert_eq!(bqm.vartype, Vartype::Binary);
			let expected: BTreeMap<(usize, usize), f64> =
				entries.iter().map(|(&k, &w)| (k, f64::from(w))).collect();
			prop_assert_eq!(bqm.to_qubo(), expected.clone());

			// variables that only appear in interactions get an explicit zero bias
			let doc = Problem::new(qubo).to_json().unwrap();
			let mut from_wire = qubo_from_document(&doc);
			from_wire.retain(|&(i, j), &mut bias| i != j || bias != 0.0 || expected.contains_key(&(i, j)));
			prop_assert_eq!(from_wire, expected);
			prop_assert_eq!(&doc["variable_type"], &json!("BINARY"));
			prop_assert_eq!(&doc["offset"], &json!(0.0));
		}

		#[test]
		fn later_params_win(
			first in proptest::collection::btree_map("[a-d]", 0i64..10, 0..4),
			second in proptest::collection::btree_map("[a-d]", 0i64..10, 0..4)
		) {
			let problem = Problem::new(Qubo::new())
				.with_params(first.clone())
				.with_params(second.clone());
			let mut expected = first;
			expected.extend(second);
			prop_assert_eq!(problem.solver_params.len(), expected.len());
			for (key, value) in expected.iter() {
				prop_assert_eq!(&problem.solver_params[key.as_str()], &json!(value));
			}
		}
	}
}
