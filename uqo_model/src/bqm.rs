use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

const BQM_SCHEMA_VERSION: &str = "3.0.0";

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
	#[error("variable {0} cannot interact with itself")]
	SelfInteraction(usize),
	#[error("bias of {term:?} is {bias}, biases must be finite")]
	NonFiniteBias { term: (usize, usize), bias: f64 },
}

/// Domain of the variables of a model.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vartype {
	/// Variables take values in {0, 1}
	Binary,
	/// Variables take values in {-1, +1}
	Spin,
}

impl Vartype {
	pub fn as_str(&self) -> &'static str {
		match self {
			Vartype::Binary => "BINARY",
			Vartype::Spin => "SPIN",
		}
	}

	/// Whether `value` is in the domain of this vartype.
	pub fn contains(&self, value: i8) -> bool {
		match self {
			Vartype::Binary => value == 0 || value == 1,
			Vartype::Spin => value == -1 || value == 1,
		}
	}

	/// Value of a variable whose packed bit is `bit`.
	pub fn from_bit(&self, bit: bool) -> i8 {
		match (self, bit) {
			(_, true) => 1,
			(Vartype::Binary, false) => 0,
			(Vartype::Spin, false) => -1,
		}
	}
}

impl std::fmt::Display for Vartype {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[inline]
pub(crate) fn unordered(i: usize, j: usize) -> (usize, usize) {
	if i <= j {
		(i, j)
	} else {
		(j, i)
	}
}

/// Canonical binary quadratic model: linear biases, pairwise interactions,
/// a constant offset and the variable domain.
///
/// Interaction keys are stored with the smaller index first and never contain
/// the same variable twice.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryQuadraticModel {
	pub linear: BTreeMap<usize, f64>,
	pub quadratic: BTreeMap<(usize, usize), f64>,
	pub offset: f64,
	pub vartype: Vartype,
}

impl BinaryQuadraticModel {
	pub fn new(vartype: Vartype) -> Self {
		Self {
			linear: BTreeMap::new(),
			quadratic: BTreeMap::new(),
			offset: 0.0,
			vartype,
		}
	}

	/// Overwrite the linear bias of `variable`.
	pub fn set_linear(&mut self, variable: usize, bias: f64) -> Option<f64> {
		self.linear.insert(variable, bias)
	}

	/// Overwrite the interaction between `u` and `v`, which must differ.
	pub fn set_quadratic(
		&mut self,
		u: usize,
		v: usize,
		bias: f64,
	) -> Result<Option<f64>, ModelError> {
		if u == v {
			return Err(ModelError::SelfInteraction(u));
		}
		Ok(self.quadratic.insert(unordered(u, v), bias))
	}

	/// Fails on the first NaN or infinite bias or offset.
	pub fn check_finite(&self) -> Result<(), ModelError> {
		let linear = self.linear.iter().map(|(&v, &bias)| ((v, v), bias));
		let quadratic = self.quadratic.iter().map(|(&k, &bias)| (k, bias));
		match linear.chain(quadratic).find(|(_, bias)| !bias.is_finite()) {
			Some((term, bias)) => Err(ModelError::NonFiniteBias { term, bias }),
			None if !self.offset.is_finite() => Err(ModelError::NonFiniteBias {
				term: (0, 0),
				bias: self.offset,
			}),
			None => Ok(()),
		}
	}

	/// Every variable mentioned by a linear or a quadratic term.
	pub fn variables(&self) -> BTreeSet<usize> {
		self.linear
			.keys()
			.copied()
			.chain(self.quadratic.keys().flat_map(|&(u, v)| vec![u, v]))
			.collect()
	}

	pub fn num_variables(&self) -> usize {
		self.variables().len()
	}

	pub fn num_interactions(&self) -> usize {
		self.quadratic.len()
	}

	/// Upper-triangular QUBO view: linear biases on the diagonal.
	pub fn to_qubo(&self) -> BTreeMap<(usize, usize), f64> {
		self.linear
			.iter()
			.map(|(&v, &bias)| ((v, v), bias))
			.chain(self.quadratic.iter().map(|(&k, &bias)| (k, bias)))
			.collect()
	}

	/// Serializable document in the dimod BQM schema.
	///
	/// Labels are sorted; `quadratic_head`/`quadratic_tail` index into them.
	/// JSON has no NaN or infinity, so non-finite biases are rejected.
	pub fn to_serializable(&self) -> Result<Value, ModelError> {
		self.check_finite()?;
		let labels: Vec<usize> = self.variables().into_iter().collect();
		let index: BTreeMap<usize, usize> = labels.iter().enumerate().map(|(i, &v)| (v, i)).collect();
		let linear_biases: Vec<f64> = labels
			.iter()
			.map(|v| self.linear.get(v).copied().unwrap_or(0.0))
			.collect();
		let mut heads = Vec::with_capacity(self.quadratic.len());
		let mut tails = Vec::with_capacity(self.quadratic.len());
		let mut biases = Vec::with_capacity(self.quadratic.len());
		for (&(u, v), &bias) in self.quadratic.iter() {
			heads.push(index[&u]);
			tails.push(index[&v]);
			biases.push(bias);
		}
		Ok(json!({
			"basetype": "BinaryQuadraticModel",
			"type": "BinaryQuadraticModel",
			"version": { "bqm_schema": BQM_SCHEMA_VERSION },
			"use_bytes": false,
			"index_type": "uint32",
			"bias_type": "float64",
			"num_variables": labels.len(),
			"num_interactions": heads.len(),
			"variable_labels": labels,
			"variable_type": self.vartype,
			"offset": self.offset,
			"info": {},
			"linear_biases": linear_biases,
			"quadratic_biases": biases,
			"quadratic_head": heads,
			"quadratic_tail": tails,
		}))
	}
}

#[test]
fn serializable_indexes_sorted_labels() {
	let mut bqm = BinaryQuadraticModel::new(Vartype::Binary);
	bqm.set_linear(4, -1.0);
	bqm.set_quadratic(7, 2, 0.5).unwrap();
	bqm.set_quadratic(4, 7, 3.0).unwrap();
	let doc = bqm.to_serializable().unwrap();
	assert_eq!(doc["variable_labels"], json!([2, 4, 7]));
	assert_eq!(doc["linear_biases"], json!([0.0, -1.0, 0.0]));
	assert_eq!(doc["quadratic_head"], json!([0, 1]));
	assert_eq!(doc["quadratic_tail"], json!([2, 2]));
	assert_eq!(doc["quadratic_biases"], json!([0.5, 3.0]));
	assert_eq!(doc["num_variables"], json!(3));
	assert_eq!(doc["num_interactions"], json!(2));
	assert_eq!(doc["variable_type"], json!("BINARY"));
	assert_eq!(doc["version"]["bqm_schema"], json!("3.0.0"));
}

#[test]
fn self_interaction_is_rejected() {
	let mut bqm = BinaryQuadraticModel::new(Vartype::Spin);
	assert_eq!(bqm.set_quadratic(3, 3, 1.0), Err(ModelError::SelfInteraction(3)));
	assert!(bqm.quadratic.is_empty());
}

#[test]
fn non_finite_biases_are_not_serialized() {
	let mut bqm = BinaryQuadraticModel::new(Vartype::Binary);
	bqm.set_linear(0, f64::NAN);
	bqm.set_quadratic(0, 1, f64::INFINITY).unwrap();
	match bqm.to_serializable() {
		Err(ModelError::NonFiniteBias { term, bias }) => {
			assert_eq!(term, (0, 0));
			assert!(bias.is_nan());
		}
		other => panic!("unexpected {:?}", other),
	}

	bqm.set_linear(0, 1.0);
	assert_eq!(
		bqm.to_serializable(),
		Err(ModelError::NonFiniteBias {
			term: (0, 1),
			bias: f64::INFINITY
		})
	);

	bqm.set_quadratic(0, 1, -2.0).unwrap();
	bqm.offset = f64::NEG_INFINITY;
	assert!(bqm.to_serializable().is_err());
}
