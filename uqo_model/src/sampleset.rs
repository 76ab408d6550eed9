use crate::bqm::Vartype;
use crate::solution::Sample;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::convert::TryInto;
use thiserror::Error;

const SAMPLESET_SCHEMA_VERSION: &str = "3.1.0";

#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("malformed sampleset document: {0}")]
	Document(#[from] serde_json::Error),
	#[error("unsupported ndarray data type '{0}'")]
	DataType(String),
	#[error("bad ndarray data: {0}")]
	Data(String),
	#[error("cannot decode ndarray buffer: {0}")]
	Base64(#[from] base64::DecodeError),
	#[error("shape mismatch: {0}")]
	Shape(String),
	#[error("variable label {0} is not a variable index")]
	Label(Value),
	#[error("variable {0} is labelled more than once")]
	DuplicateLabel(usize),
}

/// Decoded answer of a solver: one row per sample with its energy and
/// occurrence count.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSet {
	vartype: Vartype,
	variables: Vec<usize>,
	samples: Vec<Vec<i8>>,
	energies: Vec<f64>,
	num_occurrences: Vec<u64>,
	info: Map<String, Value>,
}

impl SampleSet {
	/// Build a sampleset, checking that every per-sample vector has one entry
	/// per sample, labels are distinct and every value lies in the domain of
	/// `vartype`. Missing occurrence counts default to one.
	pub fn new(
		vartype: Vartype,
		variables: Vec<usize>,
		samples: Vec<Vec<i8>>,
		energies: Vec<f64>,
		num_occurrences: Option<Vec<u64>>,
		info: Map<String, Value>,
	) -> Result<Self, DecodeError> {
		let mut seen = BTreeSet::new();
		if let Some(&label) = variables.iter().find(|&&v| !seen.insert(v)) {
			return Err(DecodeError::DuplicateLabel(label));
		}
		if let Some(row) = samples.iter().find(|row| row.len() != variables.len()) {
			return Err(DecodeError::Shape(format!(
				"sample of {} values for {} variables",
				row.len(),
				variables.len()
			)));
		}
		if energies.len() != samples.len() {
			return Err(DecodeError::Shape(format!(
				"{} energies for {} samples",
				energies.len(),
				samples.len()
			)));
		}
		if let Some(&value) = samples.iter().flatten().find(|&&v| !vartype.contains(v)) {
			return Err(DecodeError::Data(format!(
				"{} is not a {} value",
				value, vartype
			)));
		}
		let num_occurrences = num_occurrences.unwrap_or_else(|| vec![1; samples.len()]);
		if num_occurrences.len() != samples.len() {
			return Err(DecodeError::Shape(format!(
				"{} occurrence counts for {} samples",
				num_occurrences.len(),
				samples.len()
			)));
		}
		Ok(Self {
			vartype,
			variables,
			samples,
			energies,
			num_occurrences,
			info,
		})
	}

	/// Decode a dimod serializable sampleset document.
	pub fn from_serializable(doc: &Value) -> Result<Self, DecodeError> {
		let doc = SerializedSampleSet::deserialize(doc)?;
		let variables = doc
			.variable_labels
			.iter()
			.map(label_index)
			.collect::<Result<Vec<_>, _>>()?;
		let rows = doc.record.sample.to_2d_arr()?;
		let samples = if doc.sample_packed {
			rows.iter()
				.map(|row| unpack_row(row, variables.len(), doc.variable_type))
				.collect::<Result<Vec<_>, _>>()?
		} else {
			rows.iter()
				.map(|row| {
					row.iter()
						.map(|&v| to_value(v))
						.collect::<Result<Vec<_>, _>>()
				})
				.collect::<Result<Vec<_>, _>>()?
		};
		let energies = doc.record.energy.to_1d_arr()?;
		let num_occurrences = match &doc.record.num_occurrences {
			Some(arr) => Some(arr.to_1d_counts()?),
			None => None,
		};
		Self::new(
			doc.variable_type,
			variables,
			samples,
			energies,
			num_occurrences,
			doc.info,
		)
	}

	/// Serializable document with unpacked samples and list-encoded vectors.
	pub fn to_serializable(&self) -> Value {
		let num_variables = self.variables.len();
		json!({
			"basetype": "SampleSet",
			"type": "SampleSet",
			"version": { "sampleset_schema": SAMPLESET_SCHEMA_VERSION },
			"num_variables": num_variables,
			"num_rows": self.samples.len(),
			"variable_labels": self.variables,
			"variable_type": self.vartype,
			"sample_packed": false,
			"sample_type": "int8",
			"info": self.info,
			"record": {
				"sample": {
					"type": "array",
					"data": self.samples,
					"data_type": "int8",
					"shape": [self.samples.len(), num_variables],
					"use_bytes": false,
				},
				"energy": {
					"type": "array",
					"data": self.energies,
					"data_type": "float64",
					"shape": [self.energies.len()],
					"use_bytes": false,
				},
				"num_occurrences": {
					"type": "array",
					"data": self.num_occurrences,
					"data_type": "int64",
					"shape": [self.num_occurrences.len()],
					"use_bytes": false,
				},
			},
		})
	}

	pub fn vartype(&self) -> Vartype {
		self.vartype
	}

	pub fn variables(&self) -> &[usize] {
		&self.variables
	}

	pub fn len(&self) -> usize {
		self.samples.len()
	}

	pub fn is_empty(&self) -> bool {
		self.samples.is_empty()
	}

	pub fn energies(&self) -> &[f64] {
		&self.energies
	}

	pub fn num_occurrences(&self) -> &[u64] {
		&self.num_occurrences
	}

	pub fn info(&self) -> &Map<String, Value> {
		&self.info
	}

	pub fn sample(&self, index: usize) -> Option<Sample> {
		self.samples.get(index).map(|row| self.to_sample(row))
	}

	/// Samples in the order the solver returned them.
	pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
		self.samples.iter().map(move |row| self.to_sample(row))
	}

	pub fn lowest_energy(&self) -> Option<f64> {
		self.energies.iter().copied().fold(None, |lowest, e| match lowest {
			Some(l) if l <= e => Some(l),
			_ => Some(e),
		})
	}

	fn to_sample(&self, row: &[i8]) -> Sample {
		self.variables.iter().copied().zip(row.iter().copied()).collect()
	}
}

#[derive(Deserialize)]
struct SerializedSampleSet {
	#[serde(default)]
	sample_packed: bool,
	variable_type: Vartype,
	// length == number of columns of record.sample (before packing)
	variable_labels: Vec<Value>,
	// {'timing': {'qpu_sampling_time': 315, ...}, ...}
	#[serde(default)]
	info: Map<String, Value>,
	record: SerializedRecord,
}

#[derive(Deserialize)]
struct SerializedRecord {
	// (num_samples, num_variables), or (num_samples, ceil(num_variables / 8)) when packed
	sample: NdArray,
	energy: NdArray,
	#[serde(default)]
	num_occurrences: Option<NdArray>,
	// chain_break_fraction and other per-sample vectors
	#[serde(flatten)]
	_other: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct NdArray {
	#[serde(default)]
	use_bytes: bool,
	data: Value,
	#[serde(alias = "dtype")]
	data_type: String,
	shape: Vec<usize>,
}

impl NdArray {
	fn item_size(&self) -> Result<usize, DecodeError> {
		Ok(match self.data_type.as_str() {
			"bool" | "int8" | "uint8" => 1,
			"int16" | "uint16" => 2,
			"int32" | "uint32" | "float32" => 4,
			"int64" | "uint64" | "float64" => 8,
			other => return Err(DecodeError::DataType(other.to_owned())),
		})
	}

	fn items(&self) -> usize {
		self.shape.iter().product()
	}

	fn expect_dims(&self, dims: usize) -> Result<(), DecodeError> {
		if self.shape.len() == dims {
			Ok(())
		} else {
			Err(DecodeError::Shape(format!(
				"expected a {}-dimensional array, got shape {:?}",
				dims, self.shape
			)))
		}
	}

	/// Items flattened in row-major order.
	fn values(&self) -> Result<Vec<f64>, DecodeError> {
		let values = if self.use_bytes {
			self.values_from_bytes()?
		} else {
			let mut out = Vec::with_capacity(self.items());
			flatten(&self.data, &mut out)?;
			out
		};
		if values.len() != self.items() {
			return Err(DecodeError::Shape(format!(
				"{} items for shape {:?}",
				values.len(),
				self.shape
			)));
		}
		Ok(values)
	}

	fn values_from_bytes(&self) -> Result<Vec<f64>, DecodeError> {
		let size = self.item_size()?;
		let buf = match &self.data {
			Value::String(s) => base64::decode(s)?,
			Value::Array(a) => a
				.iter()
				.map(|v| {
					v.as_u64()
						.filter(|b| *b <= u8::MAX as u64)
						.map(|b| b as u8)
						.ok_or_else(|| DecodeError::Data(format!("{} is not a byte", v)))
				})
				.collect::<Result<Vec<_>, _>>()?,
			other => {
				return Err(DecodeError::Data(format!(
					"cannot read bytes from {}",
					other
				)))
			}
		};
		if buf.len() % size != 0 {
			return Err(DecodeError::Data(format!(
				"{} bytes is not a whole number of {} items",
				buf.len(),
				self.data_type
			)));
		}
		buf.chunks(size)
			.map(|chunk| from_le_bytes(&self.data_type, chunk))
			.collect()
	}

	fn to_1d_arr(&self) -> Result<Vec<f64>, DecodeError> {
		self.expect_dims(1)?;
		self.values()
	}

	fn to_1d_counts(&self) -> Result<Vec<u64>, DecodeError> {
		self.to_1d_arr()?
			.into_iter()
			.map(|v| {
				if v >= 0.0 && v.fract() == 0.0 {
					Ok(v as u64)
				} else {
					Err(DecodeError::Data(format!("{} is not an occurrence count", v)))
				}
			})
			.collect()
	}

	fn to_2d_arr(&self) -> Result<Vec<Vec<f64>>, DecodeError> {
		self.expect_dims(2)?;
		let (rows, cols) = (self.shape[0], self.shape[1]);
		let values = self.values()?;
		if cols == 0 {
			return Ok(vec![Vec::new(); rows]);
		}
		Ok(values.chunks(cols).map(<[f64]>::to_vec).collect())
	}
}

fn flatten(value: &Value, out: &mut Vec<f64>) -> Result<(), DecodeError> {
	match value {
		Value::Array(items) => items.iter().try_for_each(|item| flatten(item, out)),
		Value::Number(n) => {
			let v = n
				.as_f64()
				.ok_or_else(|| DecodeError::Data(format!("{} is not representable", n)))?;
			out.push(v);
			Ok(())
		}
		Value::Bool(b) => {
			out.push(if *b { 1.0 } else { 0.0 });
			Ok(())
		}
		other => Err(DecodeError::Data(format!("unexpected {} in array", other))),
	}
}

macro_rules! le {
	($ty:ty, $chunk:expr) => {
		<$ty>::from_le_bytes(
			$chunk
				.try_into()
				.map_err(|_| DecodeError::Data("truncated item".to_owned()))?,
		) as f64
	};
}

fn from_le_bytes(data_type: &str, chunk: &[u8]) -> Result<f64, DecodeError> {
	Ok(match data_type {
		"bool" | "uint8" => le!(u8, chunk),
		"int8" => le!(i8, chunk),
		"int16" => le!(i16, chunk),
		"uint16" => le!(u16, chunk),
		"int32" => le!(i32, chunk),
		"uint32" => le!(u32, chunk),
		"float32" => le!(f32, chunk),
		"int64" => le!(i64, chunk),
		"uint64" => le!(u64, chunk),
		"float64" => le!(f64, chunk),
		other => return Err(DecodeError::DataType(other.to_owned())),
	})
}

fn to_value(v: f64) -> Result<i8, DecodeError> {
	if v.fract() == 0.0 && v >= f64::from(i8::MIN) && v <= f64::from(i8::MAX) {
		Ok(v as i8)
	} else {
		Err(DecodeError::Data(format!("{} is not a variable value", v)))
	}
}

/// Unpack one row of bytes, most significant bit first.
fn unpack_row(row: &[f64], variables: usize, vartype: Vartype) -> Result<Vec<i8>, DecodeError> {
	let expected = (variables + 7) / 8;
	if row.len() != expected {
		return Err(DecodeError::Shape(format!(
			"packed row of {} bytes for {} variables",
			row.len(),
			variables
		)));
	}
	let bytes = row
		.iter()
		.map(|&b| {
			if (0.0..=255.0).contains(&b) && b.fract() == 0.0 {
				Ok(b as u8)
			} else {
				Err(DecodeError::Data(format!("{} is not a packed byte", b)))
			}
		})
		.collect::<Result<Vec<u8>, _>>()?;
	Ok((0..variables)
		.map(|k| vartype.from_bit(bytes[k / 8] & (0x80 >> (k % 8)) != 0))
		.collect())
}

fn label_index(label: &Value) -> Result<usize, DecodeError> {
	let index = match label {
		Value::Number(n) => n.as_u64().map(|v| v as usize),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	};
	index.ok_or_else(|| DecodeError::Label(label.clone()))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn array(data: Value, data_type: &str, shape: Value) -> Value {
		json!({ "type": "array", "data": data, "data_type": data_type, "shape": shape, "use_bytes": false })
	}

	#[test]
	fn decodes_list_encoded_sampleset() {
		let doc = json!({
			"basetype": "SampleSet",
			"type": "SampleSet",
			"variable_labels": [0, 1, 2],
			"variable_type": "BINARY",
			"sample_packed": false,
			"info": {},
			"record": {
				"sample": array(json!([[1, 0, 1], [0, 1, 1]]), "int8", json!([2, 3])),
				"energy": array(json!([-4.0, -2.5]), "float64", json!([2])),
				"num_occurrences": array(json!([3, 1]), "int64", json!([2])),
				"chain_break_fraction": array(json!([0.0, 0.0]), "float64", json!([2])),
			},
		});
		let set = SampleSet::from_serializable(&doc).unwrap();
		assert_eq!(set.len(), 2);
		assert_eq!(set.energies(), &[-4.0, -2.5]);
		assert_eq!(set.num_occurrences(), &[3, 1]);
		assert_eq!(set.sample(0).unwrap().to_string(), "{0: 1, 1: 0, 2: 1}");
		assert_eq!(set.lowest_energy(), Some(-4.0));
	}

	#[test]
	fn unpacks_msb_first() {
		// 10 variables: bits 0, 2 and 9 are set
		let doc = json!({
			"variable_labels": ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"],
			"variable_type": "SPIN",
			"sample_packed": true,
			"record": {
				"sample": array(json!([[0b1010_0000, 0b0100_0000]]), "uint8", json!([1, 2])),
				"energy": array(json!([1.5]), "float64", json!([1])),
			},
		});
		let set = SampleSet::from_serializable(&doc).unwrap();
		let sample = set.sample(0).unwrap();
		let values: Vec<i8> = sample.iter().map(|(_, v)| v).collect();
		assert_eq!(values, vec![1, -1, 1, -1, -1, -1, -1, -1, -1, 1]);
		assert_eq!(set.num_occurrences(), &[1]);
		assert_eq!(set.vartype(), Vartype::Spin);
	}

	#[test]
	fn decodes_byte_buffers() {
		let energies: Vec<u8> = [(-1.5f64).to_le_bytes(), 2.0f64.to_le_bytes()].concat();
		let doc = json!({
			"variable_labels": [3, 7],
			"variable_type": "BINARY",
			"record": {
				"sample": {
					"data": base64::encode(&[1u8, 0, 0, 1]),
					"data_type": "int8",
					"shape": [2, 2],
					"use_bytes": true,
				},
				"energy": {
					"data": base64::encode(&energies),
					"data_type": "float64",
					"shape": [2],
					"use_bytes": true,
				},
			},
		});
		let set = SampleSet::from_serializable(&doc).unwrap();
		assert_eq!(set.variables(), &[3, 7]);
		assert_eq!(set.energies(), &[-1.5, 2.0]);
		assert_eq!(set.sample(1).unwrap()[7], 1);
	}

	#[test]
	fn rejects_shape_mismatch() {
		let doc = json!({
			"variable_labels": [0, 1],
			"variable_type": "BINARY",
			"record": {
				"sample": array(json!([[1, 0], [0, 1]]), "int8", json!([2, 2])),
				"energy": array(json!([0.0]), "float64", json!([1])),
			},
		});
		match SampleSet::from_serializable(&doc) {
			Err(DecodeError::Shape(_)) => (),
			other => panic!("unexpected result {:?}", other),
		}
	}

	#[test]
	fn rejects_non_integer_labels() {
		let doc = json!({
			"variable_labels": ["a"],
			"variable_type": "BINARY",
			"record": {
				"sample": array(json!([[1]]), "int8", json!([1, 1])),
				"energy": array(json!([0.0]), "float64", json!([1])),
			},
		});
		assert!(matches!(
			SampleSet::from_serializable(&doc),
			Err(DecodeError::Label(_))
		));
	}

	fn binary_doc(labels: Value, samples: Value, shape: Value) -> Value {
		json!({
			"variable_labels": labels,
			"variable_type": "BINARY",
			"record": {
				"sample": array(samples, "int16", shape),
				"energy": array(json!([0.0]), "float64", json!([1])),
			},
		})
	}

	#[test]
	fn rejects_values_outside_the_vartype() {
		let doc = binary_doc(json!([0, 1]), json!([[3, 0]]), json!([1, 2]));
		assert!(matches!(
			SampleSet::from_serializable(&doc),
			Err(DecodeError::Data(_))
		));
		let doc = binary_doc(json!([0, 1]), json!([[300, 0]]), json!([1, 2]));
		assert!(matches!(
			SampleSet::from_serializable(&doc),
			Err(DecodeError::Data(_))
		));
		assert!(matches!(
			SampleSet::new(Vartype::Spin, vec![0], vec![vec![0]], vec![0.0], None, Map::new()),
			Err(DecodeError::Data(_))
		));
	}

	#[test]
	fn rejects_duplicate_labels() {
		let doc = binary_doc(json!([0, 1, 1]), json!([[1, 0, 1]]), json!([1, 3]));
		match SampleSet::from_serializable(&doc) {
			Err(DecodeError::DuplicateLabel(label)) => assert_eq!(label, 1),
			other => panic!("unexpected result {:?}", other),
		}
	}

	#[test]
	fn serializable_document_decodes_back() {
		let mut info = Map::new();
		info.insert("timing".to_owned(), json!({"qpu_access_time": 100}));
		let set = SampleSet::new(
			Vartype::Spin,
			vec![0, 4],
			vec![vec![1, -1], vec![-1, -1]],
			vec![-2.0, 1.0],
			Some(vec![5, 2]),
			info,
		)
		.unwrap();
		assert_eq!(SampleSet::from_serializable(&set.to_serializable()).unwrap(), set);
	}
}
