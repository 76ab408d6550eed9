use std::collections::BTreeMap;
use std::iter::FromIterator;
use std::ops::Index;

/// One assignment of values to variables, ordered by variable index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Sample(BTreeMap<usize, i8>);

impl Sample {
	pub fn get(&self, variable: usize) -> Option<i8> {
		self.0.get(&variable).copied()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (usize, i8)> + '_ {
		self.0.iter().map(|(&k, &v)| (k, v))
	}

	pub fn variables(&self) -> impl Iterator<Item = usize> + '_ {
		self.0.keys().copied()
	}

	pub fn into_inner(self) -> BTreeMap<usize, i8> {
		self.0
	}
}

impl FromIterator<(usize, i8)> for Sample {
	fn from_iter<I: IntoIterator<Item = (usize, i8)>>(iter: I) -> Self {
		Sample(iter.into_iter().collect())
	}
}

impl Index<usize> for Sample {
	type Output = i8;

	fn index(&self, variable: usize) -> &i8 {
		&self.0[&variable]
	}
}

impl std::fmt::Display for Sample {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("{")?;
		for (n, (variable, value)) in self.iter().enumerate() {
			if n > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{}: {}", variable, value)?;
		}
		f.write_str("}")
	}
}

#[test]
fn sample_display_is_ordered() {
	let sample: Sample = vec![(3, -1), (0, 1), (1, 1)].into_iter().collect();
	assert_eq!(sample.to_string(), "{0: 1, 1: 1, 3: -1}");
	assert_eq!(sample[3], -1);
	assert_eq!(sample.get(2), None);
	assert_eq!(Sample::default().to_string(), "{}");
}
