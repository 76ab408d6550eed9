use crate::Qubo;
use std::fs;
use std::io;
use std::path::Path;

const COLUMN_GAP: usize = 3;

/// Render the upper triangle of `qubo` as a grid of coefficients, one row per
/// variable, with zeros where no coefficient is set.
pub fn display_qubo(qubo: &Qubo) -> String {
	let size = match qubo.max_variable() {
		Some(max) => max + 1,
		None => return String::new(),
	};
	let cells: Vec<Vec<String>> = (0..size)
		.map(|i| {
			(0..size)
				.map(|j| match qubo.get(i, j) {
					Some(w) if i <= j => w.to_string(),
					_ => "0".to_owned(),
				})
				.collect()
		})
		.collect();
	let width = cells
		.iter()
		.flatten()
		.map(|cell| cell.len())
		.max()
		.unwrap_or(1)
		+ COLUMN_GAP;
	let mut out = String::new();
	for row in cells.iter() {
		for cell in row.iter() {
			out.push_str(&format!("{:<width$}", cell, width = width));
		}
		out.push('\n');
	}
	out
}

/// Write [`display_qubo`] of `qubo` to `path`.
pub fn write_qubo_grid<P: AsRef<Path>>(qubo: &Qubo, path: P) -> io::Result<()> {
	fs::write(path, display_qubo(qubo))
}

#[test]
fn grid_of_small_qubo() {
	let qubo: Qubo = vec![((0, 0), -2), ((1, 1), -2), ((1, 0), 5)]
		.into_iter()
		.collect();
	assert_eq!(display_qubo(&qubo), "-2   5    \n0    -2   \n");
}

#[test]
fn grid_fills_gaps_with_zero() {
	let qubo: Qubo = vec![((0, 2), 1.5)].into_iter().collect();
	let grid = display_qubo(&qubo);
	let rows: Vec<&str> = grid.lines().collect();
	assert_eq!(rows.len(), 3);
	assert_eq!(rows[0].split_whitespace().collect::<Vec<_>>(), vec!["0", "0", "1.5"]);
	assert_eq!(rows[2].split_whitespace().collect::<Vec<_>>(), vec!["0", "0", "0"]);
	assert_eq!(display_qubo(&Qubo::new()), "");
}

#[test]
fn grid_is_written_to_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("qubo.txt");
	let qubo: Qubo = vec![((0, 1), 3)].into_iter().collect();
	write_qubo_grid(&qubo, &path).unwrap();
	assert_eq!(fs::read_to_string(&path).unwrap(), display_qubo(&qubo));
}
