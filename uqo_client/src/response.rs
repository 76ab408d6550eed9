use crate::{ApiError, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::io::{self, Write};
use uqo_model::sampleset::SampleSet;
use uqo_model::solution::Sample;

/// Solver-reported timing information, passed through as sent.
pub type Timing = Map<String, Value>;

/// The solver family that produced an answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolverKind {
	QbSolv,
	DWave,
	FujitsuDau,
	Tabu,
}

impl SolverKind {
	pub fn from_wire(name: &str) -> Option<Self> {
		match name {
			"QBsolvSolver" => Some(SolverKind::QbSolv),
			"DWaveSolver" => Some(SolverKind::DWave),
			"FujitsuDAUSolver" => Some(SolverKind::FujitsuDau),
			"TabuSolver" => Some(SolverKind::Tabu),
			_ => None,
		}
	}

	pub fn wire_name(self) -> &'static str {
		match self {
			SolverKind::QbSolv => "QBsolvSolver",
			SolverKind::DWave => "DWaveSolver",
			SolverKind::FujitsuDau => "FujitsuDAUSolver",
			SolverKind::Tabu => "TabuSolver",
		}
	}

	/// Whether answers of this solver carry `info.timing`.
	pub fn reports_timing(self) -> bool {
		matches!(self, SolverKind::DWave | SolverKind::FujitsuDau)
	}
}

impl fmt::Display for SolverKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.wire_name())
	}
}

/// A solved problem: the sampleset plus its samples, energies and occurrence
/// counts as parallel sequences in the order the solver returned them.
#[derive(Clone, Debug)]
pub struct Response {
	pub solver: SolverKind,
	pub sampleset: SampleSet,
	pub solutions: Vec<Sample>,
	pub energies: Vec<f64>,
	pub num_occurrences: Vec<u64>,
	/// Present for D-Wave and Fujitsu DAU answers.
	pub timing: Option<Timing>,
}

impl Response {
	pub fn new(solver: SolverKind, sampleset: SampleSet) -> Result<Self> {
		let timing = if solver.reports_timing() {
			match sampleset.info().get("timing") {
				Some(Value::Object(timing)) => Some(timing.clone()),
				_ => {
					return Err(ApiError::Decode(format!(
						"{} answer lacks info.timing",
						solver
					)))
				}
			}
		} else {
			None
		};
		Ok(Self {
			solver,
			solutions: sampleset.samples().collect(),
			energies: sampleset.energies().to_vec(),
			num_occurrences: sampleset.num_occurrences().to_vec(),
			sampleset,
			timing,
		})
	}

	/// Decode a serialized sampleset answer.
	pub fn from_answer(solver: SolverKind, answer: &Value) -> Result<Self> {
		Self::new(solver, SampleSet::from_serializable(answer)?)
	}

	pub fn len(&self) -> usize {
		self.solutions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.solutions.is_empty()
	}

	pub fn write_solutions<W: Write>(&self, mut out: W) -> io::Result<()> {
		for solution in self.solutions.iter() {
			writeln!(out, "{}", solution)?;
		}
		Ok(())
	}

	pub fn write_energies<W: Write>(&self, mut out: W) -> io::Result<()> {
		for energy in self.energies.iter() {
			writeln!(out, "{:?}", energy)?;
		}
		Ok(())
	}

	pub fn write_num_occurrences<W: Write>(&self, mut out: W) -> io::Result<()> {
		for n in self.num_occurrences.iter() {
			writeln!(out, "{}", n)?;
		}
		Ok(())
	}

	pub fn print_solutions(&self) {
		for solution in self.solutions.iter() {
			println!("{}", solution);
		}
	}

	pub fn print_energies(&self) {
		for energy in self.energies.iter() {
			println!("{:?}", energy);
		}
	}

	pub fn print_num_occurrences(&self) {
		for n in self.num_occurrences.iter() {
			println!("{}", n);
		}
	}

	/// Samples, energies and occurrence counts as one table.
	pub fn table(&self) -> SolutionTable<'_> {
		SolutionTable(self)
	}

	pub fn print_solutions_nice(&self) {
		println!("{}", self.table());
	}
}

const TABLE_HEADERS: [&str; 3] = ["Answer-Sample", "Energy", "Num-Occurrences"];

pub struct SolutionTable<'a>(&'a Response);

impl fmt::Display for SolutionTable<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.0;
		let rows: Vec<[String; 3]> = (0..response.len())
			.map(|i| {
				[
					response.solutions[i].to_string(),
					format!("{:?}", response.energies[i]),
					response.num_occurrences[i].to_string(),
				]
			})
			.collect();
		let mut widths = [0; 3];
		for (c, header) in TABLE_HEADERS.iter().enumerate() {
			widths[c] = rows
				.iter()
				.map(|row| row[c].chars().count())
				.chain(Some(header.len()))
				.max()
				.unwrap_or(0);
		}
		let rule: String = widths
			.iter()
			.map(|w| "-".repeat(w + 2))
			.collect::<Vec<_>>()
			.join("+");
		let rule = format!("+{}+", rule);
		let line = |f: &mut fmt::Formatter<'_>, cells: [&str; 3]| -> fmt::Result {
			f.write_str("|")?;
			for (cell, width) in cells.iter().zip(widths.iter()) {
				write!(f, " {:<width$} |", cell, width = *width)?;
			}
			f.write_str("\n")
		};
		writeln!(f, "{}", rule)?;
		line(f, TABLE_HEADERS)?;
		writeln!(f, "{}", rule)?;
		for row in rows.iter() {
			line(f, [&row[0], &row[1], &row[2]])?;
		}
		write!(f, "{}", rule)
	}
}
