//! Command-line access to a UQO server.
//!
//! ```text
//! uqo ping
//! uqo platforms
//! uqo solve qubo.json --platform qbsolv --times 10
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uqo::util::write_qubo_grid;
use uqo::{Config, Problem, Qubo, RemoteSolver};

#[derive(Parser)]
#[command(name = "uqo")]
#[command(author, version, about = "Client for UQO solving servers", long_about = None)]
struct Cli {
	/// Increase verbosity (-v, -vv, -vvv)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbose: u8,

	/// Config file (ini or .json); searched in the default locations if omitted
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	/// Section of the ini config to use
	#[arg(short, long, global = true)]
	profile: Option<String>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Check that the server answers
	Ping,

	/// List the platforms the server offers
	Platforms,

	/// List the D-Wave solvers the server offers
	Solvers,

	/// Show the remaining quota
	Quota,

	/// Solve a QUBO given as a JSON list of [i, j, weight] triples
	Solve {
		/// Input file
		input: PathBuf,

		/// Platform to solve on
		#[arg(long)]
		platform: Option<String>,

		/// Solver to prefer on the platform
		#[arg(long)]
		solver: Option<String>,

		/// Number of repeats
		#[arg(short, long, default_value = "1")]
		times: usize,

		/// Also write the QUBO as a coefficient grid to this file
		#[arg(long)]
		grid: Option<PathBuf>,
	},
}

fn read_qubo(path: &Path) -> Result<Qubo> {
	let text = std::fs::read_to_string(path)
		.with_context(|| format!("cannot read {}", path.display()))?;
	let terms: Vec<(usize, usize, f64)> = serde_json::from_str(&text)
		.with_context(|| format!("{} is not a list of [i, j, weight]", path.display()))?;
	Ok(terms.into_iter().map(|(i, j, w)| ((i, j), w)).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let filter = match cli.verbose {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::new(filter))
		.with_target(false)
		.init();

	let config = Config::from_file(cli.config.clone(), cli.profile.as_deref())
		.context("failed to load config")?;
	debug!(?config, "loaded config");

	match cli.command {
		Commands::Ping => {
			let connection = config.create_connection();
			println!("{}", connection.ping().await?);
		}
		Commands::Platforms => {
			let connection = config.create_connection();
			for platform in connection.get_available_platforms().await? {
				println!("{}", platform);
			}
		}
		Commands::Solvers => {
			let connection = config.create_connection();
			for solver in connection.get_available_dwave_solvers().await? {
				println!("{}", solver);
			}
		}
		Commands::Quota => {
			config.create_connection().show_quota().await?;
		}
		Commands::Solve {
			input,
			platform,
			solver,
			times,
			grid,
		} => {
			let qubo = read_qubo(&input)?;
			if let Some(grid) = grid.as_ref() {
				write_qubo_grid(&qubo, grid)
					.with_context(|| format!("cannot write {}", grid.display()))?;
			}
			let mut problem = Problem::new(qubo);
			if let Some(platform) = platform {
				problem = problem.with_platform(platform);
			}
			if let Some(solver) = solver {
				problem = problem.with_solver(solver);
			}
			let mut remote = RemoteSolver::from_config(&config, problem);
			let response = remote.solve(times).await?;
			response.print_solutions_nice();
			if let Some(timing) = response.timing.as_ref() {
				println!("Timing: {}", serde_json::Value::Object(timing.clone()));
			}
		}
	}

	Ok(())
}

#[test]
fn qubo_file_is_read_as_triples() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("qubo.json");
	std::fs::write(&path, "[[0, 0, -2], [1, 1, -2], [1, 0, 5.5]]").unwrap();
	let qubo = read_qubo(&path).unwrap();
	assert_eq!(qubo.len(), 3);
	assert_eq!(qubo.get(0, 1), Some(5.5));

	std::fs::write(&path, "{\"0\": 1}").unwrap();
	assert!(read_qubo(path.as_path()).is_err());
}
