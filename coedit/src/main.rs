mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{ErrorLevel, Verbosity};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<ErrorLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Serve documents over WebSocket and HTTP
	Serve(tools::serve::Subcommand),

	/// Show tile-cache diagnostics for a cached document
	Probe(tools::probe::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new().filter_level(cli.verbose.log_level_filter()).format_timestamp(None).init();

	run(cli)
}

fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::Serve(arguments) => tools::serve::run(arguments),
		Commands::Probe(arguments) => tools::probe::run(arguments),
	}
}

#[cfg(test)]
mod tests {
	use crate::{Cli, run};
	use anyhow::Result;
	use clap::Parser;

	pub fn run_command(arg_vec: Vec<&str>) -> Result<String> {
		let cli = Cli::try_parse_from(arg_vec)?;
		let msg = format!("{cli:?}");
		run(cli)?;
		Ok(msg)
	}

	#[test]
	fn help() {
		let err = run_command(vec!["coedit"]).unwrap_err().to_string();
		assert!(err.contains("\nUsage: coedit [OPTIONS] <COMMAND>"));
	}

	#[test]
	fn version() {
		let err = run_command(vec!["coedit", "-V"]).unwrap_err().to_string();
		assert!(err.starts_with("coedit "));
	}

	#[test]
	fn serve_subcommand_help() {
		let output = run_command(vec!["coedit", "serve", "--help"]).unwrap_err().to_string();
		assert!(output.starts_with("Serve documents over WebSocket and HTTP"));
	}

	#[test]
	fn probe_subcommand_requires_a_path() {
		let output = run_command(vec!["coedit", "probe"]).unwrap_err().to_string();
		assert!(output.starts_with("Show tile-cache diagnostics"));
	}
}
