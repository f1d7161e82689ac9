use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use devsess::config::DEFAULT_ENV_PREFIX;

use crate::output::OutputFormat;
use crate::styles::cli_styles;

#[cfg(test)]
mod tests;

#[derive(Parser, Debug)]
#[command(name = "devsess")]
#[command(about = "Inspect and probe remote device test sessions")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default) or json
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Properties file with session configuration
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Prefix of environment variables that override the properties file
	#[arg(long, global = true, value_name = "PREFIX", default_value = DEFAULT_ENV_PREFIX)]
	pub env_prefix: String,

	/// Override a configuration key (repeatable, highest precedence)
	#[arg(long = "set", global = true, value_name = "KEY=VALUE", value_parser = parse_key_value)]
	pub overrides: Vec<(String, String)>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Print the resolved session configuration
	Config,

	/// Open a session on the configured device, verify it and close it
	Probe(ProbeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
	/// Append step entries to this file as JSON lines
	#[arg(long, value_name = "FILE")]
	pub steps: Option<PathBuf>,

	/// Also fetch the page source once the session is up
	#[arg(long)]
	pub source: bool,

	/// Override maxRetries for this probe
	#[arg(long, value_name = "N")]
	pub retries: Option<u32>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
	let (key, value) = raw.split_once('=').ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
	let key = key.trim();
	if key.is_empty() {
		return Err(format!("empty key in '{raw}'"));
	}
	Ok((key.to_string(), value.trim().to_string()))
}
