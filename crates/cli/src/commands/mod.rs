pub mod config;
pub mod probe;

use anyhow::Result;
use devsess::{EnvSource, LayeredSource, MapSource, PropertiesSource};

use crate::cli::{Cli, Commands};

/// Builds the configuration layers: `--set` overrides, then environment,
/// then the properties file.
pub fn config_source(cli: &Cli) -> Result<LayeredSource> {
	let mut overrides = MapSource::new();
	for (key, value) in &cli.overrides {
		overrides.insert(key, value);
	}

	let mut source = LayeredSource::new()
		.push(overrides)
		.push(EnvSource::with_prefix(&cli.env_prefix));
	if let Some(path) = &cli.config {
		source = source.push(PropertiesSource::from_file(path)?);
	}
	Ok(source)
}

pub async fn dispatch(cli: Cli) -> Result<()> {
	let source = config_source(&cli)?;
	match cli.command {
		Commands::Config => config::run(&source, cli.format),
		Commands::Probe(args) => probe::run(source, args, cli.format).await,
	}
}
