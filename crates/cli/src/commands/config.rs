use anyhow::Result;
use devsess::{ConfigSource, SessionConfig};
use tracing::debug;

use crate::output::{self, OutputFormat, ResultBuilder};

pub fn run(source: &dyn ConfigSource, format: OutputFormat) -> Result<()> {
	debug!(target = "devsess.cli", source = %source.describe(), "resolving config");
	let config = SessionConfig::resolve(source)?;
	output::print_result(&ResultBuilder::new("config").data(config).build(), format);
	Ok(())
}
