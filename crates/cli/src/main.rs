use clap::Parser;
use devsess_cli::{
	cli::Cli,
	commands, logging,
	output::{self, OutputFormat, ResultBuilder},
};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;

	if let Err(err) = commands::dispatch(cli).await {
		if !output::is_output_already_printed(&err) {
			handle_error(&err, format);
		}
		std::process::exit(1);
	}
}

fn handle_error(err: &anyhow::Error, format: OutputFormat) {
	let cmd_error = output::classify(err);

	// Humans read stderr; JSON consumers get an ok=false envelope on stdout.
	output::print_error_stderr(&cmd_error);
	if format == OutputFormat::Json {
		let result = ResultBuilder::<()>::new("devsess").error(cmd_error).build();
		output::print_result(&result, format);
	}
}
