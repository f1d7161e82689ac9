use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn parse_config_command_with_defaults() {
	let cli = Cli::try_parse_from(["devsess", "config"]).unwrap();

	assert!(matches!(cli.command, Commands::Config));
	assert_eq!(cli.format, OutputFormat::Text);
	assert_eq!(cli.env_prefix, "DEVSESS_");
	assert_eq!(cli.verbose, 0);
	assert!(cli.config.is_none());
	assert!(cli.overrides.is_empty());
}

#[test]
fn global_options_follow_the_subcommand() {
	let cli = Cli::try_parse_from([
		"devsess",
		"probe",
		"--config",
		"device.properties",
		"-f",
		"json",
		"-vv",
		"--set",
		"maxRetries=3",
		"--set",
		"url = http://grid:4444/wd/hub",
	])
	.unwrap();

	assert_eq!(cli.config, Some(PathBuf::from("device.properties")));
	assert_eq!(cli.format, OutputFormat::Json);
	assert_eq!(cli.verbose, 2);
	assert_eq!(
		cli.overrides,
		vec![
			("maxRetries".to_string(), "3".to_string()),
			("url".to_string(), "http://grid:4444/wd/hub".to_string()),
		]
	);
}

#[test]
fn parse_probe_options() {
	let cli = Cli::try_parse_from(["devsess", "probe", "--steps", "out/steps.jsonl", "--source", "--retries", "0"]).unwrap();

	match cli.command {
		Commands::Probe(args) => {
			assert_eq!(args.steps, Some(PathBuf::from("out/steps.jsonl")));
			assert!(args.source);
			assert_eq!(args.retries, Some(0));
		}
		_ => panic!("Expected Probe command"),
	}
}

#[test]
fn malformed_overrides_are_rejected() {
	assert!(Cli::try_parse_from(["devsess", "--set", "maxRetries", "config"]).is_err());
	assert!(Cli::try_parse_from(["devsess", "--set", "=3", "config"]).is_err());
}

#[test]
fn unknown_format_is_rejected() {
	assert!(Cli::try_parse_from(["devsess", "-f", "yaml", "config"]).is_err());
}
