//! Structured output envelope for CLI commands.
//!
//! JSON output wraps every result in the same envelope:
//!
//! ```json
//! {
//!   "ok": true,
//!   "command": "probe",
//!   "data": { ... },
//!   "timings": { "durationMs": 1234 }
//! }
//! ```
//!
//! Text output renders the same data for a terminal.


use std::io::{self, Write};
use std::time::{Duration, Instant};

use colored::Colorize;
use devsess::{
	AttemptOutcome, ConfigError, MethodOutcome, MethodReport, ReportingError, RunReport, SessionConfig,
	SupervisorError,
};
use serde::Serialize;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON envelope
	Json,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

/// Result envelope printed by every command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Configuration missing, invalid or inconsistent
	ConfigError,
	/// The probe did not pass
	ProbeFailed,
	/// The run was cancelled
	Cancelled,
	/// File I/O error
	IoError,
	/// Unknown/internal error
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::ConfigError => write!(f, "CONFIG_ERROR"),
			ErrorCode::ProbeFailed => write!(f, "PROBE_FAILED"),
			ErrorCode::Cancelled => write!(f, "CANCELLED"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

/// Failure raised by a command, classified for the output envelope.
#[derive(Debug)]
pub struct CommandFailure {
	pub code: ErrorCode,
	pub message: String,
	/// The command already printed its own envelope.
	pub printed: bool,
}

impl std::fmt::Display for CommandFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.message)
	}
}

impl std::error::Error for CommandFailure {}

impl CommandFailure {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			printed: false,
		}
	}

	pub fn already_printed(mut self) -> Self {
		self.printed = true;
		self
	}
}

/// True when the error's envelope is already on stdout.
pub fn is_output_already_printed(err: &anyhow::Error) -> bool {
	err.downcast_ref::<CommandFailure>().is_some_and(|f| f.printed)
}

/// Maps an error from any command onto an envelope error.
pub fn classify(err: &anyhow::Error) -> CommandError {
	let code = if let Some(failure) = err.downcast_ref::<CommandFailure>() {
		failure.code
	} else if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<SupervisorError>().is_some() {
		ErrorCode::ConfigError
	} else if err.downcast_ref::<ReportingError>().is_some() || err.downcast_ref::<io::Error>().is_some() {
		ErrorCode::IoError
	} else {
		ErrorCode::InternalError
	};
	CommandError {
		code,
		message: format!("{err:#}"),
	}
}

/// Builder for [`CommandResult`] that times the command from creation.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
		}
	}
}

/// Something the text formatter knows how to render.
pub trait Render {
	fn render(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Print a command result to stdout in the specified format.
pub fn print_result<T: Serialize + Render>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => {
			let mut stdout = io::stdout().lock();
			let _ = write_text(result, &mut stdout);
		}
	}
}

fn write_text<T: Render + Serialize>(result: &CommandResult<T>, out: &mut dyn Write) -> io::Result<()> {
	if let Some(data) = &result.data {
		data.render(out)?;
	}
	if let Some(error) = &result.error {
		writeln!(out, "{} [{}]: {}", "Error".red().bold(), error.code, error.message)?;
	}
	if let Some(timings) = &result.timings {
		writeln!(out, "{}", format!("Completed in {}ms", timings.duration_ms).dimmed())?;
	}
	Ok(())
}

fn row(out: &mut dyn Write, key: &str, value: impl std::fmt::Display) -> io::Result<()> {
	writeln!(out, "{} {value}", format!("{key:<20}").cyan())
}

/// Print an error to stderr in human-readable format.
pub fn print_error_stderr(error: &CommandError) {
	eprintln!("{} [{}]: {}", "Error".red().bold(), error.code, error.message);
}

impl Render for () {
	fn render(&self, _out: &mut dyn Write) -> io::Result<()> {
		Ok(())
	}
}

impl Render for SessionConfig {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		row(out, "platform", &self.platform)?;
		row(out, "device", &self.device_name)?;
		if let Some(udid) = &self.device_udid {
			row(out, "udid", udid)?;
		}
		row(out, "app", &self.app_path)?;
		if let Some(android) = &self.android {
			row(out, "app package", &android.app_package)?;
			row(out, "app activity", &android.app_activity)?;
		}
		row(out, "server", &self.server_url)?;
		row(out, "implicit wait", &format!("{}s", self.implicit_wait.as_secs()))?;
		row(out, "max retries", &self.max_retries)?;
		row(out, "handshake timeout", &format!("{}s", self.handshake_timeout.as_secs()))?;
		row(out, "teardown timeout", &format!("{}s", self.teardown_timeout.as_secs()))?;
		Ok(())
	}
}

impl Render for MethodReport {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		let outcome = match self.outcome {
			MethodOutcome::Passed => "passed".green().bold(),
			MethodOutcome::Failed => "failed".red().bold(),
			MethodOutcome::Cancelled => "cancelled".yellow().bold(),
		};
		writeln!(
			out,
			"{} {outcome} after {} attempt(s), {} retr{} used",
			self.method.as_str().bold(),
			self.attempt_count(),
			self.attempts_used,
			if self.attempts_used == 1 { "y" } else { "ies" }
		)?;
		for attempt in &self.attempts {
			let detail = match &attempt.outcome {
				AttemptOutcome::Passed => "passed".green().to_string(),
				AttemptOutcome::Failed { reason } => format!("{} {reason}", "failed:".red()),
				AttemptOutcome::ConnectionFailed { error } => format!("{} {error}", "no connection:".red()),
				AttemptOutcome::Cancelled => "cancelled".yellow().to_string(),
			};
			writeln!(out, "  #{} {} {detail}", attempt.index, attempt.session.to_string().dimmed())?;
			for error in &attempt.teardown_errors {
				writeln!(out, "     {} {error}", "teardown:".yellow())?;
			}
		}
		Ok(())
	}
}

impl Render for RunReport {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		for method in &self.methods {
			method.render(out)?;
		}
		writeln!(
			out,
			"{} passed, {} failed, {} cancelled",
			self.passed(),
			self.failed(),
			self.cancelled()
		)
	}
}
