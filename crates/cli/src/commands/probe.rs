use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use devsess::config::keys;
use devsess::{
	JsonlSink, LayeredSource, MapSource, MemorySink, MethodOutcome, ReportSink, RunReport, Session, SessionSupervisor,
	StepReporter, TestBody, TestFailure,
};
use devsess_protocol::Command;
use devsess_runtime::{Endpoint, WebDriverEndpoint};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::cli::ProbeArgs;
use crate::output::{self, CommandFailure, ErrorCode, OutputFormat, Render, ResultBuilder};

/// Method id the probe runs under.
pub const PROBE_METHOD: &str = "probe";

/// Checks that a fresh session is usable: the server reports the configured
/// implicit wait and, optionally, serves the page source.
pub struct ProbeBody {
	reporter: StepReporter,
	fetch_source: bool,
}

impl ProbeBody {
	pub fn new(reporter: StepReporter, fetch_source: bool) -> Self {
		Self { reporter, fetch_source }
	}
}

#[async_trait]
impl TestBody for ProbeBody {
	async fn run(&mut self, session: &mut Session) -> Result<(), TestFailure> {
		let remote = session.remote_session_id().unwrap_or_default().to_string();
		self.reporter
			.record("session opened", format!("{remote} on {}", session.config().device_name));

		let expected = session.config().implicit_wait.as_millis() as u64;
		let timeouts = session.execute(Command::get("/timeouts")).await?;
		match timeouts.get("implicit").and_then(Value::as_u64) {
			Some(ms) if ms == expected => self.reporter.record("implicit wait verified", format!("{ms}ms")),
			Some(ms) => {
				return Err(TestFailure::new(format!("implicit wait is {ms}ms, expected {expected}ms")));
			}
			None => return Err(TestFailure::new(format!("server reported no implicit wait: {timeouts}"))),
		}

		if self.fetch_source {
			let source = session.execute(Command::get("/source")).await?;
			let len = source.as_str().map_or(0, str::len);
			self.reporter.record("page source fetched", format!("{len} bytes"));
		}
		Ok(())
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeData {
	pub report: RunReport,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub steps: Option<PathBuf>,
}

impl Render for ProbeData {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		self.report.render(out)?;
		if let Some(path) = &self.steps {
			writeln!(out, "{} {}", "steps:".cyan(), path.display())?;
		}
		Ok(())
	}
}

pub async fn run(source: LayeredSource, args: ProbeArgs, format: OutputFormat) -> Result<()> {
	let endpoint = Arc::new(WebDriverEndpoint::new()?);
	run_with_endpoint(source, args, format, endpoint).await
}

/// Runs the probe against `endpoint`; separate from [`run`] so tests can
/// substitute the transport.
pub async fn run_with_endpoint(
	source: LayeredSource,
	args: ProbeArgs,
	format: OutputFormat,
	endpoint: Arc<dyn Endpoint>,
) -> Result<()> {
	let builder = ResultBuilder::new("probe");

	let mut layers = LayeredSource::new();
	if let Some(retries) = args.retries {
		layers = layers.push(MapSource::new().with(keys::MAX_RETRIES, retries.to_string()));
	}
	let source = layers.push(source);

	let supervisor = Arc::new(SessionSupervisor::from_source(&source, endpoint)?);
	let sink: Arc<dyn ReportSink> = match &args.steps {
		Some(path) => Arc::new(JsonlSink::create(path)?),
		None => MemorySink::new(),
	};
	let mut body = ProbeBody::new(StepReporter::new(sink), args.source);

	let interrupt = {
		let cancel = supervisor.cancellation().clone();
		tokio::spawn(async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				warn!(target = "devsess.cli", "interrupted; closing the session");
				cancel.cancel();
			}
		})
	};

	supervisor.register([PROBE_METHOD]);
	let method = supervisor.run(PROBE_METHOD, &mut body).await;
	interrupt.abort();

	let data = ProbeData {
		report: supervisor.run_report(),
		steps: args.steps,
	};
	let failure = match method.outcome {
		MethodOutcome::Passed => None,
		MethodOutcome::Failed => Some(CommandFailure::new(
			ErrorCode::ProbeFailed,
			format!("probe failed after {} attempt(s)", method.attempt_count()),
		)),
		MethodOutcome::Cancelled => Some(CommandFailure::new(ErrorCode::Cancelled, "probe cancelled")),
	};

	let mut builder = builder.data(data);
	if let Some(failure) = &failure {
		builder = builder.error(output::CommandError {
			code: failure.code,
			message: failure.message.clone(),
		});
	}
	output::print_result(&builder.build(), format);

	match failure {
		None => Ok(()),
		Some(failure) => Err(failure.already_printed().into()),
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use devsess::testing::{FakeEndpoint, android_config};
	use devsess_protocol::Capabilities;
	use devsess_runtime::RemoteHandle;
	use serde_json::json;
	use url::Url;

	use super::*;

	/// Fake endpoint whose `/timeouts` reports a fixed implicit wait.
	struct TimeoutsEndpoint {
		inner: Arc<FakeEndpoint>,
		implicit_ms: u64,
	}

	#[async_trait]
	impl Endpoint for TimeoutsEndpoint {
		async fn open(&self, server: &Url, capabilities: &Capabilities) -> devsess_runtime::Result<RemoteHandle> {
			self.inner.open(server, capabilities).await
		}

		async fn set_implicit_wait(&self, handle: &RemoteHandle, wait: Duration) -> devsess_runtime::Result<()> {
			self.inner.set_implicit_wait(handle, wait).await
		}

		async fn reset(&self, handle: &RemoteHandle) -> devsess_runtime::Result<()> {
			self.inner.reset(handle).await
		}

		async fn close(&self, handle: RemoteHandle) -> devsess_runtime::Result<()> {
			self.inner.close(handle).await
		}

		async fn execute(&self, _handle: &RemoteHandle, command: &Command) -> devsess_runtime::Result<Value> {
			match command.path.as_str() {
				"/timeouts" => Ok(json!({ "implicit": self.implicit_ms, "pageLoad": 300000, "script": 30000 })),
				"/source" => Ok(json!("<hierarchy/>")),
				other => Ok(json!({ "path": other })),
			}
		}
	}

	fn source(max_retries: u32) -> LayeredSource {
		let config = android_config(max_retries);
		let android = config.android.clone().unwrap();
		LayeredSource::new().push(
			MapSource::new()
				.with(keys::PLATFORM_NAME, config.platform.as_str())
				.with(keys::DEVICE_NAME, config.device_name)
				.with(keys::APP_PATH, config.app_path)
				.with(keys::APP_PACKAGE, android.app_package)
				.with(keys::APP_ACTIVITY, android.app_activity)
				.with(keys::URL, config.server_url)
				.with(keys::IMPLICIT_TIMEOUT, config.implicit_wait.as_secs().to_string())
				.with(keys::MAX_RETRIES, max_retries.to_string()),
		)
	}

	#[tokio::test]
	async fn probe_passes_when_implicit_wait_matches() {
		let fake = FakeEndpoint::new();
		let endpoint = Arc::new(TimeoutsEndpoint {
			inner: fake.clone(),
			implicit_ms: 10_000,
		});
		let dir = tempfile::tempdir().unwrap();
		let steps = dir.path().join("steps.jsonl");
		let args = ProbeArgs {
			steps: Some(steps.clone()),
			source: true,
			retries: None,
		};

		run_with_endpoint(source(0), args, OutputFormat::Json, endpoint).await.unwrap();

		assert_eq!((fake.opened(), fake.closed()), (1, 1));
		let lines = std::fs::read_to_string(steps).unwrap();
		let summaries: Vec<String> = lines
			.lines()
			.map(|l| serde_json::from_str::<Value>(l).unwrap()["summary"].as_str().unwrap().to_string())
			.collect();
		assert_eq!(summaries, vec!["session opened", "implicit wait verified", "page source fetched"]);
	}

	#[tokio::test]
	async fn probe_fails_and_retries_on_wrong_implicit_wait() {
		let fake = FakeEndpoint::new();
		let endpoint = Arc::new(TimeoutsEndpoint {
			inner: fake.clone(),
			implicit_ms: 0,
		});
		let args = ProbeArgs {
			retries: Some(1),
			..ProbeArgs::default()
		};

		let err = run_with_endpoint(source(5), args, OutputFormat::Json, endpoint).await.unwrap_err();

		let failure = err.downcast_ref::<CommandFailure>().unwrap();
		assert_eq!(failure.code, ErrorCode::ProbeFailed);
		assert!(failure.printed);
		assert!(failure.message.contains("2 attempt(s)"), "{}", failure.message);
		assert_eq!((fake.opened(), fake.closed()), (2, 2));
	}

	#[tokio::test]
	async fn config_errors_surface_before_any_session() {
		let fake = FakeEndpoint::new();
		let source = LayeredSource::new().push(MapSource::new().with(keys::PLATFORM_NAME, "Android"));

		let err = run_with_endpoint(source, ProbeArgs::default(), OutputFormat::Text, fake.clone())
			.await
			.unwrap_err();

		assert_eq!(output::classify(&err).code, ErrorCode::ConfigError);
		assert_eq!(fake.open_calls(), 0);
	}
}
