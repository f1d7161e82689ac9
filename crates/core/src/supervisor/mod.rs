//! Supervised execution of test methods with retry and guaranteed teardown.
//!
//! Each attempt gets a fresh [`Session`]. The supervisor connects it, runs the
//! [`TestBody`] inside a step scope, and always tears the session down before
//! deciding whether to retry.

mod cancel;
mod outcome;

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use devsess_runtime::Endpoint;
use futures::FutureExt;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

pub use cancel::RunCancellation;
pub use outcome::{AttemptOutcome, AttemptReport, MethodOutcome, MethodReport, RunReport};

use crate::config::{ConfigSource, SessionConfig};
use crate::error::{SessionError, SupervisorError};
use crate::report::{StepScope, with_scope};
use crate::retry::{BoundedRetry, RetryLedger, RetryPolicy, TestMethodId};
use crate::session::Session;

/// Opaque test failure reported by a [`TestBody`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TestFailure {
	message: String,
}

impl TestFailure {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

impl From<SessionError> for TestFailure {
	fn from(err: SessionError) -> Self {
		Self::new(err.to_string())
	}
}

impl From<String> for TestFailure {
	fn from(message: String) -> Self {
		Self::new(message)
	}
}

impl From<&str> for TestFailure {
	fn from(message: &str) -> Self {
		Self::new(message)
	}
}

/// The test logic run against a connected session.
///
/// Called once per attempt with a fresh session. Panics are caught and
/// counted as failures.
#[async_trait]
pub trait TestBody: Send {
	async fn run(&mut self, session: &mut Session) -> Result<(), TestFailure>;
}

/// Per-method supervision state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
	Idle,
	Running,
	AwaitingRetryDecision,
	Done,
}

impl fmt::Display for SupervisorState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SupervisorState::Idle => "idle",
			SupervisorState::Running => "running",
			SupervisorState::AwaitingRetryDecision => "awaiting_retry_decision",
			SupervisorState::Done => "done",
		};
		f.write_str(name)
	}
}

/// Runs test methods against fresh sessions, retrying per policy.
///
/// Shareable across tasks; concurrent methods only touch their own retry
/// record.
pub struct SessionSupervisor {
	config: Arc<SessionConfig>,
	endpoint: Arc<dyn Endpoint>,
	policy: Arc<dyn RetryPolicy>,
	ledger: RetryLedger,
	reports: Mutex<Vec<MethodReport>>,
	cancel: RunCancellation,
}

impl fmt::Debug for SessionSupervisor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionSupervisor")
			.field("platform", &self.config.platform)
			.field("max_retries", &self.config.max_retries)
			.field("methods", &self.ledger.len())
			.field("cancelled", &self.cancel.is_cancelled())
			.finish()
	}
}

impl SessionSupervisor {
	pub fn new(config: Arc<SessionConfig>, endpoint: Arc<dyn Endpoint>) -> Self {
		Self {
			config,
			endpoint,
			policy: Arc::new(BoundedRetry),
			ledger: RetryLedger::new(),
			reports: Mutex::new(Vec::new()),
			cancel: RunCancellation::new(),
		}
	}

	/// Resolves the run's configuration once. Configuration errors are fatal.
	pub fn from_source(source: &dyn ConfigSource, endpoint: Arc<dyn Endpoint>) -> Result<Self, SupervisorError> {
		let config = SessionConfig::resolve(source)?;
		Ok(Self::new(Arc::new(config), endpoint))
	}

	pub fn with_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
		self.policy = policy;
		self
	}

	pub fn with_cancellation(mut self, cancel: RunCancellation) -> Self {
		self.cancel = cancel;
		self
	}

	pub fn config(&self) -> &Arc<SessionConfig> {
		&self.config
	}

	pub fn ledger(&self) -> &RetryLedger {
		&self.ledger
	}

	pub fn cancellation(&self) -> &RunCancellation {
		&self.cancel
	}

	/// Registers a fresh retry record per method. Known ids are left alone.
	pub fn register<I, M>(&self, methods: I)
	where
		I: IntoIterator<Item = M>,
		M: Into<TestMethodId>,
	{
		for method in methods {
			let method = method.into();
			if !self.ledger.register(method.clone(), self.config.max_retries) {
				debug!(target = "devsess.supervisor", method = %method, "already registered");
			}
		}
	}

	/// Runs `method` until it passes, retries run out, or the run is cancelled.
	pub async fn run<B>(&self, method: impl Into<TestMethodId>, body: &mut B) -> MethodReport
	where
		B: TestBody + ?Sized,
	{
		let method = method.into();
		if self.ledger.register(method.clone(), self.config.max_retries) {
			info!(target = "devsess.supervisor", method = %method, "method was not registered; registering now");
		}

		let mut state = SupervisorState::Idle;
		let mut attempts: Vec<AttemptReport> = Vec::new();

		let outcome = loop {
			if self.cancel.is_cancelled() {
				break MethodOutcome::Cancelled;
			}

			advance(&method, &mut state, SupervisorState::Running);
			let index = attempts.len() as u32;
			let scope = StepScope {
				method: method.clone(),
				attempt: index,
			};
			let attempt = with_scope(scope, self.attempt(&method, index, &mut *body)).await;
			let attempt_outcome = attempt.outcome.clone();
			attempts.push(attempt);

			match attempt_outcome {
				AttemptOutcome::Passed => break MethodOutcome::Passed,
				AttemptOutcome::Cancelled => break MethodOutcome::Cancelled,
				AttemptOutcome::Failed { .. } | AttemptOutcome::ConnectionFailed { .. } => {
					advance(&method, &mut state, SupervisorState::AwaitingRetryDecision);
					if self.cancel.is_cancelled() {
						break MethodOutcome::Cancelled;
					}
					if !self.ledger.consume_retry(&method, self.policy.as_ref()) {
						break MethodOutcome::Failed;
					}
					info!(target = "devsess.supervisor", method = %method, next_attempt = index + 1, "retrying with a fresh session");
				}
			}
		};
		advance(&method, &mut state, SupervisorState::Done);

		let attempts_used = self.ledger.get(&method).map_or(0, |r| r.attempts_used);
		let report = MethodReport {
			method,
			outcome,
			attempts_used,
			attempts,
		};
		info!(
			target = "devsess.supervisor",
			method = %report.method,
			outcome = ?report.outcome,
			attempts = report.attempt_count(),
			attempts_used,
			"method finished"
		);
		self.reports.lock().push(report.clone());
		report
	}

	/// Every method finished so far.
	pub fn run_report(&self) -> RunReport {
		RunReport {
			methods: self.reports.lock().clone(),
		}
	}

	async fn attempt<B>(&self, method: &TestMethodId, index: u32, body: &mut B) -> AttemptReport
	where
		B: TestBody + ?Sized,
	{
		let mut session = Session::new(Arc::clone(&self.config), Arc::clone(&self.endpoint));
		let session_id = session.id();
		debug!(target = "devsess.supervisor", method = %method, attempt = index, session = %session_id, "attempt started");

		let outcome = match session.connect().await {
			Err(error) => AttemptOutcome::ConnectionFailed { error },
			Ok(()) if self.cancel.is_cancelled() => AttemptOutcome::Cancelled,
			Ok(()) => {
				tokio::select! {
					biased;
					_ = self.cancel.cancelled() => {
						warn!(target = "devsess.supervisor", method = %method, session = %session_id, "run cancelled; abandoning test body");
						AttemptOutcome::Cancelled
					}
					outcome = run_body(&mut session, body) => outcome,
				}
			}
		};

		let teardown = session.teardown().await;
		let teardown_errors: Vec<String> = teardown.errors().map(ToString::to_string).collect();

		match &outcome {
			AttemptOutcome::Passed => debug!(target = "devsess.supervisor", method = %method, attempt = index, "attempt passed"),
			AttemptOutcome::Cancelled => {}
			AttemptOutcome::Failed { reason } => {
				warn!(target = "devsess.supervisor", method = %method, attempt = index, %reason, "attempt failed")
			}
			AttemptOutcome::ConnectionFailed { error } => {
				warn!(target = "devsess.supervisor", method = %method, attempt = index, %error, "attempt could not connect")
			}
		}

		AttemptReport {
			index,
			session: session_id,
			outcome,
			final_state: session.state(),
			teardown_errors,
		}
	}
}

async fn run_body<B>(session: &mut Session, body: &mut B) -> AttemptOutcome
where
	B: TestBody + ?Sized,
{
	match AssertUnwindSafe(body.run(session)).catch_unwind().await {
		Ok(Ok(())) => AttemptOutcome::Passed,
		Ok(Err(failure)) => AttemptOutcome::Failed {
			reason: failure.message,
		},
		Err(panic) => AttemptOutcome::Failed {
			reason: format!("test body panicked: {}", panic_message(&*panic)),
		},
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(msg) = panic.downcast_ref::<&str>() {
		msg
	} else if let Some(msg) = panic.downcast_ref::<String>() {
		msg
	} else {
		"non-string panic payload"
	}
}

fn advance(method: &TestMethodId, state: &mut SupervisorState, next: SupervisorState) {
	trace!(target = "devsess.supervisor", method = %method, from = %state, to = %next, "state change");
	*state = next;
}
