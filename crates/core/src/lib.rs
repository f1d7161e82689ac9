//! devsess: supervised remote device test sessions.
//!
//! A run resolves one [`SessionConfig`] and hands it to a [`SessionSupervisor`].
//! For every attempt of a test method the supervisor opens a fresh
//! [`Session`], runs the [`TestBody`], always tears the session down, and
//! consults the [`RetryPolicy`] when the attempt failed. Test bodies annotate
//! their progress through a [`StepReporter`], which attributes each step to
//! the running attempt.
//!
//! # Examples
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use devsess::{EnvSource, Session, SessionSupervisor, TestBody, TestFailure};
//! use devsess_protocol::Command;
//! use devsess_runtime::WebDriverEndpoint;
//!
//! struct OpensHome;
//!
//! #[async_trait::async_trait]
//! impl TestBody for OpensHome {
//!     async fn run(&mut self, session: &mut Session) -> Result<(), TestFailure> {
//!         session.execute(Command::get("/source")).await?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let endpoint = Arc::new(WebDriverEndpoint::new()?);
//!     let supervisor = SessionSupervisor::from_source(&EnvSource::default(), endpoint)?;
//!     supervisor.register(["opens_home"]);
//!
//!     let report = supervisor.run("opens_home", &mut OpensHome).await;
//!     println!("{:?} after {} attempt(s)", report.outcome, report.attempt_count());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod report;
pub mod retry;
pub mod session;
pub mod supervisor;
pub mod testing;

pub use config::{
	AndroidApp, ConfigSource, EnvSource, LayeredSource, MapSource, PropertiesSource, SessionConfig,
};
pub use error::{
	ConfigError, ConnectionError, ReportingError, SessionError, SupervisorError, TeardownError,
};
pub use report::{JsonlSink, MemorySink, ReportSink, StepEntry, StepReporter, StepScope, current_scope};
pub use retry::{BoundedRetry, RetryLedger, RetryPolicy, RetryRecord, TestMethodId};
pub use session::{Session, SessionId, SessionState, TeardownReport};
pub use supervisor::{
	AttemptOutcome, AttemptReport, MethodOutcome, MethodReport, RunCancellation, RunReport, SessionSupervisor,
	SupervisorState, TestBody, TestFailure,
};
