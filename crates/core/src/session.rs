//! One exclusive connection to a remote automation endpoint.
//!
//! A [`Session`] lives for exactly one attempt. It owns the [`RemoteHandle`];
//! test bodies reach the device only through [`Session::execute`]. Teardown
//! is tolerant: `reset` and `close` are no-ops unless a live handle exists,
//! and a session dropped while still connected closes itself in the
//! background.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use devsess_protocol::Command;
use devsess_runtime::{Endpoint, RemoteHandle};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SessionConfig;
use crate::error::{ConnectionError, SessionError, TeardownError};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique ordinal identifying a local session object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(u64);

impl SessionId {
	fn next() -> Self {
		Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session-{}", self.0)
	}
}

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	Uninitialized,
	Connecting,
	Active,
	TearingDown,
	Closed,
	Failed,
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SessionState::Uninitialized => "uninitialized",
			SessionState::Connecting => "connecting",
			SessionState::Active => "active",
			SessionState::TearingDown => "tearing down",
			SessionState::Closed => "closed",
			SessionState::Failed => "failed",
		};
		f.write_str(name)
	}
}

/// Errors collected by [`Session::teardown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
	pub reset: Option<TeardownError>,
	pub close: Option<TeardownError>,
}

impl TeardownReport {
	pub fn is_clean(&self) -> bool {
		self.reset.is_none() && self.close.is_none()
	}

	pub fn errors(&self) -> impl Iterator<Item = &TeardownError> {
		self.reset.iter().chain(self.close.iter())
	}
}

/// A single remote device session.
pub struct Session {
	id: SessionId,
	state: SessionState,
	handle: Option<RemoteHandle>,
	config: Arc<SessionConfig>,
	endpoint: Arc<dyn Endpoint>,
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("state", &self.state)
			.field("remote_session", &self.remote_session_id())
			.finish()
	}
}

impl Session {
	/// Creates an unconnected session.
	pub fn new(config: Arc<SessionConfig>, endpoint: Arc<dyn Endpoint>) -> Self {
		Self {
			id: SessionId::next(),
			state: SessionState::Uninitialized,
			handle: None,
			config,
			endpoint,
		}
	}

	/// Creates and connects a session in one step.
	pub async fn open(config: Arc<SessionConfig>, endpoint: Arc<dyn Endpoint>) -> Result<Self, ConnectionError> {
		let mut session = Self::new(config, endpoint);
		session.connect().await?;
		Ok(session)
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn is_active(&self) -> bool {
		self.state == SessionState::Active
	}

	/// Server-assigned id of the remote session, while one is held.
	pub fn remote_session_id(&self) -> Option<&str> {
		self.handle.as_ref().map(RemoteHandle::session_id)
	}

	/// Performs the remote handshake and applies the implicit wait.
	///
	/// Never retried here; retry is the supervisor's decision.
	pub async fn connect(&mut self) -> Result<(), ConnectionError> {
		if self.state != SessionState::Uninitialized {
			return Err(ConnectionError::HandshakeRejected {
				reason: format!("{} is {}, sessions are never reused", self.id, self.state),
			});
		}

		self.state = SessionState::Connecting;
		debug!(target = "devsess.session", session = %self.id, server = %self.config.server_url, "connecting");

		match self.handshake().await {
			Ok(handle) => {
				info!(
					target = "devsess.session",
					session = %self.id,
					remote = handle.session_id(),
					platform = %self.config.platform,
					device = %self.config.device_name,
					"session active"
				);
				self.handle = Some(handle);
				self.state = SessionState::Active;
				Ok(())
			}
			Err(err) => {
				warn!(target = "devsess.session", session = %self.id, error = %err, "handshake failed");
				self.state = SessionState::Failed;
				Err(err)
			}
		}
	}

	async fn handshake(&self) -> Result<RemoteHandle, ConnectionError> {
		let server = parse_endpoint(&self.config.server_url)?;
		let capabilities = self.config.capabilities();
		let limit = self.config.handshake_timeout;

		let handle = match tokio::time::timeout(limit, self.endpoint.open(&server, &capabilities)).await {
			Err(_) => return Err(ConnectionError::HandshakeTimeout { after: limit }),
			Ok(Err(err)) if err.is_timeout() => return Err(ConnectionError::HandshakeTimeout { after: limit }),
			Ok(Err(err)) => return Err(ConnectionError::HandshakeRejected { reason: err.to_string() }),
			Ok(Ok(handle)) => handle,
		};

		let applied = tokio::time::timeout(limit, self.endpoint.set_implicit_wait(&handle, self.config.implicit_wait)).await;
		let reason = match applied {
			Ok(Ok(())) => return Ok(handle),
			Ok(Err(err)) => err.to_string(),
			Err(_) => format!("timed out after {limit:?}"),
		};

		// Handshake succeeded remotely; release it before reporting failure.
		if let Err(err) = self.close_handle(handle).await {
			warn!(target = "devsess.session", session = %self.id, error = %err, "failed to release half-open session");
		}
		Err(ConnectionError::HandshakeRejected {
			reason: format!("failed to apply implicit wait: {reason}"),
		})
	}

	/// Restores the application under test to its initial state.
	///
	/// No-op unless the session is active.
	pub async fn reset(&mut self) -> Result<(), TeardownError> {
		let Some(handle) = self.handle.as_ref().filter(|_| self.state == SessionState::Active) else {
			debug!(target = "devsess.session", session = %self.id, state = %self.state, "reset skipped");
			return Ok(());
		};

		let limit = self.config.teardown_timeout;
		match tokio::time::timeout(limit, self.endpoint.reset(handle)).await {
			Ok(Ok(())) => Ok(()),
			Ok(Err(err)) => Err(TeardownError::Reset(err.to_string())),
			Err(_) => Err(TeardownError::Timeout { phase: "reset", after: limit }),
		}
	}

	/// Releases the remote session and application process.
	///
	/// Idempotent. Without a live handle nothing is sent and the state is
	/// left as is.
	pub async fn close(&mut self) -> Result<(), TeardownError> {
		let Some(handle) = self.handle.take() else {
			return Ok(());
		};

		self.state = SessionState::TearingDown;
		let result = self.close_handle(handle).await;
		self.state = SessionState::Closed;
		debug!(target = "devsess.session", session = %self.id, ok = result.is_ok(), "session closed");
		result
	}

	async fn close_handle(&self, handle: RemoteHandle) -> Result<(), TeardownError> {
		let limit = self.config.teardown_timeout;
		match tokio::time::timeout(limit, self.endpoint.close(handle)).await {
			Ok(Ok(())) => Ok(()),
			Ok(Err(err)) => Err(TeardownError::Close(err.to_string())),
			Err(_) => Err(TeardownError::Timeout { phase: "close", after: limit }),
		}
	}

	/// Resets then closes; close runs even if reset fails. Never errors.
	pub async fn teardown(&mut self) -> TeardownReport {
		let mut report = TeardownReport::default();

		if let Err(err) = self.reset().await {
			warn!(target = "devsess.session", session = %self.id, error = %err, "reset failed during teardown");
			report.reset = Some(err);
		}
		if let Err(err) = self.close().await {
			warn!(target = "devsess.session", session = %self.id, error = %err, "close failed during teardown");
			report.close = Some(err);
		}

		report
	}

	/// Sends a raw protocol command through this session.
	pub async fn execute(&mut self, command: Command) -> Result<Value, SessionError> {
		let Some(handle) = self.handle.as_ref().filter(|_| self.state == SessionState::Active) else {
			return Err(SessionError::NotActive { state: self.state });
		};
		Ok(self.endpoint.execute(handle, &command).await?)
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		let Some(handle) = self.handle.take() else {
			return;
		};

		let id = self.id;
		let endpoint = Arc::clone(&self.endpoint);
		let limit = self.config.teardown_timeout;

		match tokio::runtime::Handle::try_current() {
			Ok(runtime) => {
				warn!(target = "devsess.session", session = %id, "session dropped while open; closing in background");
				runtime.spawn(async move {
					match tokio::time::timeout(limit, endpoint.close(handle)).await {
						Ok(Ok(())) => debug!(target = "devsess.session", session = %id, "background close finished"),
						Ok(Err(err)) => warn!(target = "devsess.session", session = %id, error = %err, "background close failed"),
						Err(_) => warn!(target = "devsess.session", session = %id, ?limit, "background close timed out"),
					}
				});
			}
			Err(_) => {
				warn!(
					target = "devsess.session",
					session = %id,
					remote = handle.session_id(),
					"session dropped outside a runtime; remote session leaked"
				);
			}
		}
	}
}

fn parse_endpoint(raw: &str) -> Result<Url, ConnectionError> {
	let malformed = |reason: String| ConnectionError::MalformedEndpoint {
		url: raw.to_string(),
		reason,
	};
	let url = Url::parse(raw).map_err(|e| malformed(e.to_string()))?;
	match url.scheme() {
		"http" | "https" => {}
		other => return Err(malformed(format!("unsupported scheme '{other}'"))),
	}
	if url.host_str().is_none() {
		return Err(malformed("missing host".to_string()));
	}
	Ok(url)
}
