//! Remote automation endpoint abstraction.
//!
//! An [`Endpoint`] is the only thing the orchestration core knows about the
//! automation server. It hands out a [`RemoteHandle`] on session creation and
//! every later call is addressed through that handle.

use std::time::Duration;

use async_trait::async_trait;
use devsess_protocol::{Capabilities, Command};
use serde_json::Value;
use url::Url;

use crate::error::Result;

/// Reference to one live remote session.
///
/// Not `Clone`: the owning session is the only holder, and
/// [`Endpoint::close`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct RemoteHandle {
	session_id: String,
	server: Url,
}

impl RemoteHandle {
	pub fn new(session_id: impl Into<String>, server: Url) -> Self {
		Self {
			session_id: session_id.into(),
			server,
		}
	}

	/// Server-assigned session id.
	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	/// Server the session lives on.
	pub fn server(&self) -> &Url {
		&self.server
	}
}

/// Operations the core needs from a remote automation server.
#[async_trait]
pub trait Endpoint: Send + Sync {
	/// Creates a remote session for `capabilities` on `server`.
	async fn open(&self, server: &Url, capabilities: &Capabilities) -> Result<RemoteHandle>;

	/// Sets the default wait applied to every element lookup in the session.
	async fn set_implicit_wait(&self, handle: &RemoteHandle, wait: Duration) -> Result<()>;

	/// Restores the application under test to its initial state.
	async fn reset(&self, handle: &RemoteHandle) -> Result<()>;

	/// Closes the application and releases the remote session.
	async fn close(&self, handle: RemoteHandle) -> Result<()>;

	/// Sends a raw command within the session and returns its `value`.
	async fn execute(&self, handle: &RemoteHandle, command: &Command) -> Result<Value>;
}
