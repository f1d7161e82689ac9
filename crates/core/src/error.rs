//! Error taxonomy for session orchestration.
//!
//! Only [`ConfigError`] is fatal to a run. [`ConnectionError`] and test-body
//! failures feed the retry decision; [`TeardownError`] and [`ReportingError`]
//! are logged and absorbed.

use std::path::PathBuf;
use std::time::Duration;

use devsess_protocol::Platform;
use thiserror::Error;

use crate::session::SessionState;

/// Invalid, missing or inconsistent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("missing required configuration key '{key}'")]
	Missing { key: &'static str },

	#[error("invalid value '{value}' for configuration key '{key}': {reason}")]
	Invalid {
		key: &'static str,
		value: String,
		reason: String,
	},

	#[error("configuration key '{key}' {problem} when platformName is {platform}")]
	PlatformMismatch {
		key: &'static str,
		platform: Platform,
		problem: &'static str,
	},

	#[error("failed to read configuration file {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Failure to establish a session with the automation server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
	#[error("malformed endpoint '{url}': {reason}")]
	MalformedEndpoint { url: String, reason: String },

	#[error("handshake timed out after {after:?}")]
	HandshakeTimeout { after: Duration },

	#[error("handshake rejected: {reason}")]
	HandshakeRejected { reason: String },
}

/// Failure while resetting or closing a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeardownError {
	#[error("reset failed: {0}")]
	Reset(String),

	#[error("close failed: {0}")]
	Close(String),

	#[error("{phase} timed out after {after:?}")]
	Timeout { phase: &'static str, after: Duration },
}

/// Failure writing a step entry to the report sink.
#[derive(Debug, Error)]
pub enum ReportingError {
	#[error("report sink I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("report entry serialization failed: {0}")]
	Json(#[from] serde_json::Error),

	#[error("report sink rejected entry: {0}")]
	Rejected(String),
}

/// Failure of a command issued through an open session.
#[derive(Debug, Error)]
pub enum SessionError {
	#[error("session is {state}, not active")]
	NotActive { state: SessionState },

	#[error(transparent)]
	Remote(#[from] devsess_runtime::Error),
}

/// Errors that abort a supervised run.
#[derive(Debug, Error)]
pub enum SupervisorError {
	#[error(transparent)]
	Config(#[from] ConfigError),
}
