//! Error types for the automation endpoint runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a remote automation endpoint.
#[derive(Debug, Error)]
pub enum Error {
	/// Endpoint URL could not be parsed or joined.
	#[error("Invalid endpoint URL '{url}': {reason}")]
	InvalidUrl { url: String, reason: String },

	/// Failed to reach the automation server.
	#[error("Failed to reach automation server: {0}")]
	ConnectionFailed(String),

	/// Remote automation server rejected the request.
	#[error("{error}: {message}")]
	Remote {
		/// W3C error code (e.g., "session not created", "invalid session id")
		error: String,
		/// Human-readable error message
		message: String,
		/// HTTP status returned with the error
		status: u16,
	},

	/// Response did not match the wire format.
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// HTTP transport error.
	#[error("HTTP error: {0}")]
	Http(#[source] reqwest::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		if err.is_connect() {
			Error::ConnectionFailed(err.to_string())
		} else {
			Error::Http(err)
		}
	}
}

impl Error {
	/// Returns the W3C error code if this is a Remote error.
	pub fn error_code(&self) -> Option<&str> {
		match self {
			Error::Remote { error, .. } => Some(error),
			_ => None,
		}
	}

	/// Returns true if the request or the remote command timed out.
	pub fn is_timeout(&self) -> bool {
		match self {
			Error::Http(err) => err.is_timeout(),
			Error::Remote { error, .. } => error == "timeout",
			_ => false,
		}
	}

	/// Returns true if the remote session no longer exists.
	pub fn is_session_gone(&self) -> bool {
		matches!(self, Error::Remote { error, .. } if error == "invalid session id")
	}
}
