//! W3C WebDriver / Appium HTTP transport.
//!
//! Maps the [`Endpoint`] operations onto the HTTP routes an Appium server
//! exposes. Every response is a `{"value": ...}` envelope; an `error` key in
//! `value` turns into [`Error::Remote`].


use std::time::Duration;

use async_trait::async_trait;
use devsess_protocol::{Capabilities, Command, HttpMethod, NewSessionRequest, ResponseEnvelope};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::endpoint::{Endpoint, RemoteHandle};
use crate::error::{Error, Result};

/// [`Endpoint`] implementation speaking WebDriver over HTTP.
#[derive(Debug, Clone)]
pub struct WebDriverEndpoint {
	client: reqwest::Client,
}

impl WebDriverEndpoint {
	/// Creates an endpoint with a default HTTP client.
	pub fn new() -> Result<Self> {
		let client = reqwest::Client::builder().build()?;
		Ok(Self { client })
	}

	/// Creates an endpoint whose individual HTTP requests are capped at `timeout`.
	pub fn with_request_timeout(timeout: Duration) -> Result<Self> {
		let client = reqwest::Client::builder().timeout(timeout).build()?;
		Ok(Self { client })
	}

	/// Wraps an existing client.
	pub fn with_client(client: reqwest::Client) -> Self {
		Self { client }
	}

	async fn send(&self, method: HttpMethod, url: Url, body: Option<&Value>) -> Result<ResponseEnvelope> {
		debug!(target = "devsess.runtime", ?method, %url, "sending command");
		let request = match method {
			HttpMethod::Get => self.client.get(url),
			HttpMethod::Delete => self.client.delete(url),
			// W3C requires a JSON body on every POST, even an empty one
			HttpMethod::Post => {
				let empty = json!({});
				self.client.post(url).json(body.unwrap_or(&empty))
			}
		};

		let response = request.send().await?;
		let status = response.status();
		let text = response.text().await?;

		let envelope: ResponseEnvelope = if text.trim().is_empty() {
			ResponseEnvelope::default()
		} else {
			serde_json::from_str(&text).map_err(|e| Error::ProtocolError(format!("malformed response (HTTP {status}): {e}")))?
		};

		if let Some(payload) = envelope.error() {
			return Err(Error::Remote {
				error: payload.error,
				message: payload.message,
				status: status.as_u16(),
			});
		}
		if !status.is_success() {
			return Err(Error::Remote {
				error: "unknown error".to_string(),
				message: text,
				status: status.as_u16(),
			});
		}

		Ok(envelope)
	}
}

#[async_trait]
impl Endpoint for WebDriverEndpoint {
	async fn open(&self, server: &Url, capabilities: &Capabilities) -> Result<RemoteHandle> {
		let body = serde_json::to_value(NewSessionRequest::new(capabilities.clone()))?;
		let envelope = self.send(HttpMethod::Post, join(server, "/session")?, Some(&body)).await?;
		let session_id = envelope
			.new_session_id()
			.ok_or_else(|| Error::ProtocolError("new session response carried no sessionId".to_string()))?;
		debug!(target = "devsess.runtime", %session_id, %server, "remote session created");
		Ok(RemoteHandle::new(session_id, server.clone()))
	}

	async fn set_implicit_wait(&self, handle: &RemoteHandle, wait: Duration) -> Result<()> {
		let body = json!({ "implicit": wait.as_millis() as u64 });
		self.send(HttpMethod::Post, session_url(handle, "/timeouts")?, Some(&body)).await?;
		Ok(())
	}

	async fn reset(&self, handle: &RemoteHandle) -> Result<()> {
		self.send(HttpMethod::Post, session_url(handle, "/appium/app/reset")?, None).await?;
		Ok(())
	}

	async fn close(&self, handle: RemoteHandle) -> Result<()> {
		if let Err(err) = self.send(HttpMethod::Post, session_url(&handle, "/appium/app/close")?, None).await {
			if err.is_session_gone() {
				return Ok(());
			}
			warn!(
				target = "devsess.runtime",
				session_id = handle.session_id(),
				error = %err,
				"closing app failed; deleting session anyway"
			);
		}

		match self.send(HttpMethod::Delete, session_url(&handle, "")?, None).await {
			Ok(_) => Ok(()),
			Err(err) if err.is_session_gone() => Ok(()),
			Err(err) => Err(err),
		}
	}

	async fn execute(&self, handle: &RemoteHandle, command: &Command) -> Result<Value> {
		let envelope = self.send(command.method, session_url(handle, &command.path)?, command.body.as_ref()).await?;
		Ok(envelope.value)
	}
}

/// Appends `suffix` to the server path, keeping any base path such as `/wd/hub`.
fn join(server: &Url, suffix: &str) -> Result<Url> {
	if server.cannot_be_a_base() {
		return Err(Error::InvalidUrl {
			url: server.to_string(),
			reason: "URL cannot be a base".to_string(),
		});
	}
	let mut url = server.clone();
	let base = server.path().trim_end_matches('/');
	url.set_path(&format!("{base}{suffix}"));
	Ok(url)
}

fn session_url(handle: &RemoteHandle, suffix: &str) -> Result<Url> {
	let suffix = if suffix.is_empty() || suffix.starts_with('/') {
		suffix.to_string()
	} else {
		format!("/{suffix}")
	};
	join(handle.server(), &format!("/session/{}{suffix}", handle.session_id()))
}
