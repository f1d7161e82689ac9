//! In-memory endpoint and config fixtures for exercising sessions and
//! supervisors without an automation server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devsess_protocol::{Capabilities, Command, Platform};
use devsess_runtime::{Endpoint, Error, RemoteHandle, Result};
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::Url;

use crate::config::{AndroidApp, SessionConfig};

#[derive(Default)]
struct FakeState {
	open_calls: usize,
	opened: usize,
	resets: usize,
	closes: HashMap<String, u32>,
	implicit_waits: Vec<Duration>,
	capabilities: Vec<Capabilities>,
	failing_opens: usize,
	open_delay: Option<Duration>,
	fail_implicit_wait: bool,
	fail_resets: bool,
	fail_closes: bool,
}

/// Scriptable [`Endpoint`] that records every call.
#[derive(Default)]
pub struct FakeEndpoint {
	state: Mutex<FakeState>,
}

impl FakeEndpoint {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Makes the next `count` opens fail with a rejected handshake.
	pub fn fail_next_opens(&self, count: usize) {
		self.state.lock().failing_opens = count;
	}

	pub fn set_open_delay(&self, delay: Duration) {
		self.state.lock().open_delay = Some(delay);
	}

	pub fn fail_implicit_wait(&self, fail: bool) {
		self.state.lock().fail_implicit_wait = fail;
	}

	pub fn fail_resets(&self, fail: bool) {
		self.state.lock().fail_resets = fail;
	}

	pub fn fail_closes(&self, fail: bool) {
		self.state.lock().fail_closes = fail;
	}

	/// Number of open attempts that reached the endpoint.
	pub fn open_calls(&self) -> usize {
		self.state.lock().open_calls
	}

	/// Number of remote sessions successfully created.
	pub fn opened(&self) -> usize {
		self.state.lock().opened
	}

	pub fn resets(&self) -> usize {
		self.state.lock().resets
	}

	/// Total close calls across all remote sessions.
	pub fn closed(&self) -> usize {
		self.state.lock().closes.values().map(|n| *n as usize).sum()
	}

	/// Close calls per remote session id.
	pub fn close_counts(&self) -> HashMap<String, u32> {
		self.state.lock().closes.clone()
	}

	pub fn implicit_waits(&self) -> Vec<Duration> {
		self.state.lock().implicit_waits.clone()
	}

	pub fn capabilities(&self) -> Vec<Capabilities> {
		self.state.lock().capabilities.clone()
	}

	/// Polls until at least `count` closes were recorded.
	pub async fn wait_for_closes(&self, count: usize) {
		for _ in 0..500 {
			if self.closed() >= count {
				return;
			}
			tokio::time::sleep(Duration::from_millis(2)).await;
		}
		panic!("expected {count} closes, saw {}", self.closed());
	}
}

#[async_trait]
impl Endpoint for FakeEndpoint {
	async fn open(&self, server: &Url, capabilities: &Capabilities) -> Result<RemoteHandle> {
		let delay = {
			let mut state = self.state.lock();
			state.open_calls += 1;
			state.capabilities.push(capabilities.clone());
			state.open_delay
		};
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		let mut state = self.state.lock();
		if state.failing_opens > 0 {
			state.failing_opens -= 1;
			return Err(Error::Remote {
				error: "session not created".to_string(),
				message: "device unavailable".to_string(),
				status: 500,
			});
		}
		state.opened += 1;
		let id = format!("fake-{}", state.opened);
		state.closes.insert(id.clone(), 0);
		Ok(RemoteHandle::new(id, server.clone()))
	}

	async fn set_implicit_wait(&self, _handle: &RemoteHandle, wait: Duration) -> Result<()> {
		let mut state = self.state.lock();
		if state.fail_implicit_wait {
			return Err(Error::ProtocolError("timeouts rejected".to_string()));
		}
		state.implicit_waits.push(wait);
		Ok(())
	}

	async fn reset(&self, _handle: &RemoteHandle) -> Result<()> {
		let mut state = self.state.lock();
		state.resets += 1;
		if state.fail_resets {
			return Err(Error::ProtocolError("reset rejected".to_string()));
		}
		Ok(())
	}

	async fn close(&self, handle: RemoteHandle) -> Result<()> {
		let mut state = self.state.lock();
		*state.closes.entry(handle.session_id().to_string()).or_default() += 1;
		if state.fail_closes {
			return Err(Error::ProtocolError("close rejected".to_string()));
		}
		Ok(())
	}

	async fn execute(&self, handle: &RemoteHandle, command: &Command) -> Result<Value> {
		Ok(json!({ "session": handle.session_id(), "path": command.path }))
	}
}

/// Android configuration pointing at a local server.
pub fn android_config(max_retries: u32) -> SessionConfig {
	SessionConfig {
		platform: Platform::Android,
		device_name: "emulator-5554".to_string(),
		device_udid: None,
		app_path: "/apps/cat.apk".to_string(),
		android: Some(AndroidApp {
			app_package: "com.cat.app".to_string(),
			app_activity: ".MainActivity".to_string(),
		}),
		server_url: "http://127.0.0.1:4723/wd/hub".to_string(),
		implicit_wait: Duration::from_secs(10),
		max_retries,
		handshake_timeout: Duration::from_secs(30),
		teardown_timeout: Duration::from_secs(10),
	}
}

/// iOS configuration pointing at a local server.
pub fn ios_config(max_retries: u32) -> SessionConfig {
	SessionConfig {
		platform: Platform::Ios,
		device_name: "iPhone 15".to_string(),
		device_udid: Some("00008110-000A".to_string()),
		app_path: "/apps/cat.app".to_string(),
		android: None,
		server_url: "http://127.0.0.1:4723".to_string(),
		implicit_wait: Duration::from_secs(5),
		max_retries,
		handshake_timeout: Duration::from_secs(30),
		teardown_timeout: Duration::from_secs(10),
	}
}
