//! Session configuration resolution.
//!
//! Resolves the immutable per-run [`SessionConfig`] from a [`ConfigSource`].
//! Platform-conditional fields are validated here, before any connection is
//! attempted.

pub mod source;

use std::time::Duration;

use devsess_protocol::{Capabilities, Platform};
use serde::{Serialize, Serializer};
use tracing::debug;

pub use source::{ConfigSource, DEFAULT_ENV_PREFIX, EnvSource, LayeredSource, MapSource, PropertiesSource};

use crate::error::ConfigError;

/// Configuration keys understood by [`SessionConfig::resolve`].
pub mod keys {
	pub const PLATFORM_NAME: &str = "platformName";
	pub const DEVICE_NAME: &str = "deviceName";
	pub const APP_PATH: &str = "appAbsolutePath";
	pub const DEVICE_UDID: &str = "deviceUDID";
	pub const APP_PACKAGE: &str = "appPackage";
	pub const APP_ACTIVITY: &str = "appActivity";
	pub const URL: &str = "url";
	pub const IMPLICIT_TIMEOUT: &str = "implicitTimeoutSeconds";
	pub const MAX_RETRIES: &str = "maxRetries";
	pub const HANDSHAKE_TIMEOUT: &str = "handshakeTimeoutSeconds";
	pub const TEARDOWN_TIMEOUT: &str = "teardownTimeoutSeconds";
}

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Android application identity; present iff the platform is Android.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidApp {
	pub app_package: String,
	pub app_activity: String,
}

/// Immutable per-run session parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
	pub platform: Platform,
	pub device_name: String,
	pub device_udid: Option<String>,
	pub app_path: String,
	pub android: Option<AndroidApp>,
	/// Automation server endpoint, validated when a session connects.
	pub server_url: String,
	#[serde(serialize_with = "serialize_secs")]
	pub implicit_wait: Duration,
	pub max_retries: u32,
	#[serde(serialize_with = "serialize_secs")]
	pub handshake_timeout: Duration,
	#[serde(serialize_with = "serialize_secs")]
	pub teardown_timeout: Duration,
}

impl SessionConfig {
	/// Reads and validates every key from `source`.
	pub fn resolve(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
		let platform_raw = required(source, keys::PLATFORM_NAME)?;
		let platform: Platform = platform_raw.parse().map_err(|reason| ConfigError::Invalid {
			key: keys::PLATFORM_NAME,
			value: platform_raw.clone(),
			reason,
		})?;

		let app_package = optional(source, keys::APP_PACKAGE);
		let app_activity = optional(source, keys::APP_ACTIVITY);
		let android = match platform {
			Platform::Android => {
				let app_package = app_package.ok_or(ConfigError::PlatformMismatch {
					key: keys::APP_PACKAGE,
					platform,
					problem: "is required",
				})?;
				let app_activity = app_activity.ok_or(ConfigError::PlatformMismatch {
					key: keys::APP_ACTIVITY,
					platform,
					problem: "is required",
				})?;
				Some(AndroidApp { app_package, app_activity })
			}
			Platform::Ios => {
				let present = if app_package.is_some() {
					Some(keys::APP_PACKAGE)
				} else if app_activity.is_some() {
					Some(keys::APP_ACTIVITY)
				} else {
					None
				};
				if let Some(key) = present {
					return Err(ConfigError::PlatformMismatch {
						key,
						platform,
						problem: "must not be set",
					});
				}
				None
			}
		};

		let config = Self {
			platform,
			device_name: required(source, keys::DEVICE_NAME)?,
			device_udid: optional(source, keys::DEVICE_UDID),
			app_path: required(source, keys::APP_PATH)?,
			android,
			server_url: required(source, keys::URL)?,
			implicit_wait: Duration::from_secs(parse_u64(keys::IMPLICIT_TIMEOUT, &required(source, keys::IMPLICIT_TIMEOUT)?)?),
			max_retries: parse_u32(keys::MAX_RETRIES, &required(source, keys::MAX_RETRIES)?)?,
			handshake_timeout: optional_secs(source, keys::HANDSHAKE_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT)?,
			teardown_timeout: optional_secs(source, keys::TEARDOWN_TIMEOUT, DEFAULT_TEARDOWN_TIMEOUT)?,
		};

		debug!(
			target = "devsess.config",
			source = %source.describe(),
			platform = %config.platform,
			device = %config.device_name,
			max_retries = config.max_retries,
			"resolved session config"
		);
		Ok(config)
	}

	/// Capability set for this configuration's platform.
	pub fn capabilities(&self) -> Capabilities {
		Capabilities {
			platform_name: self.platform,
			device_name: self.device_name.clone(),
			app: self.app_path.clone(),
			udid: self.device_udid.clone(),
			app_package: self.android.as_ref().map(|a| a.app_package.clone()),
			app_activity: self.android.as_ref().map(|a| a.app_activity.clone()),
		}
	}
}

fn required(source: &dyn ConfigSource, key: &'static str) -> Result<String, ConfigError> {
	optional(source, key).ok_or(ConfigError::Missing { key })
}

/// Blank values count as absent.
fn optional(source: &dyn ConfigSource, key: &str) -> Option<String> {
	source.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ConfigError> {
	value.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
		key,
		value: value.to_string(),
		reason: e.to_string(),
	})
}

fn parse_u32(key: &'static str, value: &str) -> Result<u32, ConfigError> {
	value.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
		key,
		value: value.to_string(),
		reason: e.to_string(),
	})
}

fn optional_secs(source: &dyn ConfigSource, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
	match optional(source, key) {
		Some(value) => Ok(Duration::from_secs(parse_u64(key, &value)?)),
		None => Ok(default),
	}
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_u64(duration.as_secs())
}
