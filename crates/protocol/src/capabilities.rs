//! Capability set sent when creating a remote session.
//!
//! Non-standard capabilities carry the `appium:` vendor prefix required by
//! W3C-compliant servers. Platform-specific keys are optional here; the
//! platform/field invariant is enforced by the config resolver before a
//! [`Capabilities`] value is ever built.

use serde::{Deserialize, Serialize};

use crate::types::Platform;

/// Capability set describing the device and application under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
	/// Target platform (`platformName`)
	#[serde(rename = "platformName")]
	pub platform_name: Platform,
	/// Device name as known to the automation server
	#[serde(rename = "appium:deviceName")]
	pub device_name: String,
	/// Absolute path (or URL) of the application package
	#[serde(rename = "appium:app")]
	pub app: String,
	/// Unique device identifier, when a specific device is required
	#[serde(rename = "appium:udid", default, skip_serializing_if = "Option::is_none")]
	pub udid: Option<String>,
	/// Android application package
	#[serde(rename = "appium:appPackage", default, skip_serializing_if = "Option::is_none")]
	pub app_package: Option<String>,
	/// Android launch activity
	#[serde(rename = "appium:appActivity", default, skip_serializing_if = "Option::is_none")]
	pub app_activity: Option<String>,
}

/// Body of a W3C `POST /session` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionRequest {
	pub capabilities: CapabilitiesRequest,
}

/// W3C capability negotiation wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesRequest {
	pub always_match: Capabilities,
	pub first_match: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl NewSessionRequest {
	/// Wraps a capability set with an empty `firstMatch` entry.
	pub fn new(capabilities: Capabilities) -> Self {
		Self {
			capabilities: CapabilitiesRequest {
				always_match: capabilities,
				first_match: vec![serde_json::Map::new()],
			},
		}
	}
}
