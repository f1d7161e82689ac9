//! Response envelopes and raw commands.
//!
//! W3C WebDriver wraps every response body in `{"value": ...}`. Errors put an
//! [`ErrorPayload`] inside `value`. Legacy (JSONWP) servers also return the
//! session id at the top level, which [`ResponseEnvelope`] tolerates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
	#[serde(default)]
	pub value: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// `value` of a successful `POST /session`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionValue {
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub capabilities: Option<Value>,
}

/// `value` of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// W3C error code such as `session not created`
	pub error: String,
	#[serde(default)]
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stacktrace: Option<String>,
}

impl ResponseEnvelope {
	/// Extracts the error payload if `value` carries one.
	pub fn error(&self) -> Option<ErrorPayload> {
		if self.value.get("error").is_some() {
			serde_json::from_value(self.value.clone()).ok()
		} else {
			None
		}
	}

	/// Returns the created session id from either the W3C or legacy location.
	pub fn new_session_id(&self) -> Option<String> {
		serde_json::from_value::<NewSessionValue>(self.value.clone())
			.ok()
			.and_then(|v| v.session_id)
			.or_else(|| self.session_id.clone())
	}
}

/// HTTP verb of a raw command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
	Get,
	Post,
	Delete,
}

/// A raw protocol command addressed relative to `/session/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
	pub method: HttpMethod,
	/// Path suffix such as `/element` or `/appium/device/lock`
	pub path: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<Value>,
}

impl Command {
	pub fn get(path: impl Into<String>) -> Self {
		Self {
			method: HttpMethod::Get,
			path: path.into(),
			body: None,
		}
	}

	pub fn post(path: impl Into<String>, body: Value) -> Self {
		Self {
			method: HttpMethod::Post,
			path: path.into(),
			body: Some(body),
		}
	}

	pub fn delete(path: impl Into<String>) -> Self {
		Self {
			method: HttpMethod::Delete,
			path: path.into(),
			body: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn session_id_read_from_w3c_value() {
		let envelope: ResponseEnvelope = serde_json::from_value(json!({
			"value": { "sessionId": "abc", "capabilities": { "platformName": "Android" } }
		}))
		.unwrap();
		assert_eq!(envelope.new_session_id().as_deref(), Some("abc"));
		assert!(envelope.error().is_none());
	}

	#[test]
	fn session_id_falls_back_to_legacy_top_level() {
		let envelope: ResponseEnvelope = serde_json::from_value(json!({
			"sessionId": "legacy-1",
			"status": 0,
			"value": { "platformName": "iOS" }
		}))
		.unwrap();
		assert_eq!(envelope.new_session_id().as_deref(), Some("legacy-1"));
	}

	#[test]
	fn error_payload_is_detected() {
		let envelope: ResponseEnvelope = serde_json::from_value(json!({
			"value": { "error": "session not created", "message": "no device attached" }
		}))
		.unwrap();
		let err = envelope.error().unwrap();
		assert_eq!(err.error, "session not created");
		assert_eq!(err.message, "no device attached");
		assert!(envelope.new_session_id().is_none());
	}

	#[test]
	fn null_value_is_accepted() {
		let envelope: ResponseEnvelope = serde_json::from_str(r#"{"value": null}"#).unwrap();
		assert!(envelope.value.is_null());
		assert!(envelope.error().is_none());
	}
}
