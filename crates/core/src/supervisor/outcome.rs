//! Per-attempt, per-method and per-run results.

use serde::{Serialize, Serializer};

use crate::error::ConnectionError;
use crate::retry::TestMethodId;
use crate::session::{SessionId, SessionState};

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
	Passed,
	Failed {
		reason: String,
	},
	ConnectionFailed {
		#[serde(serialize_with = "display")]
		error: ConnectionError,
	},
	Cancelled,
}

impl AttemptOutcome {
	pub fn is_pass(&self) -> bool {
		matches!(self, AttemptOutcome::Passed)
	}
}

fn display<S: Serializer>(value: &ConnectionError, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.collect_str(value)
}

/// One attempt: the session it used and how it went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReport {
	/// Zero-based attempt index within the method.
	pub index: u32,
	pub session: SessionId,
	pub outcome: AttemptOutcome,
	/// Session state after teardown.
	pub final_state: SessionState,
	/// Teardown errors, logged and absorbed.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub teardown_errors: Vec<String>,
}

impl AttemptReport {
	pub fn teardown_clean(&self) -> bool {
		self.teardown_errors.is_empty()
	}
}

/// Final outcome of a test method after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodOutcome {
	Passed,
	Failed,
	Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodReport {
	pub method: TestMethodId,
	pub outcome: MethodOutcome,
	/// Retries consumed, from the method's retry record.
	pub attempts_used: u32,
	pub attempts: Vec<AttemptReport>,
}

impl MethodReport {
	/// Attempts actually executed.
	pub fn attempt_count(&self) -> usize {
		self.attempts.len()
	}

	pub fn passed(&self) -> bool {
		self.outcome == MethodOutcome::Passed
	}
}

/// Every finished method in the run, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
	pub methods: Vec<MethodReport>,
}

impl RunReport {
	pub fn passed(&self) -> usize {
		self.count(MethodOutcome::Passed)
	}

	pub fn failed(&self) -> usize {
		self.count(MethodOutcome::Failed)
	}

	pub fn cancelled(&self) -> usize {
		self.count(MethodOutcome::Cancelled)
	}

	pub fn all_passed(&self) -> bool {
		self.methods.iter().all(MethodReport::passed)
	}

	pub fn method(&self, id: &str) -> Option<&MethodReport> {
		self.methods.iter().find(|m| m.method.as_str() == id)
	}

	fn count(&self, outcome: MethodOutcome) -> usize {
		self.methods.iter().filter(|m| m.outcome == outcome).count()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use serde_json::json;

	use super::*;

	#[test]
	fn connection_failures_serialize_as_text() {
		let outcome = AttemptOutcome::ConnectionFailed {
			error: ConnectionError::HandshakeTimeout {
				after: Duration::from_secs(5),
			},
		};
		assert_eq!(
			serde_json::to_value(&outcome).unwrap(),
			json!({ "kind": "connection_failed", "error": "handshake timed out after 5s" })
		);
		assert_eq!(serde_json::to_value(AttemptOutcome::Passed).unwrap(), json!({ "kind": "passed" }));
	}

	#[test]
	fn run_report_counts_outcomes() {
		let method = |id: &str, outcome| MethodReport {
			method: id.into(),
			outcome,
			attempts_used: 0,
			attempts: Vec::new(),
		};
		let report = RunReport {
			methods: vec![
				method("a", MethodOutcome::Passed),
				method("b", MethodOutcome::Failed),
				method("c", MethodOutcome::Cancelled),
			],
		};
		assert_eq!((report.passed(), report.failed(), report.cancelled()), (1, 1, 1));
		assert!(!report.all_passed());
		assert_eq!(report.method("b").unwrap().outcome, MethodOutcome::Failed);
		assert!(RunReport::default().all_passed());
	}
}
