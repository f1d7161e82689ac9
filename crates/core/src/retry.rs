//! Retry bookkeeping and decision policy.
//!
//! The [`RetryLedger`] holds one [`RetryRecord`] per test method for the
//! whole run. Records are only mutated by the task running that method, and
//! each mutation is a short critical section on the method's own map shard.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identity of a test method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestMethodId(Arc<str>);

impl TestMethodId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TestMethodId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TestMethodId {
	fn from(value: &str) -> Self {
		Self(Arc::from(value))
	}
}

impl From<String> for TestMethodId {
	fn from(value: String) -> Self {
		Self(Arc::from(value))
	}
}

impl From<&TestMethodId> for TestMethodId {
	fn from(value: &TestMethodId) -> Self {
		value.clone()
	}
}

/// Attempts used versus allowed for one test method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRecord {
	pub test_method_id: TestMethodId,
	pub attempts_used: u32,
	pub max_attempts: u32,
}

impl RetryRecord {
	pub fn new(test_method_id: TestMethodId, max_attempts: u32) -> Self {
		Self {
			test_method_id,
			attempts_used: 0,
			max_attempts,
		}
	}

	pub fn remaining(&self) -> u32 {
		self.max_attempts.saturating_sub(self.attempts_used)
	}
}

/// Decides whether a failed test method gets another attempt.
pub trait RetryPolicy: Send + Sync {
	fn should_retry(&self, record: &RetryRecord) -> bool;
}

/// Retries while `attempts_used < max_attempts`; `max_attempts = 0` disables retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedRetry;

impl RetryPolicy for BoundedRetry {
	fn should_retry(&self, record: &RetryRecord) -> bool {
		record.attempts_used < record.max_attempts
	}
}

/// Per-run map of retry records keyed by test method.
#[derive(Debug, Default)]
pub struct RetryLedger {
	records: DashMap<TestMethodId, RetryRecord>,
}

impl RetryLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a fresh record; returns false if the method was already known.
	pub fn register(&self, method: TestMethodId, max_attempts: u32) -> bool {
		let mut inserted = false;
		self.records.entry(method.clone()).or_insert_with(|| {
			inserted = true;
			RetryRecord::new(method, max_attempts)
		});
		inserted
	}

	/// Snapshot of a method's record.
	pub fn get(&self, method: &TestMethodId) -> Option<RetryRecord> {
		self.records.get(method).map(|r| r.value().clone())
	}

	/// Consults `policy` and, when it allows another attempt, counts it.
	///
	/// Unknown methods never retry.
	pub fn consume_retry(&self, method: &TestMethodId, policy: &dyn RetryPolicy) -> bool {
		let Some(mut record) = self.records.get_mut(method) else {
			return false;
		};
		if !policy.should_retry(&record) {
			return false;
		}
		record.attempts_used += 1;
		debug!(
			target = "devsess.retry",
			method = %method,
			attempts_used = record.attempts_used,
			max_attempts = record.max_attempts,
			"retry granted"
		);
		true
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// All records, sorted by method id.
	pub fn snapshot(&self) -> Vec<RetryRecord> {
		let mut records: Vec<RetryRecord> = self.records.iter().map(|r| r.value().clone()).collect();
		records.sort_by(|a, b| a.test_method_id.cmp(&b.test_method_id));
		records
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(used: u32, max: u32) -> RetryRecord {
		RetryRecord {
			test_method_id: "login".into(),
			attempts_used: used,
			max_attempts: max,
		}
	}

	#[test]
	fn bounded_retry_allows_until_max() {
		let policy = BoundedRetry;
		assert!(policy.should_retry(&record(0, 2)));
		assert!(policy.should_retry(&record(1, 2)));
		assert!(!policy.should_retry(&record(2, 2)));
	}

	#[test]
	fn zero_max_attempts_disables_retry() {
		assert!(!BoundedRetry.should_retry(&record(0, 0)));
	}

	#[test]
	fn ledger_consumes_up_to_max_and_never_exceeds_it() {
		let ledger = RetryLedger::new();
		let id = TestMethodId::from("checkout");
		assert!(ledger.register(id.clone(), 2));

		assert!(ledger.consume_retry(&id, &BoundedRetry));
		assert!(ledger.consume_retry(&id, &BoundedRetry));
		assert!(!ledger.consume_retry(&id, &BoundedRetry));

		let rec = ledger.get(&id).unwrap();
		assert_eq!(rec.attempts_used, 2);
		assert_eq!(rec.remaining(), 0);
	}

	#[test]
	fn registration_happens_once() {
		let ledger = RetryLedger::new();
		let id = TestMethodId::from("search");
		assert!(ledger.register(id.clone(), 3));
		ledger.consume_retry(&id, &BoundedRetry);

		assert!(!ledger.register(id.clone(), 3));
		assert_eq!(ledger.get(&id).unwrap().attempts_used, 1);
		assert_eq!(ledger.len(), 1);
	}

	#[test]
	fn record_serializes_method_id_as_plain_string() {
		let json = serde_json::to_value(record(1, 2)).unwrap();
		assert_eq!(json["testMethodId"], "login");
		assert_eq!(json["attemptsUsed"], 1);

		let id: TestMethodId = serde_json::from_value(json["testMethodId"].clone()).unwrap();
		assert_eq!(id, TestMethodId::from("login"));
	}

	#[test]
	fn unknown_method_never_retries() {
		let ledger = RetryLedger::new();
		assert!(!ledger.consume_retry(&"ghost".into(), &BoundedRetry));
		assert!(ledger.is_empty());
	}

	#[test]
	fn snapshot_is_sorted() {
		let ledger = RetryLedger::new();
		ledger.register("b".into(), 1);
		ledger.register("a".into(), 1);
		let ids: Vec<String> = ledger.snapshot().into_iter().map(|r| r.test_method_id.to_string()).collect();
		assert_eq!(ids, vec!["a", "b"]);
	}
}
