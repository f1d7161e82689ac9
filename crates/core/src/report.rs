//! Step reporting correlated with the running test attempt.
//!
//! The supervisor enters a [`StepScope`] for every attempt. A [`StepReporter`]
//! shared by test bodies picks the scope up from the current task and
//! appends a [`StepEntry`] to the process-wide [`ReportSink`]. Reporting
//! never fails a test: sink errors are logged and dropped.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::ReportingError;
use crate::retry::TestMethodId;

/// Method name attributed to steps recorded outside any attempt.
pub const UNSCOPED: &str = "<unscoped>";

tokio::task_local! {
	static CURRENT_STEP_SCOPE: StepScope;
}

/// The attempt a step belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepScope {
	pub method: TestMethodId,
	pub attempt: u32,
}

/// Runs `future` with `scope` as the current step scope.
pub async fn with_scope<F: Future>(scope: StepScope, future: F) -> F::Output {
	CURRENT_STEP_SCOPE.scope(scope, future).await
}

/// Scope of the current task, if inside an attempt.
pub fn current_scope() -> Option<StepScope> {
	CURRENT_STEP_SCOPE.try_with(StepScope::clone).ok()
}

/// One recorded step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEntry {
	pub method: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attempt: Option<u32>,
	/// Position within the method, starting at 0.
	pub seq: u64,
	pub summary: String,
	pub detail: String,
	pub timestamp_ms: u64,
}

/// Append-only destination for step entries. Implementations serialize
/// concurrent writers themselves.
pub trait ReportSink: Send + Sync {
	fn append(&self, entry: &StepEntry) -> Result<(), ReportingError>;
}

/// Records step annotations for the current attempt.
#[derive(Clone)]
pub struct StepReporter {
	sink: Arc<dyn ReportSink>,
	sequences: Arc<Mutex<HashMap<String, u64>>>,
}

impl StepReporter {
	pub fn new(sink: Arc<dyn ReportSink>) -> Self {
		Self {
			sink,
			sequences: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Appends a step for the current attempt. Never fails.
	pub fn record(&self, summary: impl Into<String>, detail: impl Into<String>) {
		let scope = current_scope();
		let method = scope.as_ref().map_or_else(|| UNSCOPED.to_string(), |s| s.method.to_string());

		let seq = {
			let mut sequences = self.sequences.lock();
			let next = sequences.entry(method.clone()).or_insert(0);
			let seq = *next;
			*next += 1;
			seq
		};

		let entry = StepEntry {
			method,
			attempt: scope.map(|s| s.attempt),
			seq,
			summary: summary.into(),
			detail: detail.into(),
			timestamp_ms: now_ms(),
		};

		match self.sink.append(&entry) {
			Ok(()) => trace!(target = "devsess.report", method = %entry.method, seq, summary = %entry.summary, "step recorded"),
			Err(err) => warn!(target = "devsess.report", method = %entry.method, error = %err, "failed to record step; continuing"),
		}
	}
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemorySink {
	entries: Mutex<Vec<StepEntry>>,
}

impl MemorySink {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn entries(&self) -> Vec<StepEntry> {
		self.entries.lock().clone()
	}

	pub fn entries_for(&self, method: &str) -> Vec<StepEntry> {
		self.entries.lock().iter().filter(|e| e.method == method).cloned().collect()
	}
}

impl ReportSink for MemorySink {
	fn append(&self, entry: &StepEntry) -> Result<(), ReportingError> {
		self.entries.lock().push(entry.clone());
		Ok(())
	}
}

/// Append-only JSON lines file.
#[derive(Debug)]
pub struct JsonlSink {
	path: PathBuf,
	file: Mutex<File>,
}

impl JsonlSink {
	/// Opens `path` for appending, creating it if needed.
	pub fn create(path: impl AsRef<Path>) -> Result<Self, ReportingError> {
		let path = path.as_ref().to_path_buf();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent)?;
		}
		let file = OpenOptions::new().create(true).append(true).open(&path)?;
		Ok(Self {
			path,
			file: Mutex::new(file),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ReportSink for JsonlSink {
	fn append(&self, entry: &StepEntry) -> Result<(), ReportingError> {
		let mut line = serde_json::to_vec(entry)?;
		line.push(b'\n');
		let mut file = self.file.lock();
		file.write_all(&line)?;
		file.flush()?;
		Ok(())
	}
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or_default()
}
