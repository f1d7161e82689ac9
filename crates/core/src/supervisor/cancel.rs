//! Run-wide cancellation signal.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable token shared by every method in a run.
///
/// Cancelling abandons in-flight test bodies; teardown still runs.
#[derive(Debug, Clone)]
pub struct RunCancellation {
	tx: Arc<watch::Sender<bool>>,
}

impl Default for RunCancellation {
	fn default() -> Self {
		Self::new()
	}
}

impl RunCancellation {
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(false);
		Self { tx: Arc::new(tx) }
	}

	pub fn cancel(&self) {
		self.tx.send_replace(true);
	}

	pub fn is_cancelled(&self) -> bool {
		*self.tx.borrow()
	}

	/// Resolves once the run is cancelled.
	pub async fn cancelled(&self) {
		let mut rx = self.tx.subscribe();
		// The sender lives as long as `self`, so this only returns on cancel.
		let _ = rx.wait_for(|cancelled| *cancelled).await;
	}
}
