use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A signal a client can wait on, standing in for the host's kernel events.
///
/// Signals are sticky until consumed by a successful wait or an explicit [`Event::clear`].
#[derive(Debug, Default)]
pub struct Event {
	signaled: Mutex<bool>,
	cond: Condvar,
}

impl Event {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn signal(&self) {
		*self.signaled.lock() = true;
		self.cond.notify_all();
	}

	pub fn clear(&self) {
		*self.signaled.lock() = false;
	}

	#[must_use]
	pub fn is_signaled(&self) -> bool {
		*self.signaled.lock()
	}

	/// Waits up to `timeout` for a signal and consumes it. Returns `false` on timeout.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		let mut signaled = self.signaled.lock();
		if !*signaled {
			// Spurious wake-ups just end in the check below
			let _ = self
				.cond
				.wait_while_for(&mut signaled, |signaled| !*signaled, timeout);
		}

		std::mem::replace(&mut *signaled, false)
	}
}
