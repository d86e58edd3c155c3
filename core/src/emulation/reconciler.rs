//! Turns the synchronous connection intent into reader-like appear/disappear events.
//!
//! Every session owns one polling thread. On each tick it reads the global intent and
//! applies [`reconcile`] to the session's device state. Signals only fire on an actual
//! transition, so a steady intent is delivered exactly once per session.

use super::{ConnectionIntent, EmulationState};
use crate::session::{DeviceState, SessionShared, SessionState};

use std::{
	io,
	sync::Arc,
	thread::{self, JoinHandle},
	time::Duration,
};

use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
	/// Tag appeared: move to `TagFound` and signal activation.
	Activate,
	/// Tag went away: move back to `SearchingForTag` and signal deactivation.
	Deactivate,
	/// Already in the requested state; record the intent as delivered.
	Consume,
	Ignore,
}

#[must_use]
pub const fn reconcile(device_state: DeviceState, intent: ConnectionIntent) -> Reaction {
	match (intent, device_state) {
		(ConnectionIntent::Connected, DeviceState::SearchingForTag) => Reaction::Activate,
		(ConnectionIntent::Connected, DeviceState::TagFound) => Reaction::Consume,
		(ConnectionIntent::Disconnected, DeviceState::TagFound | DeviceState::TagMounted) => {
			Reaction::Deactivate
		}
		(ConnectionIntent::Disconnected, DeviceState::SearchingForTag) => Reaction::Consume,
		_ => Reaction::Ignore,
	}
}

pub(crate) fn spawn(
	name: String,
	shared: Arc<SessionShared>,
	emulation: EmulationState,
	interval: Duration,
) -> io::Result<JoinHandle<()>> {
	thread::Builder::new()
		.name(name)
		.spawn(move || run(&shared, &emulation, interval))
}

fn run(shared: &SessionShared, emulation: &EmulationState, interval: Duration) {
	loop {
		// Reading the intent may touch the filesystem, keep it out of the session lock
		let intent = emulation.connection_intent();

		let mut state = shared.state.lock();
		if state.should_exit {
			break;
		}

		tick(shared, &mut state, intent);

		shared.wake.wait_for(&mut state, interval);
		if state.should_exit {
			break;
		}
	}

	trace!("Reconciler stopped");
}

fn tick(shared: &SessionShared, state: &mut SessionState, intent: ConnectionIntent) {
	match reconcile(state.device_state, intent) {
		Reaction::Activate => {
			state.device_state = DeviceState::TagFound;
			state.last_delivered_intent = intent;
			shared.activate.signal();
			debug!("Tag presented to session");
		}
		Reaction::Deactivate => {
			state.device_state = DeviceState::SearchingForTag;
			state.last_delivered_intent = intent;
			shared.deactivate.signal();
			debug!("Tag removed from session");
		}
		Reaction::Consume => state.last_delivered_intent = intent,
		Reaction::Ignore => {}
	}
}
