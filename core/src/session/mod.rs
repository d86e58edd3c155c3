//! One client's view of the emulated reader.
//!
//! A [`Session`] mirrors the host's two-level reader state machine: the service state
//! (driver initialized or not) and the device state (tag presence). Client calls and the
//! session's reconciler thread share one lock; file I/O happens after it is released.

use crate::{
	area::AreaId,
	emulation::{reconciler, ConnectionIntent, EmulationState},
	tag::{CommonInfo, ModelInfo, RegisterInfo, TagInfo, VirtualTag},
};

use std::{sync::Arc, thread::JoinHandle, time::Duration};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

mod error;
mod event;

pub use error::SessionError;
pub use event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum ServiceState {
	#[default]
	NotInitialized = 0,
	Initialized = 1,
}

/// Discriminants follow the host reader API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum DeviceState {
	Initialized = 0,
	SearchingForTag = 1,
	TagFound = 2,
	TagRemoved = 3,
	TagMounted = 4,
	#[default]
	Unavailable = 5,
	Finalized = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
	pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
	/// Controller slot reported as the single reader.
	pub npad_id: u32,
	pub reconcile_interval: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			npad_id: 0x20,
			reconcile_interval: Duration::from_millis(100),
		}
	}
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
	pub(crate) service_state: ServiceState,
	pub(crate) device_state: DeviceState,
	pub(crate) opened_area: Option<AreaId>,
	pub(crate) last_delivered_intent: ConnectionIntent,
	pub(crate) should_exit: bool,
}

/// State shared between a session and its reconciler thread.
#[derive(Debug, Default)]
pub(crate) struct SessionShared {
	pub(crate) state: Mutex<SessionState>,
	/// Wakes the reconciler early, used for teardown.
	pub(crate) wake: Condvar,
	pub(crate) activate: Arc<Event>,
	pub(crate) deactivate: Arc<Event>,
	pub(crate) availability_change: Arc<Event>,
}

pub struct Session {
	application_id: u64,
	config: SessionConfig,
	emulation: EmulationState,
	shared: Arc<SessionShared>,
	reconciler: Option<JoinHandle<()>>,
}

type Guard<'a> = MutexGuard<'a, SessionState>;

impl Session {
	/// Opens a session for `application_id` and starts its reconciler.
	pub fn new(
		application_id: u64,
		emulation: EmulationState,
		config: SessionConfig,
	) -> Result<Self, SessionError> {
		let shared = Arc::new(SessionShared::default());

		let reconciler = reconciler::spawn(
			format!("tagemu-reconciler-{application_id:016x}"),
			Arc::clone(&shared),
			emulation.clone(),
			config.reconcile_interval,
		)
		.map_err(SessionError::SpawnReconciler)?;

		emulation.register_application(application_id);
		info!(application_id, "Session opened");

		Ok(Self {
			application_id,
			config,
			emulation,
			shared,
			reconciler: Some(reconciler),
		})
	}

	#[must_use]
	pub const fn application_id(&self) -> u64 {
		self.application_id
	}

	fn lock(&self) -> Guard<'_> {
		self.shared.state.lock()
	}

	fn initialized(&self) -> Result<Guard<'_>, SessionError> {
		let state = self.lock();
		if state.service_state == ServiceState::Initialized {
			Ok(state)
		} else {
			Err(SessionError::WrongServiceState(state.service_state))
		}
	}

	fn in_device_state(&self, allowed: &[DeviceState]) -> Result<Guard<'_>, SessionError> {
		let state = self.initialized()?;
		if allowed.contains(&state.device_state) {
			Ok(state)
		} else {
			Err(SessionError::WrongDeviceState(state.device_state))
		}
	}

	fn mounted(&self) -> Result<Guard<'_>, SessionError> {
		self.in_device_state(&[DeviceState::TagMounted])
	}

	fn active_tag(&self) -> Result<VirtualTag, SessionError> {
		self.emulation
			.active_tag()
			.filter(VirtualTag::is_valid)
			.ok_or(SessionError::NoActiveTag)
	}

	/// Active tag plus the opened area, which must exist.
	fn opened_area(&self) -> Result<(VirtualTag, AreaId), SessionError> {
		let id = self.mounted()?.opened_area.ok_or(SessionError::NoOpenedArea)?;
		let tag = self.active_tag()?;

		if tag.areas().exists(id) {
			Ok((tag, id))
		} else {
			Err(SessionError::AreaNeedsToBeCreated(id))
		}
	}

	/// [`Session::opened_area`] narrowed to areas holding data; empty areas count as never
	/// created.
	fn filled_area(&self) -> Result<(VirtualTag, AreaId), SessionError> {
		let (tag, id) = self.opened_area()?;

		if tag.areas().size(id)? == 0 {
			Err(SessionError::AreaNeedsToBeCreated(id))
		} else {
			Ok((tag, id))
		}
	}

	fn notify_written(&self) -> Result<(), SessionError> {
		if self
			.emulation
			.update_active_tag(VirtualTag::notify_written)?
		{
			Ok(())
		} else {
			Err(SessionError::NoActiveTag)
		}
	}

	#[instrument(skip(self), fields(application_id = self.application_id))]
	pub fn initialize(&self) -> Result<(), SessionError> {
		let mut state = self.lock();
		if state.service_state == ServiceState::Initialized {
			return Ok(());
		}

		state.service_state = ServiceState::Initialized;
		state.device_state = DeviceState::Initialized;
		state.opened_area = None;

		for event in [
			&self.shared.activate,
			&self.shared.deactivate,
			&self.shared.availability_change,
		] {
			event.clear();
		}

		Ok(())
	}

	#[instrument(skip(self), fields(application_id = self.application_id))]
	pub fn finalize(&self) -> Result<(), SessionError> {
		let mut state = self.initialized()?;
		state.service_state = ServiceState::NotInitialized;
		state.device_state = DeviceState::Finalized;
		state.opened_area = None;

		Ok(())
	}

	pub fn list_devices(&self) -> Result<Vec<DeviceHandle>, SessionError> {
		drop(self.initialized()?);
		Ok(vec![DeviceHandle {
			id: self.config.npad_id,
		}])
	}

	pub fn npad_id(&self, handle: DeviceHandle) -> Result<u32, SessionError> {
		drop(self.initialized()?);
		Ok(handle.id)
	}

	#[instrument(skip(self), fields(application_id = self.application_id))]
	pub fn start_detection(&self) -> Result<(), SessionError> {
		let mut state =
			self.in_device_state(&[DeviceState::Initialized, DeviceState::TagRemoved])?;
		state.device_state = DeviceState::SearchingForTag;
		self.shared.availability_change.signal();

		Ok(())
	}

	#[instrument(skip(self), fields(application_id = self.application_id))]
	pub fn stop_detection(&self) -> Result<(), SessionError> {
		let mut state = self.initialized()?;
		state.device_state = DeviceState::Initialized;
		state.opened_area = None;
		self.shared.availability_change.signal();

		Ok(())
	}

	#[instrument(skip(self), fields(application_id = self.application_id))]
	pub fn mount(&self) -> Result<(), SessionError> {
		self.initialized()?.device_state = DeviceState::TagMounted;
		Ok(())
	}

	#[instrument(skip(self), fields(application_id = self.application_id))]
	pub fn unmount(&self) -> Result<(), SessionError> {
		let mut state = self.initialized()?;
		state.device_state = DeviceState::TagFound;
		state.opened_area = None;

		Ok(())
	}

	/// Writes are persisted immediately, so there is nothing left to flush.
	pub fn flush(&self) -> Result<(), SessionError> {
		self.initialized().map(drop)
	}

	pub fn restore(&self) -> Result<(), SessionError> {
		self.initialized().map(drop)
	}

	pub fn tag_info(&self) -> Result<TagInfo, SessionError> {
		drop(self.in_device_state(&[DeviceState::TagFound, DeviceState::TagMounted])?);
		Ok(self.active_tag()?.tag_info())
	}

	pub fn register_info(&self) -> Result<RegisterInfo, SessionError> {
		drop(self.mounted()?);
		Ok(self.active_tag()?.register_info())
	}

	pub fn common_info(&self) -> Result<CommonInfo, SessionError> {
		drop(self.mounted()?);
		Ok(self.active_tag()?.common_info())
	}

	pub fn model_info(&self) -> Result<ModelInfo, SessionError> {
		drop(self.mounted()?);
		Ok(self.active_tag()?.model_info())
	}

	#[instrument(skip(self), fields(application_id = self.application_id), err)]
	pub fn open_application_area(&self, id: AreaId) -> Result<(), SessionError> {
		drop(self.mounted()?);
		let tag = self.active_tag()?;

		if !tag.areas().exists(id) {
			return Err(SessionError::AreaNeedsToBeCreated(id));
		}

		self.mounted()?.opened_area = Some(id);
		debug!(area = id, "Opened application area");

		Ok(())
	}

	/// Copies the opened area into `buf`, returning the number of bytes copied.
	pub fn application_area(&self, buf: &mut [u8]) -> Result<usize, SessionError> {
		let (tag, id) = self.filled_area()?;
		Ok(tag.areas().read(id, buf)?)
	}

	pub fn application_area_size(&self) -> Result<usize, SessionError> {
		let (tag, id) = self.filled_area()?;
		Ok(tag.areas().size(id)?)
	}

	#[instrument(skip(self, data), fields(application_id = self.application_id, size = data.len()), err)]
	pub fn set_application_area(&self, data: &[u8]) -> Result<(), SessionError> {
		let (tag, id) = self.filled_area()?;
		tag.areas().write(id, data)?;

		self.notify_written()
	}

	/// Creates a new area. The area is not opened and the tag's write stats are left alone;
	/// only [`Session::set_application_area`] counts as a write.
	#[instrument(skip(self, data), fields(application_id = self.application_id, size = data.len()), err)]
	pub fn create_application_area(&self, id: AreaId, data: &[u8]) -> Result<(), SessionError> {
		drop(self.mounted()?);
		let tag = self.active_tag()?;

		if tag.areas().create(id, data)? {
			Ok(())
		} else {
			Err(SessionError::AreaAlreadyCreated(id))
		}
	}

	#[instrument(skip(self, data), fields(application_id = self.application_id, size = data.len()), err)]
	pub fn recreate_application_area(&self, id: AreaId, data: &[u8]) -> Result<(), SessionError> {
		drop(self.mounted()?);
		let tag = self.active_tag()?;
		tag.areas().recreate(id, data)?;

		Ok(())
	}

	/// Deletes the opened area and closes it.
	#[instrument(skip(self), fields(application_id = self.application_id), err)]
	pub fn delete_application_area(&self) -> Result<(), SessionError> {
		let (tag, id) = self.opened_area()?;
		tag.areas().delete(id)?;

		self.lock().opened_area = None;

		Ok(())
	}

	/// Whether the active tag holds save data for any application.
	pub fn exists_application_area(&self) -> Result<bool, SessionError> {
		drop(self.mounted()?);
		Ok(!self.active_tag()?.areas().list()?.is_empty())
	}

	pub fn attach_activate_event(&self) -> Result<Arc<Event>, SessionError> {
		drop(self.initialized()?);
		Ok(Arc::clone(&self.shared.activate))
	}

	pub fn attach_deactivate_event(&self) -> Result<Arc<Event>, SessionError> {
		drop(self.initialized()?);
		Ok(Arc::clone(&self.shared.deactivate))
	}

	pub fn attach_availability_change_event(&self) -> Result<Arc<Event>, SessionError> {
		drop(self.initialized()?);
		Ok(Arc::clone(&self.shared.availability_change))
	}

	#[must_use]
	pub fn state(&self) -> ServiceState {
		self.lock().service_state
	}

	#[must_use]
	pub fn device_state(&self) -> DeviceState {
		self.lock().device_state
	}

	/// Last intent the reconciler acted on for this session.
	#[must_use]
	pub fn last_delivered_intent(&self) -> ConnectionIntent {
		self.lock().last_delivered_intent
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.lock().should_exit = true;
		self.shared.wake.notify_all();

		if let Some(handle) = self.reconciler.take() {
			if handle.join().is_err() {
				error!(application_id = self.application_id, "Reconciler thread panicked");
			}
		}

		self.emulation.unregister_application(self.application_id);
		info!(application_id = self.application_id, "Session closed");
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("application_id", &self.application_id)
			.field("state", &self.state())
			.field("device_state", &self.device_state())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn session() -> Session {
		Session::new(0x0100_0000_0000_2000, EmulationState::new(), SessionConfig::default())
			.unwrap()
	}

	#[test]
	fn everything_requires_initialize() {
		let session = session();

		assert!(matches!(
			session.start_detection(),
			Err(SessionError::WrongServiceState(ServiceState::NotInitialized))
		));
		assert!(session.mount().is_err());
		assert!(session.attach_activate_event().is_err());
		assert_eq!(session.device_state(), DeviceState::Unavailable);
	}

	#[test]
	fn initialize_is_idempotent() {
		let session = session();
		session.initialize().unwrap();
		session.start_detection().unwrap();

		session.initialize().unwrap();
		assert_eq!(session.device_state(), DeviceState::SearchingForTag);
	}

	#[test]
	fn finalize_is_terminal_until_reinitialized() {
		let session = session();
		session.initialize().unwrap();
		session.finalize().unwrap();

		assert_eq!(session.state(), ServiceState::NotInitialized);
		assert_eq!(session.device_state(), DeviceState::Finalized);
		assert!(session.finalize().is_err());
	}

	#[test]
	fn drop_deregisters_the_application() {
		let emulation = EmulationState::new();
		let session = Session::new(7, emulation.clone(), SessionConfig::default()).unwrap();
		assert!(emulation.is_application_intercepted(7));

		drop(session);
		assert!(!emulation.is_application_intercepted(7));
	}

	#[test]
	fn single_reader_is_listed() {
		let session = session();
		session.initialize().unwrap();

		let devices = session.list_devices().unwrap();
		assert_eq!(devices, vec![DeviceHandle { id: 0x20 }]);
		assert_eq!(session.npad_id(devices[0]).unwrap(), 0x20);
	}
}
