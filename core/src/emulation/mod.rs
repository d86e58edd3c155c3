//! Process-wide emulation state shared by every session and the global query surface.
//!
//! All fields sit behind one mutex that is only ever held for plain field access.
//! Anything touching the filesystem works on a snapshot taken under the lock.

use crate::tag::{format::FormatKind, TagError, VirtualTag};

use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod reconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
	On,
	#[default]
	Off,
}

impl From<bool> for Activation {
	fn from(on: bool) -> Self {
		if on {
			Self::On
		} else {
			Self::Off
		}
	}
}

/// Whether the active tag should currently appear on the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionIntent {
	/// Nothing to deliver.
	#[default]
	Invalid,
	Connected,
	Disconnected,
}

#[derive(Debug, Default)]
struct Inner {
	activation: Activation,
	active_tag: Option<VirtualTag>,
	intent: ConnectionIntent,
	/// Application id to number of open sessions.
	intercepted: HashMap<u64, usize>,
}

/// Cheaply clonable handle; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct EmulationState {
	inner: Arc<Mutex<Inner>>,
}

fn is_tag_at(path: &Path) -> bool {
	FormatKind::Current.format().detect(path)
}

impl EmulationState {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn activation(&self) -> Activation {
		self.inner.lock().activation
	}

	pub fn set_activation(&self, activation: Activation) {
		self.inner.lock().activation = activation;
		info!(?activation, "Emulation activation changed");
	}

	/// Snapshot of the active tag, if any.
	#[must_use]
	pub fn active_tag(&self) -> Option<VirtualTag> {
		self.inner.lock().active_tag.clone()
	}

	#[must_use]
	pub fn active_tag_path(&self) -> Option<PathBuf> {
		self.inner
			.lock()
			.active_tag
			.as_ref()
			.map(|tag| tag.path().to_path_buf())
	}

	/// Selects `tag` and asks for it to be presented.
	pub fn set_active_tag(&self, tag: VirtualTag) {
		info!(path = ?tag.path(), name = tag.name(), "Active tag changed");

		let mut inner = self.inner.lock();
		inner.active_tag = Some(tag);
		inner.intent = ConnectionIntent::Connected;
	}

	pub fn clear_active_tag(&self) {
		let mut inner = self.inner.lock();
		inner.active_tag = None;
		inner.intent = ConnectionIntent::Invalid;
		debug!("Active tag cleared");
	}

	/// Current intent, collapsing to [`ConnectionIntent::Invalid`] once the active tag is
	/// gone from disk.
	#[must_use]
	pub fn connection_intent(&self) -> ConnectionIntent {
		let (path, intent) = {
			let inner = self.inner.lock();
			(
				inner
					.active_tag
					.as_ref()
					.map(|tag| tag.path().to_path_buf()),
				inner.intent,
			)
		};

		match path {
			Some(path) if intent != ConnectionIntent::Invalid => {
				if is_tag_at(&path) {
					intent
				} else {
					self.invalidate(&path);
					ConnectionIntent::Invalid
				}
			}
			_ => ConnectionIntent::Invalid,
		}
	}

	/// Stores `intent`, returning what was actually stored: without a valid active tag
	/// the intent is forced to [`ConnectionIntent::Invalid`].
	pub fn set_connection_intent(&self, intent: ConnectionIntent) -> ConnectionIntent {
		let Some(path) = self.active_tag_path() else {
			self.inner.lock().intent = ConnectionIntent::Invalid;
			return ConnectionIntent::Invalid;
		};

		if !is_tag_at(&path) {
			self.invalidate(&path);
			return ConnectionIntent::Invalid;
		}

		let mut inner = self.inner.lock();
		if inner.active_tag.is_none() {
			inner.intent = ConnectionIntent::Invalid;
			return ConnectionIntent::Invalid;
		}
		inner.intent = intent;
		debug!(?intent, "Connection intent changed");

		intent
	}

	/// Applies `update` to a snapshot of the active tag outside the lock, then stores the
	/// result if the same tag is still active. Returns `false` when no tag is active.
	pub fn update_active_tag<F>(&self, update: F) -> Result<bool, TagError>
	where
		F: FnOnce(&mut VirtualTag) -> Result<(), TagError>,
	{
		let Some(mut tag) = self.active_tag() else {
			return Ok(false);
		};

		update(&mut tag)?;

		let mut inner = self.inner.lock();
		if let Some(active) = inner
			.active_tag
			.as_mut()
			.filter(|active| active.path() == tag.path())
		{
			*active = tag;
		}

		Ok(true)
	}

	pub fn register_application(&self, application_id: u64) {
		let mut inner = self.inner.lock();
		*inner.intercepted.entry(application_id).or_default() += 1;
	}

	pub fn unregister_application(&self, application_id: u64) {
		let mut inner = self.inner.lock();
		if let Some(count) = inner.intercepted.get_mut(&application_id) {
			*count -= 1;
			if *count == 0 {
				inner.intercepted.remove(&application_id);
			}
		}
	}

	#[must_use]
	pub fn is_application_intercepted(&self, application_id: u64) -> bool {
		self.inner.lock().intercepted.contains_key(&application_id)
	}

	/// Every application with at least one open session, ascending.
	#[must_use]
	pub fn intercepted_applications(&self) -> Vec<u64> {
		let mut ids = self
			.inner
			.lock()
			.intercepted
			.keys()
			.copied()
			.collect::<Vec<_>>();
		ids.sort_unstable();
		ids
	}

	fn invalidate(&self, path: &Path) {
		let mut inner = self.inner.lock();
		if inner
			.active_tag
			.as_ref()
			.is_some_and(|tag| tag.path() == path)
		{
			inner.active_tag = None;
			inner.intent = ConnectionIntent::Invalid;
			warn!(?path, "Active tag disappeared from disk");
		}
	}
}
