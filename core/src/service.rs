//! The global query surface a transport exposes next to per-client sessions.

use crate::{
	area::AreaId,
	config::Config,
	emulation::{Activation, ConnectionIntent, EmulationState},
	locator::{scan_and_migrate, ScanStats, TagIterator},
	result::ResultCode,
	session::{Session, SessionConfig, SessionError},
	tag::{
		format::{FormatKind, SourceTag},
		migrate::{migrate, MigrationError},
		TagError, TagIdentity, UuidInfo, VirtualTag,
	},
};

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use tagemu_utils::{
	error::FileIOError,
	fs::{has_flag, set_flag},
};
use tracing::{debug, info};

pub const ACTIVATION_FLAG_NAME: &str = "status_on";

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
	#[error("no valid tag is active")]
	NoActiveTag,
	#[error("not a usable tag: <path='{}'>: {source}", .path.display())]
	InvalidTag {
		path: Box<Path>,
		#[source]
		source: MigrationError,
	},
	#[error("no more tags to enumerate")]
	IteratorEndReached,
	#[error("no stored tag matches {0:?}")]
	TagNotFound(TagIdentity),
	#[error("emulation is turned off")]
	EmulationOff,

	#[error(transparent)]
	Tag(#[from] TagError),
	#[error(transparent)]
	Session(#[from] SessionError),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
}

impl ServiceError {
	#[must_use]
	pub const fn result_code(&self) -> ResultCode {
		match self {
			Self::NoActiveTag => ResultCode::EMU_NO_ACTIVE_TAG,
			Self::InvalidTag { .. } | Self::TagNotFound(_) => ResultCode::EMU_INVALID_TAG,
			Self::IteratorEndReached => ResultCode::EMU_ITERATOR_END_REACHED,
			Self::EmulationOff => ResultCode::EMU_EMULATION_OFF,
			Self::Session(e) => e.result_code(),
			Self::Tag(_) | Self::FileIO(_) => ResultCode::EMU_INTERNAL,
		}
	}
}

/// Supplies the id of the application currently in the foreground, if any.
pub trait ForegroundApplication: Send + Sync {
	fn current(&self) -> Option<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Version {
	pub major: u8,
	pub minor: u8,
	pub patch: u8,
	pub dev_build: bool,
}

impl Version {
	#[must_use]
	pub fn current() -> Self {
		Self {
			major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or_default(),
			minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or_default(),
			patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or_default(),
			dev_build: cfg!(feature = "dev-build"),
		}
	}
}

pub struct EmulationService {
	config: Config,
	emulation: EmulationState,
	iterator: Mutex<Option<TagIterator>>,
	foreground: Option<Box<dyn ForegroundApplication>>,
}

impl EmulationService {
	/// Builds the service, restoring the persisted activation.
	#[must_use]
	pub fn new(config: Config) -> Self {
		let emulation = EmulationState::new();
		emulation.set_activation(Activation::from(has_flag(
			config.flags_dir.join(ACTIVATION_FLAG_NAME),
		)));

		Self {
			config,
			emulation,
			iterator: Mutex::new(None),
			foreground: None,
		}
	}

	/// [`EmulationService::new`] followed by a full scan that migrates every older tag.
	pub fn start(config: Config) -> Result<Self, ServiceError> {
		let service = Self::new(config);
		service.scan()?;

		Ok(service)
	}

	#[must_use]
	pub fn with_foreground(mut self, foreground: impl ForegroundApplication + 'static) -> Self {
		self.foreground = Some(Box::new(foreground));
		self
	}

	#[must_use]
	pub const fn config(&self) -> &Config {
		&self.config
	}

	#[must_use]
	pub const fn emulation(&self) -> &EmulationState {
		&self.emulation
	}

	#[must_use]
	pub fn version(&self) -> Version {
		Version::current()
	}

	#[must_use]
	pub fn tags_dir(&self) -> &Path {
		&self.config.tags_dir
	}

	pub fn scan(&self) -> Result<ScanStats, ServiceError> {
		Ok(scan_and_migrate(
			&self.config.tags_dir,
			&self.config.staging_dir,
		)?)
	}

	#[must_use]
	pub fn activation(&self) -> Activation {
		self.emulation.activation()
	}

	pub fn set_activation(&self, activation: Activation) -> Result<(), ServiceError> {
		set_flag(
			self.config.flags_dir.join(ACTIVATION_FLAG_NAME),
			activation == Activation::On,
		)?;
		self.emulation.set_activation(activation);

		Ok(())
	}

	/// Opens a client session; refused while emulation is off.
	pub fn open_session(&self, application_id: u64) -> Result<Session, ServiceError> {
		if self.activation() == Activation::Off {
			debug!(application_id, "Not intercepting, emulation is off");
			return Err(ServiceError::EmulationOff);
		}

		Ok(Session::new(
			application_id,
			self.emulation.clone(),
			SessionConfig {
				npad_id: self.config.npad_id,
				reconcile_interval: self.config.reconcile_interval(),
			},
		)?)
	}

	pub fn active_tag(&self) -> Result<VirtualTag, ServiceError> {
		self.emulation
			.active_tag()
			.filter(VirtualTag::is_valid)
			.ok_or(ServiceError::NoActiveTag)
	}

	fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
		self.config.tags_dir.join(path)
	}

	/// Activates the tag at `path` (relative paths start at the tag directory), upgrading
	/// it first if it is stored in an older layout.
	pub fn set_active_tag_by_path(&self, path: impl AsRef<Path>) -> Result<VirtualTag, ServiceError> {
		let path = self.resolve(path);
		let tag = migrate(&path, &self.config.staging_dir).map_err(|source| {
			ServiceError::InvalidTag {
				path: path.as_path().into(),
				source,
			}
		})?;

		self.emulation.set_active_tag(tag.clone());
		Ok(tag)
	}

	/// Activates the first stored tag with the given identity.
	pub fn set_active_tag_by_identity(
		&self,
		identity: TagIdentity,
	) -> Result<VirtualTag, ServiceError> {
		let tag = TagIterator::new(&self.config.tags_dir, &self.config.staging_dir)?
			.find(|tag| tag.identity() == identity)
			.ok_or(ServiceError::TagNotFound(identity))?;

		self.emulation.set_active_tag(tag.clone());
		Ok(tag)
	}

	pub fn reset_active_tag(&self) {
		self.emulation.clear_active_tag();
	}

	#[must_use]
	pub fn connection_intent(&self) -> ConnectionIntent {
		self.emulation.connection_intent()
	}

	pub fn set_connection_intent(&self, intent: ConnectionIntent) -> ConnectionIntent {
		self.emulation.set_connection_intent(intent)
	}

	/// Next tag of the shared enumeration, opening it on first use.
	pub fn next_tag(&self) -> Result<VirtualTag, ServiceError> {
		let mut iterator = self.iterator.lock();
		if iterator.is_none() {
			*iterator = Some(TagIterator::new(
				&self.config.tags_dir,
				&self.config.staging_dir,
			)?);
		}

		iterator
			.as_mut()
			.and_then(|iterator| iterator.next())
			.ok_or(ServiceError::IteratorEndReached)
	}

	pub fn reset_tag_iterator(&self) -> Result<(), ServiceError> {
		let mut iterator = self.iterator.lock();
		match iterator.as_mut() {
			Some(iterator) => iterator.reset()?,
			None => {
				*iterator = Some(TagIterator::new(
					&self.config.tags_dir,
					&self.config.staging_dir,
				)?);
			}
		}

		Ok(())
	}

	#[must_use]
	pub fn is_application_intercepted(&self, application_id: u64) -> bool {
		self.emulation.is_application_intercepted(application_id)
	}

	#[must_use]
	pub fn is_foreground_application_intercepted(&self) -> bool {
		self.foreground
			.as_ref()
			.and_then(|foreground| foreground.current())
			.is_some_and(|application_id| self.is_application_intercepted(application_id))
	}

	/// Parses whatever tag is stored at `path` without activating, migrating or
	/// otherwise touching it.
	pub fn try_parse_tag(&self, path: impl AsRef<Path>) -> Result<SourceTag, ServiceError> {
		let path = self.resolve(path);
		let kind = FormatKind::identify(&path)
			.ok_or_else(|| TagError::UnrecognizedFormat(path.as_path().into()))?;

		Ok(kind.format().load(&path)?)
	}

	pub fn active_tag_areas(&self) -> Result<Vec<AreaId>, ServiceError> {
		Ok(self.active_tag()?.areas().list()?)
	}

	pub fn set_active_tag_uuid_info(&self, uuid_info: UuidInfo) -> Result<(), ServiceError> {
		drop(self.active_tag()?);

		if self
			.emulation
			.update_active_tag(|tag| tag.set_uuid_info(uuid_info))?
		{
			info!("Updated uuid of the active tag");
			Ok(())
		} else {
			Err(ServiceError::NoActiveTag)
		}
	}
}
