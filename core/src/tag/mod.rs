//! The virtual tag aggregate and its current on-disk layout.
//!
//! A tag lives in its own directory:
//!
//! ```text
//! <tag>/
//!   amiibo.flag         presence marker
//!   amiibo.json         the record (uuid, name, identity, dates, counter, version)
//!   mii-charinfo.bin    avatar blob referenced by the record
//!   areas/0x????????.bin
//! ```
//!
//! Older layouts are handled by [`format`] and upgraded by [`migrate`].

use crate::area::{AreaManager, DEFAULT_AREA_SIZE};

use std::{
	fs,
	path::{Component, Path, PathBuf},
};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tagemu_utils::error::FileIOError;
use tracing::{debug, trace};

mod date;
mod error;
pub mod format;
mod identity;
pub mod migrate;
pub mod mii;

pub use date::Date;
pub use error::TagError;
pub use identity::{TagIdentity, IDENTITY_LEN, LEGACY_IDENTITY_LEN};
pub use mii::MiiCharInfo;

pub const FLAG_FILE_NAME: &str = "amiibo.flag";
pub const RECORD_FILE_NAME: &str = "amiibo.json";
pub const DEFAULT_MII_FILE_NAME: &str = "mii-charinfo.bin";

pub const UUID_LEN: usize = 10;
pub const MAX_NAME_LEN: usize = 40;

/// Reported for both the protocol and the tag type fields: "any".
pub const TAG_PROTOCOL_ANY: u32 = u32::MAX;
pub const TAG_TYPE_ANY: u32 = u32::MAX;

/// Random uuids look like a 7-byte NTAG serial padded to the full field.
const RANDOM_UUID_LEN: usize = 7;

/// How a tag presents its serial number.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UuidInfo {
	/// When set, a fresh serial is produced on every read and never persisted.
	pub random: bool,
	/// Stored serial, at most [`UUID_LEN`] bytes. Kept even when `random` is set.
	pub uuid: Vec<u8>,
}

impl UuidInfo {
	#[must_use]
	pub const fn random() -> Self {
		Self {
			random: true,
			uuid: Vec::new(),
		}
	}

	#[must_use]
	pub fn fixed(uuid: &[u8]) -> Self {
		Self {
			random: false,
			uuid: uuid[..uuid.len().min(UUID_LEN)].to_vec(),
		}
	}

	/// Serial bytes as reported to a reader, with their meaningful length.
	#[must_use]
	#[allow(clippy::cast_possible_truncation)] // Both lengths are bounded by UUID_LEN
	pub fn produce(&self) -> ([u8; UUID_LEN], u8) {
		let mut uuid = [0; UUID_LEN];
		if self.random {
			rand::thread_rng().fill_bytes(&mut uuid[..RANDOM_UUID_LEN]);
			return (uuid, UUID_LEN as u8);
		}

		let len = self.uuid.len().min(UUID_LEN);
		uuid[..len].copy_from_slice(&self.uuid[..len]);
		(uuid, len as u8)
	}
}

/// Everything a tag is, independent of where and in which layout it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagData {
	pub uuid_info: UuidInfo,
	pub name: String,
	pub identity: TagIdentity,
	pub first_write_date: Date,
	pub last_write_date: Date,
	pub write_counter: u16,
	pub version: u32,
}

/// `amiibo.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TagRecord {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub uuid: Option<Vec<u8>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub use_random_uuid: Option<bool>,
	pub name: String,
	pub id: TagIdentity,
	#[serde(default = "default_mii_file_name")]
	pub mii_charinfo_file: String,
	#[serde(default)]
	pub first_write_date: Date,
	#[serde(default)]
	pub last_write_date: Date,
	#[serde(default)]
	pub write_counter: u16,
	#[serde(default)]
	pub version: u32,
}

fn default_mii_file_name() -> String {
	DEFAULT_MII_FILE_NAME.to_string()
}

/// Resolves the avatar file a record points at. Only a bare file name inside the tag
/// directory is accepted.
pub(crate) fn mii_path(tag_dir: &Path, file_name: &str) -> Result<PathBuf, TagError> {
	let mut components = Path::new(file_name).components();
	match (components.next(), components.next()) {
		(Some(Component::Normal(_)), None) => Ok(tag_dir.join(file_name)),
		_ => Err(TagError::InvalidFileName {
			path: tag_dir.into(),
			field: "mii_charinfo_file",
			value: file_name.to_string(),
		}),
	}
}

impl TagRecord {
	pub(crate) fn read(tag_dir: &Path) -> Result<Self, TagError> {
		let path = tag_dir.join(RECORD_FILE_NAME);
		let bytes = fs::read(&path).map_err(|e| FileIOError::from((path.as_path(), e)))?;
		serde_json::from_slice(&bytes).map_err(|e| TagError::json(&path, e))
	}

	pub(crate) fn data(&self) -> TagData {
		let uuid = self.uuid.clone().unwrap_or_default();
		// Records without a serial have always been served with random ones
		let random = self.use_random_uuid.unwrap_or(self.uuid.is_none());

		TagData {
			uuid_info: UuidInfo {
				random,
				uuid: uuid[..uuid.len().min(UUID_LEN)].to_vec(),
			},
			name: self.name.clone(),
			identity: self.id,
			first_write_date: self.first_write_date,
			last_write_date: self.last_write_date,
			write_counter: self.write_counter,
			version: self.version,
		}
	}

	fn from_data(data: &TagData, mii_charinfo_file: &str) -> Self {
		Self {
			uuid: (!data.uuid_info.uuid.is_empty()).then(|| data.uuid_info.uuid.clone()),
			use_random_uuid: Some(data.uuid_info.random),
			name: data.name.clone(),
			id: data.identity,
			mii_charinfo_file: mii_charinfo_file.to_string(),
			first_write_date: data.first_write_date,
			last_write_date: data.last_write_date,
			write_counter: data.write_counter,
			version: data.version,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
	pub uuid: [u8; UUID_LEN],
	pub uuid_length: u8,
	pub protocol: u32,
	pub tag_type: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
	pub mii: MiiCharInfo,
	pub first_write_date: Date,
	pub name: String,
	pub font_region: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonInfo {
	pub last_write_date: Date,
	pub write_counter: u16,
	pub version: u32,
	pub application_area_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
	pub identity: TagIdentity,
}

/// A tag stored in the current layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualTag {
	path: PathBuf,
	data: TagData,
	mii_charinfo_file: String,
	mii: MiiCharInfo,
	areas: AreaManager,
}

impl VirtualTag {
	/// Loads the tag at `path`, generating its avatar if the referenced file is missing.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, TagError> {
		let path = path.as_ref();

		if !path.join(FLAG_FILE_NAME).is_file() {
			return Err(TagError::MissingField {
				path: path.into(),
				field: FLAG_FILE_NAME,
			});
		}

		let record = TagRecord::read(path)?;
		let mii = MiiCharInfo::load_or_generate(mii_path(path, &record.mii_charinfo_file)?)?;

		trace!(?path, name = %record.name, "Loaded tag");

		Ok(Self {
			path: path.to_path_buf(),
			data: record.data(),
			mii_charinfo_file: record.mii_charinfo_file,
			mii,
			areas: AreaManager::new(path),
		})
	}

	/// Writes a brand new tag directory at `path`.
	pub fn create(
		path: impl AsRef<Path>,
		data: TagData,
		mii: Option<MiiCharInfo>,
	) -> Result<Self, TagError> {
		let path = path.as_ref();
		fs::create_dir_all(path).map_err(|e| FileIOError::from((path, e)))?;

		let tag = Self {
			path: path.to_path_buf(),
			data,
			mii_charinfo_file: default_mii_file_name(),
			mii: mii.unwrap_or_else(MiiCharInfo::generate_random),
			areas: AreaManager::new(path),
		};
		tag.save()?;

		debug!(?path, name = %tag.data.name, "Created tag");

		Ok(tag)
	}

	pub fn save(&self) -> Result<(), TagError> {
		let flag_path = self.path.join(FLAG_FILE_NAME);
		fs::write(&flag_path, b"").map_err(|e| FileIOError::from((flag_path.as_path(), e)))?;

		let record_path = self.path.join(RECORD_FILE_NAME);
		let record = TagRecord::from_data(&self.data, &self.mii_charinfo_file);
		let json = serde_json::to_vec_pretty(&record).map_err(|e| TagError::json(&record_path, e))?;
		fs::write(&record_path, json).map_err(|e| {
			FileIOError::from((record_path.as_path(), e, "Failed to write tag record"))
		})?;

		self.mii.write(self.path.join(&self.mii_charinfo_file))?;

		Ok(())
	}

	/// Whether the backing directory still holds a tag.
	#[must_use]
	pub fn is_valid(&self) -> bool {
		self.path.join(FLAG_FILE_NAME).is_file() && self.path.join(RECORD_FILE_NAME).is_file()
	}

	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	#[must_use]
	pub const fn data(&self) -> &TagData {
		&self.data
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.data.name
	}

	#[must_use]
	pub const fn identity(&self) -> TagIdentity {
		self.data.identity
	}

	#[must_use]
	pub const fn mii(&self) -> &MiiCharInfo {
		&self.mii
	}

	#[must_use]
	pub const fn areas(&self) -> &AreaManager {
		&self.areas
	}

	/// Records a write: bumps the counter (saturating), stamps today's date and persists.
	pub fn notify_written(&mut self) -> Result<(), TagError> {
		self.data.write_counter = self.data.write_counter.saturating_add(1);
		self.data.last_write_date = Date::today();
		self.save()
	}

	pub fn set_uuid_info(&mut self, uuid_info: UuidInfo) -> Result<(), TagError> {
		self.data.uuid_info = uuid_info;
		self.save()
	}

	#[must_use]
	pub fn tag_info(&self) -> TagInfo {
		let (uuid, uuid_length) = self.data.uuid_info.produce();
		TagInfo {
			uuid,
			uuid_length,
			protocol: TAG_PROTOCOL_ANY,
			tag_type: TAG_TYPE_ANY,
		}
	}

	#[must_use]
	pub fn register_info(&self) -> RegisterInfo {
		RegisterInfo {
			mii: self.mii,
			first_write_date: self.data.first_write_date,
			name: self.data.name.chars().take(MAX_NAME_LEN).collect(),
			font_region: 0,
		}
	}

	#[must_use]
	pub fn common_info(&self) -> CommonInfo {
		CommonInfo {
			last_write_date: self.data.last_write_date,
			write_counter: self.data.write_counter,
			version: self.data.version,
			application_area_size: DEFAULT_AREA_SIZE,
		}
	}

	#[must_use]
	pub const fn model_info(&self) -> ModelInfo {
		ModelInfo {
			identity: self.data.identity,
		}
	}
}
