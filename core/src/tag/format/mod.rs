//! Recognition and parsing of the on-disk tag layouts, newest first.

use super::{MiiCharInfo, TagData, TagError};

use std::{
	fmt,
	path::{Path, PathBuf},
};

use serde::Serialize;
use tagemu_utils::error::FileIOError;

mod current;
mod raw;
mod v2;

pub use current::CurrentFormat;
pub use raw::RawDumpFormat;
pub use v2::LegacyJsonFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
	/// Flag file plus a single `amiibo.json` record.
	Current,
	/// Directory with `tag.json`, `register.json`, `common.json` and `model.json`.
	LegacyJson,
	/// Bare binary dump of the tag memory.
	RawDump,
}

impl FormatKind {
	/// Newest first, which is also the detection order.
	pub const ALL: [Self; 3] = [Self::Current, Self::LegacyJson, Self::RawDump];

	#[must_use]
	pub fn format(self) -> &'static dyn TagFormat {
		match self {
			Self::Current => &CurrentFormat,
			Self::LegacyJson => &LegacyJsonFormat,
			Self::RawDump => &RawDumpFormat,
		}
	}

	/// Cheap classification of `path`, without parsing anything.
	#[must_use]
	pub fn identify(path: impl AsRef<Path>) -> Option<Self> {
		let path = path.as_ref();
		Self::ALL
			.into_iter()
			.find(|kind| kind.format().detect(path))
	}

	#[must_use]
	pub const fn needs_migration(self) -> bool {
		!matches!(self, Self::Current)
	}
}

impl fmt::Display for FormatKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Current => "current",
			Self::LegacyJson => "legacy json",
			Self::RawDump => "raw dump",
		})
	}
}

/// A read-only view of a tag in any layout.
#[derive(Debug, Clone, Serialize)]
pub struct SourceTag {
	pub kind: FormatKind,
	pub path: PathBuf,
	#[serde(flatten)]
	pub data: TagData,
	/// Avatar blob, if the layout carries one and it is present.
	#[serde(skip)]
	pub mii: Option<MiiCharInfo>,
}

pub trait TagFormat: Send + Sync {
	fn kind(&self) -> FormatKind;

	/// Existence and extension checks only.
	fn detect(&self, path: &Path) -> bool;

	/// Parses every mandatory field.
	fn load(&self, path: &Path) -> Result<SourceTag, TagError>;

	fn validate(&self, path: &Path) -> bool {
		self.detect(path) && self.load(path).is_ok()
	}

	/// Directory the current-layout tag will occupy after migrating `path`.
	fn migration_target(&self, path: &Path) -> Result<PathBuf, TagError> {
		Ok(path.to_path_buf())
	}

	/// Deletes every file belonging to this layout at `path`.
	fn remove(&self, path: &Path) -> Result<(), FileIOError>;
}
