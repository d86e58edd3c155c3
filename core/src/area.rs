//! Per-application save data ("areas") stored next to a tag.
//!
//! Every call goes straight to disk; nothing is cached, so existence and size always
//! reflect the backing file.

use std::{
	fs,
	io::ErrorKind,
	path::{Path, PathBuf},
};

use tagemu_utils::{error::FileIOError, fs::remove_file_if_exists};
use tracing::trace;

pub const AREAS_DIR_NAME: &str = "areas";
pub const AREA_FILE_EXTENSION: &str = "bin";

/// Size advertised to readers for a freshly created area.
pub const DEFAULT_AREA_SIZE: u32 = 0xD8;

pub type AreaId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaManager {
	dir: PathBuf,
}

impl AreaManager {
	#[must_use]
	pub fn new(tag_path: impl AsRef<Path>) -> Self {
		Self {
			dir: tag_path.as_ref().join(AREAS_DIR_NAME),
		}
	}

	#[must_use]
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	#[must_use]
	pub fn area_path(&self, id: AreaId) -> PathBuf {
		self.dir.join(format!("0x{id:08X}.{AREA_FILE_EXTENSION}"))
	}

	#[must_use]
	pub fn exists(&self, id: AreaId) -> bool {
		self.area_path(id).is_file()
	}

	/// Size of the area in bytes, `0` when it does not exist.
	pub fn size(&self, id: AreaId) -> Result<usize, FileIOError> {
		let path = self.area_path(id);
		match fs::metadata(&path) {
			Ok(metadata) => Ok(usize::try_from(metadata.len()).unwrap_or(usize::MAX)),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
			Err(e) => Err(FileIOError::from((path.as_path(), e))),
		}
	}

	/// Copies the start of the area into `buf`, returning how many bytes were copied.
	pub fn read(&self, id: AreaId, buf: &mut [u8]) -> Result<usize, FileIOError> {
		let path = self.area_path(id);
		let data = fs::read(&path).map_err(|e| FileIOError::from((path.as_path(), e)))?;

		let len = data.len().min(buf.len());
		buf[..len].copy_from_slice(&data[..len]);

		Ok(len)
	}

	/// Replaces the whole area with `data`.
	pub fn write(&self, id: AreaId, data: &[u8]) -> Result<(), FileIOError> {
		fs::create_dir_all(&self.dir).map_err(|e| FileIOError::from((self.dir.as_path(), e)))?;

		let path = self.area_path(id);
		fs::write(&path, data)
			.map_err(|e| FileIOError::from((path.as_path(), e, "Failed to write area")))?;
		trace!(?path, size = data.len(), "Wrote area");

		Ok(())
	}

	/// Writes a new area, returning `false` without touching anything if it already exists.
	pub fn create(&self, id: AreaId, data: &[u8]) -> Result<bool, FileIOError> {
		if self.exists(id) {
			return Ok(false);
		}

		self.write(id, data).map(|()| true)
	}

	pub fn recreate(&self, id: AreaId, data: &[u8]) -> Result<(), FileIOError> {
		self.delete(id)?;
		self.write(id, data)
	}

	pub fn delete(&self, id: AreaId) -> Result<(), FileIOError> {
		remove_file_if_exists(self.area_path(id))
	}

	/// Ids of every area present, in ascending order.
	pub fn list(&self) -> Result<Vec<AreaId>, FileIOError> {
		let entries = match fs::read_dir(&self.dir) {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(FileIOError::from((self.dir.as_path(), e))),
		};

		let mut ids = Vec::new();
		for entry in entries {
			let entry = entry.map_err(|e| FileIOError::from((self.dir.as_path(), e)))?;
			if let Some(id) = entry.file_name().to_str().and_then(parse_area_file_name) {
				ids.push(id);
			}
		}
		ids.sort_unstable();

		Ok(ids)
	}
}

fn parse_area_file_name(name: &str) -> Option<AreaId> {
	let hex = name
		.strip_suffix(AREA_FILE_EXTENSION)?
		.strip_suffix('.')?
		.strip_prefix("0x")?;
	AreaId::from_str_radix(hex, 16).ok()
}
