use super::{FormatKind, SourceTag, TagFormat};
use crate::tag::{Date, TagData, TagError, TagIdentity, UuidInfo, LEGACY_IDENTITY_LEN, UUID_LEN};

use std::{
	fs,
	path::{Path, PathBuf},
};

use tagemu_utils::{
	error::{FileIOError, NonUtf8PathError},
	fs::remove_file_if_exists,
};

const EXTENSION: &str = "bin";

// {uuid: 10, vendor: 6, lock: 1, counter: 2, capability: 1, crypto: 64, identity: 8}
const IDENTITY_OFFSET: usize = UUID_LEN + 6 + 1 + 2 + 1 + 64;
pub const MIN_DUMP_LEN: usize = IDENTITY_OFFSET + LEGACY_IDENTITY_LEN;

/// A bare memory dump, named after the figure (`<name>.bin`).
pub struct RawDumpFormat;

fn file_stem(path: &Path) -> Result<&str, TagError> {
	path.file_stem()
		.and_then(|stem| stem.to_str())
		.ok_or_else(|| NonUtf8PathError(path.into()).into())
}

impl TagFormat for RawDumpFormat {
	fn kind(&self) -> FormatKind {
		FormatKind::RawDump
	}

	fn detect(&self, path: &Path) -> bool {
		path.is_file()
			&& path
				.extension()
				.and_then(|ext| ext.to_str())
				.is_some_and(|ext| ext.eq_ignore_ascii_case(EXTENSION))
	}

	fn load(&self, path: &Path) -> Result<SourceTag, TagError> {
		let bytes = fs::read(path).map_err(|e| FileIOError::from((path, e)))?;
		if bytes.len() < MIN_DUMP_LEN {
			return Err(TagError::TooSmall {
				path: path.into(),
				size: bytes.len() as u64,
			});
		}

		let mut raw_id = [0; LEGACY_IDENTITY_LEN];
		raw_id.copy_from_slice(&bytes[IDENTITY_OFFSET..MIN_DUMP_LEN]);
		let today = Date::today();

		Ok(SourceTag {
			kind: FormatKind::RawDump,
			path: path.to_path_buf(),
			data: TagData {
				uuid_info: UuidInfo::fixed(&bytes[..UUID_LEN]),
				name: file_stem(path)?.to_string(),
				identity: TagIdentity::from_legacy_bytes(raw_id),
				first_write_date: today,
				last_write_date: today,
				write_counter: 0,
				version: 0,
			},
			mii: None,
		})
	}

	/// `<dir>/<name>.bin` becomes `<dir>/<name>/`, or `<dir>/<name>_<n>/` with the first
	/// free `n` when that is taken.
	fn migration_target(&self, path: &Path) -> Result<PathBuf, TagError> {
		let name = file_stem(path)?;
		let parent = path.parent().unwrap_or_else(|| Path::new(""));

		let mut target = parent.join(name);
		let mut suffix = 0_usize;
		while target.exists() {
			suffix += 1;
			target = parent.join(format!("{name}_{suffix}"));
		}

		Ok(target)
	}

	fn remove(&self, path: &Path) -> Result<(), FileIOError> {
		remove_file_if_exists(path)
	}
}
