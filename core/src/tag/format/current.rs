use super::{FormatKind, SourceTag, TagFormat};
use crate::tag::{mii_path, MiiCharInfo, TagError, TagRecord, FLAG_FILE_NAME, RECORD_FILE_NAME};

use std::path::Path;

use tagemu_utils::{error::FileIOError, fs::remove_dir_all_if_exists};

pub struct CurrentFormat;

impl TagFormat for CurrentFormat {
	fn kind(&self) -> FormatKind {
		FormatKind::Current
	}

	fn detect(&self, path: &Path) -> bool {
		path.join(FLAG_FILE_NAME).is_file() && path.join(RECORD_FILE_NAME).is_file()
	}

	fn load(&self, path: &Path) -> Result<SourceTag, TagError> {
		let record = TagRecord::read(path)?;
		let mii = MiiCharInfo::read(mii_path(path, &record.mii_charinfo_file)?)?;

		Ok(SourceTag {
			kind: FormatKind::Current,
			path: path.to_path_buf(),
			data: record.data(),
			mii,
		})
	}

	fn remove(&self, path: &Path) -> Result<(), FileIOError> {
		remove_dir_all_if_exists(path)
	}
}
