//! Small filesystem helpers shared by the engine crates.
//!
//! Every failure is reported as a [`FileIOError`] carrying the offending path.

use crate::error::FileIOError;

use std::{
	fs,
	io::ErrorKind,
	path::{Path, PathBuf},
};

use tracing::trace;

/// Checks for a presence flag file.
#[must_use]
pub fn has_flag(path: impl AsRef<Path>) -> bool {
	path.as_ref().is_file()
}

/// Creates or removes a presence flag file, creating its parent directory if needed.
pub fn set_flag(path: impl AsRef<Path>, enabled: bool) -> Result<(), FileIOError> {
	let path = path.as_ref();

	if enabled {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|e| FileIOError::from((parent, e)))?;
		}
		fs::write(path, b"").map_err(|e| FileIOError::from((path, e, "Failed to create flag")))
	} else {
		remove_file_if_exists(path)
	}
}

pub fn remove_file_if_exists(path: impl AsRef<Path>) -> Result<(), FileIOError> {
	let path = path.as_ref();
	match fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
		Err(e) => Err(FileIOError::from((path, e))),
	}
}

pub fn remove_dir_all_if_exists(path: impl AsRef<Path>) -> Result<(), FileIOError> {
	let path = path.as_ref();
	match fs::remove_dir_all(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
		Err(e) => Err(FileIOError::from((path, e))),
	}
}

/// Removes `path` (if present) and creates it again empty.
pub fn recreate_dir(path: impl AsRef<Path>) -> Result<(), FileIOError> {
	let path = path.as_ref();
	remove_dir_all_if_exists(path)?;
	fs::create_dir_all(path).map_err(|e| FileIOError::from((path, e)))
}

/// Copies every regular file directly inside `from` with the given extension into `to`.
///
/// Returns the destination paths of the copied files. Subdirectories are ignored.
pub fn copy_files_with_extension(
	from: impl AsRef<Path>,
	to: impl AsRef<Path>,
	extension: &str,
) -> Result<Vec<PathBuf>, FileIOError> {
	let (from, to) = (from.as_ref(), to.as_ref());

	let mut copied = Vec::new();
	for entry in fs::read_dir(from).map_err(|e| FileIOError::from((from, e)))? {
		let entry = entry.map_err(|e| FileIOError::from((from, e)))?;
		let src = entry.path();

		if !src.is_file() || src.extension().and_then(|ext| ext.to_str()) != Some(extension) {
			continue;
		}

		let dst = to.join(entry.file_name());
		fs::copy(&src, &dst)
			.map_err(|e| FileIOError::from((src.as_path(), e, "Failed to copy file")))?;
		trace!(?src, ?dst, "Copied file");
		copied.push(dst);
	}

	Ok(copied)
}
