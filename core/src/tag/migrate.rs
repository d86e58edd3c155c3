//! One-way upgrade of older layouts to the current one.
//!
//! Areas are never moved in a single step: they are copied to a staging directory,
//! the old layout is removed, the new one is written and only then are the areas
//! copied back. If anything fails after staging, the staged copies are left in place
//! and [`MigrationError::AreasStaged`] names the directory to recover them from.

use super::{format::FormatKind, MiiCharInfo, TagData, TagError, VirtualTag};
use crate::area::{AreaManager, AREA_FILE_EXTENSION};

use std::{fs, path::Path};

use tagemu_utils::{
	error::FileIOError,
	fs::{copy_files_with_extension, recreate_dir, remove_dir_all_if_exists},
};
use tracing::{info, instrument, warn};

#[derive(thiserror::Error, Debug)]
pub enum MigrationError {
	#[error(
		"staging directory still holds areas from an earlier failed migration: <path='{}'>",
		.0.display()
	)]
	StagingOccupied(Box<Path>),
	#[error(
		"migration of <path='{}'> failed, its areas are left at <staging='{}'>: {source}",
		.path.display(),
		.staging.display()
	)]
	AreasStaged {
		path: Box<Path>,
		staging: Box<Path>,
		#[source]
		source: TagError,
	},

	#[error(transparent)]
	Tag(#[from] TagError),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
}

/// Migrates whatever tag layout lives at `path`; current-layout tags are simply loaded.
pub fn migrate(
	path: impl AsRef<Path>,
	staging_dir: impl AsRef<Path>,
) -> Result<VirtualTag, MigrationError> {
	let path = path.as_ref();
	let kind = FormatKind::identify(path).ok_or_else(|| TagError::UnrecognizedFormat(path.into()))?;

	migrate_from(kind, path, staging_dir)
}

#[instrument(skip(staging_dir), err)]
pub fn migrate_from(
	kind: FormatKind,
	path: &Path,
	staging_dir: impl AsRef<Path>,
) -> Result<VirtualTag, MigrationError> {
	migrate_with(kind, path, staging_dir.as_ref(), |target: &Path, data, mii| {
		VirtualTag::create(target, data, mii)
	})
}

/// [`migrate_from`] with the step writing the upgraded tag supplied by the caller.
fn migrate_with<F>(
	kind: FormatKind,
	path: &Path,
	staging_dir: &Path,
	create: F,
) -> Result<VirtualTag, MigrationError>
where
	F: FnOnce(&Path, TagData, Option<MiiCharInfo>) -> Result<VirtualTag, TagError>,
{
	let format = kind.format();

	if !format.detect(path) {
		return Err(TagError::UnrecognizedFormat(path.into()).into());
	}

	let source = format.load(path)?;
	if !kind.needs_migration() {
		return Ok(VirtualTag::load(path)?);
	}

	let target = format.migration_target(path)?;
	let source_areas = AreaManager::new(path);
	let staged = source_areas.dir().is_dir();

	if staged {
		ensure_staging_free(staging_dir)?;
		recreate_dir(staging_dir)?;
		copy_files_with_extension(source_areas.dir(), staging_dir, AREA_FILE_EXTENSION)?;
	}

	let commit = || -> Result<VirtualTag, TagError> {
		format.remove(path)?;

		let tag = create(&target, source.data, source.mii)?;

		if staged {
			let areas_dir = tag.areas().dir();
			recreate_dir(areas_dir)?;
			copy_files_with_extension(staging_dir, areas_dir, AREA_FILE_EXTENSION)?;
			remove_dir_all_if_exists(staging_dir)?;
		}

		Ok(tag)
	};

	match commit() {
		Ok(tag) => {
			info!(?target, name = tag.name(), "Migrated tag");
			Ok(tag)
		}
		Err(source) if staged => {
			warn!(?staging_dir, "Areas left staged after a failed migration");
			Err(MigrationError::AreasStaged {
				path: path.into(),
				staging: staging_dir.into(),
				source,
			})
		}
		Err(e) => Err(e.into()),
	}
}

fn ensure_staging_free(staging_dir: &Path) -> Result<(), MigrationError> {
	match fs::read_dir(staging_dir) {
		Ok(mut entries) => {
			if entries.next().is_some() {
				Err(MigrationError::StagingOccupied(staging_dir.into()))
			} else {
				Ok(())
			}
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(FileIOError::from((staging_dir, e)).into()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::io;

	use pretty_assertions::assert_eq;
	use tempfile::tempdir;

	fn write_legacy_tag(dir: &Path, area: &[u8]) {
		fs::create_dir_all(dir.join("areas")).unwrap();
		for (name, contents) in [
			("tag.json", r#"{"randomUuid": false, "uuid": "04aabbccddeeff"}"#),
			(
				"register.json",
				r#"{"name": "Fox", "firstWriteDate": "2018-12-07"}"#,
			),
			(
				"common.json",
				r#"{"lastWriteDate": "2019-01-01", "writeCounter": 2}"#,
			),
			("model.json", r#"{"amiiboId": "0580000000050002"}"#),
		] {
			fs::write(dir.join(name), contents).unwrap();
		}
		fs::write(dir.join("areas").join("0x00000001.bin"), area).unwrap();
	}

	#[test]
	fn failure_after_staging_leaves_areas_for_recovery() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("fox");
		let staging = dir.path().join("temp_areas");
		write_legacy_tag(&path, &[1, 2, 3]);

		let err = migrate_with(FormatKind::LegacyJson, &path, &staging, |target, _, _| {
			Err(FileIOError::from((target, io::Error::other("disk full"))).into())
		})
		.unwrap_err();

		let MigrationError::AreasStaged {
			path: failed,
			staging: staged_at,
			..
		} = err
		else {
			panic!("expected staged areas, got {err:?}");
		};
		assert_eq!(&*failed, path.as_path());
		assert_eq!(&*staged_at, staging.as_path());
		assert_eq!(fs::read(staging.join("0x00000001.bin")).unwrap(), vec![1, 2, 3]);

		// Leftovers block the next migration instead of being overwritten
		let other = dir.path().join("falco");
		write_legacy_tag(&other, &[9]);
		assert!(matches!(
			migrate_from(FormatKind::LegacyJson, &other, &staging),
			Err(MigrationError::StagingOccupied(_))
		));
		assert_eq!(fs::read(staging.join("0x00000001.bin")).unwrap(), vec![1, 2, 3]);
		assert_eq!(FormatKind::identify(&other), Some(FormatKind::LegacyJson));
	}

	#[test]
	fn failure_before_staging_touches_nothing() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("fox");
		let staging = dir.path().join("temp_areas");
		write_legacy_tag(&path, &[1]);
		fs::write(path.join("model.json"), r#"{"amiiboId": "05"}"#).unwrap();

		assert!(matches!(
			migrate_from(FormatKind::LegacyJson, &path, &staging),
			Err(MigrationError::Tag(TagError::InvalidLength { .. }))
		));
		assert!(!staging.exists());
		assert_eq!(FormatKind::identify(&path), Some(FormatKind::LegacyJson));
	}
}
