//! Depth-first discovery of stored tags.
//!
//! Directories that are not tags are treated as folders and descended into, so users
//! can organize their collection freely. Tags in older layouts are migrated as they
//! are found and yielded in their upgraded form.

use crate::tag::{
	format::FormatKind,
	migrate::{migrate_from, MigrationError},
	VirtualTag,
};

use std::{
	fs,
	path::{Path, PathBuf},
	vec,
};

use tagemu_utils::error::FileIOError;
use tracing::{debug, info, warn};

/// Counters for a traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
	pub found: usize,
	pub migrated: usize,
	pub skipped: usize,
}

/// Restartable cursor over every valid tag below a root directory.
pub struct TagIterator {
	root: PathBuf,
	staging_dir: PathBuf,
	stack: Vec<vec::IntoIter<PathBuf>>,
	stats: ScanStats,
}

impl TagIterator {
	/// Opens `root`, creating it if needed. `staging_dir` is used for migrations and is
	/// never treated as part of the collection.
	pub fn new(
		root: impl Into<PathBuf>,
		staging_dir: impl Into<PathBuf>,
	) -> Result<Self, FileIOError> {
		let mut iterator = Self {
			root: root.into(),
			staging_dir: staging_dir.into(),
			stack: Vec::new(),
			stats: ScanStats::default(),
		};
		iterator.reset()?;

		Ok(iterator)
	}

	/// Discards the cursor position and starts over from the root.
	pub fn reset(&mut self) -> Result<(), FileIOError> {
		fs::create_dir_all(&self.root).map_err(|e| FileIOError::from((self.root.as_path(), e)))?;

		self.stack.clear();
		self.stack.push(sorted_entries(&self.root)?);
		self.stats = ScanStats::default();

		Ok(())
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	#[must_use]
	pub const fn stats(&self) -> ScanStats {
		self.stats
	}

	fn visit(&mut self, path: PathBuf) -> Option<VirtualTag> {
		if path == self.staging_dir {
			return None;
		}

		match FormatKind::identify(&path) {
			Some(FormatKind::Current) => match VirtualTag::load(&path) {
				Ok(tag) => {
					self.stats.found += 1;
					Some(tag)
				}
				Err(e) => {
					warn!(?path, %e, "Skipping unreadable tag");
					self.stats.skipped += 1;
					None
				}
			},
			Some(kind) => match migrate_from(kind, &path, &self.staging_dir) {
				Ok(tag) => {
					self.stats.found += 1;
					self.stats.migrated += 1;
					Some(tag)
				}
				Err(e @ MigrationError::AreasStaged { .. }) => {
					warn!(%e, "Tag migration needs manual recovery");
					self.stats.skipped += 1;
					None
				}
				Err(e) => {
					debug!(?path, %kind, %e, "Skipping entry that failed to migrate");
					self.stats.skipped += 1;
					None
				}
			},
			None if path.is_dir() => {
				match sorted_entries(&path) {
					Ok(entries) => self.stack.push(entries),
					Err(e) => warn!(%e, "Skipping unreadable folder"),
				}
				None
			}
			None => None,
		}
	}
}

impl Iterator for TagIterator {
	type Item = VirtualTag;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let Some(path) = self.stack.last_mut()?.next() else {
				self.stack.pop();
				continue;
			};

			if let Some(tag) = self.visit(path) {
				return Some(tag);
			}
		}
	}
}

fn sorted_entries(dir: &Path) -> Result<vec::IntoIter<PathBuf>, FileIOError> {
	let mut entries = fs::read_dir(dir)
		.map_err(|e| FileIOError::from((dir, e)))?
		.map(|entry| entry.map(|entry| entry.path()))
		.collect::<Result<Vec<_>, _>>()
		.map_err(|e| FileIOError::from((dir, e)))?;
	entries.sort();

	Ok(entries.into_iter())
}

/// Walks the whole collection once, migrating every older tag found.
pub fn scan_and_migrate(
	root: impl Into<PathBuf>,
	staging_dir: impl Into<PathBuf>,
) -> Result<ScanStats, FileIOError> {
	let mut iterator = TagIterator::new(root, staging_dir)?;
	iterator.by_ref().for_each(drop);

	let stats = iterator.stats();
	info!(
		root = ?iterator.root(),
		found = stats.found,
		migrated = stats.migrated,
		skipped = stats.skipped,
		"Finished tag scan"
	);

	Ok(stats)
}
