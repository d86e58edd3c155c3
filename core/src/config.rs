//! `config.json`, kept in the data directory and upgraded through [`FileMigrator`].

use crate::util::migrator::{FileMigrator, MigratorError};

use std::{
	marker::PhantomData,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Version 1 only knew about the tag directory (`amiibo_dir`).
const CONFIG_VERSION: u32 = 2;

const DEFAULT_TAGS_DIR: &str = "amiibo";
const DEFAULT_STAGING_DIR: &str = "temp_areas";
const DEFAULT_FLAGS_DIR: &str = "flags";
const DEFAULT_RECONCILE_INTERVAL_MS: u64 = 100;
/// Handheld controller slot.
const DEFAULT_NPAD_ID: u32 = 0x20;
const DEFAULT_LOG_FILTER: &str = "tagemu_core=info,tagemu=info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
	/// Root of the tag collection. Relative paths are resolved against the data directory.
	pub tags_dir: PathBuf,
	/// Scratch space for migrations; must not live inside `tags_dir`.
	pub staging_dir: PathBuf,
	/// Holds presence flags such as the persisted activation.
	pub flags_dir: PathBuf,
	pub reconcile_interval_ms: u64,
	pub npad_id: u32,
	pub log_filter: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			tags_dir: DEFAULT_TAGS_DIR.into(),
			staging_dir: DEFAULT_STAGING_DIR.into(),
			flags_dir: DEFAULT_FLAGS_DIR.into(),
			reconcile_interval_ms: DEFAULT_RECONCILE_INTERVAL_MS,
			npad_id: DEFAULT_NPAD_ID,
			log_filter: DEFAULT_LOG_FILTER.to_string(),
		}
	}
}

fn migrate(to_version: u32, config: &mut Map<String, Value>) -> Result<(), MigratorError> {
	match to_version {
		2 => {
			let tags_dir = config
				.remove("amiibo_dir")
				.unwrap_or_else(|| Value::String(DEFAULT_TAGS_DIR.into()));
			config.insert("tags_dir".into(), tags_dir);

			let defaults = [
				("staging_dir", Value::String(DEFAULT_STAGING_DIR.into())),
				("flags_dir", Value::String(DEFAULT_FLAGS_DIR.into())),
				(
					"reconcile_interval_ms",
					Value::from(DEFAULT_RECONCILE_INTERVAL_MS),
				),
				("npad_id", Value::from(DEFAULT_NPAD_ID)),
				("log_filter", Value::String(DEFAULT_LOG_FILTER.into())),
			];
			for (key, value) in defaults {
				config.entry(key).or_insert(value);
			}

			Ok(())
		}
		v => Err(MigratorError::Custom(format!(
			"missing migration for config version {v}"
		))),
	}
}

const MIGRATOR: FileMigrator<Config> = FileMigrator {
	current_version: CONFIG_VERSION,
	migration_fn: migrate,
	phantom: PhantomData,
};

impl Config {
	/// Loads (creating or upgrading as needed) the config in `data_dir`, with every
	/// directory resolved to an absolute path.
	pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, MigratorError> {
		let data_dir = data_dir.as_ref();
		MIGRATOR
			.load(&data_dir.join(CONFIG_FILE_NAME))
			.map(|config| config.resolved(data_dir))
	}

	pub fn save(&self, data_dir: impl AsRef<Path>) -> Result<(), MigratorError> {
		MIGRATOR
			.save(&data_dir.as_ref().join(CONFIG_FILE_NAME), self.clone())
			.map(|_| ())
	}

	#[must_use]
	pub fn resolved(mut self, data_dir: impl AsRef<Path>) -> Self {
		let data_dir = data_dir.as_ref();
		self.tags_dir = data_dir.join(&self.tags_dir);
		self.staging_dir = data_dir.join(&self.staging_dir);
		self.flags_dir = data_dir.join(&self.flags_dir);
		self
	}

	#[must_use]
	pub const fn reconcile_interval(&self) -> Duration {
		Duration::from_millis(self.reconcile_interval_ms)
	}
}
