use std::{
	any::type_name,
	fs::File,
	io::{BufReader, Seek, Write},
	marker::PhantomData,
	path::Path,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tagemu_utils::error::FileIOError;
use thiserror::Error;
use tracing::info;

/// is used to decode the configuration and work out what migrations need to be applied before the config can be properly loaded.
/// This allows us to migrate breaking changes to the config format between releases.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BaseConfig {
	/// version of the document layout, bumped whenever a migration is added.
	pub version: u32,
	// Collect all extra fields
	#[serde(flatten)]
	other: Map<String, Value>,
}

/// Applies versioned migrations to a JSON document on disk so breaking changes don't require users to reset their setup.
pub struct FileMigrator<T>
where
	T: Serialize + DeserializeOwned + Default,
{
	pub current_version: u32,
	pub migration_fn: fn(u32, &mut Map<String, Value>) -> Result<(), MigratorError>,
	pub phantom: PhantomData<T>,
}

impl<T> FileMigrator<T>
where
	T: Serialize + DeserializeOwned + Default,
{
	pub fn load(&self, path: &Path) -> Result<T, MigratorError> {
		let exists = path
			.try_exists()
			.map_err(|e| FileIOError::from((path, e)))?;

		if !exists {
			return Ok(serde_json::from_value(Value::Object(
				self.save(path, T::default())?.other,
			))?);
		}

		let mut file = File::options()
			.read(true)
			.write(true)
			.open(path)
			.map_err(|e| FileIOError::from((path, e)))?;
		let mut cfg: BaseConfig = serde_json::from_reader(BufReader::new(&mut file))?;

		if cfg.version > self.current_version {
			return Err(MigratorError::YourAppIsOutdated);
		}

		let is_latest = cfg.version == self.current_version;
		for v in (cfg.version + 1)..=self.current_version {
			cfg.version = v;
			if let Err(err) = (self.migration_fn)(v, &mut cfg.other) {
				Self::rewrite(&mut file, path, &cfg)?; // Writes updated version
				return Err(err);
			}
		}

		if !is_latest {
			Self::rewrite(&mut file, path, &cfg)?;
			info!(?path, version = cfg.version, "Migrated config file");
		}

		Ok(serde_json::from_value(Value::Object(cfg.other))?)
	}

	pub fn save(&self, path: &Path, content: T) -> Result<BaseConfig, MigratorError> {
		let Value::Object(other) = serde_json::to_value(content)? else {
			return Err(MigratorError::Custom(format!(
				"Type '{}' as generic `Migrator::T` must be serialiable to a Serde object!",
				type_name::<T>()
			)));
		};

		let config = BaseConfig {
			version: self.current_version,
			other,
		};

		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(|e| FileIOError::from((parent, e)))?;
		}

		let mut file = File::create(path).map_err(|e| FileIOError::from((path, e)))?;
		file.write_all(serde_json::to_string_pretty(&config)?.as_bytes())
			.map_err(|e| FileIOError::from((path, e)))?;

		Ok(config)
	}

	fn rewrite(file: &mut File, path: &Path, cfg: &BaseConfig) -> Result<(), MigratorError> {
		let contents = serde_json::to_string_pretty(cfg)?;

		file.rewind()
			.and_then(|()| file.set_len(0))
			.and_then(|()| file.write_all(contents.as_bytes()))
			.map_err(|e| FileIOError::from((path, e, "Failed to rewrite migrated config")))?;

		Ok(())
	}
}

#[derive(Error, Debug)]
pub enum MigratorError {
	#[error("error saving or loading the config from the filesystem: {0}")]
	FileIO(#[from] FileIOError),
	#[error("error serializing or deserializing the JSON in the config file: {0}")]
	Json(#[from] serde_json::Error),
	#[error(
		"the config file is for a newer version of the app. Please update to the latest version to load it!"
	)]
	YourAppIsOutdated,
	#[error("custom migration error: {0}")]
	Custom(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;
	use tempfile::tempdir;

	#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
	struct Sample {
		a: u32,
		#[serde(default)]
		b: String,
	}

	fn migration(to: u32, config: &mut Map<String, Value>) -> Result<(), MigratorError> {
		match to {
			2 => {
				config.insert("b".into(), Value::String("added in v2".into()));
				Ok(())
			}
			v => Err(MigratorError::Custom(format!("no migration to v{v}"))),
		}
	}

	const MIGRATOR: FileMigrator<Sample> = FileMigrator {
		current_version: 2,
		migration_fn: migration,
		phantom: PhantomData,
	};

	#[test]
	fn creates_missing_file_with_defaults() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("nested").join("config.json");

		assert_eq!(MIGRATOR.load(&path).unwrap(), Sample::default());
		assert!(path.is_file());
	}

	#[test]
	fn migrates_older_documents_in_place() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, r#"{"version": 1, "a": 7}"#).unwrap();

		let loaded = MIGRATOR.load(&path).unwrap();
		assert_eq!(
			loaded,
			Sample {
				a: 7,
				b: "added in v2".into()
			}
		);

		let on_disk: BaseConfig =
			serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
		assert_eq!(on_disk.version, 2);
	}

	#[test]
	fn refuses_newer_documents() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, r#"{"version": 9, "a": 1}"#).unwrap();

		assert!(matches!(
			MIGRATOR.load(&path),
			Err(MigratorError::YourAppIsOutdated)
		));
	}
}
