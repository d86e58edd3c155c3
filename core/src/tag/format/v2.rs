use super::{FormatKind, SourceTag, TagFormat};
use crate::tag::{
	mii_path, Date, MiiCharInfo, TagData, TagError, TagIdentity, UuidInfo, DEFAULT_MII_FILE_NAME,
	LEGACY_IDENTITY_LEN,
};

use std::{fs, path::Path};

use serde::{de::DeserializeOwned, Deserialize};
use tagemu_utils::{error::FileIOError, fs::remove_dir_all_if_exists};

const TAG_FILE_NAME: &str = "tag.json";
const REGISTER_FILE_NAME: &str = "register.json";
const COMMON_FILE_NAME: &str = "common.json";
const MODEL_FILE_NAME: &str = "model.json";

const FILE_NAMES: [&str; 4] = [
	TAG_FILE_NAME,
	REGISTER_FILE_NAME,
	COMMON_FILE_NAME,
	MODEL_FILE_NAME,
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagJson {
	#[serde(default)]
	random_uuid: bool,
	#[serde(default)]
	uuid: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterJson {
	name: String,
	#[serde(default)]
	mii_char_info: Option<String>,
	first_write_date: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommonJson {
	last_write_date: String,
	#[serde(default)]
	write_counter: u16,
	#[serde(default)]
	version: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelJson {
	amiibo_id: String,
}

/// Four-file layout where byte arrays are hex strings and dates are `"YYYY-MM-DD"`.
pub struct LegacyJsonFormat;

fn read_json<T: DeserializeOwned>(dir: &Path, file_name: &str) -> Result<T, TagError> {
	let path = dir.join(file_name);
	let bytes = fs::read(&path).map_err(|e| FileIOError::from((path.as_path(), e)))?;
	serde_json::from_slice(&bytes).map_err(|e| TagError::json(&path, e))
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, TagError> {
	hex::decode(value.trim()).map_err(|source| TagError::InvalidHex { field, source })
}

impl TagFormat for LegacyJsonFormat {
	fn kind(&self) -> FormatKind {
		FormatKind::LegacyJson
	}

	fn detect(&self, path: &Path) -> bool {
		path.is_dir() && FILE_NAMES.iter().all(|name| path.join(name).is_file())
	}

	fn load(&self, path: &Path) -> Result<SourceTag, TagError> {
		let tag: TagJson = read_json(path, TAG_FILE_NAME)?;
		let register: RegisterJson = read_json(path, REGISTER_FILE_NAME)?;
		let common: CommonJson = read_json(path, COMMON_FILE_NAME)?;
		let model: ModelJson = read_json(path, MODEL_FILE_NAME)?;

		let uuid_info = match (tag.random_uuid, tag.uuid) {
			(true, uuid) => UuidInfo {
				random: true,
				uuid: uuid
					.map(|uuid| decode_hex("uuid", &uuid))
					.transpose()?
					.map(|uuid| UuidInfo::fixed(&uuid).uuid)
					.unwrap_or_default(),
			},
			(false, Some(uuid)) => UuidInfo::fixed(&decode_hex("uuid", &uuid)?),
			(false, None) => {
				return Err(TagError::MissingField {
					path: path.join(TAG_FILE_NAME).into(),
					field: "uuid",
				})
			}
		};

		let raw_id = decode_hex("amiiboId", &model.amiibo_id)?;
		let raw_id = <[u8; LEGACY_IDENTITY_LEN]>::try_from(raw_id.as_slice()).map_err(|_| {
			TagError::InvalidLength {
				field: "amiiboId",
				expected: LEGACY_IDENTITY_LEN,
				found: raw_id.len(),
			}
		})?;

		let mii_file_name = register
			.mii_char_info
			.as_deref()
			.filter(|name| !name.is_empty())
			.unwrap_or(DEFAULT_MII_FILE_NAME);
		let mii = MiiCharInfo::read(mii_path(path, mii_file_name)?)?;

		Ok(SourceTag {
			kind: FormatKind::LegacyJson,
			path: path.to_path_buf(),
			data: TagData {
				uuid_info,
				name: register.name,
				identity: TagIdentity::from_legacy_bytes(raw_id),
				first_write_date: Date::parse_iso(&register.first_write_date)?,
				last_write_date: Date::parse_iso(&common.last_write_date)?,
				write_counter: common.write_counter,
				version: common.version,
			},
			mii,
		})
	}

	fn remove(&self, path: &Path) -> Result<(), FileIOError> {
		remove_dir_all_if_exists(path)
	}
}
