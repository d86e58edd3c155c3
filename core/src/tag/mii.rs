use std::{fmt, fs, path::Path};

use rand::Rng;
use tagemu_utils::error::FileIOError;
use tracing::debug;
use uuid::Uuid;

pub const CHARINFO_LEN: usize = 0x58;

const CREATE_ID_LEN: usize = 0x10;
const NICKNAME_OFFSET: usize = CREATE_ID_LEN;
const NICKNAME_UNITS: usize = 11;
const ATTRIBUTES_OFFSET: usize = NICKNAME_OFFSET + NICKNAME_UNITS * 2;
const DEFAULT_NICKNAME: &str = "no name";

/// Opaque avatar blob attached to a tag's registration data.
///
/// Only its size and the leading create id / nickname are interpreted here.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MiiCharInfo([u8; CHARINFO_LEN]);

impl MiiCharInfo {
	#[must_use]
	pub const fn from_bytes(bytes: [u8; CHARINFO_LEN]) -> Self {
		Self(bytes)
	}

	#[must_use]
	pub const fn as_bytes(&self) -> &[u8; CHARINFO_LEN] {
		&self.0
	}

	#[must_use]
	pub fn generate_random() -> Self {
		let mut bytes = [0; CHARINFO_LEN];
		bytes[..CREATE_ID_LEN].copy_from_slice(Uuid::new_v4().as_bytes());

		for (unit, chunk) in DEFAULT_NICKNAME
			.encode_utf16()
			.take(NICKNAME_UNITS - 1)
			.zip(bytes[NICKNAME_OFFSET..ATTRIBUTES_OFFSET].chunks_exact_mut(2))
		{
			chunk.copy_from_slice(&unit.to_le_bytes());
		}

		// Attribute bytes stay small so every generated avatar is in range for the host
		let mut rng = rand::thread_rng();
		for byte in &mut bytes[ATTRIBUTES_OFFSET..] {
			*byte = rng.gen_range(0..0x10);
		}

		Self(bytes)
	}

	#[must_use]
	pub fn create_id(&self) -> Uuid {
		let mut id = [0; CREATE_ID_LEN];
		id.copy_from_slice(&self.0[..CREATE_ID_LEN]);
		Uuid::from_bytes(id)
	}

	/// Reads an avatar blob, returning `None` when the file is absent or has the wrong size.
	pub fn read(path: impl AsRef<Path>) -> Result<Option<Self>, FileIOError> {
		let path = path.as_ref();
		match fs::read(path) {
			Ok(bytes) => Ok(<[u8; CHARINFO_LEN]>::try_from(bytes.as_slice())
				.ok()
				.map(Self)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(FileIOError::from((path, e))),
		}
	}

	pub fn write(&self, path: impl AsRef<Path>) -> Result<(), FileIOError> {
		let path = path.as_ref();
		fs::write(path, self.0).map_err(|e| FileIOError::from((path, e, "Failed to write mii")))
	}

	/// Reads the avatar at `path`, generating and persisting a fresh one when missing.
	pub fn load_or_generate(path: impl AsRef<Path>) -> Result<Self, FileIOError> {
		let path = path.as_ref();
		if let Some(mii) = Self::read(path)? {
			return Ok(mii);
		}

		let mii = Self::generate_random();
		mii.write(path)?;
		debug!(?path, "Generated random mii");

		Ok(mii)
	}
}

impl Default for MiiCharInfo {
	fn default() -> Self {
		Self([0; CHARINFO_LEN])
	}
}

impl fmt::Debug for MiiCharInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MiiCharInfo")
			.field("create_id", &self.create_id())
			.finish_non_exhaustive()
	}
}
