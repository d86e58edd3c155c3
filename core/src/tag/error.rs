use std::path::Path;

use tagemu_utils::error::{FileIOError, NonUtf8PathError};

#[derive(thiserror::Error, Debug)]
pub enum TagError {
	#[error("malformed tag record: <path='{}'>: {source}", .path.display())]
	Json {
		path: Box<Path>,
		source: serde_json::Error,
	},
	#[error("tag record is missing '{field}': <path='{}'>", .path.display())]
	MissingField {
		path: Box<Path>,
		field: &'static str,
	},
	#[error("invalid hex in '{field}': {source}")]
	InvalidHex {
		field: &'static str,
		source: hex::FromHexError,
	},
	#[error("'{field}' must hold {expected} bytes, found {found}")]
	InvalidLength {
		field: &'static str,
		expected: usize,
		found: usize,
	},
	#[error("invalid date '{value}': {source}")]
	InvalidDate {
		value: String,
		source: chrono::ParseError,
	},
	#[error("'{field}' must be a plain file name, found '{value}': <path='{}'>", .path.display())]
	InvalidFileName {
		path: Box<Path>,
		field: &'static str,
		value: String,
	},
	#[error("raw tag dump is too small: <path='{}', size={size}>", .path.display())]
	TooSmall { path: Box<Path>, size: u64 },
	#[error("no known tag format at <path='{}'>", .0.display())]
	UnrecognizedFormat(Box<Path>),

	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error(transparent)]
	NonUtf8Path(#[from] NonUtf8PathError),
}

impl TagError {
	pub(crate) fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
		Self::Json {
			path: path.as_ref().into(),
			source,
		}
	}
}
