use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::TagError;

const ISO_FORMAT: &str = "%Y-%m-%d";

/// Calendar date as stored in tag records, `{"y": 2024, "m": 1, "d": 31}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Date {
	pub y: u16,
	pub m: u8,
	pub d: u8,
}

impl Date {
	#[must_use]
	pub fn today() -> Self {
		Self::from(Local::now().date_naive())
	}

	/// Parses the `"YYYY-MM-DD"` form used by legacy records.
	pub fn parse_iso(value: &str) -> Result<Self, TagError> {
		NaiveDate::parse_from_str(value, ISO_FORMAT)
			.map(Self::from)
			.map_err(|source| TagError::InvalidDate {
				value: value.to_string(),
				source,
			})
	}
}

impl Default for Date {
	fn default() -> Self {
		Self::today()
	}
}

impl From<NaiveDate> for Date {
	fn from(date: NaiveDate) -> Self {
		Self {
			y: u16::try_from(date.year()).unwrap_or_default(),
			m: u8::try_from(date.month()).unwrap_or_default(),
			d: u8::try_from(date.day()).unwrap_or_default(),
		}
	}
}

impl fmt::Display for Date {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:04}-{:02}-{:02}", self.y, self.m, self.d)
	}
}
