use serde::{Deserialize, Serialize};

/// Size of the packed in-memory identity record.
pub const IDENTITY_LEN: usize = 7;
/// Size of the identity block found in raw dumps and legacy model records.
pub const LEGACY_IDENTITY_LEN: usize = 8;

/// Trailing byte of the legacy identity block; real figures always carry `0x02`.
const LEGACY_TRAILER: u8 = 0x02;

/// Which figure a tag represents.
///
/// Field names double as the keys of the `id` object in the tag record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TagIdentity {
	pub game_character_id: u16,
	pub character_variant: u8,
	pub series: u8,
	pub model_number: u16,
	pub figure_type: u8,
}

impl TagIdentity {
	#[must_use]
	pub const fn to_bytes(&self) -> [u8; IDENTITY_LEN] {
		let character = self.game_character_id.to_le_bytes();
		let model = self.model_number.to_le_bytes();
		[
			character[0],
			character[1],
			self.character_variant,
			self.series,
			model[0],
			model[1],
			self.figure_type,
		]
	}

	#[must_use]
	pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
		Self {
			game_character_id: u16::from_le_bytes([bytes[0], bytes[1]]),
			character_variant: bytes[2],
			series: bytes[3],
			model_number: u16::from_le_bytes([bytes[4], bytes[5]]),
			figure_type: bytes[6],
		}
	}

	/// Decodes the 8-byte on-disk block: `{character u16 LE, variant, figure type,
	/// model u16 BE, series, trailer}`.
	#[must_use]
	pub const fn from_legacy_bytes(bytes: [u8; LEGACY_IDENTITY_LEN]) -> Self {
		Self {
			game_character_id: u16::from_le_bytes([bytes[0], bytes[1]]),
			character_variant: bytes[2],
			figure_type: bytes[3],
			model_number: u16::from_be_bytes([bytes[4], bytes[5]]),
			series: bytes[6],
		}
	}

	#[must_use]
	pub const fn to_legacy_bytes(&self) -> [u8; LEGACY_IDENTITY_LEN] {
		let character = self.game_character_id.to_le_bytes();
		let model = self.model_number.to_be_bytes();
		[
			character[0],
			character[1],
			self.character_variant,
			self.figure_type,
			model[0],
			model[1],
			self.series,
			LEGACY_TRAILER,
		]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;

	const MARIO: TagIdentity = TagIdentity {
		game_character_id: 0x0000,
		character_variant: 0x00,
		series: 0x00,
		model_number: 0x0002,
		figure_type: 0x00,
	};

	#[test]
	fn legacy_block_swaps_model_number() {
		let raw = [0x01, 0x02, 0x03, 0x04, 0x00, 0x34, 0x05, 0x02];
		let identity = TagIdentity::from_legacy_bytes(raw);

		assert_eq!(
			identity,
			TagIdentity {
				game_character_id: 0x0201,
				character_variant: 0x03,
				series: 0x05,
				model_number: 0x0034,
				figure_type: 0x04,
			}
		);
		assert_eq!(identity.to_legacy_bytes(), raw);
	}

	#[test]
	fn legacy_and_packed_forms_agree() {
		let identity = TagIdentity::from_legacy_bytes(MARIO.to_legacy_bytes());
		assert_eq!(identity, MARIO);
		assert_eq!(TagIdentity::from_bytes(identity.to_bytes()), MARIO);
	}

	#[test]
	fn serializes_with_record_keys() {
		let json = serde_json::to_value(MARIO).unwrap();
		assert_eq!(
			json,
			serde_json::json!({
				"game_character_id": 0,
				"character_variant": 0,
				"series": 0,
				"model_number": 2,
				"figure_type": 0,
			})
		);
	}
}
