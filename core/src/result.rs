//! Result codes in the host platform's `{module, description}` scheme, so a transport
//! can hand them to clients unchanged.

use std::fmt;

const MODULE_BITS: u32 = 9;
const DESCRIPTION_BITS: u32 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode {
	pub module: u32,
	pub description: u32,
}

impl ResultCode {
	pub const NFP_MODULE: u32 = 115;
	pub const EMU_MODULE: u32 = 352;

	pub const NFP_DEVICE_NOT_FOUND: Self = Self::new(Self::NFP_MODULE, 64);
	pub const NFP_AREA_NEEDS_TO_BE_CREATED: Self = Self::new(Self::NFP_MODULE, 128);
	pub const NFP_AREA_ALREADY_CREATED: Self = Self::new(Self::NFP_MODULE, 168);

	pub const EMU_NO_ACTIVE_TAG: Self = Self::new(Self::EMU_MODULE, 1);
	pub const EMU_INVALID_TAG: Self = Self::new(Self::EMU_MODULE, 2);
	pub const EMU_ITERATOR_END_REACHED: Self = Self::new(Self::EMU_MODULE, 3);
	pub const EMU_EMULATION_OFF: Self = Self::new(Self::EMU_MODULE, 4);
	pub const EMU_INTERNAL: Self = Self::new(Self::EMU_MODULE, 5);

	#[must_use]
	pub const fn new(module: u32, description: u32) -> Self {
		Self {
			module,
			description,
		}
	}

	/// Packed 32-bit value: description above the 9 module bits.
	#[must_use]
	pub const fn value(self) -> u32 {
		((self.description & ((1 << DESCRIPTION_BITS) - 1)) << MODULE_BITS)
			| (self.module & ((1 << MODULE_BITS) - 1))
	}
}

impl fmt::Display for ResultCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{:04}-{:04} (0x{:X})",
			2000 + self.module,
			self.description,
			self.value()
		)
	}
}
