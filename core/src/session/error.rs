use super::{DeviceState, ServiceState};
use crate::{area::AreaId, result::ResultCode, tag::TagError};

use tagemu_utils::error::FileIOError;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
	#[error("operation not allowed while the service is {0:?}")]
	WrongServiceState(ServiceState),
	#[error("operation not allowed while the device is {0:?}")]
	WrongDeviceState(DeviceState),
	#[error("no valid tag is active")]
	NoActiveTag,
	#[error("no application area is open")]
	NoOpenedArea,
	#[error("application area 0x{0:08X} needs to be created")]
	AreaNeedsToBeCreated(AreaId),
	#[error("application area 0x{0:08X} was already created")]
	AreaAlreadyCreated(AreaId),
	#[error("failed to spawn the reconciler thread: {0}")]
	SpawnReconciler(#[source] std::io::Error),

	#[error(transparent)]
	Tag(#[from] TagError),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
}

impl SessionError {
	/// Code reported to the client for this failure.
	#[must_use]
	pub const fn result_code(&self) -> ResultCode {
		match self {
			Self::WrongServiceState(_)
			| Self::WrongDeviceState(_)
			| Self::NoActiveTag
			| Self::NoOpenedArea => ResultCode::NFP_DEVICE_NOT_FOUND,
			Self::AreaNeedsToBeCreated(_) => ResultCode::NFP_AREA_NEEDS_TO_BE_CREATED,
			Self::AreaAlreadyCreated(_) => ResultCode::NFP_AREA_ALREADY_CREATED,
			Self::SpawnReconciler(_) | Self::Tag(_) | Self::FileIO(_) => ResultCode::EMU_INTERNAL,
		}
	}
}
