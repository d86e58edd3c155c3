//! Fixture builders shared by the integration tests

#![allow(dead_code)]

use tagemu_core::{
	session::SessionConfig,
	tag::{Date, TagData, TagIdentity, UuidInfo, VirtualTag},
	DeviceState, Session,
};

use std::{
	fs,
	path::Path,
	thread,
	time::{Duration, Instant},
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn identity(game_character_id: u16, model_number: u16) -> TagIdentity {
	TagIdentity {
		game_character_id,
		character_variant: 0,
		series: 0x01,
		model_number,
		figure_type: 0,
	}
}

pub fn sample_data(name: &str, identity: TagIdentity) -> TagData {
	TagData {
		uuid_info: UuidInfo::fixed(&[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0, 0, 0]),
		name: name.to_string(),
		identity,
		first_write_date: Date { y: 2020, m: 6, d: 1 },
		last_write_date: Date { y: 2021, m: 2, d: 28 },
		write_counter: 3,
		version: 1,
	}
}

pub fn write_current_tag(dir: &Path, name: &str, identity: TagIdentity) -> VirtualTag {
	VirtualTag::create(dir, sample_data(name, identity), None).unwrap()
}

/// Writes the four-file legacy layout. `amiibo_id` is the hex form of the 8-byte block.
pub fn write_legacy_json_tag(dir: &Path, name: &str, amiibo_id: &str) {
	fs::create_dir_all(dir).unwrap();
	fs::write(
		dir.join("tag.json"),
		r#"{"randomUuid": false, "uuid": "04112233445566"}"#,
	)
	.unwrap();
	fs::write(
		dir.join("register.json"),
		format!(
			r#"{{"name": "{name}", "miiCharInfo": "mii-charinfo.bin", "firstWriteDate": "2017-03-03"}}"#
		),
	)
	.unwrap();
	fs::write(
		dir.join("common.json"),
		r#"{"lastWriteDate": "2019-11-15", "writeCounter": 17, "version": 2}"#,
	)
	.unwrap();
	fs::write(
		dir.join("model.json"),
		format!(r#"{{"amiiboId": "{amiibo_id}"}}"#),
	)
	.unwrap();
}

/// Writes a raw dump of the minimal meaningful size plus padding.
pub fn write_raw_dump(path: &Path, uuid: [u8; 10], legacy_identity: [u8; 8]) {
	let mut bytes = vec![0_u8; 540];
	bytes[..10].copy_from_slice(&uuid);
	bytes[84..92].copy_from_slice(&legacy_identity);
	fs::write(path, bytes).unwrap();
}

pub fn fast_session_config() -> SessionConfig {
	SessionConfig {
		npad_id: 0x20,
		reconcile_interval: Duration::from_millis(10),
	}
}

/// Polls until the session reaches `state` or [`WAIT`] elapses.
pub fn wait_for_device_state(session: &Session, state: DeviceState) -> bool {
	let deadline = Instant::now() + WAIT;
	while Instant::now() < deadline {
		if session.device_state() == state {
			return true;
		}
		thread::sleep(Duration::from_millis(5));
	}

	session.device_state() == state
}
