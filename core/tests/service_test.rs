use tagemu_core::{
	area::AreaManager,
	result::ResultCode,
	service::{ForegroundApplication, ACTIVATION_FLAG_NAME},
	tag::{format::FormatKind, UuidInfo},
	Activation, Config, ConnectionIntent, EmulationService, ServiceError, VirtualTag,
};

use std::{fs, path::Path};

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tracing_test::traced_test;

mod helpers;

use helpers::{identity, write_current_tag, write_legacy_json_tag};

fn config(data_dir: &Path) -> Config {
	Config {
		reconcile_interval_ms: 10,
		..Config::default()
	}
	.resolved(data_dir)
}

fn enabled_service(data_dir: &Path) -> EmulationService {
	let service = EmulationService::new(config(data_dir));
	service.set_activation(Activation::On).unwrap();
	service
}

struct FixedForeground(Option<u64>);

impl ForegroundApplication for FixedForeground {
	fn current(&self) -> Option<u64> {
		self.0
	}
}

#[test]
fn activation_survives_a_restart() {
	let dir = tempdir().unwrap();

	let service = EmulationService::new(config(dir.path()));
	assert_eq!(service.activation(), Activation::Off);
	service.set_activation(Activation::On).unwrap();
	assert!(service.config().flags_dir.join(ACTIVATION_FLAG_NAME).is_file());
	drop(service);

	let service = EmulationService::new(config(dir.path()));
	assert_eq!(service.activation(), Activation::On);

	service.set_activation(Activation::Off).unwrap();
	assert_eq!(
		EmulationService::new(config(dir.path())).activation(),
		Activation::Off
	);
}

#[test]
fn sessions_are_refused_while_off() {
	let dir = tempdir().unwrap();
	let service = EmulationService::new(config(dir.path()));

	let err = service.open_session(1).unwrap_err();
	assert!(matches!(err, ServiceError::EmulationOff));
	assert_eq!(err.result_code(), ResultCode::EMU_EMULATION_OFF);
	assert!(!service.is_application_intercepted(1));

	service.set_activation(Activation::On).unwrap();
	let session = service.open_session(1).unwrap();
	assert!(service.is_application_intercepted(1));

	drop(session);
	assert!(!service.is_application_intercepted(1));
}

#[test]
fn foreground_application_check() {
	let dir = tempdir().unwrap();
	let service = enabled_service(dir.path()).with_foreground(FixedForeground(Some(5)));
	assert!(!service.is_foreground_application_intercepted());

	let _session = service.open_session(5).unwrap();
	assert!(service.is_foreground_application_intercepted());

	let idle = enabled_service(dir.path()).with_foreground(FixedForeground(None));
	assert!(!idle.is_foreground_application_intercepted());
}

#[test]
#[traced_test]
fn tag_enumeration_ends_and_restarts() {
	let dir = tempdir().unwrap();
	let service = enabled_service(dir.path());
	write_current_tag(&service.tags_dir().join("a"), "A", identity(1, 1));
	write_current_tag(&service.tags_dir().join("b"), "B", identity(2, 2));

	assert_eq!(service.next_tag().unwrap().name(), "A");
	assert_eq!(service.next_tag().unwrap().name(), "B");

	let end = service.next_tag().unwrap_err();
	assert!(matches!(end, ServiceError::IteratorEndReached));
	assert_eq!(end.result_code(), ResultCode::EMU_ITERATOR_END_REACHED);

	service.reset_tag_iterator().unwrap();
	assert_eq!(service.next_tag().unwrap().name(), "A");
}

#[test]
fn activate_by_identity() {
	let dir = tempdir().unwrap();
	let service = enabled_service(dir.path());
	write_current_tag(&service.tags_dir().join("a"), "A", identity(1, 1));
	let wanted = write_current_tag(&service.tags_dir().join("b"), "B", identity(2, 2));

	let tag = service.set_active_tag_by_identity(identity(2, 2)).unwrap();
	assert_eq!(tag, wanted);
	assert_eq!(service.active_tag().unwrap(), wanted);
	assert_eq!(service.connection_intent(), ConnectionIntent::Connected);

	assert!(matches!(
		service.set_active_tag_by_identity(identity(9, 9)),
		Err(ServiceError::TagNotFound(_))
	));
	// A failed lookup keeps the previous selection
	assert_eq!(service.active_tag().unwrap(), wanted);
}

#[test]
#[traced_test]
fn activating_a_legacy_tag_upgrades_it() {
	let dir = tempdir().unwrap();
	let service = enabled_service(dir.path());
	let path = service.tags_dir().join("samus");
	write_legacy_json_tag(&path, "Samus", "0500000000050002");

	let tag = service.set_active_tag_by_path("samus").unwrap();

	assert_eq!(tag.path(), path);
	assert_eq!(tag.name(), "Samus");
	assert_eq!(FormatKind::identify(&path), Some(FormatKind::Current));
	assert_eq!(service.active_tag().unwrap(), tag);
}

#[test]
fn activating_garbage_is_an_invalid_tag() {
	let dir = tempdir().unwrap();
	let service = enabled_service(dir.path());
	fs::create_dir_all(service.tags_dir()).unwrap();
	fs::write(service.tags_dir().join("readme.txt"), "hello").unwrap();

	let err = service.set_active_tag_by_path("readme.txt").unwrap_err();

	assert!(matches!(err, ServiceError::InvalidTag { .. }));
	assert_eq!(err.result_code(), ResultCode::EMU_INVALID_TAG);
	assert!(matches!(
		service.active_tag(),
		Err(ServiceError::NoActiveTag)
	));
}

#[test]
fn reset_clears_the_selection() {
	let dir = tempdir().unwrap();
	let service = enabled_service(dir.path());
	write_current_tag(&service.tags_dir().join("a"), "A", identity(1, 1));
	service.set_active_tag_by_path("a").unwrap();

	service.reset_active_tag();

	assert!(matches!(
		service.active_tag(),
		Err(ServiceError::NoActiveTag)
	));
	assert_eq!(service.connection_intent(), ConnectionIntent::Invalid);
	assert_eq!(
		service.set_connection_intent(ConnectionIntent::Connected),
		ConnectionIntent::Invalid
	);
}

#[test]
fn parsing_has_no_side_effects() {
	let dir = tempdir().unwrap();
	let service = enabled_service(dir.path());
	let path = service.tags_dir().join("legacy");
	write_legacy_json_tag(&path, "Peach", "0002000000020002");

	let parsed = service.try_parse_tag("legacy").unwrap();

	assert_eq!(parsed.kind, FormatKind::LegacyJson);
	assert_eq!(parsed.data.name, "Peach");
	assert_eq!(parsed.data.write_counter, 17);
	assert_eq!(FormatKind::identify(&path), Some(FormatKind::LegacyJson));
	assert!(service.emulation().active_tag().is_none());

	assert!(service.try_parse_tag("missing").is_err());
}

#[test]
fn uuid_changes_are_persisted() {
	let dir = tempdir().unwrap();
	let service = enabled_service(dir.path());
	write_current_tag(&service.tags_dir().join("a"), "A", identity(1, 1));
	let tag = service.set_active_tag_by_path("a").unwrap();

	service.set_active_tag_uuid_info(UuidInfo::random()).unwrap();

	assert!(service.active_tag().unwrap().data().uuid_info.random);
	assert!(VirtualTag::load(tag.path()).unwrap().data().uuid_info.random);

	service.reset_active_tag();
	assert!(matches!(
		service.set_active_tag_uuid_info(UuidInfo::random()),
		Err(ServiceError::NoActiveTag)
	));
}

#[test]
fn lists_areas_of_the_active_tag() {
	let dir = tempdir().unwrap();
	let service = enabled_service(dir.path());
	let tag = write_current_tag(&service.tags_dir().join("a"), "A", identity(1, 1));
	let areas = AreaManager::new(tag.path());
	areas.write(0x20, &[1]).unwrap();
	areas.write(0x10, &[2]).unwrap();

	assert!(matches!(
		service.active_tag_areas(),
		Err(ServiceError::NoActiveTag)
	));

	service.set_active_tag_by_path("a").unwrap();
	assert_eq!(service.active_tag_areas().unwrap(), vec![0x10, 0x20]);
}

#[test]
fn startup_migrates_the_collection() {
	let dir = tempdir().unwrap();
	let config = config(dir.path());
	write_legacy_json_tag(&config.tags_dir.join("old"), "Old", "0001000000010002");

	let service = EmulationService::start(config).unwrap();

	assert_eq!(
		FormatKind::identify(service.tags_dir().join("old")),
		Some(FormatKind::Current)
	);
	let version = service.version();
	assert_eq!(
		(version.major, version.minor, version.patch),
		(0, 4, 1)
	);
}
