use tagemu_core::{
	area::AreaManager,
	tag::{
		format::FormatKind,
		migrate::{migrate, MigrationError},
		Date, TagIdentity, UuidInfo, VirtualTag, DEFAULT_MII_FILE_NAME,
	},
};

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

mod helpers;

use helpers::{write_current_tag, write_legacy_json_tag, write_raw_dump};

#[test]
fn legacy_json_tag_keeps_fields_and_areas() {
	let dir = tempdir().unwrap();
	let tags = dir.path().join("amiibo");
	let staging = dir.path().join("temp_areas");
	let path = tags.join("zelda");

	write_legacy_json_tag(&path, "Zelda", "0101000000030002");
	let areas = AreaManager::new(&path);
	let payload = (0..=255_u8).cycle().take(0xD8).collect::<Vec<_>>();
	areas.write(0x1019_C800, &payload).unwrap();
	areas.write(0x0000_0001, &[7; 0x216]).unwrap();

	let tag = migrate(&path, &staging).unwrap();

	assert_eq!(tag.path(), path);
	assert_eq!(tag.name(), "Zelda");
	assert_eq!(
		tag.identity(),
		TagIdentity {
			game_character_id: 0x0101,
			character_variant: 0,
			series: 0,
			model_number: 0x0003,
			figure_type: 0,
		}
	);
	let data = tag.data();
	assert_eq!(data.first_write_date, Date { y: 2017, m: 3, d: 3 });
	assert_eq!(data.last_write_date, Date { y: 2019, m: 11, d: 15 });
	assert_eq!(data.write_counter, 17);
	assert_eq!(data.version, 2);
	assert_eq!(
		data.uuid_info,
		UuidInfo::fixed(&[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66])
	);

	// Old layout is gone, new one is in place
	assert_eq!(FormatKind::identify(&path), Some(FormatKind::Current));
	assert!(!path.join("tag.json").exists());
	assert!(path.join(DEFAULT_MII_FILE_NAME).is_file());

	// Areas survive byte for byte and staging is cleaned up
	assert_eq!(tag.areas().list().unwrap(), vec![0x0000_0001, 0x1019_C800]);
	assert_eq!(
		fs::read(tag.areas().area_path(0x1019_C800)).unwrap(),
		payload
	);
	assert_eq!(
		fs::read(tag.areas().area_path(0x0000_0001)).unwrap(),
		vec![7; 0x216]
	);
	assert!(!staging.exists());
}

#[test]
fn raw_dump_becomes_a_directory() {
	let dir = tempdir().unwrap();
	let dump = dir.path().join("Fox.bin");
	write_raw_dump(
		&dump,
		[1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
		[0x05, 0x80, 0x00, 0x00, 0x00, 0x09, 0x00, 0x02],
	);

	let tag = migrate(&dump, dir.path().join("staging")).unwrap();

	assert_eq!(tag.path(), dir.path().join("Fox"));
	assert!(!dump.exists());
	assert_eq!(tag.name(), "Fox");
	assert_eq!(tag.identity().game_character_id, 0x8005);
	assert_eq!(tag.identity().model_number, 0x0009);
	assert_eq!(tag.data().uuid_info.uuid, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
	assert_eq!(tag.data().write_counter, 0);
	assert_eq!(tag.data().first_write_date, Date::today());
	assert!(tag.areas().list().unwrap().is_empty());
}

#[test]
fn migrated_tags_round_trip() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("ganon");
	write_legacy_json_tag(&path, "Ganondorf", "0102000000040002");

	migrate(&path, dir.path().join("staging")).unwrap();

	let loaded = VirtualTag::load(&path).unwrap();
	loaded.save().unwrap();
	assert_eq!(VirtualTag::load(&path).unwrap(), loaded);
}

#[test]
fn current_tags_are_left_alone() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("link");
	let written = write_current_tag(&path, "Link", helpers::identity(0x0100, 0));
	written.areas().write(5, &[5; 16]).unwrap();

	let tag = migrate(&path, dir.path().join("staging")).unwrap();

	assert_eq!(tag, written);
	assert_eq!(fs::read(tag.areas().area_path(5)).unwrap(), vec![5; 16]);
	assert!(!dir.path().join("staging").exists());
}

#[test]
fn occupied_staging_blocks_migration() {
	let dir = tempdir().unwrap();
	let staging = dir.path().join("staging");
	fs::create_dir_all(&staging).unwrap();
	fs::write(staging.join("0x00000002.bin"), [2; 4]).unwrap();

	let path = dir.path().join("peach");
	write_legacy_json_tag(&path, "Peach", "0002000000050002");
	AreaManager::new(&path).write(3, &[3; 8]).unwrap();

	assert!(matches!(
		migrate(&path, &staging),
		Err(MigrationError::StagingOccupied(_))
	));

	// Nothing was touched
	assert_eq!(FormatKind::identify(&path), Some(FormatKind::LegacyJson));
	assert_eq!(fs::read(staging.join("0x00000002.bin")).unwrap(), vec![2; 4]);
	assert_eq!(AreaManager::new(&path).list().unwrap(), vec![3]);
}

#[test]
fn invalid_legacy_tag_is_not_removed() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("broken");
	write_legacy_json_tag(&path, "Broken", "zz");

	assert!(matches!(migrate(&path, dir.path().join("staging")), Err(MigrationError::Tag(_))));
	assert!(path.join("model.json").is_file());
}
