//! File-level properties of a persisted session.

use std::fs;

use framestore::{nv21_len, DatasetStore, FileStore, StoreConfig};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn sensor_log_has_header_plus_one_line_per_record() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::at_path(temp_dir.path());
    let layout = store.create_session_directories("run").unwrap();

    let sensor_lines: Vec<String> = (0..5)
        .map(|i| format!("{}.5,{}.25,-{}.0", i, i, i))
        .collect();
    let records: Vec<(f32, &str)> = sensor_lines
        .iter()
        .enumerate()
        .map(|(i, line)| (i as f32 * 0.5, line.as_str()))
        .collect();

    let path = store
        .write_sensor_log(layout.root_dir(), "azimuth,pitch,roll", &records)
        .unwrap();

    let contents = fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), records.len() + 1);
    assert_eq!(lines[0], "frame,focal-length,azimuth,pitch,roll");
    assert_eq!(
        &lines[1..],
        &[
            "1 : 0.0;0.5,0.25,-0.0",
            "2 : 0.5;1.5,1.25,-1.0",
            "3 : 1.0;2.5,2.25,-2.0",
            "4 : 1.5;3.5,3.25,-3.0",
            "5 : 2.0;4.5,4.25,-4.0",
        ]
    );
}

#[test]
fn empty_sensor_log_is_header_only() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::at_path(temp_dir.path());
    let layout = store.create_session_directories("run").unwrap();

    let path = store
        .write_sensor_log(layout.root_dir(), "ax,ay,az", &[])
        .unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), "frame,focal-length,ax,ay,az\n");
}

#[test]
fn directory_creation_is_idempotent_and_keeps_frames() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(StoreConfig::new(temp_dir.path().join("GYL-Data")).with_jpeg_quality(80));

    let first = store.create_session_directories("same-id").unwrap();
    let frame = vec![128u8; nv21_len(8, 4)];
    let written = store
        .write_frame(&first.frames_dir(), 1, &frame, 8, 4)
        .unwrap();

    let second = store.create_session_directories("same-id").unwrap();
    assert_eq!(first, second);
    assert!(written.exists());
    assert_eq!(fs::read_dir(second.frames_dir()).unwrap().count(), 1);
}

#[test]
fn sensor_log_into_missing_root_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::at_path(temp_dir.path());

    let err = store
        .write_sensor_log(&temp_dir.path().join("never-created"), "x", &[(1.0, "a")])
        .unwrap_err();
    assert_eq!(err.kind(), framestore::StoreErrorKind::SensorLogWriteFailed);
}
