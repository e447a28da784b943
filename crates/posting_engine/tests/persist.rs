use std::fs;

use posting_engine::{ensure_parent_dir, write_atomic, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_parent_directories() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("reports").join("2026").join("run.json");

    ensure_parent_dir(&target).unwrap();
    assert!(target.parent().unwrap().is_dir());
    assert!(!target.exists());
}

#[test]
fn atomic_write_replaces_existing_content() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("history.ron");

    write_atomic(&target, "first").unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "first");

    write_atomic(&target, "second").unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "second");

    let leftovers = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn parent_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    let result = write_atomic(&blocker.join("out.json"), "data");
    assert!(matches!(result, Err(PersistError::Directory { .. })));
}
