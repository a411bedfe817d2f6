mod common;

use common::*;
use mtptree_core::provider::memory::{Call, MemoryProvider, DEFAULT_STORAGE};
use mtptree_core::{Config, Error, NodeKind, ScanOptions, Session, StorageDescriptor, StorageId};

#[test]
fn operations_fail_before_open_and_after_release() {
    let mut session = Session::new(MemoryProvider::new());
    assert!(matches!(session.resolve("/"), Err(Error::NoDevice)));
    assert!(matches!(session.storages(), Err(Error::NoDevice)));

    session.open().unwrap();
    assert!(session.resolve("/").is_ok());
    session.release().unwrap();

    assert!(!session.is_open());
    assert!(matches!(session.resolve("/"), Err(Error::NoDevice)));
    assert!(matches!(session.list("/", ScanOptions::default()), Err(Error::NoDevice)));
    assert!(matches!(session.delete("/x"), Err(Error::NoDevice)));
    // the guard short-circuits before any provider call
    assert_eq!(session.provider().calls().last(), Some(&Call::Release));
}

#[test]
fn release_is_idempotent() {
    let mut session = Session::new(MemoryProvider::new());
    session.release().unwrap();
    session.open().unwrap();
    session.release().unwrap();
    session.release().unwrap();
    let releases = session
        .provider()
        .calls()
        .iter()
        .filter(|c| **c == Call::Release)
        .count();
    assert_eq!(releases, 1);
}

#[test]
fn detached_device_is_no_device() {
    let mut session = Session::new(MemoryProvider::detached());
    assert!(matches!(session.open(), Err(Error::NoDevice)));
    assert!(!session.is_open());
}

#[test]
fn missing_storage_is_no_storage_and_releases() {
    let mut session = Session::new(MemoryProvider::without_storages());
    assert!(matches!(session.open(), Err(Error::NoStorage)));
    assert_eq!(session.provider().calls().last(), Some(&Call::Release));
}

#[test]
fn configured_storage_that_is_absent_is_no_storage() {
    let config = Config {
        storage: Some(0x0009_0001),
        ..Config::default()
    };
    let mut session = Session::with_config(MemoryProvider::new(), config);
    assert!(matches!(session.open(), Err(Error::NoStorage)));
    assert!(!session.is_open());
    assert_eq!(session.provider().calls().last(), Some(&Call::Release));
}

#[test]
fn configured_storage_is_selected() {
    let provider = MemoryProvider::new();
    provider.add_storage(StorageId(0x0002_0001), StorageDescriptor::default());
    let config = Config {
        storage: Some(0x0002_0001),
        ..Config::default()
    };
    let mut session = Session::with_config(provider, config);
    assert_eq!(session.open().unwrap(), StorageId(0x0002_0001));
    assert_eq!(session.device().unwrap().storage(), StorageId(0x0002_0001));

    let mut session = Session::new(MemoryProvider::new());
    assert_eq!(session.open().unwrap(), DEFAULT_STORAGE);
    assert_eq!(session.storages().unwrap().len(), 1);
}

#[test]
fn reset_reopens() {
    let mut session = Session::new(MemoryProvider::new());
    session.open().unwrap();
    session.reset().unwrap();
    assert!(session.is_open());
    let calls = session.provider().calls();
    assert_eq!(
        &calls[calls.len() - 4..],
        [Call::Release, Call::Detect, Call::Open, Call::ListStorages]
    );
}

#[test]
fn rename_rejects_illegal_names_without_device_calls() {
    let session = open_session(seed_phone);
    for bad in ["a/b", "", "  ", ".."] {
        let err = session.rename("/notes.txt", bad).unwrap_err();
        assert!(matches!(err, Error::IllegalName(_)), "{bad:?}");
    }
    assert!(session.provider().calls().is_empty());
}

#[test]
fn rename_is_verified() {
    let session = open_session(seed_phone);
    let renamed = session.rename("/notes.txt", "todo.txt").unwrap();
    assert_eq!(renamed.path, "/todo.txt");
    assert_eq!(renamed.name, "todo.txt");
    assert!(!session.exists("/notes.txt").unwrap());
    assert!(session.exists("/todo.txt").unwrap());
}

#[test]
fn rename_reported_ok_but_not_applied_fails() {
    let session = open_session(seed_phone);
    session.provider().ignore_renames(true);
    let err = session.rename("/DCIM/Camera", "Photos").unwrap_err();
    match err {
        Error::RenameFailed { expected, actual, .. } => {
            assert_eq!(expected, "Photos");
            assert_eq!(actual, "Camera");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn create_folder_is_idempotent_and_refuses_to_shadow_files() {
    let session = open_session(seed_phone);
    let created = session.create_folder("/DCIM/Screenshots").unwrap();
    assert_eq!(created.path, "/DCIM/Screenshots");
    assert_eq!(created.kind, NodeKind::Folder);

    let again = session.create_folder("/DCIM/Screenshots/").unwrap();
    assert_eq!(again.id, created.id);

    let err = session.create_folder("/notes.txt").unwrap_err();
    assert!(matches!(err, Error::CreateFolderConflict(ref p) if p == "/notes.txt"));

    assert!(matches!(session.create_folder("/"), Err(Error::InvalidPath(_))));
    assert!(matches!(session.create_folder("/nope/x"), Err(Error::NotFound(_))));
}

#[test]
fn delete_removes_entry_but_never_root() {
    let session = open_session(seed_phone);
    session.delete("/DCIM").unwrap();
    assert!(!session.exists("/DCIM/Camera/IMG_1.jpg").unwrap());
    assert!(matches!(session.delete("/"), Err(Error::InvalidPath(_))));
    assert!(matches!(session.delete("/missing"), Err(Error::NotFound(_))));
}

#[test]
fn provider_errors_pass_through() {
    let session = open_session(seed_phone);
    // listing a file's children is an error in the provider itself
    let notes = session.resolve("/notes.txt").unwrap();
    let err = session.device().unwrap().list_children(notes.id).unwrap_err();
    assert!(matches!(err, Error::Provider(_)));
}

#[test]
fn sessions_are_independent() {
    let a = open_session(seed_phone);
    let mut b = open_session(|_| {});
    assert!(a.exists("/DCIM").unwrap());
    assert!(!b.exists("/DCIM").unwrap());
    b.release().unwrap();
    assert!(a.exists("/DCIM").unwrap());
}

#[test]
fn conflict_without_a_same_named_entry_is_not_found() {
    let session = open_session(|p| p.refuse_folders(true));
    let err = session.create_folder("/new").unwrap_err();
    assert!(matches!(err, Error::NotFound(ref p) if p == "/new"));
}
