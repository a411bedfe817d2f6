mod common;

use common::*;
use mtptree_core::provider::memory::{Call, MemoryProvider};
use mtptree_core::transfer::UploadTarget;
use mtptree_core::{
    ChannelProgress, Config, Error, Node, NodeId, NodeKind, TransferMsg, TransferReport,
};
use std::fs;

fn file_node(id: NodeId, name: &str, parent_path: &str, size: u64) -> Node {
    Node {
        id,
        parent: None,
        name: name.to_string(),
        path: mtptree_core::vpath::join(parent_path, name),
        kind: NodeKind::File,
        size,
        modified: None,
        children: Vec::new(),
    }
}

fn folder_node(name: &str, parent_path: &str, children: Vec<Node>) -> Node {
    Node {
        id: NodeId(0),
        parent: None,
        name: name.to_string(),
        path: mtptree_core::vpath::join(parent_path, name),
        kind: NodeKind::Folder,
        size: 0,
        modified: None,
        children,
    }
}

#[test]
fn empty_root_download_writes_nothing() {
    let session = open_session(seed_phone);
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    let err = session.download_tree(&[], &out, true, None).unwrap_err();
    assert!(matches!(err, Error::NothingToTransfer));
    assert!(!out.exists());

    let report = session.download_tree(&[], &out, false, None).unwrap();
    assert_eq!(report, TransferReport::default());
    assert!(!out.exists());
}

#[test]
fn download_creates_folder_then_fetches_file() {
    let session = open_session(|_| {});
    let y = session.provider().add_file(NodeId::ROOT, "y.txt", b"why".to_vec());
    session.provider().clear_calls();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let tree = vec![folder_node("x", "/", vec![file_node(y, "y.txt", "/x", 3)])];

    let report = session.download_tree(&tree, &out, true, None).unwrap();
    assert_eq!(report, TransferReport { files: 1, folders: 1, bytes: 3 });
    assert!(out.join("x").is_dir());
    assert_eq!(fs::read(out.join("x").join("y.txt")).unwrap(), b"why");
    assert_eq!(session.provider().calls(), [Call::Download(y)]);

    // an existing directory is not an error
    session.download_tree(&tree, &out, true, None).unwrap();
}

#[test]
fn download_reports_progress_per_file() {
    let session = open_session(|_| {});
    session.provider().set_chunk_size(2);
    let f = session.provider().add_file(NodeId::ROOT, "f.bin", vec![1u8; 5]);
    let dir = tempfile::tempdir().unwrap();
    let tree = vec![file_node(f, "f.bin", "/", 5)];

    let mut seen = Vec::new();
    let mut sink = |sent: u64, total: u64, node: &Node| seen.push((sent, total, node.name.clone()));
    session
        .download_tree(&tree, dir.path(), true, Some(&mut sink))
        .unwrap();
    assert_eq!(
        seen,
        [
            (2, 5, "f.bin".to_string()),
            (4, 5, "f.bin".to_string()),
            (5, 5, "f.bin".to_string()),
        ]
    );
}

#[test]
fn download_stops_at_first_failure() {
    let session = open_session(|_| {});
    let p = session.provider();
    let a = p.add_file(NodeId::ROOT, "a", b"a".to_vec());
    let b = p.add_file(NodeId::ROOT, "b", b"b".to_vec());
    let c = p.add_file(NodeId::ROOT, "c", b"c".to_vec());
    p.fail_transfers_of("b");
    p.clear_calls();
    let dir = tempfile::tempdir().unwrap();
    let tree = vec![
        folder_node("sub", "/", vec![file_node(a, "a", "/sub", 1), file_node(b, "b", "/sub", 1)]),
        file_node(c, "c", "/", 1),
    ];

    let err = session.download_tree(&tree, dir.path(), true, None).unwrap_err();
    assert!(matches!(err, Error::TransferFailed { ref path, .. } if path == "/sub/b"));
    assert_eq!(p.calls(), [Call::Download(a), Call::Download(b)]);
    assert!(dir.path().join("sub").join("a").exists());
    assert!(!dir.path().join("c").exists());
}

#[test]
fn download_rejects_names_escaping_the_destination() {
    let session = open_session(|_| {});
    let evil = session.provider().add_file(NodeId::ROOT, "evil", b"x".to_vec());
    let dir = tempfile::tempdir().unwrap();
    let tree = vec![file_node(evil, "../evil", "/", 1)];
    let err = session.download_tree(&tree, &dir.path().join("out"), true, None).unwrap_err();
    assert!(matches!(err, Error::IllegalName(_)));
    assert!(!dir.path().join("evil").exists());
}

#[test]
fn download_by_path_mirrors_the_subtree() {
    let session = open_session(seed_phone);
    let dir = tempfile::tempdir().unwrap();

    let report = session.download("/DCIM", dir.path(), None).unwrap();
    assert_eq!(report.files, 1);
    let photo = dir.path().join("DCIM").join("Camera").join("IMG_1.jpg");
    assert_eq!(fs::read(photo).unwrap(), b"jpg");
    // hidden folders are skipped by default
    assert!(!dir.path().join("DCIM").join(".thumbnails").exists());

    let whole = tempfile::tempdir().unwrap();
    session.download("/", whole.path(), None).unwrap();
    assert_eq!(fs::read(whole.path().join("notes.txt")).unwrap(), b"hello");
    assert!(whole.path().join("Music").is_dir());
}

fn local_source() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("a.txt"), b"new a").unwrap();
    fs::write(src.join("sub").join("b.txt"), b"b").unwrap();
    fs::write(src.join(".DS_Store"), b"junk").unwrap();
    dir
}

#[test]
fn upload_recreates_the_local_tree() {
    let session = open_session(|_| {});
    let local = local_source();

    let report = session.upload(&local.path().join("src"), "/", None).unwrap();
    assert_eq!(report, TransferReport { files: 2, folders: 2, bytes: 6 });

    let p = session.provider();
    let src = p.find(NodeId::ROOT, "src").unwrap();
    let mut names = p.child_names(src);
    names.sort();
    assert_eq!(names, ["a.txt", "sub"]);
    let a = p.find(src, "a.txt").unwrap();
    assert_eq!(p.contents(a).unwrap(), b"new a");
    let sub = p.find(src, "sub").unwrap();
    assert_eq!(p.child_names(sub), ["b.txt"]);
}

#[test]
fn upload_deletes_same_named_file_before_uploading() {
    let mut old = NodeId(0);
    let session = open_session(|p| {
        let src = p.add_folder(NodeId::ROOT, "src");
        old = p.add_file(src, "a.txt", b"old".to_vec());
    });
    let local = local_source();

    session.upload(&local.path().join("src"), "/", None).unwrap();

    let p = session.provider();
    let delete = position(p, |c| *c == Call::Delete(old)).expect("old file deleted");
    let upload = position(p, |c| matches!(c, Call::Upload { name, .. } if name == "a.txt"))
        .expect("a.txt uploaded");
    assert!(delete < upload);

    let src = p.find(NodeId::ROOT, "src").unwrap();
    let a = p.find(src, "a.txt").unwrap();
    assert_ne!(a, old);
    assert_eq!(p.contents(a).unwrap(), b"new a");
}

#[test]
fn upload_reuses_existing_folder() {
    let mut existing = NodeId(0);
    let session = open_session(|p| existing = p.add_folder(NodeId::ROOT, "src"));
    let local = local_source();

    session.upload(&local.path().join("src"), "/", None).unwrap();

    let p = session.provider();
    assert_eq!(p.child_names(NodeId::ROOT), ["src"]);
    assert_eq!(p.find(NodeId::ROOT, "src"), Some(existing));
    assert!(p.calls().contains(&Call::Upload {
        name: "a.txt".into(),
        parent: existing
    }));
}

#[test]
fn upload_refuses_to_shadow_a_file_with_a_folder() {
    let session = open_session(|p| {
        p.add_file(NodeId::ROOT, "src", b"file".to_vec());
    });
    let local = local_source();
    let err = session.upload(&local.path().join("src"), "/", None).unwrap_err();
    assert!(matches!(err, Error::CreateFolderConflict(ref p) if p == "/src"));
}

#[test]
fn upload_resolves_destination_once() {
    let session = open_session(seed_phone);
    let local = local_source();
    let tree = vec![mtptree_core::scanner::scan_local_item(
        &local.path().join("src").join("a.txt"),
        session.config().scan_options(true),
        &mtptree_core::policy::StandardPolicy,
    )
    .unwrap()];

    session
        .upload_tree(&tree, UploadTarget::Path("/DCIM/Camera"), None)
        .unwrap();
    let p = session.provider();
    let first_upload = position(p, |c| matches!(c, Call::Upload { .. })).unwrap();
    // two listings to resolve, one to look for a same-named file
    assert_eq!(
        p.calls()[..first_upload]
            .iter()
            .filter(|c| matches!(c, Call::ListChildren(_)))
            .count(),
        3
    );
    assert!(session.exists("/DCIM/Camera/a.txt").unwrap());

    let err = session.upload_tree(&tree, "/notes.txt", None).unwrap_err();
    assert!(matches!(err, Error::InvalidPath(_)));
}

#[test]
fn upload_failure_is_a_transfer_failure() {
    let session = open_session(|_| {});
    session.provider().fail_transfers_of("b.txt");
    let local = local_source();
    let err = session.upload(&local.path().join("src"), "/", None).unwrap_err();
    assert!(matches!(err, Error::TransferFailed { ref path, .. } if path == "/src/sub/b.txt"));
    // what landed before the failure stays
    assert!(session.exists("/src/sub").unwrap());
}

#[test]
fn upload_progress_over_a_channel() {
    let session = open_session(|_| {});
    let local = local_source();
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut sink = ChannelProgress(tx);

    session
        .upload(&local.path().join("src"), "/", Some(&mut sink))
        .unwrap();
    drop(sink);

    let completed: Vec<String> = rx
        .iter()
        .filter_map(|m| match m {
            TransferMsg::Completed { path, .. } => Some(path),
            TransferMsg::Progress { .. } => None,
        })
        .collect();
    assert_eq!(completed.len(), 2);
    assert!(completed.iter().any(|p| p.ends_with("b.txt")));
}

#[test]
fn upload_to_root_id_target() {
    let session = open_session(|_| {});
    let local = local_source();
    let tree = vec![mtptree_core::scanner::scan_local_item(
        &local.path().join("src").join("sub"),
        session.config().scan_options(true),
        &mtptree_core::policy::StandardPolicy,
    )
    .unwrap()];
    session.upload_tree(&tree, NodeId::ROOT, None).unwrap();
    assert!(session.exists("/sub/b.txt").unwrap());
}

#[test]
fn upload_policy_can_be_swapped() {
    let config = mtptree_core::Config {
        ignore_hidden: false,
        ..mtptree_core::Config::default()
    };
    let mut session = mtptree_core::Session::with_config(
        mtptree_core::provider::memory::MemoryProvider::new(),
        config,
    );
    session.set_policy(mtptree_core::policy::AdmitAll);
    session.open().unwrap();
    let local = local_source();

    session.upload(&local.path().join("src"), "/", None).unwrap();
    assert!(session.exists("/src/.DS_Store").unwrap());
}

fn session_with_depth(max_depth: usize) -> mtptree_core::Session<MemoryProvider> {
    let config = Config {
        max_depth,
        ..Config::default()
    };
    let mut session = mtptree_core::Session::with_config(MemoryProvider::new(), config);
    session.open().unwrap();
    session
}

#[test]
fn download_accepts_a_subtree_exactly_at_the_depth_limit() {
    let session = session_with_depth(2);
    let p = session.provider();
    let a = p.add_folder(NodeId::ROOT, "a");
    let b = p.add_folder(a, "b");
    p.add_folder(b, "c");
    let dir = tempfile::tempdir().unwrap();

    assert_eq!(session.list("/a", session.config().scan_options(true)).unwrap().len(), 1);
    let report = session.download("/a", dir.path(), None).unwrap();
    assert_eq!(report.folders, 3);
    assert!(dir.path().join("a").join("b").join("c").is_dir());

    let c = p.find(b, "c").unwrap();
    p.add_file(c, "d", b"deep".to_vec());
    let err = session.download("/a", dir.path(), None).unwrap_err();
    assert!(matches!(err, Error::DepthExceeded(ref path) if path == "/a/b/c"));
}

#[test]
fn upload_accepts_a_source_exactly_at_the_depth_limit() {
    let session = session_with_depth(2);
    let local = tempfile::tempdir().unwrap();
    let src = local.path().join("src");
    fs::create_dir_all(src.join("a").join("b")).unwrap();

    let report = session.upload(&src, "/", None).unwrap();
    assert_eq!(report.folders, 3);
    assert!(session.exists("/src/a/b").unwrap());

    let deeper = src.join("a").join("b").join("c");
    fs::create_dir_all(&deeper).unwrap();
    fs::write(deeper.join("d"), b"deep").unwrap();
    assert!(matches!(
        session.upload(&src, "/", None),
        Err(Error::DepthExceeded(_))
    ));
}

#[cfg(unix)]
#[test]
fn upload_leaves_symlinks_out() {
    let session = open_session(|_| {});
    let local = tempfile::tempdir().unwrap();
    let src = local.path().join("src");
    fs::create_dir_all(src.join("real")).unwrap();
    fs::write(src.join("real").join("f.txt"), b"f").unwrap();
    std::os::unix::fs::symlink(src.join("real"), src.join("link")).unwrap();
    std::os::unix::fs::symlink(src.join("real").join("f.txt"), src.join("f_link")).unwrap();

    let report = session.upload(&src, "/", None).unwrap();
    assert_eq!(report, TransferReport { files: 1, folders: 2, bytes: 1 });
    let p = session.provider();
    let uploaded = p.find(NodeId::ROOT, "src").unwrap();
    assert_eq!(p.child_names(uploaded), ["real"]);
}

#[cfg(target_os = "linux")]
#[test]
fn upload_leaves_non_utf8_names_out() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let session = open_session(|_| {});
    let local = tempfile::tempdir().unwrap();
    let src = local.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("good.txt"), b"ok").unwrap();
    fs::write(src.join(OsStr::from_bytes(b"bad\xff.txt")), b"bad").unwrap();

    let report = session.upload(&src, "/", None).unwrap();
    assert_eq!(report.files, 1);
    let p = session.provider();
    let uploaded = p.find(NodeId::ROOT, "src").unwrap();
    assert_eq!(p.child_names(uploaded), ["good.txt"]);
}
