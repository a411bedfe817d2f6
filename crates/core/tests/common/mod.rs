#![allow(dead_code)]

use mtptree_core::provider::memory::{Call, MemoryProvider};
use mtptree_core::{NodeId, Session};

/// An open session over an in-memory device seeded by `seed`. The journal
/// is cleared once the session is open.
pub fn open_session(seed: impl FnOnce(&MemoryProvider)) -> Session<MemoryProvider> {
    let provider = MemoryProvider::new();
    seed(&provider);
    let mut session = Session::new(provider);
    session.open().expect("open session");
    session.provider().clear_calls();
    session
}

pub fn listings(provider: &MemoryProvider) -> usize {
    provider
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::ListChildren(_)))
        .count()
}

/// Position of the first journal entry matching `pred`.
pub fn position(provider: &MemoryProvider, pred: impl Fn(&Call) -> bool) -> Option<usize> {
    provider.calls().iter().position(pred)
}

/// Device layout used by several suites:
///
/// ```text
/// /DCIM/Camera/IMG_1.jpg   (3 bytes)
/// /DCIM/.thumbnails/t.jpg  (1 byte)
/// /Music/                  (empty)
/// /.hidden                 (2 bytes)
/// /notes.txt               (5 bytes)
/// ```
pub fn seed_phone(p: &MemoryProvider) {
    let dcim = p.add_folder(NodeId::ROOT, "DCIM");
    let camera = p.add_folder(dcim, "Camera");
    p.add_file(camera, "IMG_1.jpg", b"jpg".to_vec());
    let thumbs = p.add_folder(dcim, ".thumbnails");
    p.add_file(thumbs, "t.jpg", b"t".to_vec());
    p.add_folder(NodeId::ROOT, "Music");
    p.add_file(NodeId::ROOT, ".hidden", b"hi".to_vec());
    p.add_file(NodeId::ROOT, "notes.txt", b"hello".to_vec());
}
