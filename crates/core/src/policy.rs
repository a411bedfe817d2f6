//! Which local entries a scan admits.

use std::fs::Metadata;
use std::path::Path;

/// OS and tooling droppings that never leave the local side.
pub const JUNK_NAMES: &[&str] = &[
    ".DS_Store",
    "Thumbs.db",
    "ehthumbs.db",
    "desktop.ini",
    ".Spotlight-V100",
    ".Trashes",
    ".fseventsd",
    "$RECYCLE.BIN",
];

pub fn is_junk(name: &str) -> bool {
    JUNK_NAMES.iter().any(|j| j.eq_ignore_ascii_case(name)) || name.starts_with("._")
}

/// Decides whether a local entry belongs in a scanned tree. Rejected
/// folders are not descended into.
pub trait EntryPolicy {
    fn admit(&self, path: &Path, metadata: &Metadata) -> bool;
}

impl<F> EntryPolicy for F
where
    F: Fn(&Path, &Metadata) -> bool,
{
    fn admit(&self, path: &Path, metadata: &Metadata) -> bool {
        self(path, metadata)
    }
}

/// Drops junk and anything the process cannot both read and write.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPolicy;

impl EntryPolicy for StandardPolicy {
    fn admit(&self, path: &Path, metadata: &Metadata) -> bool {
        let junk = path
            .file_name()
            .map(|n| is_junk(&n.to_string_lossy()))
            .unwrap_or(false);
        !junk && is_accessible(path, metadata)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdmitAll;

impl EntryPolicy for AdmitAll {
    fn admit(&self, _path: &Path, _metadata: &Metadata) -> bool {
        true
    }
}

/// Read+write check: the read-only bit must be clear and the entry must
/// open (files) or list (folders).
pub fn is_accessible(path: &Path, metadata: &Metadata) -> bool {
    if metadata.permissions().readonly() {
        return false;
    }
    if metadata.is_dir() {
        std::fs::read_dir(path).is_ok()
    } else {
        std::fs::File::open(path).is_ok()
    }
}
