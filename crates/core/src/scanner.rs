use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::model::*;
use crate::policy::EntryPolicy;
use crate::provider::StorageProvider;
use crate::session::Device;
use crate::vpath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub recursive: bool,
    pub ignore_hidden: bool,
    /// Folder levels below the scanned root a recursive scan may enter.
    pub max_depth: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            ignore_hidden: true,
            max_depth: 64,
        }
    }
}

struct Frame {
    folder: Option<Node>,
    path: String,
    depth: usize,
    pending: std::vec::IntoIter<RawEntry>,
    children: Vec<Node>,
}

/// Lists the children of `root` on the device, depth-first pre-order when
/// recursive. The walk keeps its own stack; a folder's subtree is complete
/// before the next sibling is listed.
pub fn scan_device<P: StorageProvider>(
    device: &Device<'_, P>,
    root: NodeId,
    root_path: &str,
    opts: ScanOptions,
) -> Result<Vec<Node>> {
    let mut stack = vec![Frame {
        folder: None,
        path: root_path.to_string(),
        depth: 1,
        pending: device.list_children(root)?.into_iter(),
        children: Vec::new(),
    }];

    loop {
        let Some(frame) = stack.last_mut() else {
            return Ok(Vec::new());
        };
        let Some(entry) = frame.pending.next() else {
            let Some(done) = stack.pop() else {
                return Ok(Vec::new());
            };
            match (done.folder, stack.last_mut()) {
                (Some(mut folder), Some(parent)) => {
                    folder.children = done.children;
                    parent.children.push(folder);
                }
                _ => return Ok(done.children),
            }
            continue;
        };

        if opts.ignore_hidden && vpath::is_hidden(&entry.name) {
            trace!(name = %entry.name, "skipping hidden entry");
            continue;
        }
        let node = Node::from_raw(entry, &frame.path);
        if !(node.is_folder() && opts.recursive) {
            frame.children.push(node);
            continue;
        }

        let depth = frame.depth + 1;
        let entries = device.list_children(node.id)?;
        if depth > opts.max_depth && !entries.is_empty() {
            return Err(Error::DepthExceeded(node.path));
        }
        stack.push(Frame {
            path: node.path.clone(),
            folder: Some(node),
            depth,
            pending: entries.into_iter(),
            children: Vec::new(),
        });
    }
}

/// Lists a local directory into nodes, depth-first pre-order when
/// recursive. Entries the policy rejects are left out silently, and so is
/// everything below a rejected folder.
pub fn scan_local(root: &Path, opts: ScanOptions, policy: &dyn EntryPolicy) -> Result<Vec<Node>> {
    if !root.exists() {
        return Err(Error::SourceNotFound(root.to_path_buf()));
    }
    let root = std::fs::canonicalize(root)?;
    let limit = if opts.recursive {
        opts.max_depth.saturating_add(1)
    } else {
        1
    };

    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(limit)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || admit(e, opts.ignore_hidden, policy));

    // open[i] is the folder at depth i + 1 whose subtree is being filled
    let mut open: Vec<Node> = Vec::new();
    let mut top: Vec<Node> = Vec::new();
    for entry in walker {
        let entry = entry?;
        let depth = entry.depth();
        if depth > opts.max_depth {
            let parent = entry.path().parent().unwrap_or(&root);
            return Err(Error::DepthExceeded(parent.to_string_lossy().into_owned()));
        }
        while open.len() >= depth {
            match open.pop() {
                Some(done) => attach(done, &mut open, &mut top),
                None => break,
            }
        }
        let node = local_node(entry.path(), &entry.metadata()?)?;
        if node.is_folder() && opts.recursive {
            open.push(node);
        } else {
            attach(node, &mut open, &mut top);
        }
    }
    while let Some(done) = open.pop() {
        attach(done, &mut open, &mut top);
    }
    debug!(root = %root.display(), entries = top.len(), "local scan finished");
    Ok(top)
}

/// The node for `path` itself; a folder carries its scanned children.
pub fn scan_local_item(path: &Path, opts: ScanOptions, policy: &dyn EntryPolicy) -> Result<Node> {
    if !path.exists() {
        return Err(Error::SourceNotFound(path.to_path_buf()));
    }
    let path = std::fs::canonicalize(path)?;
    let mut node = local_node(&path, &std::fs::metadata(&path)?)?;
    if node.is_folder() {
        node.children = scan_local(&path, opts, policy)?;
    }
    Ok(node)
}

/// Links and names that are not UTF-8 cannot be replayed on the device, so
/// they are dropped before the policy is asked.
fn admit(entry: &DirEntry, ignore_hidden: bool, policy: &dyn EntryPolicy) -> bool {
    if entry.path_is_symlink() {
        trace!(path = %entry.path().display(), "skipping symlink");
        return false;
    }
    let Some(name) = entry.file_name().to_str() else {
        trace!(path = %entry.path().display(), "skipping non-UTF-8 name");
        return false;
    };
    if ignore_hidden && vpath::is_hidden(name) {
        return false;
    }
    match entry.metadata() {
        Ok(md) => {
            let admitted = policy.admit(entry.path(), &md);
            if !admitted {
                trace!(path = %entry.path().display(), "entry rejected by policy");
            }
            admitted
        }
        Err(_) => false,
    }
}

fn attach(node: Node, open: &mut [Node], top: &mut Vec<Node>) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

fn local_node(path: &Path, md: &std::fs::Metadata) -> Result<Node> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::SourceNotFound(path.to_path_buf()))?
        .to_str()
        .ok_or_else(|| Error::illegal_name(path.to_string_lossy()))?
        .to_string();
    let local = path
        .to_str()
        .ok_or_else(|| Error::illegal_name(path.to_string_lossy()))?;
    let kind = if md.is_dir() {
        NodeKind::Folder
    } else {
        NodeKind::File
    };
    Ok(Node {
        id: NodeId::from_local_path(path),
        parent: path.parent().map(NodeId::from_local_path),
        name,
        path: local.to_string(),
        kind,
        size: if md.is_dir() { 0 } else { md.len() },
        modified: md.modified().ok().map(DateTime::<Utc>::from),
        children: Vec::new(),
    })
}
