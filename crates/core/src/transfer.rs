//! Replays a node tree across the device/local boundary.
//!
//! Both directions walk the source tree depth-first pre-order with an
//! explicit work list and stop at the first failure. Whatever already
//! landed on the destination stays there.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Node, NodeId, NodeKind};
use crate::progress::{ProgressSink, TransferReport};
use crate::provider::{FolderCreation, StorageProvider, UploadMetadata};
use crate::session::Device;
use crate::vpath;

/// Where an upload lands: a known folder id or a virtual path resolved once
/// before the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget<'a> {
    Id(NodeId),
    Path(&'a str),
}

impl From<NodeId> for UploadTarget<'_> {
    fn from(id: NodeId) -> Self {
        UploadTarget::Id(id)
    }
}

impl<'a> From<&'a str> for UploadTarget<'a> {
    fn from(path: &'a str) -> Self {
        UploadTarget::Path(path)
    }
}

/// Copies device `nodes` into the local directory `destination`.
///
/// Folders become directories (existing ones are reused), files are fetched
/// over whatever is at the target path. A root call with nothing to copy
/// fails before touching the filesystem.
pub fn download_tree<P: StorageProvider>(
    device: &Device<'_, P>,
    nodes: &[Node],
    destination: &Path,
    is_root: bool,
    max_depth: usize,
    mut progress: Option<&mut dyn ProgressSink>,
) -> Result<TransferReport> {
    let mut report = TransferReport::default();
    if nodes.is_empty() {
        return if is_root {
            Err(Error::NothingToTransfer)
        } else {
            Ok(report)
        };
    }
    std::fs::create_dir_all(destination)?;
    info!(destination = %destination.display(), "download started");

    let mut stack: Vec<(std::slice::Iter<'_, Node>, PathBuf)> =
        vec![(nodes.iter(), destination.to_path_buf())];
    while let Some((pending, dir)) = stack.last_mut() {
        let Some(node) = pending.next() else {
            stack.pop();
            continue;
        };
        vpath::validate_name(&node.name)?;
        let target = dir.join(&node.name);
        debug!(path = %node.path, target = %target.display(), "in-flight");

        match node.kind {
            NodeKind::Folder => {
                if stack.len() > max_depth {
                    return Err(Error::DepthExceeded(node.path.clone()));
                }
                std::fs::create_dir_all(&target)?;
                report.folders += 1;
                stack.push((node.children.iter(), target));
            }
            NodeKind::File => {
                let mut on_bytes = |sent: u64, total: u64| {
                    if let Some(sink) = progress.as_deref_mut() {
                        sink.on_progress(sent, total, node);
                    }
                };
                device
                    .download(node.id, &target, &mut on_bytes)
                    .map_err(|source| {
                        warn!(path = %node.path, error = %source, "download failed");
                        Error::TransferFailed {
                            path: node.path.clone(),
                            source,
                        }
                    })?;
                report.files += 1;
                report.bytes = report.bytes.saturating_add(node.size);
                if let Some(sink) = progress.as_deref_mut() {
                    sink.on_completed(node);
                }
                debug!(path = %node.path, "completed");
            }
        }
    }
    info!(?report, "download finished");
    Ok(report)
}

/// Copies local `nodes` under the device folder `parent`.
///
/// Folders are created or, when one of that name exists, reused. A
/// same-named device entry is deleted before a file is uploaded in its
/// place; colliding names are replaced, never merged.
pub fn upload_tree<P: StorageProvider>(
    device: &Device<'_, P>,
    nodes: &[Node],
    parent: NodeId,
    parent_path: &str,
    max_depth: usize,
    mut progress: Option<&mut dyn ProgressSink>,
) -> Result<TransferReport> {
    let mut report = TransferReport::default();
    info!(parent = %parent_path, "upload started");

    let mut stack: Vec<(std::slice::Iter<'_, Node>, NodeId, String)> =
        vec![(nodes.iter(), parent, parent_path.to_string())];
    while let Some((pending, folder, folder_path)) = stack.last_mut() {
        let Some(node) = pending.next() else {
            stack.pop();
            continue;
        };
        let folder = *folder;
        vpath::validate_name(&node.name)?;
        let path = vpath::join(folder_path, &node.name);
        debug!(source = %node.path, %path, "in-flight");

        match node.kind {
            NodeKind::Folder => {
                if stack.len() > max_depth {
                    return Err(Error::DepthExceeded(node.path.clone()));
                }
                let id = ensure_folder(device, folder, &node.name, &path)?;
                report.folders += 1;
                stack.push((node.children.iter(), id, path));
            }
            NodeKind::File => {
                if let Some(existing) = device.find_child(folder, &node.name)? {
                    debug!(%path, id = %existing.id, "replacing existing entry");
                    device.delete(existing.id)?;
                }
                let metadata = UploadMetadata {
                    name: node.name.clone(),
                    size: node.size,
                    modified: node.modified,
                };
                let mut on_bytes = |sent: u64, total: u64| {
                    if let Some(sink) = progress.as_deref_mut() {
                        sink.on_progress(sent, total, node);
                    }
                };
                device
                    .upload(Path::new(&node.path), &metadata, folder, &mut on_bytes)
                    .map_err(|source| {
                        warn!(%path, error = %source, "upload failed");
                        Error::TransferFailed { path, source }
                    })?;
                report.files += 1;
                report.bytes = report.bytes.saturating_add(node.size);
                if let Some(sink) = progress.as_deref_mut() {
                    sink.on_completed(node);
                }
            }
        }
    }
    info!(?report, "upload finished");
    Ok(report)
}

/// Creates `name` under `parent`, or returns the id of the folder already
/// there. A file of that name is a conflict.
pub(crate) fn ensure_folder<P: StorageProvider>(
    device: &Device<'_, P>,
    parent: NodeId,
    name: &str,
    path: &str,
) -> Result<NodeId> {
    match device.create_folder(name, parent)? {
        FolderCreation::Created(id) => Ok(id),
        FolderCreation::Conflict => match device.find_child(parent, name)? {
            Some(existing) if existing.kind == NodeKind::Folder => {
                debug!(%path, id = %existing.id, "reusing existing folder");
                Ok(existing.id)
            }
            Some(_) => Err(Error::CreateFolderConflict(path.to_string())),
            None => Err(Error::not_found(path)),
        },
    }
}
