//! Contract of the device storage provider.
//!
//! A provider performs the raw device I/O: detection, session handling and
//! flat, id-addressed file and folder primitives. It knows nothing about
//! paths; everything hierarchical lives in the session layer.

pub mod directory;
pub mod memory;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::model::*;

/// Status code space of the provider. `NO_DEVICE` is only meaningful
/// during detection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i32,
    pub message: String,
}

impl ProviderError {
    pub const NO_DEVICE: i32 = -1;
    pub const GENERAL: i32 = 1;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::new(Self::GENERAL, message)
    }

    pub fn no_device() -> Self {
        Self::new(Self::NO_DEVICE, "no device attached")
    }

    pub fn is_no_device(&self) -> bool {
        self.code == Self::NO_DEVICE
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::general(err.to_string())
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Outcome of a folder creation. Adapters over transports that signal a
/// collision with a zero/falsy id must map it to `Conflict`; a `Created`
/// id is always taken at face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderCreation {
    Created(NodeId),
    Conflict,
}

/// Status returned by `rename`. Zero is success.
pub type StatusCode = i32;
pub const STATUS_OK: StatusCode = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetadata {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Byte-level progress callback: `(sent, total)`.
pub type ByteProgress<'a> = &'a mut dyn FnMut(u64, u64);

pub trait StorageProvider {
    fn detect(&self) -> ProviderResult<DeviceHandle>;

    fn open(&self, device: DeviceHandle) -> ProviderResult<SessionHandle>;

    fn list_storages(
        &self,
        session: SessionHandle,
    ) -> ProviderResult<BTreeMap<StorageId, StorageDescriptor>>;

    /// Immediate children of `folder`, in the provider's enumeration order.
    fn list_children(
        &self,
        session: SessionHandle,
        storage: StorageId,
        folder: NodeId,
    ) -> ProviderResult<Vec<RawEntry>>;

    fn create_folder(
        &self,
        session: SessionHandle,
        name: &str,
        parent: NodeId,
        storage: StorageId,
    ) -> ProviderResult<FolderCreation>;

    fn delete_entry(&self, session: SessionHandle, id: NodeId) -> ProviderResult<()>;

    fn rename(&self, session: SessionHandle, id: NodeId, new_name: &str)
        -> ProviderResult<StatusCode>;

    fn download_bytes(
        &self,
        session: SessionHandle,
        id: NodeId,
        destination: &Path,
        on_progress: ByteProgress<'_>,
    ) -> ProviderResult<()>;

    fn upload_bytes(
        &self,
        session: SessionHandle,
        source: &Path,
        metadata: &UploadMetadata,
        parent: NodeId,
        storage: StorageId,
        on_progress: ByteProgress<'_>,
    ) -> ProviderResult<NodeId>;

    fn release(&self, session: SessionHandle) -> ProviderResult<()>;
}

impl<P: StorageProvider + ?Sized> StorageProvider for std::sync::Arc<P> {
    fn detect(&self) -> ProviderResult<DeviceHandle> {
        (**self).detect()
    }

    fn open(&self, device: DeviceHandle) -> ProviderResult<SessionHandle> {
        (**self).open(device)
    }

    fn list_storages(
        &self,
        session: SessionHandle,
    ) -> ProviderResult<BTreeMap<StorageId, StorageDescriptor>> {
        (**self).list_storages(session)
    }

    fn list_children(
        &self,
        session: SessionHandle,
        storage: StorageId,
        folder: NodeId,
    ) -> ProviderResult<Vec<RawEntry>> {
        (**self).list_children(session, storage, folder)
    }

    fn create_folder(
        &self,
        session: SessionHandle,
        name: &str,
        parent: NodeId,
        storage: StorageId,
    ) -> ProviderResult<FolderCreation> {
        (**self).create_folder(session, name, parent, storage)
    }

    fn delete_entry(&self, session: SessionHandle, id: NodeId) -> ProviderResult<()> {
        (**self).delete_entry(session, id)
    }

    fn rename(
        &self,
        session: SessionHandle,
        id: NodeId,
        new_name: &str,
    ) -> ProviderResult<StatusCode> {
        (**self).rename(session, id, new_name)
    }

    fn download_bytes(
        &self,
        session: SessionHandle,
        id: NodeId,
        destination: &Path,
        on_progress: ByteProgress<'_>,
    ) -> ProviderResult<()> {
        (**self).download_bytes(session, id, destination, on_progress)
    }

    fn upload_bytes(
        &self,
        session: SessionHandle,
        source: &Path,
        metadata: &UploadMetadata,
        parent: NodeId,
        storage: StorageId,
        on_progress: ByteProgress<'_>,
    ) -> ProviderResult<NodeId> {
        (**self).upload_bytes(session, source, metadata, parent, storage, on_progress)
    }

    fn release(&self, session: SessionHandle) -> ProviderResult<()> {
        (**self).release(session)
    }
}
