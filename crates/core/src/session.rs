//! The device session and the path-level operations built on it.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::*;
use crate::policy::{EntryPolicy, StandardPolicy};
use crate::progress::{ProgressSink, TransferReport};
use crate::provider::*;
use crate::scanner::{self, ScanOptions};
use crate::transfer::{self, UploadTarget};
use crate::{resolver, vpath};

#[derive(Debug, Clone, Copy)]
struct Active {
    session: SessionHandle,
    storage: StorageId,
}

/// Owns a provider and, while open, its device session and selected
/// storage. Every device operation is gated on the session being open.
pub struct Session<P: StorageProvider> {
    provider: P,
    config: Config,
    policy: Box<dyn EntryPolicy + Send + Sync>,
    active: Option<Active>,
}

/// Borrowed view of an open session; all device calls go through it.
pub struct Device<'a, P> {
    provider: &'a P,
    session: SessionHandle,
    storage: StorageId,
}

impl<'a, P: StorageProvider> Device<'a, P> {
    pub fn storage(&self) -> StorageId {
        self.storage
    }

    pub fn list_children(&self, folder: NodeId) -> Result<Vec<RawEntry>> {
        debug!(%folder, "list children");
        Ok(self
            .provider
            .list_children(self.session, self.storage, folder)?)
    }

    pub fn find_child(&self, folder: NodeId, name: &str) -> Result<Option<RawEntry>> {
        Ok(self
            .list_children(folder)?
            .into_iter()
            .find(|e| e.name == name))
    }

    pub fn create_folder(&self, name: &str, parent: NodeId) -> Result<FolderCreation> {
        debug!(name, %parent, "create folder");
        Ok(self
            .provider
            .create_folder(self.session, name, parent, self.storage)?)
    }

    pub fn delete(&self, id: NodeId) -> Result<()> {
        debug!(%id, "delete");
        Ok(self.provider.delete_entry(self.session, id)?)
    }

    pub fn rename(&self, id: NodeId, new_name: &str) -> Result<StatusCode> {
        debug!(%id, new_name, "rename");
        Ok(self.provider.rename(self.session, id, new_name)?)
    }

    pub fn download(
        &self,
        id: NodeId,
        destination: &Path,
        on_progress: ByteProgress<'_>,
    ) -> ProviderResult<()> {
        self.provider
            .download_bytes(self.session, id, destination, on_progress)
    }

    pub fn upload(
        &self,
        source: &Path,
        metadata: &UploadMetadata,
        parent: NodeId,
        on_progress: ByteProgress<'_>,
    ) -> ProviderResult<NodeId> {
        self.provider.upload_bytes(
            self.session,
            source,
            metadata,
            parent,
            self.storage,
            on_progress,
        )
    }
}

impl<P: StorageProvider> Session<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, Config::default())
    }

    pub fn with_config(provider: P, config: Config) -> Self {
        Self {
            provider,
            config,
            policy: Box::new(StandardPolicy),
            active: None,
        }
    }

    /// Replaces the policy deciding which local entries uploads pick up.
    pub fn set_policy(&mut self, policy: impl EntryPolicy + Send + Sync + 'static) {
        self.policy = Box::new(policy);
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Detects the device, opens a session and selects a storage. An
    /// already open session is released first.
    pub fn open(&mut self) -> Result<StorageId> {
        if self.active.is_some() {
            self.release()?;
        }
        let device = self.provider.detect().map_err(|e| {
            if e.is_no_device() {
                Error::NoDevice
            } else {
                Error::Provider(e)
            }
        })?;
        let session = self.provider.open(device)?;
        let storage = match self.select_storage(session) {
            Ok(storage) => storage,
            Err(e) => {
                if let Err(release_err) = self.provider.release(session) {
                    warn!(error = %release_err, "release after failed open");
                }
                return Err(e);
            }
        };
        info!(storage = storage.0, "session open");
        self.active = Some(Active { session, storage });
        Ok(storage)
    }

    fn select_storage(&self, session: SessionHandle) -> Result<StorageId> {
        let storages = self.provider.list_storages(session)?;
        match self.config.storage {
            Some(wanted) => storages
                .keys()
                .copied()
                .find(|id| id.0 == wanted)
                .ok_or(Error::NoStorage),
            None => storages.keys().next().copied().ok_or(Error::NoStorage),
        }
    }

    /// Releases the device session. Releasing a closed session is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if let Some(active) = self.active.take() {
            self.provider.release(active.session)?;
            info!("session released");
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<StorageId> {
        self.release()?;
        self.open()
    }

    /// The precondition guard of every device operation.
    pub fn device(&self) -> Result<Device<'_, P>> {
        let active = self.active.ok_or(Error::NoDevice)?;
        Ok(Device {
            provider: &self.provider,
            session: active.session,
            storage: active.storage,
        })
    }

    pub fn storages(&self) -> Result<BTreeMap<StorageId, StorageDescriptor>> {
        let device = self.device()?;
        Ok(self.provider.list_storages(device.session)?)
    }

    pub fn resolve(&self, path: &str) -> Result<Node> {
        resolver::resolve(&self.device()?, path)
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        match self.resolve(path) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Children of the folder at `path`.
    pub fn list(&self, path: &str, opts: ScanOptions) -> Result<Vec<Node>> {
        let device = self.device()?;
        let folder = resolver::resolve(&device, path)?;
        if !folder.is_folder() {
            return Err(Error::invalid_path(folder.path));
        }
        scanner::scan_device(&device, folder.id, &folder.path, opts)
    }

    /// Creates the folder at `path`; an existing folder there is returned
    /// as is.
    pub fn create_folder(&self, path: &str) -> Result<Node> {
        let normalized = vpath::normalize(path)?;
        let (parent_path, name) =
            vpath::split_parent(&normalized).ok_or_else(|| Error::invalid_path(path))?;
        vpath::validate_name(name)?;
        let device = self.device()?;
        let parent = resolver::resolve(&device, parent_path)?;
        if !parent.is_folder() {
            return Err(Error::invalid_path(parent.path));
        }
        let id = transfer::ensure_folder(&device, parent.id, name, &normalized)?;
        Ok(Node {
            id,
            parent: Some(parent.id),
            name: name.to_string(),
            path: normalized,
            kind: NodeKind::Folder,
            size: 0,
            modified: None,
            children: Vec::new(),
        })
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        let device = self.device()?;
        let node = resolver::resolve(&device, path)?;
        if node.id.is_root() {
            return Err(Error::invalid_path(path));
        }
        device.delete(node.id)?;
        info!(path = %node.path, "deleted");
        Ok(())
    }

    /// Renames the entry at `path` and confirms the new name by listing its
    /// parent again; the provider's status alone is not trusted.
    pub fn rename(&self, path: &str, new_name: &str) -> Result<Node> {
        vpath::validate_name(new_name)?;
        let device = self.device()?;
        let node = resolver::resolve(&device, path)?;
        if node.id.is_root() {
            return Err(Error::invalid_path(path));
        }
        let failed = |actual: &str| Error::RenameFailed {
            path: node.path.clone(),
            expected: new_name.to_string(),
            actual: actual.to_string(),
        };

        let status = device.rename(node.id, new_name)?;
        if status != STATUS_OK {
            warn!(path = %node.path, status, "rename rejected");
            return Err(failed(&node.name));
        }
        let parent = node.parent.unwrap_or(NodeId::ROOT);
        let entry = device
            .list_children(parent)?
            .into_iter()
            .find(|e| e.id == node.id);
        let Some(entry) = entry else {
            return Err(failed(""));
        };
        if entry.name != new_name {
            return Err(failed(&entry.name));
        }
        let parent_path = vpath::split_parent(&node.path)
            .map(|(p, _)| p)
            .unwrap_or(vpath::ROOT);
        Ok(Node::from_raw(entry, parent_path))
    }

    pub fn download_tree(
        &self,
        nodes: &[Node],
        destination: &Path,
        is_root: bool,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<TransferReport> {
        let device = self.device()?;
        transfer::download_tree(
            &device,
            nodes,
            destination,
            is_root,
            self.config.max_depth,
            progress,
        )
    }

    /// Downloads the file or folder at `path` into `destination`. The
    /// storage root contributes its children rather than itself.
    pub fn download(
        &self,
        path: &str,
        destination: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<TransferReport> {
        let device = self.device()?;
        let mut node = resolver::resolve(&device, path)?;
        if node.is_folder() {
            let opts = self.config.scan_options(true);
            node.children = scanner::scan_device(&device, node.id, &node.path, opts)?;
        }
        // the scan counts levels below `node`; heading the list with `node`
        // itself adds one
        let (nodes, max_depth) = if node.id.is_root() {
            (node.children, self.config.max_depth)
        } else {
            (vec![node], self.config.max_depth.saturating_add(1))
        };
        transfer::download_tree(&device, &nodes, destination, true, max_depth, progress)
    }

    pub fn upload_tree<'t>(
        &self,
        nodes: &[Node],
        target: impl Into<UploadTarget<'t>>,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<TransferReport> {
        let device = self.device()?;
        let (parent, parent_path) = match target.into() {
            UploadTarget::Id(id) if id.is_root() => (id, vpath::ROOT.to_string()),
            UploadTarget::Id(id) => (id, format!("<{id}>")),
            UploadTarget::Path(path) => {
                let folder = resolver::resolve(&device, path)?;
                if !folder.is_folder() {
                    return Err(Error::invalid_path(folder.path));
                }
                (folder.id, folder.path)
            }
        };
        transfer::upload_tree(
            &device,
            nodes,
            parent,
            &parent_path,
            self.config.max_depth,
            progress,
        )
    }

    /// Uploads the local file or directory at `source` into the device
    /// folder `destination`.
    pub fn upload(
        &self,
        source: &Path,
        destination: &str,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<TransferReport> {
        self.device()?;
        let opts = self.config.scan_options(true);
        let item = scanner::scan_local_item(source, opts, self.policy.as_ref())?;
        let device = self.device()?;
        let folder = resolver::resolve(&device, destination)?;
        if !folder.is_folder() {
            return Err(Error::invalid_path(folder.path));
        }
        transfer::upload_tree(
            &device,
            std::slice::from_ref(&item),
            folder.id,
            &folder.path,
            self.config.max_depth.saturating_add(1),
            progress,
        )
    }
}
