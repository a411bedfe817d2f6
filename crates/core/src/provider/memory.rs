//! In-memory provider with a call journal.
//!
//! Models a device as a flat map of objects linked by parent ids. Every
//! provider call is recorded so callers can assert on device traffic.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use super::*;

pub const DEFAULT_STORAGE: StorageId = StorageId(0x0001_0001);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Detect,
    Open,
    ListStorages,
    ListChildren(NodeId),
    CreateFolder { name: String, parent: NodeId },
    Delete(NodeId),
    Rename { id: NodeId, name: String },
    Download(NodeId),
    Upload { name: String, parent: NodeId },
    Release,
}

#[derive(Debug, Clone)]
struct Object {
    name: String,
    parent: NodeId,
    kind: NodeKind,
    data: Vec<u8>,
    modified: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner {
    attached: bool,
    storages: BTreeMap<StorageId, StorageDescriptor>,
    objects: HashMap<NodeId, Object>,
    children: HashMap<NodeId, Vec<NodeId>>,
    next_id: u64,
    next_session: u32,
    calls: Vec<Call>,
    failing: HashSet<String>,
    ignore_renames: bool,
    refuse_folders: bool,
    chunk_size: usize,
}

#[derive(Debug)]
pub struct MemoryProvider {
    inner: Mutex<Inner>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// An attached device with a single empty storage.
    pub fn new() -> Self {
        let mut storages = BTreeMap::new();
        storages.insert(
            DEFAULT_STORAGE,
            StorageDescriptor {
                description: "Internal shared storage".to_string(),
                volume_label: "memory".to_string(),
                max_capacity: 1 << 30,
                free_space: 1 << 30,
            },
        );
        Self {
            inner: Mutex::new(Inner {
                attached: true,
                storages,
                objects: HashMap::new(),
                children: HashMap::new(),
                next_id: 1,
                next_session: 1,
                calls: Vec::new(),
                failing: HashSet::new(),
                ignore_renames: false,
                refuse_folders: false,
                chunk_size: 4096,
            }),
        }
    }

    /// A provider whose detection reports no device.
    pub fn detached() -> Self {
        let provider = Self::new();
        provider.inner.lock().attached = false;
        provider
    }

    pub fn without_storages() -> Self {
        let provider = Self::new();
        provider.inner.lock().storages.clear();
        provider
    }

    pub fn add_storage(&self, id: StorageId, descriptor: StorageDescriptor) {
        self.inner.lock().storages.insert(id, descriptor);
    }

    pub fn add_folder(&self, parent: NodeId, name: &str) -> NodeId {
        self.inner.lock().insert(parent, name, NodeKind::Folder, Vec::new())
    }

    pub fn add_file(&self, parent: NodeId, name: &str, data: impl Into<Vec<u8>>) -> NodeId {
        self.inner.lock().insert(parent, name, NodeKind::File, data.into())
    }

    /// Makes every byte transfer of an object with this name fail.
    pub fn fail_transfers_of(&self, name: &str) {
        self.inner.lock().failing.insert(name.to_string());
    }

    /// Makes `rename` report success without renaming anything.
    pub fn ignore_renames(&self, ignore: bool) {
        self.inner.lock().ignore_renames = ignore;
    }

    /// Makes `create_folder` report a conflict without creating anything.
    pub fn refuse_folders(&self, refuse: bool) {
        self.inner.lock().refuse_folders = refuse;
    }

    pub fn set_chunk_size(&self, chunk_size: usize) {
        self.inner.lock().chunk_size = chunk_size.max(1);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn find(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let inner = self.inner.lock();
        inner
            .children
            .get(&parent)?
            .iter()
            .copied()
            .find(|id| inner.objects.get(id).is_some_and(|o| o.name == name))
    }

    pub fn child_names(&self, parent: NodeId) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .children
            .get(&parent)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.objects.get(id))
                    .map(|o| o.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.inner.lock().objects.get(&id).map(|o| o.kind)
    }

    pub fn contents(&self, id: NodeId) -> Option<Vec<u8>> {
        self.inner.lock().objects.get(&id).map(|o| o.data.clone())
    }
}

impl Inner {
    fn insert(&mut self, parent: NodeId, name: &str, kind: NodeKind, data: Vec<u8>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.objects.insert(
            id,
            Object {
                name: name.to_string(),
                parent,
                kind,
                data,
                modified: None,
            },
        );
        self.children.entry(parent).or_default().push(id);
        id
    }

    fn is_folder(&self, id: NodeId) -> bool {
        id.is_root() || self.objects.get(&id).is_some_and(|o| o.kind == NodeKind::Folder)
    }

    fn sibling_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children
            .get(&parent)?
            .iter()
            .copied()
            .find(|id| self.objects.get(id).is_some_and(|o| o.name == name))
    }

    fn remove(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(children) = self.children.remove(&id) {
                pending.extend(children);
            }
            if let Some(object) = self.objects.remove(&id) {
                if let Some(siblings) = self.children.get_mut(&object.parent) {
                    siblings.retain(|s| *s != id);
                }
            }
        }
    }

    fn report(&self, total: usize, on_progress: ByteProgress<'_>) {
        let total = total as u64;
        if total == 0 {
            on_progress(0, 0);
            return;
        }
        let mut sent = 0u64;
        while sent < total {
            sent = (sent + self.chunk_size as u64).min(total);
            on_progress(sent, total);
        }
    }
}

fn no_such_object(id: NodeId) -> ProviderError {
    ProviderError::general(format!("no such object {id}"))
}

impl StorageProvider for MemoryProvider {
    fn detect(&self) -> ProviderResult<DeviceHandle> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Detect);
        if inner.attached {
            Ok(DeviceHandle(1))
        } else {
            Err(ProviderError::no_device())
        }
    }

    fn open(&self, _device: DeviceHandle) -> ProviderResult<SessionHandle> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Open);
        let session = SessionHandle(inner.next_session);
        inner.next_session += 1;
        Ok(session)
    }

    fn list_storages(
        &self,
        _session: SessionHandle,
    ) -> ProviderResult<BTreeMap<StorageId, StorageDescriptor>> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::ListStorages);
        Ok(inner.storages.clone())
    }

    fn list_children(
        &self,
        _session: SessionHandle,
        storage: StorageId,
        folder: NodeId,
    ) -> ProviderResult<Vec<RawEntry>> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::ListChildren(folder));
        if !inner.is_folder(folder) {
            return Err(no_such_object(folder));
        }
        let ids = inner.children.get(&folder).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| {
                inner.objects.get(&id).map(|o| RawEntry {
                    id,
                    name: o.name.clone(),
                    size: o.data.len() as u64,
                    kind: o.kind,
                    parent: o.parent,
                    storage,
                    modified: o.modified,
                })
            })
            .collect())
    }

    fn create_folder(
        &self,
        _session: SessionHandle,
        name: &str,
        parent: NodeId,
        _storage: StorageId,
    ) -> ProviderResult<FolderCreation> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::CreateFolder {
            name: name.to_string(),
            parent,
        });
        if !inner.is_folder(parent) {
            return Err(no_such_object(parent));
        }
        if inner.refuse_folders || inner.sibling_named(parent, name).is_some() {
            return Ok(FolderCreation::Conflict);
        }
        Ok(FolderCreation::Created(inner.insert(
            parent,
            name,
            NodeKind::Folder,
            Vec::new(),
        )))
    }

    fn delete_entry(&self, _session: SessionHandle, id: NodeId) -> ProviderResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Delete(id));
        if !inner.objects.contains_key(&id) {
            return Err(no_such_object(id));
        }
        inner.remove(id);
        Ok(())
    }

    fn rename(
        &self,
        _session: SessionHandle,
        id: NodeId,
        new_name: &str,
    ) -> ProviderResult<StatusCode> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Rename {
            id,
            name: new_name.to_string(),
        });
        if inner.ignore_renames {
            return Ok(STATUS_OK);
        }
        match inner.objects.get_mut(&id) {
            Some(object) => {
                object.name = new_name.to_string();
                Ok(STATUS_OK)
            }
            None => Ok(0x2009),
        }
    }

    fn download_bytes(
        &self,
        _session: SessionHandle,
        id: NodeId,
        destination: &Path,
        on_progress: ByteProgress<'_>,
    ) -> ProviderResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Download(id));
        let object = inner.objects.get(&id).ok_or_else(|| no_such_object(id))?;
        if object.kind != NodeKind::File {
            return Err(ProviderError::general(format!("{id} is not a file")));
        }
        if inner.failing.contains(&object.name) {
            return Err(ProviderError::general(format!("injected failure for {}", object.name)));
        }
        std::fs::write(destination, &object.data)?;
        inner.report(object.data.len(), on_progress);
        Ok(())
    }

    fn upload_bytes(
        &self,
        _session: SessionHandle,
        source: &Path,
        metadata: &UploadMetadata,
        parent: NodeId,
        _storage: StorageId,
        on_progress: ByteProgress<'_>,
    ) -> ProviderResult<NodeId> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Upload {
            name: metadata.name.clone(),
            parent,
        });
        if !inner.is_folder(parent) {
            return Err(no_such_object(parent));
        }
        if inner.failing.contains(&metadata.name) {
            return Err(ProviderError::general(format!(
                "injected failure for {}",
                metadata.name
            )));
        }
        let data = std::fs::read(source)?;
        let len = data.len();
        let id = inner.insert(parent, &metadata.name, NodeKind::File, data);
        if let Some(object) = inner.objects.get_mut(&id) {
            object.modified = metadata.modified;
        }
        inner.report(len, on_progress);
        Ok(id)
    }

    fn release(&self, _session: SessionHandle) -> ProviderResult<()> {
        self.inner.lock().calls.push(Call::Release);
        Ok(())
    }
}
