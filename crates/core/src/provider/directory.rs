//! A provider that emulates a device over a local directory.
//!
//! Object ids are handed out the first time an entry is listed and stay
//! valid until the entry is deleted or renamed away.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::*;

pub const STORAGE: StorageId = StorageId(0x0001_0001);

#[derive(Debug, Default)]
struct Ids {
    next: u64,
    by_id: HashMap<NodeId, PathBuf>,
    by_path: HashMap<PathBuf, NodeId>,
}

impl Ids {
    fn assign(&mut self, path: &Path) -> NodeId {
        if let Some(id) = self.by_path.get(path) {
            return *id;
        }
        self.next += 1;
        let id = NodeId(self.next);
        self.by_id.insert(id, path.to_path_buf());
        self.by_path.insert(path.to_path_buf(), id);
        id
    }

    /// Forgets `path` and everything below it.
    fn forget(&mut self, path: &Path) {
        let stale: Vec<PathBuf> = self
            .by_path
            .keys()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();
        for p in stale {
            if let Some(id) = self.by_path.remove(&p) {
                self.by_id.remove(&id);
            }
        }
    }
}

pub struct DirectoryProvider {
    root: PathBuf,
    chunk_size: usize,
    ids: Mutex<Ids>,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            root: root.into(),
            chunk_size: chunk_size.max(1),
            ids: Mutex::new(Ids::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, id: NodeId) -> ProviderResult<PathBuf> {
        if id.is_root() {
            return Ok(self.root.clone());
        }
        self.ids
            .lock()
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::general(format!("no such object {id}")))
    }

    fn copy(&self, from: &Path, to: &Path, on_progress: ByteProgress<'_>) -> ProviderResult<u64> {
        let mut input = fs::File::open(from)?;
        let total = input.metadata()?.len();
        let mut output = fs::File::create(to)?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut sent = 0u64;
        if total == 0 {
            on_progress(0, 0);
        }
        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            output.write_all(&buf[..n])?;
            sent += n as u64;
            on_progress(sent, total.max(sent));
        }
        output.flush()?;
        Ok(sent)
    }
}

fn modified(md: &fs::Metadata) -> Option<DateTime<Utc>> {
    md.modified().ok().map(DateTime::<Utc>::from)
}

impl StorageProvider for DirectoryProvider {
    fn detect(&self) -> ProviderResult<DeviceHandle> {
        if self.root.is_dir() {
            Ok(DeviceHandle(1))
        } else {
            Err(ProviderError::no_device())
        }
    }

    fn open(&self, _device: DeviceHandle) -> ProviderResult<SessionHandle> {
        Ok(SessionHandle(1))
    }

    fn list_storages(
        &self,
        _session: SessionHandle,
    ) -> ProviderResult<BTreeMap<StorageId, StorageDescriptor>> {
        let label = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut storages = BTreeMap::new();
        storages.insert(
            STORAGE,
            StorageDescriptor {
                description: format!("directory {}", self.root.display()),
                volume_label: label,
                max_capacity: 0,
                free_space: 0,
            },
        );
        Ok(storages)
    }

    fn list_children(
        &self,
        _session: SessionHandle,
        storage: StorageId,
        folder: NodeId,
    ) -> ProviderResult<Vec<RawEntry>> {
        let dir = self.path_of(folder)?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let md = entry.metadata()?;
            let path = entry.path();
            let id = self.ids.lock().assign(&path);
            let kind = if md.is_dir() {
                NodeKind::Folder
            } else {
                NodeKind::File
            };
            entries.push(RawEntry {
                id,
                name: entry.file_name().to_string_lossy().into_owned(),
                size: if md.is_dir() { 0 } else { md.len() },
                kind,
                parent: folder,
                storage,
                modified: modified(&md),
            });
        }
        Ok(entries)
    }

    fn create_folder(
        &self,
        _session: SessionHandle,
        name: &str,
        parent: NodeId,
        _storage: StorageId,
    ) -> ProviderResult<FolderCreation> {
        let path = self.path_of(parent)?.join(name);
        match fs::create_dir(&path) {
            Ok(()) => Ok(FolderCreation::Created(self.ids.lock().assign(&path))),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(FolderCreation::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_entry(&self, _session: SessionHandle, id: NodeId) -> ProviderResult<()> {
        if id.is_root() {
            return Err(ProviderError::general("refusing to delete the storage root"));
        }
        let path = self.path_of(id)?;
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        self.ids.lock().forget(&path);
        Ok(())
    }

    fn rename(
        &self,
        _session: SessionHandle,
        id: NodeId,
        new_name: &str,
    ) -> ProviderResult<StatusCode> {
        let from = self.path_of(id)?;
        let Some(parent) = from.parent() else {
            return Ok(ProviderError::GENERAL);
        };
        let to = parent.join(new_name);
        if to.exists() {
            return Ok(ProviderError::GENERAL);
        }
        fs::rename(&from, &to)?;
        let mut ids = self.ids.lock();
        ids.forget(&from);
        ids.by_id.insert(id, to.clone());
        ids.by_path.insert(to, id);
        Ok(STATUS_OK)
    }

    fn download_bytes(
        &self,
        _session: SessionHandle,
        id: NodeId,
        destination: &Path,
        on_progress: ByteProgress<'_>,
    ) -> ProviderResult<()> {
        let source = self.path_of(id)?;
        self.copy(&source, destination, on_progress)?;
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
        let target = self.path_of(parent)?.join(&metadata.name);
        self.copy(source, &target, on_progress)?;
        Ok(self.ids.lock().assign(&target))
    }

    fn release(&self, _session: SessionHandle) -> ProviderResult<()> {
        Ok(())
    }
}
