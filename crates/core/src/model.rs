use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Identifier of a node. Device nodes carry the provider-assigned object id,
/// local nodes a hash of their absolute path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// The "all files and folders" object of a storage.
    pub const ROOT: NodeId = NodeId(0xFFFF_FFFF);

    /// Surrogate id for a local entry. Not collision-checked.
    pub fn from_local_path(path: &Path) -> Self {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        NodeId(hasher.finish())
    }

    pub fn is_root(self) -> bool {
        self == NodeId::ROOT
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::ROOT
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Folder,
}

/// One entry as listed by a storage provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: NodeId,
    pub name: String,
    pub size: u64,
    pub kind: NodeKind,
    pub parent: NodeId,
    pub storage: StorageId,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    pub description: String,
    pub volume_label: String,
    pub max_capacity: u64,
    pub free_space: u64,
}

/// A file or folder snapshot, device- or local-sourced.
///
/// `path` is always the join of the parent's path and `name`. `children` is
/// only populated by recursive enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub files: u64,
    pub folders: u64,
    pub bytes: u64,
}

impl Node {
    /// The storage root, as returned by resolving `/`.
    pub fn root() -> Self {
        Node {
            id: NodeId::ROOT,
            parent: None,
            name: String::new(),
            path: "/".to_string(),
            kind: NodeKind::Folder,
            size: 0,
            modified: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn from_raw(entry: RawEntry, parent_path: &str) -> Self {
        let path = crate::vpath::join(parent_path, &entry.name);
        let size = match entry.kind {
            NodeKind::Folder => 0,
            NodeKind::File => entry.size,
        };
        Node {
            id: entry.id,
            parent: Some(entry.parent),
            name: entry.name,
            path,
            kind: entry.kind,
            size,
            modified: entry.modified,
            children: Vec::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Pre-order iterator over this node and all of its descendants.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Totals over the subtree, this node included.
    pub fn stats(&self) -> TreeStats {
        tree_stats(std::slice::from_ref(self))
    }
}

pub fn tree_stats(nodes: &[Node]) -> TreeStats {
    let mut stats = TreeStats::default();
    for node in nodes.iter().flat_map(Node::walk) {
        match node.kind {
            NodeKind::Folder => stats.folders += 1,
            NodeKind::File => {
                stats.files += 1;
                stats.bytes = stats.bytes.saturating_add(node.size);
            }
        }
    }
    stats
}

pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
