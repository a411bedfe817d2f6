use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Node;
use crate::provider::StorageProvider;
use crate::session::Device;
use crate::vpath;

/// Resolves a virtual path to its node by listing one folder per segment,
/// starting from the storage root. The root itself resolves without any
/// device traffic.
pub fn resolve<P: StorageProvider>(device: &Device<'_, P>, path: &str) -> Result<Node> {
    let normalized = vpath::normalize(path)?;
    let mut current = Node::root();
    if normalized == vpath::ROOT {
        return Ok(current);
    }

    for segment in vpath::segments(&normalized) {
        if !current.is_folder() {
            return Err(Error::not_found(vpath::join(&current.path, segment)));
        }
        let entries = device.list_children(current.id)?;
        let Some(entry) = entries.into_iter().find(|e| e.name == segment) else {
            debug!(path = %normalized, missing = segment, "segment not found");
            return Err(Error::not_found(vpath::join(&current.path, segment)));
        };
        current = Node::from_raw(entry, &current.path);
    }
    Ok(current)
}
