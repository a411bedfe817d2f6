//! Slash-delimited virtual paths addressing device nodes.

use crate::error::{Error, Result};

pub const ROOT: &str = "/";

/// Normalizes `path` against the root: repeated separators, `.` and `..`
/// are collapsed and the result always starts with `/`.
pub fn normalize(path: &str) -> Result<String> {
    if path.trim().is_empty() {
        return Err(Error::invalid_path(path));
    }
    if path.contains('\0') {
        return Err(Error::invalid_path(path));
    }
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    if parts.is_empty() {
        return Ok(ROOT.to_string());
    }
    let mut out = String::with_capacity(path.len() + 1);
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    Ok(out)
}

/// Segments of an already normalized path; empty for the root.
pub fn segments(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split('/').filter(|s| !s.is_empty())
}

pub fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Splits a normalized path into its parent path and leaf name.
/// Returns `None` for the root.
pub fn split_parent(normalized: &str) -> Option<(&str, &str)> {
    let idx = normalized.rfind('/')?;
    let name = &normalized[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if idx == 0 { ROOT } else { &normalized[..idx] };
    Some((parent, name))
}

/// A leaf name must be non-blank, must not be `.`/`..` and must not contain
/// a separator.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0')
    {
        return Err(Error::illegal_name(name));
    }
    Ok(())
}

/// Unix hidden-file convention: a leading dot not immediately followed by
/// another dot.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && !name.starts_with("..")
}
