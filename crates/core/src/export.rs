use bytesize::ByteSize;
use std::fmt::Write as _;

use crate::model::*;

fn kind_str(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::File => "file",
        NodeKind::Folder => "folder",
    }
}

pub fn to_csv(nodes: &[Node], mut w: impl std::io::Write) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(&mut w);
    writer.write_record(["path", "name", "kind", "size", "id", "modified"])?;
    for n in nodes.iter().flat_map(Node::walk) {
        let modified = n.modified.map(|m| m.to_rfc3339()).unwrap_or_default();
        writer.write_record([
            n.path.clone(),
            n.name.clone(),
            kind_str(n.kind).to_string(),
            n.size.to_string(),
            n.id.to_string(),
            modified,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_json(nodes: &[Node]) -> serde_json::Value {
    fn node_json(n: &Node) -> serde_json::Value {
        serde_json::json!({
            "id": n.id.0,
            "parent": n.parent.map(|p| p.0),
            "path": n.path,
            "name": n.name,
            "kind": kind_str(n.kind),
            "size": n.size,
            "modified": n.modified,
            "children": n.children.iter().map(node_json).collect::<Vec<_>>(),
        })
    }
    serde_json::Value::Array(nodes.iter().map(node_json).collect())
}

/// Indented listing, folders suffixed with `/`.
pub fn render_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    let mut stack: Vec<(std::slice::Iter<'_, Node>, usize)> = vec![(nodes.iter(), 0)];
    while let Some((pending, depth)) = stack.last_mut() {
        let depth = *depth;
        let Some(n) = pending.next() else {
            stack.pop();
            continue;
        };
        let indent = "  ".repeat(depth);
        match n.kind {
            NodeKind::Folder => {
                let _ = writeln!(out, "{indent}{}/", n.name);
                stack.push((n.children.iter(), depth + 1));
            }
            NodeKind::File => {
                let _ = writeln!(out, "{indent}{}  ({})", n.name, ByteSize(n.size));
            }
        }
    }
    out
}
