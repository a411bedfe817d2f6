use crossbeam_channel::Sender;
use serde::Serialize;

use crate::model::Node;

/// Receives byte progress for each file of a transfer, synchronously from
/// within the provider call.
pub trait ProgressSink {
    fn on_progress(&mut self, sent: u64, total: u64, node: &Node);

    fn on_completed(&mut self, _node: &Node) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(u64, u64, &Node),
{
    fn on_progress(&mut self, sent: u64, total: u64, node: &Node) {
        self(sent, total, node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferMsg {
    Progress { path: String, sent: u64, total: u64 },
    Completed { path: String, bytes: u64 },
}

/// Forwards progress to another thread.
#[derive(Debug, Clone)]
pub struct ChannelProgress(pub Sender<TransferMsg>);

impl ProgressSink for ChannelProgress {
    fn on_progress(&mut self, sent: u64, total: u64, node: &Node) {
        let _ = self.0.send(TransferMsg::Progress {
            path: node.path.clone(),
            sent,
            total,
        });
    }

    fn on_completed(&mut self, node: &Node) {
        let _ = self.0.send(TransferMsg::Completed {
            path: node.path.clone(),
            bytes: node.size,
        });
    }
}

/// What a finished transfer touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub files: u64,
    pub folders: u64,
    pub bytes: u64,
}
