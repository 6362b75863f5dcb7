//! The completion bus: one `oneshot` channel per build id, registered
//! at admission and fired once in the recording step. `Enqueue`'s future is
//! just the receiving half of that channel.

use std::collections::HashMap;

use peasant_types::BuildRecord;
use tokio::sync::{Mutex, oneshot};

#[derive(Default)]
pub struct CompletionBus {
    waiters: Mutex<HashMap<u64, oneshot::Sender<BuildRecord>>>,
}

impl CompletionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a build's completion, returning the receiving
    /// half that `Enqueue` hands back to its caller.
    pub async fn register(&self, build_id: u64) -> oneshot::Receiver<BuildRecord> {
        let (sender, receiver) = oneshot::channel();
        self.waiters.lock().await.insert(build_id, sender);
        receiver
    }

    /// Fire the completion for a build. A missing or already-fired waiter
    /// is not an error — nothing is currently listening.
    pub async fn complete(&self, record: BuildRecord) {
        if let Some(sender) = self.waiters.lock().await.remove(&record.build_id) {
            let _ = sender.send(record);
        }
    }
}
