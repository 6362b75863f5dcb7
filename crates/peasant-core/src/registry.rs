//! The in-flight registry: maps a build id to its live handle for as
//! long as the build is admitted and running.

use std::collections::HashMap;
use std::sync::Arc;

use peasant_types::BuildRecord;
use tokio::sync::Mutex;

use crate::sink::OutputSink;

/// The in-memory companion to a `BuildRecord` that exists only from
/// admission to completion.
pub struct LiveBuild {
    pub record: BuildRecord,
    pub output_sink: Arc<OutputSink>,
}

/// A snapshot of a live build's state, as returned to query callers.
pub struct LiveSnapshot {
    pub output: String,
    pub exit_code: Option<i32>,
}

#[derive(Default)]
pub struct InFlightRegistry {
    // Holders perform only map mutations under this lock, never I/O, per
    // the concurrency model's shared-resource policy.
    builds: Mutex<HashMap<u64, Arc<LiveBuild>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, build_id: u64, live: Arc<LiveBuild>) {
        self.builds.lock().await.insert(build_id, live);
    }

    pub async fn remove(&self, build_id: u64) -> Option<Arc<LiveBuild>> {
        self.builds.lock().await.remove(&build_id)
    }

    pub async fn get(&self, build_id: u64) -> Option<LiveSnapshot> {
        let builds = self.builds.lock().await;
        builds.get(&build_id).map(|live| LiveSnapshot {
            output: live.output_sink.current(),
            // A record in the registry always has `exit_code == None` in
            // practice; read it from the record anyway rather than
            // hardcoding that assumption.
            exit_code: live.record.exit_code,
        })
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.builds.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peasant_types::BuildRequest;

    fn record(id: u64) -> BuildRecord {
        BuildRecord::new_queued(
            id,
            &BuildRequest {
                repo_url: "https://git.example.com/acme/widget".to_string(),
                commit: "deadbeef".to_string(),
                build_script_url: "https://git.example.com/acme/widget/blob/master/build.sh"
                    .to_string(),
                workspace_root_override: None,
            },
        )
    }

    #[tokio::test]
    async fn insert_then_get_returns_live_snapshot() {
        let registry = InFlightRegistry::new();
        let sink = Arc::new(OutputSink::new());
        sink.current();
        let live = Arc::new(LiveBuild {
            record: record(1),
            output_sink: sink.clone(),
        });

        registry.insert(1, live).await;
        let snapshot = registry.get(1).await.expect("present");
        assert_eq!(snapshot.exit_code, None);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let registry = InFlightRegistry::new();
        assert!(registry.get(99).await.is_none());
    }

    #[tokio::test]
    async fn remove_takes_build_out_of_registry() {
        let registry = InFlightRegistry::new();
        let live = Arc::new(LiveBuild {
            record: record(2),
            output_sink: Arc::new(OutputSink::new()),
        });
        registry.insert(2, live).await;

        assert!(registry.remove(2).await.is_some());
        assert!(registry.get(2).await.is_none());
    }
}
