//! The engine: wires the id allocator, durable record store, the
//! submission bus and recovery+intake stream, the bounded operation queue,
//! the in-flight registry, and the completion bus around the build
//! executor, and exposes the query surface.

use std::path::PathBuf;
use std::sync::Arc;

use peasant_types::{
    BlobCache, BuildRecord, BuildRequest, ProcessRunner, QueryError, SourceHostClient,
    WorkspaceProvisioner,
};
use tokio::sync::{Semaphore, mpsc};

use crate::completion::CompletionBus;
use crate::executor::execute_build;
use crate::ids::IdAllocator;
use crate::registry::InFlightRegistry;

/// The concrete collaborator implementations a running engine needs.
/// Constructing these from configuration is `peasant`'s job, not the
/// core's — the core only ever sees these four trait objects.
pub struct Collaborators {
    pub provisioner: Arc<dyn WorkspaceProvisioner>,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub source_host: Arc<dyn SourceHostClient>,
    pub cache: Arc<dyn BlobCache>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_concurrency: usize,
    /// A configured fallback workspace root, consulted after the per-build
    /// override and the `PEASANT_BUILD_DIR` environment variable.
    pub workspace_root: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            workspace_root: None,
        }
    }
}

/// Shared state reachable from every in-flight executor task. Held behind
/// an `Arc` rather than cloned per-field so every task sees the same
/// registry and completion bus.
pub(crate) struct EngineContext {
    pub(crate) store: peasant_store::BuildStore,
    pub(crate) registry: InFlightRegistry,
    pub(crate) completion: CompletionBus,
    pub(crate) provisioner: Arc<dyn WorkspaceProvisioner>,
    pub(crate) process_runner: Arc<dyn ProcessRunner>,
    pub(crate) source_host: Arc<dyn SourceHostClient>,
    pub(crate) http: reqwest::Client,
    pub(crate) configured_workspace_root: Option<PathBuf>,
}

/// A submission in transit from `Enqueue` to the bounded operation queue.
/// `workspace_root_override` travels alongside the record rather than
/// inside it, since it is per-submission routing information the record
/// itself never persists.
struct Submission {
    record: BuildRecord,
    workspace_root_override: Option<PathBuf>,
}

pub struct Engine {
    ctx: Arc<EngineContext>,
    ids: IdAllocator,
    submit_tx: mpsc::UnboundedSender<Submission>,
}

impl Engine {
    /// Start the engine: seed the id allocator from durable state, replay
    /// any recovered `queued/*` records ahead of live submissions, and
    /// begin admitting work up to `config.max_concurrency` at a time.
    pub async fn start(config: EngineConfig, collaborators: Collaborators) -> anyhow::Result<Self> {
        let store = peasant_store::BuildStore::new(collaborators.cache);
        let max_id = store.max_existing_id()?;
        let ids = IdAllocator::seeded_from(max_id);

        let ctx = Arc::new(EngineContext {
            store: store.clone(),
            registry: InFlightRegistry::new(),
            completion: CompletionBus::new(),
            provisioner: collaborators.provisioner,
            process_runner: collaborators.process_runner,
            source_host: collaborators.source_host,
            http: reqwest::Client::new(),
            configured_workspace_root: config.workspace_root,
        });

        let recovered = recoverable_records(&store)?;
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));

        tokio::spawn(run_intake(ctx.clone(), recovered, submit_rx, semaphore));

        Ok(Self { ctx, ids, submit_tx })
    }

    /// Submit a build and wait for it to complete. The returned record is
    /// never an error — failure is represented by a non-zero `exit_code`.
    pub async fn enqueue(&self, request: BuildRequest) -> BuildRecord {
        let build_id = self.ids.allocate();
        let record = BuildRecord::new_queued(build_id, &request);

        if let Err(e) = self.ctx.store.put_queued(&record) {
            tracing::error!(build_id, error = %e, "failed to durably record queued build");
        }

        let receiver = self.ctx.completion.register(build_id).await;

        let submission = Submission {
            record,
            workspace_root_override: request.workspace_root_override,
        };
        // The receiver runs for the engine's lifetime; a send can only fail
        // after the engine itself has been dropped.
        let _ = self.submit_tx.send(submission);

        receiver
            .await
            .expect("completion bus fires exactly once per admitted build")
    }

    pub async fn get_output(&self, build_id: u64) -> Result<(String, Option<i32>), QueryError> {
        if let Some(snapshot) = self.ctx.registry.get(build_id).await {
            return Ok((snapshot.output, snapshot.exit_code));
        }

        match self.ctx.store.get_queued(build_id) {
            Ok(Some(_)) => return Ok((format!("Build queued, ID is {build_id}"), None)),
            Ok(None) => {}
            Err(e) => tracing::warn!(build_id, error = %e, "failed to read queued record"),
        }

        match self.ctx.store.get_result(build_id) {
            Ok(Some(record)) => Ok((record.accumulated_output, record.exit_code)),
            Ok(None) => Err(QueryError::UnknownBuild(build_id)),
            Err(e) => {
                tracing::warn!(build_id, error = %e, "failed to read result record");
                Err(QueryError::UnknownBuild(build_id))
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn in_flight_count(&self) -> usize {
        self.ctx.registry.len().await
    }
}

/// Records durably queued at startup, minus any whose `result/<id>` also
/// exists — a crash between `put_result` and `invalidate_queued` leaves
/// both; `result/<id>` is authoritative and the stale `queued/<id>` is
/// opportunistically cleaned up rather than re-run.
fn recoverable_records(store: &peasant_store::BuildStore) -> anyhow::Result<Vec<BuildRecord>> {
    let mut to_run = Vec::new();
    for record in store.list_queued()? {
        match store.get_result(record.build_id)? {
            Some(_) => {
                if let Err(e) = store.invalidate_queued(record.build_id) {
                    tracing::warn!(build_id = record.build_id, error = %e, "failed to clean up stale queued record");
                }
            }
            None => to_run.push(record),
        }
    }
    Ok(to_run)
}

async fn run_intake(
    ctx: Arc<EngineContext>,
    recovered: Vec<BuildRecord>,
    mut submit_rx: mpsc::UnboundedReceiver<Submission>,
    semaphore: Arc<Semaphore>,
) {
    for record in recovered {
        admit(&ctx, &semaphore, record, None).await;
    }
    while let Some(submission) = submit_rx.recv().await {
        admit(&ctx, &semaphore, submission.record, submission.workspace_root_override).await;
    }
}

/// Acquire a permit before spawning, so the single intake task only ever
/// holds `max_concurrency` builds outstanding, admitted strictly in the
/// order they arrive from the combined recovery+live stream.
async fn admit(
    ctx: &Arc<EngineContext>,
    semaphore: &Arc<Semaphore>,
    record: BuildRecord,
    workspace_root_override: Option<PathBuf>,
) {
    let permit = semaphore
        .clone()
        .acquire_owned()
        .await
        .expect("semaphore is never closed for the engine's lifetime");
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let _permit = permit;
        execute_build(ctx, record, workspace_root_override).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use peasant_types::{Credentials, LineSink, ProcessSpec, ProvisionError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    struct NoopProvisioner;

    #[async_trait]
    impl WorkspaceProvisioner for NoopProvisioner {
        async fn prepare(
            &self,
            dir: &std::path::Path,
            _repo_url: &str,
            _commit: &str,
            _credentials: &Credentials,
        ) -> Result<(), ProvisionError> {
            std::fs::create_dir_all(dir).map_err(|e| ProvisionError::Io(e.into()))?;
            std::fs::write(dir.join("build.sh"), "#!/bin/sh\n").map_err(|e| ProvisionError::Io(e.into()))?;
            Ok(())
        }
    }

    struct FailingProvisioner;

    #[async_trait]
    impl WorkspaceProvisioner for FailingProvisioner {
        async fn prepare(
            &self,
            _dir: &std::path::Path,
            repo_url: &str,
            commit: &str,
            _credentials: &Credentials,
        ) -> Result<(), ProvisionError> {
            Err(ProvisionError::CommitNotFound {
                repo_url: repo_url.to_string(),
                commit: commit.to_string(),
            })
        }
    }

    struct AlwaysAccessible;

    #[async_trait]
    impl SourceHostClient for AlwaysAccessible {
        async fn repo_accessible(&self, _owner: &str, _name: &str) -> anyhow::Result<bool> {
            Ok(true)
        }
        fn own_account(&self) -> &str {
            "acme"
        }
        fn credentials(&self) -> Credentials {
            Credentials::none()
        }
    }

    /// Runs no real process: writes a fixed line and returns a fixed exit
    /// code, so executor tests don't depend on any script actually existing
    /// on disk or a shell being available.
    struct ScriptedProcessRunner {
        line: &'static str,
        exit_code: i32,
    }

    #[async_trait]
    impl ProcessRunner for ScriptedProcessRunner {
        async fn run(&self, _spec: ProcessSpec, sink: Arc<dyn LineSink>) -> anyhow::Result<i32> {
            sink.push_line(self.line.to_string());
            Ok(self.exit_code)
        }
    }

    /// Blocks every invocation on a shared latch (a semaphore with zero
    /// permits) until released, so tests can observe exactly how many
    /// builds are admitted before any complete.
    struct LatchedProcessRunner {
        latch: Arc<Semaphore>,
        in_flight: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProcessRunner for LatchedProcessRunner {
        async fn run(&self, _spec: ProcessSpec, _sink: Arc<dyn LineSink>) -> anyhow::Result<i32> {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let _permit = self.latch.acquire().await.expect("latch never closed");
            Ok(0)
        }
    }

    fn request(repo: &str) -> BuildRequest {
        BuildRequest {
            repo_url: format!("https://git.example.com/acme/{repo}"),
            commit: "deadbeef".to_string(),
            build_script_url: format!("https://git.example.com/acme/{repo}/blob/master/blob/build.sh"),
            workspace_root_override: None,
        }
    }

    fn collaborators_with(
        provisioner: Arc<dyn WorkspaceProvisioner>,
        process_runner: Arc<dyn ProcessRunner>,
        cache: Arc<dyn BlobCache>,
    ) -> Collaborators {
        Collaborators {
            provisioner,
            process_runner,
            source_host: Arc::new(AlwaysAccessible),
            cache,
        }
    }

    #[tokio::test]
    async fn scenario_a_success_is_recorded_and_queryable_after_restart() {
        let td = tempdir().expect("tempdir");
        let cache: Arc<dyn BlobCache> = Arc::new(peasant_store::FileBlobCache::new(td.path()));

        let engine = Engine::start(
            EngineConfig { max_concurrency: 2, workspace_root: Some(td.path().to_path_buf()) },
            collaborators_with(
                Arc::new(NoopProvisioner),
                Arc::new(ScriptedProcessRunner { line: "build ok", exit_code: 0 }),
                cache.clone(),
            ),
        )
        .await
        .expect("start");

        let record = engine.enqueue(request("widget")).await;
        assert_eq!(record.exit_code, Some(0));
        assert_eq!(record.succeeded(), Some(true));

        // A fresh engine over the same durable cache resolves the same result.
        let fresh = Engine::start(
            EngineConfig { max_concurrency: 2, workspace_root: Some(td.path().to_path_buf()) },
            collaborators_with(
                Arc::new(NoopProvisioner),
                Arc::new(ScriptedProcessRunner { line: "build ok", exit_code: 0 }),
                cache,
            ),
        )
        .await
        .expect("restart");

        let (output, exit_code) = fresh.get_output(record.build_id).await.expect("get_output");
        assert_eq!(exit_code, Some(0));
        assert!(output.contains("build ok"));
    }

    #[tokio::test]
    async fn scenario_b_failure_is_recorded_with_diagnostic_output() {
        let td = tempdir().expect("tempdir");
        let cache: Arc<dyn BlobCache> = Arc::new(peasant_store::FileBlobCache::new(td.path()));

        let engine = Engine::start(
            EngineConfig { max_concurrency: 2, workspace_root: Some(td.path().to_path_buf()) },
            collaborators_with(
                Arc::new(NoopProvisioner),
                Arc::new(ScriptedProcessRunner { line: "Didn't work lol", exit_code: 1 }),
                cache,
            ),
        )
        .await
        .expect("start");

        let record = engine.enqueue(request("widget")).await;
        assert_eq!(record.succeeded(), Some(false));
        assert_ne!(record.exit_code, Some(0));
        assert!(record.accumulated_output.contains("Didn't work lol"));
    }

    #[tokio::test]
    async fn scenario_c_unknown_id_raises_an_error() {
        let td = tempdir().expect("tempdir");
        let cache: Arc<dyn BlobCache> = Arc::new(peasant_store::FileBlobCache::new(td.path()));

        let engine = Engine::start(
            EngineConfig::default(),
            collaborators_with(
                Arc::new(NoopProvisioner),
                Arc::new(ScriptedProcessRunner { line: "unused", exit_code: 0 }),
                cache,
            ),
        )
        .await
        .expect("start");

        let result = engine.get_output(42).await;
        assert!(matches!(result, Err(QueryError::UnknownBuild(42))));
    }

    #[tokio::test]
    async fn scenario_d_recovery_runs_queued_records_and_resumes_ids() {
        let td = tempdir().expect("tempdir");
        let cache: Arc<dyn BlobCache> = Arc::new(peasant_store::FileBlobCache::new(td.path()));
        let store = peasant_store::BuildStore::new(cache.clone());
        store.put_queued(&BuildRecord::new_queued(5, &request("five"))).expect("seed");
        store.put_queued(&BuildRecord::new_queued(7, &request("seven"))).expect("seed");

        let engine = Engine::start(
            EngineConfig { max_concurrency: 2, workspace_root: Some(td.path().to_path_buf()) },
            collaborators_with(
                Arc::new(NoopProvisioner),
                Arc::new(ScriptedProcessRunner { line: "recovered", exit_code: 0 }),
                cache,
            ),
        )
        .await
        .expect("start");

        // Allow the spawned recovery executions to finish before asserting.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let record = engine.enqueue(request("eight")).await;
        assert_eq!(record.build_id, 8);
    }

    #[tokio::test]
    async fn scenario_e_admits_at_most_max_concurrency_at_once() {
        let td = tempdir().expect("tempdir");
        let cache: Arc<dyn BlobCache> = Arc::new(peasant_store::FileBlobCache::new(td.path()));
        let latch = Arc::new(Semaphore::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let engine = Engine::start(
            EngineConfig { max_concurrency: 2, workspace_root: Some(td.path().to_path_buf()) },
            collaborators_with(
                Arc::new(NoopProvisioner),
                Arc::new(LatchedProcessRunner { latch: latch.clone(), in_flight: in_flight.clone() }),
                cache,
            ),
        )
        .await
        .expect("start");

        let engine = Arc::new(engine);
        let mut handles = Vec::new();
        for i in 0..5 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move { engine.enqueue(request(&format!("r{i}"))).await }));
        }

        // Give the intake task time to admit as many as it will before the
        // latch releases.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(engine.in_flight_count().await, 2);

        latch.add_permits(5);
        let mut completed = 0;
        for handle in handles {
            handle.await.expect("task");
            completed += 1;
        }
        assert_eq!(completed, 5);
    }

    #[tokio::test]
    async fn scenario_f_result_record_wins_over_a_stale_queued_record() {
        let td = tempdir().expect("tempdir");
        let cache: Arc<dyn BlobCache> = Arc::new(peasant_store::FileBlobCache::new(td.path()));
        let store = peasant_store::BuildStore::new(cache.clone());

        let mut completed = BuildRecord::new_queued(3, &request("three"));
        store.put_queued(&completed).expect("seed queued");
        completed.exit_code = Some(0);
        completed.accumulated_output = "already done\n".to_string();
        store.put_result(&completed).expect("seed result");

        let ran_again = Arc::new(StdMutex::new(false));
        struct FlaggingRunner(Arc<StdMutex<bool>>);
        #[async_trait]
        impl ProcessRunner for FlaggingRunner {
            async fn run(&self, _spec: ProcessSpec, _sink: Arc<dyn LineSink>) -> anyhow::Result<i32> {
                *self.0.lock().expect("lock") = true;
                Ok(0)
            }
        }

        let engine = Engine::start(
            EngineConfig { max_concurrency: 2, workspace_root: Some(td.path().to_path_buf()) },
            collaborators_with(
                Arc::new(NoopProvisioner),
                Arc::new(FlaggingRunner(ran_again.clone())),
                cache.clone(),
            ),
        )
        .await
        .expect("start");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(!*ran_again.lock().expect("lock"), "stale queued record must not re-run");
        let (output, exit_code) = engine.get_output(3).await.expect("get_output");
        assert_eq!(exit_code, Some(0));
        assert_eq!(output, "already done\n");
        assert!(
            peasant_store::BuildStore::new(cache)
                .get_queued(3)
                .expect("read")
                .is_none(),
            "the stale queued/3 entry should have been invalidated"
        );
    }

    #[tokio::test]
    async fn commit_not_found_is_recorded_as_a_failure_not_a_panic() {
        let td = tempdir().expect("tempdir");
        let cache: Arc<dyn BlobCache> = Arc::new(peasant_store::FileBlobCache::new(td.path()));

        let engine = Engine::start(
            EngineConfig { max_concurrency: 1, workspace_root: Some(td.path().to_path_buf()) },
            collaborators_with(
                Arc::new(FailingProvisioner),
                Arc::new(ScriptedProcessRunner { line: "unreachable", exit_code: 0 }),
                cache,
            ),
        )
        .await
        .expect("start");

        let record = engine.enqueue(request("widget")).await;
        assert_eq!(record.exit_code, Some(-1));
        assert!(record.accumulated_output.contains("not found"));
    }
}
