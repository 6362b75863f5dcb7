//! Domain types and collaborator traits shared across the peasant workspace.
//!
//! This crate defines the data the build queue persists and passes around
//! ([`BuildRequest`], [`BuildRecord`]), the error vocabulary the executor
//! records ([`BuildError`], [`QueryError`]), and the small trait seams the
//! core engine uses to reach outside itself: [`BlobCache`], [`WorkspaceProvisioner`],
//! [`ProcessRunner`], and [`SourceHostClient`]. Nothing in here depends on
//! `peasant-core`, so the engine and its collaborators can be implemented
//! and tested independently of one another.

pub mod credentials;
pub mod errors;
pub mod sink;
pub mod url;

pub use credentials::Credentials;
pub use errors::{BuildError, ProvisionError, QueryError};
pub use sink::LineSink;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request to run a build, as submitted by a caller of `Enqueue`.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub repo_url: String,
    pub commit: String,
    pub build_script_url: String,
    pub workspace_root_override: Option<PathBuf>,
}

/// The central, persisted entity: one attempt to build one commit.
///
/// `exit_code` discriminates the two durable lifecycle states: absent means
/// the record lives under `queued/<id>`, present means it has moved to
/// `result/<id>`. `workspace_root_override` is intentionally not part of
/// this struct — it is per-submission routing information, not part of the
/// record's durable identity, and is consumed once at intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub build_id: u64,
    pub repo_url: String,
    pub commit_sha1: String,
    pub build_script_url: String,
    #[serde(default)]
    pub accumulated_output: String,
    pub exit_code: Option<i32>,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BuildRecord {
    /// Create the record as it looks at intake: no output yet, no exit code.
    pub fn new_queued(build_id: u64, request: &BuildRequest) -> Self {
        Self {
            build_id,
            repo_url: request.repo_url.clone(),
            commit_sha1: request.commit.clone(),
            build_script_url: request.build_script_url.clone(),
            accumulated_output: String::new(),
            exit_code: None,
            queued_at: Utc::now(),
            completed_at: None,
        }
    }

    /// `true` once `exit_code` is present. While queued or running this is `false`.
    pub fn is_complete(&self) -> bool {
        self.exit_code.is_some()
    }

    /// `Some(true)` iff the process exited with code 0. `None` while incomplete.
    pub fn succeeded(&self) -> Option<bool> {
        self.exit_code.map(|code| code == 0)
    }
}

/// A child-process invocation the executor wants run, before any collaborator
/// has had a chance to launch it.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// A durable key→object store. `C2` is a typed facade over this trait; the
/// trait itself knows nothing about builds, queues, or records — it is the
/// same shape as a generic blob-storage backend.
pub trait BlobCache: Send + Sync {
    fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn write(&self, key: &str, data: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;
    fn exists(&self, key: &str) -> anyhow::Result<bool>;
    /// All keys currently stored under `prefix`, in no particular order.
    fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
}

/// "Prepare directory D to hold the tree at commit C of repo R, using
/// credentials K." The one method the core needs from version control.
#[async_trait::async_trait]
pub trait WorkspaceProvisioner: Send + Sync {
    async fn prepare(
        &self,
        dir: &std::path::Path,
        repo_url: &str,
        commit: &str,
        credentials: &Credentials,
    ) -> Result<(), ProvisionError>;
}

/// Launches a child process and streams its merged, line-oriented output
/// into a [`LineSink`] as it runs, yielding the exit code on completion.
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        spec: ProcessSpec,
        sink: std::sync::Arc<dyn LineSink>,
    ) -> anyhow::Result<i32>;
}

/// "Given owner/name, does this repo exist and am I authorized?" and "what
/// credentials should I use to clone it?"
#[async_trait::async_trait]
pub trait SourceHostClient: Send + Sync {
    async fn repo_accessible(&self, owner: &str, name: &str) -> anyhow::Result<bool>;
    /// The account this engine instance authenticates as, used for the
    /// same-owner shortcut in URL validation.
    fn own_account(&self) -> &str;
    fn credentials(&self) -> Credentials;
}
