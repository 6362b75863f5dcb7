//! The error kinds observable to the core, per the error handling design.
//!
//! Every variant of [`BuildError`] other than an in-progress state is
//! terminal: the executor's recording step turns it into a `result/<id>`
//! record rather than propagating it. [`QueryError`] is the one exception —
//! it is raised directly to `GetOutput` callers.

use thiserror::Error;

/// Errors the build executor can record against a build. Each carries enough
/// context to become a useful diagnostic line in the build's output sink.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build script url rejected: {0}")]
    BuildUrlForbidden(String),

    #[error("commit {commit} not found in {repo_url}")]
    CommitNotFound { repo_url: String, commit: String },

    #[error("workspace preparation failed: {0}")]
    WorkspaceFailure(String),

    #[error("failed to fetch build script: {0}")]
    ScriptFetchFailure(String),

    #[error("failed to launch build process: {0}")]
    ProcessLaunchFailure(String),

    #[error("build exited with code {0}")]
    BuildNonZeroExit(i32),
}

impl BuildError {
    /// The `exit_code` the recording step should persist for this error.
    /// Every kind except a faithfully-reported non-zero exit uses the `-1`
    /// sentinel for "the process never produced its own exit code".
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::BuildNonZeroExit(code) => *code,
            _ => -1,
        }
    }
}

/// Errors raised directly to a caller of the query surface.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown build id {0}")]
    UnknownBuild(u64),
}

/// Errors from workspace preparation, distinguished so the executor can
/// tell an unresolvable commit apart from an I/O failure in cloning/cleaning.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("commit {commit} not found in {repo_url}")]
    CommitNotFound { repo_url: String, commit: String },

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}
