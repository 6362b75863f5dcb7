//! # peasant
//!
//! A persistent build queue for Rust workspaces: submit a repository,
//! commit, and build-script location, and the engine clones/fetches the
//! workspace, resolves and runs the build script, streams its output, and
//! records the outcome durably so it survives a restart.
//!
//! This crate is the wiring layer: it has no scheduling or state-machine
//! logic of its own (that lives in [`peasant_core`]) and no collaborator
//! implementations of its own (those live in [`peasant_git`], [`peasant_process`],
//! [`peasant_registry`], and [`peasant_store`]). It exists to turn a
//! [`peasant_config::Config`] into a ready-to-use [`peasant_core::Engine`].

use std::sync::Arc;

use anyhow::{Context, Result};
use peasant_config::Config;
use peasant_core::{Collaborators, Engine, EngineConfig};
use peasant_types::{BlobCache, Credentials, ProcessRunner, SourceHostClient, WorkspaceProvisioner};

/// Build a ready-to-run [`Engine`] from configuration, constructing the
/// concrete `git`, process, HTTP, and filesystem-cache collaborators the
/// way this workspace's collaborator crates implement them.
pub async fn engine_from_config(config: &Config) -> Result<Engine> {
    let credentials = match peasant_config::resolve_token() {
        Some(token) => Credentials::with_token(token),
        None => Credentials::none(),
    };

    let provisioner: Arc<dyn WorkspaceProvisioner> = Arc::new(peasant_git::GitWorkspaceProvisioner::new());
    let process_runner: Arc<dyn ProcessRunner> = Arc::new(peasant_process::TokioProcessRunner::new());
    let source_host: Arc<dyn SourceHostClient> = Arc::new(peasant_registry::HttpSourceHostClient::new(
        config.source_host_base_url.clone(),
        config.own_account.clone(),
        credentials,
    ));

    std::fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("failed to create state directory {}", config.state_dir.display()))?;
    let cache: Arc<dyn BlobCache> = Arc::new(peasant_store::FileBlobCache::new(&config.state_dir));

    let engine_config = EngineConfig {
        max_concurrency: config.max_concurrency,
        workspace_root: config.workspace_root.clone(),
    };

    Engine::start(
        engine_config,
        Collaborators {
            provisioner,
            process_runner,
            source_host,
            cache,
        },
    )
    .await
    .context("failed to start build queue engine")
}
