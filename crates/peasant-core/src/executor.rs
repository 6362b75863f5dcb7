//! The build executor: the per-build state machine taking a queued
//! record from `Prepared` through `Workspace`, `ScriptFetched`, `Running`,
//! to `Recorded`. Any failure short-circuits straight to `Recorded` with a
//! non-zero exit code and a diagnostic line in the output sink.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use peasant_types::{BuildError, BuildRecord, LineSink, ProcessSpec, ProvisionError};

use crate::engine::EngineContext;
use crate::registry::LiveBuild;
use crate::script;
use crate::sink::OutputSink;
use crate::workspace::{self, BUILD_DIR_ENV_VAR};

#[tracing::instrument(skip(ctx, record), fields(build_id = record.build_id, repo_url = %record.repo_url, commit_sha1 = %record.commit_sha1))]
pub async fn execute_build(
    ctx: Arc<EngineContext>,
    mut record: BuildRecord,
    workspace_root_override: Option<std::path::PathBuf>,
) {
    let sink = Arc::new(OutputSink::new());
    ctx.registry
        .insert(
            record.build_id,
            Arc::new(LiveBuild {
                record: record.clone(),
                output_sink: sink.clone(),
            }),
        )
        .await;

    let outcome = run_to_completion(&ctx, &record, workspace_root_override, &sink).await;

    let (exit_code, diagnostic) = match outcome {
        Ok(code) => (code, None),
        Err(err) => (err.exit_code(), Some(err.to_string())),
    };

    finish(&ctx, &mut record, &sink, exit_code, diagnostic).await;
}

async fn run_to_completion(
    ctx: &EngineContext,
    record: &BuildRecord,
    workspace_root_override: Option<std::path::PathBuf>,
    sink: &Arc<OutputSink>,
) -> Result<i32, BuildError> {
    tracing::info!(state = "Workspace");
    let env_dir = std::env::var(BUILD_DIR_ENV_VAR).ok().map(std::path::PathBuf::from);
    let os_temp = std::env::temp_dir();
    let workspace_dir = workspace::workspace_dir(
        &record.repo_url,
        workspace_root_override.as_deref(),
        env_dir.as_deref().or(ctx.configured_workspace_root.as_deref()),
        &os_temp,
    );

    let credentials = ctx.source_host.credentials();
    ctx.provisioner
        .prepare(&workspace_dir, &record.repo_url, &record.commit_sha1, &credentials)
        .await
        .map_err(map_provision_error)?;

    tracing::info!(state = "ScriptFetched");
    peasant_registry::validate_build_url(ctx.source_host.as_ref(), &record.build_script_url).await?;
    let script_path = script::acquire_script(
        &ctx.http,
        &workspace_dir,
        &record.repo_url,
        &record.build_script_url,
        &record.commit_sha1,
    )
    .await?;

    tracing::info!(state = "Running");
    let spec = build_process_spec(&script_path, &workspace_dir);
    let code = ctx
        .process_runner
        .run(spec, sink.clone() as Arc<dyn LineSink>)
        .await
        .map_err(|e| BuildError::ProcessLaunchFailure(e.to_string()))?;

    if code != 0 {
        return Err(BuildError::BuildNonZeroExit(code));
    }
    Ok(code)
}

async fn finish(
    ctx: &EngineContext,
    record: &mut BuildRecord,
    sink: &Arc<OutputSink>,
    exit_code: i32,
    diagnostic: Option<String>,
) {
    if let Some(text) = diagnostic {
        sink.push_line(text);
    }
    record.accumulated_output = sink.current();
    record.exit_code = Some(exit_code);
    record.completed_at = Some(Utc::now());

    tracing::info!(state = "Recorded", exit_code);

    if let Err(e) = ctx.store.put_result(record) {
        tracing::error!(build_id = record.build_id, error = %e, "failed to persist build result");
    }
    if let Err(e) = ctx.store.invalidate_queued(record.build_id) {
        tracing::warn!(build_id = record.build_id, error = %e, "failed to invalidate queued record");
    }
    ctx.registry.remove(record.build_id).await;
    ctx.completion.complete(record.clone()).await;
}

fn map_provision_error(err: ProvisionError) -> BuildError {
    match err {
        ProvisionError::CommitNotFound { repo_url, commit } => {
            BuildError::CommitNotFound { repo_url, commit }
        }
        ProvisionError::Io(e) => BuildError::WorkspaceFailure(e.to_string()),
    }
}

fn build_process_spec(script_path: &Path, cwd: &Path) -> ProcessSpec {
    let path_str = script_path.to_string_lossy().to_string();
    match script_path.extension().and_then(|e| e.to_str()) {
        Some("cmd") => ProcessSpec {
            program: "cmd".to_string(),
            args: vec!["/C".to_string(), path_str],
            cwd: cwd.to_path_buf(),
        },
        Some("ps1") => ProcessSpec {
            program: "powershell".to_string(),
            args: vec![
                "-ExecutionPolicy".to_string(),
                "Unrestricted".to_string(),
                "-NonInteractive".to_string(),
                "-NoProfile".to_string(),
                "-Command".to_string(),
                path_str,
            ],
            cwd: cwd.to_path_buf(),
        },
        _ => ProcessSpec {
            program: path_str,
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
        },
    }
}
