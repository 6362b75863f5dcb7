//! The process runner collaborator: launches a child, decodes its stdout and
//! stderr as UTF-8, merges them line-by-line into a [`LineSink`] as they
//! arrive, and yields the exit code once the child terminates.
//!
//! This supersedes the whole-output-at-once, blocking capture this lineage
//! used for synchronous command execution: builds can run for a long time
//! and observers need to see output as it happens, not after the fact.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use peasant_types::{LineSink, ProcessRunner, ProcessSpec};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Resolves a command-existence check the way this lineage has always done
/// it, via the `which` crate, before attempting to spawn.
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: ProcessSpec, sink: Arc<dyn LineSink>) -> Result<i32> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to launch {}", spec.program))?;

        let stdout = child.stdout.take().context("child stdout not piped")?;
        let stderr = child.stderr.take().context("child stderr not piped")?;

        let stdout_sink = sink.clone();
        let stdout_task =
            tokio::spawn(async move { stream_lines(stdout, stdout_sink).await });
        let stderr_sink = sink.clone();
        let stderr_task =
            tokio::spawn(async move { stream_lines(stderr, stderr_sink).await });

        let status = child
            .wait()
            .await
            .context("failed to wait on child process")?;

        stdout_task.await.context("stdout reader task panicked")?;
        stderr_task.await.context("stderr reader task panicked")?;

        match status.code() {
            Some(code) => Ok(code),
            None => bail!("child process terminated by signal"),
        }
    }
}

async fn stream_lines(pipe: impl tokio::io::AsyncRead + Unpin, sink: Arc<dyn LineSink>) {
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => sink.push_line(line),
            Ok(None) => break,
            Err(_) => break,
        }
    }
}
