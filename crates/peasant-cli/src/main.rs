mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use peasant_config::Config;

use progress::BuildSpinner;

#[derive(Parser, Debug)]
#[command(name = "peasant", version)]
#[command(about = "A persistent build queue: submit a repo/commit/script, watch it build, and recover its result after a crash")]
struct Cli {
    /// Directory to discover `.peasant.toml` from (walks up, like `git`).
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Max concurrent builds. Overrides the config file.
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Where the durable blob cache lives. Overrides the config file.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Default workspace root for cloned repositories. Overrides the config file.
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// The account this CLI authenticates as, for the same-owner build-script shortcut.
    #[arg(long)]
    own_account: Option<String>,

    /// Base URL of the source-hosting API.
    #[arg(long)]
    source_host_base_url: Option<String>,

    /// Emit debug-level logs.
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a build and wait for it to complete.
    Enqueue {
        /// Repository URL to build.
        #[arg(long)]
        repo: String,
        /// Commit (hex sha1) to hard-reset the workspace to.
        #[arg(long)]
        commit: String,
        /// Build-script URL (a `.../blob/<ref>/<path>` url, same-repo or not).
        #[arg(long)]
        script: String,
        /// Per-build workspace directory override.
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
    /// Look up a build's output and status by id.
    Output {
        /// The build id returned by `enqueue`.
        build_id: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = peasant_config::init_tracing(cli.verbose) {
        eprintln!("failed to initialize logging: {e:#}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = resolve_config(&cli)?;
    let engine = peasant::engine_from_config(&config).await?;

    match cli.cmd {
        Commands::Enqueue { repo, commit, script, workspace } => {
            let request = peasant_types::BuildRequest {
                repo_url: repo,
                commit,
                build_script_url: script,
                workspace_root_override: workspace,
            };

            // The spinner has to start before `enqueue` is awaited, not
            // after — `enqueue`'s future only resolves once the build has
            // already finished, so starting it afterward would leave
            // nothing for the spinner to show.
            let spinner = BuildSpinner::start_pending();
            let record = engine.enqueue(request).await;
            let succeeded = record.succeeded().unwrap_or(false);
            spinner.finish(record.build_id, succeeded);

            print_record(&record);
            Ok(exit_code_for(record.exit_code))
        }
        Commands::Output { build_id } => match engine.get_output(build_id).await {
            Ok((output, exit_code)) => {
                println!("{output}");
                Ok(exit_code_for(exit_code))
            }
            Err(e) => {
                eprintln!("error: {e}");
                Ok(ExitCode::FAILURE)
            }
        },
    }
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let base_dir = peasant_config::find_config(&cli.config_dir)
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| cli.config_dir.clone());

    let mut config = peasant_config::load_config(&base_dir)
        .with_context(|| format!("failed to load config from {}", base_dir.display()))?;

    if let Some(v) = cli.max_concurrency {
        config.max_concurrency = v;
    }
    if let Some(v) = &cli.state_dir {
        config.state_dir = v.clone();
    }
    if cli.workspace_root.is_some() {
        config.workspace_root = cli.workspace_root.clone();
    }
    if let Some(v) = &cli.own_account {
        config.own_account = v.clone();
    }
    if let Some(v) = &cli.source_host_base_url {
        config.source_host_base_url = v.clone();
    }

    Ok(config)
}

fn print_record(record: &peasant_types::BuildRecord) {
    println!("build_id: {}", record.build_id);
    println!("repo_url: {}", record.repo_url);
    println!("commit: {}", record.commit_sha1);
    println!("exit_code: {}", record.exit_code.map_or("none".to_string(), |c| c.to_string()));
    println!("succeeded: {}", record.succeeded().map_or("unknown".to_string(), |s| s.to_string()));
    println!();
    print!("{}", record.accumulated_output);
}

/// The process's own exit code mirrors the build's, clamped to a byte —
/// `ExitCode` has no way to carry an arbitrary `i32`, and a build recorded
/// with no exit code at all (shouldn't happen once `enqueue` returns) is
/// treated as failure rather than panicking the CLI.
fn exit_code_for(exit_code: Option<i32>) -> ExitCode {
    match exit_code {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from((code.rem_euclid(256) as u8).max(1)),
        None => ExitCode::FAILURE,
    }
}
