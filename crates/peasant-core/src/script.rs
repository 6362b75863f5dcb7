//! Build-script acquisition: locate the script inside the checked-out tree
//! when it lives in the repository being built, otherwise download it by
//! its raw-content URL.

use std::path::{Path, PathBuf};

use peasant_types::{BuildError, url};

/// Acquire the build script into `workspace_dir`, returning its path on disk.
pub async fn acquire_script(
    http: &reqwest::Client,
    workspace_dir: &Path,
    repo_url: &str,
    build_script_url: &str,
    commit: &str,
) -> Result<PathBuf, BuildError> {
    if url::same_repo(build_script_url, repo_url) {
        let relative = url::local_script_path(build_script_url).ok_or_else(|| {
            BuildError::ScriptFetchFailure(format!(
                "{build_script_url} names the build's own repository but has no recognizable blob path"
            ))
        })?;
        let path = workspace_dir.join(relative);
        if !path.exists() {
            return Err(BuildError::ScriptFetchFailure(format!(
                "build script not found at {} after checkout",
                path.display()
            )));
        }
        return Ok(path);
    }

    let raw_url = url::rewrite_to_raw(build_script_url, commit);
    let filename = url::basename(&raw_url);
    let destination = workspace_dir.join(&filename);

    let response = http
        .get(&raw_url)
        .send()
        .await
        .map_err(|e| BuildError::ScriptFetchFailure(format!("failed to fetch {raw_url}: {e}")))?;

    if !response.status().is_success() {
        return Err(BuildError::ScriptFetchFailure(format!(
            "fetching {raw_url} returned status {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| BuildError::ScriptFetchFailure(format!("failed to read body of {raw_url}: {e}")))?;

    tokio::fs::write(&destination, &bytes)
        .await
        .map_err(|e| BuildError::ScriptFetchFailure(format!("failed to write {}: {e}", destination.display())))?;

    Ok(destination)
}
