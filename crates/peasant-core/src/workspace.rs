//! Workspace directory selection: `override > PEASANT_BUILD_DIR > OS temp`,
//! with the directory itself named `Build_<hex sha1 of repo_url>`.

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

pub const BUILD_DIR_ENV_VAR: &str = "PEASANT_BUILD_DIR";

/// Resolve the directory a build's workspace should live in.
///
/// `override_dir` is the per-build override from the request, `env_dir` is
/// the resolved `PEASANT_BUILD_DIR` value (or a configured fallback), and
/// `fallback_root` is used when neither is set (normally `std::env::temp_dir()`).
pub fn workspace_dir(
    repo_url: &str,
    override_dir: Option<&Path>,
    env_dir: Option<&Path>,
    fallback_root: &Path,
) -> PathBuf {
    let root = override_dir.or(env_dir).unwrap_or(fallback_root);
    root.join(build_dir_name(repo_url))
}

fn build_dir_name(repo_url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(repo_url.as_bytes());
    format!("Build_{}", hex::encode(hasher.finalize()))
}
