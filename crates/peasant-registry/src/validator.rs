//! The build-URL validator: a policy gate on `build_script_url`,
//! intentionally permissive per the design notes — "any accessible repo" is
//! accepted, not just the one being built.

use peasant_types::{BuildError, SourceHostClient};

/// Validate `build_script_url` before the executor downloads or locates it.
///
/// An unparseable URL is always rejected. Accepts immediately when `owner`
/// is the caller's own account. Otherwise defers to the source-hosting
/// client's existence/accessibility check.
pub async fn validate_build_url(
    client: &dyn SourceHostClient,
    build_script_url: &str,
) -> Result<(), BuildError> {
    let Some((owner, name)) = peasant_types::url::nwo(build_script_url) else {
        return Err(BuildError::BuildUrlForbidden(format!(
            "{build_script_url} is not a recognizable source-hosting url"
        )));
    };

    if owner == client.own_account() {
        return Ok(());
    }

    match client.repo_accessible(&owner, &name).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(BuildError::BuildUrlForbidden(format!(
            "{owner}/{name} is not accessible"
        ))),
        Err(e) => Err(BuildError::BuildUrlForbidden(format!(
            "could not verify {owner}/{name}: {e}"
        ))),
    }
}
