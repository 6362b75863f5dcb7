//! Pure textual transforms over source-hosting URLs: extracting `(owner, name)`,
//! rewriting a `blob` URL to its `raw` form, and deriving a script's path
//! when it lives in the same repository being built.
//!
//! These are plain string operations on purpose, not a URL-parsing library —
//! the inputs are already validated source-hosting URLs by the time these
//! run, and the transforms are textual rewrites, not structural ones.

/// Extract `(owner, name)` from a source-hosting URL of the shape
/// `https://host/owner/name/...`. Returns `None` if there are fewer than
/// two path segments after the host.
pub fn nwo(url: &str) -> Option<(String, String)> {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let mut segments = without_scheme.splitn(2, '/').nth(1)?.split('/');
    let owner = segments.next()?;
    let name = segments.next()?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}

/// Whether two URLs name the same `(owner, name)` repository.
pub fn same_repo(a: &str, b: &str) -> bool {
    matches!((nwo(a), nwo(b)), (Some(x), Some(y)) if x == y)
}

/// Rewrite a `.../blob/<ref>/<path>` URL to its raw-content form
/// `.../raw/<commit>/<path>`, by textual replacement of the `/blob/` and
/// `/master/` segments.
pub fn rewrite_to_raw(url: &str, commit: &str) -> String {
    url.replace("/blob/", "/raw/")
        .replace("/master/", &format!("/{commit}/"))
}

/// When the build script lives in the repository being built, derive its
/// path inside the checked-out tree by stripping the `.../master/blob/`
/// prefix and translating `/` into the platform path separator.
pub fn local_script_path(url: &str) -> Option<String> {
    const MARKER: &str = "master/blob/";
    let idx = url.find(MARKER)?;
    let rest = &url[idx + MARKER.len()..];
    if rest.is_empty() {
        return None;
    }
    Some(
        rest.split('/')
            .collect::<Vec<_>>()
            .join(std::path::MAIN_SEPARATOR_STR),
    )
}

/// The final path segment of a URL, used as the filename when downloading a
/// build script.
pub fn basename(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nwo_extracts_owner_and_name() {
        assert_eq!(
            nwo("https://git.example.com/acme/widget/blob/master/build.sh"),
            Some(("acme".to_string(), "widget".to_string()))
        );
    }

    #[test]
    fn nwo_none_without_two_segments() {
        assert_eq!(nwo("https://git.example.com/acme"), None);
        assert_eq!(nwo("https://git.example.com/"), None);
    }

    #[test]
    fn same_repo_compares_owner_and_name_only() {
        assert!(same_repo(
            "https://git.example.com/acme/widget",
            "https://git.example.com/acme/widget/blob/master/build.sh"
        ));
        assert!(!same_repo(
            "https://git.example.com/acme/widget",
            "https://git.example.com/other/widget"
        ));
    }

    #[test]
    fn rewrite_to_raw_replaces_both_segments() {
        let rewritten = rewrite_to_raw(
            "https://git.example.com/acme/other/blob/master/scripts/build.sh",
            "abc123",
        );
        assert_eq!(
            rewritten,
            "https://git.example.com/acme/other/raw/abc123/scripts/build.sh"
        );
    }

    #[test]
    fn local_script_path_strips_prefix_and_translates_separators() {
        let path = local_script_path(
            "https://git.example.com/acme/widget/blob/master/blob/scripts/build.sh",
        )
        .expect("path");
        assert_eq!(
            path,
            ["scripts", "build.sh"].join(std::path::MAIN_SEPARATOR_STR)
        );
    }

    #[test]
    fn local_script_path_none_without_marker() {
        assert_eq!(
            local_script_path("https://git.example.com/acme/widget/raw/abc/build.sh"),
            None
        );
    }

    #[test]
    fn basename_takes_last_segment() {
        assert_eq!(
            basename("https://git.example.com/acme/widget/raw/abc/scripts/build.sh"),
            "build.sh"
        );
    }
}
