use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex_lite::Regex;
use uuid::Uuid;

const FALLBACK_NAME: &str = "repository";

/// A fresh directory under `base` for cloning `url` into.
///
/// The name is the repository name followed by a random v4 UUID, so two
/// calls never collide.
pub fn unique_destination(base: &Path, url: &str) -> PathBuf {
    let name = repository_name(url).unwrap_or(FALLBACK_NAME);
    base.join(format!("{}-{}", name, Uuid::new_v4()))
}

/// Last path segment of a Git URL without the `.git` suffix.
///
/// Scheme, authority (or the `host:` of scp-like URLs), query and fragment
/// are not part of the path.
pub fn repository_name(url: &str) -> Option<&str> {
    static URL: OnceLock<Regex> = OnceLock::new();
    let regex = URL.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.-]*://[^/?#]*|[^/:?#]+:)?([^?#]*)")
            .expect("url regex is valid")
    });
    let path = regex.captures(url.trim())?.get(1)?.as_str();
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    (!name.is_empty() && name != "." && name != "..").then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn names_from_common_urls() {
        assert_eq!(
            repository_name("https://github.com/github/VisualStudio.git"),
            Some("VisualStudio")
        );
        assert_eq!(
            repository_name("git@example.com:team/tools-proto.git"),
            Some("tools-proto")
        );
        assert_eq!(repository_name("https://example.com/repo/"), Some("repo"));
        assert_eq!(repository_name("/srv/git/tools"), Some("tools"));
        assert_eq!(repository_name(""), None);
    }

    #[test]
    fn destinations_are_unique_and_named() {
        let base = Path::new("/tmp");
        let first = unique_destination(base, "https://example.com/repo.git");
        let second = unique_destination(base, "https://example.com/repo.git");

        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(base));
        assert!(first
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("repo-")));
    }

    #[test]
    fn query_and_fragment_are_ignored() {
        assert_eq!(
            repository_name("https://example.com/team/repo.git?x=y"),
            Some("repo")
        );
        assert_eq!(repository_name("https://example.com/repo#main"), Some("repo"));
        assert_eq!(repository_name("file:///srv/git/tools.git"), Some("tools"));
    }

    #[test]
    fn hosts_are_not_names() {
        assert_eq!(repository_name("https://example.com/"), None);
        assert_eq!(repository_name("https://example.com"), None);
        assert_eq!(repository_name("ssh://git@example.com:22/"), None);
    }

    #[test]
    fn unnamed_urls_fall_back() {
        let destination = unique_destination(Path::new("/tmp"), "https://example.com/");
        let name = destination.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("repository-"));
    }
}
