use std::path::Path;

use git2::{Repository, Signature};
use tempfile::TempDir;

/// Repository with a single commit holding `file` with `content`.
pub(crate) fn source_repository(file: &str, content: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    std::fs::write(dir.path().join(file), content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(file)).unwrap();
    index.write().unwrap();
    commit_index(&repo, "initial");
    dir
}

/// Repository holding `README.md` and `submodule` registered at `vendor/lib`.
pub(crate) fn repository_with_submodule(submodule: &Path) -> TempDir {
    let dir = source_repository("README.md", "parent\n");
    let repo = Repository::open(dir.path()).unwrap();

    let mut added = repo
        .submodule(&file_url(submodule), Path::new("vendor/lib"), true)
        .unwrap();
    added.clone(None).unwrap();
    added.add_finalize().unwrap();
    commit_index(&repo, "add submodule");
    dir
}

/// `file://` URL, which makes libgit2 fetch through its transport.
pub(crate) fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn commit_index(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = Signature::now("clonekit", "clonekit@example.com").unwrap();
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap();
}
