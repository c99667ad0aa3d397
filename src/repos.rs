use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn is_git_repo(path: &Path) -> bool {
    path.join(".git").is_dir()
}

/// Finds git working copies under `root`, skipping hidden directories.
/// Backs the repo picker that replaces a "browse" dialog.
pub fn find_repos(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut repos = Vec::new();

    for entry in WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| {
            !e.file_name()
                .to_str()
                .map(|s| s.starts_with('.'))
                .unwrap_or(false)
                || e.depth() == 0
        })
        .filter_map(|e| e.ok())
    {
        let path = entry.path().to_path_buf();
        if path.is_dir() && is_git_repo(&path) {
            repos.push(path);
        }
    }

    repos.sort();
    repos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_repos_but_not_plain_dirs() {
        let root = tempfile::tempdir().unwrap();
        let repo = root.path().join("project");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        std::fs::create_dir_all(root.path().join("not-a-repo")).unwrap();

        let found = find_repos(root.path(), 3);
        assert_eq!(found, vec![repo]);
    }

    #[test]
    fn skips_hidden_directories() {
        let root = tempfile::tempdir().unwrap();
        let hidden = root.path().join(".cache").join("project");
        std::fs::create_dir_all(hidden.join(".git")).unwrap();

        assert!(find_repos(root.path(), 4).is_empty());
    }
}
