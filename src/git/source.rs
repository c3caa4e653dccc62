use crate::error::{HoursError, Result};
use crate::git::GitRepo;
use crate::model::{CommitEvent, TimeWindow};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Supplies commit events and the filesystem predicates used for discovery.
///
/// Calls are blocking; the aggregator runs them on the blocking pool.
pub trait CommitSource: Send + Sync {
    fn is_repository(&self, path: &Path) -> bool;

    fn list_subdirectories(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Names the options that shape what `fetch_commits` returns, so cached
    /// results from differently configured sources are never mixed.
    fn fetch_profile(&self) -> String {
        String::new()
    }

    /// Commits of `author` in `window`, oldest first. A path that is not a
    /// repository, or has no matching commits, yields an empty list.
    fn fetch_commits(
        &self,
        repository: &Path,
        window: &TimeWindow,
        author: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitEvent>>;
}

/// A repository found under the scan root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RepositoryRef {
    pub name: String,
    pub path: PathBuf,
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// The root itself if it is a repository, plus every non-hidden immediate
/// subdirectory that is one. Sorted by name.
pub fn discover_repositories<S: CommitSource + ?Sized>(
    source: &S,
    root: &Path,
) -> Result<Vec<RepositoryRef>> {
    let mut found = Vec::new();
    if source.is_repository(root) {
        found.push(RepositoryRef {
            name: dir_name(root),
            path: root.to_path_buf(),
        });
    }

    for dir in source.list_subdirectories(root)? {
        let name = dir_name(&dir);
        if name.starts_with('.') || !source.is_repository(&dir) {
            continue;
        }
        let name = if found.iter().any(|repo| repo.name == name) {
            dir.display().to_string()
        } else {
            name
        };
        found.push(RepositoryRef { name, path: dir });
    }

    found.sort();
    Ok(found)
}

/// `CommitSource` backed by on-disk git repositories.
#[derive(Debug, Clone)]
pub struct GitSource {
    include_merges: bool,
}

impl GitSource {
    pub fn new(include_merges: bool) -> Self {
        Self { include_merges }
    }
}

impl Default for GitSource {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CommitSource for GitSource {
    fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn list_subdirectories(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let unreadable = |source: std::io::Error| HoursError::DirectoryUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let mut dirs = Vec::new();
        for entry in fs::read_dir(path).map_err(unreadable)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            match entry.file_type() {
                Ok(kind) if kind.is_dir() => dirs.push(entry.path()),
                Ok(_) => {}
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping entry"),
            }
        }
        Ok(dirs)
    }

    fn fetch_profile(&self) -> String {
        if self.include_merges {
            "merges".to_string()
        } else {
            "no-merges".to_string()
        }
    }

    fn fetch_commits(
        &self,
        repository: &Path,
        window: &TimeWindow,
        author: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitEvent>> {
        if !self.is_repository(repository) {
            return Ok(Vec::new());
        }
        let repo = GitRepo::open(repository)?;
        repo.collect_events(window, author, self.include_merges, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn discovers_root_and_visible_children_one_level_deep() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("api/.git")).unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join(".hidden/.git")).unwrap();
        fs::create_dir_all(root.join("group/nested/.git")).unwrap();
        fs::write(root.join("notes.txt"), "not a dir").unwrap();

        let repos = discover_repositories(&GitSource::default(), root).unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();

        let root_name = root.file_name().unwrap().to_string_lossy().to_string();
        let mut expected = vec!["api".to_string(), root_name];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn unreadable_root_is_reported() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");
        let err = discover_repositories(&GitSource::default(), &missing).unwrap_err();
        assert!(matches!(err, HoursError::DirectoryUnreadable { .. }));
    }

    #[test]
    fn non_repository_fetch_is_empty() {
        let dir = tempdir().unwrap();
        let window = crate::model::TimeWindow::day(crate::util::today()).unwrap();
        let events = GitSource::default()
            .fetch_commits(dir.path(), &window, "me", &CancellationToken::new())
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn merge_setting_changes_the_fetch_profile() {
        assert_ne!(GitSource::new(true).fetch_profile(), GitSource::new(false).fetch_profile());
    }
}
