use crate::error::{HoursError, Result};
use crate::model::{CommitEvent, TimeWindow};
use crate::util::local_date;
use chrono::{DateTime, Utc};
use gix::{ObjectId, Repository};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Opens the repository rooted exactly at `path` (no upward discovery).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = gix::open(path.as_ref())?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Commits reachable from HEAD inside `window` whose author name or e-mail
    /// contains `author` (case-insensitive), oldest first.
    pub fn collect_events(
        &self,
        window: &TimeWindow,
        author: &str,
        include_merges: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitEvent>> {
        let mut head = self.repo.head()?;
        if head.is_unborn() {
            debug!(path = %self.path.display(), "unborn HEAD, no commits");
            return Ok(Vec::new());
        }
        let head_commit = head.peel_to_commit_in_place()?;

        let needle = author.to_lowercase();
        let mut events = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::from([head_commit.id]);

        while let Some(commit_id) = stack.pop_back() {
            if cancel.is_cancelled() {
                return Err(HoursError::Cancelled);
            }
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = self.repo.find_commit(commit_id)?;
            let committed = self.instant(commit.time()?.seconds)?;

            // History committed before the window is not walked any further.
            if committed < window.start {
                continue;
            }

            let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();
            let is_merge = parents.len() > 1;
            for pid in parents {
                stack.push_back(pid);
            }
            if is_merge && !include_merges {
                continue;
            }

            // Rebases and amends rewrite the committer time, so work is dated
            // by when it was authored.
            let signature = commit.author()?;
            let timestamp = self.instant(signature.seconds())?;
            if !window.contains(&timestamp) {
                continue;
            }

            let name = signature.name.to_string();
            let email = signature.email.to_string();
            if !name.to_lowercase().contains(&needle) && !email.to_lowercase().contains(&needle) {
                continue;
            }

            events.push(CommitEvent {
                timestamp,
                author: name,
                message: commit.message()?.title.to_string(),
                date: local_date(&timestamp),
            });
        }

        events.sort_by_key(|event| event.timestamp);
        debug!(path = %self.path.display(), commits = events.len(), "collected commits");
        Ok(events)
    }

    fn instant(&self, seconds: i64) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp(seconds, 0).ok_or_else(|| HoursError::CommitTime {
            path: self.path.clone(),
            seconds,
        })
    }
}
