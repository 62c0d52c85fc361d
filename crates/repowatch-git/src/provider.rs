use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use git2::{Commit, ErrorCode, Repository, RepositoryInitOptions, Sort};
use thiserror::Error;
use tracing::debug;

use repowatch_core::{
    CommitRecord, HistoryError, HistoryProvider, ProviderFactory, RepositoryConfig,
};

const ORIGIN: &str = "origin";
const FETCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";
const SHORT_ID_LEN: usize = 7;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
}

/// One repository's local clone. `git2::Repository` is not `Sync`, so
/// the handle lives behind a mutex; callers run on blocking threads and
/// hold it only for the duration of one operation.
pub struct GitHistory {
    path: PathBuf,
    repo: Mutex<Repository>,
}

impl GitHistory {
    /// Open the clone at `path`, creating it (no checkout, like
    /// `git clone --no-checkout`) when absent, and point `origin` at
    /// `url`. No fetch happens here; history is empty until the first
    /// [`refresh`](HistoryProvider::refresh).
    pub fn open(path: &Path, url: &str) -> Result<Self, GitError> {
        let repo = match Repository::open(path) {
            Ok(repo) => repo,
            Err(_) => {
                debug!(path = %path.display(), "initializing local clone");
                let mut opts = RepositoryInitOptions::new();
                opts.mkpath(true).no_reinit(false);
                Repository::init_opts(path, &opts)?
            }
        };
        match repo.find_remote(ORIGIN) {
            Ok(remote) => {
                if remote.url() != Some(url) {
                    repo.remote_set_url(ORIGIN, url)?;
                }
            }
            Err(_) => {
                repo.remote(ORIGIN, url)?;
            }
        }
        Ok(GitHistory {
            path: path.to_path_buf(),
            repo: Mutex::new(repo),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn record(commit: &Commit<'_>) -> CommitRecord {
    let id = commit.id().to_string();
    let author = commit.author();
    CommitRecord {
        short_id: id[..SHORT_ID_LEN].to_string(),
        id,
        author_name: author.name().unwrap_or("").to_string(),
        author_email: author.email().unwrap_or("").to_string(),
        summary: commit.summary().unwrap_or("").to_string(),
        time: DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    }
}

/// Resolve the branch tip, preferring the remote-tracking ref so reads
/// reflect the fetched remote state.
fn branch_tip<'r>(repo: &'r Repository, branch: &str) -> Result<Commit<'r>, HistoryError> {
    let refnames = [
        format!("refs/remotes/{ORIGIN}/{branch}"),
        format!("refs/heads/{branch}"),
    ];
    for refname in &refnames {
        match repo.revparse_single(refname) {
            Ok(obj) => return obj.peel_to_commit().map_err(HistoryError::access),
            Err(e) if e.code() == ErrorCode::NotFound => continue,
            Err(e) => return Err(HistoryError::access(e)),
        }
    }
    Err(HistoryError::BranchNotFound(branch.to_string()))
}

impl HistoryProvider for GitHistory {
    fn refresh(&self) -> Result<(), HistoryError> {
        let repo = self.lock();
        let mut remote = repo.find_remote(ORIGIN).map_err(HistoryError::access)?;
        remote
            .fetch(&[FETCH_REFSPEC], None, None)
            .map_err(HistoryError::access)?;
        debug!(path = %self.path.display(), "fetched origin");
        Ok(())
    }

    fn tip(&self, branch: &str) -> Result<CommitRecord, HistoryError> {
        let repo = self.lock();
        let commit = branch_tip(&repo, branch)?;
        Ok(record(&commit))
    }

    fn ancestry(&self, branch: &str, limit: usize) -> Result<Vec<CommitRecord>, HistoryError> {
        let repo = self.lock();
        let tip = branch_tip(&repo, branch)?;
        let mut walk = repo.revwalk().map_err(HistoryError::access)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(HistoryError::access)?;
        walk.push(tip.id()).map_err(HistoryError::access)?;

        let mut commits = Vec::new();
        for oid in walk.take(limit) {
            let oid = oid.map_err(HistoryError::access)?;
            let commit = repo.find_commit(oid).map_err(HistoryError::access)?;
            commits.push(record(&commit));
        }
        Ok(commits)
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<Option<CommitRecord>, HistoryError> {
        // Only hex tokens of a plausible length are worth asking git about.
        let plausible = (4..=40).contains(&prefix.len())
            && prefix.bytes().all(|b| b.is_ascii_hexdigit());
        if !plausible {
            return Ok(None);
        }
        let repo = self.lock();
        let resolved = match repo.revparse_single(prefix) {
            Ok(obj) => match obj.peel_to_commit() {
                Ok(commit) => Ok(Some(record(&commit))),
                // Resolved to something that is not a commit.
                Err(_) => Ok(None),
            },
            Err(e)
                if matches!(
                    e.code(),
                    ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(HistoryError::access(e)),
        };
        resolved
    }
}

/// Opens one [`GitHistory`] per repository, keyed by short name under a
/// common root directory. Rehash reuses an existing clone on disk;
/// untracked clones are left in place, never deleted.
pub struct GitProviderFactory {
    root: PathBuf,
}

impl GitProviderFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        GitProviderFactory { root: root.into() }
    }
}

impl ProviderFactory for GitProviderFactory {
    fn open(&self, config: &RepositoryConfig) -> Result<Arc<dyn HistoryProvider>, HistoryError> {
        let path = self.root.join(&config.name);
        let history = GitHistory::open(&path, &config.url).map_err(HistoryError::access)?;
        Ok(Arc::new(history))
    }
}
