use tracing::debug;

use crate::history::{HistoryError, HistoryProvider};
use crate::repo::CommitRecord;

/// Upper bound on one ancestry walk. A cursor not found within this many
/// commits is treated like a history discontinuity: suppress and reset.
pub const MAX_WALK: usize = 10_000;

/// Result of one detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// New commits to announce, oldest first, truncated to `max_count`
    /// (the most recent ones are kept).
    pub commits: Vec<CommitRecord>,
    /// New commits that actually arrived, before truncation.
    pub total_new: usize,
    /// Where the cursor lands: always the true branch tip, even when
    /// commits were truncated away.
    pub cursor: String,
}

impl Delta {
    fn quiet(cursor: String) -> Self {
        Delta {
            commits: Vec::new(),
            total_new: 0,
            cursor,
        }
    }

    pub fn truncated(&self) -> bool {
        self.total_new > self.commits.len()
    }
}

/// Compute which commits are new since `last_seen` on `branch`.
///
/// A `None` cursor means the repository was never polled: all existing
/// history is suppressed and only the cursor advances, so a freshly
/// cloned repository does not flood its channels. A cursor that is no
/// longer reachable from the tip (force push, recreated repository)
/// gets the same treatment rather than a spurious re-announcement.
pub fn detect(
    history: &dyn HistoryProvider,
    branch: &str,
    last_seen: Option<&str>,
    max_count: usize,
) -> Result<Delta, HistoryError> {
    let max_count = max_count.max(1);
    let tip = history.tip(branch)?;

    let Some(last_seen) = last_seen else {
        debug!(branch, tip = %tip.short_id, "first poll, suppressing existing history");
        return Ok(Delta::quiet(tip.id));
    };

    if tip.id == last_seen {
        return Ok(Delta::quiet(tip.id));
    }

    let walk = history.ancestry(branch, MAX_WALK)?;
    match walk.iter().position(|c| c.id == last_seen) {
        Some(idx) => {
            let keep = idx.min(max_count);
            let mut commits = walk[..keep].to_vec();
            commits.reverse();
            Ok(Delta {
                commits,
                total_new: idx,
                cursor: tip.id,
            })
        }
        None => {
            debug!(branch, cursor = last_seen, "cursor not in ancestry, resetting to tip");
            Ok(Delta::quiet(tip.id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    /// In-memory linear history, oldest commit first.
    struct MemoryHistory {
        commits: Vec<CommitRecord>,
    }

    fn commit(n: usize) -> CommitRecord {
        let id = format!("{n:040x}");
        CommitRecord {
            short_id: id[..7].to_string(),
            id,
            author_name: "Ada".to_string(),
            author_email: "ada@example.com".to_string(),
            summary: format!("commit {n}"),
            time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, n as u32).unwrap(),
        }
    }

    impl MemoryHistory {
        fn with_commits(n: usize) -> Self {
            MemoryHistory {
                commits: (1..=n).map(commit).collect(),
            }
        }
    }

    impl HistoryProvider for MemoryHistory {
        fn refresh(&self) -> Result<(), HistoryError> {
            Ok(())
        }

        fn tip(&self, branch: &str) -> Result<CommitRecord, HistoryError> {
            self.commits
                .last()
                .cloned()
                .ok_or_else(|| HistoryError::BranchNotFound(branch.to_string()))
        }

        fn ancestry(&self, _branch: &str, limit: usize) -> Result<Vec<CommitRecord>, HistoryError> {
            Ok(self.commits.iter().rev().take(limit).cloned().collect())
        }

        fn resolve_prefix(&self, prefix: &str) -> Result<Option<CommitRecord>, HistoryError> {
            let mut matches = self.commits.iter().filter(|c| c.id.starts_with(prefix));
            match (matches.next(), matches.next()) {
                (Some(c), None) => Ok(Some(c.clone())),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_first_poll_suppresses_and_sets_cursor() {
        let history = MemoryHistory::with_commits(50);
        let delta = detect(&history, "master", None, 5).unwrap();
        assert!(delta.commits.is_empty());
        assert_eq!(delta.total_new, 0);
        assert_eq!(delta.cursor, commit(50).id);
    }

    #[test]
    fn test_no_new_commits_keeps_cursor() {
        let history = MemoryHistory::with_commits(3);
        let delta = detect(&history, "master", Some(&commit(3).id), 5).unwrap();
        assert!(delta.commits.is_empty());
        assert_eq!(delta.cursor, commit(3).id);
    }

    #[test]
    fn test_new_commits_come_back_oldest_first() {
        let history = MemoryHistory::with_commits(6);
        let delta = detect(&history, "master", Some(&commit(3).id), 10).unwrap();
        let ids: Vec<_> = delta.commits.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![commit(4).id, commit(5).id, commit(6).id]);
        assert_eq!(delta.total_new, 3);
        assert_eq!(delta.cursor, commit(6).id);
    }

    #[test]
    fn test_truncation_keeps_most_recent_and_advances_to_true_tip() {
        // 12 new commits, cap 5: only the most recent five are announced,
        // but the cursor lands on the true tip so nothing is re-announced.
        let history = MemoryHistory::with_commits(13);
        let delta = detect(&history, "master", Some(&commit(1).id), 5).unwrap();
        assert_eq!(delta.total_new, 12);
        assert!(delta.truncated());
        let ids: Vec<_> = delta.commits.iter().map(|c| c.id.clone()).collect();
        assert_eq!(
            ids,
            (9..=13).map(|n| commit(n).id).collect::<Vec<_>>()
        );
        assert_eq!(delta.cursor, commit(13).id);
    }

    #[test]
    fn test_force_push_resets_without_announcing() {
        let history = MemoryHistory::with_commits(5);
        // Cursor points at a commit that no longer exists in the ancestry.
        let delta = detect(&history, "master", Some(&"f".repeat(40)), 5).unwrap();
        assert!(delta.commits.is_empty());
        assert_eq!(delta.cursor, commit(5).id);
    }

    #[test]
    fn test_zero_max_count_behaves_as_one() {
        let history = MemoryHistory::with_commits(4);
        let delta = detect(&history, "master", Some(&commit(1).id), 0).unwrap();
        assert_eq!(delta.commits.len(), 1);
        assert_eq!(delta.commits[0].id, commit(4).id);
        assert_eq!(delta.total_new, 3);
    }

    #[test]
    fn test_empty_branch_is_an_error() {
        let history = MemoryHistory { commits: vec![] };
        assert!(matches!(
            detect(&history, "master", None, 5),
            Err(HistoryError::BranchNotFound(_))
        ));
    }
}
