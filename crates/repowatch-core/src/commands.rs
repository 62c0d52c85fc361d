//! The on-demand command surface: history queries, repository listing,
//! and snarf replies. These are synchronous reads; they never touch the
//! poll cursors.

use serde::Serialize;
use thiserror::Error;

use crate::history::HistoryError;
use crate::registry::Registry;
use crate::render::{self, FormatContext, Line, Span};
use crate::snarf;

#[derive(Error, Debug)]
pub enum CommandError {
    /// No repository has this short name anywhere in the system.
    #[error("no repository named {0}")]
    NotFound(String),

    /// The repository exists but is not subscribed to the requesting
    /// channel. Kept distinct from `NotFound` so callers can choose how
    /// much to reveal; presenting both identically preserves the privacy
    /// guarantee.
    #[error("repository {0} is not visible in this channel")]
    NotAuthorized(String),

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// One row of `list_repositories` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSummary {
    pub name: String,
    pub display_name: String,
    pub branch: String,
}

/// Short names (with display data) visible to the requesting channel.
pub fn list_repositories(registry: &Registry, channel: &str) -> Vec<RepoSummary> {
    registry
        .visible_to(channel)
        .iter()
        .map(|repo| RepoSummary {
            name: repo.config.name.clone(),
            display_name: repo.config.display_name.clone(),
            branch: repo.config.branch.clone(),
        })
        .collect()
}

/// Render the most recent `count` commits of a repository, oldest first.
///
/// Capped at `max_commits`; when the cap bites, a preamble line says how
/// much was cut. Only channels the repository is subscribed to may query
/// it.
pub fn query_log(
    registry: &Registry,
    name: &str,
    channel: &str,
    count: usize,
    max_commits: usize,
) -> Result<Vec<Line>, CommandError> {
    let repo = registry
        .get(name)
        .ok_or_else(|| CommandError::NotFound(name.to_string()))?;
    if !repo.config.subscribes(channel) {
        return Err(CommandError::NotAuthorized(name.to_string()));
    }

    let count = count.max(1);
    let max_commits = max_commits.max(1);
    let mut commits = repo.history.ancestry(&repo.config.branch, count)?;
    commits.reverse();

    let mut lines = Vec::new();
    if commits.len() > max_commits {
        lines.push(truncation_preamble(
            max_commits,
            commits.len(),
            &repo.config.display_name,
        ));
        let skip = commits.len() - max_commits;
        commits.drain(..skip);
    }
    for commit in &commits {
        let ctx = FormatContext::new(&repo.config, commit);
        lines.extend(render::render(&repo.config.message_template, &ctx));
    }
    Ok(lines)
}

/// Scan chat text against the repositories visible in `channel` and
/// render one reply per resolved commit, using each repository's reply
/// template. Disabled snarfing is a no-op.
pub fn snarf_replies(registry: &Registry, channel: &str, text: &str, enabled: bool) -> Vec<Line> {
    let candidates = registry.visible_to(channel);
    let mut lines = Vec::new();
    for m in snarf::resolve(&candidates, text, enabled) {
        // resolve only returns names it just took from the registry, but
        // a concurrent rehash may have dropped the entry since.
        if let Some(repo) = registry.get(&m.repo) {
            let ctx = FormatContext::new(&repo.config, &m.commit);
            lines.extend(render::render(repo.config.reply_template(), &ctx));
        }
    }
    lines
}

pub(crate) fn truncation_preamble(shown: usize, total: usize, display_name: &str) -> Line {
    vec![Span::Text(format!(
        "Showing latest {shown} of {total} commits to {display_name}..."
    ))]
}
