//! The periodic poll driver: the only background concurrency in the
//! system, and the sole writer of the per-repository cursors.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::commands::truncation_preamble;
use crate::delta::{self, Delta};
use crate::dispatch::Dispatcher;
use crate::history::HistoryError;
use crate::registry::{Registry, TrackedRepo};
use crate::render::{self, FormatContext, Line};
use crate::repo::Settings;

/// Hard ceiling on one repository's fetch+detect step. The blocking work
/// cannot be aborted mid-fetch; on timeout it is abandoned to finish in
/// the background and its result is discarded, so the cycle moves on.
const STEP_TIMEOUT: Duration = Duration::from_secs(300);

pub struct Poller {
    registry: Arc<Registry>,
    dispatcher: Arc<dyn Dispatcher>,
    settings: watch::Receiver<Settings>,
    shutdown: watch::Receiver<bool>,
}

impl Poller {
    pub fn new(
        registry: Arc<Registry>,
        dispatcher: Arc<dyn Dispatcher>,
        settings: watch::Receiver<Settings>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Poller {
            registry,
            dispatcher,
            settings,
            shutdown,
        }
    }

    /// Drive poll cycles until shutdown. A settings change (rehash)
    /// restarts the timer immediately; a poll period of zero parks the
    /// loop until the settings change again.
    pub async fn run(mut self) {
        loop {
            let period = self.settings.borrow().poll_period_secs;
            if period == 0 {
                debug!("periodic polling disabled");
                tokio::select! {
                    changed = self.settings.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = self.shutdown.changed() => {
                        if changed.is_err() || *self.shutdown.borrow() {
                            break;
                        }
                    }
                }
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(period)) => {
                    self.poll_once().await;
                }
                changed = self.settings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    debug!("settings changed, restarting poll timer");
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("poll scheduler stopped");
    }

    /// Run one poll cycle over every tracked repository. Each repository
    /// is its own task: a slow or failing one never blocks the others,
    /// and its failure is confined to a log line.
    pub async fn poll_once(&self) {
        let max_commits = self.settings.borrow().max_commits();
        let mut steps = JoinSet::new();
        for repo in self.registry.all() {
            let dispatcher = Arc::clone(&self.dispatcher);
            steps.spawn(poll_repo(repo, dispatcher, max_commits));
        }
        while let Some(step) = steps.join_next().await {
            if let Err(e) = step {
                warn!(error = %e, "poll step panicked");
            }
        }
    }
}

async fn poll_repo(repo: Arc<TrackedRepo>, dispatcher: Arc<dyn Dispatcher>, max_commits: usize) {
    let name = repo.config.name.clone();
    let delta = {
        let repo = Arc::clone(&repo);
        let last_seen = repo.last_seen();
        let work = tokio::task::spawn_blocking(move || -> Result<Delta, HistoryError> {
            repo.history.refresh()?;
            delta::detect(
                repo.history.as_ref(),
                &repo.config.branch,
                last_seen.as_deref(),
                max_commits,
            )
        });
        match tokio::time::timeout(STEP_TIMEOUT, work).await {
            Err(_) => {
                warn!(repo = %name, "poll step timed out, will retry next cycle");
                return;
            }
            Ok(Err(e)) => {
                warn!(repo = %name, error = %e, "poll step crashed");
                return;
            }
            // Transient failure: cursor untouched, retried next tick.
            Ok(Ok(Err(e))) => {
                warn!(repo = %name, error = %e, "poll failed");
                return;
            }
            Ok(Ok(Ok(delta))) => delta,
        }
    };

    if !delta.commits.is_empty() {
        debug!(repo = %name, new = delta.total_new, shown = delta.commits.len(), "announcing commits");
        let lines = announcement_lines(&repo, &delta);
        for channel in &repo.config.channels {
            if let Err(e) = dispatcher.dispatch(channel, &lines) {
                // Best-effort only: the batch is dropped for this channel,
                // the cursor still advances below.
                warn!(repo = %name, channel = %channel, error = %e, "dispatch failed, dropping batch");
            }
        }
    }

    // Sole cursor writer. Advancing after the dispatch attempt couples
    // announcement and cursor per batch without retrying forever.
    repo.advance(delta.cursor);
}

fn announcement_lines(repo: &TrackedRepo, delta: &Delta) -> Vec<Line> {
    let mut lines = Vec::new();
    if delta.truncated() {
        lines.push(truncation_preamble(
            delta.commits.len(),
            delta.total_new,
            &repo.config.display_name,
        ));
    }
    for commit in &delta.commits {
        let ctx = FormatContext::new(&repo.config, commit);
        lines.extend(render::render(&repo.config.message_template, &ctx));
    }
    lines
}
