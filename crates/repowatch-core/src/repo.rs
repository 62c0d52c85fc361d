use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "[%s|%b|%a] %m";
pub const DEFAULT_MAX_COMMITS: u32 = 5;
pub const DEFAULT_POLL_PERIOD_SECS: u64 = 120;

/// One tracked repository/branch pairing, immutable between rehashes.
///
/// `name` is the short name: the unique key identifying this repository
/// across the whole system, independent of channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub display_name: String,
    pub url: String,
    pub branch: String,
    pub channels: Vec<String>,
    pub message_template: String,
    pub reply_template: String,
    pub link_template: String,
}

impl RepositoryConfig {
    /// Template used when replying to a snarfed identifier. An empty
    /// `reply_template` falls back to the announcement template.
    pub fn reply_template(&self) -> &str {
        if self.reply_template.is_empty() {
            &self.message_template
        } else {
            &self.reply_template
        }
    }

    pub fn subscribes(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c == channel)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate short name: {0}")]
    DuplicateName(String),

    #[error("repository {0} has an empty short name")]
    EmptyName(String),

    #[error("repository {0} has an empty url")]
    EmptyUrl(String),

    #[error("repository {0} has no subscriber channels")]
    NoChannels(String),
}

/// Check a full replacement config set. Rejecting here keeps a rehash
/// all-or-nothing: the previous set stays active on any error.
pub fn validate(configs: &[RepositoryConfig]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for config in configs {
        let label = if config.display_name.is_empty() {
            &config.name
        } else {
            &config.display_name
        };
        if config.name.is_empty() {
            return Err(ConfigError::EmptyName(label.clone()));
        }
        if config.url.is_empty() {
            return Err(ConfigError::EmptyUrl(label.clone()));
        }
        if config.channels.is_empty() {
            return Err(ConfigError::NoChannels(label.clone()));
        }
        if !seen.insert(config.name.as_str()) {
            return Err(ConfigError::DuplicateName(config.name.clone()));
        }
    }
    Ok(())
}

/// One commit on a tracked branch, as surfaced by a history provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full 40-hex identifier.
    pub id: String,
    /// Stable-length abbreviated identifier.
    pub short_id: String,
    pub author_name: String,
    pub author_email: String,
    /// First line of the commit message.
    pub summary: String,
    pub time: DateTime<Utc>,
}

/// Mutable per-repository state. `last_seen = None` means "never polled":
/// the first poll suppresses all existing history and only sets the cursor.
#[derive(Debug, Clone, Default)]
pub struct RepoState {
    pub last_seen: Option<String>,
}

/// Runtime knobs the core reads; loading them is the binary's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds between poll cycles. Zero disables periodic polling;
    /// on-demand commands keep working.
    pub poll_period_secs: u64,
    /// Most commits announced per repository per cycle.
    pub max_commits: u32,
    /// Whether inbound text is scanned for commit identifiers.
    pub snarf: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_period_secs: DEFAULT_POLL_PERIOD_SECS,
            max_commits: DEFAULT_MAX_COMMITS,
            snarf: true,
        }
    }
}

impl Settings {
    /// Zero (invalid configuration) is treated as one.
    pub fn max_commits(&self) -> usize {
        (self.max_commits as usize).max(1)
    }
}
