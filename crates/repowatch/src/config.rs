//! The `repowatch.toml` configuration file.
//!
//! Loading and parsing lives here in the binary; the core only ever sees
//! the resulting [`RepositoryConfig`] set and [`Settings`] values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use repowatch_core::{
    RepositoryConfig, Settings, DEFAULT_BRANCH, DEFAULT_MAX_COMMITS, DEFAULT_MESSAGE_TEMPLATE,
    DEFAULT_POLL_PERIOD_SECS,
};

pub const CONFIG_FILE_NAME: &str = "repowatch.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchFile {
    /// Seconds between poll cycles; zero disables periodic polling.
    #[serde(default = "default_poll_period")]
    pub poll_period_secs: u64,
    /// Most commits announced per repository per cycle.
    #[serde(default = "default_max_commits")]
    pub max_commits: u32,
    /// Whether chat text is scanned for commit identifiers.
    #[serde(default = "default_snarf")]
    pub snarf: bool,
    /// Where local clones are kept. Defaults to a per-user data dir.
    #[serde(default)]
    pub repo_dir: Option<PathBuf>,
    /// Keyed by display name, like the sections of an ini file.
    #[serde(default)]
    pub repositories: BTreeMap<String, RepoSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoSection {
    pub short_name: String,
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub channels: Vec<String>,
    #[serde(default = "default_message_template")]
    pub commit_message: String,
    /// Empty means reply with `commit_message`.
    #[serde(default)]
    pub commit_reply: String,
    #[serde(default)]
    pub commit_link: String,
}

fn default_poll_period() -> u64 {
    DEFAULT_POLL_PERIOD_SECS
}

fn default_max_commits() -> u32 {
    DEFAULT_MAX_COMMITS
}

fn default_snarf() -> bool {
    true
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_message_template() -> String {
    DEFAULT_MESSAGE_TEMPLATE.to_string()
}

impl WatchFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: WatchFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(file)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            poll_period_secs: self.poll_period_secs,
            max_commits: self.max_commits,
            snarf: self.snarf,
        }
    }

    pub fn repositories(&self) -> Vec<RepositoryConfig> {
        self.repositories
            .iter()
            .map(|(display_name, section)| RepositoryConfig {
                name: section.short_name.clone(),
                display_name: display_name.clone(),
                url: section.url.clone(),
                branch: section.branch.clone(),
                channels: section.channels.clone(),
                message_template: section.commit_message.clone(),
                reply_template: section.commit_reply.clone(),
                link_template: section.commit_link.clone(),
            })
            .collect()
    }

    pub fn repo_dir(&self) -> PathBuf {
        if let Some(dir) = &self.repo_dir {
            return dir.clone();
        }
        dirs::data_local_dir()
            .map(|d| d.join("repowatch").join("repos"))
            .unwrap_or_else(|| PathBuf::from("repos"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
poll_period_secs = 60
max_commits = 3

[repositories."Prototype Project"]
short_name = "proto"
url = "https://example.com/proto.git"
channels = ["#dev", "#ops"]
commit_link = "https://example.com/proto/commit/%c"
"##;

    #[test]
    fn test_parse_sample_with_defaults() {
        let file: WatchFile = toml::from_str(SAMPLE).unwrap();
        assert_eq!(file.poll_period_secs, 60);
        assert_eq!(file.max_commits, 3);
        assert!(file.snarf);

        let repos = file.repositories();
        assert_eq!(repos.len(), 1);
        let proto = &repos[0];
        assert_eq!(proto.name, "proto");
        assert_eq!(proto.display_name, "Prototype Project");
        assert_eq!(proto.branch, "master");
        assert_eq!(proto.message_template, "[%s|%b|%a] %m");
        assert_eq!(proto.reply_template(), "[%s|%b|%a] %m");
        assert_eq!(proto.channels, vec!["#dev", "#ops"]);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result: Result<WatchFile, _> = toml::from_str("pol_period_secs = 60");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let broken = r##"
[repositories."Broken"]
short_name = "broken"
channels = ["#dev"]
"##;
        let result: Result<WatchFile, _> = toml::from_str(broken);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_file_gets_all_defaults() {
        let file: WatchFile = toml::from_str("").unwrap();
        assert_eq!(file.poll_period_secs, 120);
        assert_eq!(file.max_commits, 5);
        assert!(file.snarf);
        assert!(file.repositories().is_empty());
    }

    #[test]
    fn test_settings_roundtrip() {
        let file: WatchFile = toml::from_str("poll_period_secs = 0\nsnarf = false").unwrap();
        let settings = file.settings();
        assert_eq!(settings.poll_period_secs, 0);
        assert!(!settings.snarf);
        assert_eq!(settings.max_commits(), 5);
    }
}
