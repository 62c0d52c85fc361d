//! # repowatch-core
//!
//! Core of the repowatch commit notifier: poll scheduling, commit delta
//! detection, message template rendering, and commit-identifier snarfing.
//!
//! ## Key Types
//!
//! - [`Registry`] - the set of tracked repositories and their cursors
//! - [`Poller`] - the periodic fetch/detect/announce driver
//! - [`HistoryProvider`] - capability interface over a commit graph
//! - [`Dispatcher`] - delivery boundary for rendered notification lines
//!
//! The core never talks to a repository or a chat network directly; it
//! is written purely against the [`HistoryProvider`] and [`Dispatcher`]
//! traits, which keeps every piece testable with in-memory fakes.

mod commands;
mod delta;
mod dispatch;
mod history;
mod registry;
mod render;
mod repo;
mod scheduler;
mod snarf;

pub use commands::{list_repositories, query_log, snarf_replies, CommandError, RepoSummary};
pub use delta::{detect, Delta, MAX_WALK};
pub use dispatch::{DispatchError, Dispatcher};
pub use history::{HistoryError, HistoryProvider, ProviderFactory};
pub use registry::{Registry, RegistryError, TrackedRepo};
pub use render::{plain_text, render, render_link, FormatContext, Line, Span};
pub use repo::{
    validate, CommitRecord, ConfigError, RepoState, RepositoryConfig, Settings, DEFAULT_BRANCH,
    DEFAULT_MAX_COMMITS, DEFAULT_MESSAGE_TEMPLATE, DEFAULT_POLL_PERIOD_SECS,
};
pub use scheduler::Poller;
pub use snarf::{resolve, scan, SnarfMatch, MAX_TOKEN_LEN, MIN_TOKEN_LEN};
