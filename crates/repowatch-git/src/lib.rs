//! # repowatch-git
//!
//! git2-backed [`HistoryProvider`] for repowatch.
//!
//! Each tracked repository gets a local no-checkout clone under a
//! configured root directory. `refresh` fetches from `origin`; tip and
//! ancestry reads resolve `refs/remotes/origin/<branch>` first so they
//! always see the remote's state, not a local checkout.
//!
//! ## Key Types
//!
//! - [`GitHistory`] - one local clone, exposed through the provider trait
//! - [`GitProviderFactory`] - opens (cloning if needed) one clone per
//!   repository short name
//!
//! [`HistoryProvider`]: repowatch_core::HistoryProvider

mod provider;

pub use provider::{GitError, GitHistory, GitProviderFactory};
