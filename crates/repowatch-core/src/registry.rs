use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info};

use crate::history::{HistoryError, HistoryProvider, ProviderFactory};
use crate::repo::{self, ConfigError, RepoState, RepositoryConfig};

/// One repository under watch: immutable config, a history provider, and
/// the mutable poll cursor. The scheduler is the cursor's only writer;
/// everyone else takes snapshots.
///
/// The cursor state is shared, not owned: a rehash that keeps this short
/// name hands the same state object to the replacement entry, so a poll
/// step still holding the old `Arc` advances the cursor everyone sees.
pub struct TrackedRepo {
    pub config: RepositoryConfig,
    pub history: Arc<dyn HistoryProvider>,
    state: Arc<Mutex<RepoState>>,
}

impl TrackedRepo {
    fn new(
        config: RepositoryConfig,
        history: Arc<dyn HistoryProvider>,
        state: Arc<Mutex<RepoState>>,
    ) -> Self {
        TrackedRepo {
            config,
            history,
            state,
        }
    }

    /// Consistent snapshot of the last-seen cursor.
    pub fn last_seen(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_seen
            .clone()
    }

    pub(crate) fn advance(&self, cursor: String) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.last_seen = Some(cursor);
    }
}

impl std::fmt::Debug for TrackedRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedRepo")
            .field("config", &self.config)
            .field("last_seen", &self.last_seen())
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("opening repository {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: HistoryError,
    },
}

#[derive(Default)]
struct Inner {
    repos: HashMap<String, Arc<TrackedRepo>>,
    /// channel -> short names, rebuilt on every apply.
    by_channel: HashMap<String, Vec<String>>,
}

/// The set of tracked repositories, shared between the poll scheduler and
/// the on-demand command surface. Not a process singleton: whoever owns
/// it hands out `Arc` clones.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Replace the full config set (initial load and rehash share this
    /// path). All-or-nothing: validation or provider-open failure leaves
    /// the previous set, cursors included, untouched.
    ///
    /// For a short name present both before and after, the new entry
    /// shares the old entry's cursor state, so an advance from a poll
    /// step in flight across the rehash lands in the entry that replaced
    /// it. A genuinely new short name starts with no cursor, so its
    /// first poll suppresses existing history. Entries whose short name
    /// disappeared are dropped; an in-flight poll step holding the old
    /// `Arc` finishes against the detached entry and its result is
    /// discarded with it. Local clones are never deleted here.
    pub fn apply(
        &self,
        configs: Vec<RepositoryConfig>,
        factory: &dyn ProviderFactory,
    ) -> Result<(), RegistryError> {
        repo::validate(&configs)?;

        // Open providers before taking the write lock; cloning a new
        // repository can be slow and must not block readers.
        let mut opened = Vec::with_capacity(configs.len());
        for config in configs {
            let history = factory.open(&config).map_err(|source| RegistryError::Open {
                name: config.name.clone(),
                source,
            })?;
            opened.push((config, history));
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut repos = HashMap::with_capacity(opened.len());
        let mut by_channel: HashMap<String, Vec<String>> = HashMap::new();
        for (config, history) in opened {
            // The state object itself carries over, not a copy of its
            // value: a poll step mid-flight still advances through it.
            let state = match inner.repos.get(&config.name) {
                Some(existing) => Arc::clone(&existing.state),
                None => {
                    debug!(repo = %config.name, "tracking new repository");
                    Arc::new(Mutex::new(RepoState::default()))
                }
            };
            for channel in &config.channels {
                by_channel
                    .entry(channel.clone())
                    .or_default()
                    .push(config.name.clone());
            }
            repos.insert(
                config.name.clone(),
                Arc::new(TrackedRepo::new(config, history, state)),
            );
        }
        info!(repos = repos.len(), "configuration applied");
        inner.repos = repos;
        inner.by_channel = by_channel;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<TrackedRepo>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .repos
            .get(name)
            .cloned()
    }

    /// Every tracked repository, in stable (name) order.
    pub fn all(&self) -> Vec<Arc<TrackedRepo>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut repos: Vec<_> = inner.repos.values().cloned().collect();
        repos.sort_by(|a, b| a.config.name.cmp(&b.config.name));
        repos
    }

    /// Repositories subscribed to `channel`, in stable order. Uses the
    /// channel index rather than scanning every entry.
    pub fn visible_to(&self, channel: &str) -> Vec<Arc<TrackedRepo>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut names = match inner.by_channel.get(channel) {
            Some(names) => names.clone(),
            None => return Vec::new(),
        };
        names.sort();
        names
            .iter()
            .filter_map(|name| inner.repos.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .repos
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
