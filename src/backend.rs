//! Routes CLI commands either to a running daemon or straight to the store.

use kanban::{
    BoardConfig, BoardSummary, Client, CompletionStats, Filter, HistoryFilter, HistoryPage, Item, ItemPatch, NewItem,
    Status, Store, StoreHistoryExt, SyncReport, is_daemon_running, render_calendar, sync_all,
};
use eyre::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where board operations go.
pub enum Backend {
    /// This process owns the store for the duration of the command.
    Local {
        root: PathBuf,
        store: Store,
        config: BoardConfig,
    },
    /// A daemon owns the store; requests are forwarded over its socket.
    Remote(Client),
}

impl Backend {
    /// Prefer a running daemon unless `local` is set.
    pub fn open(root: &Path, local: bool) -> Result<Self> {
        if !local && is_daemon_running(root) {
            log::debug!("Routing through daemon for {}", root.display());
            let client = Client::connect(root, false).context("Failed to connect to daemon")?;
            return Ok(Self::Remote(client));
        }

        let store = Store::open(root).context("Failed to open store")?;
        let config = BoardConfig::load(root).context("Failed to load board config")?;
        Ok(Self::Local {
            root: root.to_path_buf(),
            store,
            config,
        })
    }

    pub fn create(&mut self, item: NewItem) -> Result<Item> {
        match self {
            Self::Local { store, .. } => store.create(item),
            Self::Remote(client) => client.create(item),
        }
    }

    pub fn get(&mut self, id: &str) -> Result<Option<Item>> {
        match self {
            Self::Local { store, .. } => Ok(store.get(id)),
            Self::Remote(client) => client.get(id),
        }
    }

    pub fn list(&mut self, filter: Filter) -> Result<Vec<Item>> {
        match self {
            Self::Local { store, .. } => Ok(store.list(&filter)),
            Self::Remote(client) => client.list(filter),
        }
    }

    pub fn board(&mut self) -> Result<BTreeMap<Status, Vec<Item>>> {
        match self {
            Self::Local { store, .. } => Ok(store.by_status()),
            Self::Remote(client) => client.board(),
        }
    }

    pub fn update(&mut self, id: &str, patch: ItemPatch) -> Result<Item> {
        match self {
            Self::Local { store, .. } => store.update(id, patch),
            Self::Remote(client) => client.update(id, patch),
        }
    }

    pub fn move_to(&mut self, id: &str, status: Status) -> Result<Item> {
        match self {
            Self::Local { store, .. } => store.move_to(id, status),
            Self::Remote(client) => client.move_to(id, status),
        }
    }

    pub fn delete(&mut self, id: &str) -> Result<Option<Item>> {
        match self {
            Self::Local { store, .. } => store.delete(id),
            Self::Remote(client) => client.delete(id),
        }
    }

    pub fn history(&mut self, filter: HistoryFilter) -> Result<HistoryPage> {
        match self {
            Self::Local { store, .. } => Ok(store.history(&filter)),
            Self::Remote(client) => client.history(filter),
        }
    }

    pub fn stats(&mut self, filter: HistoryFilter) -> Result<CompletionStats> {
        match self {
            Self::Local { store, .. } => Ok(store.stats(&filter)),
            Self::Remote(client) => client.stats(filter),
        }
    }

    pub fn summary(&mut self) -> Result<BoardSummary> {
        match self {
            Self::Local { store, .. } => Ok(store.summary()),
            Self::Remote(client) => client.summary(),
        }
    }

    pub fn export(&mut self) -> Result<String> {
        match self {
            Self::Local { store, config, .. } => {
                Ok(render_calendar(store.items(), &config.calendar_name, store.now()))
            }
            Self::Remote(client) => client.export(),
        }
    }

    pub fn sync(&mut self) -> Result<SyncReport> {
        match self {
            Self::Local { root, store, config } => {
                let targets = config.build_targets(root);
                Ok(sync_all(&targets, store.items(), &config.calendar_name, store.now()))
            }
            Self::Remote(client) => client.sync(),
        }
    }

    /// Page size to use when the user gave none.
    pub fn history_page_size(&self, root: &Path) -> Result<usize> {
        match self {
            Self::Local { config, .. } => Ok(config.history_page_size),
            Self::Remote(_) => Ok(BoardConfig::load(root)?.history_page_size),
        }
    }
}
