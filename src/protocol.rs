//! IPC protocol types for daemon communication.
//!
//! One JSON object per line in each direction, tagged by `type`.

use crate::calendar::SyncReport;
use crate::history::{BoardSummary, CompletionStats, HistoryFilter, HistoryPage};
use crate::query::Filter;
use crate::store::{StoreError, store_error};
use crate::types::{Item, ItemPatch, NewItem, Status};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Create a new item.
    Create { item: NewItem },

    /// Get an item by ID.
    Get { id: String },

    /// List items matching a filter.
    List {
        #[serde(default)]
        filter: Filter,
    },

    /// All items grouped by column.
    Board,

    /// Apply a partial update.
    Update { id: String, patch: ItemPatch },

    /// Delete an item.
    Delete { id: String },

    /// Move an item to another column.
    Move { id: String, status: Status },

    /// A page of completion history.
    History {
        #[serde(default)]
        filter: HistoryFilter,
    },

    /// Completion statistics.
    Stats {
        #[serde(default)]
        filter: HistoryFilter,
    },

    /// Column counts and top-priority holders.
    Summary,

    /// Render the board as an iCalendar document.
    Export,

    /// Push the board to every configured sync target.
    Sync,

    /// Shutdown the daemon.
    Shutdown,

    /// Ping to check if daemon is alive.
    Ping,
}

/// Category of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
    Internal,
}

/// Response sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Single item response.
    Item { item: Item },

    /// Multiple items response.
    Items { items: Vec<Item> },

    /// Items grouped by column.
    Board { columns: BTreeMap<Status, Vec<Item>> },

    /// Item removed.
    Deleted { item: Item },

    /// Item not found.
    NotFound { id: String },

    History { page: HistoryPage },

    Stats { stats: CompletionStats },

    Summary { summary: BoardSummary },

    /// Rendered iCalendar document.
    Calendar { ics: String },

    Sync { report: SyncReport },

    /// Operation succeeded.
    Ok,

    /// Pong response to ping.
    Pong,

    /// Error response.
    Error { kind: ErrorKind, message: String },
}

impl Response {
    /// Create an error response.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    /// Translate a failed store operation into an error response.
    pub fn from_report(report: &eyre::Report) -> Self {
        let kind = match store_error(report) {
            Some(StoreError::Validation(_)) => ErrorKind::Validation,
            Some(StoreError::ItemNotFound(id)) => {
                return Self::NotFound { id: id.clone() };
            }
            Some(StoreError::Persistence) => ErrorKind::Persistence,
            Some(StoreError::DuplicateId(_)) | None => ErrorKind::Internal,
        };
        Self::error(kind, format!("{:#}", report))
    }
}
