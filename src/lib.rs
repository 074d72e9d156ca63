//! Kanban: a single-board task tracker.
//!
//! Items move through four columns (todo, in progress, review, done). Each
//! column holds at most one TOP_PRIORITY item, completion times are recorded
//! when items reach done, and dated items can be exported or synced as
//! all-day calendar events. The whole board is persisted as one JSON
//! snapshot after every change.
//!
//! # Example
//!
//! ```no_run
//! use kanban::{NewItem, Priority, Status, Store, StoreHistoryExt};
//! use std::path::Path;
//!
//! // Initialize a new board
//! let mut store = Store::init(Path::new(".")).unwrap();
//!
//! let login = store
//!     .create(NewItem::new("Implement login").with_priority(Priority::TopPriority))
//!     .unwrap();
//! let tests = store
//!     .create(NewItem::new("Write tests").with_priority(Priority::TopPriority))
//!     .unwrap();
//!
//! // The newer holder keeps TOP_PRIORITY; the older one drops to HIGH
//! assert_eq!(store.get(&login.id).unwrap().priority, Priority::High);
//! assert_eq!(store.top_priority(Status::Todo).unwrap().id, tests.id);
//!
//! store.move_to(&tests.id, Status::Done).unwrap();
//! assert_eq!(store.stats(&Default::default()).total_completed, 1);
//! ```

mod id;
mod storage;
mod store;
mod types;

pub mod batch;
pub mod builder;
pub mod calendar;
pub mod client;
pub mod config;
pub mod daemon;
pub mod history;
pub mod protocol;
pub mod query;
pub mod rules;

// Re-export public API
pub use batch::{BatchCreateResult, BatchDeleteResult, BatchMoveResult, StoreBatchExt};
pub use builder::{ItemBuilder, StoreBuilderExt};
pub use calendar::{
    CommandTarget, IcalFileTarget, SyncError, SyncOutcome, SyncReport, SyncTarget, render_calendar, sync_all,
};
pub use client::{Client, RemoteError};
pub use config::{BoardConfig, TargetConfig};
pub use daemon::{Daemon, DaemonConfig, is_daemon_running, start_daemon};
pub use history::{BoardSummary, CompletionStats, HistoryFilter, HistoryPage, StoreHistoryExt};
pub use protocol::{ErrorKind, Request, Response};
pub use query::{Filter, Query, StoreQueryExt};
pub use storage::{DATA_FILE, JsonFileStorage, KANBAN_DIR, MemoryStorage, Storage};
pub use store::{Clock, ManualClock, Store, StoreError, SystemClock, store_error};
pub use types::{Item, ItemPatch, NewItem, Priority, Status, ValidationError, parse_date};
