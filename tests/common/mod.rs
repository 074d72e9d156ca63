//! Shared test infrastructure for kanban integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use kanban::{Item, JsonFileStorage, ManualClock, NewItem, Priority, Status, Store};
use std::sync::Arc;
use tempfile::TempDir;

/// Test environment with automatic cleanup.
///
/// The store writes to a real snapshot file in a temp directory and reads
/// time from a manual clock starting at [`TestEnv::start`].
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub clock: ManualClock,
    pub store: Store,
}

impl TestEnv {
    /// Create a new test environment with an initialized store.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let clock = ManualClock::new(Self::start());
        let storage = JsonFileStorage::init(temp_dir.path()).expect("Failed to init storage");
        let store = Store::with_storage(Box::new(storage), Arc::new(clock.clone())).expect("Failed to init store");
        Self {
            temp_dir,
            clock,
            store,
        }
    }

    /// Time the clock starts at.
    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    /// Advance the clock.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Create a todo item of medium priority.
    pub fn create_item(&mut self, title: &str) -> Item {
        self.store.create(NewItem::new(title)).expect("Failed to create item")
    }

    /// Create an item in a column with a priority.
    pub fn create_in(&mut self, title: &str, status: Status, priority: Priority) -> Item {
        self.store
            .create(NewItem::new(title).with_status(status).with_priority(priority))
            .expect("Failed to create item")
    }

    /// Create an item with tags.
    pub fn create_item_with_tags(&mut self, title: &str, tags: &[&str]) -> Item {
        self.store
            .create(NewItem::new(title).with_tags(tags.iter().copied()))
            .expect("Failed to create item")
    }

    /// Move an item.
    pub fn move_item(&mut self, item: &Item, status: Status) -> Item {
        self.store.move_to(&item.id, status).expect("Failed to move item")
    }

    /// Current state of an item.
    pub fn reload(&self, item: &Item) -> Item {
        self.store.get(&item.id).expect("Item vanished")
    }

    /// Reopen the board from disk with the same clock.
    pub fn reopen(&self) -> Store {
        let storage = JsonFileStorage::open(self.temp_dir.path()).expect("Failed to open storage");
        Store::with_storage(Box::new(storage), Arc::new(self.clock.clone())).expect("Failed to reopen store")
    }

    /// Assert that no column holds more than one TOP_PRIORITY item.
    pub fn assert_top_priority_unique(&self) {
        for status in Status::ALL {
            let holders: Vec<&str> = self
                .store
                .items()
                .iter()
                .filter(|i| i.status == status && i.priority == Priority::TopPriority)
                .map(|i| i.id.as_str())
                .collect();
            assert!(
                holders.len() <= 1,
                "Expected at most one TOP_PRIORITY in {}, found {:?}",
                status,
                holders
            );
        }
    }

    /// Get all items count.
    pub fn total_count(&self) -> usize {
        self.store.len()
    }

    /// Get items count in a column.
    pub fn count_by_status(&self, status: Status) -> usize {
        self.store.items().iter().filter(|i| i.status == status).count()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
