//! High-level store API: the single owner of board state.

use crate::id::generate_unique_id;
use crate::query::Filter;
use crate::rules;
use crate::storage::{JsonFileStorage, Storage};
use crate::types::{Item, ItemPatch, NewItem, Status, ValidationError};
use chrono::{DateTime, Duration, Utc};
use eyre::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Item not found.
    ItemNotFound(String),
    /// Validation error.
    Validation(ValidationError),
    /// The snapshot could not be written; the change was rolled back.
    Persistence,
    /// The persisted snapshot holds the same ID twice.
    DuplicateId(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::ItemNotFound(id) => write!(f, "item not found: {}", id),
            StoreError::Validation(e) => write!(f, "validation error: {}", e),
            StoreError::Persistence => write!(f, "failed to persist board, change rolled back"),
            StoreError::DuplicateId(id) => write!(f, "duplicate item id in snapshot: {}", id),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<ValidationError> for StoreError {
    fn from(e: ValidationError) -> Self {
        StoreError::Validation(e)
    }
}

/// Source of "now" for timestamps and rolling stats windows.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The board store.
///
/// Holds the full item set in memory and writes a complete snapshot after
/// every mutation. A mutation whose write fails is rolled back, so memory
/// never drifts from the last persisted snapshot.
pub struct Store {
    storage: Box<dyn Storage>,
    clock: Arc<dyn Clock>,
    items: Vec<Item>,
}

impl Store {
    /// Initialize a new store in the given directory.
    pub fn init(root: &Path) -> Result<Self> {
        let storage = JsonFileStorage::init(root)?;
        Self::with_storage(Box::new(storage), Arc::new(SystemClock))
    }

    /// Open an existing store.
    pub fn open(root: &Path) -> Result<Self> {
        let storage = JsonFileStorage::open(root)?;
        Self::with_storage(Box::new(storage), Arc::new(SystemClock))
    }

    /// Build a store over any backend and clock.
    pub fn with_storage(storage: Box<dyn Storage>, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut items = storage
            .load()
            .wrap_err_with(|| format!("Failed to load board from {}", storage.location()))?;

        {
            let mut seen = HashSet::new();
            for item in &items {
                if !seen.insert(item.id.as_str()) {
                    return Err(eyre::eyre!(StoreError::DuplicateId(item.id.clone())));
                }
                item.validate()
                    .map_err(|e| eyre::eyre!(StoreError::Validation(e)))
                    .wrap_err_with(|| format!("Invalid item {} in {}", item.id, storage.location()))?;
            }
        }

        let demoted = rules::normalize(&mut items);
        if !demoted.is_empty() {
            log::warn!(
                "Snapshot at {} held several top-priority items per column; demoted {:?}",
                storage.location(),
                demoted
            );
        }

        log::info!("Loaded {} items from {}", items.len(), storage.location());

        Ok(Self { storage, clock, items })
    }

    /// Current time according to the store clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Every item, in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Number of items on the board.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the board holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Create a new item.
    pub fn create(&mut self, fields: NewItem) -> Result<Item> {
        self.commit("create", move |items, now| {
            let id = generate_unique_id(&fields.title, now, |candidate| {
                items.iter().any(|item| item.id == candidate)
            });

            let mut item = Item {
                id,
                title: fields.title,
                status: Status::Todo,
                priority: fields.priority,
                due_date: fields.due_date,
                description: fields.description,
                created_at: now,
                completed_at: None,
                time_to_complete: None,
                tags: fields.tags,
            };
            item.set_status(fields.status, now);

            // Validate before touching the item set
            item.validate().map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

            items.push(item.clone());
            rules::grant_top_priority(items, &item.id);

            log::info!("Created {} in {} ({})", item.id, item.status, item.priority);
            Ok(item)
        })
    }

    /// Get an item by ID.
    pub fn get(&self, id: &str) -> Option<Item> {
        self.items.iter().find(|item| item.id == id).cloned()
    }

    /// Apply a partial update.
    ///
    /// A status change gets the same completion bookkeeping as [`Store::move_to`],
    /// and the priority rules are re-applied against the resulting column.
    pub fn update(&mut self, id: &str, patch: ItemPatch) -> Result<Item> {
        if patch.is_empty() {
            return self
                .get(id)
                .ok_or_else(|| eyre::eyre!(StoreError::ItemNotFound(id.to_string())));
        }

        self.commit("update", move |items, now| {
            let index = position(items, id)?;

            let mut updated = items[index].clone();
            if let Some(title) = patch.title {
                updated.title = title;
            }
            if let Some(description) = patch.description {
                updated.description = description;
            }
            if let Some(priority) = patch.priority {
                updated.priority = priority;
            }
            if let Some(due_date) = patch.due_date {
                updated.due_date = due_date;
            }
            if let Some(tags) = patch.tags {
                updated.tags = tags;
            }
            if let Some(status) = patch.status {
                updated.set_status(status, now);
            }

            updated
                .validate()
                .map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

            items[index] = updated.clone();
            rules::grant_top_priority(items, id);

            log::info!("Updated {}", id);
            Ok(updated)
        })
    }

    /// Move an item to another column. Only `status` and the completion
    /// fields change. Moving to the current column is a no-op.
    pub fn move_to(&mut self, id: &str, status: Status) -> Result<Item> {
        let existing = self
            .get(id)
            .ok_or_else(|| eyre::eyre!(StoreError::ItemNotFound(id.to_string())))?;
        if existing.status == status {
            return Ok(existing);
        }

        self.commit("move", move |items, now| {
            let index = position(items, id)?;
            let from = items[index].status;
            items[index].set_status(status, now);
            let moved = items[index].clone();
            rules::grant_top_priority(items, id);

            log::info!("Moved {} from {} to {}", id, from, status);
            Ok(moved)
        })
    }

    /// Delete an item. Returns `None` when the ID is already absent.
    pub fn delete(&mut self, id: &str) -> Result<Option<Item>> {
        if self.get(id).is_none() {
            log::debug!("Delete of missing item {}", id);
            return Ok(None);
        }

        self.commit("delete", move |items, _now| {
            let index = position(items, id)?;
            let removed = items.remove(index);
            log::info!("Deleted {}", id);
            Ok(Some(removed))
        })
    }

    /// List items matching `filter`.
    pub fn list(&self, filter: &Filter) -> Vec<Item> {
        filter.apply(&self.items)
    }

    /// All items grouped by column. Every column is present, possibly empty.
    pub fn by_status(&self) -> BTreeMap<Status, Vec<Item>> {
        let mut board: BTreeMap<Status, Vec<Item>> = Status::ALL.into_iter().map(|s| (s, Vec::new())).collect();
        for item in &self.items {
            board.entry(item.status).or_default().push(item.clone());
        }
        board
    }

    /// The top-priority item of a column.
    pub fn top_priority(&self, status: Status) -> Option<Item> {
        rules::top_priority_in(&self.items, status).cloned()
    }

    /// Run `apply` against the item set and persist the result as one unit.
    ///
    /// If `apply` fails or the snapshot write fails, the item set is restored
    /// to its pre-operation value.
    fn commit<T>(&mut self, op: &str, apply: impl FnOnce(&mut Vec<Item>, DateTime<Utc>) -> Result<T>) -> Result<T> {
        let snapshot = self.items.clone();
        let now = self.clock.now();

        let value = match apply(&mut self.items, now) {
            Ok(value) => value,
            Err(e) => {
                self.items = snapshot;
                return Err(e);
            }
        };

        if let Err(e) = self.storage.save(&self.items) {
            self.items = snapshot;
            log::error!("Failed to persist {} to {}: {:#}", op, self.storage.location(), e);
            return Err(e.wrap_err(StoreError::Persistence));
        }

        Ok(value)
    }
}

fn position(items: &[Item], id: &str) -> Result<usize> {
    items
        .iter()
        .position(|item| item.id == id)
        .ok_or_else(|| eyre::eyre!(StoreError::ItemNotFound(id.to_string())))
}

/// Extract the typed store error carried by a report, if any.
pub fn store_error(report: &eyre::Report) -> Option<&StoreError> {
    report.downcast_ref::<StoreError>()
}
