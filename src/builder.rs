//! Builder pattern API for creating items.

use crate::store::Store;
use crate::types::{Item, NewItem, Priority, Status};
use chrono::NaiveDate;
use eyre::{Context, Result};

/// Builder for creating items with a fluent API.
///
/// # Example
///
/// ```ignore
/// let item = store.build("Ship release notes")
///     .priority(Priority::High)
///     .status(Status::InProgress)
///     .tag("docs")
///     .description("Cover the new sync targets")
///     .create()?;
/// ```
pub struct ItemBuilder<'a> {
    store: &'a mut Store,
    fields: NewItem,
}

impl<'a> ItemBuilder<'a> {
    /// Create a new builder with the given title.
    pub fn new(store: &'a mut Store, title: impl Into<String>) -> Self {
        Self {
            store,
            fields: NewItem::new(title),
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.fields.priority = priority;
        self
    }

    /// Initial column. Defaults to todo.
    pub fn status(mut self, status: Status) -> Self {
        self.fields.status = status;
        self
    }

    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.fields.due_date = Some(due_date);
        self
    }

    /// Add a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.fields.tags.insert(tag.into());
        self
    }

    /// Add multiple tags.
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields.tags.extend(tags.into_iter().map(|t| t.into()));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.fields.description = description.into();
        self
    }

    /// Create the item.
    pub fn create(self) -> Result<Item> {
        self.store.create(self.fields).context("Failed to create item")
    }
}

/// Extension trait to add builder method to Store.
pub trait StoreBuilderExt {
    /// Start building a new item with the given title.
    fn build(&mut self, title: impl Into<String>) -> ItemBuilder<'_>;
}

impl StoreBuilderExt for Store {
    fn build(&mut self, title: impl Into<String>) -> ItemBuilder<'_> {
        ItemBuilder::new(self, title)
    }
}
