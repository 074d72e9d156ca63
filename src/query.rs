//! Query API with flexible filtering.

use crate::store::Store;
use crate::types::{Item, Priority, Status};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Criteria for listing items. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    /// Items must carry every listed tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_from: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_to: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_contains: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    pub fn min_priority(mut self, priority: Priority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    /// Items due within `[start, end]`. Items without a due date never match.
    pub fn due_between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.due_from = Some(start);
        self.due_to = Some(end);
        self
    }

    pub fn title_contains(mut self, substring: impl Into<String>) -> Self {
        self.title_contains = Some(substring.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether a single item passes the filter (ignores limit/offset).
    pub fn matches(&self, item: &Item) -> bool {
        if self.status.is_some_and(|status| item.status != status) {
            return false;
        }
        if let Some(tags) = &self.tags
            && !tags.iter().all(|tag| item.has_tag(tag))
        {
            return false;
        }
        if self.min_priority.is_some_and(|min| item.priority < min) {
            return false;
        }
        if self.due_from.is_some() || self.due_to.is_some() {
            let Some(due) = item.due_date else {
                return false;
            };
            if self.due_from.is_some_and(|from| due < from) || self.due_to.is_some_and(|to| due > to) {
                return false;
            }
        }
        if let Some(needle) = &self.title_contains
            && !item.title.to_lowercase().contains(&needle.to_lowercase())
        {
            return false;
        }
        true
    }

    /// Matching items, highest priority first, then oldest first.
    pub fn apply(&self, items: &[Item]) -> Vec<Item> {
        let mut matched: Vec<&Item> = items.iter().filter(|item| self.matches(item)).collect();
        matched.sort_by_key(|item| (Reverse(item.priority), item.created_at));

        matched
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Query builder for fluent queries.
pub struct Query<'a> {
    store: &'a Store,
    filter: Filter,
}

impl<'a> Query<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            filter: Filter::new(),
        }
    }

    pub fn status(mut self, status: Status) -> Self {
        self.filter = self.filter.status(status);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.filter = self.filter.tag(tag);
        self
    }

    pub fn min_priority(mut self, priority: Priority) -> Self {
        self.filter = self.filter.min_priority(priority);
        self
    }

    pub fn due_between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.filter = self.filter.due_between(start, end);
        self
    }

    pub fn title_contains(mut self, substring: impl Into<String>) -> Self {
        self.filter = self.filter.title_contains(substring);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.filter = self.filter.limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.filter = self.filter.offset(offset);
        self
    }

    /// Execute the query and return matching items.
    pub fn execute(self) -> Vec<Item> {
        self.store.list(&self.filter)
    }

    /// Count matching items, ignoring limit and offset.
    pub fn count(self) -> usize {
        self.store.items().iter().filter(|item| self.filter.matches(item)).count()
    }
}

/// Extension trait to add the query builder to Store.
pub trait StoreQueryExt {
    /// Start building a query.
    fn query(&self) -> Query<'_>;
}

impl StoreQueryExt for Store {
    fn query(&self) -> Query<'_> {
        Query::new(self)
    }
}
