//! Completion history, statistics and the board summary.
//!
//! Everything here is derived on demand from the current item set. Nothing is
//! cached and nothing is persisted.

use crate::store::Store;
use crate::types::{Item, Priority, Status};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Page size used when a history query does not name one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// "This week" is the rolling window of this many days before now.
pub const WEEK_WINDOW_DAYS: i64 = 7;

/// "This month" is the rolling window of this many days before now.
pub const MONTH_WINDOW_DAYS: i64 = 30;

/// Filter over done items. Date bounds apply to the UTC date of
/// `completed_at` and are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default)]
    pub offset: usize,

    #[serde(default = "default_page_size")]
    pub limit: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            tag: None,
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Completed within `[start, end]`.
    pub fn between(self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date(start).end_date(end)
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Whether a done item passes the date and tag criteria.
    pub fn matches(&self, item: &Item) -> bool {
        let Some(completed_at) = item.completed_at.filter(|_| item.is_done()) else {
            return false;
        };
        let day = completed_at.date_naive();
        if self.start_date.is_some_and(|start| day < start) || self.end_date.is_some_and(|end| day > end) {
            return false;
        }
        self.tag.as_deref().is_none_or(|tag| item.has_tag(tag))
    }
}

/// One page of completion history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Items on this page, most recently completed first.
    pub items: Vec<Item>,
    /// Matching items across all pages.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// Aggregates over the filtered done items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionStats {
    pub total_completed: usize,
    /// Completed within the last [`WEEK_WINDOW_DAYS`] days.
    pub completed_this_week: usize,
    /// Completed within the last [`MONTH_WINDOW_DAYS`] days.
    pub completed_this_month: usize,
    /// Mean of `time_to_complete` in hours; 0.0 when nothing qualifies.
    pub avg_hours_to_complete: f64,
    /// Count per priority level. Every level is present.
    pub by_priority: BTreeMap<Priority, usize>,
}

/// Column counts plus each column's top-priority holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSummary {
    pub counts: BTreeMap<Status, usize>,
    pub total_items: usize,
    pub top_priority: BTreeMap<Status, Option<String>>,
}

/// Done items passing `filter`, newest completion first. Pagination is not applied.
pub fn completed<'a>(items: &'a [Item], filter: &HistoryFilter) -> Vec<&'a Item> {
    let mut done: Vec<&Item> = items.iter().filter(|item| filter.matches(item)).collect();
    done.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    done
}

/// A page of completion history.
pub fn list_history(items: &[Item], filter: &HistoryFilter) -> HistoryPage {
    let done = completed(items, filter);
    let total = done.len();

    HistoryPage {
        items: done
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect(),
        total,
        offset: filter.offset,
        limit: filter.limit,
    }
}

/// Completion statistics over every done item passing `filter`.
///
/// Pagination fields of the filter are ignored.
pub fn stats(items: &[Item], filter: &HistoryFilter, now: DateTime<Utc>) -> CompletionStats {
    let done = completed(items, filter);
    let week_start = now - Duration::days(WEEK_WINDOW_DAYS);
    let month_start = now - Duration::days(MONTH_WINDOW_DAYS);

    let completed_since = |start: DateTime<Utc>| {
        done.iter()
            .filter(|item| item.completed_at.is_some_and(|at| at > start))
            .count()
    };

    let durations: Vec<i64> = done.iter().filter_map(|item| item.time_to_complete).collect();
    let avg_hours_to_complete = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64 / 3600.0
    };

    let mut by_priority: BTreeMap<Priority, usize> = Priority::ALL.into_iter().map(|p| (p, 0)).collect();
    for item in &done {
        *by_priority.entry(item.priority).or_insert(0) += 1;
    }

    CompletionStats {
        total_completed: done.len(),
        completed_this_week: completed_since(week_start),
        completed_this_month: completed_since(month_start),
        avg_hours_to_complete,
        by_priority,
    }
}

/// Per-column counts and top-priority holders.
pub fn summary(items: &[Item]) -> BoardSummary {
    let mut counts: BTreeMap<Status, usize> = Status::ALL.into_iter().map(|s| (s, 0)).collect();
    let mut top_priority: BTreeMap<Status, Option<String>> = Status::ALL.into_iter().map(|s| (s, None)).collect();

    for item in items {
        *counts.entry(item.status).or_insert(0) += 1;
        if item.priority == Priority::TopPriority {
            top_priority.insert(item.status, Some(item.id.clone()));
        }
    }

    BoardSummary {
        counts,
        total_items: items.len(),
        top_priority,
    }
}

/// Extension trait to add history and stats to Store.
pub trait StoreHistoryExt {
    /// A page of done items, most recently completed first.
    fn history(&self, filter: &HistoryFilter) -> HistoryPage;

    /// Completion statistics, relative to the store clock.
    fn stats(&self, filter: &HistoryFilter) -> CompletionStats;

    /// Column counts and top-priority holders.
    fn summary(&self) -> BoardSummary;
}

impl StoreHistoryExt for Store {
    fn history(&self, filter: &HistoryFilter) -> HistoryPage {
        list_history(self.items(), filter)
    }

    fn stats(&self, filter: &HistoryFilter) -> CompletionStats {
        stats(self.items(), filter, self.now())
    }

    fn summary(&self) -> BoardSummary {
        summary(self.items())
    }
}
