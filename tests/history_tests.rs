//! Integration tests for completion bookkeeping, history and stats.

mod common;

use chrono::{Duration, NaiveDate};
use common::TestEnv;
use kanban::{HistoryFilter, ItemPatch, NewItem, Priority, Status, StoreHistoryExt};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// =============================================================================
// Completion bookkeeping
// =============================================================================

#[test]
fn test_one_hour_to_complete() {
    let mut env = TestEnv::new();

    let item = env.create_item("Write report");
    env.advance(Duration::seconds(3600));
    let done = env.move_item(&item, Status::Done);

    assert_eq!(done.completed_at, Some(TestEnv::start() + Duration::seconds(3600)));
    assert_eq!(done.time_to_complete, Some(3600));

    let stats = env.store.stats(&HistoryFilter::new());
    assert_eq!(stats.total_completed, 1);
    assert!((stats.avg_hours_to_complete - 1.0).abs() < 1e-9);
}

#[test]
fn test_reopen_clears_and_redo_restamps() {
    let mut env = TestEnv::new();

    let item = env.create_item("Flaky");
    env.advance(Duration::minutes(30));
    env.move_item(&item, Status::Done);

    env.advance(Duration::minutes(30));
    let reopened = env.move_item(&item, Status::InProgress);
    assert!(reopened.completed_at.is_none());
    assert!(reopened.time_to_complete.is_none());

    env.advance(Duration::minutes(60));
    let redone = env.move_item(&item, Status::Done);
    assert_eq!(redone.completed_at, Some(TestEnv::start() + Duration::minutes(120)));
    assert_eq!(redone.time_to_complete, Some(2 * 3600));
}

#[test]
fn test_moves_between_open_columns_leave_completion_unset() {
    let mut env = TestEnv::new();

    let item = env.create_item("Task");
    for status in [Status::InProgress, Status::Review, Status::Todo] {
        let moved = env.move_item(&item, status);
        assert!(moved.completed_at.is_none());
        assert!(moved.time_to_complete.is_none());
    }
}

#[test]
fn test_completion_survives_reload() {
    let mut env = TestEnv::new();

    let item = env.create_item("Persisted");
    env.advance(Duration::hours(5));
    let done = env.move_item(&item, Status::Done);

    let store = env.reopen();
    assert_eq!(store.get(&item.id), Some(done));
}

#[test]
fn test_editing_done_item_keeps_completion() {
    let mut env = TestEnv::new();

    let item = env.create_item("Task");
    env.advance(Duration::hours(2));
    let done = env.move_item(&item, Status::Done);

    env.advance(Duration::hours(1));
    let edited = env
        .store
        .update(&item.id, ItemPatch::new().title("Renamed").status(Status::Done))
        .unwrap();

    assert_eq!(edited.completed_at, done.completed_at);
    assert_eq!(edited.time_to_complete, done.time_to_complete);
}

// =============================================================================
// History filtering
// =============================================================================

/// Five items completed on 2026-03-02 .. 2026-03-06, one per day.
fn five_completions(env: &mut TestEnv) -> Vec<String> {
    let mut ids = Vec::new();
    for day in 0..5 {
        let item = env.create_item(&format!("Day {}", day));
        env.advance(Duration::hours(1 + day));
        env.move_item(&item, Status::Done);
        ids.push(item.id);
        env.advance(Duration::hours(23 - day));
    }
    ids
}

#[test]
fn test_date_range_selects_subset_and_stats_follow() {
    let mut env = TestEnv::new();
    let ids = five_completions(&mut env);

    let filter = HistoryFilter::new().between(date(2026, 3, 3), date(2026, 3, 4));
    let page = env.store.history(&filter);

    assert_eq!(page.total, 2);
    let got: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(got, vec![ids[2].as_str(), ids[1].as_str()]);

    let stats = env.store.stats(&filter);
    assert_eq!(stats.total_completed, 2);
    // 2h and 3h
    assert!((stats.avg_hours_to_complete - 2.5).abs() < 1e-9);
}

#[test]
fn test_history_is_newest_first_and_paginates() {
    let mut env = TestEnv::new();
    let ids = five_completions(&mut env);

    let first = env.store.history(&HistoryFilter::new().page(0, 2));
    let second = env.store.history(&HistoryFilter::new().page(2, 2));
    let last = env.store.history(&HistoryFilter::new().page(4, 2));

    assert_eq!(first.total, 5);
    assert_eq!(first.items[0].id, ids[4]);
    assert_eq!(first.items[1].id, ids[3]);
    assert_eq!(second.items[0].id, ids[2]);
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].id, ids[0]);
}

#[test]
fn test_history_excludes_open_items() {
    let mut env = TestEnv::new();

    env.create_item("Still open");
    let reopened = env.create_item("Reopened");
    env.move_item(&reopened, Status::Done);
    env.move_item(&reopened, Status::Review);

    assert_eq!(env.store.history(&HistoryFilter::new()).total, 0);
}

#[test]
fn test_tag_and_date_filters_combine() {
    let mut env = TestEnv::new();

    let tagged = env.create_item_with_tags("Tagged", &["ops"]);
    let untagged = env.create_item("Untagged");
    env.move_item(&tagged, Status::Done);
    env.move_item(&untagged, Status::Done);
    env.advance(Duration::days(3));
    let late = env.create_item_with_tags("Late tagged", &["ops"]);
    env.move_item(&late, Status::Done);

    let filter = HistoryFilter::new()
        .tag("ops")
        .between(date(2026, 3, 2), date(2026, 3, 2));
    let page = env.store.history(&filter);

    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, tagged.id);
}

// =============================================================================
// Stats
// =============================================================================

#[test]
fn test_empty_stats() {
    let env = TestEnv::new();

    let stats = env.store.stats(&HistoryFilter::new());

    assert_eq!(stats.total_completed, 0);
    assert_eq!(stats.completed_this_week, 0);
    assert_eq!(stats.completed_this_month, 0);
    assert_eq!(stats.avg_hours_to_complete, 0.0);
    assert_eq!(stats.by_priority.len(), 4);
    assert!(stats.by_priority.values().all(|count| *count == 0));
}

#[test]
fn test_rolling_week_and_month() {
    let mut env = TestEnv::new();

    let old = env.create_item("Old");
    env.move_item(&old, Status::Done);
    env.advance(Duration::days(20));
    let recent = env.create_item("Recent");
    env.move_item(&recent, Status::Done);
    env.advance(Duration::days(2));

    let stats = env.store.stats(&HistoryFilter::new());
    assert_eq!(stats.total_completed, 2);
    assert_eq!(stats.completed_this_week, 1);
    assert_eq!(stats.completed_this_month, 2);

    env.advance(Duration::days(10));
    let stats = env.store.stats(&HistoryFilter::new());
    assert_eq!(stats.completed_this_week, 0);
    assert_eq!(stats.completed_this_month, 1);
}

#[test]
fn test_stats_by_priority() {
    let mut env = TestEnv::new();

    for priority in [Priority::High, Priority::High, Priority::Low] {
        env.store
            .create(NewItem::new("Done").with_priority(priority).with_status(Status::Done))
            .unwrap();
    }

    let stats = env.store.stats(&HistoryFilter::new());
    assert_eq!(stats.by_priority[&Priority::High], 2);
    assert_eq!(stats.by_priority[&Priority::Low], 1);
    assert_eq!(stats.by_priority[&Priority::TopPriority], 0);
}

#[test]
fn test_summary_counts_and_holders() {
    let mut env = TestEnv::new();

    let top = env.create_in("Top", Status::Review, Priority::TopPriority);
    env.create_in("Other", Status::Review, Priority::Low);
    env.create_item("Todo");

    let summary = env.store.summary();
    assert_eq!(summary.total_items, 3);
    assert_eq!(summary.counts[&Status::Review], 2);
    assert_eq!(summary.counts[&Status::Done], 0);
    assert_eq!(summary.top_priority[&Status::Review], Some(top.id));
    assert_eq!(summary.top_priority[&Status::Todo], None);
}
