//! Priority rules: at most one TOP_PRIORITY item per column.
//!
//! The rules only ever adjust already-valid data, so nothing here can fail.
//! Demoted holders always drop to HIGH.

use crate::types::{Item, Priority, Status};

/// Priority a displaced top-priority holder is demoted to.
pub const DEMOTION_TARGET: Priority = Priority::High;

/// Make `holder_id` the sole top-priority item of its column.
///
/// Evaluated against the holder's current (destination) column. Does nothing
/// unless the holder is itself TOP_PRIORITY. Returns the IDs of demoted items.
pub fn grant_top_priority(items: &mut [Item], holder_id: &str) -> Vec<String> {
    let column = match items.iter().find(|item| item.id == holder_id) {
        Some(holder) if holder.priority == Priority::TopPriority => holder.status,
        _ => return Vec::new(),
    };

    let mut demoted = Vec::new();
    for item in items
        .iter_mut()
        .filter(|item| item.id != holder_id && item.status == column && item.priority == Priority::TopPriority)
    {
        item.priority = DEMOTION_TARGET;
        log::info!(
            "Demoted {} to {} (only one {} per column, {} now holds {})",
            item.id,
            DEMOTION_TARGET,
            Priority::TopPriority,
            holder_id,
            column
        );
        demoted.push(item.id.clone());
    }

    demoted
}

/// The top-priority item of `column`, if any.
pub fn top_priority_in(items: &[Item], column: Status) -> Option<&Item> {
    items
        .iter()
        .find(|item| item.status == column && item.priority == Priority::TopPriority)
}

/// Columns that currently hold more than one top-priority item.
pub fn violations(items: &[Item]) -> Vec<Status> {
    Status::ALL
        .into_iter()
        .filter(|column| {
            items
                .iter()
                .filter(|item| item.status == *column && item.priority == Priority::TopPriority)
                .count()
                > 1
        })
        .collect()
}

/// Restore the invariant over an arbitrary item set.
///
/// Holders are applied in sequence order, so the last holder of each column
/// wins. Returns the IDs of demoted items.
pub fn normalize(items: &mut [Item]) -> Vec<String> {
    let mut demoted = Vec::new();
    for column in violations(items) {
        let winner = items
            .iter()
            .rev()
            .find(|item| item.status == column && item.priority == Priority::TopPriority)
            .map(|item| item.id.clone());
        if let Some(winner) = winner {
            demoted.extend(grant_top_priority(items, &winner));
        }
    }
    demoted
}
