//! Batch operations for bulk edits.
//!
//! Each element is its own committed operation. A failure is recorded and the
//! batch moves on; earlier elements stay applied.

use crate::store::{Store, StoreError, store_error};
use crate::types::{Item, NewItem, Status};

/// Result of a batch create operation.
#[derive(Debug)]
pub struct BatchCreateResult {
    /// Successfully created items.
    pub created: Vec<Item>,
    /// Errors that occurred (index, error message).
    pub errors: Vec<(usize, String)>,
}

/// Result of a batch move operation.
#[derive(Debug)]
pub struct BatchMoveResult {
    /// Items after the move, in request order.
    pub moved: Vec<Item>,
    /// IDs that were not found.
    pub not_found: Vec<String>,
    /// Errors that occurred (id, error message).
    pub errors: Vec<(String, String)>,
}

/// Result of a batch delete operation.
#[derive(Debug)]
pub struct BatchDeleteResult {
    pub deleted: Vec<Item>,
    pub not_found: Vec<String>,
    pub errors: Vec<(String, String)>,
}

/// Extension trait for batch operations on Store.
pub trait StoreBatchExt {
    /// Create multiple items in request order.
    fn batch_create(&mut self, specs: Vec<NewItem>) -> BatchCreateResult;

    /// Move multiple items to one column in request order.
    ///
    /// When several moved items are TOP_PRIORITY, the last one keeps it.
    fn batch_move(&mut self, ids: &[&str], status: Status) -> BatchMoveResult;

    /// Delete multiple items.
    fn batch_delete(&mut self, ids: &[&str]) -> BatchDeleteResult;
}

impl StoreBatchExt for Store {
    fn batch_create(&mut self, specs: Vec<NewItem>) -> BatchCreateResult {
        let mut created = Vec::new();
        let mut errors = Vec::new();

        for (i, spec) in specs.into_iter().enumerate() {
            match self.create(spec) {
                Ok(item) => created.push(item),
                Err(e) => errors.push((i, format!("{:#}", e))),
            }
        }

        log::debug!("Batch create: {} created, {} failed", created.len(), errors.len());
        BatchCreateResult { created, errors }
    }

    fn batch_move(&mut self, ids: &[&str], status: Status) -> BatchMoveResult {
        let mut moved = Vec::new();
        let mut not_found = Vec::new();
        let mut errors = Vec::new();

        for id in ids {
            match self.move_to(id, status) {
                Ok(item) => moved.push(item),
                Err(e) => match store_error(&e) {
                    Some(StoreError::ItemNotFound(_)) => not_found.push(id.to_string()),
                    _ => errors.push((id.to_string(), format!("{:#}", e))),
                },
            }
        }

        // Earlier holders may have been demoted by later moves
        for item in &mut moved {
            if let Some(current) = self.get(&item.id) {
                *item = current;
            }
        }

        BatchMoveResult {
            moved,
            not_found,
            errors,
        }
    }

    fn batch_delete(&mut self, ids: &[&str]) -> BatchDeleteResult {
        let mut deleted = Vec::new();
        let mut not_found = Vec::new();
        let mut errors = Vec::new();

        for id in ids {
            match self.delete(id) {
                Ok(Some(item)) => deleted.push(item),
                Ok(None) => not_found.push(id.to_string()),
                Err(e) => errors.push((id.to_string(), format!("{:#}", e))),
            }
        }

        BatchDeleteResult {
            deleted,
            not_found,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;
    use tempfile::TempDir;

    fn setup_test_store() -> (TempDir, Store) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_batch_create() {
        let (_temp_dir, mut store) = setup_test_store();

        let specs = vec![
            NewItem::new("Task 1").with_priority(Priority::High),
            NewItem::new("").with_tags(["test"]),
            NewItem::new("Task 3").with_description("A description"),
        ];

        let result = store.batch_create(specs);

        assert_eq!(result.created.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].0, 1);
        assert_eq!(result.created[0].priority, Priority::High);
        assert_eq!(result.created[1].description, "A description");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_batch_move() {
        let (_temp_dir, mut store) = setup_test_store();

        let item1 = store.create(NewItem::new("Task 1")).unwrap();
        let item2 = store.create(NewItem::new("Task 2")).unwrap();

        let result = store.batch_move(&[&item1.id, "kb-nonexistent", &item2.id], Status::InProgress);

        assert_eq!(result.moved.len(), 2);
        assert_eq!(result.not_found, vec!["kb-nonexistent"]);
        assert!(result.errors.is_empty());
        assert!(result.moved.iter().all(|item| item.status == Status::InProgress));
    }

    #[test]
    fn test_batch_move_last_top_priority_wins() {
        let (_temp_dir, mut store) = setup_test_store();

        let a = store.create(NewItem::new("A").with_priority(Priority::TopPriority)).unwrap();
        let b = store
            .create(
                NewItem::new("B")
                    .with_priority(Priority::TopPriority)
                    .with_status(Status::Review),
            )
            .unwrap();

        let result = store.batch_move(&[&a.id, &b.id], Status::Done);

        assert_eq!(result.moved[0].priority, Priority::High);
        assert_eq!(result.moved[1].priority, Priority::TopPriority);
        assert_eq!(store.top_priority(Status::Done).unwrap().id, b.id);
    }

    #[test]
    fn test_batch_delete() {
        let (_temp_dir, mut store) = setup_test_store();

        let item = store.create(NewItem::new("Task")).unwrap();
        let result = store.batch_delete(&[&item.id, &item.id]);

        assert_eq!(result.deleted.len(), 1);
        assert_eq!(result.not_found, vec![item.id]);
        assert!(store.is_empty());
    }
}
