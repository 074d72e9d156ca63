//! Storage backends: a JSON snapshot file and an in-memory stand-in.
//!
//! Every successful mutation replaces the whole document. There is no
//! append log and no secondary index.

use crate::types::Item;
use eyre::{Context, Result, bail};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Board directory name.
pub const KANBAN_DIR: &str = ".kanban";

/// Snapshot document holding every item.
pub const DATA_FILE: &str = "kanban_data.json";

/// A durable home for the full item set.
pub trait Storage: Send {
    /// Read the last persisted snapshot.
    fn load(&self) -> Result<Vec<Item>>;

    /// Replace the persisted snapshot with `items`.
    fn save(&mut self, items: &[Item]) -> Result<()>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

/// Snapshot persistence in `<root>/.kanban/kanban_data.json`.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Initialize storage in the given directory, creating an empty board if needed.
    pub fn init(root: &Path) -> Result<Self> {
        let kanban_dir = root.join(KANBAN_DIR);
        fs::create_dir_all(&kanban_dir).context("Failed to create .kanban directory")?;

        let path = kanban_dir.join(DATA_FILE);
        let mut storage = Self { path };
        if !storage.path.exists() {
            storage.save(&[]).context("Failed to create kanban_data.json")?;
        }

        Ok(storage)
    }

    /// Open existing storage.
    pub fn open(root: &Path) -> Result<Self> {
        let kanban_dir = root.join(KANBAN_DIR);
        if !kanban_dir.exists() {
            bail!("No .kanban directory found. Run 'kb init' first.");
        }

        Ok(Self {
            path: kanban_dir.join(DATA_FILE),
        })
    }

    /// Path of the snapshot document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Vec<Item>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).context("Failed to read kanban_data.json")?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).context("Failed to parse kanban_data.json")
    }

    fn save(&mut self, items: &[Item]) -> Result<()> {
        let json = serde_json::to_string_pretty(items).context("Failed to serialize items")?;
        atomic_write(&self.path, json.as_bytes()).context("Failed to write kanban_data.json")
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Write `content` to a sibling temp file, fsync it, then rename over `path`.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    let mut file = File::create(&tmp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;

    // fsync directory for rename durability
    if let Some(dir) = path.parent()
        && let Ok(d) = File::open(dir)
    {
        let _ = d.sync_all();
    }
    Ok(())
}

/// In-memory storage. Clones share the same snapshot, so a test can keep a
/// handle after moving one into a store.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    snapshot: Arc<Mutex<Vec<Item>>>,
    fail_writes: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-loaded with `items`.
    pub fn with_items(items: Vec<Item>) -> Self {
        let storage = Self::default();
        *storage.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = items;
        storage
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The last successfully saved snapshot.
    pub fn persisted(&self) -> Vec<Item> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Vec<Item>> {
        Ok(self.persisted())
    }

    fn save(&mut self, items: &[Item]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("simulated write failure");
        }
        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|_| eyre::eyre!("memory storage lock poisoned"))?;
        *snapshot = items.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, Status};
    use chrono::Utc;
    use tempfile::TempDir;

    fn make_item(id: &str, title: &str) -> Item {
        Item {
            id: id.to_string(),
            title: title.to_string(),
            status: Status::Todo,
            priority: Priority::Medium,
            due_date: None,
            description: String::new(),
            created_at: Utc::now(),
            completed_at: None,
            time_to_complete: None,
            tags: Default::default(),
        }
    }

    #[test]
    fn test_init_creates_files() {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::init(temp_dir.path()).unwrap();

        assert!(temp_dir.path().join(KANBAN_DIR).exists());
        assert!(storage.path().exists());
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_init_keeps_existing_data() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = JsonFileStorage::init(temp_dir.path()).unwrap();
        storage.save(&[make_item("kb-0000000001", "Keep me")]).unwrap();

        let storage = JsonFileStorage::init(temp_dir.path()).unwrap();
        assert_eq!(storage.load().unwrap().len(), 1);
    }

    #[test]
    fn test_open_without_init_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(JsonFileStorage::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_save_and_load_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = JsonFileStorage::init(temp_dir.path()).unwrap();

        let items = vec![make_item("kb-0000000001", "One"), make_item("kb-0000000002", "Two")];
        storage.save(&items).unwrap();

        let loaded = JsonFileStorage::open(temp_dir.path()).unwrap().load().unwrap();
        assert_eq!(loaded, items);

        // Snapshot replaces, never appends
        storage.save(&items[..1]).unwrap();
        assert_eq!(storage.load().unwrap().len(), 1);
        assert!(!storage.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_document_is_json_array() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = JsonFileStorage::init(temp_dir.path()).unwrap();
        storage.save(&[make_item("kb-0000000001", "One")]).unwrap();

        let raw = fs::read_to_string(storage.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let record = &value.as_array().unwrap()[0];
        for field in [
            "id",
            "title",
            "status",
            "priority",
            "due_date",
            "description",
            "created_at",
            "completed_at",
            "time_to_complete",
            "tags",
        ] {
            assert!(record.get(field).is_some(), "missing field {}", field);
        }
    }

    #[test]
    fn test_load_rejects_unknown_priority() {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::init(temp_dir.path()).unwrap();
        fs::write(
            storage.path(),
            r#"[{"id":"kb-1","title":"x","status":"todo","priority":"URGENT","created_at":"2026-01-01T00:00:00Z"}]"#,
        )
        .unwrap();

        assert!(storage.load().is_err());
    }

    #[test]
    fn test_memory_storage_failure_switch() {
        let mut storage = MemoryStorage::new();
        let handle = storage.clone();

        storage.save(&[make_item("kb-0000000001", "One")]).unwrap();
        handle.set_fail_writes(true);
        assert!(storage.save(&[]).is_err());

        assert_eq!(handle.persisted().len(), 1);
        assert_eq!(handle.save_count(), 1);
    }
}
