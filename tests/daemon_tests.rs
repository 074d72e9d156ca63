//! Integration tests for the daemon and client over a real Unix socket.

use kanban::{
    Client, Daemon, DaemonConfig, ErrorKind, Filter, HistoryFilter, ItemPatch, NewItem, Priority, RemoteError,
    Status, Store,
};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// A daemon running on its own thread, stopped on drop.
struct RunningDaemon {
    temp_dir: TempDir,
    handle: Option<JoinHandle<()>>,
}

impl RunningDaemon {
    fn start() -> Self {
        Self::start_with_config(None)
    }

    /// Start a daemon whose board carries the given `config.yaml`.
    fn start_with_config(config: Option<&str>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        Store::init(temp_dir.path()).unwrap();
        if let Some(config) = config {
            std::fs::write(temp_dir.path().join(".kanban").join("config.yaml"), config).unwrap();
        }

        let root = temp_dir.path().to_path_buf();
        let mut daemon = Daemon::new(DaemonConfig::new(&root)).unwrap();
        let handle = std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async { daemon.run().await }).unwrap();
        });

        let socket = DaemonConfig::new(&root).socket_path();
        for _ in 0..100 {
            if UnixStream::connect(&socket).is_ok() {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        Self {
            temp_dir,
            handle: Some(handle),
        }
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    fn client(&self) -> Client {
        Client::connect(self.root(), false).unwrap()
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        if let Ok(mut client) = Client::connect(self.root(), false) {
            let _ = client.shutdown();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[test]
fn test_ping() {
    let daemon = RunningDaemon::start();
    daemon.client().ping().unwrap();
}

#[test]
fn test_crud_round_trip() {
    let daemon = RunningDaemon::start();
    let mut client = daemon.client();

    let item = client
        .create(NewItem::new("Over the wire").with_priority(Priority::High).with_tags(["net"]))
        .unwrap();
    assert_eq!(client.get(&item.id).unwrap(), Some(item.clone()));

    let updated = client
        .update(&item.id, ItemPatch::new().title("Renamed"))
        .unwrap();
    assert_eq!(updated.title, "Renamed");

    let moved = client.move_to(&item.id, Status::Done).unwrap();
    assert!(moved.completed_at.is_some());

    assert_eq!(client.list(Filter::new().tag("net")).unwrap().len(), 1);
    assert_eq!(client.board().unwrap()[&Status::Done].len(), 1);
    assert_eq!(client.history(HistoryFilter::new()).unwrap().total, 1);
    assert_eq!(client.stats(HistoryFilter::new()).unwrap().total_completed, 1);
    assert_eq!(client.summary().unwrap().total_items, 1);

    assert!(client.delete(&item.id).unwrap().is_some());
    assert!(client.delete(&item.id).unwrap().is_none());
    assert!(client.get(&item.id).unwrap().is_none());
}

#[test]
fn test_mutations_are_persisted_by_daemon() {
    let daemon = RunningDaemon::start();
    let id = daemon.client().create(NewItem::new("Durable")).unwrap().id;

    // The snapshot on disk already holds the item
    let store = Store::open(daemon.root()).unwrap();
    assert!(store.get(&id).is_some());
}

#[test]
fn test_validation_error_kind() {
    let daemon = RunningDaemon::start();
    let mut client = daemon.client();

    let err = client.create(NewItem::new("")).unwrap_err();
    let remote = err.downcast_ref::<RemoteError>().unwrap();
    assert_eq!(remote.kind, ErrorKind::Validation);

    let err = client.move_to("kb-missing", Status::Review).unwrap_err();
    assert_eq!(err.downcast_ref::<RemoteError>().unwrap().kind, ErrorKind::NotFound);
}

#[test]
fn test_malformed_request_keeps_connection() {
    let daemon = RunningDaemon::start();
    let socket = DaemonConfig::new(daemon.root()).socket_path();

    let mut stream = UnixStream::connect(socket).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    writeln!(stream, r#"{{"type":"Move","id":"kb-1","status":"blocked"}}"#).unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert!(line.contains(r#""kind":"validation""#), "got {}", line);

    writeln!(stream, r#"{{"type":"Ping"}}"#).unwrap();
    line.clear();
    reader.read_line(&mut line).unwrap();
    assert!(line.contains("Pong"), "got {}", line);
}

#[test]
fn test_export_and_sync() {
    let daemon = RunningDaemon::start();
    let mut client = daemon.client();

    client
        .create(NewItem::new("Dated").with_due_date(chrono::NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()))
        .unwrap();

    let ics = client.export().unwrap();
    assert!(ics.contains("DTSTART;VALUE=DATE:20260501"));

    let report = client.sync().unwrap();
    assert!(report.all_ok(), "{:?}", report);
    let written = std::fs::read_to_string(daemon.root().join(".kanban").join("kanban.ics")).unwrap();
    assert!(written.contains("SUMMARY:Dated"));
}

/// Targets a collaborator that takes `seconds` per dated item.
fn slow_target_config(seconds: u32) -> String {
    format!(
        "targets:\n  - kind: command\n    name: slow\n    program: sleep\n    args: [\"{}\"]\n",
        seconds
    )
}

fn due_soon() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
}

#[test]
fn test_sync_outlasting_request_timeout_still_reports() {
    let daemon = RunningDaemon::start_with_config(Some(&slow_target_config(1)));
    let mut client = daemon.client();
    client.create(NewItem::new("Slow one").with_due_date(due_soon())).unwrap();
    client.create(NewItem::new("Slow two").with_due_date(due_soon())).unwrap();

    // Ordinary requests give up after this, a sync must not
    client.set_timeout(Some(Duration::from_millis(300))).unwrap();
    let report = client.sync().unwrap();

    assert!(report.all_ok(), "{:?}", report);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].target, "slow");

    // The short timeout is back in force for the next request
    client.ping().unwrap();
}

#[test]
fn test_slow_sync_does_not_block_mutations() {
    let daemon = RunningDaemon::start_with_config(Some(&slow_target_config(2)));
    daemon
        .client()
        .create(NewItem::new("Dated").with_due_date(due_soon()))
        .unwrap();

    let root = daemon.root().to_path_buf();
    let sync = std::thread::spawn(move || {
        let started = Instant::now();
        let report = Client::connect(&root, false).unwrap().sync().unwrap();
        (report, started.elapsed())
    });
    std::thread::sleep(Duration::from_millis(200));

    let mut client = daemon.client();
    let started = Instant::now();
    client.create(NewItem::new("While syncing")).unwrap();
    let create_took = started.elapsed();
    assert!(!sync.is_finished(), "sync finished before the create returned");

    let (report, sync_took) = sync.join().unwrap();
    assert!(report.all_ok(), "{:?}", report);
    assert!(create_took < Duration::from_secs(1), "create took {:?}", create_took);
    assert!(sync_took >= Duration::from_secs(2), "sync took {:?}", sync_took);
    assert_eq!(client.list(Filter::new()).unwrap().len(), 2);
}

#[test]
fn test_concurrent_clients_keep_top_priority_unique() {
    let daemon = RunningDaemon::start();

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let root = daemon.root().to_path_buf();
            std::thread::spawn(move || {
                let mut client = Client::connect(&root, false).unwrap();
                for i in 0..5 {
                    client
                        .create(NewItem::new(format!("Worker {} item {}", n, i)).with_priority(Priority::TopPriority))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut client = daemon.client();
    let items = client.list(Filter::new()).unwrap();
    assert_eq!(items.len(), 20);
    let tops = items.iter().filter(|i| i.priority == Priority::TopPriority).count();
    assert_eq!(tops, 1);
}
