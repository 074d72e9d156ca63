//! Background daemon serving one board over a Unix socket.
//!
//! The daemon is the single owner of the store. Requests from every
//! connection are funneled through one channel into the main loop, so board
//! mutations are applied strictly one at a time. Sync runs off the main loop
//! on a snapshot of the items.

use crate::calendar::{render_calendar, sync_all};
use crate::config::BoardConfig;
use crate::history::StoreHistoryExt;
use crate::protocol::{ErrorKind, Request, Response};
use crate::storage::KANBAN_DIR;
use crate::store::Store;
use eyre::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

/// Socket file name within the .kanban directory.
const SOCKET_FILE: &str = "daemon.sock";

/// PID file name within the .kanban directory.
const PID_FILE: &str = "daemon.pid";

/// Pending requests buffered between connections and the main loop.
const REQUEST_QUEUE_DEPTH: usize = 100;

/// How often the accept loop checks for shutdown.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

type Envelope = (Request, mpsc::Sender<Response>);

/// Configuration for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root directory containing .kanban
    pub root: PathBuf,
}

impl DaemonConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join(KANBAN_DIR).join(SOCKET_FILE)
    }

    /// Get the PID file path.
    pub fn pid_path(&self) -> PathBuf {
        self.root.join(KANBAN_DIR).join(PID_FILE)
    }
}

/// The kanban daemon.
pub struct Daemon {
    config: DaemonConfig,
    board: BoardConfig,
    store: Store,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Open the board at `config.root` and its config file.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let store = Store::open(&config.root).context("Failed to open store")?;
        let board = BoardConfig::load(&config.root).context("Failed to load board config")?;
        Ok(Self::with_store(config, board, store))
    }

    /// Serve an already-open store.
    pub fn with_store(config: DaemonConfig, board: BoardConfig, store: Store) -> Self {
        Self {
            config,
            board,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a shutdown handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the daemon until a Shutdown request arrives.
    pub async fn run(&mut self) -> Result<()> {
        // Clean up any stale socket
        let socket_path = self.config.socket_path();
        if socket_path.exists() {
            fs::remove_file(&socket_path).ok();
        }

        let pid_path = self.config.pid_path();
        fs::write(&pid_path, std::process::id().to_string()).context("Failed to write PID file")?;

        let listener = UnixListener::bind(&socket_path).context("Failed to bind to Unix socket")?;

        log::info!("Daemon listening on {:?}", socket_path);

        let (tx, mut rx) = mpsc::channel::<Envelope>(REQUEST_QUEUE_DEPTH);

        let shutdown_flag = Arc::clone(&self.shutdown);
        tokio::spawn(async move {
            Self::accept_connections(listener, tx, shutdown_flag).await;
        });

        while let Some((request, response_tx)) = rx.recv().await {
            match request {
                Request::Sync => self.spawn_sync(response_tx.clone()),
                request => {
                    let response = self.handle_request(request);
                    let _ = response_tx.send(response).await;
                }
            }

            if self.shutdown.load(Ordering::Relaxed) {
                // The reply must reach the requester before the runtime goes away
                response_tx.closed().await;
                log::info!("Daemon shutting down");
                break;
            }
        }

        fs::remove_file(&socket_path).ok();
        fs::remove_file(&pid_path).ok();

        Ok(())
    }

    /// Accept connections in a background task.
    async fn accept_connections(listener: UnixListener, tx: mpsc::Sender<Envelope>, shutdown: Arc<AtomicBool>) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let tx_clone = tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, tx_clone).await {
                                log::warn!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        log::error!("Accept error: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                _ = tokio::time::sleep(SHUTDOWN_POLL_INTERVAL) => {}
            }
        }
    }

    /// Handle a single client connection.
    async fn handle_connection(stream: UnixStream, tx: mpsc::Sender<Envelope>) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await.context("Failed to read line")? {
            if line.trim().is_empty() {
                continue;
            }

            let request: Request = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    log::warn!("Rejected malformed request: {}", e);
                    let response = Response::error(ErrorKind::Validation, format!("malformed request: {}", e));
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            let is_shutdown = matches!(request, Request::Shutdown);

            let (resp_tx, mut resp_rx) = mpsc::channel(1);
            tx.send((request, resp_tx))
                .await
                .context("Failed to send request to daemon")?;

            if let Some(response) = resp_rx.recv().await {
                write_response(&mut writer, &response).await?;
            }

            if is_shutdown {
                break;
            }
        }

        Ok(())
    }

    /// Run every sync target on a blocking worker and reply when done.
    fn spawn_sync(&self, response_tx: mpsc::Sender<Response>) {
        let items = self.store.items().to_vec();
        let targets = self.board.build_targets(&self.config.root);
        let calendar_name = self.board.calendar_name.clone();
        let now = self.store.now();

        log::info!("Syncing {} items to {} target(s)", items.len(), targets.len());

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || sync_all(&targets, &items, &calendar_name, now)).await;
            let response = match result {
                Ok(report) => Response::Sync { report },
                Err(e) => Response::error(ErrorKind::Internal, format!("sync worker failed: {}", e)),
            };
            let _ = response_tx.send(response).await;
        });
    }

    /// Handle a single request against the store.
    fn handle_request(&mut self, request: Request) -> Response {
        match request {
            Request::Create { item } => match self.store.create(item) {
                Ok(item) => Response::Item { item },
                Err(e) => Response::from_report(&e),
            },

            Request::Get { id } => match self.store.get(&id) {
                Some(item) => Response::Item { item },
                None => Response::NotFound { id },
            },

            Request::List { filter } => Response::Items {
                items: self.store.list(&filter),
            },

            Request::Board => Response::Board {
                columns: self.store.by_status(),
            },

            Request::Update { id, patch } => match self.store.update(&id, patch) {
                Ok(item) => Response::Item { item },
                Err(e) => Response::from_report(&e),
            },

            Request::Delete { id } => match self.store.delete(&id) {
                Ok(Some(item)) => Response::Deleted { item },
                Ok(None) => Response::NotFound { id },
                Err(e) => Response::from_report(&e),
            },

            Request::Move { id, status } => match self.store.move_to(&id, status) {
                Ok(item) => Response::Item { item },
                Err(e) => Response::from_report(&e),
            },

            Request::History { filter } => Response::History {
                page: self.store.history(&filter),
            },

            Request::Stats { filter } => Response::Stats {
                stats: self.store.stats(&filter),
            },

            Request::Summary => Response::Summary {
                summary: self.store.summary(),
            },

            Request::Export => Response::Calendar {
                ics: render_calendar(self.store.items(), &self.board.calendar_name, self.store.now()),
            },

            Request::Sync => Response::error(ErrorKind::Internal, "sync is handled by the main loop"),

            Request::Shutdown => {
                self.shutdown.store(true, Ordering::Relaxed);
                Response::Ok
            }

            Request::Ping => Response::Pong,
        }
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let mut json = serde_json::to_string(response)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Check if a daemon is running for the board at `root`.
pub fn is_daemon_running(root: &Path) -> bool {
    let config = DaemonConfig::new(root);
    let socket_path = config.socket_path();
    let pid_path = config.pid_path();

    if !socket_path.exists() {
        return false;
    }

    if let Ok(pid_str) = fs::read_to_string(&pid_path)
        && let Ok(pid) = pid_str.trim().parse::<i32>()
    {
        // Signal 0 checks for existence without delivering anything
        unsafe {
            if libc::kill(pid, 0) == 0 {
                return true;
            }
        }
    }

    // Stale socket, clean up
    fs::remove_file(&socket_path).ok();
    fs::remove_file(&pid_path).ok();
    false
}

/// Start the daemon as a background process.
pub fn start_daemon(root: &Path) -> Result<()> {
    use std::process::Command;

    let exe = std::env::current_exe().context("Failed to get current executable")?;

    Command::new(exe)
        .arg("--dir")
        .arg(root)
        .arg("daemon")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to spawn daemon process")?;

    std::thread::sleep(Duration::from_millis(100));

    Ok(())
}
