//! Client for connecting to the kanban daemon.

use crate::calendar::SyncReport;
use crate::daemon::{DaemonConfig, is_daemon_running, start_daemon};
use crate::history::{BoardSummary, CompletionStats, HistoryFilter, HistoryPage};
use crate::protocol::{ErrorKind, Request, Response};
use crate::query::Filter;
use crate::types::{Item, ItemPatch, NewItem, Status};
use eyre::{Context, Result, bail};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// An error reported by the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}

/// How long an ordinary request may wait for its reply.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for communicating with the kanban daemon.
pub struct Client {
    root: PathBuf,
    stream: UnixStream,
    timeout: Option<Duration>,
}

impl Client {
    /// Connect to the daemon, optionally auto-starting it if not running.
    pub fn connect(root: &Path, auto_start: bool) -> Result<Self> {
        let config = DaemonConfig::new(root);
        let socket_path = config.socket_path();

        let stream = match UnixStream::connect(&socket_path) {
            Ok(stream) => stream,
            Err(_) if auto_start => {
                if !is_daemon_running(root) {
                    start_daemon(root).context("Failed to auto-start daemon")?;

                    let mut attempts = 0;
                    loop {
                        if attempts > 20 {
                            bail!("Daemon failed to start in time");
                        }
                        std::thread::sleep(Duration::from_millis(50));
                        if let Ok(stream) = UnixStream::connect(&socket_path) {
                            break stream;
                        }
                        attempts += 1;
                    }
                } else {
                    UnixStream::connect(&socket_path).context("Failed to connect to daemon")?
                }
            }
            Err(e) => {
                bail!("Failed to connect to daemon: {}. Is it running?", e);
            }
        };

        stream
            .set_read_timeout(Some(REQUEST_TIMEOUT))
            .context("Failed to set read timeout")?;

        Ok(Self {
            root: root.to_path_buf(),
            stream,
            timeout: Some(REQUEST_TIMEOUT),
        })
    }

    /// Change the reply timeout for ordinary requests. `None` waits forever.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.stream
            .set_read_timeout(timeout)
            .context("Failed to set read timeout")?;
        self.timeout = timeout;
        Ok(())
    }

    /// Get the board root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Send a request and receive a response.
    pub fn request(&mut self, request: Request) -> Result<Response> {
        let request_json = serde_json::to_string(&request)?;
        writeln!(self.stream, "{}", request_json)?;
        self.stream.flush()?;

        let mut reader = BufReader::new(&self.stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line)?;
        if response_line.is_empty() {
            bail!("Daemon closed the connection");
        }

        let response: Response = serde_json::from_str(&response_line).context("Failed to parse response")?;
        Ok(response)
    }

    pub fn create(&mut self, item: NewItem) -> Result<Item> {
        match self.request(Request::Create { item })? {
            Response::Item { item } => Ok(item),
            other => Err(unexpected(other)),
        }
    }

    pub fn get(&mut self, id: &str) -> Result<Option<Item>> {
        match self.request(Request::Get { id: id.to_string() })? {
            Response::Item { item } => Ok(Some(item)),
            Response::NotFound { .. } => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    pub fn list(&mut self, filter: Filter) -> Result<Vec<Item>> {
        match self.request(Request::List { filter })? {
            Response::Items { items } => Ok(items),
            other => Err(unexpected(other)),
        }
    }

    pub fn board(&mut self) -> Result<BTreeMap<Status, Vec<Item>>> {
        match self.request(Request::Board)? {
            Response::Board { columns } => Ok(columns),
            other => Err(unexpected(other)),
        }
    }

    pub fn update(&mut self, id: &str, patch: ItemPatch) -> Result<Item> {
        match self.request(Request::Update {
            id: id.to_string(),
            patch,
        })? {
            Response::Item { item } => Ok(item),
            other => Err(unexpected(other)),
        }
    }

    /// Delete an item. `None` when it was already gone.
    pub fn delete(&mut self, id: &str) -> Result<Option<Item>> {
        match self.request(Request::Delete { id: id.to_string() })? {
            Response::Deleted { item } => Ok(Some(item)),
            Response::NotFound { .. } => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    pub fn move_to(&mut self, id: &str, status: Status) -> Result<Item> {
        match self.request(Request::Move {
            id: id.to_string(),
            status,
        })? {
            Response::Item { item } => Ok(item),
            other => Err(unexpected(other)),
        }
    }

    pub fn history(&mut self, filter: HistoryFilter) -> Result<HistoryPage> {
        match self.request(Request::History { filter })? {
            Response::History { page } => Ok(page),
            other => Err(unexpected(other)),
        }
    }

    pub fn stats(&mut self, filter: HistoryFilter) -> Result<CompletionStats> {
        match self.request(Request::Stats { filter })? {
            Response::Stats { stats } => Ok(stats),
            other => Err(unexpected(other)),
        }
    }

    pub fn summary(&mut self) -> Result<BoardSummary> {
        match self.request(Request::Summary)? {
            Response::Summary { summary } => Ok(summary),
            other => Err(unexpected(other)),
        }
    }

    /// The board as an iCalendar document.
    pub fn export(&mut self) -> Result<String> {
        match self.request(Request::Export)? {
            Response::Calendar { ics } => Ok(ics),
            other => Err(unexpected(other)),
        }
    }

    /// Push dated items to every configured target.
    ///
    /// Collaborators may be slow, so the reply is awaited without a timeout.
    pub fn sync(&mut self) -> Result<SyncReport> {
        self.stream
            .set_read_timeout(None)
            .context("Failed to clear read timeout")?;
        let response = self.request(Request::Sync);
        self.stream
            .set_read_timeout(self.timeout)
            .context("Failed to restore read timeout")?;

        match response? {
            Response::Sync { report } => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    /// Shutdown the daemon.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.request(Request::Shutdown)? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        match self.request(Request::Ping)? {
            Response::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> eyre::Report {
    match response {
        Response::Error { kind, message } => eyre::eyre!(RemoteError { kind, message }),
        Response::NotFound { id } => eyre::eyre!(RemoteError {
            kind: ErrorKind::NotFound,
            message: format!("item not found: {}", id),
        }),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}
