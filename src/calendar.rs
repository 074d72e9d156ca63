//! Calendar export: iCalendar rendering and sync targets.
//!
//! Rendering is a pure projection of the items that carry a due date. Sync
//! targets receive a snapshot of the items, never the store itself, so a slow
//! or failing collaborator cannot hold up board mutations.

use crate::storage::atomic_write;
use crate::types::Item;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

/// Product identifier written into every calendar.
pub const PRODID: &str = "-//Kanban//Board Export//EN";

/// RFC 5545 content lines are folded after this many octets.
const MAX_LINE_OCTETS: usize = 75;

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_FORMAT: &str = "%Y%m%d";

/// Render every item with a due date as an all-day VEVENT.
pub fn render_calendar(items: &[Item], calendar_name: &str, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", PRODID),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(calendar_name)),
    ];

    let mut dated: Vec<&Item> = items.iter().filter(|item| item.due_date.is_some()).collect();
    dated.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));

    for item in dated {
        let Some(due) = item.due_date else { continue };
        lines.extend([
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}@kanban", item.id),
            format!("DTSTAMP:{}", now.format(STAMP_FORMAT)),
            format!("CREATED:{}", item.created_at.format(STAMP_FORMAT)),
            format!("SUMMARY:{}", escape_text(&item.title)),
            format!("DESCRIPTION:{}", escape_text(&item.description)),
            format!("DTSTART;VALUE=DATE:{}", due.format(DATE_FORMAT)),
            format!("DTEND;VALUE=DATE:{}", (due + Duration::days(1)).format(DATE_FORMAT)),
            format!("CATEGORIES:{}", item.priority),
            format!("X-KANBAN-STATUS:{}", item.status),
            "END:VEVENT".to_string(),
        ]);
    }

    lines.push("END:VCALENDAR".to_string());

    let mut out = String::new();
    for line in lines {
        out.push_str(&fold_line(&line));
        out.push_str("\r\n");
    }
    out
}

/// Escape a TEXT property value.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

/// Fold a content line so no physical line exceeds 75 octets.
fn fold_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += len;
    }
    out
}

/// Why a sync target failed.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The calendar document could not be written.
    Write { path: PathBuf, message: String },
    /// The collaborator program could not be started.
    Spawn { program: String, message: String },
    /// The collaborator ran but rejected some items.
    Rejected {
        program: String,
        synced: usize,
        failures: Vec<(String, String)>,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Write { path, message } => {
                write!(f, "failed to write {}: {}", path.display(), message)
            }
            SyncError::Spawn { program, message } => write!(f, "failed to run '{}': {}", program, message),
            SyncError::Rejected {
                program,
                synced,
                failures,
            } => {
                write!(
                    f,
                    "'{}' rejected {} item(s), synced {}",
                    program,
                    failures.len(),
                    synced
                )?;
                if let Some((id, reason)) = failures.first() {
                    write!(f, " (first: {}: {})", id, reason)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for SyncError {}

/// A destination the board can be pushed to.
pub trait SyncTarget: Send + Sync {
    /// Name shown in sync reports.
    fn name(&self) -> &str;

    /// Push the items. `calendar` is the rendered iCalendar document.
    fn sync(&self, items: &[Item], calendar: &str) -> Result<String, SyncError>;
}

/// Writes the rendered calendar to a file that calendar apps can subscribe to.
#[derive(Debug, Clone)]
pub struct IcalFileTarget {
    name: String,
    path: PathBuf,
}

impl IcalFileTarget {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl SyncTarget for IcalFileTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn sync(&self, items: &[Item], calendar: &str) -> Result<String, SyncError> {
        let write_error = |e: std::io::Error| SyncError::Write {
            path: self.path.clone(),
            message: e.to_string(),
        };

        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(write_error)?;
        }
        atomic_write(&self.path, calendar.as_bytes()).map_err(write_error)?;

        let events = items.iter().filter(|item| item.due_date.is_some()).count();
        Ok(format!("wrote {} event(s) to {}", events, self.path.display()))
    }
}

/// Hands each dated item to an external collaborator program.
///
/// Arguments may contain `{id}`, `{title}`, `{summary}`, `{description}`,
/// `{due_date}`, `{priority}` and `{status}` placeholders.
#[derive(Debug, Clone)]
pub struct CommandTarget {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandTarget {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }

    fn expand(&self, item: &Item) -> Vec<String> {
        let due = item.due_date.map(|d| d.to_string()).unwrap_or_default();
        let summary = format!("[{}] {}", item.priority, item.title);
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{id}", &item.id)
                    .replace("{title}", &item.title)
                    .replace("{summary}", &summary)
                    .replace("{description}", &item.description)
                    .replace("{due_date}", &due)
                    .replace("{priority}", item.priority.as_str())
                    .replace("{status}", item.status.as_str())
            })
            .collect()
    }
}

impl SyncTarget for CommandTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn sync(&self, items: &[Item], _calendar: &str) -> Result<String, SyncError> {
        let mut synced = 0;
        let mut failures = Vec::new();

        for item in items.iter().filter(|item| item.due_date.is_some()) {
            let output = Command::new(&self.program)
                .args(self.expand(item))
                .output()
                .map_err(|e| SyncError::Spawn {
                    program: self.program.clone(),
                    message: e.to_string(),
                })?;

            if output.status.success() {
                synced += 1;
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let reason = if stderr.is_empty() {
                    format!("exit status {}", output.status)
                } else {
                    stderr
                };
                log::warn!("{}: '{}' failed for {}: {}", self.name, self.program, item.id, reason);
                failures.push((item.id.clone(), reason));
            }
        }

        if failures.is_empty() {
            Ok(format!("synced {} item(s) via {}", synced, self.program))
        } else {
            Err(SyncError::Rejected {
                program: self.program.clone(),
                synced,
                failures,
            })
        }
    }
}

/// Result of one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub target: String,
    pub ok: bool,
    pub message: String,
}

/// Per-target results of a sync run. One failing target never hides another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.ok)
    }
}

/// Render the calendar once and push it to every target concurrently.
pub fn sync_all(targets: &[Box<dyn SyncTarget>], items: &[Item], calendar_name: &str, now: DateTime<Utc>) -> SyncReport {
    let rendered = render_calendar(items, calendar_name, now);
    let calendar = rendered.as_str();

    let results: Vec<Result<String, SyncError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| scope.spawn(move || target.sync(items, calendar)))
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(SyncError::Spawn {
                        program: "sync worker".to_string(),
                        message: "panicked".to_string(),
                    })
                })
            })
            .collect()
    });

    let outcomes = targets
        .iter()
        .zip(results)
        .map(|(target, result)| match result {
            Ok(message) => {
                log::info!("Sync to {} succeeded: {}", target.name(), message);
                SyncOutcome {
                    target: target.name().to_string(),
                    ok: true,
                    message,
                }
            }
            Err(e) => {
                log::warn!("Sync to {} failed: {}", target.name(), e);
                SyncOutcome {
                    target: target.name().to_string(),
                    ok: false,
                    message: e.to_string(),
                }
            }
        })
        .collect();

    SyncReport { outcomes }
}
