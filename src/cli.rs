//! CLI argument parsing for kb.

use clap::{Parser, Subcommand};
use chrono::NaiveDate;
use kanban::{Priority, Status, parse_date};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kb",
    about = "A single-board kanban tracker with completion history and calendar sync",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/kanban/logs/kanban.log"
)]
pub struct Cli {
    /// Path to the board directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    /// Never route through a running daemon
    #[arg(long, global = true)]
    pub local: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new board in the current directory
    Init,

    /// Create a new item
    Create {
        /// Item title
        title: String,

        /// Priority (low, medium, high, top_priority)
        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        /// Initial column (todo, in_progress, review, done)
        #[arg(short, long, default_value = "todo")]
        status: Status,

        /// Due date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        due: Option<NaiveDate>,

        /// Tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Description
        #[arg(short = 'D', long)]
        description: Option<String>,
    },

    /// Show an item by ID
    Get {
        /// Item ID
        id: String,
    },

    /// List items, highest priority first
    List {
        /// Only this column
        #[arg(short, long)]
        status: Option<Status>,

        /// Only items carrying every listed tag (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Only items at or above this priority
        #[arg(long)]
        min_priority: Option<Priority>,

        /// Only items due on or after this date
        #[arg(long, value_parser = parse_date)]
        due_from: Option<NaiveDate>,

        /// Only items due on or before this date
        #[arg(long, value_parser = parse_date)]
        due_to: Option<NaiveDate>,

        /// Case-insensitive title search
        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        offset: Option<usize>,
    },

    /// Show every column of the board
    Board,

    /// Update fields of an item
    Update {
        /// Item ID
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short = 'D', long)]
        description: Option<String>,

        #[arg(short, long)]
        status: Option<Status>,

        #[arg(short, long)]
        priority: Option<Priority>,

        /// New due date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// Replace all tags (comma-separated, empty to clear)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },

    /// Move an item to another column
    Move {
        /// Item ID
        id: String,

        /// Target column (todo, in_progress, review, done)
        status: Status,
    },

    /// Delete an item
    Delete {
        /// Item ID
        id: String,
    },

    /// Show completed items, most recent first
    History {
        /// Completed on or after (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// Completed on or before (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        #[arg(short, long)]
        tag: Option<String>,

        /// Page size (default from config)
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show completion statistics
    Stats {
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Show per-column counts and top-priority items
    Summary,

    /// Print the board as an iCalendar document
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Push dated items to every configured sync target
    Sync,

    /// Run the daemon in foreground
    Daemon,

    /// Stop the running daemon
    DaemonStop,

    /// Check daemon status
    DaemonStatus,
}
