//! kb - a single-board kanban tracker.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use kanban::{
    Client, Daemon, DaemonConfig, Filter, HistoryFilter, Item, ItemPatch, NewItem, Priority, Status, Store,
    is_daemon_running,
};
use log::info;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

mod backend;
mod cli;

use backend::Backend;
use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kanban")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("kanban.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_board_dir(cli: &Cli) -> PathBuf {
    cli.dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn format_status(status: Status) -> ColoredString {
    match status {
        Status::Todo => "todo".white(),
        Status::InProgress => "in_progress".yellow(),
        Status::Review => "review".magenta(),
        Status::Done => "done".green(),
    }
}

fn format_priority(priority: Priority) -> ColoredString {
    match priority {
        Priority::Low => "LOW".dimmed(),
        Priority::Medium => "MEDIUM".normal(),
        Priority::High => "HIGH".yellow(),
        Priority::TopPriority => "TOP_PRIORITY".red().bold(),
    }
}

fn print_line(item: &Item) {
    let tags = if item.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", item.tags.iter().cloned().collect::<Vec<_>>().join(", "))
    };
    let due = item.due_date.map(|d| format!(" due {}", d)).unwrap_or_default();
    println!(
        "{} {} {} {}{}{}",
        format_status(item.status),
        item.id.cyan(),
        format_priority(item.priority),
        item.title,
        due.blue(),
        tags.dimmed()
    );
}

fn print_item(item: &Item) {
    println!("{}: {}", "ID".bold(), item.id.cyan());
    println!("{}: {}", "Title".bold(), item.title);
    println!("{}: {}", "Status".bold(), format_status(item.status));
    println!("{}: {}", "Priority".bold(), format_priority(item.priority));
    if let Some(due) = item.due_date {
        println!("{}: {}", "Due".bold(), due);
    }
    if !item.tags.is_empty() {
        println!("{}: {}", "Tags".bold(), item.tags.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    if !item.description.is_empty() {
        println!("{}: {}", "Description".bold(), item.description);
    }
    println!("{}: {}", "Created".bold(), item.created_at);
    if let Some(completed_at) = item.completed_at {
        println!("{}: {}", "Completed".bold(), completed_at);
    }
    if let Some(hours) = item.hours_to_complete() {
        println!("{}: {:.1}h", "Time to complete".bold(), hours);
    }
}

fn history_filter(start: Option<chrono::NaiveDate>, end: Option<chrono::NaiveDate>, tag: Option<String>) -> HistoryFilter {
    HistoryFilter {
        start_date: start,
        end_date: end,
        tag,
        ..HistoryFilter::default()
    }
}

/// Tag list from `--tags`; `--tags ""` yields no tags.
fn non_empty_tags(tags: Vec<String>) -> BTreeSet<String> {
    tags.into_iter().filter(|tag| !tag.is_empty()).collect()
}

fn run(cli: Cli) -> Result<()> {
    let board_dir = get_board_dir(&cli);
    let local = cli.local;

    match cli.command {
        Command::Init => {
            Store::init(&board_dir).context("Failed to initialize board")?;
            println!("{} Initialized board in {}", "✓".green(), board_dir.display());
        }

        Command::Create {
            title,
            priority,
            status,
            due,
            tags,
            description,
        } => {
            let mut backend = Backend::open(&board_dir, local)?;
            let mut fields = NewItem::new(title)
                .with_priority(priority)
                .with_status(status)
                .with_tags(non_empty_tags(tags.unwrap_or_default()));
            if let Some(due) = due {
                fields = fields.with_due_date(due);
            }
            if let Some(description) = description {
                fields = fields.with_description(description);
            }

            let item = backend.create(fields).context("Failed to create item")?;
            println!("{} Created: {} {}", "✓".green(), item.id.cyan(), item.title);
        }

        Command::Get { id } => {
            let mut backend = Backend::open(&board_dir, local)?;
            match backend.get(&id)? {
                Some(item) => print_item(&item),
                None => {
                    eprintln!("{} Item not found: {}", "✗".red(), id);
                    std::process::exit(1);
                }
            }
        }

        Command::List {
            status,
            tags,
            min_priority,
            due_from,
            due_to,
            search,
            limit,
            offset,
        } => {
            let mut backend = Backend::open(&board_dir, local)?;
            let filter = Filter {
                status,
                tags,
                min_priority,
                due_from,
                due_to,
                title_contains: search,
                limit,
                offset,
            };

            let items = backend.list(filter).context("Failed to list items")?;
            if items.is_empty() {
                println!("{}", "No items found".dimmed());
            } else {
                for item in &items {
                    print_line(item);
                }
            }
        }

        Command::Board => {
            let mut backend = Backend::open(&board_dir, local)?;
            let columns = backend.board()?;

            for (status, mut items) in columns {
                println!("{} ({})", format_status(status).bold(), items.len());
                items.sort_by_key(|item| (std::cmp::Reverse(item.priority), item.created_at));
                for item in &items {
                    println!("  {} {} {}", item.id.cyan(), format_priority(item.priority), item.title);
                }
            }
        }

        Command::Update {
            id,
            title,
            description,
            status,
            priority,
            due,
            clear_due,
            tags,
        } => {
            let mut backend = Backend::open(&board_dir, local)?;
            let patch = ItemPatch {
                title,
                description,
                status,
                priority,
                due_date: if clear_due { Some(None) } else { due.map(Some) },
                tags: tags.map(non_empty_tags),
            };

            let item = backend.update(&id, patch).context("Failed to update item")?;
            println!("{} Updated: {} {}", "✓".green(), item.id.cyan(), item.title);
        }

        Command::Move { id, status } => {
            let mut backend = Backend::open(&board_dir, local)?;
            let item = backend.move_to(&id, status).context("Failed to move item")?;
            println!(
                "{} Moved: {} {} → {}",
                "→".blue(),
                item.id.cyan(),
                item.title,
                format_status(item.status)
            );
        }

        Command::Delete { id } => {
            let mut backend = Backend::open(&board_dir, local)?;
            match backend.delete(&id)? {
                Some(item) => println!("{} Deleted: {} {}", "✓".green(), item.id.cyan(), item.title),
                None => println!("{} Nothing to delete: {}", "-".dimmed(), id),
            }
        }

        Command::History {
            start,
            end,
            tag,
            limit,
            offset,
        } => {
            let mut backend = Backend::open(&board_dir, local)?;
            let limit = match limit {
                Some(limit) => limit,
                None => backend.history_page_size(&board_dir)?,
            };
            let filter = history_filter(start, end, tag).page(offset, limit);

            let page = backend.history(filter).context("Failed to load history")?;
            if page.items.is_empty() {
                println!("{}", "No completed items".dimmed());
            } else {
                println!(
                    "{} Showing {}-{} of {} completed item(s)",
                    "✓".green(),
                    page.offset + 1,
                    page.offset + page.items.len(),
                    page.total
                );
                for item in &page.items {
                    let completed = item
                        .completed_at
                        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    let hours = item.hours_to_complete().map(|h| format!(" ({:.1}h)", h)).unwrap_or_default();
                    println!("  {} {} {}{}", completed.dimmed(), item.id.cyan(), item.title, hours.dimmed());
                }
            }
        }

        Command::Stats { start, end, tag } => {
            let mut backend = Backend::open(&board_dir, local)?;
            let stats = backend.stats(history_filter(start, end, tag))?;

            println!("{}: {}", "Completed".bold(), stats.total_completed);
            println!("{}: {}", "This week".bold(), stats.completed_this_week);
            println!("{}: {}", "This month".bold(), stats.completed_this_month);
            println!("{}: {:.1}h", "Avg time to complete".bold(), stats.avg_hours_to_complete);
            for (priority, count) in &stats.by_priority {
                println!("  {} {}", format_priority(*priority), count);
            }
        }

        Command::Summary => {
            let mut backend = Backend::open(&board_dir, local)?;
            let summary = backend.summary()?;

            println!("{}: {}", "Items".bold(), summary.total_items);
            for (status, count) in &summary.counts {
                let top = summary
                    .top_priority
                    .get(status)
                    .and_then(|id| id.as_deref())
                    .map(|id| format!(" top: {}", id))
                    .unwrap_or_default();
                println!("  {} {}{}", format_status(*status), count, top.red());
            }
        }

        Command::Export { output } => {
            let mut backend = Backend::open(&board_dir, local)?;
            let ics = backend.export()?;
            match output {
                Some(path) => {
                    fs::write(&path, ics).wrap_err_with(|| format!("Failed to write {}", path.display()))?;
                    println!("{} Exported calendar to {}", "✓".green(), path.display());
                }
                None => print!("{}", ics),
            }
        }

        Command::Sync => {
            let mut backend = Backend::open(&board_dir, local)?;
            let report = backend.sync()?;

            for outcome in &report.outcomes {
                if outcome.ok {
                    println!("{} {}: {}", "✓".green(), outcome.target, outcome.message);
                } else {
                    println!("{} {}: {}", "✗".red(), outcome.target, outcome.message);
                }
            }
            if !report.all_ok() {
                std::process::exit(1);
            }
        }

        Command::Daemon => {
            println!("{} Starting daemon for {}", "→".blue(), board_dir.display());

            let config = DaemonConfig::new(&board_dir);
            let mut daemon = Daemon::new(config).context("Failed to create daemon")?;

            let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            rt.block_on(async { daemon.run().await }).context("Daemon error")?;
        }

        Command::DaemonStop => {
            if !is_daemon_running(&board_dir) {
                println!("{} Daemon is not running", "✗".red());
                std::process::exit(1);
            }

            let mut client = Client::connect(&board_dir, false).context("Failed to connect to daemon")?;
            client.shutdown().context("Failed to shutdown daemon")?;
            println!("{} Daemon stopped", "✓".green());
        }

        Command::DaemonStatus => {
            if is_daemon_running(&board_dir) {
                println!("{} Daemon is running", "✓".green());

                if let Ok(mut client) = Client::connect(&board_dir, false)
                    && client.ping().is_ok()
                {
                    println!("  {} Responding to requests", "✓".green());
                }
            } else {
                println!("{} Daemon is not running", "✗".red());
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tag_argument_means_no_tags() {
        let cli = Cli::try_parse_from(["kb", "create", "Task", "--tags", ""]).unwrap();
        let Command::Create { tags, .. } = cli.command else {
            panic!("expected create");
        };
        assert!(non_empty_tags(tags.unwrap_or_default()).is_empty());

        let cli = Cli::try_parse_from(["kb", "update", "kb-1", "--tags", "a,,b"]).unwrap();
        let Command::Update { tags, .. } = cli.command else {
            panic!("expected update");
        };
        let tags = non_empty_tags(tags.unwrap_or_default());
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_create_with_empty_tag_argument_succeeds() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut store = Store::init(temp_dir.path()).unwrap();

        let item = store
            .create(NewItem::new("Task").with_tags(non_empty_tags(vec![String::new()])))
            .unwrap();
        assert!(item.tags.is_empty());
    }
}
