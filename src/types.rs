//! Core data types for the kanban board.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 500;

/// A single card on the board. The only persisted entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Unique identifier: "kb-" + 10 hex chars, immutable once assigned
    pub id: String,

    /// Short description of the work
    pub title: String,

    /// Column the item sits in
    pub status: Status,

    /// Ordering within the column
    pub priority: Priority,

    /// Optional due date (YYYY-MM-DD)
    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    /// Longer free-form description
    #[serde(default)]
    pub description: String,

    /// When created
    pub created_at: DateTime<Utc>,

    /// When the item last entered the done column
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Seconds from created_at to completed_at
    #[serde(default)]
    pub time_to_complete: Option<i64>,

    /// Freeform tags for filtering
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// The four fixed board columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl Status {
    /// All columns in board order.
    pub const ALL: [Status; 4] = [Status::Todo, Status::InProgress, Status::Review, Status::Done];

    /// Wire name of the column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in_progress",
            Status::Review => "review",
            Status::Done => "done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    /// Accepts the wire names case-insensitively ("done", "IN_PROGRESS").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::InvalidStatus(s.to_string()))
    }
}

/// Priority levels, lowest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    TopPriority,
}

impl Priority {
    /// All levels, lowest first.
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::TopPriority];

    /// Wire name of the priority.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::TopPriority => "TOP_PRIORITY",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    /// Accepts the wire names case-insensitively ("HIGH", "high", "top_priority").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::InvalidPriority(s.to_string()))
    }
}

/// Parse a due date in ISO format (YYYY-MM-DD).
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

/// Validation errors for items.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyTitle,
    TitleTooLong,
    InvalidCharacters,
    InvalidTag(String),
    InvalidStatus(String),
    InvalidPriority(String),
    InvalidDate(String),
    CompletedWithoutDoneStatus,
    DoneWithoutCompletion,
    CompletedBeforeCreated,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyTitle => write!(f, "title cannot be empty"),
            ValidationError::TitleTooLong => write!(f, "title exceeds {} characters", MAX_TITLE_LEN),
            ValidationError::InvalidCharacters => write!(f, "title contains control characters"),
            ValidationError::InvalidTag(tag) => {
                write!(
                    f,
                    "invalid tag '{}': must be alphanumeric with hyphens/underscores",
                    tag
                )
            }
            ValidationError::InvalidStatus(s) => {
                write!(f, "invalid status '{}': expected todo, in_progress, review or done", s)
            }
            ValidationError::InvalidPriority(s) => {
                write!(
                    f,
                    "invalid priority '{}': expected LOW, MEDIUM, HIGH or TOP_PRIORITY",
                    s
                )
            }
            ValidationError::InvalidDate(s) => write!(f, "invalid date '{}': expected YYYY-MM-DD", s),
            ValidationError::CompletedWithoutDoneStatus => {
                write!(f, "completion fields set but status is not done")
            }
            ValidationError::DoneWithoutCompletion => write!(f, "status is done but completion fields are missing"),
            ValidationError::CompletedBeforeCreated => write!(f, "completed_at cannot be before created_at"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl Item {
    /// Validate the item's fields and completion bookkeeping.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_tags(&self.tags)?;

        if self.status == Status::Done {
            match self.completed_at {
                Some(completed_at) if completed_at < self.created_at => {
                    return Err(ValidationError::CompletedBeforeCreated);
                }
                Some(_) if self.time_to_complete.is_some() => {}
                _ => return Err(ValidationError::DoneWithoutCompletion),
            }
        } else if self.completed_at.is_some() || self.time_to_complete.is_some() {
            return Err(ValidationError::CompletedWithoutDoneStatus);
        }

        Ok(())
    }

    /// Whether the item sits in the done column.
    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    /// Move the item to `status`, keeping the completion fields in step.
    ///
    /// Entering done stamps `completed_at` and `time_to_complete`; leaving it
    /// clears both. Staying in the same column touches nothing.
    pub fn set_status(&mut self, status: Status, now: DateTime<Utc>) {
        if status == self.status {
            return;
        }

        if status == Status::Done {
            let completed_at = now.max(self.created_at);
            self.completed_at = Some(completed_at);
            self.time_to_complete = Some((completed_at - self.created_at).num_seconds());
        } else if self.status == Status::Done {
            self.completed_at = None;
            self.time_to_complete = None;
        }

        self.status = status;
    }

    /// Time to complete in hours, if the item is done.
    pub fn hours_to_complete(&self) -> Option<f64> {
        self.time_to_complete.map(|secs| secs as f64 / 3600.0)
    }

    /// Whether the item carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    // Title: required, 1-500 chars, no control characters
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong);
    }
    if title.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidCharacters);
    }
    Ok(())
}

fn validate_tags(tags: &BTreeSet<String>) -> Result<(), ValidationError> {
    // Tags: alphanumeric + hyphens/underscores, no spaces
    for tag in tags {
        if tag.is_empty() || !tag.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(ValidationError::InvalidTag(tag.clone()));
        }
    }
    Ok(())
}

/// Fields accepted when creating an item.
///
/// Identifier and timestamps are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: Status,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl NewItem {
    /// Fields for a todo item of medium priority.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial update. `None` leaves a field untouched.
///
/// `due_date` is doubly optional: `Some(None)` clears the date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<NaiveDate>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
}

impl ItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Distinguishes an explicit `null` (clear) from an absent field (keep).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
