use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn value(self) -> u8 {
        match self {
            TaskPriority::Low => 1,
            TaskPriority::Medium => 2,
            TaskPriority::High => 3,
            TaskPriority::Urgent => 4,
        }
    }

    /// Unknown values map to `Medium`.
    pub fn from_value(value: i64) -> Self {
        match value {
            1 => TaskPriority::Low,
            3 => TaskPriority::High,
            4 => TaskPriority::Urgent,
            _ => TaskPriority::Medium,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
            TaskPriority::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    /// Accepts names (any case) or the numeric value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(TaskPriority::Low),
            "medium" | "2" => Ok(TaskPriority::Medium),
            "high" | "3" => Ok(TaskPriority::High),
            "urgent" | "4" => Ok(TaskPriority::Urgent),
            other => Err(format!("unknown priority `{other}` (expected low, medium, high, or urgent)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// A to-do item. Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub priority: TaskPriority,
    pub category: String,
    pub due_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub progress: u8,
    pub location: Option<GeoLocation>,
    pub user_id: String,
    pub is_encrypted: bool,
    pub last_accessed_at: Option<i64>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            is_completed: false,
            priority: TaskPriority::Medium,
            category: String::new(),
            due_date: None,
            created_at: 0,
            updated_at: None,
            progress: 0,
            location: None,
            user_id: String::new(),
            is_encrypted: true,
            last_accessed_at: None,
        }
    }
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn is_done(&self) -> bool {
        self.is_completed
    }

    pub fn has_sensitive_data(&self) -> bool {
        !self.title.is_empty() || !self.description.is_empty()
    }

    pub fn is_overdue(&self, now_millis: i64) -> bool {
        matches!(self.due_date, Some(due) if due < now_millis) && !self.is_completed
    }

    /// Whole days since creation; zero for tasks created in the future.
    pub fn age_in_days(&self, now_millis: i64) -> i64 {
        (now_millis.saturating_sub(self.created_at) / MILLIS_PER_DAY).max(0)
    }
}
