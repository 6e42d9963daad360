//! Todo items embedded in notes

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::id::TodoId;

/// Todo priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// A task owned by its parent note.
///
/// Serialized with the backend's embedded JSON shape (`dueDate` in camel
/// case, `YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: TodoId,
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(
        rename = "dueDate",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_due_date"
    )]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
}

impl TodoItem {
    /// Create an open todo with medium priority and no due date
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: TodoId::new(),
            text: text.into(),
            done: false,
            due_date: None,
            priority: Priority::Medium,
        }
    }

    /// The placeholder task appended by "add task": due today.
    #[must_use]
    pub fn new_task() -> Self {
        Self {
            due_date: Some(chrono::Local::now().date_naive()),
            ..Self::new("New task")
        }
    }

    /// Shallow-merge a partial update into this item.
    pub fn apply(&mut self, patch: &TodoPatch) {
        if let Some(text) = &patch.text {
            self.text.clone_from(text);
        }
        if let Some(done) = patch.done {
            self.done = done;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
    }
}

/// Partial update for a [`TodoItem`]. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub done: Option<bool>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Priority>,
}

impl TodoPatch {
    #[must_use]
    pub fn done(done: bool) -> Self {
        Self {
            done: Some(done),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.done.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
    }
}

// Date inputs clear to "" rather than null.
fn deserialize_due_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let value = value.trim();
        let date_part = value.get(..10).unwrap_or(value);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_task_defaults() {
        let todo = TodoItem::new_task();
        assert_eq!(todo.text, "New task");
        assert!(!todo.done);
        assert_eq!(todo.priority, Priority::Medium);
        assert!(todo.due_date.is_some());
    }

    #[test]
    fn deserializes_backend_shape() {
        let raw = r#"{"id":"11111111-1111-7111-8111-111111111111","text":"buy milk","done":true,"dueDate":"2024-03-05","priority":"high"}"#;
        let todo: TodoItem = serde_json::from_str(raw).unwrap();
        assert_eq!(todo.text, "buy milk");
        assert!(todo.done);
        assert_eq!(todo.due_date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(todo.priority, Priority::High);
    }

    #[test]
    fn empty_due_date_reads_as_none() {
        let raw = r#"{"id":"11111111-1111-7111-8111-111111111111","text":"x","done":false,"dueDate":"","priority":"low"}"#;
        let todo: TodoItem = serde_json::from_str(raw).unwrap();
        assert_eq!(todo.due_date, None);
    }

    #[test]
    fn apply_merges_only_present_fields() {
        let mut todo = TodoItem::new("draft");
        todo.apply(&TodoPatch {
            priority: Some(Priority::High),
            ..TodoPatch::default()
        });
        assert_eq!(todo.text, "draft");
        assert_eq!(todo.priority, Priority::High);

        todo.apply(&TodoPatch::done(true));
        assert!(todo.done);
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
